use core::ops::Deref;

use heapless::Vec;

use crate::error::ConfigError;

/// Fixed-capacity storage for one direction of the exchange.
///
/// Holds exactly the configured message length. Contents are overwritten in
/// place once per phase and never reallocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBuffer<const N: usize> {
    data: Vec<u8, N>,
}

impl<const N: usize> TransferBuffer<N> {
    /// Buffer holding a copy of `payload`.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ConfigError> {
        let data = Vec::from_slice(payload).map_err(|_| {
            ConfigError::ExceedsCapacity { length: payload.len(), capacity: N }
        })?;
        Ok(Self { data })
    }

    /// Zero-filled buffer of `length` bytes.
    pub fn zeroed(length: usize) -> Result<Self, ConfigError> {
        let mut data = Vec::new();
        data.resize(length, 0).map_err(|_| ConfigError::ExceedsCapacity {
            length,
            capacity: N,
        })?;
        Ok(Self { data })
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl<const N: usize> Deref for TransferBuffer<N> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for TransferBuffer<N> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "TransferBuffer {=[u8]}", self.as_slice())
    }
}
