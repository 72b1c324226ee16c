use crate::error::ConfigError;
use crate::gate::Tick;

/// Static description of one master/slave exchange.
///
/// Message lengths are fixed per direction: whatever the master sends, the
/// slave must be armed to receive exactly that many bytes, and likewise for
/// the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandshakeConfig {
    /// 7-bit address the slave answers to.
    pub slave_address: u8,
    pub master_send_len: usize,
    pub slave_receive_len: usize,
    pub slave_send_len: usize,
    pub master_receive_len: usize,
    /// Ticks between the end of the master's send and the start of its receive.
    pub short_gate: Tick,
    /// Ticks between the end of the master's receive and the next send.
    pub cycle_gate: Tick,
    /// Longest an `Await*` phase may last, if set.
    pub await_timeout: Option<Tick>,
}

impl HandshakeConfig {
    /// Request and response lengths of the bring-up firmware: a 22-byte
    /// greeting answered by a 52-byte response, 1 ms gate before the read and
    /// 100 ms between cycles on a 1 kHz tick.
    pub const DEFAULT: Self = Self {
        slave_address: 0x01,
        master_send_len: 22,
        slave_receive_len: 22,
        slave_send_len: 52,
        master_receive_len: 52,
        short_gate: 1,
        cycle_gate: 100,
        await_timeout: None,
    };

    /// Config where the slave receives what the master sends and vice versa.
    pub const fn symmetric(request_len: usize, response_len: usize) -> Self {
        Self {
            master_send_len: request_len,
            slave_receive_len: request_len,
            slave_send_len: response_len,
            master_receive_len: response_len,
            ..Self::DEFAULT
        }
    }

    pub const fn with_gates(mut self, short_gate: Tick, cycle_gate: Tick) -> Self {
        self.short_gate = short_gate;
        self.cycle_gate = cycle_gate;
        self
    }

    pub const fn with_address(mut self, slave_address: u8) -> Self {
        self.slave_address = slave_address;
        self
    }

    pub const fn with_await_timeout(mut self, timeout: Tick) -> Self {
        self.await_timeout = Some(timeout);
        self
    }

    /// Check the pairing between each sender and its receiver.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slave_address > 0x7F {
            return Err(ConfigError::InvalidAddress(self.slave_address));
        }
        if self.master_send_len == 0 || self.slave_send_len == 0 {
            return Err(ConfigError::ZeroLength);
        }
        if self.master_send_len != self.slave_receive_len {
            return Err(ConfigError::RequestLengthMismatch {
                master_send: self.master_send_len,
                slave_receive: self.slave_receive_len,
            });
        }
        if self.slave_send_len != self.master_receive_len {
            return Err(ConfigError::ResponseLengthMismatch {
                slave_send: self.slave_send_len,
                master_receive: self.master_receive_len,
            });
        }
        Ok(())
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Check that a payload of `actual` bytes is a message of `expected` bytes
/// and fits a buffer of `capacity`.
pub(crate) fn check_message(
    expected: usize,
    actual: usize,
    capacity: usize,
) -> Result<(), ConfigError> {
    if expected > capacity {
        return Err(ConfigError::ExceedsCapacity { length: expected, capacity });
    }
    if expected != actual {
        return Err(ConfigError::PayloadLength { expected, actual });
    }
    Ok(())
}
