/// Which end of the bus an endpoint drives. Fixed per peripheral instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Master,
    Slave,
}

/// Direction of a transfer as seen from the endpoint performing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Transmit,
    Receive,
}

/// A finished transfer, tagged with the endpoint and direction it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompletionEvent {
    pub role: Role,
    pub direction: Direction,
}

impl CompletionEvent {
    pub const MASTER_TRANSMIT: Self = Self::new(Role::Master, Direction::Transmit);
    pub const MASTER_RECEIVE: Self = Self::new(Role::Master, Direction::Receive);
    pub const SLAVE_TRANSMIT: Self = Self::new(Role::Slave, Direction::Transmit);
    pub const SLAVE_RECEIVE: Self = Self::new(Role::Slave, Direction::Receive);

    pub const fn new(role: Role, direction: Direction) -> Self {
        Self { role, direction }
    }
}

/// Everything a bus interrupt can report to the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// A transfer finished and its data is stable.
    Complete(CompletionEvent),
    /// The peripheral for `Role` flagged a transport error (NACK, arbitration
    /// loss, bus timeout) on whatever transfer it had in flight.
    Error(Role),
}

/// Non-blocking access to one bus peripheral.
///
/// Both `begin_*` calls only start a transfer and return immediately. The
/// peripheral later reports the outcome from interrupt context as a
/// [`BusEvent`], exactly once per started transfer.
///
/// Transmit payloads are latched by the driver when the transfer starts.
/// Received bytes are held by the driver until [`finish_receive`] copies them
/// out, which callers only do after observing the matching completion.
///
/// [`finish_receive`]: BusDriver::finish_receive
pub trait BusDriver {
    /// Error type for transfers that cannot be started.
    type Error: core::fmt::Debug;

    /// Start sending `payload` as `role`.
    fn begin_transmit(
        &mut self,
        role: Role,
        payload: &[u8],
    ) -> Result<(), Self::Error>;

    /// Start receiving exactly `length` bytes as `role`.
    fn begin_receive(
        &mut self,
        role: Role,
        length: usize,
    ) -> Result<(), Self::Error>;

    /// Copy the bytes of the last completed receive for `role` into
    /// `buffer`, returning how many the transfer carried.
    ///
    /// The count may differ from `buffer.len()`. Only the overlapping prefix
    /// is copied; callers treat any other count as a protocol violation.
    fn finish_receive(
        &mut self,
        role: Role,
        buffer: &mut [u8],
    ) -> Result<usize, Self::Error>;
}

impl<T: BusDriver + ?Sized> BusDriver for &mut T {
    type Error = T::Error;

    #[inline]
    fn begin_transmit(
        &mut self,
        role: Role,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        T::begin_transmit(self, role, payload)
    }

    #[inline]
    fn begin_receive(
        &mut self,
        role: Role,
        length: usize,
    ) -> Result<(), Self::Error> {
        T::begin_receive(self, role, length)
    }

    #[inline]
    fn finish_receive(
        &mut self,
        role: Role,
        buffer: &mut [u8],
    ) -> Result<usize, Self::Error> {
        T::finish_receive(self, role, buffer)
    }
}
