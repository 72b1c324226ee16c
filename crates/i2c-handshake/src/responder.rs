use crate::buffer::TransferBuffer;
use crate::config::{check_message, HandshakeConfig};
use crate::driver::{BusDriver, Direction, Role};
use crate::error::{ConfigError, Fault, HandshakeError, ProtocolViolation};

/// Where the slave is in its receive-then-respond loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveState {
    /// Not yet armed; the master must not transmit.
    Disarmed,
    /// A receive for the next request is outstanding.
    Receiving,
    /// The response transmit is outstanding, waiting for the master to read it.
    Responding,
}

/// Slave side of the exchange. Runs entirely in completion-callback context.
///
/// A finished receive immediately starts the response transmit, and a
/// finished transmit immediately re-arms the receive, so the slave is always
/// ready before the master's next transfer lands. There is no gate on this
/// side: its cadence is the master's.
pub struct SlaveResponder<D: BusDriver, const RX: usize, const TX: usize> {
    driver: D,
    state: SlaveState,
    request: TransferBuffer<RX>,
    response: TransferBuffer<TX>,
    exchanges: u32,
    fault: Option<Fault>,
}

impl<D: BusDriver, const RX: usize, const TX: usize> SlaveResponder<D, RX, TX> {
    /// Slave answering every request with `response`.
    pub fn new(
        driver: D,
        config: &HandshakeConfig,
        response: &[u8],
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        check_message(config.slave_send_len, response.len(), TX)?;
        if config.slave_receive_len > RX {
            return Err(ConfigError::ExceedsCapacity {
                length: config.slave_receive_len,
                capacity: RX,
            });
        }

        Ok(Self {
            driver,
            state: SlaveState::Disarmed,
            request: TransferBuffer::zeroed(config.slave_receive_len)?,
            response: TransferBuffer::from_slice(response)?,
            exchanges: 0,
            fault: None,
        })
    }

    /// Arm the first receive. Must happen before the master's first transmit.
    pub fn arm(&mut self) -> Result<(), HandshakeError<D::Error>> {
        if self.state != SlaveState::Disarmed {
            return Ok(());
        }
        let result = self.begin_receive();
        self.record(result)
    }

    /// Advance on a completion for the slave peripheral.
    pub fn on_complete(
        &mut self,
        direction: Direction,
    ) -> Result<(), HandshakeError<D::Error>> {
        if self.fault.is_some() {
            return Err(HandshakeError::Halted);
        }
        let result = self.advance(direction);
        self.record(result)
    }

    fn advance(
        &mut self,
        direction: Direction,
    ) -> Result<(), HandshakeError<D::Error>> {
        match (self.state, direction) {
            (SlaveState::Receiving, Direction::Receive) => {
                let expected = self.request.len();
                let actual = self
                    .driver
                    .finish_receive(Role::Slave, self.request.as_mut_slice())
                    .map_err(HandshakeError::Bus)?;
                if actual != expected {
                    return Err(ProtocolViolation::ReceivedLength {
                        role: Role::Slave,
                        expected,
                        actual,
                    }
                    .into());
                }
                self.driver
                    .begin_transmit(Role::Slave, self.response.as_slice())
                    .map_err(HandshakeError::Bus)?;
                self.state = SlaveState::Responding;
                Ok(())
            }
            (SlaveState::Responding, Direction::Transmit) => {
                self.begin_receive()?;
                self.exchanges = self.exchanges.wrapping_add(1);
                Ok(())
            }
            (state, direction) => Err(
                ProtocolViolation::UnexpectedSlaveCompletion { state, direction }.into()
            ),
        }
    }

    fn begin_receive(&mut self) -> Result<(), HandshakeError<D::Error>> {
        self.driver
            .begin_receive(Role::Slave, self.request.len())
            .map_err(HandshakeError::Bus)?;
        self.state = SlaveState::Receiving;
        Ok(())
    }

    fn record(
        &mut self,
        result: Result<(), HandshakeError<D::Error>>,
    ) -> Result<(), HandshakeError<D::Error>> {
        if let Err(err) = &result {
            if self.fault.is_none() {
                self.fault = Fault::latch(Role::Slave, err);
            }
            error!("slave halted in state {:?}", self.state);
        }
        result
    }

    pub fn state(&self) -> SlaveState {
        self.state
    }

    /// The last request received from the master.
    pub fn request(&self) -> &[u8] {
        &self.request
    }

    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// Completed receive-and-respond exchanges.
    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}
