use core::fmt;

use crate::driver::{CompletionEvent, Direction, Role};
use crate::responder::SlaveState;
use crate::sequencer::Phase;

/// Programming errors caught before the cooperative loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The master sends a different number of bytes than the slave expects.
    RequestLengthMismatch { master_send: usize, slave_receive: usize },
    /// The slave sends a different number of bytes than the master expects.
    ResponseLengthMismatch { slave_send: usize, master_receive: usize },
    /// A message length of zero was configured.
    ZeroLength,
    /// A message does not fit the buffer reserved for it.
    ExceedsCapacity { length: usize, capacity: usize },
    /// A payload differs in length from the configured message length.
    PayloadLength { expected: usize, actual: usize },
    /// The slave address does not fit in 7 bits.
    InvalidAddress(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::RequestLengthMismatch { master_send, slave_receive } => {
                write!(
                    f,
                    "master sends {} bytes but slave receives {}",
                    master_send, slave_receive
                )
            }
            ConfigError::ResponseLengthMismatch { slave_send, master_receive } => {
                write!(
                    f,
                    "slave sends {} bytes but master receives {}",
                    slave_send, master_receive
                )
            }
            ConfigError::ZeroLength => write!(f, "message length must be non-zero"),
            ConfigError::ExceedsCapacity { length, capacity } => {
                write!(
                    f,
                    "message of {} bytes exceeds buffer capacity {}",
                    length, capacity
                )
            }
            ConfigError::PayloadLength { expected, actual } => {
                write!(
                    f,
                    "payload is {} bytes, configured length is {}",
                    actual, expected
                )
            }
            ConfigError::InvalidAddress(addr) => {
                write!(f, "address {:#04x} is not a 7-bit address", addr)
            }
        }
    }
}

/// A completion that the exchange was not waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolViolation {
    /// The master side saw a completion its current phase does not expect.
    UnexpectedCompletion { phase: Phase, event: CompletionEvent },
    /// The slave side saw a completion its current state does not expect.
    UnexpectedSlaveCompletion { state: SlaveState, direction: Direction },
    /// A completion fired again before the previous one was consumed.
    DoubleCompletion(CompletionEvent),
    /// A receive finished with a different byte count than configured.
    ReceivedLength { role: Role, expected: usize, actual: usize },
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolViolation::UnexpectedCompletion { phase, event } => {
                write!(f, "unexpected {:?} completion in phase {:?}", event, phase)
            }
            ProtocolViolation::UnexpectedSlaveCompletion { state, direction } => {
                write!(
                    f,
                    "unexpected slave {:?} completion in state {:?}",
                    direction, state
                )
            }
            ProtocolViolation::DoubleCompletion(event) => {
                write!(f, "{:?} completed twice without being consumed", event)
            }
            ProtocolViolation::ReceivedLength { role, expected, actual } => {
                write!(
                    f,
                    "{:?} received {} bytes, expected {}",
                    role, actual, expected
                )
            }
        }
    }
}

/// Errors surfaced by the handshake. All of them are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeError<E: fmt::Debug> {
    /// The bus driver refused to start a transfer.
    Bus(E),
    /// The `Role` side raised a fault from callback context: a transport
    /// error (NACK, arbitration loss, bus timeout) or a slave-side failure.
    Peripheral(Role),
    /// The completion sequence broke the request/response alternation.
    Protocol(ProtocolViolation),
    /// An `Await*` phase outlived the configured watchdog.
    Timeout(Phase),
    /// A fatal error was already reported; state is frozen.
    Halted,
}

impl<E: fmt::Debug> fmt::Display for HandshakeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::Bus(err) => write!(f, "bus driver error: {:?}", err),
            HandshakeError::Peripheral(role) => {
                write!(f, "{:?} peripheral raised a fault", role)
            }
            HandshakeError::Protocol(violation) => {
                write!(f, "protocol violation: {}", violation)
            }
            HandshakeError::Timeout(phase) => {
                write!(f, "watchdog expired in phase {:?}", phase)
            }
            HandshakeError::Halted => write!(f, "handshake is halted"),
        }
    }
}

impl<E: fmt::Debug> From<ProtocolViolation> for HandshakeError<E> {
    fn from(violation: ProtocolViolation) -> Self {
        HandshakeError::Protocol(violation)
    }
}

/// The first fatal condition, latched for inspection after a halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// A `begin_*` or `finish_receive` call failed for this role.
    Bus(Role),
    Peripheral(Role),
    Protocol(ProtocolViolation),
    Timeout(Phase),
}

impl Fault {
    /// Latch `err` on behalf of `role`. `Halted` carries nothing new.
    pub(crate) fn latch<E: fmt::Debug>(
        role: Role,
        err: &HandshakeError<E>,
    ) -> Option<Self> {
        match err {
            HandshakeError::Bus(_) => Some(Fault::Bus(role)),
            HandshakeError::Peripheral(role) => Some(Fault::Peripheral(*role)),
            HandshakeError::Protocol(violation) => Some(Fault::Protocol(*violation)),
            HandshakeError::Timeout(phase) => Some(Fault::Timeout(*phase)),
            HandshakeError::Halted => None,
        }
    }
}
