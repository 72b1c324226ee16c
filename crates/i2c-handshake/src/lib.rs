#![no_std]
//! Interrupt-driven master/slave request/response handshake over a shared
//! synchronous bus.
//!
//! Transfer completions arrive from interrupt context and only ever set a
//! flag in a [`DeferredActions`] set. The cooperative main loop polls
//! [`MasterSequencer::step`] with the current tick, which consumes those flags,
//! enforces the elapsed-time gates between phases and issues the next bus
//! operation. Nothing in here blocks or sleeps, so the timekeeping interrupt
//! that drives the tick counter is never starved by a waiting callback.
//!
//! The slave side is a [`SlaveResponder`] that runs entirely in callback
//! context: it answers every request as soon as it lands and re-arms its
//! receiver once the answer has been read.

#[cfg(all(feature = "defmt", feature = "tracing"))]
compile_error!("You must enable at most one of the following features: `defmt`, `tracing`");

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod buffer;
mod config;
mod deferred;
mod driver;
mod error;
pub mod fault;
mod gate;
pub mod loopback;
mod responder;
mod router;
mod sequencer;

pub use buffer::TransferBuffer;
pub use config::HandshakeConfig;
pub use deferred::DeferredActions;
pub use driver::{BusDriver, BusEvent, CompletionEvent, Direction, Role};
pub use error::{ConfigError, Fault, HandshakeError, ProtocolViolation};
pub use gate::{Tick, TimingGate};
pub use responder::{SlaveResponder, SlaveState};
pub use router::{CompletionRouter, SharedResponder};
pub use sequencer::{MasterSequencer, Phase};
