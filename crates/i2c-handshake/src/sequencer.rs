use crate::buffer::TransferBuffer;
use crate::config::{check_message, HandshakeConfig};
use crate::deferred::DeferredActions;
use crate::driver::{BusDriver, CompletionEvent, Direction, Role};
use crate::error::{ConfigError, Fault, HandshakeError, ProtocolViolation};
use crate::gate::{Tick, TimingGate};

/// Phase of the master's send/receive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Next step issues the master send.
    Idle,
    AwaitMasterSendDone,
    /// Short gate armed; gives the slave time to stage its response.
    GateBeforeMasterReceive,
    /// Next step issues the master receive.
    MasterReceiveIssued,
    AwaitMasterReceiveDone,
    /// Inter-cycle gate armed.
    GateBeforeNextCycle,
}

impl Phase {
    /// The only completion this phase may observe.
    pub const fn expected_completion(self) -> Option<CompletionEvent> {
        match self {
            Phase::AwaitMasterSendDone => Some(CompletionEvent::MASTER_TRANSMIT),
            Phase::AwaitMasterReceiveDone => Some(CompletionEvent::MASTER_RECEIVE),
            _ => None,
        }
    }

    pub const fn is_awaiting(self) -> bool {
        self.expected_completion().is_some()
    }
}

const MASTER_EVENTS: [CompletionEvent; 2] =
    [CompletionEvent::MASTER_TRANSMIT, CompletionEvent::MASTER_RECEIVE];

/// Master side of the exchange, driven from the cooperative main loop.
///
/// Each [`step`](Self::step) performs at most one phase transition and at
/// most one bus driver call, and returns immediately. Completions are picked
/// up from the shared [`DeferredActions`]; elapsed-time gates are checked
/// against the tick passed in by the caller.
pub struct MasterSequencer<'a, D: BusDriver, const TX: usize, const RX: usize> {
    driver: D,
    actions: &'a DeferredActions,
    phase: Phase,
    short_gate: TimingGate,
    cycle_gate: TimingGate,
    watchdog: Option<TimingGate>,
    request: TransferBuffer<TX>,
    response: TransferBuffer<RX>,
    cycles: u32,
    fault: Option<Fault>,
}

impl<'a, D: BusDriver, const TX: usize, const RX: usize>
    MasterSequencer<'a, D, TX, RX>
{
    /// Master sending `request` every cycle.
    pub fn new(
        driver: D,
        actions: &'a DeferredActions,
        config: &HandshakeConfig,
        request: &[u8],
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        check_message(config.master_send_len, request.len(), TX)?;

        Ok(Self {
            driver,
            actions,
            phase: Phase::Idle,
            short_gate: TimingGate::new(config.short_gate),
            cycle_gate: TimingGate::new(config.cycle_gate),
            watchdog: config.await_timeout.map(TimingGate::new),
            request: TransferBuffer::from_slice(request)?,
            response: TransferBuffer::zeroed(config.master_receive_len)?,
            cycles: 0,
            fault: None,
        })
    }

    /// Poll the sequencer once with the current tick.
    ///
    /// Returns `Ok(true)` if a transition happened and `Ok(false)` if the
    /// current phase is still waiting, in which case nothing was touched.
    /// Any error is fatal: the phase is frozen where it failed and every
    /// later call returns [`HandshakeError::Halted`].
    pub fn step(&mut self, now: Tick) -> Result<bool, HandshakeError<D::Error>> {
        if self.fault.is_some() {
            return Err(HandshakeError::Halted);
        }

        let result = self.advance(now);
        if let Err(err) = &result {
            self.fault = Fault::latch(Role::Master, err);
            error!("master halted in phase {:?}: {:?}", self.phase, self.fault);
        }
        result
    }

    /// Poll forever, entering the fatal halt on the first error.
    pub fn run(mut self, mut now: impl FnMut() -> Tick) -> ! {
        info!("handshake running");
        loop {
            if self.step(now()).is_err() {
                crate::fault::halt();
            }
        }
    }

    fn advance(&mut self, now: Tick) -> Result<bool, HandshakeError<D::Error>> {
        if let Err(err) = self.check_faults(now) {
            if matches!(err, HandshakeError::Peripheral(Role::Slave)) {
                self.salvage_response()?;
            }
            return Err(err);
        }

        match self.phase {
            Phase::Idle => {
                self.driver
                    .begin_transmit(Role::Master, self.request.as_slice())
                    .map_err(HandshakeError::Bus)?;
                self.enter(Phase::AwaitMasterSendDone, now);
            }
            Phase::AwaitMasterSendDone => {
                if !self.actions.poll_and_clear(Direction::Transmit) {
                    return Ok(false);
                }
                self.short_gate.arm(now);
                self.enter(Phase::GateBeforeMasterReceive, now);
            }
            Phase::GateBeforeMasterReceive => {
                if !self.short_gate.try_pass(now) {
                    return Ok(false);
                }
                self.enter(Phase::MasterReceiveIssued, now);
            }
            Phase::MasterReceiveIssued => {
                self.driver
                    .begin_receive(Role::Master, self.response.len())
                    .map_err(HandshakeError::Bus)?;
                self.enter(Phase::AwaitMasterReceiveDone, now);
            }
            Phase::AwaitMasterReceiveDone => {
                if !self.actions.poll_and_clear(Direction::Receive) {
                    return Ok(false);
                }
                self.receive_response()?;
                self.cycles = self.cycles.wrapping_add(1);
                self.cycle_gate.arm(now);
                self.enter(Phase::GateBeforeNextCycle, now);
            }
            Phase::GateBeforeNextCycle => {
                if !self.cycle_gate.try_pass(now) {
                    return Ok(false);
                }
                self.enter(Phase::Idle, now);
            }
        }
        Ok(true)
    }

    fn receive_response(&mut self) -> Result<(), HandshakeError<D::Error>> {
        let expected = self.response.len();
        let actual = self
            .driver
            .finish_receive(Role::Master, self.response.as_mut_slice())
            .map_err(HandshakeError::Bus)?;
        if actual != expected {
            return Err(ProtocolViolation::ReceivedLength {
                role: Role::Master,
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Copy out a response that completed before the slave failed, so the
    /// halted sequencer still holds it. The phase stays frozen.
    fn salvage_response(&mut self) -> Result<(), HandshakeError<D::Error>> {
        if self.phase == Phase::AwaitMasterReceiveDone
            && self.actions.poll_and_clear(Direction::Receive)
        {
            self.receive_response()?;
        }
        Ok(())
    }

    /// Escalate anything the callbacks flagged that this phase cannot accept.
    fn check_faults(&self, now: Tick) -> Result<(), HandshakeError<D::Error>> {
        if let Some(role) = self.actions.fault() {
            return Err(HandshakeError::Peripheral(role));
        }
        if let Some(direction) = self.actions.overrun() {
            let event = CompletionEvent::new(Role::Master, direction);
            return Err(ProtocolViolation::DoubleCompletion(event).into());
        }

        let expected = self.phase.expected_completion();
        for event in MASTER_EVENTS {
            if Some(event) != expected && self.actions.is_pending(event.direction) {
                return Err(ProtocolViolation::UnexpectedCompletion {
                    phase: self.phase,
                    event,
                }
                .into());
            }
        }

        // A completion that already landed wins over the watchdog.
        if let (Some(watchdog), Some(event)) = (&self.watchdog, expected) {
            if watchdog.is_elapsed(now) && !self.actions.is_pending(event.direction) {
                return Err(HandshakeError::Timeout(self.phase));
            }
        }
        Ok(())
    }

    fn enter(&mut self, phase: Phase, now: Tick) {
        trace!("master {:?} -> {:?} at {:?}", self.phase, phase, now);
        self.phase = phase;
        if let Some(watchdog) = &mut self.watchdog {
            if phase.is_awaiting() {
                watchdog.arm(now);
            } else {
                watchdog.disarm();
            }
        }
        if phase == Phase::GateBeforeNextCycle {
            debug!("master cycle {:?} complete", self.cycles);
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Completed send/receive round trips.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// The last response received from the slave.
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// The gate currently guarding the phase, if the phase is gated.
    pub fn active_gate(&self) -> Option<&TimingGate> {
        match self.phase {
            Phase::GateBeforeMasterReceive => Some(&self.short_gate),
            Phase::GateBeforeNextCycle => Some(&self.cycle_gate),
            _ => None,
        }
    }

    /// The fault that halted the sequencer, if it is halted.
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}
