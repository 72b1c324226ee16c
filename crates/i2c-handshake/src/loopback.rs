//! In-memory bus wiring one master port to one slave port.
//!
//! Transfers complete as soon as both ends are ready, and their completions
//! are queued as [`BusEvent`]s instead of being delivered directly. Whoever
//! plays the interrupt controller drains them with
//! [`LoopbackBus::next_event`] and feeds them to a
//! [`CompletionRouter`](crate::CompletionRouter), which keeps callback
//! context and the main loop as separate as they are on hardware.
//!
//! Like a real peripheral, the bus refuses to start a second transfer on a
//! port whose previous completion has not been delivered yet.

use core::cell::RefCell;

use heapless::{Deque, Vec};

use crate::driver::{BusDriver, BusEvent, CompletionEvent, Direction, Role};

/// Longest message the loopback bus can carry.
pub const MAX_MESSAGE: usize = 255;

const EVENT_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopbackError {
    /// The port still has a transfer whose completion was not delivered.
    Busy,
    /// A port was asked to act for the other role.
    WrongRole,
    /// The message does not fit [`MAX_MESSAGE`].
    TooLong,
    /// The interrupt queue is full.
    EventOverflow,
    /// Failure injected with [`LoopbackBus::fail_next`].
    Injected,
}

#[derive(Debug)]
enum SlaveSide {
    Idle,
    Receiving(usize),
    Transmitting(Vec<u8, MAX_MESSAGE>),
}

struct Wire {
    master_target: u8,
    slave_address: u8,
    slave: SlaveSide,
    in_flight: [bool; 2],
    latched: [Vec<u8, MAX_MESSAGE>; 2],
    fail_next: [bool; 2],
    events: Deque<BusEvent, EVENT_DEPTH>,
    transfers: u32,
}

impl Wire {
    fn start(&mut self, role: Role) -> Result<(), LoopbackError> {
        let slot = slot(role);
        if self.in_flight[slot] {
            return Err(LoopbackError::Busy);
        }
        if core::mem::take(&mut self.fail_next[slot]) {
            return Err(LoopbackError::Injected);
        }
        if self.events.len() + 2 > EVENT_DEPTH {
            return Err(LoopbackError::EventOverflow);
        }
        self.in_flight[slot] = true;
        Ok(())
    }

    fn push(&mut self, event: BusEvent) {
        // Capacity for two events was reserved in `start`.
        let _ = self.events.push_back(event);
    }

    fn complete_pair(&mut self, master: Direction, slave: Direction) {
        self.transfers = self.transfers.wrapping_add(1);
        self.slave = SlaveSide::Idle;
        self.push(BusEvent::Complete(CompletionEvent::new(Role::Master, master)));
        self.push(BusEvent::Complete(CompletionEvent::new(Role::Slave, slave)));
    }

    fn master_transmit(&mut self, payload: &[u8]) -> Result<(), LoopbackError> {
        let data = Vec::from_slice(payload).map_err(|_| LoopbackError::TooLong)?;
        self.start(Role::Master)?;

        match self.slave {
            SlaveSide::Receiving(length)
                if self.master_target == self.slave_address
                    && length == payload.len() =>
            {
                self.latched[slot(Role::Slave)] = data;
                self.complete_pair(Direction::Transmit, Direction::Receive);
            }
            // Nobody acknowledged the address or the byte count.
            _ => self.push(BusEvent::Error(Role::Master)),
        }
        Ok(())
    }

    fn master_receive(&mut self, length: usize) -> Result<(), LoopbackError> {
        self.start(Role::Master)?;

        let staged = match &self.slave {
            SlaveSide::Transmitting(data)
                if self.master_target == self.slave_address
                    && data.len() == length =>
            {
                Some(data.clone())
            }
            _ => None,
        };
        match staged {
            Some(data) => {
                self.latched[slot(Role::Master)] = data;
                self.complete_pair(Direction::Receive, Direction::Transmit);
            }
            None => self.push(BusEvent::Error(Role::Master)),
        }
        Ok(())
    }

    fn slave_transmit(&mut self, payload: &[u8]) -> Result<(), LoopbackError> {
        let data = Vec::from_slice(payload).map_err(|_| LoopbackError::TooLong)?;
        self.start(Role::Slave)?;
        self.slave = SlaveSide::Transmitting(data);
        Ok(())
    }

    fn slave_receive(&mut self, length: usize) -> Result<(), LoopbackError> {
        if length > MAX_MESSAGE {
            return Err(LoopbackError::TooLong);
        }
        self.start(Role::Slave)?;
        self.slave = SlaveSide::Receiving(length);
        Ok(())
    }
}

/// The shared wire. Hand out one port per role with [`master`](Self::master)
/// and [`slave`](Self::slave).
pub struct LoopbackBus {
    wire: RefCell<Wire>,
}

impl LoopbackBus {
    /// Bus whose slave answers to `slave_address`, with the master
    /// targeting the same address.
    pub const fn new(slave_address: u8) -> Self {
        Self {
            wire: RefCell::new(Wire {
                master_target: slave_address,
                slave_address,
                slave: SlaveSide::Idle,
                in_flight: [false; 2],
                latched: [Vec::new(), Vec::new()],
                fail_next: [false; 2],
                events: Deque::new(),
                transfers: 0,
            }),
        }
    }

    pub fn master(&self) -> LoopbackPort<'_> {
        LoopbackPort { bus: self, role: Role::Master }
    }

    pub fn slave(&self) -> LoopbackPort<'_> {
        LoopbackPort { bus: self, role: Role::Slave }
    }

    /// Point the master at a different address.
    pub fn set_master_target(&self, address: u8) {
        self.wire.borrow_mut().master_target = address;
    }

    /// Make the next `begin_*` call on `role` fail synchronously.
    pub fn fail_next(&self, role: Role) {
        self.wire.borrow_mut().fail_next[slot(role)] = true;
    }

    /// Queue an interrupt event as if the hardware had raised it.
    pub fn inject(&self, event: BusEvent) -> Result<(), LoopbackError> {
        self.wire
            .borrow_mut()
            .events
            .push_back(event)
            .map_err(|_| LoopbackError::EventOverflow)
    }

    /// Take the oldest pending interrupt event.
    ///
    /// Marks the reporting port idle again before returning, the way a
    /// peripheral is free once its completion interrupt fires.
    pub fn next_event(&self) -> Option<BusEvent> {
        let mut wire = self.wire.borrow_mut();
        let event = wire.events.pop_front()?;
        let role = match event {
            BusEvent::Complete(done) => done.role,
            BusEvent::Error(role) => role,
        };
        wire.in_flight[slot(role)] = false;
        Some(event)
    }

    pub fn pending_events(&self) -> usize {
        self.wire.borrow().events.len()
    }

    /// Whether `role` has a transfer whose completion is still undelivered.
    pub fn in_flight(&self, role: Role) -> bool {
        self.wire.borrow().in_flight[slot(role)]
    }

    /// Transfers that moved data between the two ports.
    pub fn transfers(&self) -> u32 {
        self.wire.borrow().transfers
    }
}

/// One end of a [`LoopbackBus`].
#[derive(Clone, Copy)]
pub struct LoopbackPort<'a> {
    bus: &'a LoopbackBus,
    role: Role,
}

impl LoopbackPort<'_> {
    pub fn role(&self) -> Role {
        self.role
    }

    fn check_role(&self, role: Role) -> Result<(), LoopbackError> {
        if role == self.role {
            Ok(())
        } else {
            Err(LoopbackError::WrongRole)
        }
    }
}

impl BusDriver for LoopbackPort<'_> {
    type Error = LoopbackError;

    fn begin_transmit(
        &mut self,
        role: Role,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        self.check_role(role)?;
        let mut wire = self.bus.wire.borrow_mut();
        match role {
            Role::Master => wire.master_transmit(payload),
            Role::Slave => wire.slave_transmit(payload),
        }
    }

    fn begin_receive(
        &mut self,
        role: Role,
        length: usize,
    ) -> Result<(), Self::Error> {
        self.check_role(role)?;
        let mut wire = self.bus.wire.borrow_mut();
        match role {
            Role::Master => wire.master_receive(length),
            Role::Slave => wire.slave_receive(length),
        }
    }

    fn finish_receive(
        &mut self,
        role: Role,
        buffer: &mut [u8],
    ) -> Result<usize, Self::Error> {
        self.check_role(role)?;
        let wire = self.bus.wire.borrow();
        let latched = &wire.latched[slot(role)];
        let count = latched.len().min(buffer.len());
        buffer[..count].copy_from_slice(&latched[..count]);
        Ok(latched.len())
    }
}

const fn slot(role: Role) -> usize {
    match role {
        Role::Master => 0,
        Role::Slave => 1,
    }
}
