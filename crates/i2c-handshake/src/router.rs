use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::deferred::DeferredActions;
use crate::driver::{BusDriver, BusEvent, Role};
use crate::responder::SlaveResponder;

/// A slave responder owned by the completion-callback context.
pub type SharedResponder<M, D, const RX: usize, const TX: usize> =
    Mutex<M, RefCell<SlaveResponder<D, RX, TX>>>;

/// Single entry point for every bus interrupt.
///
/// Master completions only set their deferred flag; the main loop does the
/// rest. Slave completions are handled on the spot by the responder. Any
/// error, from a peripheral or from the responder, raises a fault flag that
/// the sequencer escalates on its next step.
pub struct CompletionRouter<'a, M, D, const RX: usize, const TX: usize>
where
    M: RawMutex,
    D: BusDriver,
{
    actions: &'a DeferredActions,
    responder: &'a SharedResponder<M, D, RX, TX>,
}

impl<'a, M, D, const RX: usize, const TX: usize> CompletionRouter<'a, M, D, RX, TX>
where
    M: RawMutex,
    D: BusDriver,
{
    pub const fn new(
        actions: &'a DeferredActions,
        responder: &'a SharedResponder<M, D, RX, TX>,
    ) -> Self {
        Self { actions, responder }
    }

    /// Handle one event. Callback context; never blocks.
    pub fn dispatch(&self, event: BusEvent) {
        match event {
            BusEvent::Complete(done) => match done.role {
                Role::Master => self.actions.notify(done.direction),
                Role::Slave => {
                    let result = self
                        .responder
                        .lock(|cell| cell.borrow_mut().on_complete(done.direction));
                    if result.is_err() {
                        self.actions.raise_fault(Role::Slave);
                    }
                }
            },
            BusEvent::Error(role) => {
                warn!("{:?} peripheral reported a bus error", role);
                self.actions.raise_fault(role);
            }
        }
    }
}

impl<M, D, const RX: usize, const TX: usize> Clone for CompletionRouter<'_, M, D, RX, TX>
where
    M: RawMutex,
    D: BusDriver,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, D, const RX: usize, const TX: usize> Copy for CompletionRouter<'_, M, D, RX, TX>
where
    M: RawMutex,
    D: BusDriver,
{
}
