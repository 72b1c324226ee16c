use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::driver::{Direction, Role};

const NO_OVERRUN: u8 = u8::MAX;

/// Edge-triggered "an action is due" flags for the master's two transfers.
///
/// Written only from completion callbacks and read/cleared only from the
/// cooperative loop. Carries no payload: buffer contents are already stable
/// in the bus driver by the time a completion is signalled, and the flag
/// transition is the only synchronization point between the two contexts.
/// Every operation is a single atomic access, so callbacks never block.
///
/// Slave completions never pass through here; the responder handles them
/// in callback context and only reports back through [`raise_fault`].
///
/// [`raise_fault`]: Self::raise_fault
pub struct DeferredActions {
    flags: [AtomicBool; 2],
    faults: [AtomicBool; 2],
    overrun: AtomicU8,
}

impl DeferredActions {
    pub const fn new() -> Self {
        Self {
            flags: [AtomicBool::new(false), AtomicBool::new(false)],
            faults: [AtomicBool::new(false), AtomicBool::new(false)],
            overrun: AtomicU8::new(NO_OVERRUN),
        }
    }

    /// Mark the master `direction` completion as due. Callback context only.
    ///
    /// A second notify before the loop consumed the first is recorded as an
    /// overrun instead of being folded into the pending flag.
    pub fn notify(&self, direction: Direction) {
        let index = direction_index(direction);
        if self.flags[index].swap(true, Ordering::AcqRel) {
            let _ = self.overrun.compare_exchange(
                NO_OVERRUN,
                index as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    /// Consume the flag for `direction`, returning whether it was set.
    pub fn poll_and_clear(&self, direction: Direction) -> bool {
        self.flags[direction_index(direction)].swap(false, Ordering::AcqRel)
    }

    /// Look at the flag for `direction` without consuming it.
    pub fn is_pending(&self, direction: Direction) -> bool {
        self.flags[direction_index(direction)].load(Ordering::Acquire)
    }

    /// Record a failure reported from callback context for `role`.
    pub fn raise_fault(&self, role: Role) {
        self.faults[role_index(role)].store(true, Ordering::Release);
    }

    /// First role with a raised fault, master first. Faults are sticky.
    pub fn fault(&self) -> Option<Role> {
        [Role::Master, Role::Slave]
            .into_iter()
            .find(|role| self.faults[role_index(*role)].load(Ordering::Acquire))
    }

    /// The first master completion that fired twice without being consumed.
    pub fn overrun(&self) -> Option<Direction> {
        match self.overrun.load(Ordering::Acquire) {
            0 => Some(Direction::Transmit),
            1 => Some(Direction::Receive),
            _ => None,
        }
    }
}

impl Default for DeferredActions {
    fn default() -> Self {
        Self::new()
    }
}

const fn direction_index(direction: Direction) -> usize {
    match direction {
        Direction::Transmit => 0,
        Direction::Receive => 1,
    }
}

const fn role_index(role: Role) -> usize {
    match role {
        Role::Master => 0,
        Role::Slave => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_consumes_exactly_once() {
        let actions = DeferredActions::new();
        actions.notify(Direction::Transmit);

        assert!(actions.is_pending(Direction::Transmit));
        assert!(actions.poll_and_clear(Direction::Transmit));
        assert!(!actions.poll_and_clear(Direction::Transmit));
    }

    #[test]
    fn flags_are_independent() {
        let actions = DeferredActions::new();
        actions.notify(Direction::Receive);

        assert!(!actions.poll_and_clear(Direction::Transmit));
        assert!(actions.poll_and_clear(Direction::Receive));
    }

    #[test]
    fn second_notify_is_an_overrun() {
        let actions = DeferredActions::new();
        actions.notify(Direction::Receive);
        assert_eq!(actions.overrun(), None);

        actions.notify(Direction::Receive);
        assert_eq!(actions.overrun(), Some(Direction::Receive));
    }

    #[test]
    fn notify_after_poll_is_not_an_overrun() {
        let actions = DeferredActions::new();
        actions.notify(Direction::Transmit);
        assert!(actions.poll_and_clear(Direction::Transmit));
        actions.notify(Direction::Transmit);

        assert_eq!(actions.overrun(), None);
        assert!(actions.is_pending(Direction::Transmit));
    }

    #[test]
    fn faults_are_sticky() {
        let actions = DeferredActions::new();
        assert_eq!(actions.fault(), None);

        actions.raise_fault(Role::Slave);
        assert_eq!(actions.fault(), Some(Role::Slave));
        assert_eq!(actions.fault(), Some(Role::Slave));
    }
}
