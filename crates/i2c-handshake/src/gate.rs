/// Value of the free-running tick counter driven by the periodic timer
/// interrupt. Wraps around; all comparisons use wrapping differences.
pub type Tick = u32;

/// A minimum-elapsed-time condition guarding a phase transition.
///
/// The gate is armed with the tick at which the guarded phase was entered
/// and reports elapsed once `now - armed_at >= threshold`. It never waits:
/// callers poll it with the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingGate {
    threshold: Tick,
    armed_at: Option<Tick>,
}

impl TimingGate {
    pub const fn new(threshold: Tick) -> Self {
        Self { threshold, armed_at: None }
    }

    pub const fn threshold(&self) -> Tick {
        self.threshold
    }

    /// Tick at which the gate was armed, if it is armed.
    pub const fn armed_at(&self) -> Option<Tick> {
        self.armed_at
    }

    pub const fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn arm(&mut self, now: Tick) {
        self.armed_at = Some(now);
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    /// `true` once the threshold has elapsed since arming. A disarmed gate
    /// never reports elapsed.
    pub fn is_elapsed(&self, now: Tick) -> bool {
        match self.armed_at {
            Some(armed_at) => now.wrapping_sub(armed_at) >= self.threshold,
            None => false,
        }
    }

    /// Consume the gate if it has elapsed.
    pub fn try_pass(&mut self, now: Tick) -> bool {
        if self.is_elapsed(now) {
            self.disarm();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_gate_never_elapses() {
        let gate = TimingGate::new(0);
        assert!(!gate.is_elapsed(0));
        assert!(!gate.is_elapsed(Tick::MAX));
    }

    #[test]
    fn elapses_exactly_at_threshold() {
        let mut gate = TimingGate::new(100);
        gate.arm(5);
        assert!(!gate.is_elapsed(5));
        assert!(!gate.is_elapsed(104));
        assert!(gate.is_elapsed(105));
        assert!(gate.try_pass(105));
        assert!(!gate.is_armed());
    }

    #[test]
    fn zero_threshold_passes_on_arming_tick() {
        let mut gate = TimingGate::new(0);
        gate.arm(42);
        assert!(gate.try_pass(42));
    }

    #[test]
    fn survives_tick_wraparound() {
        let mut gate = TimingGate::new(10);
        gate.arm(Tick::MAX - 3);
        assert!(!gate.is_elapsed(5));
        assert!(gate.is_elapsed(6));
    }
}
