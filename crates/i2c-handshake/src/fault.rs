//! Fatal path shared by every unrecoverable condition.

/// Stop processing and freeze all state for a debugger.
///
/// With the `cortex-m` feature, interrupts are masked first so no completion
/// callback can touch the frozen state.
pub fn halt() -> ! {
    #[cfg(feature = "cortex-m")]
    cortex_m::interrupt::disable();

    loop {
        core::hint::spin_loop();
    }
}
