//! Timing helpers for the waveform player.

use std::time::{Duration, Instant};

/// Threshold below which sleeping is too coarse and we spin instead.
const SPIN_BELOW: Duration = Duration::from_micros(1_500);

/// Hold for `width`, sleeping for the bulk and spinning out the tail.
///
/// RTS half-bits are 640 µs; an OS sleep alone can overshoot by more than a
/// whole bit, so the last stretch is busy-waited.
pub fn hold_for(width: Duration) {
    let deadline = Instant::now() + width;
    if width > SPIN_BELOW {
        std::thread::sleep(width - SPIN_BELOW);
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}
