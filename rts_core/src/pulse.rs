//! Pulse-train expansion for encoded frames.
//!
//! The receiver tolerates little slack in this timing table; the values are
//! the RTS air format and must not be tuned.

use std::time::Duration;

use rts_traits::Pulse;

use crate::frame::{FRAME_BITS, Frame};

const WAKEUP_ACTIVE_US: u32 = 9_415;
const WAKEUP_IDLE_US: u32 = 89_565;
const HW_SYNC_US: u32 = 2_560;
const SW_SYNC_ACTIVE_US: u32 = 4_550;
const SW_SYNC_IDLE_US: u32 = 640;
const HALF_BIT_US: u32 = 640;
const INTER_FRAME_GAP_US: u32 = 30_415;

/// Hardware-sync pairs before the first frame vs. before each repeat. The
/// receiver distinguishes an original press from a held button by this
/// asymmetry.
const FIRST_FRAME_SYNC_PAIRS: usize = 2;
const REPEAT_FRAME_SYNC_PAIRS: usize = 7;

/// Pulses per frame block after the first: 7 sync pairs, software sync,
/// Manchester payload, gap.
const REPEAT_BLOCK_PULSES: usize = 2 * REPEAT_FRAME_SYNC_PAIRS + 2 + 2 * FRAME_BITS + 1;

/// Expand an encoded frame into a fully timed pulse train.
///
/// `repetitions` counts frames on air, original included, and is clamped
/// to at least one. Repeats carry seven hardware-sync pairs instead of two.
pub fn build_pulse_train(frame: &Frame, repetitions: u32) -> Vec<Pulse> {
    let repetitions = repetitions.max(1) as usize;
    let mut train = Vec::with_capacity(2 + REPEAT_BLOCK_PULSES * repetitions);

    train.push(Pulse::active(WAKEUP_ACTIVE_US));
    train.push(Pulse::idle(WAKEUP_IDLE_US));

    for repeat in 0..repetitions {
        let sync_pairs = if repeat == 0 {
            FIRST_FRAME_SYNC_PAIRS
        } else {
            REPEAT_FRAME_SYNC_PAIRS
        };
        for _ in 0..sync_pairs {
            train.push(Pulse::active(HW_SYNC_US));
            train.push(Pulse::idle(HW_SYNC_US));
        }

        train.push(Pulse::active(SW_SYNC_ACTIVE_US));
        train.push(Pulse::idle(SW_SYNC_IDLE_US));

        // Manchester: a one is idle-then-active, a zero active-then-idle.
        for bit in 0..FRAME_BITS {
            if frame.bit(bit) {
                train.push(Pulse::idle(HALF_BIT_US));
                train.push(Pulse::active(HALF_BIT_US));
            } else {
                train.push(Pulse::active(HALF_BIT_US));
                train.push(Pulse::idle(HALF_BIT_US));
            }
        }

        train.push(Pulse::idle(INTER_FRAME_GAP_US));
    }

    train
}

/// Total on-air time of a train.
pub fn train_duration(pulses: &[Pulse]) -> Duration {
    Duration::from_micros(pulses.iter().map(|p| u64::from(p.width_us)).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Button;

    #[test]
    fn wakeup_leads_the_train() {
        let frame = Frame::encode(0x1, Button::Up.mask(), 1);
        let train = build_pulse_train(&frame, 1);
        assert_eq!(train[0], Pulse::active(WAKEUP_ACTIVE_US));
        assert_eq!(train[1], Pulse::idle(WAKEUP_IDLE_US));
    }

    #[test]
    fn zero_repetitions_clamps_to_one() {
        let frame = Frame::encode(0x1, Button::Up.mask(), 1);
        assert_eq!(
            build_pulse_train(&frame, 0).len(),
            build_pulse_train(&frame, 1).len()
        );
    }
}
