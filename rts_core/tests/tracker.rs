use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;
use rts_config::{Config, Logging, ShutterCfg};
use rts_core::PositionTracker;
use rts_core::mocks::ManualClock;

fn config(intermediate: Option<u8>) -> Arc<Config> {
    let mut shutters = HashMap::new();
    shutters.insert(
        "1".to_string(),
        ShutterCfg {
            name: "Rolluik1".to_string(),
            duration_down: 20.0,
            duration_up: 20.0,
            intermediate_position: intermediate,
            code: 1,
        },
    );
    Arc::new(Config {
        tx_pin: 16,
        send_repeat: 2,
        logging: Logging::default(),
        shutters,
    })
}

fn tracker(intermediate: Option<u8>) -> (PositionTracker, ManualClock) {
    let clock = ManualClock::new();
    let tracker = PositionTracker::new(config(intermediate), Arc::new(clock.clone()));
    (tracker, clock)
}

/// Record of every committed position change.
fn record_commits(tracker: &PositionTracker) -> Arc<Mutex<Vec<(String, u8)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    tracker.register_callback(move |id, position| {
        sink.lock().unwrap().push((id.to_string(), position));
    });
    log
}

/// Poll a condition with a real-time budget; background finalize threads
/// finish promptly once the manual clock has been advanced past them.
fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("condition not reached within 2s");
}

#[test]
fn bare_read_defaults_to_fully_lowered() {
    let (tracker, _clock) = tracker(None);
    assert_eq!(tracker.position("1"), 0);
}

#[test]
fn lower_finalizes_to_zero_and_notifies_once() {
    let (tracker, clock) = tracker(None);
    let commits = record_commits(&tracker);

    tracker.lower("1").expect("lower");
    // Unseen shutter defaults to fully raised, so travel is the full 20s.
    clock.wait_for_sleepers(1);
    assert_eq!(tracker.position("1"), 100);

    clock.advance(Duration::from_secs(20));
    wait_until(|| commits.lock().unwrap().len() == 1);
    clock.wait_for_idle();
    assert_eq!(tracker.position("1"), 0);
    assert_eq!(*commits.lock().unwrap(), vec![("1".to_string(), 0)]);
}

#[test]
fn rise_finalizes_to_full_open() {
    let (tracker, clock) = tracker(None);
    tracker.rise("1").expect("rise");
    clock.wait_for_sleepers(1);
    clock.advance(Duration::from_secs(20));
    wait_until(|| tracker.position("1") == 100);
}

#[test]
fn superseded_finalize_never_touches_position() {
    let (tracker, clock) = tracker(None);
    let commits = record_commits(&tracker);

    tracker.lower("1").expect("lower");
    clock.wait_for_sleepers(1);

    // A stop 0s in: stationary fallback (no intermediate configured), so
    // it recommits 100 and re-registers — superseding the lower.
    tracker.stop("1").expect("stop");
    assert_eq!(tracker.position("1"), 100);

    clock.advance(Duration::from_secs(30));
    clock.wait_for_idle();
    // Give the discarded task time to have run its check.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(tracker.position("1"), 100);
    assert_eq!(*commits.lock().unwrap(), vec![("1".to_string(), 100)]);
}

#[rstest]
#[case::rise_from_closed(true, 0, 5, 25)]
#[case::rise_from_midway(true, 50, 5, 75)]
#[case::rise_clamps_at_open(true, 90, 19, 100)]
#[case::lower_from_open(false, 100, 5, 75)]
#[case::lower_from_midway(false, 40, 4, 20)]
#[case::lower_clamps_at_closed(false, 10, 19, 0)]
#[case::rise_outside_window_stays(true, 50, 25, 50)]
#[case::immediate_stop_stays(true, 50, 0, 50)]
fn stop_reconciles_position_from_elapsed_time(
    #[case] up: bool,
    #[case] start: u8,
    #[case] elapsed_s: u64,
    #[case] expected: u8,
) {
    let (tracker, clock) = tracker(None);
    tracker.set_position("1", start);
    // Partial registrations set the direction without scheduling anything.
    if up {
        tracker.rise_partial("1", 100).expect("register up");
    } else {
        tracker.lower_partial("1", 0).expect("register down");
    }
    clock.advance(Duration::from_secs(elapsed_s));
    tracker.stop("1").expect("stop");
    assert_eq!(tracker.position("1"), expected);
}

#[test]
fn unseen_stop_defaults_to_midway() {
    let (tracker, _clock) = tracker(None);
    tracker.stop("1").expect("stop");
    assert_eq!(tracker.position("1"), 50);
}

#[test]
fn double_stop_takes_the_stationary_branch() {
    let (tracker, clock) = tracker(None);

    tracker.set_position("1", 0);
    let commits = record_commits(&tracker);
    tracker.rise_partial("1", 100).expect("register up");
    clock.advance(Duration::from_secs(5));
    tracker.stop("1").expect("first stop");
    assert_eq!(tracker.position("1"), 25);

    // Direction is None now; the second stop must not recompute from
    // elapsed time no matter how the clock moves.
    clock.advance(Duration::from_secs(3));
    tracker.stop("1").expect("second stop");
    assert_eq!(tracker.position("1"), 25);
    assert_eq!(
        *commits.lock().unwrap(),
        vec![("1".to_string(), 25), ("1".to_string(), 25)]
    );
}

#[test]
fn stationary_stop_travels_to_the_intermediate_position() {
    let (tracker, clock) = tracker(Some(50));

    tracker.set_position("1", 20);
    let commits = record_commits(&tracker);
    tracker.stop("1").expect("stop");
    // Deferred: nothing committed yet, the motor is assumed moving up.
    assert_eq!(tracker.position("1"), 20);
    assert!(commits.lock().unwrap().is_empty());

    clock.wait_for_sleepers(1);
    // |20 - 50| / 100 * 20s = 6s of travel.
    clock.advance(Duration::from_secs(6));
    wait_until(|| commits.lock().unwrap().len() == 1);
    assert_eq!(tracker.position("1"), 50);
    assert_eq!(*commits.lock().unwrap(), vec![("1".to_string(), 50)]);
}

#[test]
fn stop_at_the_intermediate_position_stays_put() {
    let (tracker, clock) = tracker(Some(50));

    tracker.set_position("1", 50);
    let commits = record_commits(&tracker);
    tracker.stop("1").expect("stop");
    assert_eq!(tracker.position("1"), 50);
    assert_eq!(*commits.lock().unwrap(), vec![("1".to_string(), 50)]);
    // No deferred travel was scheduled.
    clock.advance(Duration::from_secs(60));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(tracker.position("1"), 50);
}

#[test]
fn intermediate_travel_is_superseded_like_any_other() {
    let (tracker, clock) = tracker(Some(50));
    tracker.set_position("1", 100);
    tracker.stop("1").expect("stop toward intermediate");
    clock.wait_for_sleepers(1);

    // A rise before the 10s of travel elapse owns the final position.
    tracker.rise("1").expect("rise");
    clock.advance(Duration::from_secs(30));
    clock.wait_for_idle();
    // Give the discarded task time to have run its supersede check.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(tracker.position("1"), 100);
}

#[test]
fn partial_moves_report_travel_time_and_commit_synchronously() {
    let (tracker, clock) = tracker(None);

    tracker.set_position("1", 100);
    let wait = tracker.lower_partial("1", 40).expect("lower partial");
    assert!((wait.as_secs_f32() - 12.0).abs() < 1e-3); // 60% of 20s
    tracker.set_position("1", 40);
    assert_eq!(tracker.position("1"), 40);

    let wait = tracker.rise_partial("1", 80).expect("rise partial");
    assert!((wait.as_secs_f32() - 8.0).abs() < 1e-3); // 40% of 20s

    // Out-of-range target: wait saturates instead of panicking.
    let wait = tracker.rise_partial("1", 0).expect("rise partial");
    assert_eq!(wait, Duration::ZERO);
    let _ = clock;
}

proptest! {
    /// Whatever the prior position, direction, and elapsed time, a stop
    /// always lands in [0, 100].
    #[test]
    fn stop_position_is_always_clamped(
        start in 0u8..=100,
        up in any::<bool>(),
        elapsed_s in 0u64..200,
    ) {
        let (tracker, clock) = tracker(None);
        tracker.set_position("1", start);
        if up {
            tracker.rise_partial("1", 100).expect("register up");
        } else {
            tracker.lower_partial("1", 0).expect("register down");
        }
        clock.advance(Duration::from_secs(elapsed_s));
        tracker.stop("1").expect("stop");
        prop_assert!(tracker.position("1") <= 100);
    }
}
