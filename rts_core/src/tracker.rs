//! Duration-based shutter position estimation.
//!
//! Position is tracked optimistically: the tracker assumes a commanded move
//! completes, and reconciles when a stop or a newer command arrives before
//! the estimated travel time has elapsed. 0 is fully lowered, 100 fully
//! raised. The physical link gives no feedback, so everything here is an
//! estimate committed on a timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use eyre::Report;
use rts_config::{Config, ShutterCfg};
use rts_traits::Clock;

use crate::error::{Result, ShutterError};

/// Direction of the most recent motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy)]
struct ShutterState {
    /// Estimated position, always in [0, 100].
    position: u8,
    /// Monotonic timestamp of the last state-mutating command. Deferred
    /// finalize tasks snapshot this to detect being superseded.
    last_command_at: Instant,
    /// `None` once stationary (after a settled stop).
    last_direction: Option<Direction>,
}

impl ShutterState {
    fn new(position: u8, now: Instant) -> Self {
        Self {
            position: position.min(100),
            last_command_at: now,
            last_direction: None,
        }
    }

    fn register(&mut self, direction: Option<Direction>, now: Instant) {
        self.last_direction = direction;
        self.last_command_at = now;
    }
}

type PositionCallback = Box<dyn Fn(&str, u8) + Send + Sync>;

struct TrackerShared {
    config: Arc<Config>,
    clock: Arc<dyn Clock + Send + Sync>,
    states: Mutex<HashMap<String, ShutterState>>,
    callbacks: Mutex<Vec<PositionCallback>>,
}

/// Per-shutter position state machine.
///
/// Clones share one registry; deferred finalize tasks hold a clone. States
/// are created lazily on first access with a default that depends on the
/// calling operation (100 before a lower, 0 before a rise, 50 before a
/// stop, 0 for bare reads) and live for the process lifetime.
#[derive(Clone)]
pub struct PositionTracker {
    shared: Arc<TrackerShared>,
}

/// What a stop press resolved to while the registry lock was held.
enum StopOutcome {
    Commit(u8),
    Deferred {
        target: u8,
        wait: Duration,
        snapshot: Instant,
    },
}

impl PositionTracker {
    pub fn new(config: Arc<Config>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                config,
                clock,
                states: Mutex::new(HashMap::new()),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, ShutterState>> {
        self.shared
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn shutter_cfg(&self, id: &str) -> Result<ShutterCfg> {
        self.shared
            .config
            .shutter(id)
            .cloned()
            .ok_or_else(|| Report::new(ShutterError::UnknownShutter(id.to_string())))
    }

    /// Current position estimate. Unseen shutters read as fully lowered.
    pub fn position(&self, id: &str) -> u8 {
        let now = self.shared.clock.now();
        let mut states = self.lock_states();
        states
            .entry(id.to_string())
            .or_insert_with(|| ShutterState::new(0, now))
            .position
    }

    /// Invoked synchronously with (shutter id, new position) on every
    /// committed position change.
    pub fn register_callback(&self, callback: impl Fn(&str, u8) + Send + Sync + 'static) {
        self.shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// Commit a position and notify observers. Callbacks run outside the
    /// registry lock.
    pub fn set_position(&self, id: &str, position: u8) {
        let position = position.min(100);
        {
            let now = self.shared.clock.now();
            let mut states = self.lock_states();
            states
                .entry(id.to_string())
                .or_insert_with(|| ShutterState::new(position, now))
                .position = position;
        }
        tracing::info!(shutter = %id, position, "position committed");
        let callbacks = self
            .shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            callback(id, position);
        }
    }

    /// Register a full lower. Finalizes to 0 after the estimated travel
    /// time unless a newer command supersedes the wait.
    pub fn lower(&self, id: &str) -> Result<()> {
        let cfg = self.shutter_cfg(id)?;
        let (wait, snapshot) = {
            let now = self.shared.clock.now();
            let mut states = self.lock_states();
            let state = states
                .entry(id.to_string())
                .or_insert_with(|| ShutterState::new(100, now));
            state.register(Some(Direction::Down), now);
            (
                travel_time(f32::from(state.position), cfg.duration_down),
                state.last_command_at,
            )
        };
        tracing::info!(shutter = %id, name = %cfg.name, "going down");
        self.schedule_finalize(id, wait, 0, snapshot);
        Ok(())
    }

    /// Register a full rise. Finalizes to 100, symmetric to [`Self::lower`].
    pub fn rise(&self, id: &str) -> Result<()> {
        let cfg = self.shutter_cfg(id)?;
        let (wait, snapshot) = {
            let now = self.shared.clock.now();
            let mut states = self.lock_states();
            let state = states
                .entry(id.to_string())
                .or_insert_with(|| ShutterState::new(0, now));
            state.register(Some(Direction::Up), now);
            (
                travel_time(f32::from(100 - state.position.min(100)), cfg.duration_up),
                state.last_command_at,
            )
        };
        tracing::info!(shutter = %id, name = %cfg.name, "going up");
        self.schedule_finalize(id, wait, 100, snapshot);
        Ok(())
    }

    /// Register a partial lower and return how long the caller must keep
    /// the motor running before issuing the stop. Targets past the current
    /// position are a caller contract; the wait saturates at zero.
    pub fn lower_partial(&self, id: &str, target: u8) -> Result<Duration> {
        let cfg = self.shutter_cfg(id)?;
        let now = self.shared.clock.now();
        let mut states = self.lock_states();
        let state = states
            .entry(id.to_string())
            .or_insert_with(|| ShutterState::new(100, now));
        state.register(Some(Direction::Down), now);
        Ok(travel_time(
            f32::from(state.position) - f32::from(target),
            cfg.duration_down,
        ))
    }

    /// Partial-rise counterpart of [`Self::lower_partial`].
    pub fn rise_partial(&self, id: &str, target: u8) -> Result<Duration> {
        let cfg = self.shutter_cfg(id)?;
        let now = self.shared.clock.now();
        let mut states = self.lock_states();
        let state = states
            .entry(id.to_string())
            .or_insert_with(|| ShutterState::new(0, now));
        state.register(Some(Direction::Up), now);
        Ok(travel_time(
            f32::from(target) - f32::from(state.position),
            cfg.duration_up,
        ))
    }

    /// Reconcile position after a stop press.
    ///
    /// Within the valid travel window the new position is computed from
    /// elapsed time and the previous direction. Outside it — stationary
    /// stops included — the motor is assumed to be heading for its
    /// configured intermediate stop, and the commit is deferred until that
    /// travel would finish.
    pub fn stop(&self, id: &str) -> Result<()> {
        let cfg = self.shutter_cfg(id)?;
        let outcome = {
            let now = self.shared.clock.now();
            let mut states = self.lock_states();
            let state = states
                .entry(id.to_string())
                .or_insert_with(|| ShutterState::new(50, now));

            let elapsed = now
                .saturating_duration_since(state.last_command_at)
                .as_secs_f32()
                .round();
            tracing::debug!(
                shutter = %id,
                position = state.position,
                elapsed_s = elapsed,
                direction = ?state.last_direction,
                "stop pressed"
            );

            let computed = match state.last_direction {
                Some(Direction::Up) if elapsed > 0.0 && elapsed < cfg.duration_up => {
                    let pct = (elapsed / cfg.duration_up * 100.0).round() as i32;
                    let position = i32::from(state.position);
                    Some(if position > 0 {
                        (position + pct).min(100)
                    } else {
                        pct.min(100)
                    })
                }
                Some(Direction::Down) if elapsed > 0.0 && elapsed < cfg.duration_down => {
                    let pct = (elapsed / cfg.duration_down * 100.0).round() as i32;
                    let position = i32::from(state.position);
                    Some(if position < 100 {
                        (position - pct).max(0)
                    } else {
                        (100 - pct).max(0)
                    })
                }
                _ => None,
            };

            match computed {
                Some(new_position) => StopOutcome::Commit(new_position as u8),
                None => match cfg.intermediate_position {
                    // The motor holds its intermediate stop on a stationary
                    // press; without one (or already there) nothing moves.
                    Some(target) if target.min(100) != state.position => {
                        let target = target.min(100);
                        let (direction, duration) = if state.position > target {
                            (Direction::Down, cfg.duration_down)
                        } else {
                            (Direction::Up, cfg.duration_up)
                        };
                        state.register(Some(direction), now);
                        let span = f32::from(state.position.abs_diff(target));
                        StopOutcome::Deferred {
                            target,
                            wait: travel_time(span, duration),
                            snapshot: state.last_command_at,
                        }
                    }
                    _ => {
                        tracing::info!(shutter = %id, "stop while stationary, keeping position");
                        StopOutcome::Commit(state.position)
                    }
                },
            }
        };

        match outcome {
            StopOutcome::Commit(position) => {
                self.set_position(id, position);
                // Register after the commit so the elapsed-time math above
                // saw the previous direction and timestamp.
                let now = self.shared.clock.now();
                let mut states = self.lock_states();
                if let Some(state) = states.get_mut(id) {
                    state.register(None, now);
                }
            }
            StopOutcome::Deferred {
                target,
                wait,
                snapshot,
            } => {
                tracing::info!(
                    shutter = %id,
                    target,
                    "expecting travel to the intermediate stop"
                );
                self.schedule_finalize(id, wait, target, snapshot);
            }
        }
        Ok(())
    }

    /// Spawn the deferred finalize task for an in-flight travel.
    ///
    /// The task sleeps out the estimated travel time and then commits the
    /// target position only if no newer command registered in between.
    /// Superseded tasks run to completion and discard their result; there
    /// is deliberately no cancellation.
    fn schedule_finalize(&self, id: &str, wait: Duration, target: u8, snapshot: Instant) {
        let tracker = self.clone();
        let id = id.to_string();
        thread::spawn(move || {
            tracing::debug!(
                shutter = %id,
                wait_s = wait.as_secs_f32(),
                target,
                "waiting for travel to finish"
            );
            tracker.shared.clock.sleep(wait);

            let unchanged = {
                let states = tracker.lock_states();
                states
                    .get(&id)
                    .is_some_and(|s| s.last_command_at == snapshot)
            };
            if unchanged {
                tracing::info!(shutter = %id, position = target, "travel finished");
                tracker.set_position(&id, target);
            } else {
                tracing::info!(
                    shutter = %id,
                    "discarding final position, a newer command took over"
                );
            }
        });
    }
}

/// Seconds to traverse `span_pct` percent of travel given the full-travel
/// duration. Negative spans (out-of-range partial targets) saturate to zero.
fn travel_time(span_pct: f32, full_travel_s: f32) -> Duration {
    let seconds = (span_pct.max(0.0) / 100.0) * full_travel_s;
    Duration::from_secs_f32(seconds.max(0.0))
}
