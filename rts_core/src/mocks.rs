//! Test and helper mocks for rts_core.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rts_traits::{Clock, Pulse, TrainHandle, Transmitter};

/// Transmitter that records every submitted train instead of keying RF.
///
/// `is_busy` reports busy for a configurable number of polls per train so
/// the busy-wait path in the controller is exercised.
pub struct MockTransmitter {
    trains: Arc<Mutex<Vec<Vec<Pulse>>>>,
    busy_polls_per_train: u32,
    pending_polls: u32,
    next_handle: u32,
    connected: bool,
    pin: Option<u8>,
}

impl Default for MockTransmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransmitter {
    pub fn new() -> Self {
        Self {
            trains: Arc::new(Mutex::new(Vec::new())),
            busy_polls_per_train: 0,
            pending_polls: 0,
            next_handle: 0,
            connected: false,
            pin: None,
        }
    }

    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls_per_train = polls;
        self
    }

    /// Shared handle to the recorded trains; keep a clone before moving the
    /// transmitter into a controller.
    pub fn trains(&self) -> Arc<Mutex<Vec<Vec<Pulse>>>> {
        self.trains.clone()
    }
}

impl Transmitter for MockTransmitter {
    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.connected = false;
        Ok(())
    }

    fn set_output_pin(
        &mut self,
        pin: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin = Some(pin);
        Ok(())
    }

    fn submit(
        &mut self,
        pulses: &[Pulse],
    ) -> Result<TrainHandle, Box<dyn std::error::Error + Send + Sync>> {
        self.trains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pulses.to_vec());
        self.pending_polls = self.busy_polls_per_train;
        let handle = TrainHandle(self.next_handle);
        self.next_handle += 1;
        Ok(handle)
    }

    fn is_busy(
        &mut self,
        _handle: TrainHandle,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        if self.pending_polls > 0 {
            self.pending_polls -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn release(
        &mut self,
        _handle: TrainHandle,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

struct ManualClockState {
    offset: Duration,
    sleepers: usize,
}

/// Deterministic clock for time-travel tests.
///
/// `sleep` parks the calling thread until `advance` has moved the clock
/// past its deadline. `wait_for_sleepers`/`wait_for_idle` let a test
/// synchronize with background tasks without real-time races.
#[derive(Clone)]
pub struct ManualClock {
    origin: Instant,
    inner: Arc<(Mutex<ManualClockState>, Condvar)>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            inner: Arc::new((
                Mutex::new(ManualClockState {
                    offset: Duration::ZERO,
                    sleepers: 0,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Advance the clock, waking any sleeper whose deadline has passed.
    pub fn advance(&self, d: Duration) {
        let (lock, condvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        state.offset = state.offset.saturating_add(d);
        condvar.notify_all();
    }

    /// Block until at least `n` threads are parked in `sleep`.
    pub fn wait_for_sleepers(&self, n: usize) {
        let (lock, condvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while state.sleepers < n {
            state = condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until no thread is parked in `sleep` anymore.
    pub fn wait_for_idle(&self) {
        let (lock, condvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while state.sleepers > 0 {
            state = condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let (lock, _) = &*self.inner;
        let offset = lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offset;
        self.origin + offset
    }

    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        let (lock, condvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = state.offset + d;
        state.sleepers += 1;
        condvar.notify_all();
        while state.offset < deadline {
            state = condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.sleepers -= 1;
        condvar.notify_all();
    }
}
