//! Rolling-code bookkeeping.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use eyre::Report;

use crate::error::{Result, ShutterError};

/// Per-remote rolling-code counters, seeded from configuration.
///
/// The counter advances on every take, whether or not the frame later makes
/// it to air. The receiver only stays in lockstep if the remote never
/// reuses a code, and on this one-way link a lost transmission cannot be
/// told apart from one the receiver ignored — so a failed send is never
/// rolled back or retried.
pub struct RollingCodeStore {
    codes: Mutex<HashMap<String, u16>>,
}

impl RollingCodeStore {
    pub fn new(seed: impl IntoIterator<Item = (String, u16)>) -> Self {
        Self {
            codes: Mutex::new(seed.into_iter().collect()),
        }
    }

    /// Return the code to embed in the next frame and advance the stored
    /// counter by one.
    ///
    /// Wrapping past `u16::MAX` is undefined at the link layer: receivers
    /// resynchronize only within a bounded window, so callers must not run
    /// the counter off the end of the configured bit width in practice.
    pub fn next_code(&self, id: &str) -> Result<u16> {
        let mut codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = codes
            .get_mut(id)
            .ok_or_else(|| Report::new(ShutterError::UnknownShutter(id.to_string())))?;
        let code = *slot;
        *slot = slot.wrapping_add(1);
        Ok(code)
    }

    /// Snapshot of the current counters, for persistence by outer layers.
    pub fn snapshot(&self) -> HashMap<String, u16> {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
