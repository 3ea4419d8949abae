//! Command-level orchestration: rolling codes, frame encoding, transmit.
//!
//! One controller owns the transmitter for the process. Encode-and-transmit
//! is a single critical section — the pulse generator is a hardware
//! singleton — while position bookkeeping runs outside it.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use eyre::{Report, WrapErr};
use rts_config::Config;
use rts_traits::{Clock, MonotonicClock, Transmitter};

use crate::codes::RollingCodeStore;
use crate::error::{BuildError, Result, ShutterError};
use crate::frame::{Button, Frame};
use crate::pulse::build_pulse_train;
use crate::tracker::PositionTracker;

/// Poll cadence while a submitted train drains.
const BUSY_POLL: Duration = Duration::from_millis(1);

/// Repetitions for a held button: steps the motor for tilt adjustment, and
/// a long Prog press puts the receiver into registration mode.
const LONG_PRESS_REPEAT: u32 = 35;

pub struct ShutterController {
    config: Arc<Config>,
    transmitter: Mutex<Box<dyn Transmitter + Send>>,
    codes: RollingCodeStore,
    tracker: PositionTracker,
    clock: Arc<dyn Clock + Send + Sync>,
    send_repeat: u32,
}

impl std::fmt::Debug for ShutterController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutterController")
            .field("send_repeat", &self.send_repeat)
            .finish_non_exhaustive()
    }
}

impl ShutterController {
    /// Start building a controller.
    pub fn builder() -> ShutterControllerBuilder<Missing, Missing> {
        ShutterControllerBuilder::default()
    }

    /// Lower the shutter fully. Returns once the frame is on air; the
    /// position commit to 0 happens after the estimated travel time unless
    /// a newer command supersedes it.
    pub fn lower(&self, id: &str) -> Result<()> {
        self.send_command(id, Button::Down.mask(), self.send_repeat)?;
        self.tracker.lower(id)
    }

    /// Raise the shutter fully, symmetric to [`Self::lower`].
    pub fn rise(&self, id: &str) -> Result<()> {
        self.send_command(id, Button::Up.mask(), self.send_repeat)?;
        self.tracker.rise(id)
    }

    /// Lower to `target` percent: drive down, block for the travel time,
    /// stop, and commit. Out-of-range targets are a caller contract.
    pub fn lower_partial(&self, id: &str, target: u8) -> Result<()> {
        self.send_command(id, Button::Down.mask(), self.send_repeat)?;
        let wait = self.tracker.lower_partial(id, target)?;
        self.clock.sleep(wait);
        tracing::info!(shutter = %id, target, "stopping at partial position");
        self.send_command(id, Button::Stop.mask(), self.send_repeat)?;
        self.tracker.set_position(id, target);
        Ok(())
    }

    /// Raise to `target` percent, symmetric to [`Self::lower_partial`].
    pub fn rise_partial(&self, id: &str, target: u8) -> Result<()> {
        self.send_command(id, Button::Up.mask(), self.send_repeat)?;
        let wait = self.tracker.rise_partial(id, target)?;
        self.clock.sleep(wait);
        tracing::info!(shutter = %id, target, "stopping at partial position");
        self.send_command(id, Button::Stop.mask(), self.send_repeat)?;
        self.tracker.set_position(id, target);
        Ok(())
    }

    /// Stop the shutter and reconcile the position estimate.
    pub fn stop(&self, id: &str) -> Result<()> {
        self.send_command(id, Button::Stop.mask(), self.send_repeat)?;
        self.tracker.stop(id)
    }

    /// Put the receiver into programming mode. Single frame, no position
    /// tracking.
    pub fn program(&self, id: &str) -> Result<()> {
        self.send_command(id, Button::Prog.mask(), 1)
    }

    /// Press an arbitrary button combination. A long press repeats the
    /// frame enough for the receiver to treat the button as held.
    /// No position tracking; `buttons` is masked to the defined nibble.
    pub fn press_buttons(&self, id: &str, buttons: u8, long_press: bool) -> Result<()> {
        let repetitions = if long_press { LONG_PRESS_REPEAT } else { 1 };
        self.send_command(id, buttons & 0x0F, repetitions)
    }

    /// Current position estimate for a shutter.
    pub fn position(&self, id: &str) -> u8 {
        self.tracker.position(id)
    }

    /// Invoked synchronously with (shutter id, position) on every committed
    /// position change.
    pub fn register_position_callback(&self, callback: impl Fn(&str, u8) + Send + Sync + 'static) {
        self.tracker.register_callback(callback);
    }

    /// Current rolling-code counters, for persistence by outer layers.
    pub fn rolling_codes(&self) -> HashMap<String, u16> {
        self.codes.snapshot()
    }

    fn remote_address(&self, id: &str) -> Result<u32> {
        rts_config::remote_id(id).map_err(|e| {
            Report::new(ShutterError::RemoteId {
                id: id.to_string(),
                reason: e.to_string(),
            })
        })
    }

    /// Take the next rolling code, encode, and play the train. The code
    /// advances even if the transmitter then fails: on this open-loop link
    /// a failed send is indistinguishable from an unprocessed one, and
    /// reusing a code is the one thing that desynchronizes the receiver.
    fn send_command(&self, id: &str, buttons: u8, repetitions: u32) -> Result<()> {
        let cfg = self
            .config
            .shutter(id)
            .ok_or_else(|| Report::new(ShutterError::UnknownShutter(id.to_string())))?;
        let remote = self.remote_address(id)?;

        // The whole take-code / encode / transmit sequence is one critical
        // section: codes must reach the air in the order they were taken.
        let mut transmitter = self
            .transmitter
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let code = self.codes.next_code(id)?;

        tracing::info!(
            shutter = %cfg.name,
            remote = format_args!("{remote:#08x}"),
            buttons = format_args!("{buttons:#x}"),
            code,
            repetitions,
            "sending frame"
        );
        let frame = Frame::encode(remote, buttons, code);
        let train = build_pulse_train(&frame, repetitions);
        let handle = transmitter
            .submit(&train)
            .map_err(|e| Report::new(map_tx_error_dyn(&*e)))
            .wrap_err("submitting pulse train")?;
        loop {
            let busy = transmitter
                .is_busy(handle)
                .map_err(|e| Report::new(map_tx_error_dyn(&*e)))
                .wrap_err("polling transmitter")?;
            if !busy {
                break;
            }
            self.clock.sleep(BUSY_POLL);
        }
        transmitter
            .release(handle)
            .map_err(|e| Report::new(map_tx_error_dyn(&*e)))
            .wrap_err("releasing pulse train")?;
        Ok(())
    }
}

// Map any error to a typed ShutterError, with special handling for backend
// hardware errors.
fn map_tx_error_dyn(e: &(dyn std::error::Error + 'static)) -> ShutterError {
    #[cfg(feature = "hardware-errors")]
    if let Some(hw) = e.downcast_ref::<rts_hardware::HwError>() {
        use rts_hardware::HwError;
        return match hw {
            HwError::Unavailable(detail) => ShutterError::Unavailable(detail.clone()),
            other => ShutterError::TransmitterFault(other.to_string()),
        };
    }
    ShutterError::Transmitter(e.to_string())
}

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

/// Builder for `ShutterController`. Validated on `build()`.
pub struct ShutterControllerBuilder<T, C> {
    transmitter: Option<Box<dyn Transmitter + Send>>,
    config: Option<Arc<Config>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    send_repeat: Option<u32>,
    _t: PhantomData<T>,
    _c: PhantomData<C>,
}

impl Default for ShutterControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            transmitter: None,
            config: None,
            clock: None,
            send_repeat: None,
            _t: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<T, C> ShutterControllerBuilder<T, C> {
    /// Fallible build available in any type-state; returns a detailed
    /// BuildError for missing pieces.
    pub fn try_build(self) -> Result<ShutterController> {
        let ShutterControllerBuilder {
            transmitter,
            config,
            clock,
            send_repeat,
            _t: _,
            _c: _,
        } = self;

        let transmitter =
            transmitter.ok_or_else(|| Report::new(BuildError::MissingTransmitter))?;
        let config = config.ok_or_else(|| Report::new(BuildError::MissingConfig))?;

        let send_repeat = send_repeat.unwrap_or(config.send_repeat);
        if send_repeat == 0 {
            return Err(Report::new(BuildError::InvalidConfig(
                "send_repeat must be >= 1",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        let codes = RollingCodeStore::new(
            config
                .shutters
                .iter()
                .map(|(id, shutter)| (id.clone(), shutter.code)),
        );
        let tracker = PositionTracker::new(config.clone(), clock.clone());

        Ok(ShutterController {
            config,
            transmitter: Mutex::new(transmitter),
            codes,
            tracker,
            clock,
            send_repeat,
        })
    }

    /// Override the frame repetition count from the configuration.
    pub fn with_send_repeat(mut self, repeat: u32) -> Self {
        self.send_repeat = Some(repeat);
        self
    }

    /// Provide a custom clock implementation; defaults to MonotonicClock.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state when providing mandatory components
impl<C> ShutterControllerBuilder<Missing, C> {
    pub fn with_transmitter(
        self,
        transmitter: impl Transmitter + Send + 'static,
    ) -> ShutterControllerBuilder<Set, C> {
        let ShutterControllerBuilder {
            transmitter: _,
            config,
            clock,
            send_repeat,
            _t: _,
            _c: _,
        } = self;
        ShutterControllerBuilder {
            transmitter: Some(Box::new(transmitter)),
            config,
            clock,
            send_repeat,
            _t: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<T> ShutterControllerBuilder<T, Missing> {
    pub fn with_config(self, config: Config) -> ShutterControllerBuilder<T, Set> {
        let ShutterControllerBuilder {
            transmitter,
            config: _,
            clock,
            send_repeat,
            _t: _,
            _c: _,
        } = self;
        ShutterControllerBuilder {
            transmitter,
            config: Some(Arc::new(config)),
            clock,
            send_repeat,
            _t: PhantomData,
            _c: PhantomData,
        }
    }
}

impl ShutterControllerBuilder<Set, Set> {
    /// Validate and build. Only available once transmitter and config are
    /// set.
    pub fn build(self) -> Result<ShutterController> {
        self.try_build()
    }
}
