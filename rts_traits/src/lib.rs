pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// A single timed output level on the TX pin.
///
/// `active` keys the RF carrier; `width_us` is how long the level is held
/// before the next pulse takes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub active: bool,
    pub width_us: u32,
}

impl Pulse {
    #[inline]
    pub const fn active(width_us: u32) -> Self {
        Self {
            active: true,
            width_us,
        }
    }

    #[inline]
    pub const fn idle(width_us: u32) -> Self {
        Self {
            active: false,
            width_us,
        }
    }
}

/// Opaque handle to a pulse train accepted by a transmission backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrainHandle(pub u32);

/// Pulse-level transmission backend.
///
/// Backends own the pin and the waveform generator. A submitted train plays
/// out asynchronously; callers poll `is_busy` and must `release` the handle
/// once the train has drained. Only one train may be in flight at a time.
pub trait Transmitter {
    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Configure the given pin as the pulse output. Must be called after
    /// `connect` and before the first `submit`.
    fn set_output_pin(&mut self, pin: u8)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn submit(
        &mut self,
        pulses: &[Pulse],
    ) -> Result<TrainHandle, Box<dyn std::error::Error + Send + Sync>>;

    fn is_busy(
        &mut self,
        handle: TrainHandle,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    fn release(
        &mut self,
        handle: TrainHandle,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
