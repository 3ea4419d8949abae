#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core Somfy RTS control logic (hardware-agnostic).
//!
//! This crate encodes RTS frames, expands them into microsecond pulse
//! trains, and tracks shutter position from commanded direction and elapsed
//! time. All hardware interaction goes through `rts_traits::Transmitter`.
//!
//! ## Architecture
//!
//! - **Frame encoding**: key byte, button nibble, rolling code, remote
//!   address, XOR-fold checksum, obfuscation chain (`frame` module)
//! - **Pulse trains**: wake-up, sync, Manchester payload, inter-frame gaps
//!   with exact air-format timings (`pulse` module)
//! - **Position tracking**: optimistic duration-based estimation with
//!   deferred finalization and a supersede rule (`tracker` module)
//! - **Rolling codes**: per-remote counters, increment-on-use (`codes`)
//! - **Orchestration**: command verbs over a mutex-guarded transmitter
//!   (`controller` module)
//!
//! The link is open-loop one-way RF: nothing here confirms receipt, and
//! nothing retries. A retry would advance the rolling code a second time
//! and desynchronize the physical receiver.

// Module declarations
pub mod codes;
pub mod controller;
pub mod error;
pub mod frame;
pub mod mocks;
pub mod pulse;
pub mod tracker;

pub use codes::RollingCodeStore;
pub use controller::{ShutterController, ShutterControllerBuilder};
pub use error::{BuildError, Result, ShutterError};
pub use frame::{Button, Frame};
pub use pulse::{build_pulse_train, train_duration};
pub use tracker::{Direction, PositionTracker};
