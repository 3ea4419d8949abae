//! Transmission backends for the RTS control stack.
//!
//! `SimulatedTransmitter` is the default: it accepts trains and reports
//! busy for their on-air duration without touching any pin. The `hardware`
//! feature adds a Raspberry Pi GPIO backend (`rppal`, Linux only).

pub mod error;
pub mod util;

pub use error::HwError;

use std::time::Instant;

use rts_traits::{Pulse, TrainHandle, Transmitter};

fn train_width_us(pulses: &[Pulse]) -> u64 {
    pulses.iter().map(|p| u64::from(p.width_us)).sum()
}

/// Simulated transmission backend: plays trains against the wall clock.
pub struct SimulatedTransmitter {
    connected: bool,
    pin: Option<u8>,
    next_handle: u32,
    in_flight: Option<(TrainHandle, Instant)>,
}

impl Default for SimulatedTransmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransmitter {
    pub fn new() -> Self {
        Self {
            connected: false,
            pin: None,
            next_handle: 0,
            in_flight: None,
        }
    }

    fn boxed<T>(err: HwError) -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(err))
    }
}

impl Transmitter for SimulatedTransmitter {
    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.connected = true;
        tracing::info!("simulated transmitter connected");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.connected = false;
        self.in_flight = None;
        Ok(())
    }

    fn set_output_pin(
        &mut self,
        pin: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.connected {
            return Self::boxed(HwError::Unavailable("not connected".into()));
        }
        tracing::debug!(pin, "simulated output pin configured");
        self.pin = Some(pin);
        Ok(())
    }

    fn submit(
        &mut self,
        pulses: &[Pulse],
    ) -> Result<TrainHandle, Box<dyn std::error::Error + Send + Sync>> {
        if !self.connected {
            return Self::boxed(HwError::Unavailable("not connected".into()));
        }
        if self.pin.is_none() {
            return Self::boxed(HwError::NoOutputPin);
        }
        if self.in_flight.is_some() {
            return Self::boxed(HwError::Busy);
        }
        let width_us = train_width_us(pulses);
        let done_at = Instant::now() + std::time::Duration::from_micros(width_us);
        let handle = TrainHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.in_flight = Some((handle, done_at));
        tracing::debug!(pulses = pulses.len(), width_us, "train submitted (simulated)");
        Ok(handle)
    }

    fn is_busy(
        &mut self,
        handle: TrainHandle,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        match self.in_flight {
            Some((h, done_at)) if h == handle => Ok(Instant::now() < done_at),
            _ => Self::boxed(HwError::UnknownHandle(handle.0)),
        }
    }

    fn release(
        &mut self,
        handle: TrainHandle,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match self.in_flight {
            Some((h, _)) if h == handle => {
                self.in_flight = None;
                Ok(())
            }
            _ => Self::boxed(HwError::UnknownHandle(handle.0)),
        }
    }
}

#[cfg(feature = "hardware")]
pub use gpio::HardwareTransmitter;

#[cfg(feature = "hardware")]
mod gpio {
    use super::*;
    use crate::util::hold_for;
    use rppal::gpio::{Gpio, OutputPin};
    use std::time::Duration;

    /// Raspberry Pi GPIO backend. Trains play synchronously on `submit`
    /// (software-timed bit banging), so `is_busy` is immediately false.
    pub struct HardwareTransmitter {
        gpio: Option<Gpio>,
        output: Option<OutputPin>,
        next_handle: u32,
        last_handle: Option<TrainHandle>,
    }

    impl Default for HardwareTransmitter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl HardwareTransmitter {
        pub fn new() -> Self {
            Self {
                gpio: None,
                output: None,
                next_handle: 0,
                last_handle: None,
            }
        }
    }

    impl Transmitter for HardwareTransmitter {
        fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let gpio = Gpio::new().map_err(|e| HwError::Unavailable(e.to_string()))?;
            self.gpio = Some(gpio);
            tracing::info!("gpio transmitter connected");
            Ok(())
        }

        fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.output = None;
            self.gpio = None;
            Ok(())
        }

        fn set_output_pin(
            &mut self,
            pin: u8,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let gpio = self
                .gpio
                .as_ref()
                .ok_or_else(|| HwError::Unavailable("not connected".into()))?;
            let output = gpio
                .get(pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            tracing::info!(pin, "gpio output pin configured");
            self.output = Some(output);
            Ok(())
        }

        fn submit(
            &mut self,
            pulses: &[Pulse],
        ) -> Result<TrainHandle, Box<dyn std::error::Error + Send + Sync>> {
            let output = self.output.as_mut().ok_or(HwError::NoOutputPin)?;
            tracing::debug!(pulses = pulses.len(), "playing train on gpio");
            for pulse in pulses {
                if pulse.active {
                    output.set_high();
                } else {
                    output.set_low();
                }
                hold_for(Duration::from_micros(u64::from(pulse.width_us)));
            }
            output.set_low();
            let handle = TrainHandle(self.next_handle);
            self.next_handle = self.next_handle.wrapping_add(1);
            self.last_handle = Some(handle);
            Ok(handle)
        }

        fn is_busy(
            &mut self,
            _handle: TrainHandle,
        ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            // Playback is synchronous; by the time submit returns the air
            // is quiet again.
            Ok(false)
        }

        fn release(
            &mut self,
            handle: TrainHandle,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            match self.last_handle {
                Some(h) if h == handle => {
                    self.last_handle = None;
                    Ok(())
                }
                _ => Err(Box::new(HwError::UnknownHandle(handle.0))),
            }
        }
    }
}
