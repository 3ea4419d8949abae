#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and validation for the RTS shutter control stack.
//!
//! The `Config` struct is deserialized from TOML and validated before any
//! component is built. Shutter ids are hexadecimal strings that double as
//! the 24-bit remote address embedded in every frame.
use serde::Deserialize;
use std::collections::HashMap;

/// Widest remote address the 3 address octets of a frame can carry.
pub const MAX_REMOTE_ID: u32 = 0x00FF_FFFF;

/// One shutter as the operator configured it.
#[derive(Debug, Deserialize, Clone)]
pub struct ShutterCfg {
    pub name: String,
    /// Full travel time from open to closed, in seconds.
    pub duration_down: f32,
    /// Full travel time from closed to open, in seconds.
    pub duration_up: f32,
    /// Operator-chosen resting percentage reached by a stop press while
    /// stationary. Absent means the motor has no intermediate stop set.
    #[serde(default)]
    pub intermediate_position: Option<u8>,
    /// Current rolling-code counter for this remote identity.
    pub code: u16,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// GPIO driving the 433.42 MHz emitter.
    pub tx_pin: u8,
    /// Frame repetitions per command send.
    pub send_repeat: u32,
    #[serde(default)]
    pub logging: Logging,
    /// Keyed by hex shutter id; the key is also the remote address.
    pub shutters: HashMap<String, ShutterCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Parse a shutter id as the 24-bit remote address it doubles as.
pub fn remote_id(id: &str) -> eyre::Result<u32> {
    let addr = u32::from_str_radix(id, 16)
        .map_err(|e| eyre::eyre!("shutter id {id:?} is not a hex address: {e}"))?;
    if addr > MAX_REMOTE_ID {
        eyre::bail!("shutter id {id:?} exceeds the 24-bit remote address space");
    }
    Ok(addr)
}

impl Config {
    pub fn shutter(&self, id: &str) -> Option<&ShutterCfg> {
        self.shutters.get(id)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.send_repeat == 0 {
            eyre::bail!("send_repeat must be >= 1");
        }
        if self.shutters.is_empty() {
            eyre::bail!("at least one [shutters.<id>] entry is required");
        }
        for (id, shutter) in &self.shutters {
            remote_id(id)?;
            if !shutter.duration_down.is_finite() || shutter.duration_down <= 0.0 {
                eyre::bail!("shutters.{id}.duration_down must be a positive number of seconds");
            }
            if !shutter.duration_up.is_finite() || shutter.duration_up <= 0.0 {
                eyre::bail!("shutters.{id}.duration_up must be a positive number of seconds");
            }
            if shutter.duration_down > 600.0 || shutter.duration_up > 600.0 {
                eyre::bail!("shutters.{id} travel time is unreasonably large (>10min)");
            }
            if let Some(pct) = shutter.intermediate_position
                && pct > 100
            {
                eyre::bail!("shutters.{id}.intermediate_position must be in [0, 100]");
            }
            if shutter.name.is_empty() {
                eyre::bail!("shutters.{id}.name must not be empty");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_id_parses_hex_and_rejects_wide_addresses() {
        assert_eq!(remote_id("1").unwrap(), 0x1);
        assert_eq!(remote_id("12ab").unwrap(), 0x12AB);
        assert_eq!(remote_id("ffffff").unwrap(), MAX_REMOTE_ID);
        assert!(remote_id("1000000").is_err());
        assert!(remote_id("kitchen").is_err());
    }
}
