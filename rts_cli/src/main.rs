use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Command, FILE_GUARD};
use rts_core::ShutterController;
use rts_traits::Transmitter;

#[cfg(not(feature = "hardware"))]
fn make_transmitter() -> rts_hardware::SimulatedTransmitter {
    rts_hardware::SimulatedTransmitter::new()
}

#[cfg(feature = "hardware")]
fn make_transmitter() -> rts_hardware::HardwareTransmitter {
    rts_hardware::HardwareTransmitter::new()
}

fn init_tracing(level: &str, file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if let Some(path) = file {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("opening log file {}", path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        let _ = FILE_GUARD.set(guard);
        builder.with_writer(writer).with_ansi(false).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let content = fs::read_to_string(&args.config)
        .wrap_err_with(|| format!("reading config {}", args.config.display()))?;
    let config = rts_config::load_toml(&content).wrap_err("parsing config TOML")?;
    config.validate().wrap_err("validating config")?;

    // CLI flags win over the [logging] table.
    let level = args
        .log_level
        .clone()
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let log_file = args
        .log_file
        .clone()
        .or_else(|| config.logging.file.clone().map(Into::into));
    init_tracing(&level, log_file.as_deref())?;

    let mut transmitter = make_transmitter();
    transmitter
        .connect()
        .map_err(|e| eyre::eyre!("transmission backend unavailable: {e}"))?;
    transmitter
        .set_output_pin(config.tx_pin)
        .map_err(|e| eyre::eyre!("configuring tx pin {}: {e}", config.tx_pin))?;

    let mut builder = ShutterController::builder()
        .with_transmitter(transmitter)
        .with_config(config.clone());
    if let Some(repeat) = args.repeat {
        builder = builder.with_send_repeat(repeat);
    }
    let controller = builder.build()?;

    let id = args.command.shutter_id().to_string();
    tracing::debug!(command = ?args.command, "dispatching");
    match &args.command {
        Command::Lower { .. } => controller.lower(&id)?,
        Command::Rise { .. } => controller.rise(&id)?,
        Command::Stop { .. } => controller.stop(&id)?,
        Command::LowerPartial { target, .. } => controller.lower_partial(&id, *target)?,
        Command::RisePartial { target, .. } => controller.rise_partial(&id, *target)?,
        Command::Program { .. } => controller.program(&id)?,
        Command::Position { .. } => {}
    }

    // Deferred position commits land in a background task; ride out the
    // worst-case travel time when asked to report the settled estimate.
    if args.wait
        && matches!(
            args.command,
            Command::Lower { .. } | Command::Rise { .. } | Command::Stop { .. }
        )
        && let Some(shutter) = config.shutter(&id)
    {
        let travel = shutter.duration_down.max(shutter.duration_up);
        std::thread::sleep(Duration::from_secs_f32(travel) + Duration::from_millis(500));
    }

    let position = controller.position(&id);
    if args.json {
        println!(
            "{}",
            serde_json::json!({ "id": id, "position": position })
        );
    } else {
        println!("position: {position}");
    }
    Ok(())
}
