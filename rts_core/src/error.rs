use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ShutterError {
    #[error("transmitter error: {0}")]
    Transmitter(String),
    #[error("transmitter fault: {0}")]
    TransmitterFault(String),
    #[error("transmitter unavailable: {0}")]
    Unavailable(String),
    #[error("unknown shutter id: {0}")]
    UnknownShutter(String),
    #[error("invalid remote id {id:?}: {reason}")]
    RemoteId { id: String, reason: String },
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transmitter")]
    MissingTransmitter,
    #[error("missing configuration")]
    MissingConfig,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
