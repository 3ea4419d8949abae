use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("transmitter unavailable: {0}")]
    Unavailable(String),
    #[error("no output pin configured")]
    NoOutputPin,
    #[error("a pulse train is already in flight")]
    Busy,
    #[error("unknown train handle {0}")]
    UnknownHandle(u32),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
