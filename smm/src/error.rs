use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmmError {
    #[error("venue error: {0}")]
    Gate(#[from] gateio::GateError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("order log error: {0}")]
    OrderLog(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SmmError>;
