use thiserror::Error;

#[derive(Error, Debug)]
pub enum OsbfError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("bucket table is full")]
    FullTable,

    #[error("operation attempted on a closed class")]
    ClosedClass,

    #[error("operation requires write access, class was opened {0:?}")]
    Usage(crate::config::Usage),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, OsbfError>;
