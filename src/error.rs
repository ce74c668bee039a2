use thiserror::Error;

// Unified error type for pfasst

#[derive(Error, Debug)]
pub enum PfasstError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("solve error: {0}")]
    Solve(String),
    #[error("communication error: {0}")]
    Comm(String),
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error("internal state error: {0}")]
    Internal(&'static str),
}
