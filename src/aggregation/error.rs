use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Window size must be a positive number of seconds")]
    ZeroWindowSize,

    #[error("Retention must keep at least one window")]
    ZeroRetention,
}
