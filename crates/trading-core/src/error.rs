use thiserror::Error;

/// Error taxonomy for the ingestion core. Each variant carries its own
/// propagation policy — see the component that raises it for the exact
/// handling (vendor client, candle store, indicator/alert engines).
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("vendor transient error: {0}")]
    VendorTransient(String),

    #[error("vendor permanent error: {0}")]
    VendorPermanent(String),

    #[error("no API credits available: {0}")]
    NoCredits(String),

    #[error("invalid upstream data: {0}")]
    DataInvalid(String),

    #[error("unsupported timeframe: {0}")]
    Unsupported(String),

    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("state inconsistency: {0}")]
    StateInconsistency(String),

    #[error("bootstrap failure: {0}")]
    BootstrapFailure(String),
}

pub type IngestResult<T> = Result<T, IngestError>;
