pub mod config;
pub mod error;
pub mod timeframe;
pub mod types;

pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use timeframe::Timeframe;
pub use types::*;
