//! Incremental indicator engines (§4.4–§4.8): pure in-memory transforms
//! over ascending candle slices. Each engine reads prior state, folds the
//! bars the caller hands it, writes the resulting value onto every bar it
//! touched, and returns the advanced state. No engine here talks to a
//! store — `candle-store` owns persistence; `ingestion-scheduler` and
//! `bootstrap-loader` wire the two together.

pub mod aggregator;
pub mod avwap;
pub mod ema;
pub mod rsi;
pub mod vwap;

pub use aggregator::aggregate;
pub use avwap::AvwapEngine;
pub use ema::EmaEngine;
pub use rsi::RsiEngine;
pub use vwap::{VwapEngine, VwapMode};
