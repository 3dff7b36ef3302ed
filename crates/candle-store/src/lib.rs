mod alerts;
mod avwap;
mod candles;
mod credentials;
mod db;
mod ema;
mod notifications;
mod rsi;
mod timeframes;
mod tokens;
mod vwap;

pub use db::Db;
pub use notifications::NotificationRecord;
