use async_trait::async_trait;
use candle_store::Db;
use chrono::DateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use trading_core::{IngestError, IngestResult, OHLCVCandle, Timeframe};

use crate::{CreditSession, FetchOutcome, VendorClient};

const BASE_URL: &str = "https://deep-index.moralis.io/api/v2.2";
const MILLIS: i64 = 1000;

#[derive(Deserialize)]
struct Envelope {
    result: Vec<Item>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct Item {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    trades: Option<i64>,
}

/// Secondary vendor backend: reverse-chronological, cursor-based,
/// inclusive `toTime` / exclusive `fromTime` (§4.1). Serves `1h`/`4h`
/// directly, without local aggregation (§10.6).
pub struct MoralisClient {
    http: reqwest::Client,
    credits_per_call: i64,
    chain: String,
}

impl MoralisClient {
    pub fn new(credits_per_call: i64, chain: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            credits_per_call,
            chain: chain.into(),
        }
    }

    fn vendor_timeframe(timeframe: Timeframe) -> Option<&'static str> {
        match timeframe {
            Timeframe::OneHour => Some("1h"),
            Timeframe::FourHour => Some("4h"),
            Timeframe::FifteenMin => None,
        }
    }

    async fn fetch_page(&self, api_key: &str, pair_address: &str, from_time: i64, to_time: i64, timeframe: Timeframe) -> IngestResult<Envelope> {
        let vendor_tf = Self::vendor_timeframe(timeframe)
            .ok_or_else(|| IngestError::Unsupported(format!("moralis does not serve {}", timeframe.as_str())))?;

        let resp = self
            .http
            .get(format!("{BASE_URL}/token/{}/pairs/{}/ohlcv", self.chain, pair_address))
            .header("X-API-Key", api_key)
            .query(&[
                ("timeframe", vendor_tf),
                ("fromDate", &(from_time * MILLIS).to_string()),
                ("toDate", &(to_time * MILLIS).to_string()),
                ("limit", "1000"),
            ])
            .send()
            .await
            .map_err(|e| IngestError::VendorTransient(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(IngestError::VendorTransient(format!("moralis http {status}")));
        }
        if !status.is_success() {
            return Err(IngestError::VendorPermanent(format!("moralis http {status}")));
        }

        resp.json().await.map_err(|e| IngestError::VendorTransient(e.to_string()))
    }
}

#[async_trait]
impl VendorClient for MoralisClient {
    fn service_name(&self) -> &str {
        "moralis"
    }

    fn credits_per_call(&self) -> i64 {
        self.credits_per_call
    }

    fn supports_timeframe(&self, timeframe: Timeframe) -> bool {
        Self::vendor_timeframe(timeframe).is_some()
    }

    async fn fetch_candles(
        &self,
        db: &Db,
        token_address: &str,
        pair_address: &str,
        from_time: i64,
        to_time: i64,
        timeframe: Timeframe,
        now: i64,
    ) -> IngestResult<FetchOutcome> {
        if !self.supports_timeframe(timeframe) {
            return Err(IngestError::Unsupported(format!(
                "moralis does not serve {}",
                timeframe.as_str()
            )));
        }

        let mut session = CreditSession::new(db, self.service_name(), self.credits_per_call);
        let mut current_to = to_time;
        let mut latest_time = from_time;
        let mut raw: Vec<Item> = Vec::new();
        let current_candle_start = timeframe.current_candle_start(now);

        loop {
            let key = session.ensure_key().await?;
            let api_key = key.api_key.clone();

            let page = match self.fetch_page(&api_key, pair_address, from_time, current_to, timeframe).await {
                Ok(p) => p,
                Err(e) => {
                    session.flush(now).await.map_err(|err| IngestError::VendorTransient(err.to_string()))?;
                    return Err(e);
                }
            };
            session.consume();

            if page.result.is_empty() {
                break;
            }

            let mut oldest_this_page = current_to;
            for item in &page.result {
                if let Ok(t) = DateTime::parse_from_rfc3339(&item.timestamp) {
                    let unix = t.timestamp();
                    oldest_this_page = oldest_this_page.min(unix);
                    latest_time = latest_time.max(unix);
                }
            }

            raw.extend(page.result);

            let has_cursor = page.cursor.is_some();
            if has_cursor && oldest_this_page > from_time && oldest_this_page < current_to {
                current_to = oldest_this_page;
                continue;
            }
            break;
        }

        session.flush(now).await.map_err(|e| IngestError::VendorTransient(e.to_string()))?;

        let mut seen: HashSet<i64> = HashSet::new();
        let mut candles = Vec::with_capacity(raw.len());
        for item in raw {
            let unix_time = match DateTime::parse_from_rfc3339(&item.timestamp) {
                Ok(t) => t.timestamp(),
                Err(_) => continue,
            };
            if unix_time <= from_time || unix_time > to_time || unix_time >= current_candle_start {
                continue;
            }
            if !seen.insert(unix_time) {
                continue;
            }
            let candle = OHLCVCandle {
                token_address: token_address.to_string(),
                pair_address: pair_address.to_string(),
                timeframe,
                unix_time,
                time_bucket: timeframe.floor_align(unix_time),
                open: Decimal::from_f64_retain(item.open).unwrap_or_default(),
                high: Decimal::from_f64_retain(item.high).unwrap_or_default(),
                low: Decimal::from_f64_retain(item.low).unwrap_or_default(),
                close: Decimal::from_f64_retain(item.close).unwrap_or_default(),
                volume: Decimal::from_f64_retain(item.volume).unwrap_or_default(),
                trades: item.trades.unwrap_or(0),
                is_complete: true,
                data_source: "moralis".to_string(),
                vwap_value: None,
                avwap_value: None,
                ema12: None,
                ema21: None,
                ema34: None,
                rsi: None,
                stoch_rsi: None,
                stoch_k: None,
                stoch_d: None,
                trend: None,
                status: None,
                trend12: None,
                status12: None,
            };
            if candle.validate(now).is_ok() {
                candles.push(candle);
            }
        }
        candles.sort_by_key(|c| c.unix_time);

        Ok(FetchOutcome {
            candles,
            credits_used: session.total_credits_used(),
            latest_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_hourly_and_four_hourly_only() {
        let client = MoralisClient::new(150, "solana", Duration::from_secs(30));
        assert!(!client.supports_timeframe(Timeframe::FifteenMin));
        assert!(client.supports_timeframe(Timeframe::OneHour));
        assert!(client.supports_timeframe(Timeframe::FourHour));
    }
}
