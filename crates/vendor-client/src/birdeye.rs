use async_trait::async_trait;
use candle_store::Db;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use trading_core::{IngestError, IngestResult, OHLCVCandle, Timeframe};

use crate::{CreditSession, FetchOutcome, VendorClient};

const BASE_URL: &str = "https://public-api.birdeye.so";
const PAGE_SIZE: usize = 1000;

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    data: Option<Data>,
}

#[derive(Deserialize)]
struct Data {
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(rename = "unixTime")]
    unix_time: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
    #[serde(rename = "tradeCount", default)]
    trade_count: Option<i64>,
}

/// Primary vendor backend: forward-paginated, 1000 bars/page, only the
/// 15-minute timeframe (§10.6).
pub struct BirdeyeClient {
    http: reqwest::Client,
    credits_per_call: i64,
}

impl BirdeyeClient {
    pub fn new(credits_per_call: i64, request_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            credits_per_call,
        }
    }

    async fn fetch_page(&self, api_key: &str, pair_address: &str, from_time: i64, to_time: i64) -> IngestResult<Vec<Item>> {
        let resp = self
            .http
            .get(format!("{BASE_URL}/defi/ohlcv/pair"))
            .header("X-API-KEY", api_key)
            .header("x-chain", "solana")
            .query(&[
                ("address", pair_address),
                ("type", "15m"),
                ("time_from", &from_time.to_string()),
                ("time_to", &to_time.to_string()),
            ])
            .send()
            .await
            .map_err(|e| IngestError::VendorTransient(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(IngestError::VendorTransient(format!("birdeye http {status}")));
        }
        if !status.is_success() {
            return Err(IngestError::VendorPermanent(format!("birdeye http {status}")));
        }

        let body: Envelope = resp.json().await.map_err(|e| IngestError::VendorTransient(e.to_string()))?;
        if !body.success {
            return Err(IngestError::VendorPermanent("birdeye reported success=false".into()));
        }
        Ok(body.data.map(|d| d.items).unwrap_or_default())
    }
}

#[async_trait]
impl VendorClient for BirdeyeClient {
    fn service_name(&self) -> &str {
        "birdeye"
    }

    fn credits_per_call(&self) -> i64 {
        self.credits_per_call
    }

    fn supports_timeframe(&self, timeframe: Timeframe) -> bool {
        matches!(timeframe, Timeframe::FifteenMin)
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
                "birdeye does not serve {}",
                timeframe.as_str()
            )));
        }

        let mut session = CreditSession::new(db, self.service_name(), self.credits_per_call);
        let mut current_from = from_time;
        let mut latest_time = from_time;
        let mut raw: Vec<Item> = Vec::new();
        let current_candle_start = timeframe.current_candle_start(now);

        loop {
            let key = session.ensure_key().await?;
            let api_key = key.api_key.clone();

            let page = match self.fetch_page(&api_key, pair_address, current_from, to_time).await {
                Ok(p) => p,
                Err(e) => {
                    // Credit delta accumulated before the failure is still flushed (§4.1).
                    session.flush(now).await.map_err(|err| IngestError::VendorTransient(err.to_string()))?;
                    return Err(e);
                }
            };
            session.consume();

            if page.is_empty() {
                break;
            }

            let page_len = page.len();
            let page_max = page.iter().map(|c| c.unix_time).max().unwrap_or(latest_time);
            latest_time = latest_time.max(page_max);
            raw.extend(page);

            if page_len == PAGE_SIZE && latest_time < to_time {
                current_from = latest_time + 1;
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
            break;
        }

        session.flush(now).await.map_err(|e| IngestError::VendorTransient(e.to_string()))?;

        let mut candles = Vec::with_capacity(raw.len());
        for item in raw {
            if item.unix_time <= from_time || item.unix_time >= current_candle_start {
                continue;
            }
            let candle = OHLCVCandle {
                token_address: token_address.to_string(),
                pair_address: pair_address.to_string(),
                timeframe,
                unix_time: item.unix_time,
                time_bucket: timeframe.floor_align(item.unix_time),
                open: Decimal::from_f64_retain(item.o).unwrap_or_default(),
                high: Decimal::from_f64_retain(item.h).unwrap_or_default(),
                low: Decimal::from_f64_retain(item.l).unwrap_or_default(),
                close: Decimal::from_f64_retain(item.c).unwrap_or_default(),
                volume: Decimal::from_f64_retain(item.v).unwrap_or_default(),
                trades: item.trade_count.unwrap_or(0),
                is_complete: true,
                data_source: "birdeye".to_string(),
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
        candles.dedup_by_key(|c| c.unix_time);

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
    fn only_serves_fifteen_minutes() {
        let client = BirdeyeClient::new(40, Duration::from_secs(30));
        assert!(client.supports_timeframe(Timeframe::FifteenMin));
        assert!(!client.supports_timeframe(Timeframe::OneHour));
        assert!(!client.supports_timeframe(Timeframe::FourHour));
    }
}
