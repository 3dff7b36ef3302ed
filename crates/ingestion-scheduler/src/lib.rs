//! Scheduler core (C10, §4.10): the single periodic tick. Runs the 15m
//! vendor fetch, folds it into 1h/4h via the aggregator, then runs the
//! indicator engines and the alert engine independently per token so one
//! bad token never stalls the others.

use alert_engine::{AlertEngine, AlertThresholds};
use candle_store::Db;
use indicator_engine::{aggregate, AvwapEngine, EmaEngine, RsiEngine, VwapEngine, VwapMode};
use std::collections::HashSet;
use trading_core::{IngestConfig, RSIState, Timeframe, TimeframeRecord};
use vendor_client::{BirdeyeClient, MoralisClient, VendorClient};

const AGGREGATE_LOOKBACK_MULTIPLE: i64 = 3;

/// The EMA field matching a tracked period, for the alert-pass availability gate (§5).
fn ema_field(bar: &trading_core::OHLCVCandle, period: u32) -> Option<rust_decimal::Decimal> {
    match period {
        12 => bar.ema12,
        21 => bar.ema21,
        34 => bar.ema34,
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub tokens_processed: usize,
    pub pass_errors: u32,
}

pub struct Scheduler {
    db: Db,
    birdeye: BirdeyeClient,
    /// Secondary vendor: filled in directly against 1h/4h when the
    /// aggregator can't close a bucket from 15m data alone (a vendor gap).
    moralis: MoralisClient,
    gateway: Option<notification_gateway::NotificationGateway>,
    config: IngestConfig,
}

impl Scheduler {
    pub fn new(db: Db, birdeye: BirdeyeClient, moralis: MoralisClient, gateway: Option<notification_gateway::NotificationGateway>, config: IngestConfig) -> Self {
        Self { db, birdeye, moralis, gateway, config }
    }

    pub async fn run_tick(&self, now: i64) -> anyhow::Result<TickSummary> {
        let due = self.db.due_timeframes(now, self.config.fetch_buffer_seconds).await?;
        let mut touched: HashSet<String> = HashSet::new();
        let mut pass_errors = 0u32;

        for record in due.iter().filter(|r| r.timeframe == Timeframe::FifteenMin) {
            match self.fetch_and_persist_fifteen_min(record, now).await {
                Ok(()) => {
                    touched.insert(record.token_address.clone());
                }
                Err(e) => {
                    tracing::error!(token = %record.token_address, error = %e, "fifteen-minute fetch failed");
                    pass_errors += 1;
                }
            }
        }

        for token_address in &touched {
            if let Err(e) = self.recompute_aggregates(token_address, now).await {
                tracing::error!(token = %token_address, error = %e, "aggregate recompute failed");
                pass_errors += 1;
            }
            if let Err(e) = self.run_indicator_passes(token_address, now).await {
                tracing::error!(token = %token_address, error = %e, "indicator pass failed");
                pass_errors += 1;
            }
            if let Err(e) = self.run_alert_pass(token_address, now).await {
                tracing::error!(token = %token_address, error = %e, "alert pass failed");
                pass_errors += 1;
            }
        }

        Ok(TickSummary {
            tokens_processed: touched.len(),
            pass_errors,
        })
    }

    async fn fetch_and_persist_fifteen_min(&self, record: &TimeframeRecord, now: i64) -> anyhow::Result<()> {
        let token = self
            .db
            .get_token_by_address(&record.token_address)
            .await?
            .ok_or_else(|| anyhow::anyhow!("token {} not found", record.token_address))?;

        let from = (record.last_fetched_at + 1).max(token.pair_created_time);
        let outcome = self
            .birdeye
            .fetch_candles(&self.db, &record.token_address, &record.pair_address, from, now, Timeframe::FifteenMin, now)
            .await?;

        for bar in &outcome.candles {
            self.db.upsert_candle(bar, now).await?;
        }

        let next_fetch_at = if let Some(latest) = outcome.candles.last() {
            TimeframeRecord::next_fetch_at_after(latest.unix_time, Timeframe::FifteenMin)
        } else {
            record.next_fetch_at
        };
        self.db.advance_next_fetch(&record.token_address, Timeframe::FifteenMin, next_fetch_at, now).await?;

        Ok(())
    }

    async fn recompute_aggregates(&self, token_address: &str, now: i64) -> anyhow::Result<()> {
        let lookback = Timeframe::FourHour.tf_sec() * AGGREGATE_LOOKBACK_MULTIPLE;

        let fifteen_min = self.db.candles_since(token_address, Timeframe::FifteenMin, now - lookback).await?;
        if fifteen_min.is_empty() {
            return Ok(());
        }
        let hourly = aggregate(&fifteen_min, Timeframe::OneHour, now);
        for bar in &hourly {
            self.db.upsert_candle(bar, now).await?;
        }

        let hourly_history = self.db.candles_since(token_address, Timeframe::OneHour, now - lookback).await?;
        if hourly_history.is_empty() {
            return Ok(());
        }
        let four_hour = aggregate(&hourly_history, Timeframe::FourHour, now);
        for bar in &four_hour {
            self.db.upsert_candle(bar, now).await?;
        }

        Ok(())
    }

    /// Fills a 1h/4h gap the aggregator couldn't close (a missing 15m bar
    /// upstream) by asking the secondary vendor directly for that window.
    pub async fn backfill_gap_via_moralis(&self, token_address: &str, pair_address: &str, timeframe: Timeframe, from_time: i64, to_time: i64, now: i64) -> anyhow::Result<usize> {
        let outcome = self.moralis.fetch_candles(&self.db, token_address, pair_address, from_time, to_time, timeframe, now).await?;
        for bar in &outcome.candles {
            self.db.upsert_candle(bar, now).await?;
        }
        Ok(outcome.candles.len())
    }

    async fn run_indicator_passes(&self, token_address: &str, now: i64) -> anyhow::Result<()> {
        let token = self
            .db
            .get_token_by_address(token_address)
            .await?
            .ok_or_else(|| anyhow::anyhow!("token {} not found", token_address))?;

        for tf in [Timeframe::FifteenMin, Timeframe::OneHour, Timeframe::FourHour] {
            let Some(latest_candle) = self.db.latest_candle(token_address, tf).await? else {
                continue;
            };

            // VWAP
            let existing_vwap = self.db.get_vwap_session(token_address, tf).await?;
            let mode = VwapEngine::resolve_mode(existing_vwap.as_ref(), latest_candle.unix_time);
            let (since, vwap_state) = match mode {
                VwapMode::SameDayUpdate => {
                    let s = existing_vwap.expect("same-day update implies an existing session");
                    (s.last_candle_unix, s)
                }
                VwapMode::NewSession | VwapMode::NewDayReset => {
                    let fresh = VwapEngine::new_session(token_address.to_string(), token.pair_address.clone(), tf, latest_candle.unix_time);
                    (fresh.session_start_unix - 1, fresh)
                }
            };
            let mut vwap_bars = self.db.candles_since(token_address, tf, since).await?;
            if !vwap_bars.is_empty() {
                let vwap_state = VwapEngine::fold(vwap_state, &mut vwap_bars);
                for bar in &vwap_bars {
                    self.db.update_indicators(bar, now).await?;
                }
                self.db.put_vwap_session(&vwap_state, now).await?;
            }

            // AVWAP
            let avwap_state = match self.db.get_avwap_state(token_address, tf).await? {
                Some(s) => s,
                None => AvwapEngine::init(token_address.to_string(), token.pair_address.clone(), tf, tf.floor_align(token.pair_created_time)),
            };
            let mut avwap_bars = self.db.candles_since(token_address, tf, avwap_state.last_updated_unix).await?;
            if !avwap_bars.is_empty() {
                let avwap_state = AvwapEngine::fold(avwap_state, &mut avwap_bars);
                for bar in &avwap_bars {
                    self.db.update_indicators(bar, now).await?;
                }
                self.db.put_avwap_state(&avwap_state, now).await?;
            }

            // EMA (12, 21, 34)
            for &period in EmaEngine::tracked_periods() {
                let state = match self.db.get_ema_state(token_address, tf, period).await? {
                    Some(s) => s,
                    None => EmaEngine::init(token_address.to_string(), token.pair_address.clone(), tf, period, token.pair_created_time),
                };
                let mut ema_bars = self.db.candles_since(token_address, tf, state.last_updated_unix).await?;
                if ema_bars.is_empty() {
                    continue;
                }
                let state = EmaEngine::apply(state, &mut ema_bars);
                for bar in &ema_bars {
                    self.db.update_indicators(bar, now).await?;
                }
                self.db.put_ema_state(&state, now).await?;
            }

            // RSI / Stoch-RSI
            let rsi_state = match self.db.get_rsi_state(token_address, tf).await? {
                Some(s) => s,
                None => RSIState::new(token_address.to_string(), token.pair_address.clone(), tf, token.pair_created_time),
            };
            let mut rsi_bars = self.db.candles_since(token_address, tf, rsi_state.last_updated_unix).await?;
            if !rsi_bars.is_empty() {
                let rsi_state = RsiEngine::apply(rsi_state, &mut rsi_bars);
                for bar in &rsi_bars {
                    self.db.update_indicators(bar, now).await?;
                }
                self.db.put_rsi_state(&rsi_state, now).await?;
            }
        }

        Ok(())
    }

    async fn run_alert_pass(&self, token_address: &str, now: i64) -> anyhow::Result<()> {
        let token = self
            .db
            .get_token_by_address(token_address)
            .await?
            .ok_or_else(|| anyhow::anyhow!("token {} not found", token_address))?;
        let thresholds = AlertThresholds::from(&self.config);

        for tf in [Timeframe::FifteenMin, Timeframe::OneHour, Timeframe::FourHour] {
            let alert_state = match self.db.get_alert_state(token_address, tf).await? {
                Some(s) => s,
                None => AlertEngine::init(token_address.to_string(), token.pair_address.clone(), tf),
            };

            let ema_states = self.db.get_ema_states(token_address, tf).await?;
            let mut bars = self.db.candles_since(token_address, tf, alert_state.last_updated_unix).await?;
            bars.retain(|b| {
                b.vwap_value.is_some()
                    && b.avwap_value.is_some()
                    && ema_states.iter().all(|s| b.unix_time < s.ema_available_time || ema_field(b, s.period).is_some())
            });
            if bars.is_empty() {
                continue;
            }

            let (alert_state, events) = AlertEngine::apply(alert_state, &thresholds, &token.symbol, &mut bars);
            for bar in &bars {
                self.db.update_indicators(bar, now).await?;
            }
            self.db.put_alert_state(&alert_state, now).await?;

            if let Some(gateway) = &self.gateway {
                for event in &events {
                    if let Err(e) = gateway.dispatch(event, now).await {
                        tracing::warn!(token = %token_address, error = %e, "alert dispatch failed");
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn run_credential_reset(&self, now: i64) -> anyhow::Result<u64> {
        self.db.reset_credentials_due_for_reset(now).await
    }
}
