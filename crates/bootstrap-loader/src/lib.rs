//! Bootstrap loader (C11, §4.11): the two flows for bringing a token under
//! management. Both run every initial indicator pass in memory against the
//! freshly fetched candles — no round-trip to the store between C5, C6, C7
//! — then persist the token, its candles, and its indicator state in one
//! pass. A failure at any step disables the token with the failure string
//! rather than leaving a half-initialized row behind.

use candle_store::Db;
use indicator_engine::{aggregate, AvwapEngine, EmaEngine, VwapEngine};
use rust_decimal::Decimal;
use trading_core::{AdditionSource, EMAState, OHLCVCandle, Timeframe};
use vendor_client::VendorClient;

const OLD_TOKEN_BACKFILL_SECONDS: i64 = 48 * 3600;

/// Operator-supplied EMA seed for the old-token flow: a known EMA value at
/// a known point in time, taking the place of the SMA seed a fresh token
/// would compute from scratch.
#[derive(Debug, Clone, Copy)]
pub struct EmaAnchor {
    pub timeframe: Timeframe,
    pub period: u32,
    pub value: Decimal,
    pub reference_time: i64,
}

#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub success: bool,
    pub token_id: Option<i64>,
    pub mode: String,
    pub candles_inserted: i64,
    pub credits_used: i64,
    pub error: Option<String>,
}

impl BootstrapOutcome {
    fn failure(mode: &str, error: String) -> Self {
        BootstrapOutcome {
            success: false,
            token_id: None,
            mode: mode.to_string(),
            candles_inserted: 0,
            credits_used: 0,
            error: Some(error),
        }
    }
}

struct TimeframePass {
    timeframe: Timeframe,
    bars: Vec<OHLCVCandle>,
    vwap: trading_core::VWAPSession,
    avwap: trading_core::AVWAPState,
    emas: Vec<EMAState>,
}

fn run_initial_indicator_pass(
    token_address: &str,
    pair_address: &str,
    timeframe: Timeframe,
    pair_created_time: i64,
    mut bars: Vec<OHLCVCandle>,
    ema_anchors: Option<&[EmaAnchor]>,
) -> Option<TimeframePass> {
    let Some(last) = bars.last() else { return None };
    let last_fetched_at = last.unix_time;

    let vwap_state = VwapEngine::new_session(token_address.to_string(), pair_address.to_string(), timeframe, last_fetched_at);
    let vwap_state = VwapEngine::fold(vwap_state, &mut bars);

    let anchor_unix = timeframe.floor_align(pair_created_time);
    let avwap_state = AvwapEngine::init(token_address.to_string(), pair_address.to_string(), timeframe, anchor_unix);
    let avwap_state = AvwapEngine::fold(avwap_state, &mut bars);

    let mut emas = Vec::new();
    for &period in EmaEngine::tracked_periods() {
        let state = match ema_anchors.and_then(|anchors| anchors.iter().find(|a| a.period == period && a.timeframe == timeframe)) {
            Some(anchor) => EMAState {
                token_address: token_address.to_string(),
                pair_address: pair_address.to_string(),
                timeframe,
                period,
                ema_value: Some(anchor.value),
                status: trading_core::EmaStatus::Available,
                ema_available_time: anchor.reference_time,
                last_updated_unix: anchor.reference_time,
                next_fetch_time: 0,
            },
            None => EmaEngine::init(token_address.to_string(), pair_address.to_string(), timeframe, period, pair_created_time),
        };
        let state = EmaEngine::apply(state, &mut bars);
        emas.push(state);
    }

    Some(TimeframePass {
        timeframe,
        bars,
        vwap: vwap_state,
        avwap: avwap_state,
        emas,
    })
}

async fn persist_pass(db: &Db, pass: &TimeframePass, now: i64) -> anyhow::Result<()> {
    for bar in &pass.bars {
        db.upsert_candle(bar, now).await?;
        db.update_indicators(bar, now).await?;
    }
    db.put_vwap_session(&pass.vwap, now).await?;
    db.put_avwap_state(&pass.avwap, now).await?;
    for ema in &pass.emas {
        db.put_ema_state(ema, now).await?;
    }
    Ok(())
}

async fn fetch_window(
    db: &Db,
    vendor: &dyn VendorClient,
    token_address: &str,
    pair_address: &str,
    from_time: i64,
    to_time: i64,
    now: i64,
) -> anyhow::Result<(Vec<OHLCVCandle>, i64, i64)> {
    let outcome = vendor
        .fetch_candles(db, token_address, pair_address, from_time, to_time, Timeframe::FifteenMin, now)
        .await?;
    Ok((outcome.candles, outcome.credits_used, outcome.latest_time))
}

/// New-token flow: backfill the entire history from `pair_created_time`.
#[allow(clippy::too_many_arguments)]
pub async fn add_new_token(
    db: &Db,
    vendor: &dyn VendorClient,
    token_address: &str,
    pair_address: &str,
    symbol: &str,
    name: &str,
    pair_created_time: i64,
    added_by: Option<&str>,
    now: i64,
) -> BootstrapOutcome {
    let mode = "new_token";

    let (fifteen_min, credits_used, latest_time) = match fetch_window(db, vendor, token_address, pair_address, pair_created_time, now, now).await {
        Ok(v) => v,
        Err(e) => return BootstrapOutcome::failure(mode, e.to_string()),
    };

    if fifteen_min.is_empty() {
        return BootstrapOutcome::failure(mode, "vendor returned no candles for new token backfill".to_string());
    }

    match finish_bootstrap(db, token_address, pair_address, symbol, name, pair_created_time, added_by, now, fifteen_min, None, mode, credits_used, latest_time).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let _ = db.disable_token(token_address, "bootstrap", now).await;
            BootstrapOutcome::failure(mode, e.to_string())
        }
    }
}

/// Old-token flow: backfill only the last 48h, seeding EMA state from
/// operator-supplied anchors instead of an SMA window.
#[allow(clippy::too_many_arguments)]
pub async fn add_old_token(
    db: &Db,
    vendor: &dyn VendorClient,
    token_address: &str,
    pair_address: &str,
    symbol: &str,
    name: &str,
    pair_created_time: i64,
    ema_anchors: &[EmaAnchor],
    added_by: Option<&str>,
    now: i64,
) -> BootstrapOutcome {
    let mode = "old_token";
    let from_time = now - OLD_TOKEN_BACKFILL_SECONDS;

    let (fifteen_min, credits_used, latest_time) = match fetch_window(db, vendor, token_address, pair_address, from_time, now, now).await {
        Ok(v) => v,
        Err(e) => return BootstrapOutcome::failure(mode, e.to_string()),
    };

    if fifteen_min.is_empty() {
        return BootstrapOutcome::failure(mode, "vendor returned no candles for old token backfill window".to_string());
    }

    match finish_bootstrap(
        db,
        token_address,
        pair_address,
        symbol,
        name,
        pair_created_time,
        added_by,
        now,
        fifteen_min,
        Some(ema_anchors),
        mode,
        credits_used,
        latest_time,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            let _ = db.disable_token(token_address, "bootstrap", now).await;
            BootstrapOutcome::failure(mode, e.to_string())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn finish_bootstrap(
    db: &Db,
    token_address: &str,
    pair_address: &str,
    symbol: &str,
    name: &str,
    pair_created_time: i64,
    added_by: Option<&str>,
    now: i64,
    fifteen_min: Vec<OHLCVCandle>,
    ema_anchors: Option<&[EmaAnchor]>,
    mode: &str,
    credits_used: i64,
    latest_time: i64,
) -> anyhow::Result<BootstrapOutcome> {
    let one_hour = aggregate(&fifteen_min, Timeframe::OneHour, now);
    let four_hour = aggregate(&one_hour, Timeframe::FourHour, now);
    let candles_inserted = (fifteen_min.len() + one_hour.len() + four_hour.len()) as i64;

    let passes: Vec<TimeframePass> = [
        (Timeframe::FifteenMin, fifteen_min),
        (Timeframe::OneHour, one_hour),
        (Timeframe::FourHour, four_hour),
    ]
    .into_iter()
    .filter_map(|(tf, bars)| run_initial_indicator_pass(token_address, pair_address, tf, pair_created_time, bars, ema_anchors))
    .collect();

    let addition_source = if added_by.is_some() { AdditionSource::Manual } else { AdditionSource::Automatic };
    let token_id = db
        .insert_token(token_address, symbol, name, pair_address, pair_created_time, addition_source, added_by, now)
        .await?;

    db.init_timeframe(
        token_address,
        pair_address,
        Timeframe::FifteenMin,
        trading_core::TimeframeRecord::initial_next_fetch_at(pair_created_time, Timeframe::FifteenMin),
        now,
    )
    .await?;
    db.init_timeframe(token_address, pair_address, Timeframe::OneHour, trading_core::TimeframeRecord::initial_next_fetch_at(pair_created_time, Timeframe::OneHour), now)
        .await?;
    db.init_timeframe(token_address, pair_address, Timeframe::FourHour, trading_core::TimeframeRecord::initial_next_fetch_at(pair_created_time, Timeframe::FourHour), now)
        .await?;

    for pass in &passes {
        persist_pass(db, pass, now).await?;
        db.advance_next_fetch(token_address, pass.timeframe, trading_core::TimeframeRecord::next_fetch_at_after(latest_time, pass.timeframe), now)
            .await?;
    }

    Ok(BootstrapOutcome {
        success: true,
        token_id: Some(token_id),
        mode: mode.to_string(),
        candles_inserted,
        credits_used,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_outcome_carries_reason() {
        let outcome = BootstrapOutcome::failure("new_token", "vendor down".to_string());
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("vendor down"));
    }
}
