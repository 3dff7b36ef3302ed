use rust_decimal::Decimal;
use trading_core::{OHLCVCandle, Timeframe, VWAPSession};

const SECONDS_PER_DAY: i64 = 86_400;

fn day_start(unix_time: i64) -> i64 {
    unix_time.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY
}

/// Which of the three session behaviors (§4.5) applies this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VwapMode {
    /// No `VWAPSession` row exists yet — recompute from today's bars.
    NewSession,
    /// `lastFetchedAt <= sessionEndUnix` — fold just the new bars.
    SameDayUpdate,
    /// `lastFetchedAt > sessionEndUnix` — reset to today and recompute.
    NewDayReset,
}

pub struct VwapEngine;

impl VwapEngine {
    pub fn resolve_mode(existing: Option<&VWAPSession>, last_fetched_at: i64) -> VwapMode {
        match existing {
            None => VwapMode::NewSession,
            Some(s) if last_fetched_at > s.session_end_unix => VwapMode::NewDayReset,
            Some(_) => VwapMode::SameDayUpdate,
        }
    }

    /// Fresh session state anchored to the UTC day containing `last_fetched_at`.
    /// `last_candle_unix` starts one second before the session so the very
    /// first in-session bar folds in.
    pub fn new_session(token_address: String, pair_address: String, timeframe: Timeframe, last_fetched_at: i64) -> VWAPSession {
        let session_start = day_start(last_fetched_at);
        let session_end = session_start + SECONDS_PER_DAY - 1;
        VWAPSession {
            token_address,
            pair_address,
            timeframe,
            session_start_unix: session_start,
            session_end_unix: session_end,
            cumulative_pv: Decimal::ZERO,
            cumulative_volume: Decimal::ZERO,
            current_vwap: Decimal::ZERO,
            last_candle_unix: session_start - 1,
            next_candle_fetch: 0,
        }
    }

    /// Fold every bar in `bars` (ascending) whose `unix_time` is strictly
    /// after `state.last_candle_unix` into the running VWAP, writing the
    /// cumulative ratio onto each bar it touches. Zero-volume bars
    /// contribute nothing to either sum but still get a `vwap_value`.
    pub fn fold(mut state: VWAPSession, bars: &mut [OHLCVCandle]) -> VWAPSession {
        for bar in bars.iter_mut() {
            if bar.unix_time <= state.last_candle_unix {
                continue;
            }
            if bar.volume > Decimal::ZERO {
                let typical = (bar.high + bar.low + bar.close) / Decimal::from(3);
                state.cumulative_pv += typical * bar.volume;
                state.cumulative_volume += bar.volume;
            }
            if state.cumulative_volume > Decimal::ZERO {
                state.current_vwap = state.cumulative_pv / state.cumulative_volume;
            }
            bar.vwap_value = Some(state.current_vwap);
            state.last_candle_unix = bar.unix_time;
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(unix_time: i64, high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> OHLCVCandle {
        OHLCVCandle {
            token_address: "tok".into(),
            pair_address: "pair".into(),
            timeframe: Timeframe::FifteenMin,
            unix_time,
            time_bucket: Timeframe::FifteenMin.floor_align(unix_time),
            open: close,
            high,
            low,
            close,
            volume,
            trades: 1,
            is_complete: true,
            data_source: "test".into(),
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
        }
    }

    #[test]
    fn new_session_folds_from_day_start() {
        let day = 1_704_067_200i64; // 2024-01-01T00:00:00Z
        let state = VwapEngine::new_session("tok".into(), "pair".into(), Timeframe::FifteenMin, day + 900);
        assert_eq!(state.session_start_unix, day);
        assert_eq!(state.session_end_unix, day + 86_399);

        let mut bars = vec![
            bar(day, dec!(1.01), dec!(0.99), dec!(1.00), dec!(100)),
            bar(day + 900, dec!(1.02), dec!(1.00), dec!(1.01), dec!(100)),
        ];
        let state = VwapEngine::fold(state, &mut bars);
        assert!(bars[0].vwap_value.is_some());
        assert!(bars[1].vwap_value.is_some());
        assert_eq!(state.last_candle_unix, day + 900);
    }

    #[test]
    fn zero_volume_bar_leaves_cumulative_sums_untouched() {
        let day = 1_704_067_200i64;
        let state = VwapEngine::new_session("tok".into(), "pair".into(), Timeframe::FifteenMin, day);
        let mut bars = vec![bar(day, dec!(1.0), dec!(1.0), dec!(1.0), dec!(0))];
        let state = VwapEngine::fold(state, &mut bars);
        assert_eq!(state.cumulative_volume, Decimal::ZERO);
        assert_eq!(state.cumulative_pv, Decimal::ZERO);
    }

    #[test]
    fn mode_resolution() {
        let day = 1_704_067_200i64;
        assert_eq!(VwapEngine::resolve_mode(None, day), VwapMode::NewSession);
        let session = VwapEngine::new_session("tok".into(), "pair".into(), Timeframe::FifteenMin, day);
        assert_eq!(VwapEngine::resolve_mode(Some(&session), day + 100), VwapMode::SameDayUpdate);
        assert_eq!(VwapEngine::resolve_mode(Some(&session), day + 100_000), VwapMode::NewDayReset);
    }

    /// S7: a session ending 2024-01-01T23:59:59Z, next tick lands at
    /// 2024-01-02T00:30:00Z. The fold must reset to a fresh session
    /// anchored on the new day, with cumulative sums built only from the
    /// new day's bars.
    #[test]
    fn s7_new_day_reset_clears_cumulative_sums() {
        let day1 = 1_704_067_200i64; // 2024-01-01T00:00:00Z
        let last_fetched_at = day1 + 85_500; // 23:45:00Z
        let existing = VwapEngine::new_session("tok".into(), "pair".into(), Timeframe::FifteenMin, last_fetched_at);
        assert_eq!(existing.session_end_unix, day1 + 86_399);

        let next_tick = day1 + 86_400 + 1_800; // 2024-01-02T00:30:00Z
        assert_eq!(VwapEngine::resolve_mode(Some(&existing), next_tick), VwapMode::NewDayReset);

        let fresh = VwapEngine::new_session("tok".into(), "pair".into(), Timeframe::FifteenMin, next_tick);
        assert_eq!(fresh.session_start_unix, day1 + 86_400);

        let mut bars = vec![bar(next_tick, dec!(1.05), dec!(1.03), dec!(1.04), dec!(100))];
        let fresh = VwapEngine::fold(fresh, &mut bars);
        assert_eq!(fresh.cumulative_volume, dec!(100));
        assert_eq!(bars[0].vwap_value.unwrap(), (dec!(1.05) + dec!(1.03) + dec!(1.04)) / dec!(3));
    }

    /// S2: folding three additional bars after an existing session only
    /// advances the cumulative sums by those three bars' PV/volume.
    #[test]
    fn s2_incremental_fold_appends_exactly_new_bars() {
        let day = 1_704_067_200i64;
        let state = VwapEngine::new_session("tok".into(), "pair".into(), Timeframe::FifteenMin, day);
        let mut first = vec![bar(day, dec!(1.01), dec!(0.99), dec!(1.00), dec!(100))];
        let state = VwapEngine::fold(state, &mut first);
        let pv_before = state.cumulative_pv;
        let vol_before = state.cumulative_volume;

        let mut more = vec![
            bar(day + 900, dec!(1.02), dec!(1.00), dec!(1.01), dec!(50)),
            bar(day + 1_800, dec!(1.03), dec!(1.01), dec!(1.02), dec!(50)),
            bar(day + 2_700, dec!(1.04), dec!(1.02), dec!(1.03), dec!(50)),
        ];
        let state = VwapEngine::fold(state, &mut more);

        let expected_pv_delta = more.iter().map(|b| (b.high + b.low + b.close) / dec!(3) * b.volume).sum::<Decimal>();
        assert_eq!(state.cumulative_pv - pv_before, expected_pv_delta);
        assert_eq!(state.cumulative_volume - vol_before, dec!(150));
        assert_eq!(state.last_candle_unix, day + 2_700);
    }
}
