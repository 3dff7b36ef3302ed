use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use trading_core::{EMAState, EmaStatus, OHLCVCandle, Timeframe};

/// EMA engine (§4.7): one `EMAState` per tracked period (12, 21, 34). Seeds
/// with a plain SMA over the first `period` closes, then recurses with the
/// standard multiplier. Math runs in `f64` and gets rounded to 8 decimal
/// places only when written back onto a candle or persisted (§9).
pub struct EmaEngine;

const TRACKED_PERIODS: [u32; 3] = [12, 21, 34];

impl EmaEngine {
    pub fn tracked_periods() -> &'static [u32] {
        &TRACKED_PERIODS
    }

    pub fn init(token_address: String, pair_address: String, timeframe: Timeframe, period: u32, pair_created_time: i64) -> EMAState {
        EMAState {
            token_address,
            pair_address,
            timeframe,
            period,
            ema_value: None,
            status: EmaStatus::NotAvailable,
            ema_available_time: EMAState::available_time(pair_created_time, timeframe, period),
            last_updated_unix: 0,
            next_fetch_time: 0,
        }
    }

    /// Fold every bar after `state.last_updated_unix` into the EMA, writing
    /// the result onto the matching field of each touched bar.
    pub fn apply(mut state: EMAState, bars: &mut [OHLCVCandle]) -> EMAState {
        let period = state.period as usize;
        let multiplier = EMAState::multiplier(state.period);

        // Seed window: collect closes until we have `period` of them, then
        // SMA-seed. Bars before the window close are simply skipped — they
        // contribute no value until the window fills.
        let mut seed_closes: Vec<f64> = Vec::new();
        let mut prior_ema = match state.ema_value {
            Some(v) => v.to_f64().unwrap_or(0.0),
            None => 0.0,
        };

        for bar in bars.iter_mut() {
            if bar.unix_time <= state.last_updated_unix {
                continue;
            }
            let close = bar.close.to_f64().unwrap_or(0.0);

            if state.status == EmaStatus::NotAvailable {
                seed_closes.push(close);
                if seed_closes.len() < period {
                    state.last_updated_unix = bar.unix_time;
                    continue;
                }
                let sma: f64 = seed_closes.iter().sum::<f64>() / seed_closes.len() as f64;
                prior_ema = sma;
                state.status = EmaStatus::Available;
            } else {
                prior_ema = (close - prior_ema) * multiplier + prior_ema;
            }

            let rounded = Decimal::from_f64_retain_8dp(prior_ema);
            state.ema_value = Some(rounded);
            write_field(bar, state.period, rounded);
            state.last_updated_unix = bar.unix_time;
        }

        state
    }
}

fn write_field(bar: &mut OHLCVCandle, period: u32, value: Decimal) {
    match period {
        12 => bar.ema12 = Some(value),
        21 => bar.ema21 = Some(value),
        34 => bar.ema34 = Some(value),
        _ => {}
    }
}

trait RoundedDecimal {
    fn from_f64_retain_8dp(v: f64) -> Decimal;
}

impl RoundedDecimal for Decimal {
    fn from_f64_retain_8dp(v: f64) -> Decimal {
        Decimal::from_f64_retain(v)
            .unwrap_or_default()
            .round_dp(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(unix_time: i64, close: Decimal) -> OHLCVCandle {
        OHLCVCandle {
            token_address: "tok".into(),
            pair_address: "pair".into(),
            timeframe: Timeframe::FifteenMin,
            unix_time,
            time_bucket: Timeframe::FifteenMin.floor_align(unix_time),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(100),
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
    fn seeds_with_sma_then_recurses() {
        let base = 1_704_067_200i64;
        let state = EmaEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin, 12, base);

        let mut bars: Vec<OHLCVCandle> = (0..13)
            .map(|i| bar(base + i * 900, Decimal::from(i + 1)))
            .collect();
        let state = EmaEngine::apply(state, &mut bars);

        assert_eq!(state.status, EmaStatus::Available);
        assert!(bars[11].ema12.is_none());
        assert!(bars[12].ema12.is_some());
        // SMA(1..=12) = 6.5
        assert_eq!(bars[12].ema12.unwrap(), dec!(6.5));
    }

    #[test]
    fn stays_not_available_below_window() {
        let base = 1_704_067_200i64;
        let state = EmaEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin, 21, base);
        let mut bars: Vec<OHLCVCandle> = (0..5).map(|i| bar(base + i * 900, dec!(1.0))).collect();
        let state = EmaEngine::apply(state, &mut bars);
        assert_eq!(state.status, EmaStatus::NotAvailable);
        assert!(bars.iter().all(|b| b.ema21.is_none()));
    }

    /// S1: 28 bars, closes `1.00, 1.01, .., 1.27`. EMA21 becomes available
    /// at bar index 20 (SMA of closes[0..=20] = 1.10) and the next bar
    /// advances by one recurrence step to ~1.110.
    #[test]
    fn s1_ema21_bootstrap_matches_expected_values() {
        let base = 1_704_067_200i64;
        let state = EmaEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin, 21, base);

        let closes: Vec<Decimal> = (0..28).map(|i| dec!(1.00) + Decimal::new(i, 2)).collect();
        let mut bars: Vec<OHLCVCandle> = closes.iter().enumerate().map(|(i, c)| bar(base + i as i64 * 900, *c)).collect();
        let state = EmaEngine::apply(state, &mut bars);

        assert!(bars[19].ema21.is_none());
        assert_eq!(bars[20].ema21.unwrap(), dec!(1.10));
        assert_eq!(state.status, EmaStatus::Available);

        let bar21 = bars[21].ema21.unwrap().to_f64().unwrap();
        assert!((bar21 - 1.110).abs() < 1e-3);
    }
}
