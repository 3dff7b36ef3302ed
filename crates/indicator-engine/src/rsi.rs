use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use trading_core::{OHLCVCandle, RSIState, RsiStatus};

/// Wilder RSI cascaded into Stoch-RSI / %K / %D (§4.8). All math runs in
/// `f64`; only the values written onto candles / persisted get rounded to
/// Decimal(8dp).
pub struct RsiEngine;

fn push_capped(buf: &mut Vec<f64>, value: f64, cap: usize) {
    buf.push(value);
    if buf.len() > cap {
        buf.remove(0);
    }
}

fn mean(buf: &[f64]) -> f64 {
    buf.iter().sum::<f64>() / buf.len() as f64
}

fn round8(v: f64) -> Decimal {
    Decimal::from_f64_retain(v).unwrap_or_default().round_dp(8)
}

impl RsiEngine {
    /// Fold every bar after `state.last_updated_unix`, writing `rsi`,
    /// `stoch_rsi`, `stoch_k`, `stoch_d` onto each bar once its respective
    /// window has filled.
    pub fn apply(mut state: RSIState, bars: &mut [OHLCVCandle]) -> RSIState {
        for bar in bars.iter_mut() {
            if bar.unix_time <= state.last_updated_unix {
                continue;
            }
            let close = bar.close.to_f64().unwrap_or(0.0);

            let Some(prev_close) = state.last_close_price else {
                state.last_close_price = Some(close);
                state.last_updated_unix = bar.unix_time;
                continue;
            };

            let delta = close - prev_close;
            let gain = delta.max(0.0);
            let loss = (-delta).max(0.0);

            if state.status == RsiStatus::Building {
                state.seed_gains.push(gain);
                state.seed_losses.push(loss);
                if state.seed_gains.len() < state.rsi_interval as usize {
                    state.last_close_price = Some(close);
                    state.last_updated_unix = bar.unix_time;
                    continue;
                }
                state.avg_gain = mean(&state.seed_gains);
                state.avg_loss = mean(&state.seed_losses);
                state.seed_gains.clear();
                state.seed_losses.clear();
                state.status = RsiStatus::Available;
            } else {
                let n = state.rsi_interval as f64;
                state.avg_gain = (state.avg_gain * (n - 1.0) + gain) / n;
                state.avg_loss = (state.avg_loss * (n - 1.0) + loss) / n;
            }

            let rsi = if state.avg_loss == 0.0 {
                100.0
            } else {
                let rs = state.avg_gain / state.avg_loss;
                100.0 - 100.0 / (1.0 + rs)
            };
            state.rsi_value = Some(rsi);
            bar.rsi = Some(round8(rsi));
            push_capped(&mut state.rsi_values, rsi, state.stoch_rsi_interval as usize);

            if state.rsi_values.len() >= state.stoch_rsi_interval as usize {
                let lo = state.rsi_values.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = state.rsi_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let stoch = if hi > lo { (rsi - lo) / (hi - lo) } else { 0.5 };
                state.stoch_rsi_value = Some(stoch);
                bar.stoch_rsi = Some(round8(stoch * 100.0));
                push_capped(&mut state.stoch_rsi_values, stoch * 100.0, state.k_interval as usize);

                if state.stoch_rsi_values.len() >= state.k_interval as usize {
                    let k = mean(&state.stoch_rsi_values);
                    state.k_value = Some(k);
                    bar.stoch_k = Some(round8(k));
                    push_capped(&mut state.k_values, k, state.d_interval as usize);

                    if state.k_values.len() >= state.d_interval as usize {
                        let d = mean(&state.k_values);
                        state.d_value = Some(d);
                        bar.stoch_d = Some(round8(d));
                    }
                }
            }

            state.last_close_price = Some(close);
            state.last_updated_unix = bar.unix_time;
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::Timeframe;

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
    fn rsi_first_defined_after_fifteen_closes() {
        let base = 1_704_067_200i64;
        let state = RSIState::new("tok".into(), "pair".into(), Timeframe::FifteenMin, base);

        // 14 deltas need 15 closes: the first bar only primes last_close_price.
        let closes: Vec<Decimal> = (0..16).map(|i| Decimal::from(100 + i)).collect();
        let mut bars: Vec<OHLCVCandle> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| bar(base + i as i64 * 900, *c))
            .collect();
        let state = RsiEngine::apply(state, &mut bars);

        assert!(bars[13].rsi.is_none());
        assert!(bars[14].rsi.is_some());
        assert_eq!(state.status, RsiStatus::Available);
        // Monotonically rising closes drive avg_loss to zero -> RSI saturates at 100.
        assert_eq!(bars[14].rsi.unwrap(), dec!(100));
    }

    #[test]
    fn flat_prices_yield_neutral_rsi() {
        let base = 1_704_067_200i64;
        let state = RSIState::new("tok".into(), "pair".into(), Timeframe::FifteenMin, base);
        let mut bars: Vec<OHLCVCandle> = (0..16).map(|i| bar(base + i * 900, dec!(100))).collect();
        let state = RsiEngine::apply(state, &mut bars);
        // avg_gain == avg_loss == 0 -> the zero-loss branch saturates to 100,
        // matching the same edge case as a strictly rising series.
        assert_eq!(bars[14].rsi.unwrap(), dec!(100));
        assert_eq!(state.status, RsiStatus::Available);
    }
}
