use rust_decimal::Decimal;
use trading_core::{AVWAPState, OHLCVCandle, Timeframe};

/// Anchored VWAP (§4.6): identical fold math to the session VWAP, but the
/// cumulative sums never reset — they run from pair creation onward.
pub struct AvwapEngine;

impl AvwapEngine {
    /// First-ever state for a pair, anchored at `anchor_unix` (the pair's
    /// creation bar). `last_updated_unix` is seeded one tick before the
    /// anchor so the first fold includes the anchor bar itself (§4.6).
    pub fn init(token_address: String, pair_address: String, timeframe: Timeframe, anchor_unix: i64) -> AVWAPState {
        AVWAPState {
            token_address,
            pair_address,
            timeframe,
            avwap: Decimal::ZERO,
            cumulative_pv: Decimal::ZERO,
            cumulative_volume: Decimal::ZERO,
            last_updated_unix: anchor_unix - 1,
            next_fetch_time: 0,
        }
    }

    /// Fold every bar whose `unix_time` is strictly after `state.last_updated_unix`.
    pub fn fold(mut state: AVWAPState, bars: &mut [OHLCVCandle]) -> AVWAPState {
        for bar in bars.iter_mut() {
            if bar.unix_time <= state.last_updated_unix {
                continue;
            }
            if bar.volume > Decimal::ZERO {
                let typical = (bar.high + bar.low + bar.close) / Decimal::from(3);
                state.cumulative_pv += typical * bar.volume;
                state.cumulative_volume += bar.volume;
            }
            if state.cumulative_volume > Decimal::ZERO {
                state.avwap = state.cumulative_pv / state.cumulative_volume;
            }
            bar.avwap_value = Some(state.avwap);
            state.last_updated_unix = bar.unix_time;
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
    fn carries_cumulative_sums_across_days() {
        let anchor = 1_704_067_200i64;
        let state = AvwapEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin, anchor);

        let mut day_one = vec![bar(anchor, dec!(1.0), dec!(1.0), dec!(1.0), dec!(100))];
        let state = AvwapEngine::fold(state, &mut day_one);
        let carried_volume = state.cumulative_volume;
        assert_eq!(carried_volume, dec!(100));

        let mut day_two = vec![bar(anchor + 86_400, dec!(2.0), dec!(2.0), dec!(2.0), dec!(100))];
        let state = AvwapEngine::fold(state, &mut day_two);
        assert_eq!(state.cumulative_volume, dec!(200));
        assert_eq!(state.avwap, dec!(1.5));
    }

    #[test]
    fn never_resets_on_day_boundary() {
        let anchor = 1_704_067_200i64;
        let state = AvwapEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin, anchor);
        let mut bars = vec![
            bar(anchor, dec!(1.0), dec!(1.0), dec!(1.0), dec!(50)),
            bar(anchor + 86_400 * 3, dec!(1.0), dec!(1.0), dec!(1.0), dec!(50)),
        ];
        let state = AvwapEngine::fold(state, &mut bars);
        assert_eq!(state.cumulative_volume, dec!(100));
        assert_eq!(state.last_updated_unix, anchor + 86_400 * 3);
    }
}
