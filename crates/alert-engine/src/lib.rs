//! Alert state machine (§4.9): consumes bars whose indicator columns are
//! already fully written (the caller gates on each `*AvailableTime`) and
//! turns EMA crossovers, band touches, AVWAP breakouts and Stoch-RSI
//! confluence into `AlertEvent`s. Pure in-memory compute, same shape as
//! `indicator-engine`'s engines — persistence is the caller's job.

use rust_decimal::Decimal;
use trading_core::{Alert, AlertEvent, AlertKind, AvwapPricePosition, IngestConfig, OHLCVCandle, Trend};

#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub touch_threshold_seconds: i64,
    pub oversold_k: f64,
    pub oversold_d: f64,
    pub overbought_k: f64,
    pub overbought_d: f64,
    pub max_band_touch_notifications: i32,
}

impl From<&IngestConfig> for AlertThresholds {
    fn from(cfg: &IngestConfig) -> Self {
        AlertThresholds {
            touch_threshold_seconds: cfg.touch_threshold_seconds,
            oversold_k: cfg.oversold_k,
            oversold_d: cfg.oversold_d,
            overbought_k: cfg.overbought_k,
            overbought_d: cfg.overbought_d,
            max_band_touch_notifications: cfg.max_band_touch_notifications,
        }
    }
}

fn compute_trend(short: Option<Decimal>, long: Option<Decimal>) -> Trend {
    match (short, long) {
        (Some(s), Some(l)) if s >= l => Trend::Bullish,
        (Some(s), Some(l)) if s < l => Trend::Bearish,
        (Some(_), None) => Trend::Bullish,
        _ => Trend::Neutral,
    }
}

fn touched(level: Option<Decimal>, low: Decimal, high: Decimal) -> bool {
    level.is_some_and(|v| low <= v && v <= high)
}

/// Band order + position encoding (§4.9). Bands use a letter prefix for
/// AVWAP/VWAP and the EMA's own period number otherwise, so `"AV2134"`
/// reads as AVWAP, VWAP, EMA21, EMA34 in descending-value order.
fn compute_status(mut bands: Vec<(Decimal, &'static str)>, close: Decimal, low: Decimal, high: Decimal) -> String {
    if bands.is_empty() {
        return String::new();
    }
    bands.sort_by(|a, b| b.0.cmp(&a.0));
    let order_code: String = bands.iter().map(|(_, c)| *c).collect();

    let top = bands.first().copied().unwrap();
    let bottom = bands.last().copied().unwrap();

    let (higher, lower) = if close > top.0 {
        (None, Some(top))
    } else if close < bottom.0 {
        (Some(bottom), None)
    } else {
        let mut pair = (bands[0], bands[bands.len() - 1]);
        for w in bands.windows(2) {
            if w[0].0 >= close && close >= w[1].0 {
                pair = (w[0], w[1]);
                break;
            }
        }
        (Some(pair.0), Some(pair.1))
    };

    let position_code = if lower.is_some_and(|b| touched(Some(b.0), low, high)) {
        format!("{}A", lower.unwrap().1)
    } else if higher.is_some_and(|b| touched(Some(b.0), low, high)) {
        format!("{}B", higher.unwrap().1)
    } else if higher.is_none() {
        format!("{}AC", lower.unwrap().1)
    } else if lower.is_none() {
        format!("{}BC", higher.unwrap().1)
    } else {
        format!("{}BC", higher.unwrap().1)
    };

    format!("{order_code}_{position_code}")
}

fn bands_for(avwap: Option<Decimal>, vwap: Option<Decimal>, short: Option<Decimal>, short_code: &'static str, long: Option<Decimal>, long_code: &'static str) -> Vec<(Decimal, &'static str)> {
    let mut bands = Vec::with_capacity(4);
    if let Some(v) = avwap {
        bands.push((v, "A"));
    }
    if let Some(v) = vwap {
        bands.push((v, "V"));
    }
    if let Some(v) = short {
        bands.push((v, short_code));
    }
    if let Some(v) = long {
        bands.push((v, long_code));
    }
    bands
}

pub struct AlertEngine;

impl AlertEngine {
    pub fn init(token_address: String, pair_address: String, timeframe: trading_core::Timeframe) -> Alert {
        Alert {
            token_address,
            pair_address,
            timeframe,
            vwap: None,
            avwap: None,
            ema12: None,
            ema21: None,
            ema34: None,
            rsi: None,
            stoch_k: None,
            stoch_d: None,
            trend: None,
            status: None,
            trend12: None,
            status12: None,
            touch_count: 0,
            latest_touch_unix: None,
            touch_count12: 0,
            latest_touch_unix12: None,
            avwap_price_position: None,
            last_updated_unix: 0,
        }
    }

    /// Fold every bar after `state.last_updated_unix`, writing `trend`,
    /// `status`, `trend12`, `status12` onto each bar and returning the
    /// events it fired along the way.
    pub fn apply(mut state: Alert, thresholds: &AlertThresholds, symbol: &str, bars: &mut [OHLCVCandle]) -> (Alert, Vec<AlertEvent>) {
        let mut events = Vec::new();

        for bar in bars.iter_mut() {
            if bar.unix_time <= state.last_updated_unix {
                continue;
            }

            let cur_trend = compute_trend(bar.ema21, bar.ema34);
            let cur_trend12 = compute_trend(bar.ema12, bar.ema21);
            let status = compute_status(
                bands_for(bar.avwap_value, bar.vwap_value, bar.ema21, "21", bar.ema34, "34"),
                bar.close,
                bar.low,
                bar.high,
            );
            let status12 = compute_status(
                bands_for(bar.avwap_value, bar.vwap_value, bar.ema12, "12", bar.ema21, "21"),
                bar.close,
                bar.low,
                bar.high,
            );

            bar.trend = Some(cur_trend);
            bar.status = Some(status.clone());
            bar.trend12 = Some(cur_trend12);
            bar.status12 = Some(status12.clone());

            let prev_trend = state.trend;
            let prev_trend12 = state.trend12;

            let make_event = |kind: AlertKind, touched_band: Option<String>, strategy_label: &str| AlertEvent {
                kind,
                token_address: bar.token_address.clone(),
                symbol: symbol.to_string(),
                pair_address: bar.pair_address.clone(),
                timeframe: bar.timeframe,
                unix_time: bar.unix_time,
                close: bar.close,
                touched_band,
                strategy_label: strategy_label.to_string(),
                market_cap: None,
            };

            // --- 21/34 pair ---
            if prev_trend == Some(Trend::Bearish) && cur_trend == Trend::Bullish {
                state.touch_count = 0;
                state.latest_touch_unix = Some(bar.unix_time);
                events.push(make_event(AlertKind::BullishCross, None, "ema21_34"));
            } else if prev_trend == Some(Trend::Bullish) && cur_trend == Trend::Bearish {
                state.touch_count = 0;
                events.push(make_event(AlertKind::BearishCross, None, "ema21_34"));
            }

            let touches_21 = touched(bar.ema21, bar.low, bar.high);
            let touches_34 = touched(bar.ema34, bar.low, bar.high);
            let within_cooldown = state
                .latest_touch_unix
                .is_some_and(|t| bar.unix_time - t < thresholds.touch_threshold_seconds);

            if cur_trend == Trend::Bullish && prev_trend != Some(Trend::Bearish) && (touches_21 || touches_34) && !within_cooldown {
                state.touch_count += 1;
                state.latest_touch_unix = Some(bar.unix_time);
                if state.touch_count >= 1 && state.touch_count <= thresholds.max_band_touch_notifications {
                    let band = if touches_21 { "ema21" } else { "ema34" };
                    events.push(make_event(AlertKind::BandTouch, Some(band.to_string()), "ema21_34"));
                }
            }

            // --- 12/21 pair ---
            if prev_trend12 == Some(Trend::Bearish) && cur_trend12 == Trend::Bullish {
                state.touch_count12 = 0;
                state.latest_touch_unix12 = Some(bar.unix_time);
                events.push(make_event(AlertKind::BullishCross12, None, "ema12_21"));
            } else if prev_trend12 == Some(Trend::Bullish) && cur_trend12 == Trend::Bearish {
                state.touch_count12 = 0;
                events.push(make_event(AlertKind::BearishCross12, None, "ema12_21"));
            }

            let touches_12 = touched(bar.ema12, bar.low, bar.high);
            let touches_21_again = touched(bar.ema21, bar.low, bar.high);
            let within_cooldown12 = state
                .latest_touch_unix12
                .is_some_and(|t| bar.unix_time - t < thresholds.touch_threshold_seconds);

            if cur_trend12 == Trend::Bullish && prev_trend12 != Some(Trend::Bearish) && (touches_12 || touches_21_again) && !within_cooldown12 {
                state.touch_count12 += 1;
                state.latest_touch_unix12 = Some(bar.unix_time);
                if state.touch_count12 >= 1 && state.touch_count12 <= thresholds.max_band_touch_notifications {
                    let band = if touches_12 { "ema12" } else { "ema21" };
                    events.push(make_event(AlertKind::BandTouch12, Some(band.to_string()), "ema12_21"));
                }
            }

            // --- AVWAP breakout/breakdown ---
            if let Some(avwap) = bar.avwap_value {
                if bar.close > avwap && state.avwap_price_position == Some(AvwapPricePosition::Below) {
                    state.avwap_price_position = Some(AvwapPricePosition::Above);
                    events.push(make_event(AlertKind::AvwapBreakout, None, "avwap"));
                } else if bar.close < avwap && state.avwap_price_position == Some(AvwapPricePosition::Above) {
                    state.avwap_price_position = Some(AvwapPricePosition::Below);
                    events.push(make_event(AlertKind::AvwapBreakdown, None, "avwap"));
                } else if state.avwap_price_position.is_none() {
                    state.avwap_price_position = Some(if bar.close >= avwap {
                        AvwapPricePosition::Above
                    } else {
                        AvwapPricePosition::Below
                    });
                }
            }

            // --- Stoch-RSI confluence, evaluated once per EMA pair ---
            if let (Some(k), Some(d)) = (bar.stoch_k, bar.stoch_d) {
                let k = k;
                let d = d;
                if cur_trend == Trend::Bullish && (touches_21 || touches_34) {
                    let band = if touches_21 { "ema21" } else { "ema34" };
                    if k < Decimal::from_f64_retain(thresholds.oversold_k).unwrap_or_default() && d < Decimal::from_f64_retain(thresholds.oversold_d).unwrap_or_default() {
                        events.push(make_event(AlertKind::StochRsiOversold, Some(band.to_string()), "ema21_34"));
                    }
                    if k > Decimal::from_f64_retain(thresholds.overbought_k).unwrap_or_default() && d > Decimal::from_f64_retain(thresholds.overbought_d).unwrap_or_default() {
                        events.push(make_event(AlertKind::StochRsiOverbought, Some(band.to_string()), "ema21_34"));
                    }
                }
                if cur_trend12 == Trend::Bullish && (touches_12 || touches_21_again) {
                    let band = if touches_12 { "ema12" } else { "ema21" };
                    if k < Decimal::from_f64_retain(thresholds.oversold_k).unwrap_or_default() && d < Decimal::from_f64_retain(thresholds.oversold_d).unwrap_or_default() {
                        events.push(make_event(AlertKind::StochRsiOversold, Some(band.to_string()), "ema12_21"));
                    }
                    if k > Decimal::from_f64_retain(thresholds.overbought_k).unwrap_or_default() && d > Decimal::from_f64_retain(thresholds.overbought_d).unwrap_or_default() {
                        events.push(make_event(AlertKind::StochRsiOverbought, Some(band.to_string()), "ema12_21"));
                    }
                }
            }

            state.vwap = bar.vwap_value;
            state.avwap = bar.avwap_value;
            state.ema12 = bar.ema12;
            state.ema21 = bar.ema21;
            state.ema34 = bar.ema34;
            state.rsi = bar.rsi;
            state.stoch_k = bar.stoch_k;
            state.stoch_d = bar.stoch_d;
            state.trend = Some(cur_trend);
            state.status = Some(status);
            state.trend12 = Some(cur_trend12);
            state.status12 = Some(status12);
            state.last_updated_unix = bar.unix_time;
        }

        (state, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::Timeframe;

    fn bar(unix_time: i64, close: Decimal, ema21: Decimal, ema34: Decimal) -> OHLCVCandle {
        OHLCVCandle {
            token_address: "tok".into(),
            pair_address: "pair".into(),
            timeframe: Timeframe::FifteenMin,
            unix_time,
            time_bucket: Timeframe::FifteenMin.floor_align(unix_time),
            open: close,
            high: close + dec!(0.01),
            low: close - dec!(0.01),
            close,
            volume: dec!(100),
            trades: 1,
            is_complete: true,
            data_source: "test".into(),
            vwap_value: Some(close),
            avwap_value: Some(close),
            ema12: Some(ema21),
            ema21: Some(ema21),
            ema34: Some(ema34),
            rsi: Some(dec!(50)),
            stoch_rsi: Some(dec!(50)),
            stoch_k: Some(dec!(50)),
            stoch_d: Some(dec!(50)),
            trend: None,
            status: None,
            trend12: None,
            status12: None,
        }
    }

    #[test]
    fn bullish_cross_emits_and_resets_touch_count() {
        let state = AlertEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin);
        let thresholds = AlertThresholds::from(&IngestConfig::default());
        let base = 1_704_067_200i64;
        let mut bars = vec![
            bar(base, dec!(1.00), dec!(0.90), dec!(1.00)), // bearish: 21 < 34
            bar(base + 900, dec!(1.10), dec!(1.05), dec!(1.00)), // bullish: 21 >= 34
        ];
        let (state, events) = AlertEngine::apply(state, &thresholds, "TOK", &mut bars);
        assert!(events.iter().any(|e| e.kind == AlertKind::BullishCross));
        assert_eq!(state.touch_count, 0);
        assert_eq!(bars[1].trend, Some(Trend::Bullish));
    }

    /// S3: bullish cross resets the touch count, a touch inside the
    /// cooldown window is suppressed, touches after cooldown emit up to
    /// `max_band_touch_notifications` and keep counting past the cap
    /// without emitting further events.
    #[test]
    fn s3_touch_cooldown_caps_emission_past_the_configured_max() {
        let state = AlertEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin);
        let thresholds = AlertThresholds::from(&IngestConfig::default());
        let base = 1_704_067_200i64;

        let mut bars = vec![
            bar(base, dec!(1.00), dec!(0.90), dec!(1.00)),                 // bearish
            bar(base + 900, dec!(1.10), dec!(1.05), dec!(1.00)),          // bullish cross
            bar(base + 900 + 100, dec!(1.05), dec!(1.05), dec!(1.00)),    // touch, within cooldown
            bar(base + 900 + 7_300, dec!(1.05), dec!(1.05), dec!(1.00)),  // touch 1, after cooldown
            bar(base + 900 + 7_300 * 2, dec!(1.05), dec!(1.05), dec!(1.00)), // touch 2
            bar(base + 900 + 7_300 * 3, dec!(1.05), dec!(1.05), dec!(1.00)), // touch 3, over the cap
        ];
        let (state, events) = AlertEngine::apply(state, &thresholds, "TOK", &mut bars);

        let touch_events: Vec<_> = events.iter().filter(|e| e.kind == AlertKind::BandTouch).collect();
        assert_eq!(touch_events.len(), 2);
        assert_eq!(touch_events[0].touched_band.as_deref(), Some("ema21"));
        assert_eq!(state.touch_count, 3);
    }

    /// S5: in a bullish trend with price touching EMA21, a Stoch-RSI
    /// reading below the oversold thresholds (K=12, D=15 vs 20/20) fires
    /// `STOCH_RSI_OVERSOLD`; a reading that only clears K (K=25) does not.
    #[test]
    fn s5_stoch_rsi_oversold_confluence_requires_both_k_and_d_under_threshold() {
        let thresholds = AlertThresholds::from(&IngestConfig::default());
        let base = 1_704_067_200i64;

        let state = AlertEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin);
        let mut oversold = vec![bar(base, dec!(1.05), dec!(1.05), dec!(1.00))];
        oversold[0].stoch_k = Some(dec!(12));
        oversold[0].stoch_d = Some(dec!(15));
        let (_, events) = AlertEngine::apply(state, &thresholds, "TOK", &mut oversold);
        let oversold_event = events.iter().find(|e| e.kind == AlertKind::StochRsiOversold);
        assert!(oversold_event.is_some());
        assert_eq!(oversold_event.unwrap().touched_band.as_deref(), Some("ema21"));

        let state = AlertEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin);
        let mut not_oversold = vec![bar(base, dec!(1.05), dec!(1.05), dec!(1.00))];
        not_oversold[0].stoch_k = Some(dec!(25));
        not_oversold[0].stoch_d = Some(dec!(15));
        let (_, events) = AlertEngine::apply(state, &thresholds, "TOK", &mut not_oversold);
        assert!(!events.iter().any(|e| e.kind == AlertKind::StochRsiOversold));
    }

    #[test]
    fn avwap_breakout_flips_position_once() {
        let state = AlertEngine::init("tok".into(), "pair".into(), Timeframe::FifteenMin);
        let thresholds = AlertThresholds::from(&IngestConfig::default());
        let base = 1_704_067_200i64;
        let mut first = vec![bar(base, dec!(0.90), dec!(1.0), dec!(1.0))];
        first[0].avwap_value = Some(dec!(1.00));
        let (state, _) = AlertEngine::apply(state, &thresholds, "TOK", &mut first);
        assert_eq!(state.avwap_price_position, Some(AvwapPricePosition::Below));

        let mut second = vec![bar(base + 900, dec!(1.10), dec!(1.0), dec!(1.0))];
        second[0].avwap_value = Some(dec!(1.00));
        let (state, events) = AlertEngine::apply(state, &thresholds, "TOK", &mut second);
        assert_eq!(state.avwap_price_position, Some(AvwapPricePosition::Above));
        assert!(events.iter().any(|e| e.kind == AlertKind::AvwapBreakout));
    }
}
