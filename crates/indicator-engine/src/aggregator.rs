use rust_decimal::Decimal;
use std::collections::BTreeMap;
use trading_core::{OHLCVCandle, Timeframe};

/// Fold an ascending sequence of lower-timeframe bars into higher-timeframe
/// bars (§4.4). A higher bar is only emitted once every lower bar its
/// bucket expects has arrived and the bucket has fully elapsed relative to
/// `now`; a sparse or still-open bucket is silently skipped (the next tick
/// picks it up once the missing bars land). `lower_bars` need not all
/// belong to one bucket — the straddling-bucket bars the scheduler passes
/// in land in the same group as the fresh ones.
pub fn aggregate(lower_bars: &[OHLCVCandle], higher_tf: Timeframe, now: i64) -> Vec<OHLCVCandle> {
    let Some(first) = lower_bars.first() else {
        return Vec::new();
    };
    let lower_tf = first.timeframe;
    let expected_per_bucket = (higher_tf.tf_sec() / lower_tf.tf_sec()).max(1) as usize;

    let mut buckets: BTreeMap<i64, Vec<&OHLCVCandle>> = BTreeMap::new();
    for bar in lower_bars {
        let bucket = higher_tf.floor_align(bar.unix_time);
        buckets.entry(bucket).or_default().push(bar);
    }

    let current_candle_start = higher_tf.current_candle_start(now);
    let mut out = Vec::new();

    for (bucket_start, mut bars) in buckets {
        bars.sort_by_key(|b| b.unix_time);

        let bucket_end = bucket_start + higher_tf.tf_sec();
        if bars.len() < expected_per_bucket || bucket_end > current_candle_start {
            continue;
        }

        let open = bars.first().expect("non-empty bucket").open;
        let close = bars.last().expect("non-empty bucket").close;
        let high = bars.iter().map(|b| b.high).max().expect("non-empty bucket");
        let low = bars.iter().map(|b| b.low).min().expect("non-empty bucket");
        let volume: Decimal = bars.iter().map(|b| b.volume).sum();
        let trades: i64 = bars.iter().map(|b| b.trades).sum();

        out.push(OHLCVCandle {
            token_address: bars[0].token_address.clone(),
            pair_address: bars[0].pair_address.clone(),
            timeframe: higher_tf,
            unix_time: bucket_start,
            time_bucket: bucket_start,
            open,
            high,
            low,
            close,
            volume,
            trades,
            is_complete: true,
            data_source: "aggregated".to_string(),
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
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(unix_time: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> OHLCVCandle {
        OHLCVCandle {
            token_address: "tok".into(),
            pair_address: "pair".into(),
            timeframe: Timeframe::FifteenMin,
            unix_time,
            time_bucket: Timeframe::FifteenMin.floor_align(unix_time),
            open,
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
    fn full_hour_aggregates_ohlcv() {
        let base = 1_704_067_200i64; // aligned hour start
        let bars = vec![
            bar(base, dec!(1.00), dec!(1.01), dec!(0.99), dec!(1.00), dec!(100)),
            bar(base + 900, dec!(1.00), dec!(1.02), dec!(0.98), dec!(1.01), dec!(100)),
            bar(base + 1800, dec!(1.01), dec!(1.03), dec!(1.00), dec!(1.02), dec!(100)),
            bar(base + 2700, dec!(1.02), dec!(1.05), dec!(1.01), dec!(1.03), dec!(100)),
        ];
        let now = base + 3600 + 1;
        let hourly = aggregate(&bars, Timeframe::OneHour, now);
        assert_eq!(hourly.len(), 1);
        let h = &hourly[0];
        assert_eq!(h.unix_time, base);
        assert_eq!(h.open, dec!(1.00));
        assert_eq!(h.close, dec!(1.03));
        assert_eq!(h.high, dec!(1.05));
        assert_eq!(h.low, dec!(0.98));
        assert_eq!(h.volume, dec!(400));
    }

    #[test]
    fn incomplete_bucket_is_skipped() {
        let base = 1_704_067_200i64;
        let bars = vec![bar(base, dec!(1.0), dec!(1.0), dec!(1.0), dec!(1.0), dec!(100))];
        let hourly = aggregate(&bars, Timeframe::OneHour, base + 3600 + 1);
        assert!(hourly.is_empty());
    }

    #[test]
    fn bucket_still_in_progress_is_skipped_even_if_full() {
        let base = 1_704_067_200i64;
        let bars = vec![
            bar(base, dec!(1.0), dec!(1.0), dec!(1.0), dec!(1.0), dec!(100)),
            bar(base + 900, dec!(1.0), dec!(1.0), dec!(1.0), dec!(1.0), dec!(100)),
            bar(base + 1800, dec!(1.0), dec!(1.0), dec!(1.0), dec!(1.0), dec!(100)),
            bar(base + 2700, dec!(1.0), dec!(1.0), dec!(1.0), dec!(1.0), dec!(100)),
        ];
        // `now` still inside the bucket's own hour.
        let hourly = aggregate(&bars, Timeframe::OneHour, base + 1800);
        assert!(hourly.is_empty());
    }
}
