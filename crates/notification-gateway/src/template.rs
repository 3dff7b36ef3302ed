use trading_core::{AlertEvent, AlertKind};

use crate::format_unix_time;

fn headline(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::BullishCross => "Bullish Cross (EMA21/34)",
        AlertKind::BullishCross12 => "Bullish Cross (EMA12/21)",
        AlertKind::BearishCross => "Bearish Cross (EMA21/34)",
        AlertKind::BearishCross12 => "Bearish Cross (EMA12/21)",
        AlertKind::BandTouch => "Band Touch (EMA21/34)",
        AlertKind::BandTouch12 => "Band Touch (EMA12/21)",
        AlertKind::AvwapBreakout => "AVWAP Breakout",
        AlertKind::AvwapBreakdown => "AVWAP Breakdown",
        AlertKind::StochRsiOversold => "Stoch-RSI Oversold",
        AlertKind::StochRsiOverbought => "Stoch-RSI Overbought",
    }
}

/// Plain-text message body. Chat-specific formatting (embeds, markdown) is
/// the channel's job — this is the common content every channel shares.
pub fn format_message(event: &AlertEvent, now: i64) -> String {
    let mut lines = vec![
        format!("{} — {}", headline(event.kind), event.symbol),
        format!("Token: {}", event.token_address),
        format!("Timeframe: {}", event.timeframe.as_str()),
        format!("Close: {}", event.close),
        format!("Time: {}", format_unix_time(event.unix_time)),
    ];
    if let Some(band) = &event.touched_band {
        lines.push(format!("Touched: {band}"));
    }
    if let Some(mc) = event.market_cap {
        lines.push(format!("Market cap: {mc}"));
    }
    lines.push(format!("Strategy: {}", event.strategy_label));
    lines.push(format!("Generated: {}", format_unix_time(now)));
    lines.join("\n")
}
