use trading_core::AlertEvent;

use crate::InlineButton;

/// Deep-link templates mirroring the source deployment's per-strategy URL
/// constants (DexScreener chart, Raydium swap, TradingView chart).
pub fn buttons_for(event: &AlertEvent) -> Vec<InlineButton> {
    vec![
        InlineButton {
            label: "DexScreener".to_string(),
            url: format!("https://dexscreener.com/solana/{}", event.token_address),
        },
        InlineButton {
            label: "Swap on Raydium".to_string(),
            url: format!(
                "https://raydium.io/swap/?inputCurrency=sol&outputCurrency={}",
                event.token_address
            ),
        },
        InlineButton {
            label: "TradingView".to_string(),
            url: format!("https://www.tradingview.com/chart/?symbol={}USD", event.symbol),
        },
    ]
}
