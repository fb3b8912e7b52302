//! Plain-text renderings of signals for chat delivery.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use common::{InstrumentSignal, Market, PriceQuote, SignalKind};

fn currency(market: Market) -> &'static str {
    match market {
        Market::Crypto => "$",
        Market::AShare => "¥",
        Market::HShare => "HK$",
    }
}

fn market_label(market: Market) -> &'static str {
    match market {
        Market::Crypto => "Crypto",
        Market::AShare => "A-share",
        Market::HShare => "H-share",
    }
}

fn emoji(signal: SignalKind) -> &'static str {
    if signal.is_buy() {
        "🟢"
    } else if signal.is_sell() {
        "🔴"
    } else {
        "🟡"
    }
}

/// Alert for one instrument's signal. Price and change come from `quote`
/// when available, else from the signal's own indicator values.
pub fn signal_message(
    signal: &InstrumentSignal,
    quote: Option<&PriceQuote>,
    at: DateTime<Utc>,
) -> String {
    let values = &signal.indicator_values;
    let price = quote.map(|q| q.price).or(values.price);
    let change = quote.map(|q| q.change_pct).or(values.change_pct);
    let cur = currency(signal.market);

    let mut text = format!("{} {} signal\n\n", emoji(signal.signal), signal.signal);
    let _ = writeln!(
        text,
        "{} {} ({})",
        market_label(signal.market),
        signal.symbol,
        signal.name
    );
    match price {
        Some(p) => {
            let _ = writeln!(text, "Price: {cur}{p:.2}");
        }
        None => text.push_str("Price: n/a\n"),
    }
    match change {
        Some(c) => {
            let _ = writeln!(text, "Change: {c:+.2}%");
        }
        None => text.push_str("Change: n/a\n"),
    }
    let _ = writeln!(text, "Signal: {}", signal.signal);
    let reason = if signal.reasons.is_empty() {
        "no rule fired".to_string()
    } else {
        signal.reasons.join("; ")
    };
    let _ = writeln!(text, "Reason: {reason}");
    let _ = write!(text, "\n🕐 {}", at.format("%Y-%m-%d %H:%M UTC"));
    text
}

/// One line of the daily summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub price: f64,
    pub change_pct: f64,
    pub signal: SignalKind,
}

impl SummaryEntry {
    pub fn new(quote: &PriceQuote, signal: SignalKind) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            name: quote.name.clone(),
            market: quote.market,
            price: quote.price,
            change_pct: quote.change_pct,
            signal,
        }
    }
}

/// Buy-class and sell-class instruments grouped under their own headings.
/// HOLDs are left out.
pub fn daily_summary(entries: &[SummaryEntry], at: DateTime<Utc>) -> String {
    let mut text = String::from("📊 Daily signal summary\n\n");

    let groups = [
        ("🟢 Buy signals:", entries.iter().filter(|e| e.signal.is_buy()).collect::<Vec<_>>()),
        ("🔴 Sell signals:", entries.iter().filter(|e| e.signal.is_sell()).collect()),
    ];

    let mut any = false;
    for (heading, group) in groups.iter().filter(|(_, g)| !g.is_empty()) {
        any = true;
        let _ = writeln!(text, "{heading}");
        for e in group {
            let _ = writeln!(
                text,
                "  • {} {} {}{:.2} ({:+.2}%) {}",
                e.symbol,
                e.name,
                currency(e.market),
                e.price,
                e.change_pct,
                e.signal
            );
        }
        text.push('\n');
    }
    if !any {
        text.push_str("No buy or sell signals today.\n");
    }

    let _ = write!(text, "\n🕐 {}", at.format("%Y-%m-%d %H:%M UTC"));
    text
}
