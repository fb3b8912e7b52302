use std::collections::HashMap;

use common::QuoteFields;

/// Static quotes served when neither the providers nor the cache can answer,
/// keyed by instrument id.
pub fn builtin() -> HashMap<String, QuoteFields> {
    let rows = [
        // id, price, change %, change, open, high, low, volume
        ("sh600519", 1485.30, -0.09, -1.30, 1486.60, 1487.00, 1480.00, 41_679.0),
        ("sh600036", 38.99, 0.15, 0.05, 38.90, 39.10, 38.80, 28_394.0),
        ("sz000858", 106.06, 1.38, 1.44, 104.62, 106.50, 104.20, 241_240.0),
        ("hk00700", 533.00, 0.19, 1.00, 532.00, 535.00, 530.00, 1_234_567.0),
    ];
    rows.into_iter()
        .map(|(id, price, change_pct, change, open, high, low, volume)| {
            let fields = QuoteFields {
                price,
                change_pct,
                change: Some(change),
                open: Some(open),
                high: Some(high),
                low: Some(low),
                volume: Some(volume),
                prev_close: Some(price - change),
            };
            (id.to_string(), fields)
        })
        .collect()
}
