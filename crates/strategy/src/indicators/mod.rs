pub mod rsi;
pub mod set;
pub mod sma;

pub use rsi::Rsi;
pub use set::{IndicatorSeries, IndicatorSet, LatestValues};
pub use sma::Sma;

/// Streaming indicator: one price in, one value out.
///
/// `next` returns `None` until enough samples have been seen. The bulk series
/// over a history is built by feeding the same primitive (see [`series`]).
pub trait Indicator: Send + Sync {
    fn name(&self) -> &str;

    /// Window length.
    fn period(&self) -> usize;

    fn next(&mut self, value: f64) -> Option<f64>;

    /// Forget all samples seen so far.
    fn reset(&mut self);
}

/// Run `indicator` over `values` from a clean state.
/// The output has exactly one entry per input value.
pub fn series<I: Indicator + ?Sized>(indicator: &mut I, values: &[f64]) -> Vec<Option<f64>> {
    indicator.reset();
    values.iter().map(|&v| indicator.next(v)).collect()
}
