use std::collections::VecDeque;

use super::Indicator;

/// Simple moving average: arithmetic mean of the last `period` values.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
    window: VecDeque<f64>,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "SMA period must be > 0");
        Self {
            period,
            name: format!("MA{period}"),
            window: VecDeque::with_capacity(period),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> usize {
        self.period
    }

    fn next(&mut self, value: f64) -> Option<f64> {
        self.window.push_back(value);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        if self.window.len() < self.period {
            return None;
        }
        // Summed oldest to newest on every step, so no drift accumulates.
        Some(self.window.iter().sum::<f64>() / self.period as f64)
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::series;

    #[test]
    fn leading_entries_are_undefined() {
        let mut sma = Sma::new(3);
        let out = series(&mut sma, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[3], Some(3.0));
    }

    #[test]
    fn matches_worked_example() {
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 14.0, 12.0, 10.0];
        let out = series(&mut Sma::new(3), &closes);
        assert_eq!(out[2], Some(11.0));
        assert_eq!(out[9], Some(12.0));
    }

    #[test]
    fn streaming_equals_bulk() {
        let closes = [5.0, 7.0, 6.0, 9.0, 12.0, 11.0];
        let bulk = series(&mut Sma::new(2), &closes);

        let mut streaming = Sma::new(2);
        let incremental: Vec<_> = closes.iter().map(|&c| streaming.next(c)).collect();
        assert_eq!(bulk, incremental);
    }

    #[test]
    fn window_longer_than_series_never_defines() {
        let out = series(&mut Sma::new(99), &[1.0; 5]);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn reset_clears_history() {
        let mut sma = Sma::new(2);
        sma.next(1.0);
        sma.next(3.0);
        sma.reset();
        assert_eq!(sma.next(10.0), None);
        assert_eq!(sma.next(20.0), Some(15.0));
    }

    #[test]
    #[should_panic(expected = "SMA period must be > 0")]
    fn zero_period_panics() {
        Sma::new(0);
    }
}
