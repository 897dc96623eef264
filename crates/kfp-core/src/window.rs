use std::collections::VecDeque;

use crate::error::{PipelineError, Result};
use crate::signal::PricePoint;

/// Fixed-capacity rolling buffer of recent prices.
///
/// Oldest points are evicted first once `capacity` is reached. First
/// differences are derived on demand, never stored.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    points: VecDeque<PricePoint>,
    capacity: usize,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::invalid_config(
                "history window capacity must be positive",
            ));
        }
        Ok(Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a point, evicting the oldest if the window is full.
    pub fn push(&mut self, point: PricePoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// True once the window holds `capacity` points.
    #[inline]
    pub fn ready(&self) -> bool {
        self.points.len() >= self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    /// Prices in arrival order.
    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// `price[i + 1] - price[i]` over the current contents.
    pub fn diffs(&self) -> Result<Vec<f64>> {
        if self.points.len() < 2 {
            return Err(PipelineError::insufficient_history(2, self.points.len()));
        }
        Ok(self
            .points
            .iter()
            .zip(self.points.iter().skip(1))
            .map(|(a, b)| b.price - a.price)
            .collect())
    }

    /// The last `count` diffs, or all of them when fewer exist.
    pub fn recent_diffs(&self, count: usize) -> Result<Vec<f64>> {
        let mut diffs = self.diffs()?;
        if diffs.len() > count {
            diffs.drain(..diffs.len() - count);
        }
        Ok(diffs)
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_from(prices: &[f64], capacity: usize) -> HistoryWindow {
        let mut window = HistoryWindow::new(capacity).unwrap();
        for (i, &p) in prices.iter().enumerate() {
            window.push(PricePoint::new(i as i64 * 86_400, p));
        }
        window
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(HistoryWindow::new(0).is_err());
    }

    #[test]
    fn test_evicts_oldest() {
        let window = window_from(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window.prices(), vec![3.0, 4.0, 5.0]);
        assert_eq!(window.latest().unwrap().price, 5.0);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut window = HistoryWindow::new(4).unwrap();
        for i in 0..50 {
            window.push(PricePoint::new(i, i as f64 * 0.5));
            assert!(window.len() <= 4);
        }
        assert!(window.ready());
    }

    #[test]
    fn test_ready_only_when_full() {
        let window = window_from(&[1.0, 2.0], 3);
        assert!(!window.ready());
        let window = window_from(&[1.0, 2.0, 3.0], 3);
        assert!(window.ready());
    }

    #[test]
    fn test_diffs_when_full() {
        let prices = [100.0, 101.0, 99.0, 102.0, 103.0, 101.0, 104.0, 105.0, 103.0, 106.0];
        let window = window_from(&prices, 10);
        let diffs = window.diffs().unwrap();
        assert_eq!(diffs.len(), 9);
        for i in 0..9 {
            assert_eq!(diffs[i], prices[i + 1] - prices[i]);
        }
    }

    #[test]
    fn test_diffs_insufficient() {
        let window = window_from(&[100.0], 5);
        assert_eq!(
            window.diffs(),
            Err(PipelineError::insufficient_history(2, 1))
        );
        let empty = HistoryWindow::new(5).unwrap();
        assert!(empty.diffs().is_err());
    }

    #[test]
    fn test_recent_diffs() {
        let window = window_from(&[1.0, 2.0, 4.0, 7.0, 11.0], 5);
        assert_eq!(window.recent_diffs(2).unwrap(), vec![3.0, 4.0]);
        assert_eq!(window.recent_diffs(10).unwrap().len(), 4);
    }
}
