//! Bounded FIFO windows and the running statistics used for convergence gating.

use std::fmt;

use ringbuf::{traits::*, HeapRb};

/// Fixed-capacity FIFO window
///
/// The window may hold `capacity + 1` elements for a moment: callers push first,
/// evaluate the overflowed window, then evict the oldest entry. The ring buffer
/// therefore reserves one extra slot.
pub struct FifoWindow<T> {
    ring: HeapRb<T>,
    capacity: usize,
}

impl<T> fmt::Debug for FifoWindow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoWindow")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> FifoWindow<T> {
    /// Create a window that is "full" at `capacity` elements
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity + 1),
            capacity,
        }
    }

    /// Append the newest element
    ///
    /// If the extra slot is already taken the oldest element is dropped first,
    /// so the window never exceeds `capacity + 1`.
    #[inline]
    pub fn push(&mut self, value: T) {
        if self.ring.is_full() {
            let _ = self.ring.try_pop();
        }
        let _ = self.ring.try_push(value);
    }

    /// Remove and return the oldest element
    #[inline]
    pub fn pop_oldest(&mut self) -> Option<T> {
        self.ring.try_pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// True once the window holds more than `capacity` elements
    #[inline]
    pub fn is_overflowed(&self) -> bool {
        self.len() > self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest → newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.ring.iter()
    }

    /// Most recently pushed element
    pub fn latest(&self) -> Option<&T> {
        self.ring.iter().last()
    }

    pub fn clear(&mut self) {
        while self.ring.try_pop().is_some() {}
    }
}

/// Arithmetic mean, `0.0` for an empty input
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor `N`), `0.0` for an empty input
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_overflow_and_eviction() {
        let mut window = FifoWindow::new(3);
        for v in [1, 2, 3] {
            window.push(v);
        }
        assert!(!window.is_overflowed());

        window.push(4);
        assert!(window.is_overflowed());
        assert_eq!(window.len(), 4);

        assert_eq!(window.pop_oldest(), Some(1));
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(window.latest(), Some(&4));
    }

    #[test]
    fn test_window_never_exceeds_capacity_plus_one() {
        let mut window = FifoWindow::new(2);
        for v in 0..10 {
            window.push(v);
            assert!(window.len() <= 3);
        }
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![7, 8, 9]);
    }

    #[test]
    fn test_window_clear() {
        let mut window = FifoWindow::new(2);
        window.push(1.0);
        window.push(2.0);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.latest(), None);
    }

    #[test]
    fn test_population_std_dev() {
        // population variance of 2,4,4,4,5,5,7,9 is exactly 4
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&values) - 2.0).abs() < 1e-12);
        assert!((mean(&values) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_stats_empty_input() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn test_std_dev_over_window() {
        let mut window = FifoWindow::new(4);
        for v in [1.0, 1.0, 1.0, 1.0] {
            window.push(v);
        }
        let values: Vec<f64> = window.iter().copied().collect();
        assert_eq!(population_std_dev(&values), 0.0);
    }
}
