// Fixed-capacity ring of recent confidence scores
//
// The window self-prunes by capacity: oldest entries are overwritten, never
// explicitly deleted, so memory stays bounded under sustained load.

use crate::errors::EngineError;

pub const DEFAULT_CAPACITY: usize = 200;

/// Circular buffer of confidence scores with a monotonic write cursor.
#[derive(Debug, Clone)]
pub struct RingWindow {
    scores: Vec<f64>,
    capacity: usize,
    /// Total scores ever pushed; never decreases.
    cursor: u64,
}

impl RingWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring window capacity must be positive");
        Self {
            scores: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// Append a score, overwriting the oldest entry once full. O(1).
    pub fn push(&mut self, score: f64) {
        let slot = (self.cursor % self.capacity as u64) as usize;
        if self.scores.len() < self.capacity {
            self.scores.push(score);
        } else {
            self.scores[slot] = score;
        }
        self.cursor += 1;
    }

    /// Number of scores currently held (≤ capacity).
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Total scores ever pushed, including overwritten ones.
    pub fn total_pushed(&self) -> u64 {
        self.cursor
    }

    /// The last `n` scores in chronological order, most recent last.
    /// Fails until `n` scores have ever been pushed.
    pub fn snapshot(&self, n: usize) -> Result<Vec<f64>, EngineError> {
        if n > self.scores.len() {
            return Err(EngineError::InsufficientData {
                have: self.scores.len(),
                need: n,
            });
        }
        let len = self.scores.len();
        let start = if self.cursor as usize <= self.capacity {
            0
        } else {
            (self.cursor % self.capacity as u64) as usize
        };
        let mut ordered = Vec::with_capacity(n);
        for i in (len - n)..len {
            ordered.push(self.scores[(start + i) % self.capacity]);
        }
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_below_capacity() {
        let mut window = RingWindow::new(5);
        window.push(0.1);
        window.push(0.2);
        assert_eq!(window.len(), 2);
        assert_eq!(window.total_pushed(), 2);
        assert_eq!(window.snapshot(2).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_overwrite_at_capacity() {
        let mut window = RingWindow::new(3);
        for score in [0.1, 0.2, 0.3, 0.4, 0.5] {
            window.push(score);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.total_pushed(), 5);
        assert_eq!(window.snapshot(3).unwrap(), vec![0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_snapshot_partial() {
        let mut window = RingWindow::new(4);
        for score in [0.1, 0.2, 0.3, 0.4, 0.5, 0.6] {
            window.push(score);
        }
        // Last two of the retained [0.3, 0.4, 0.5, 0.6]
        assert_eq!(window.snapshot(2).unwrap(), vec![0.5, 0.6]);
    }

    #[test]
    fn test_snapshot_insufficient_data() {
        let mut window = RingWindow::new(200);
        for i in 0..50 {
            window.push(i as f64 / 100.0);
        }
        let err = window.snapshot(100).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData { have: 50, need: 100 }
        ));
    }

    #[test]
    fn test_capacity_200_keeps_last_200() {
        let mut window = RingWindow::new(200);
        for i in 0..250 {
            window.push(i as f64);
        }
        let snapshot = window.snapshot(200).unwrap();
        assert_eq!(snapshot.len(), 200);
        assert_eq!(snapshot[0], 50.0);
        assert_eq!(snapshot[199], 249.0);
    }
}
