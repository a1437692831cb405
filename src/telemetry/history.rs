//! Fixed-capacity per-floor history.

use std::collections::VecDeque;

use super::FloorReading;

/// Chronological readings for one floor, oldest evicted first once `capacity`
/// is reached.
#[derive(Debug, Clone)]
pub struct FloorHistory {
    entries: VecDeque<FloorReading>,
    capacity: usize,
}

impl FloorHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting from the front while over capacity.
    pub fn push(&mut self, reading: FloorReading) {
        self.entries.push_back(reading);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// The most recent `limit` readings in chronological order.
    pub fn recent(&self, limit: usize) -> Vec<FloorReading> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&FloorReading> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading(occupancy: u32) -> FloorReading {
        FloorReading {
            floor_id: 1,
            name: "Floor 1".to_string(),
            occupancy,
            temperature: 22.0,
            humidity: 50,
            power_consumption: 150.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_fifo_eviction() {
        let mut history = FloorHistory::with_capacity(3);
        for occ in 0..5 {
            history.push(reading(occ));
        }
        assert_eq!(history.len(), 3);
        let kept: Vec<u32> = history.recent(10).iter().map(|r| r.occupancy).collect();
        assert_eq!(kept, vec![2, 3, 4]);
        assert_eq!(history.latest().map(|r| r.occupancy), Some(4));
    }

    #[test]
    fn test_recent_limits() {
        let mut history = FloorHistory::with_capacity(10);
        for occ in 0..6 {
            history.push(reading(occ));
        }
        let last_two: Vec<u32> = history.recent(2).iter().map(|r| r.occupancy).collect();
        assert_eq!(last_two, vec![4, 5]);
        assert!(history.recent(0).is_empty());
    }
}
