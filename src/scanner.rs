//! Scanner: a rate-scaled group of cards whose inputs are sampled and
//! outputs flushed in declared order.

use crate::card::Card;
use crate::error::FxtError;
use crate::point_db::PointDatabase;

pub struct Scanner {
    id: u32,
    rate_multiplier: u32,
    cards: Vec<Box<dyn Card + Send>>,
}

impl Scanner {
    pub fn new(id: u32, rate_multiplier: u32, cards: Vec<Box<dyn Card + Send>>) -> Result<Self, FxtError> {
        if rate_multiplier == 0 {
            return Err(FxtError::chassis(1, 1)); // CHASSIS:SCHEDULE:DEADLINE_MISSED (invalid rate config)
        }
        Ok(Scanner { id, rate_multiplier, cards })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.rate_multiplier as u64 == 0
    }

    pub fn start(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> bool {
        let mut all_ok = true;
        for card in &mut self.cards {
            all_ok &= card.start(point_db, current_time_us);
        }
        all_ok
    }

    pub fn stop(&mut self, point_db: &mut PointDatabase) {
        for card in &mut self.cards {
            card.stop(point_db);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cards.iter().all(|c| !c.is_started())
    }

    /// `scan_inputs` on every card, in order; returns `false` (but keeps
    /// scanning the rest) if any card reports a driver error. There is no
    /// stop-on-first-error rule here — only logic chains stop early;
    /// scanners and flush passes do not, since IO channels are
    /// independent.
    pub fn scan_inputs(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> bool {
        let mut all_ok = true;
        for card in &mut self.cards {
            all_ok &= card.scan_inputs(point_db, current_time_us);
        }
        all_ok
    }

    pub fn flush_outputs(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> bool {
        let mut all_ok = true;
        for card in &mut self.cards {
            all_ok &= card.flush_outputs(point_db, current_time_us);
        }
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_on_multiples_of_rate() {
        let scanner = Scanner::new(1, 2, vec![]).unwrap();
        assert!(scanner.is_due(0));
        assert!(!scanner.is_due(1));
        assert!(scanner.is_due(2));
    }

    #[test]
    fn empty_scanner_reports_stopped() {
        let scanner = Scanner::new(1, 1, vec![]).unwrap();
        assert!(scanner.is_stopped());
    }
}
