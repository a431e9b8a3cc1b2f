//! Execution Set: a rate-scaled group of logic chains executed in
//! declared order.

use crate::error::FxtError;
use crate::logic_chain::LogicChain;
use crate::point_db::PointDatabase;

pub struct ExecutionSet {
    id: u32,
    rate_multiplier: u32,
    logic_chains: Vec<LogicChain>,
}

impl ExecutionSet {
    pub fn new(id: u32, rate_multiplier: u32, logic_chains: Vec<LogicChain>) -> Result<Self, FxtError> {
        if rate_multiplier == 0 {
            return Err(FxtError::chassis(1, 1)); // CHASSIS:SCHEDULE:DEADLINE_MISSED (invalid rate config)
        }
        Ok(ExecutionSet { id, rate_multiplier, logic_chains })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        for chain in &mut self.logic_chains {
            chain.resolve_references(point_db)?;
        }
        Ok(())
    }

    /// Whether this set is due on fundamental tick `k` (`k mod m_e == 0`).
    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.rate_multiplier as u64 == 0
    }

    pub fn start(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> Result<(), FxtError> {
        for chain in &mut self.logic_chains {
            chain.start(point_db, current_time_us)?;
        }
        Ok(())
    }

    /// Executes every logic chain in order, stopping at the first error.
    pub fn execute(&mut self, point_db: &mut PointDatabase, current_tick_us: u64) -> Result<(), FxtError> {
        for chain in &mut self.logic_chains {
            chain.execute(point_db, current_tick_us)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_on_multiples_of_rate() {
        let set = ExecutionSet::new(1, 4, vec![]).unwrap();
        assert!(set.is_due(0));
        assert!(!set.is_due(1));
        assert!(!set.is_due(3));
        assert!(set.is_due(4));
        assert!(set.is_due(8));
    }

    #[test]
    fn zero_rate_multiplier_rejected() {
        assert!(ExecutionSet::new(1, 0, vec![]).is_err());
    }
}
