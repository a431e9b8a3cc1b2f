//! Logic Chain: an ordered list of components plus the connection points
//! wiring them together and the auto-points whose setters are reapplied
//! every cycle.

use crate::component::Component;
use crate::error::FxtError;
use crate::point_db::PointDatabase;

pub struct LogicChain {
    id: u32,
    components: Vec<Box<dyn Component + Send>>,
    connection_point_ids: Vec<u32>,
    auto_point_ids: Vec<u32>,
    error: FxtError,
}

impl LogicChain {
    pub fn new(id: u32, components: Vec<Box<dyn Component + Send>>, connection_point_ids: Vec<u32>, auto_point_ids: Vec<u32>) -> Self {
        LogicChain { id, components, connection_point_ids, auto_point_ids, error: FxtError::SUCCESS }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn connection_point_ids(&self) -> &[u32] {
        &self.connection_point_ids
    }

    pub fn error_code(&self) -> FxtError {
        self.error
    }

    /// Resolves every component's input/output ids against `point_db`.
    /// Called once by the node factory after the whole config tree (every
    /// chassis, every point) has been built, never per-chain as each chain
    /// is parsed, since components may reference points declared anywhere
    /// in the node, including other chassis' shared points or cards built
    /// later in the document.
    pub fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        for component in &mut self.components {
            component.resolve_references(point_db)?;
        }
        Ok(())
    }

    /// Starts every component and applies every auto-point setter once.
    pub fn start(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> Result<(), FxtError> {
        for component in &mut self.components {
            if let Err(e) = component.start(point_db, current_time_us) {
                self.error = e;
                return Err(e);
            }
        }
        for &id in &self.auto_point_ids {
            point_db.apply_setter(id);
        }
        Ok(())
    }

    /// Re-applies auto-point setters, then executes every component in
    /// declared order, stopping at the first error.
    pub fn execute(&mut self, point_db: &mut PointDatabase, current_tick_us: u64) -> Result<(), FxtError> {
        for &id in &self.auto_point_ids {
            point_db.apply_setter(id);
        }
        for component in &mut self.components {
            if let Err(e) = component.execute(point_db, current_tick_us) {
                self.error = e;
                return Err(e);
            }
        }
        self.error = FxtError::SUCCESS;
        Ok(())
    }
}
