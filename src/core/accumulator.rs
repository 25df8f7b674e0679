use std::collections::BTreeMap;

use crate::core::cell::CellKey;
use crate::core::geometry::CellGrid;
use crate::error::{Error, Result};

/// Sparse per-event energy sums keyed by (layer, cell).
///
/// One ordered map per layer, keyed by the in-layer cell index. Keys only
/// exist for cells that received energy during the current event.
///
/// Snapshot order is by layer, then by in-layer cell index, which is
/// ascending flat bin index.
#[derive(Debug, Clone)]
pub struct DepositAccumulator {
    grid: CellGrid,
    layers: Vec<BTreeMap<u32, f64>>,
}

impl DepositAccumulator {
    /// Create an empty accumulator for `n_layers` layers of `grid` cells.
    pub fn new(n_layers: usize, grid: CellGrid) -> Self {
        Self {
            grid,
            layers: vec![BTreeMap::new(); n_layers],
        }
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn grid(&self) -> CellGrid {
        self.grid
    }

    /// Clear every layer. Layer count is kept so the next event can start right away.
    pub fn reset(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
    }

    /// Add `energy` to the running total of `key`.
    ///
    /// The key is trusted to come from a validated mapping; only its layer is
    /// checked since it indexes the layer table. Zero energy creates no entry.
    pub fn add_deposit(&mut self, key: CellKey, energy: f64) -> Result<()> {
        let cell = key.in_layer_index(self.grid);
        let layer = self
            .layers
            .get_mut(key.layer as usize)
            .ok_or(Error::OutOfBoundsDeposit {
                layer: i64::from(key.layer),
                cell_x: i64::from(key.cell_x),
                cell_y: i64::from(key.cell_y),
            })?;
        if energy == 0.0 {
            return Ok(());
        }
        *layer.entry(cell).or_insert(0.0) += energy;
        Ok(())
    }

    /// Current (key, energy) pairs in ascending flat bin order.
    pub fn snapshot(&self) -> Vec<(CellKey, f64)> {
        let ny = self.grid.n_cell_y;
        let mut out = Vec::with_capacity(self.len());
        for (layer, cells) in self.layers.iter().enumerate() {
            for (&cell, &edep) in cells {
                let key = CellKey::new(layer as u32, cell / ny, cell % ny);
                out.push((key, edep));
            }
        }
        out
    }

    /// Number of distinct cells touched this event.
    pub fn len(&self) -> usize {
        self.layers.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(BTreeMap::is_empty)
    }

    /// Sum of all accumulated energy this event.
    pub fn total_energy(&self) -> f64 {
        self.layers.iter().flat_map(|l| l.values()).sum()
    }
}
