use crate::core::geometry::{CellGrid, Geometry};
use crate::error::{Error, Result};

/// One sensitive-volume bin: (layer, cell_x, cell_y).
///
/// Obtain keys through [`map_position`] or [`CellKey::from_flat`]; both
/// guarantee the indices lie inside the geometry's bin space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub layer: u32,
    pub cell_x: u32,
    pub cell_y: u32,
}

impl CellKey {
    pub fn new(layer: u32, cell_x: u32, cell_y: u32) -> Self {
        Self {
            layer,
            cell_x,
            cell_y,
        }
    }

    /// Index of the cell within its layer face: `cell_x * n_cell_y + cell_y`.
    ///
    /// Fits in `u32` for any grid accepted by [`Geometry::new`].
    #[inline]
    pub fn in_layer_index(&self, grid: CellGrid) -> u32 {
        self.cell_x * grid.n_cell_y + self.cell_y
    }

    /// Flat bin index `layer * nx * ny + cell_x * ny + cell_y`.
    #[inline]
    pub fn flat_index(&self, grid: CellGrid) -> u64 {
        u64::from(self.layer) * grid.cells_per_layer() + u64::from(self.in_layer_index(grid))
    }

    /// Decode a flat bin index back into a key.
    pub fn from_flat(index: u64, geometry: &Geometry) -> Result<Self> {
        let grid = geometry.grid();
        let per_layer = grid.cells_per_layer();
        let layer = index / per_layer;
        let cell_x = index % per_layer / u64::from(grid.n_cell_y);
        let cell_y = index % u64::from(grid.n_cell_y);
        if layer >= geometry.n_layers() as u64 {
            return Err(Error::OutOfBoundsDeposit {
                layer: i64::try_from(layer).unwrap_or(i64::MAX),
                cell_x: cell_x as i64,
                cell_y: cell_y as i64,
            });
        }
        // Bounded by n_layers (usize) and the u32 grid dimensions.
        Ok(Self::new(layer as u32, cell_x as u32, cell_y as u32))
    }
}

/// Map a deposit position onto its (layer, cell_x, cell_y) bin.
///
/// Binning is floor-based with left-closed intervals: a position exactly on a
/// bin's lower boundary belongs to that bin, i.e. the higher-index neighbour.
///
/// Errors: `Error::OutOfBoundsDeposit` if any index falls outside the
/// geometry's bin space, including non-finite coordinates.
pub fn map_position(position: [f64; 3], geometry: &Geometry) -> Result<CellKey> {
    let [x, y, z] = position;
    let grid = geometry.grid();

    let layer = bin_floor((z - geometry.z_min()) / geometry.layer_thickness());
    let cell_x = bin_floor(
        (x + 0.5 * geometry.width_x()) / geometry.width_x() * f64::from(grid.n_cell_x),
    );
    let cell_y = bin_floor(
        (y + 0.5 * geometry.width_y()) / geometry.width_y() * f64::from(grid.n_cell_y),
    );

    let in_range = |idx: i64, n: i64| (0..n).contains(&idx);
    if !in_range(layer, geometry.n_layers() as i64)
        || !in_range(cell_x, i64::from(grid.n_cell_x))
        || !in_range(cell_y, i64::from(grid.n_cell_y))
    {
        log::error!(
            "deposit at ({x}, {y}, {z}) maps to invalid cell index {layer},{cell_x},{cell_y}"
        );
        return Err(Error::OutOfBoundsDeposit {
            layer,
            cell_x,
            cell_y,
        });
    }

    // All three are checked non-negative and below u32-sized bounds above.
    Ok(CellKey::new(layer as u32, cell_x as u32, cell_y as u32))
}

/// Floor to an integer bin; NaN and infinities land on a sentinel outside every range.
#[inline]
fn bin_floor(v: f64) -> i64 {
    if v.is_finite() {
        v.floor() as i64
    } else {
        i64::MIN
    }
}
