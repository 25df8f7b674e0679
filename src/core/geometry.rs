use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Physical stack parameters. Lengths in mm.
///
/// `width_x`/`width_y` are the full transverse extents of every slab; the
/// stack is centred on the beam axis, so the footprint is
/// `[-width_x/2, width_x/2) x [-width_y/2, width_y/2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Absorber slab thickness.
    pub absorber: f64,
    /// Sensitive slab thickness.
    pub sensitive: f64,
    /// Gap slab thickness.
    pub gap: f64,
    /// Full transverse extent along x.
    pub width_x: f64,
    /// Full transverse extent along y.
    pub width_y: f64,
    /// Number of absorber/sensitive/gap layers.
    pub n_layers: usize,
    /// Leading face of the first layer along the beam axis.
    pub z_min: f64,
    /// Distance of the primary source upstream of `z_min`.
    pub standoff: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            absorber: 3.5,
            sensitive: 0.3,
            gap: 1.7,
            width_x: 1010.0,
            width_y: 1010.0,
            n_layers: 26,
            z_min: 0.0,
            standoff: 100.0,
        }
    }
}

/// Transverse cell resolution of each sensitive slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellGrid {
    pub n_cell_x: u32,
    pub n_cell_y: u32,
}

impl CellGrid {
    pub fn new(n_cell_x: u32, n_cell_y: u32) -> Self {
        Self { n_cell_x, n_cell_y }
    }

    /// Cells per layer face.
    #[inline]
    pub fn cells_per_layer(&self) -> u64 {
        u64::from(self.n_cell_x) * u64::from(self.n_cell_y)
    }
}

impl Default for CellGrid {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// The three slab kinds of a layer plus everything outside the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeKind {
    World,
    Absorber,
    Sensitive,
    Gap,
}

/// One slab placement along the beam axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub kind: VolumeKind,
    pub layer: usize,
    pub center_z: f64,
    pub thickness: f64,
}

/// Derived detector geometry. Computed once, immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    params: LayoutParams,
    grid: CellGrid,
    layer_thickness: f64,
    stack_z: f64,
}

impl Geometry {
    /// Derive the stack layout from physical parameters and a cell grid.
    ///
    /// Errors: `Error::InvalidConfiguration` if any thickness or extent is
    /// non-positive or non-finite, the layer count is zero, a grid dimension
    /// is zero, a layer face holds more than `u32::MAX` cells, or the standoff
    /// is negative.
    pub fn new(params: LayoutParams, grid: CellGrid) -> Result<Self> {
        let positive = [
            ("absorber thickness", params.absorber),
            ("sensitive thickness", params.sensitive),
            ("gap thickness", params.gap),
            ("width_x", params.width_x),
            ("width_y", params.width_y),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(Error::InvalidConfiguration(format!(
                    "{name} must be finite and > 0, got {v}"
                )));
            }
        }
        if params.n_layers == 0 {
            return Err(Error::InvalidConfiguration(
                "layer count must be >= 1".into(),
            ));
        }
        if !params.z_min.is_finite() {
            return Err(Error::InvalidConfiguration("z_min must be finite".into()));
        }
        if !params.standoff.is_finite() || params.standoff < 0.0 {
            return Err(Error::InvalidConfiguration(
                "standoff must be finite and >= 0".into(),
            ));
        }
        if grid.n_cell_x == 0 || grid.n_cell_y == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "cell grid must be at least 1x1, got {}x{}",
                grid.n_cell_x, grid.n_cell_y
            )));
        }
        // In-layer cell indices are u32.
        if grid.cells_per_layer() > u64::from(u32::MAX) {
            return Err(Error::InvalidConfiguration(format!(
                "cell grid {}x{} exceeds {} cells per layer",
                grid.n_cell_x,
                grid.n_cell_y,
                u32::MAX
            )));
        }

        let layer_thickness = params.absorber + params.sensitive + params.gap;
        let stack_z = params.n_layers as f64 * layer_thickness;
        Ok(Self {
            params,
            grid,
            layer_thickness,
            stack_z,
        })
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn grid(&self) -> CellGrid {
        self.grid
    }

    pub fn n_layers(&self) -> usize {
        self.params.n_layers
    }

    /// Absorber + sensitive + gap.
    pub fn layer_thickness(&self) -> f64 {
        self.layer_thickness
    }

    /// Total stack extent along the beam axis, `N * layer_thickness`.
    pub fn stack_z(&self) -> f64 {
        self.stack_z
    }

    pub fn width_x(&self) -> f64 {
        self.params.width_x
    }

    pub fn width_y(&self) -> f64 {
        self.params.width_y
    }

    pub fn z_min(&self) -> f64 {
        self.params.z_min
    }

    /// Trailing face of the last layer.
    pub fn z_max(&self) -> f64 {
        self.params.z_min + self.stack_z
    }

    /// z coordinate of the primary source.
    pub fn source_z(&self) -> f64 {
        self.params.z_min - self.params.standoff
    }

    pub fn cell_pitch_x(&self) -> f64 {
        self.params.width_x / f64::from(self.grid.n_cell_x)
    }

    pub fn cell_pitch_y(&self) -> f64 {
        self.params.width_y / f64::from(self.grid.n_cell_y)
    }

    /// Number of distinct (layer, cell_x, cell_y) bins.
    pub fn key_space(&self) -> u64 {
        self.params.n_layers as u64 * self.grid.cells_per_layer()
    }

    /// z range `[lo, hi)` of the sensitive slab in `layer`.
    pub fn sensitive_range(&self, layer: usize) -> (f64, f64) {
        let lo = self.layer_start(layer) + self.params.absorber;
        (lo, lo + self.params.sensitive)
    }

    /// Every slab of the stack, layer by layer, in beam order.
    pub fn placements(&self) -> Vec<Placement> {
        let p = &self.params;
        let slabs = [
            (VolumeKind::Absorber, 0.0, p.absorber),
            (VolumeKind::Sensitive, p.absorber, p.sensitive),
            (VolumeKind::Gap, p.absorber + p.sensitive, p.gap),
        ];
        let mut out = Vec::with_capacity(p.n_layers * slabs.len());
        for layer in 0..p.n_layers {
            let start = self.layer_start(layer);
            for &(kind, offset, thickness) in &slabs {
                out.push(Placement {
                    kind,
                    layer,
                    center_z: start + offset + 0.5 * thickness,
                    thickness,
                });
            }
        }
        out
    }

    /// Slab kind containing `position`, or `World` outside the stack.
    pub fn volume_at(&self, position: [f64; 3]) -> VolumeKind {
        let [x, y, z] = position;
        let half_x = 0.5 * self.params.width_x;
        let half_y = 0.5 * self.params.width_y;
        if !(-half_x..half_x).contains(&x)
            || !(-half_y..half_y).contains(&y)
            || !(self.z_min()..self.z_max()).contains(&z)
        {
            return VolumeKind::World;
        }
        let depth = (z - self.params.z_min) % self.layer_thickness;
        if depth < self.params.absorber {
            VolumeKind::Absorber
        } else if depth < self.params.absorber + self.params.sensitive {
            VolumeKind::Sensitive
        } else {
            VolumeKind::Gap
        }
    }

    #[inline]
    fn layer_start(&self, layer: usize) -> f64 {
        self.params.z_min + layer as f64 * self.layer_thickness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cell::CellKey;

    const TOL: f64 = 1e-9;

    #[test]
    fn default_layout_matches_reference_stack() -> Result<()> {
        let g = Geometry::new(LayoutParams::default(), CellGrid::default())?;
        assert!((g.layer_thickness() - 5.5).abs() < TOL);
        assert!((g.stack_z() - 143.0).abs() < TOL);
        assert!((g.z_max() - (g.z_min() + g.stack_z())).abs() < TOL);
        assert!((g.source_z() + 100.0).abs() < TOL);
        assert_eq!(g.key_space(), 26);
        Ok(())
    }

    #[test]
    fn placements_follow_absorber_sensitive_gap_order() -> Result<()> {
        let g = Geometry::new(LayoutParams::default(), CellGrid::default())?;
        let placements = g.placements();
        assert_eq!(placements.len(), 26 * 3);
        for (i, chunk) in placements.chunks(3).enumerate() {
            let base = 5.5 * i as f64;
            assert_eq!(chunk[0].kind, VolumeKind::Absorber);
            assert!((chunk[0].center_z - (1.75 + base)).abs() < TOL);
            assert_eq!(chunk[1].kind, VolumeKind::Sensitive);
            assert!((chunk[1].center_z - (3.65 + base)).abs() < TOL);
            assert_eq!(chunk[2].kind, VolumeKind::Gap);
            assert!((chunk[2].center_z - (4.65 + base)).abs() < TOL);
        }
        Ok(())
    }

    #[test]
    fn volume_at_classifies_slabs() -> Result<()> {
        let g = Geometry::new(LayoutParams::default(), CellGrid::default())?;
        assert_eq!(g.volume_at([0.0, 0.0, 1.0]), VolumeKind::Absorber);
        assert_eq!(g.volume_at([0.0, 0.0, 3.65]), VolumeKind::Sensitive);
        assert_eq!(g.volume_at([0.0, 0.0, 5.0]), VolumeKind::Gap);
        assert_eq!(g.volume_at([0.0, 0.0, 5.5 + 3.6]), VolumeKind::Sensitive);
        assert_eq!(g.volume_at([0.0, 0.0, -1.0]), VolumeKind::World);
        assert_eq!(g.volume_at([600.0, 0.0, 3.65]), VolumeKind::World);
        Ok(())
    }

    #[test]
    fn zero_layers_rejected() {
        let params = LayoutParams {
            n_layers: 0,
            ..LayoutParams::default()
        };
        let err = Geometry::new(params, CellGrid::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(err.to_string().contains("layer count"));
    }

    #[test]
    fn non_positive_thickness_rejected() {
        for bad in [0.0, -1.0, f64::NAN] {
            let params = LayoutParams {
                sensitive: bad,
                ..LayoutParams::default()
            };
            let err = Geometry::new(params, CellGrid::default()).unwrap_err();
            assert!(err.to_string().contains("sensitive thickness"));
        }
    }

    #[test]
    fn empty_cell_grid_rejected() {
        let err = Geometry::new(LayoutParams::default(), CellGrid::new(0, 4)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn oversized_cell_grid_rejected() -> Result<()> {
        let err = Geometry::new(LayoutParams::default(), CellGrid::new(70_000, 70_000))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(err.to_string().contains("cells per layer"));

        // 65536 * 65535 = u32::MAX - 65535 still fits
        let g = Geometry::new(LayoutParams::default(), CellGrid::new(65_536, 65_535))?;
        let key = CellKey::new(0, 65_535, 65_534);
        assert_eq!(u64::from(key.in_layer_index(g.grid())), g.grid().cells_per_layer() - 1);
        Ok(())
    }

    #[test]
    fn bad_standoff_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let params = LayoutParams {
                standoff: bad,
                ..LayoutParams::default()
            };
            let err = Geometry::new(params, CellGrid::default()).unwrap_err();
            assert!(err.to_string().contains("standoff"));
        }
        let flush = LayoutParams {
            standoff: 0.0,
            ..LayoutParams::default()
        };
        assert!(Geometry::new(flush, CellGrid::default()).is_ok());
    }

    #[test]
    fn non_finite_z_min_rejected() {
        for bad in [f64::NAN, f64::NEG_INFINITY] {
            let params = LayoutParams {
                z_min: bad,
                ..LayoutParams::default()
            };
            let err = Geometry::new(params, CellGrid::default()).unwrap_err();
            assert!(matches!(err, Error::InvalidConfiguration(_)));
            assert!(err.to_string().contains("z_min"));
        }
    }
}
