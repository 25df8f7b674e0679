use serde::{Deserialize, Serialize};

use crate::core::cell::CellKey;
use crate::core::geometry::{CellGrid, Geometry};
use crate::core::vertex::KinematicSample;

/// Output format version written into every run header.
pub const FORMAT_VERSION: u32 = 1;

/// One persisted event: primary kinematics plus the sparse deposit list.
///
/// `pos[i]` and `edep[i]` describe the same bin; `pos` holds flat bin indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "Pos")]
    pub pos: Vec<u64>,
    #[serde(rename = "Edep")]
    pub edep: Vec<f64>,
    #[serde(rename = "Theta")]
    pub theta: f64,
    #[serde(rename = "Phi")]
    pub phi: f64,
    #[serde(rename = "Energy")]
    pub energy: f64,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
}

impl EventRecord {
    /// Flatten a snapshot into parallel `Pos`/`Edep` columns, keeping its order.
    pub fn assemble(kin: &KinematicSample, snapshot: &[(CellKey, f64)], grid: CellGrid) -> Self {
        let (pos, edep): (Vec<u64>, Vec<f64>) = snapshot
            .iter()
            .map(|(key, e)| (key.flat_index(grid), *e))
            .unzip();
        Self {
            pos,
            edep,
            theta: kin.theta,
            phi: kin.phi,
            energy: kin.energy,
            x: kin.x,
            y: kin.y,
            z: kin.z,
        }
    }

    pub fn kinematics(&self) -> KinematicSample {
        KinematicSample {
            theta: self.theta,
            phi: self.phi,
            energy: self.energy,
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }

    /// Check that `Pos` and `Edep` pair up one to one.
    pub fn check_columns(&self) -> std::result::Result<(), String> {
        if self.pos.len() != self.edep.len() {
            return Err(format!(
                "Pos has {} entries but Edep has {}",
                self.pos.len(),
                self.edep.len()
            ));
        }
        Ok(())
    }

    /// Iterate (flat bin, energy) pairs.
    pub fn deposits(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.pos.iter().copied().zip(self.edep.iter().copied())
    }

    pub fn total_edep(&self) -> f64 {
        self.edep.iter().sum()
    }
}

/// Run-level metadata needed to decode flat bin indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    #[serde(rename = "NLayer")]
    pub n_layer: u64,
    #[serde(rename = "NCellX")]
    pub n_cell_x: u32,
    #[serde(rename = "NCellY")]
    pub n_cell_y: u32,
    #[serde(rename = "LayerThickness")]
    pub layer_thickness: f64,
    #[serde(rename = "DetectorX")]
    pub detector_x: f64,
    #[serde(rename = "DetectorY")]
    pub detector_y: f64,
    #[serde(rename = "DetectorMinZ")]
    pub detector_min_z: f64,
    #[serde(rename = "Particle")]
    pub particle: String,
    #[serde(rename = "Version")]
    pub version: u32,
}

impl RunHeader {
    pub fn new(geometry: &Geometry, particle: &str) -> Self {
        let grid = geometry.grid();
        Self {
            n_layer: geometry.n_layers() as u64,
            n_cell_x: grid.n_cell_x,
            n_cell_y: grid.n_cell_y,
            layer_thickness: geometry.layer_thickness(),
            detector_x: geometry.width_x(),
            detector_y: geometry.width_y(),
            detector_min_z: geometry.z_min(),
            particle: particle.to_string(),
            version: FORMAT_VERSION,
        }
    }
}
