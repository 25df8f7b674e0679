use std::f64::consts::PI;

use rand::{rng, rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::geometry::Geometry;
use crate::error::{Error, Result};

/// Lower polar-angle bound of the primary direction, in degrees.
pub const THETA_MIN_DEG: f64 = 2.0;
/// Upper polar-angle bound of the primary direction, in degrees.
pub const THETA_MAX_DEG: f64 = 4.0;

/// Primary source settings. Energy in MeV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Particle species name, kept for provenance in the output header.
    pub particle: String,
    /// Nominal energy reported with every event.
    pub energy: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            particle: "gamma".to_string(),
            energy: 1000.0,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.energy.is_finite() || self.energy <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "source energy must be finite and > 0, got {}",
                self.energy
            )));
        }
        Ok(())
    }
}

/// Per-event primary kinematics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicSample {
    pub theta: f64,
    pub phi: f64,
    pub energy: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl KinematicSample {
    /// Unit momentum direction.
    pub fn direction(&self) -> [f64; 3] {
        let (st, ct) = self.theta.sin_cos();
        let (sp, cp) = self.phi.sin_cos();
        [st * cp, st * sp, ct]
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Draw one primary vertex.
///
/// `cos(theta)` is uniform between `cos(4 deg)` and `cos(2 deg)`, giving a
/// ring-shaped flux rather than a flat cone. `phi` is uniform on `[-pi, pi)`.
/// The origin is uniform over the detector footprint at the source plane.
pub fn sample_vertex<R: Rng>(
    rng: &mut R,
    geometry: &Geometry,
    source: &SourceConfig,
) -> KinematicSample {
    let cos_theta_min = THETA_MIN_DEG.to_radians().cos();
    let cos_theta_max = THETA_MAX_DEG.to_radians().cos();
    let u: f64 = rng.random();
    let cos_theta = u * (cos_theta_max - cos_theta_min) + cos_theta_min;
    let theta = cos_theta.acos();
    let phi = rng.random::<f64>() * 2.0 * PI - PI;

    let x = geometry.width_x() * (rng.random::<f64>() - 0.5);
    let y = geometry.width_y() * (rng.random::<f64>() - 0.5);

    KinematicSample {
        theta,
        phi,
        energy: source.energy,
        x,
        y,
        z: geometry.source_z(),
    }
}

/// Owns the RNG stream for primary vertices of one run.
#[derive(Debug)]
pub struct VertexSampler {
    rng: StdRng,
    source: SourceConfig,
}

impl VertexSampler {
    /// Create a sampler; `seed = None` draws a nondeterministic seed.
    pub fn new(source: SourceConfig, seed: Option<u64>) -> Result<Self> {
        source.validate()?;
        let rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rng().random()),
        };
        Ok(Self { rng, source })
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn sample(&mut self, geometry: &Geometry) -> KinematicSample {
        sample_vertex(&mut self.rng, geometry, &self.source)
    }
}
