//! Offline shower reconstruction over written event records, plus the
//! calibration and resolution fits run on its per-event estimates.
//!
//! Transverse maps are row-major with index `cell_x * n_cell_y + cell_y`,
//! the same order as the in-layer part of a flat bin index.

use std::collections::BTreeMap;

use ordered_float::NotNan;

use crate::core::cell::CellKey;
use crate::core::geometry::Geometry;
use crate::core::record::EventRecord;
use crate::error::Result;

/// Energy per layer.
pub fn longitudinal_profile(record: &EventRecord, geometry: &Geometry) -> Result<Vec<f64>> {
    let mut profile = vec![0.0; geometry.n_layers()];
    for (pos, e) in record.deposits() {
        let key = CellKey::from_flat(pos, geometry)?;
        profile[key.layer as usize] += e;
    }
    Ok(profile)
}

/// Energy per transverse cell, summed over all layers.
pub fn transverse_map(record: &EventRecord, geometry: &Geometry) -> Result<Vec<f64>> {
    let grid = geometry.grid();
    let mut map = vec![0.0; grid.cells_per_layer() as usize];
    for (pos, e) in record.deposits() {
        let key = CellKey::from_flat(pos, geometry)?;
        map[key.in_layer_index(grid) as usize] += e;
    }
    Ok(map)
}

/// Containment radius in cell units for a shower radius in mm, padded by half a cell.
pub fn radius_in_cells(geometry: &Geometry, radius_mm: f64) -> f64 {
    radius_mm / geometry.cell_pitch_x() + 0.5
}

/// Reconstructed energy and transverse centroid of one event, in cell units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowerEstimate {
    /// Energy contained within the radius around the seed cell.
    pub energy: f64,
    pub mean_x: f64,
    pub mean_y: f64,
    /// Hottest transverse cell.
    pub seed_x: u32,
    pub seed_y: u32,
}

/// Sum the energy within `radius_cells` of the hottest transverse cell and
/// compute its energy-weighted centroid. `None` for events without deposits.
pub fn reconstruct_shower(
    record: &EventRecord,
    geometry: &Geometry,
    radius_cells: f64,
) -> Result<Option<ShowerEstimate>> {
    let grid = geometry.grid();
    let map = transverse_map(record, geometry)?;

    let seed = map
        .iter()
        .enumerate()
        .filter(|(_, e)| **e > 0.0)
        .filter_map(|(i, &e)| NotNan::new(e).ok().map(|e| (i, e)))
        // ties go to the lowest cell index
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));
    let Some((seed_idx, _)) = seed else {
        return Ok(None);
    };
    let ny = grid.n_cell_y as usize;
    let (x0, y0) = (seed_idx / ny, seed_idx % ny);

    let mut sum_e = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for (i, &e) in map.iter().enumerate() {
        let (x, y) = ((i / ny) as f64, (i % ny) as f64);
        let d = (x - x0 as f64).hypot(y - y0 as f64);
        if d <= radius_cells {
            sum_e += e;
            sum_x += x * e;
            sum_y += y * e;
        }
    }
    if sum_e <= 0.0 {
        return Ok(None);
    }
    Ok(Some(ShowerEstimate {
        energy: sum_e,
        mean_x: sum_x / sum_e,
        mean_y: sum_y / sum_e,
        seed_x: x0 as u32,
        seed_y: y0 as u32,
    }))
}

/// Maximum-likelihood normal parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    pub mean: f64,
    /// Population standard deviation.
    pub sigma: f64,
    pub n: usize,
}

pub fn fit_gaussian(values: &[f64]) -> Option<GaussianFit> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some(GaussianFit {
        mean,
        sigma: var.sqrt(),
        n: values.len(),
    })
}

/// Least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// `None` for mismatched lengths, fewer than two points, or constant `x`.
pub fn fit_linear(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        sxx += (xi - mx) * (xi - mx);
        sxy += (xi - mx) * (yi - my);
    }
    if sxx <= f64::EPSILON * n {
        return None;
    }
    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: my - slope * mx,
    })
}

/// Energy resolution `sigma(E) = E * hypot(a / sqrt(E), b)`: a stochastic
/// term `a` (units of sqrt(MeV)) and a constant term `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionFit {
    pub a: f64,
    pub b: f64,
}

impl ResolutionFit {
    /// Absolute resolution at `energy`.
    pub fn sigma(&self, energy: f64) -> f64 {
        energy * (self.a / energy.sqrt()).hypot(self.b)
    }

    /// Relative resolution `sigma / E`.
    pub fn relative(&self, energy: f64) -> f64 {
        self.sigma(energy) / energy
    }
}

/// Fit the resolution curve to per-energy widths.
///
/// `sigmas` are the gaussian widths already divided by the calibration slope.
/// The model is linear in `a^2` and `b^2` (`sigma^2 = a^2 E + b^2 E^2`), so this
/// is a two-parameter least-squares solve. A term that comes out negative is
/// pinned to zero and the other one refitted alone.
///
/// `None` for mismatched lengths, fewer than two points, a non-positive or
/// non-finite energy, or energies too degenerate to separate the two terms.
pub fn fit_resolution(energies: &[f64], sigmas: &[f64]) -> Option<ResolutionFit> {
    if energies.len() != sigmas.len() || energies.len() < 2 {
        return None;
    }
    if energies.iter().any(|e| !e.is_finite() || *e <= 0.0) {
        return None;
    }
    // Work in t = E / E_max so the normal equations stay well scaled.
    let scale = energies.iter().copied().fold(0.0, f64::max);
    let (mut s2, mut s3, mut s4, mut r1, mut r2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&e, &sigma) in energies.iter().zip(sigmas) {
        let t = e / scale;
        let s = sigma * sigma;
        s2 += t * t;
        s3 += t * t * t;
        s4 += t * t * t * t;
        r1 += s * t;
        r2 += s * t * t;
    }
    let det = s2 * s4 - s3 * s3;
    if det <= f64::EPSILON * s2 * s4 {
        return None;
    }
    // sigma^2 = p t + q t^2 with p = a^2 E_max, q = b^2 E_max^2
    let mut p = (r1 * s4 - r2 * s3) / det;
    let mut q = (s2 * r2 - s3 * r1) / det;
    if p < 0.0 {
        p = 0.0;
        q = (r2 / s4).max(0.0);
    } else if q < 0.0 {
        q = 0.0;
        p = (r1 / s2).max(0.0);
    }
    Some(ResolutionFit {
        a: (p / scale).sqrt(),
        b: q.sqrt() / scale,
    })
}

/// Group per-event values by the record's nominal `Energy`, ascending.
/// Records with a NaN energy are skipped.
pub fn group_by_energy(records: &[EventRecord], values: &[f64]) -> Vec<(f64, Vec<f64>)> {
    let mut groups: BTreeMap<NotNan<f64>, Vec<f64>> = BTreeMap::new();
    for (rec, &v) in records.iter().zip(values) {
        if let Ok(e) = NotNan::new(rec.energy) {
            groups.entry(e).or_default().push(v);
        }
    }
    groups
        .into_iter()
        .map(|(e, vs)| (e.into_inner(), vs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{CellGrid, LayoutParams};

    fn geometry() -> Geometry {
        let params = LayoutParams {
            n_layers: 3,
            width_x: 50.0,
            width_y: 50.0,
            ..LayoutParams::default()
        };
        Geometry::new(params, CellGrid::new(5, 5)).expect("valid test geometry")
    }

    fn record(deposits: &[(CellKey, f64)], energy: f64) -> EventRecord {
        let g = geometry();
        EventRecord {
            pos: deposits.iter().map(|(k, _)| k.flat_index(g.grid())).collect(),
            edep: deposits.iter().map(|(_, e)| *e).collect(),
            theta: 0.05,
            phi: 0.0,
            energy,
            x: 0.0,
            y: 0.0,
            z: -100.0,
        }
    }

    #[test]
    fn profiles_sum_over_the_other_axes() -> Result<()> {
        let g = geometry();
        let rec = record(
            &[
                (CellKey::new(0, 2, 2), 1.0),
                (CellKey::new(1, 2, 2), 2.0),
                (CellKey::new(1, 0, 4), 0.5),
            ],
            10.0,
        );
        assert_eq!(longitudinal_profile(&rec, &g)?, vec![1.0, 2.5, 0.0]);
        let map = transverse_map(&rec, &g)?;
        assert_eq!(map[2 * 5 + 2], 3.0);
        assert_eq!(map[4], 0.5);
        assert!((map.iter().sum::<f64>() - rec.total_edep()).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn shower_centroid_and_containment() -> Result<()> {
        let g = geometry();
        let rec = record(
            &[
                (CellKey::new(0, 2, 2), 4.0),
                (CellKey::new(1, 3, 2), 2.0),
                (CellKey::new(2, 0, 0), 1.0),
            ],
            10.0,
        );
        let est = reconstruct_shower(&rec, &g, 1.0)?.expect("event has deposits");
        assert_eq!((est.seed_x, est.seed_y), (2, 2));
        assert!((est.energy - 6.0).abs() < 1e-12);
        assert!((est.mean_x - (2.0 * 4.0 + 3.0 * 2.0) / 6.0).abs() < 1e-12);
        assert!((est.mean_y - 2.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn empty_event_has_no_shower() -> Result<()> {
        let rec = record(&[], 10.0);
        assert!(reconstruct_shower(&rec, &geometry(), 3.0)?.is_none());
        Ok(())
    }

    #[test]
    fn gaussian_and_linear_fits() {
        let fit = fit_gaussian(&[1.0, 3.0]).expect("non-empty");
        assert!((fit.mean - 2.0).abs() < 1e-12);
        assert!((fit.sigma - 1.0).abs() < 1e-12);
        assert!(fit_gaussian(&[]).is_none());

        let line = fit_linear(&[1.0, 2.0, 3.0], &[3.0, 5.0, 7.0]).expect("well conditioned");
        assert!((line.slope - 2.0).abs() < 1e-12);
        assert!((line.intercept - 1.0).abs() < 1e-12);
        assert!((line.eval(10.0) - 21.0).abs() < 1e-12);
        assert!(fit_linear(&[1.0, 1.0], &[0.0, 1.0]).is_none());
    }

    #[test]
    fn resolution_fit_recovers_both_terms() {
        let truth = ResolutionFit { a: 0.12, b: 0.008 };
        let energies = [50.0, 100.0, 300.0, 1000.0, 3000.0, 10_000.0];
        let sigmas: Vec<f64> = energies.iter().map(|&e| truth.sigma(e)).collect();
        let fit = fit_resolution(&energies, &sigmas).expect("six distinct energies");
        assert!((fit.a - truth.a).abs() < 1e-7 * truth.a);
        assert!((fit.b - truth.b).abs() < 1e-7 * truth.b);
        assert!((fit.relative(1000.0) - truth.relative(1000.0)).abs() < 1e-9);
    }

    #[test]
    fn resolution_fit_pins_a_missing_constant_term() {
        let energies = [100.0, 400.0, 1600.0];
        let sigmas: Vec<f64> = energies.iter().map(|&e: &f64| 0.2 * e.sqrt()).collect();
        let fit = fit_resolution(&energies, &sigmas).expect("well conditioned");
        assert!((fit.a - 0.2).abs() < 1e-9);
        assert!(fit.b.abs() < 1e-6);
    }

    #[test]
    fn resolution_fit_rejects_degenerate_input() {
        assert!(fit_resolution(&[100.0], &[1.0]).is_none());
        assert!(fit_resolution(&[100.0, 200.0], &[1.0]).is_none());
        assert!(fit_resolution(&[100.0, 100.0], &[1.0, 1.0]).is_none());
        assert!(fit_resolution(&[0.0, 100.0], &[1.0, 1.0]).is_none());
    }

    #[test]
    fn grouping_is_sorted_by_energy() {
        let recs = vec![
            record(&[], 100.0),
            record(&[], 10.0),
            record(&[], 100.0),
        ];
        let groups = group_by_energy(&recs, &[1.0, 2.0, 3.0]);
        assert_eq!(groups, vec![(10.0, vec![2.0]), (100.0, vec![1.0, 3.0])]);
    }

    #[test]
    fn radius_padding_is_half_a_cell() {
        let g = geometry();
        assert!((radius_in_cells(&g, 35.0) - 4.0).abs() < 1e-12);
    }
}
