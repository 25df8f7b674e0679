//! Python bindings (feature `python`).
//!
//! ```python
//! import calosim
//! run = calosim.CaloRun(output="output/run.jsonl", seed=1)
//! run.begin_event()
//! run.add_step([0, 0, 3.5], [0, 0, 3.8], 0.12, "Sensitive")
//! run.end_event()
//! run.finish()
//! events = calosim.load_run("output/run.jsonl")
//! ```

use numpy::IntoPyArray;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::CaloConfig;
use crate::core::{EventRecord, RunContext, StepDeposit, VolumeKind};
use crate::store::{read_run, JsonlStore};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_volume(name: &str) -> PyResult<VolumeKind> {
    match name.to_ascii_lowercase().as_str() {
        "world" => Ok(VolumeKind::World),
        "absorber" => Ok(VolumeKind::Absorber),
        "sensitive" | "sen" => Ok(VolumeKind::Sensitive),
        "gap" => Ok(VolumeKind::Gap),
        _ => Err(py_err(format!("unknown volume {name:?}"))),
    }
}

/// One scoring run writing to a JSON Lines file.
///
/// Parameters
/// - config_json: optional JSON configuration string (defaults reproduce the reference stack)
/// - output: optional output file path; defaults to output/<pid>.jsonl
/// - seed: RNG seed for primary vertices; None for nondeterministic
#[pyclass]
pub struct CaloRun {
    run: Option<RunContext<JsonlStore>>,
}

impl CaloRun {
    fn run_mut(&mut self) -> PyResult<&mut RunContext<JsonlStore>> {
        self.run
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("run already finished"))
    }
}

#[pymethods]
impl CaloRun {
    #[new]
    #[pyo3(signature = (config_json=None, output=None, seed=None))]
    fn new(
        config_json: Option<String>,
        output: Option<String>,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let mut config = match config_json {
            Some(s) => CaloConfig::from_json_str(&s).map_err(py_err)?,
            None => CaloConfig::default(),
        };
        if let Some(path) = output {
            config.output.file = Some(path.into());
        }
        if seed.is_some() {
            config.seed = seed;
        }
        let run = RunContext::open(&config).map_err(py_err)?;
        Ok(Self { run: Some(run) })
    }

    /// Start an event. Returns (theta, phi, energy, x, y, z) of the primary.
    fn begin_event(&mut self) -> PyResult<(f64, f64, f64, f64, f64, f64)> {
        let k = self.run_mut()?.begin_event().map_err(py_err)?;
        Ok((k.theta, k.phi, k.energy, k.x, k.y, k.z))
    }

    /// Feed one transport step; only steps in the sensitive slabs are scored.
    fn add_step(
        &mut self,
        pre: [f64; 3],
        post: [f64; 3],
        edep: f64,
        volume: String,
    ) -> PyResult<()> {
        let step = StepDeposit {
            pre,
            post,
            edep,
            volume: parse_volume(&volume)?,
        };
        self.run_mut()?.on_deposit(&step).map_err(py_err)
    }

    /// End the event and write its record. Returns the number of cells hit.
    fn end_event(&mut self) -> PyResult<usize> {
        let rec = self.run_mut()?.end_event().map_err(py_err)?;
        Ok(rec.pos.len())
    }

    /// Finalize the output file. Returns (events, total deposited energy).
    fn finish(&mut self) -> PyResult<(u64, f64)> {
        let run = self
            .run
            .take()
            .ok_or_else(|| PyRuntimeError::new_err("run already finished"))?;
        let (summary, _store) = run.finish().map_err(py_err)?;
        Ok((summary.events, summary.total_edep))
    }

    /// Path of the output file.
    fn path(&self) -> PyResult<String> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("run already finished"))?;
        Ok(run.store().path().display().to_string())
    }

    /// Derived geometry as a dict.
    fn geometry<'py>(&self, py: Python<'py>) -> PyResult<Py<PyDict>> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("run already finished"))?;
        let g = run.geometry();
        let out = PyDict::new(py);
        out.set_item("NLayer", g.n_layers())?;
        out.set_item("NCellX", g.grid().n_cell_x)?;
        out.set_item("NCellY", g.grid().n_cell_y)?;
        out.set_item("LayerThickness", g.layer_thickness())?;
        out.set_item("DetectorX", g.width_x())?;
        out.set_item("DetectorY", g.width_y())?;
        out.set_item("DetectorMinZ", g.z_min())?;
        out.set_item("DetectorMaxZ", g.z_max())?;
        out.set_item("SourceZ", g.source_z())?;
        Ok(out.into())
    }
}

/// Load a run file.
///
/// Returns a dict with the header fields, NumPy arrays for the scalar columns
/// (Theta, Phi, Energy, X, Y, Z) and lists of per-event arrays for Pos and Edep.
#[pyfunction]
fn load_run<'py>(py: Python<'py>, path: String) -> PyResult<Py<PyDict>> {
    let (header, records) = read_run(&path).map_err(py_err)?;
    let out = PyDict::new(py);
    out.set_item("NLayer", header.n_layer)?;
    out.set_item("NCellX", header.n_cell_x)?;
    out.set_item("NCellY", header.n_cell_y)?;
    out.set_item("LayerThickness", header.layer_thickness)?;
    out.set_item("Particle", header.particle)?;

    let column =
        |f: fn(&EventRecord) -> f64| -> Vec<f64> { records.iter().map(f).collect() };
    out.set_item("Theta", column(|r| r.theta).into_pyarray(py))?;
    out.set_item("Phi", column(|r| r.phi).into_pyarray(py))?;
    out.set_item("Energy", column(|r| r.energy).into_pyarray(py))?;
    out.set_item("X", column(|r| r.x).into_pyarray(py))?;
    out.set_item("Y", column(|r| r.y).into_pyarray(py))?;
    out.set_item("Z", column(|r| r.z).into_pyarray(py))?;

    let pos: Vec<_> = records.iter().map(|r| r.pos.clone().into_pyarray(py)).collect();
    let edep: Vec<_> = records.iter().map(|r| r.edep.clone().into_pyarray(py)).collect();
    out.set_item("Pos", pos)?;
    out.set_item("Edep", edep)?;
    Ok(out.into())
}

/// The calosim Python module entry point.
#[pymodule]
fn calosim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<CaloRun>()?;
    m.add_function(wrap_pyfunction!(load_run, m)?)?;
    Ok(())
}
