use crate::config::CaloConfig;
use crate::core::accumulator::DepositAccumulator;
use crate::core::cell::{map_position, CellKey};
use crate::core::geometry::{Geometry, VolumeKind};
use crate::core::record::{EventRecord, RunHeader};
use crate::core::vertex::{KinematicSample, SourceConfig, VertexSampler};
use crate::core::writer::EventRecordWriter;
use crate::error::{Error, Result};
use crate::store::{JsonlStore, RecordStore};

/// One transport step as reported by the external engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDeposit {
    pub pre: [f64; 3],
    pub post: [f64; 3],
    /// Energy deposited along the step (MeV, >= 0).
    pub edep: f64,
    /// Volume the step started in.
    pub volume: VolumeKind,
}

impl StepDeposit {
    #[inline]
    pub fn midpoint(&self) -> [f64; 3] {
        [
            0.5 * (self.pre[0] + self.post[0]),
            0.5 * (self.pre[1] + self.post[1]),
            0.5 * (self.pre[2] + self.post[2]),
        ]
    }
}

/// Totals reported when a run finishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub events: u64,
    pub total_edep: f64,
}

/// Everything one run owns: geometry, accumulator, vertex stream and output.
///
/// Driven by the external event loop: `begin_event`, any number of
/// `on_deposit`, `end_event`, repeated; then `finish` (or `abort` on error).
#[derive(Debug)]
pub struct RunContext<S: RecordStore> {
    geometry: Geometry,
    accumulator: DepositAccumulator,
    sampler: VertexSampler,
    writer: EventRecordWriter<S>,
    current: Option<KinematicSample>,
    total_edep: f64,
}

impl RunContext<JsonlStore> {
    /// Run begin with the file-backed store at the configured output path.
    pub fn open(config: &CaloConfig) -> Result<Self> {
        let geometry = config.geometry()?;
        let header = RunHeader::new(&geometry, &config.source.particle);
        let store = JsonlStore::create(config.output.path(), &header)?;
        Self::with_geometry(geometry, config.source.clone(), config.seed, store)
    }
}

impl<S: RecordStore> RunContext<S> {
    /// Run begin: validate the configuration and bind it to `store`.
    pub fn begin(config: &CaloConfig, store: S) -> Result<Self> {
        let geometry = config.geometry()?;
        Self::with_geometry(geometry, config.source.clone(), config.seed, store)
    }

    pub fn with_geometry(
        geometry: Geometry,
        source: SourceConfig,
        seed: Option<u64>,
        store: S,
    ) -> Result<Self> {
        let sampler = VertexSampler::new(source, seed)?;
        let mut accumulator = DepositAccumulator::new(geometry.n_layers(), geometry.grid());
        accumulator.reset();
        log::info!(
            "Run begin: {} layers of {:.3} mm, {}x{} cells",
            geometry.n_layers(),
            geometry.layer_thickness(),
            geometry.grid().n_cell_x,
            geometry.grid().n_cell_y
        );
        Ok(Self {
            geometry,
            accumulator,
            sampler,
            writer: EventRecordWriter::new(store),
            current: None,
            total_edep: 0.0,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn accumulator(&self) -> &DepositAccumulator {
        &self.accumulator
    }

    pub fn store(&self) -> &S {
        self.writer.store()
    }

    /// Kinematics of the event in progress, if any.
    pub fn current_event(&self) -> Option<&KinematicSample> {
        self.current.as_ref()
    }

    pub fn events_written(&self) -> u64 {
        self.writer.written()
    }

    /// Start an event by drawing its primary vertex.
    pub fn begin_event(&mut self) -> Result<KinematicSample> {
        if self.current.is_some() {
            return Err(Error::EventLifecycle("begin_event while an event is in progress"));
        }
        let kin = self.sampler.sample(&self.geometry);
        self.current = Some(kin);
        Ok(kin)
    }

    /// Consume one transport step. Steps outside the sensitive slabs are ignored.
    pub fn on_deposit(&mut self, step: &StepDeposit) -> Result<()> {
        self.require_event()?;
        if step.volume != VolumeKind::Sensitive {
            return Ok(());
        }
        self.deposit_at(step.midpoint(), step.edep)
    }

    /// Map `position` and add `energy` to its bin.
    pub fn deposit_at(&mut self, position: [f64; 3], energy: f64) -> Result<()> {
        self.require_event()?;
        validate_energy(energy)?;
        let key = map_position(position, &self.geometry)?;
        self.accumulator.add_deposit(key, energy)
    }

    /// Add `energy` to an already mapped bin.
    pub fn deposit_key(&mut self, key: CellKey, energy: f64) -> Result<()> {
        self.require_event()?;
        validate_energy(energy)?;
        self.accumulator.add_deposit(key, energy)
    }

    /// End the event: write its record and reset the accumulator.
    pub fn end_event(&mut self) -> Result<EventRecord> {
        let kin = self
            .current
            .take()
            .ok_or(Error::EventLifecycle("end_event without an event in progress"))?;
        let record = self.writer.flush_event(&kin, &mut self.accumulator)?;
        self.total_edep += record.total_edep();
        Ok(record)
    }

    /// Run end: finalize the store. An event still in progress is discarded.
    pub fn finish(mut self) -> Result<(RunSummary, S)> {
        if self.current.take().is_some() {
            log::warn!("Run finished with an event in progress; discarding it");
            self.accumulator.reset();
        }
        let summary = RunSummary {
            events: self.writer.written(),
            total_edep: self.total_edep,
        };
        let store = self.writer.close()?;
        log::info!(
            "Run end: {} events, {:.6} MeV deposited",
            summary.events,
            summary.total_edep
        );
        Ok((summary, store))
    }

    /// Error exit: drop the unflushed event and finalize what was written.
    pub fn abort(mut self) -> Result<S> {
        self.current = None;
        self.accumulator.reset();
        log::warn!(
            "Run aborted after {} events; finalizing store",
            self.writer.written()
        );
        self.writer.close()
    }

    fn require_event(&self) -> Result<()> {
        if self.current.is_none() {
            return Err(Error::EventLifecycle("deposit outside of an event"));
        }
        Ok(())
    }
}

fn validate_energy(energy: f64) -> Result<()> {
    if !energy.is_finite() || energy < 0.0 {
        return Err(Error::InvalidDeposit(format!(
            "deposited energy must be finite and >= 0, got {energy}"
        )));
    }
    Ok(())
}
