//! Scoring core of the calorimeter simulation.
//!
//! Geometry derivation, position-to-bin mapping, per-event sparse
//! accumulation, primary vertex sampling and per-event record assembly.

pub mod accumulator;
pub mod cell;
pub mod geometry;
pub mod record;
pub mod run;
pub mod vertex;
pub mod writer;

pub use accumulator::DepositAccumulator;
pub use cell::{map_position, CellKey};
pub use geometry::{CellGrid, Geometry, LayoutParams, Placement, VolumeKind};
pub use record::{EventRecord, RunHeader};
pub use run::{RunContext, RunSummary, StepDeposit};
pub use vertex::{sample_vertex, KinematicSample, SourceConfig, VertexSampler};
pub use writer::EventRecordWriter;
