//! Event-scoped energy deposit scoring for a layered sampling calorimeter.
//!
//! A transport engine reports energy deposits as 3D step samples. This crate
//! bins them per (layer, x-cell, y-cell) using the same geometry that laid out
//! the detector, accumulates them sparsely per event, and writes one record
//! per event together with the sampled primary kinematics.
//!
//! ```no_run
//! use calosim::config::CaloConfig;
//! use calosim::core::{RunContext, StepDeposit, VolumeKind};
//!
//! # fn main() -> calosim::error::Result<()> {
//! let mut run = RunContext::open(&CaloConfig::default())?;
//! run.begin_event()?;
//! run.on_deposit(&StepDeposit {
//!     pre: [0.0, 0.0, 3.5],
//!     post: [0.0, 0.0, 3.8],
//!     edep: 0.12,
//!     volume: VolumeKind::Sensitive,
//! })?;
//! run.end_event()?;
//! let (summary, _store) = run.finish()?;
//! assert_eq!(summary.events, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod reco;
pub mod store;

#[cfg(feature = "python")]
mod python;
