use crate::core::accumulator::DepositAccumulator;
use crate::core::record::EventRecord;
use crate::core::vertex::KinematicSample;
use crate::error::Result;
use crate::store::RecordStore;

/// Assembles per-event records and owns the store they are appended to.
#[derive(Debug)]
pub struct EventRecordWriter<S: RecordStore> {
    store: S,
    written: u64,
}

impl<S: RecordStore> EventRecordWriter<S> {
    pub fn new(store: S) -> Self {
        Self { store, written: 0 }
    }

    /// Write one record from `kin` and the accumulator's snapshot, then reset
    /// the accumulator. The reset happens even if the append fails, so
    /// accumulation never spans two records.
    pub fn flush_event(
        &mut self,
        kin: &KinematicSample,
        accumulator: &mut DepositAccumulator,
    ) -> Result<EventRecord> {
        let record = EventRecord::assemble(kin, &accumulator.snapshot(), accumulator.grid());
        accumulator.reset();
        self.store.append(&record)?;
        self.written += 1;
        log::debug!(
            "Flushed event {} with {} cells, {:.6} MeV",
            self.written - 1,
            record.pos.len(),
            record.total_edep()
        );
        Ok(record)
    }

    /// Records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Finalize the store and hand it back.
    pub fn close(mut self) -> Result<S> {
        self.store.finalize()?;
        Ok(self.store)
    }
}
