use crate::storage::RecordList;
use crate::value::Record;

/// Snapshot of one stored record, taken before an attempted replacement.
/// The attempt ends in exactly one of `commit` or `rollback`.
pub(crate) struct RecordTransaction {
    index: usize,
    snapshot: Record,
}

impl RecordTransaction {
    pub fn begin(records: &RecordList, index: usize) -> Option<Self> {
        records.get(index).map(|record| RecordTransaction {
            index,
            snapshot: record.clone(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The snapshot with every field of `patch` laid over it.
    pub fn candidate(&self, patch: &Record) -> Record {
        let mut merged = self.snapshot.clone();
        for (field, value) in patch {
            merged.insert(field.clone(), value.clone());
        }
        merged
    }

    pub fn commit(self, records: &mut RecordList, candidate: Record) {
        records.set(self.index, candidate);
    }

    /// Put the snapshot back in its slot.
    pub fn rollback(self, records: &mut RecordList) {
        records.set(self.index, self.snapshot);
    }
}
