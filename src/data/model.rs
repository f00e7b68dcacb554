use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PrepError, Result};

/// Samples per detector waveform.
pub const WAVEFORM_LEN: usize = 128;

/// One fixed-length waveform.
pub type Waveform = [f32; WAVEFORM_LEN];

// ---------------------------------------------------------------------------
// RawRecord / RecordSet – what a RecordLoader hands back
// ---------------------------------------------------------------------------

/// A single detector event as read from a category's store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub waveform: Waveform,
    /// Fine-grained physics class, e.g. `DP`, `NC`, `CC`.
    pub class_code: String,
    /// Rate-normalisation weight.
    pub weight: f64,
    /// Unique within the source category only.
    pub id: i64,
}

/// Parallel arrays of the records loaded for one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub waveforms: Vec<Waveform>,
    pub class_codes: Vec<String>,
    pub weights: Vec<f64>,
    pub ids: Vec<i64>,
}

impl RecordSet {
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut set = RecordSet {
            waveforms: Vec::with_capacity(records.len()),
            class_codes: Vec::with_capacity(records.len()),
            weights: Vec::with_capacity(records.len()),
            ids: Vec::with_capacity(records.len()),
        };
        for rec in records {
            set.push(rec);
        }
        set
    }

    pub fn push(&mut self, rec: RawRecord) {
        self.waveforms.push(rec.waveform);
        self.class_codes.push(rec.class_code);
        self.weights.push(rec.weight);
        self.ids.push(rec.id);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Copy out the rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> RecordSet {
        RecordSet {
            waveforms: indices.iter().map(|&i| self.waveforms[i]).collect(),
            class_codes: indices.iter().map(|&i| self.class_codes[i].clone()).collect(),
            weights: indices.iter().map(|&i| self.weights[i]).collect(),
            ids: indices.iter().map(|&i| self.ids[i]).collect(),
        }
    }

    /// Record count per class code.
    pub fn class_code_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for code in &self.class_codes {
            *counts.entry(code.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Label – binary target
// ---------------------------------------------------------------------------

/// Binary classifier target. One-hot layout is `[signal, background]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Signal,
    Background,
}

impl Label {
    pub fn one_hot(self) -> [f32; 2] {
        match self {
            Label::Signal => [1.0, 0.0],
            Label::Background => [0.0, 1.0],
        }
    }

    pub fn from_one_hot(row: &[f32; 2]) -> Self {
        if row[0] > row[1] {
            Label::Signal
        } else {
            Label::Background
        }
    }
}

// ---------------------------------------------------------------------------
// Partition – one of train / val / test
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Train,
    Val,
    Test,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] =
        [PartitionKind::Train, PartitionKind::Val, PartitionKind::Test];
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKind::Train => f.pad("train"),
            PartitionKind::Val => f.pad("val"),
            PartitionKind::Test => f.pad("test"),
        }
    }
}

/// Parallel arrays for one partition.
///
/// `reference` flags rows whose class code the catalog marks as a pure
/// reference class; it drives the masked scale fit and is otherwise unused.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub(crate) waveforms: Vec<Waveform>,
    pub(crate) labels: Vec<[f32; 2]>,
    pub(crate) weights: Vec<f64>,
    pub(crate) ids: Vec<i64>,
    pub(crate) reference: Vec<bool>,
}

impl Partition {
    /// Assemble a partition, checking that all arrays have the same length.
    pub fn new(
        kind: PartitionKind,
        waveforms: Vec<Waveform>,
        labels: Vec<[f32; 2]>,
        weights: Vec<f64>,
        ids: Vec<i64>,
        reference: Vec<bool>,
    ) -> Result<Self> {
        let partition = Partition {
            waveforms,
            labels,
            weights,
            ids,
            reference,
        };
        partition.check_shape(kind)?;
        Ok(partition)
    }

    pub(crate) fn check_shape(&self, kind: PartitionKind) -> Result<()> {
        let n = self.waveforms.len();
        if self.labels.len() != n
            || self.weights.len() != n
            || self.ids.len() != n
            || self.reference.len() != n
        {
            return Err(PrepError::ShapeMismatch {
                partition: kind.to_string(),
                waveforms: n,
                labels: self.labels.len(),
                weights: self.weights.len(),
                ids: self.ids.len(),
            });
        }
        Ok(())
    }

    pub fn waveforms(&self) -> &[Waveform] {
        &self.waveforms
    }

    pub fn labels(&self) -> &[[f32; 2]] {
        &self.labels
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn reference_mask(&self) -> &[bool] {
        &self.reference
    }

    pub fn len(&self) -> usize {
        self.waveforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waveforms.is_empty()
    }

    pub fn signal_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|row| Label::from_one_hot(row) == Label::Signal)
            .count()
    }

    pub fn background_count(&self) -> usize {
        self.len() - self.signal_count()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn summary(&self, kind: PartitionKind) -> PartitionSummary {
        PartitionSummary {
            kind,
            len: self.len(),
            signal: self.signal_count(),
            background: self.background_count(),
            total_weight: self.total_weight(),
        }
    }
}

/// Row counts for logging and the CLI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionSummary {
    pub kind: PartitionKind,
    pub len: usize,
    pub signal: usize,
    pub background: usize,
    pub total_weight: f64,
}

impl fmt::Display for PartitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<5} {:>8} events ({} signal, {} background), total weight {:.4e}",
            self.kind, self.len, self.signal, self.background, self.total_weight
        )
    }
}

// ---------------------------------------------------------------------------
// DatasetBundle – the prepared triple
// ---------------------------------------------------------------------------

/// Train / val / test partitions handed to downstream consumers.
///
/// Only readable from outside the crate; once returned by the pipeline it
/// is never modified again.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetBundle {
    pub(crate) train: Partition,
    pub(crate) val: Partition,
    pub(crate) test: Partition,
}

impl DatasetBundle {
    pub(crate) fn new(train: Partition, val: Partition, test: Partition) -> Result<Self> {
        train.check_shape(PartitionKind::Train)?;
        val.check_shape(PartitionKind::Val)?;
        test.check_shape(PartitionKind::Test)?;
        Ok(DatasetBundle { train, val, test })
    }

    pub fn train(&self) -> &Partition {
        &self.train
    }

    pub fn val(&self) -> &Partition {
        &self.val
    }

    pub fn test(&self) -> &Partition {
        &self.test
    }

    pub fn partition(&self, kind: PartitionKind) -> &Partition {
        match kind {
            PartitionKind::Train => &self.train,
            PartitionKind::Val => &self.val,
            PartitionKind::Test => &self.test,
        }
    }

    /// Total rows across all three partitions.
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> [PartitionSummary; 3] {
        PartitionKind::ALL.map(|kind| self.partition(kind).summary(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, id: i64) -> RawRecord {
        RawRecord {
            waveform: [id as f32; WAVEFORM_LEN],
            class_code: code.to_string(),
            weight: 0.5,
            id,
        }
    }

    #[test]
    fn one_hot_rows_sum_to_one() {
        for label in [Label::Signal, Label::Background] {
            let row = label.one_hot();
            assert_eq!(row.iter().sum::<f32>(), 1.0);
            assert_eq!(Label::from_one_hot(&row), label);
        }
    }

    #[test]
    fn record_set_select_keeps_rows_aligned() {
        let set = RecordSet::from_records(vec![record("DP", 1), record("NC", 2), record("NC", 3)]);
        let picked = set.select(&[2, 0]);
        assert_eq!(picked.ids, vec![3, 1]);
        assert_eq!(picked.class_codes, vec!["NC", "DP"]);
        assert_eq!(picked.waveforms[0][0], 3.0);
        assert_eq!(set.class_code_counts().get("NC"), Some(&2));
    }

    #[test]
    fn partition_rejects_ragged_arrays() {
        let err = Partition::new(
            PartitionKind::Val,
            vec![[0.0; WAVEFORM_LEN]; 2],
            vec![Label::Signal.one_hot(); 2],
            vec![1.0],
            vec![1, 2],
            vec![true; 2],
        )
        .unwrap_err();
        match err {
            PrepError::ShapeMismatch {
                partition, weights, ..
            } => {
                assert_eq!(partition, "val");
                assert_eq!(weights, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn partition_counts_labels() {
        let p = Partition::new(
            PartitionKind::Train,
            vec![[0.0; WAVEFORM_LEN]; 3],
            vec![
                Label::Signal.one_hot(),
                Label::Background.one_hot(),
                Label::Background.one_hot(),
            ],
            vec![1.0, 2.0, 3.0],
            vec![1, 2, 3],
            vec![true; 3],
        )
        .unwrap();
        let s = p.summary(PartitionKind::Train);
        assert_eq!((s.len, s.signal, s.background), (3, 1, 2));
        assert_eq!(s.total_weight, 6.0);
    }
}
