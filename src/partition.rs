//! Per-category stratified train / val / test split.
//!
//! Each category is loaded, labelled and cut into three contiguous slices
//! on its own; the slices are then concatenated in catalog order, so every
//! partition is category-major.

use log::log;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::catalog::DatasetSpec;
use crate::config::{PrepConfig, SplitOrder};
use crate::data::loader::RecordLoader;
use crate::data::model::{DatasetBundle, Label, Partition, RecordSet};
use crate::error::{PrepError, Result};

/// Relative slack absorbing representation error in `n * ratio` before
/// flooring; `1 - 0.8 - 0.1` is `0.09999999999999998`.
const ROUNDING_TOLERANCE: f64 = 1e-12;

/// Row counts for one category's split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

/// Split `n` rows by the configured ratios.
///
/// Test and validation sizes are floored; the remainder goes to train.
pub fn split_sizes(n: usize, config: &PrepConfig) -> SplitSizes {
    let floor = |ratio: f64| (n as f64 * ratio * (1.0 + ROUNDING_TOLERANCE)).floor() as usize;
    let test = floor(config.test_ratio).min(n);
    let val = floor(config.val_ratio()).min(n - test);
    SplitSizes {
        train: n - test - val,
        val,
        test,
    }
}

/// Row order for one category before slicing.
fn row_order(n: usize, order: SplitOrder, category_index: usize) -> Vec<usize> {
    let mut rows: Vec<usize> = (0..n).collect();
    if let SplitOrder::Shuffled { seed } = order {
        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ category_index as u64);
        rows.shuffle(&mut rng);
    }
    rows
}

/// Append the selected rows of one category to `partition`, labelled per `spec`.
fn append_rows(partition: &mut Partition, records: &RecordSet, rows: &[usize], spec: &DatasetSpec) {
    partition.waveforms.reserve(rows.len());
    for &i in rows {
        let code = records.class_codes[i].as_str();
        let label = if spec.is_signal(code) {
            Label::Signal
        } else {
            Label::Background
        };
        partition.waveforms.push(records.waveforms[i]);
        partition.labels.push(label.one_hot());
        partition.weights.push(records.weights[i]);
        partition.ids.push(records.ids[i]);
        partition.reference.push(spec.is_reference(code));
    }
}

/// Drives a [`RecordLoader`] over a catalog and merges the per-category splits.
pub struct DataPartitioner<'a, L: RecordLoader + ?Sized> {
    loader: &'a L,
}

impl<'a, L: RecordLoader + ?Sized> DataPartitioner<'a, L> {
    pub fn new(loader: &'a L) -> Self {
        Self { loader }
    }

    /// Load, label and split every spec, returning the merged bundle.
    ///
    /// Any failure aborts the whole build.
    pub fn build(&self, specs: &[DatasetSpec], config: &PrepConfig) -> Result<DatasetBundle> {
        config.validate()?;
        let level = config.diagnostic_level();
        log!(level, "Loading data from {} categories", specs.len());

        let mut train = Partition::default();
        let mut val = Partition::default();
        let mut test = Partition::default();

        for (index, spec) in specs.iter().enumerate() {
            let records = self.loader.load(
                &spec.category_id,
                &spec.included_class_codes,
                Some(spec.max_events),
            )?;
            if records.is_empty() {
                return Err(PrepError::EmptyCategory {
                    category: spec.category_id.clone(),
                    codes: spec.included_class_codes.iter().cloned().collect(),
                });
            }

            let sizes = split_sizes(records.len(), config);
            let rows = row_order(records.len(), config.split_order, index);
            let (train_rows, rest) = rows.split_at(sizes.train);
            let (val_rows, test_rows) = rest.split_at(sizes.val);

            append_rows(&mut train, &records, train_rows, spec);
            append_rows(&mut val, &records, val_rows, spec);
            append_rows(&mut test, &records, test_rows, spec);

            log!(
                level,
                "category {}: {} events {:?} -> train {} / val {} / test {}",
                spec.category_id,
                records.len(),
                records.class_code_counts(),
                sizes.train,
                sizes.val,
                sizes.test
            );
        }

        let bundle = DatasetBundle::new(train, val, test)?;
        for summary in bundle.summary() {
            log!(level, "{summary}");
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::loader::MemoryRecordLoader;
    use crate::data::model::{PartitionKind, RawRecord, WAVEFORM_LEN};

    /// `n` records alternating DP / NC, ids offset by `base`.
    fn category(n: usize, base: i64) -> RecordSet {
        RecordSet::from_records(
            (0..n)
                .map(|i| RawRecord {
                    waveform: [i as f32; WAVEFORM_LEN],
                    class_code: if i % 2 == 0 { "DP" } else { "NC" }.to_string(),
                    weight: 1.0,
                    id: base + i as i64,
                })
                .collect(),
        )
    }

    fn scenario() -> (MemoryRecordLoader, Vec<DatasetSpec>) {
        let loader = MemoryRecordLoader::new()
            .with_category("a", category(100, 0))
            .with_category("b", category(50, 1_000))
            .with_category("c", category(70, 2_000));
        let specs = vec![
            DatasetSpec::new("a", &["DP", "NC"], 10_000),
            DatasetSpec::new("b", &["DP", "NC"], 10_000),
            DatasetSpec::new("c", &["DP", "NC"], 10_000),
        ];
        (loader, specs)
    }

    fn config(train: f64, test: f64) -> PrepConfig {
        PrepConfig {
            train_ratio: train,
            test_ratio: test,
            verbose: false,
            ..PrepConfig::default()
        }
    }

    fn id_set(p: &Partition) -> BTreeSet<i64> {
        p.ids().iter().copied().collect()
    }

    #[test]
    fn split_sizes_assign_remainder_to_train() {
        let c = config(0.8, 0.1);
        assert_eq!(split_sizes(100, &c), SplitSizes { train: 80, val: 10, test: 10 });
        assert_eq!(split_sizes(50, &c), SplitSizes { train: 40, val: 5, test: 5 });
        assert_eq!(split_sizes(70, &c), SplitSizes { train: 56, val: 7, test: 7 });
        assert_eq!(split_sizes(7, &c), SplitSizes { train: 7, val: 0, test: 0 });
        assert_eq!(split_sizes(0, &c), SplitSizes { train: 0, val: 0, test: 0 });
    }

    #[test]
    fn split_sizes_stay_exact_for_large_categories() {
        let c = config(0.8, 0.1);
        for n in [1_000_000, 100_000_000, 2_000_000_000] {
            let sizes = split_sizes(n, &c);
            assert_eq!(sizes.val, n / 10, "n = {n}");
            assert_eq!(sizes.test, n / 10, "n = {n}");
            assert_eq!(sizes.train, n - 2 * (n / 10));
        }
        assert_eq!(split_sizes(99, &c), SplitSizes { train: 81, val: 9, test: 9 });
    }

    #[test]
    fn three_category_scenario_merges_to_expected_totals() {
        let (loader, specs) = scenario();
        let bundle = DataPartitioner::new(&loader)
            .build(&specs, &config(0.8, 0.1))
            .unwrap();
        assert_eq!(bundle.train().len(), 176);
        assert_eq!(bundle.val().len(), 22);
        assert_eq!(bundle.test().len(), 22);
    }

    #[test]
    fn partitions_are_disjoint_and_exhaustive() {
        let (loader, specs) = scenario();
        for (train, test) in [(0.8, 0.1), (0.6, 0.25), (0.33, 0.33), (0.9, 0.05)] {
            let bundle = DataPartitioner::new(&loader)
                .build(&specs, &config(train, test))
                .unwrap();
            assert_eq!(bundle.len(), 220);

            let (tr, va, te) = (id_set(bundle.train()), id_set(bundle.val()), id_set(bundle.test()));
            assert!(tr.is_disjoint(&va));
            assert!(tr.is_disjoint(&te));
            assert!(va.is_disjoint(&te));
            assert_eq!(tr.len() + va.len() + te.len(), 220);
        }
    }

    #[test]
    fn each_category_is_split_on_its_own() {
        let (loader, specs) = scenario();
        let c = config(0.7, 0.2);
        let bundle = DataPartitioner::new(&loader).build(&specs, &c).unwrap();

        for (base, n) in [(0i64, 100usize), (1_000, 50), (2_000, 70)] {
            let in_category = |p: &Partition| {
                p.ids().iter().filter(|&&id| id >= base && id < base + 1_000).count()
            };
            let expected = split_sizes(n, &c);
            assert_eq!(in_category(bundle.train()), expected.train);
            assert_eq!(in_category(bundle.val()), expected.val);
            assert_eq!(in_category(bundle.test()), expected.test);
        }
    }

    #[test]
    fn rows_are_category_major_in_catalog_order() {
        let (loader, specs) = scenario();
        let bundle = DataPartitioner::new(&loader)
            .build(&specs, &config(0.8, 0.1))
            .unwrap();
        for kind in PartitionKind::ALL {
            let ids = bundle.partition(kind).ids();
            let categories: Vec<i64> = ids.iter().map(|id| id / 1_000).collect();
            let mut sorted = categories.clone();
            sorted.sort();
            assert_eq!(categories, sorted, "{kind} is not category-major");
        }
        // load order: first rows of each category land in train
        assert_eq!(&bundle.train().ids()[..3], &[0, 1, 2]);
    }

    #[test]
    fn labels_follow_the_catalog() {
        let (loader, _) = scenario();
        let specs = vec![DatasetSpec::new("a", &["DP", "NC"], 10_000)];
        let bundle = DataPartitioner::new(&loader)
            .build(&specs, &config(0.8, 0.1))
            .unwrap();
        for (row, label) in bundle.train().ids().iter().zip(bundle.train().labels()) {
            let expected = if row % 2 == 0 { Label::Signal } else { Label::Background };
            assert_eq!(Label::from_one_hot(label), expected);
            assert_eq!(label.iter().sum::<f32>(), 1.0);
        }

        // a catalog without signal codes collapses everything to background
        let mut no_signal = DatasetSpec::new("a", &["DP", "NC"], 10_000);
        no_signal.signal_codes.clear();
        let bundle = DataPartitioner::new(&loader)
            .build(&[no_signal], &config(0.8, 0.1))
            .unwrap();
        assert_eq!(bundle.train().signal_count(), 0);
    }

    #[test]
    fn caps_keep_the_first_matching_events() {
        let (loader, _) = scenario();
        let specs = vec![DatasetSpec::new("a", &["NC"], 20)];
        let bundle = DataPartitioner::new(&loader)
            .build(&specs, &config(0.5, 0.25))
            .unwrap();
        assert_eq!(bundle.len(), 20);
        let mut ids: Vec<i64> = all_ids(&bundle);
        ids.sort();
        assert_eq!(ids, (0..20).map(|i| 2 * i + 1).collect::<Vec<i64>>());
    }

    fn all_ids(bundle: &DatasetBundle) -> Vec<i64> {
        PartitionKind::ALL
            .iter()
            .flat_map(|&k| bundle.partition(k).ids().to_vec())
            .collect()
    }

    #[test]
    fn shuffled_order_is_seeded_and_stratified() {
        let (loader, specs) = scenario();
        let shuffled = |seed| PrepConfig {
            split_order: SplitOrder::Shuffled { seed },
            ..config(0.8, 0.1)
        };
        let a = DataPartitioner::new(&loader).build(&specs, &shuffled(7)).unwrap();
        let b = DataPartitioner::new(&loader).build(&specs, &shuffled(7)).unwrap();
        let c = DataPartitioner::new(&loader).build(&specs, &shuffled(8)).unwrap();
        let plain = DataPartitioner::new(&loader).build(&specs, &config(0.8, 0.1)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a.train().ids(), c.train().ids());
        assert_ne!(a.train().ids(), plain.train().ids());
        assert_eq!(
            (a.train().len(), a.val().len(), a.test().len()),
            (176, 22, 22)
        );

        for bundle in [&a, &c] {
            let (tr, va, te) = (id_set(bundle.train()), id_set(bundle.val()), id_set(bundle.test()));
            assert!(tr.is_disjoint(&va));
            assert!(tr.is_disjoint(&te));
            assert!(va.is_disjoint(&te));
            let mut ids = all_ids(bundle);
            ids.sort();
            let mut expected = all_ids(&plain);
            expected.sort();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn verbose_flag_does_not_change_the_bundle() {
        let (loader, specs) = scenario();
        for split_order in [SplitOrder::LoadOrder, SplitOrder::Shuffled { seed: 11 }] {
            let build = |verbose| {
                let c = PrepConfig {
                    verbose,
                    split_order,
                    ..config(0.7, 0.2)
                };
                DataPartitioner::new(&loader).build(&specs, &c).unwrap()
            };
            assert_eq!(build(true), build(false));
        }
    }

    #[test]
    fn empty_category_is_an_error() {
        let (loader, _) = scenario();
        let specs = vec![
            DatasetSpec::new("a", &["DP"], 100),
            DatasetSpec::new("b", &["AM"], 100),
        ];
        let err = DataPartitioner::new(&loader)
            .build(&specs, &config(0.8, 0.1))
            .unwrap_err();
        assert!(matches!(err, PrepError::EmptyCategory { ref category, .. } if category == "b"));
    }

    #[test]
    fn missing_category_and_bad_ratios_propagate() {
        let (loader, mut specs) = scenario();
        assert!(matches!(
            DataPartitioner::new(&loader).build(&specs, &config(0.8, 0.2)),
            Err(PrepError::Configuration(_))
        ));

        specs.push(DatasetSpec::new("missing", &["NC"], 10));
        assert!(matches!(
            DataPartitioner::new(&loader).build(&specs, &config(0.8, 0.1)),
            Err(PrepError::DataUnavailable { .. })
        ));
    }
}
