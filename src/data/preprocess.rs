use std::collections::BTreeMap;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::filter::LabeledSet;
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Column-wise min-max scaling
// ---------------------------------------------------------------------------

/// Rescale every column to `[0, 1]` using its own minimum and maximum.
///
/// A column with zero range carries no information and is mapped to `0.0`.
pub fn minmax_scale(features: &Array2<f32>) -> Array2<f32> {
    let mut scaled = features.clone();
    for mut column in scaled.columns_mut() {
        let min = column.fold(f32::INFINITY, |acc, &v| acc.min(v));
        let max = column.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        let range = max - min;
        if range.abs() < f32::EPSILON {
            column.fill(0.0);
        } else {
            column.mapv_inplace(|v| (v - min) / range);
        }
    }
    scaled
}

// ---------------------------------------------------------------------------
// One-hot encoding
// ---------------------------------------------------------------------------

/// Encode raw labels as rows of a `(labels, num_classes)` indicator matrix.
/// Column `k` is set for label `k`; labels are not re-indexed.
pub fn one_hot(labels: &[u32], num_classes: usize) -> Result<Array2<f32>, PipelineError> {
    let mut encoded = Array2::zeros((labels.len(), num_classes));
    for (row, &label) in labels.iter().enumerate() {
        let col = label as usize;
        if col >= num_classes {
            return Err(PipelineError::InvalidLabel {
                value: f64::from(label),
                index: row,
            });
        }
        encoded[[row, col]] = 1.0;
    }
    Ok(encoded)
}

// ---------------------------------------------------------------------------
// Train / test split
// ---------------------------------------------------------------------------

/// Row indices of the two partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Share `total` hold-out rows among classes of the given sizes in proportion
/// to their size: every class gets the floor of its exact share, and the
/// leftover rows go to the largest fractional remainders (ties to the lower
/// class). A class never gives up its last row.
fn allocate_hold_out(counts: &[usize], total: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return vec![0; counts.len()];
    }
    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| total as f64 * c as f64 / n as f64)
        .collect();
    let mut quotas: Vec<usize> = exact
        .iter()
        .zip(counts)
        .map(|(&e, &c)| (e.floor() as usize).min(c.saturating_sub(1)))
        .collect();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (exact[a] - exact[a].floor(), exact[b] - exact[b].floor());
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    let mut left = total.saturating_sub(quotas.iter().sum());
    while left > 0 {
        let mut placed = false;
        for &class in &order {
            if left == 0 {
                break;
            }
            if quotas[class] + 1 < counts[class] {
                quotas[class] += 1;
                left -= 1;
                placed = true;
            }
        }
        if !placed {
            break;
        }
    }
    quotas
}

/// Seeded shuffle split holding out `ceil(test_fraction * n)` rows.
///
/// With `stratify`, that hold-out is shared among classes in proportion to
/// their size, so every class with at least two rows appears in both
/// partitions.
pub fn train_test_split(
    labels: &[u32],
    test_fraction: f64,
    stratify: bool,
    seed: u64,
) -> Result<Split, PipelineError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "test fraction must lie in (0, 1), got {test_fraction}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let n_test = ((test_fraction * labels.len() as f64).ceil() as usize).min(labels.len());

    let (mut train, mut test) = if stratify {
        let mut by_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }
        let counts: Vec<usize> = by_class.values().map(Vec::len).collect();
        let quotas = allocate_hold_out(&counts, n_test);

        let mut train = Vec::with_capacity(labels.len());
        let mut test = Vec::with_capacity(n_test);
        for ((_, mut rows), quota) in by_class.into_iter().zip(quotas) {
            rows.shuffle(&mut rng);
            test.extend_from_slice(&rows[..quota]);
            train.extend_from_slice(&rows[quota..]);
        }
        (train, test)
    } else {
        let mut rows: Vec<usize> = (0..labels.len()).collect();
        rows.shuffle(&mut rng);
        let train = rows.split_off(n_test);
        (train, rows)
    };

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok(Split { train, test })
}

// ---------------------------------------------------------------------------
// PreparedData – model-ready matrices
// ---------------------------------------------------------------------------

/// One partition: scaled features and class indices.
#[derive(Debug, Clone)]
pub struct Partition {
    /// (rows, bands), values in `[0, 1]`.
    pub features: Array2<f32>,
    /// (rows, num_classes) one-hot targets.
    pub targets: Array2<f32>,
    pub labels: Vec<u32>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn bands(&self) -> usize {
        self.features.ncols()
    }
}

/// Scaled feature matrix, one-hot label matrix and the train/test split.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub features: Array2<f32>,
    pub targets: Array2<f32>,
    pub labels: Vec<u32>,
    /// `max_label + 1`; column 0 stands for background and stays empty.
    pub num_classes: usize,
    pub split: Split,
}

impl PreparedData {
    pub fn prepare(
        labeled: &LabeledSet,
        test_fraction: f64,
        stratify: bool,
        seed: u64,
    ) -> Result<Self, PipelineError> {
        if labeled.is_empty() {
            return Err(PipelineError::NoLabeledPixels);
        }
        let num_classes = labeled.max_label() as usize + 1;
        let features = minmax_scale(&labeled.features);
        let targets = one_hot(&labeled.labels, num_classes)?;
        let split = train_test_split(&labeled.labels, test_fraction, stratify, seed)?;

        Ok(PreparedData {
            features,
            targets,
            labels: labeled.labels.clone(),
            num_classes,
            split,
        })
    }

    pub fn bands(&self) -> usize {
        self.features.ncols()
    }

    pub fn train(&self) -> Partition {
        self.partition(&self.split.train)
    }

    pub fn test(&self) -> Partition {
        self.partition(&self.split.test)
    }

    fn partition(&self, rows: &[usize]) -> Partition {
        Partition {
            features: self.features.select(Axis(0), rows),
            targets: self.targets.select(Axis(0), rows),
            labels: rows.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn scaled_columns_span_unit_interval() {
        let x = array![[2.0, -1.0], [4.0, 1.0], [3.0, 0.0]];
        let s = minmax_scale(&x);
        assert_eq!(s, array![[0.0, 0.0], [1.0, 1.0], [0.5, 0.5]]);
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let x = array![[7.0, 1.0], [7.0, 2.0]];
        let s = minmax_scale(&x);
        assert_eq!(s.column(0).to_vec(), vec![0.0, 0.0]);
        assert!(s.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn one_hot_keeps_raw_label_positions() {
        let y = one_hot(&[1, 3, 1], 4).unwrap();
        assert_eq!(y, array![[0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0]]);
        assert!(one_hot(&[4], 4).is_err());
    }

    #[test]
    fn split_partitions_every_row_once() {
        let labels: Vec<u32> = (0..101).map(|i| (i % 5) as u32 + 1).collect();
        for stratify in [false, true] {
            let split = train_test_split(&labels, 0.3, stratify, 11).unwrap();
            assert_eq!(split.train.len() + split.test.len(), labels.len());
            let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
            all.sort_unstable();
            assert_eq!(all, (0..101).collect::<Vec<_>>());
        }
    }

    #[test]
    fn unstratified_split_holds_out_ceiling_share() {
        let labels = vec![1u32; 54129];
        let split = train_test_split(&labels, 0.3, false, 11).unwrap();
        assert_eq!(split.test.len(), 16239);
        assert_eq!(split.train.len(), 37890);
    }

    #[test]
    fn stratified_split_of_salinas_classes_matches_overall_share() {
        let counts = [
            2009, 3726, 1976, 1394, 2678, 3959, 3579, 11271, 6203, 3278, 1068, 1927, 916, 1070,
            7268, 1807,
        ];
        let labels: Vec<u32> = counts
            .iter()
            .enumerate()
            .flat_map(|(i, &n)| std::iter::repeat(i as u32 + 1).take(n))
            .collect();
        assert_eq!(labels.len(), 54129);

        let split = train_test_split(&labels, 0.3, true, 11).unwrap();
        assert_eq!(split.test.len(), 16239);
        assert_eq!(split.train.len(), 37890);

        for (i, &n) in counts.iter().enumerate() {
            let held = split.test.iter().filter(|&&r| labels[r] == i as u32 + 1).count();
            let share = 16239.0 * n as f64 / 54129.0;
            assert!((held as f64 - share).abs() < 1.0, "class {} held {held}", i + 1);
        }
    }

    #[test]
    fn hold_out_never_takes_a_class_last_row() {
        assert_eq!(allocate_hold_out(&[1, 9], 5), vec![0, 5]);
        assert_eq!(allocate_hold_out(&[2, 2], 4), vec![1, 1]);
        assert_eq!(allocate_hold_out(&[3, 3, 4], 4), vec![1, 1, 2]);
    }

    #[test]
    fn stratified_split_keeps_every_class_in_both_partitions() {
        let labels: Vec<u32> = (0..40).map(|i| if i < 30 { 1 } else { 2 }).collect();
        let split = train_test_split(&labels, 0.3, true, 3).unwrap();
        for class in [1, 2] {
            assert!(split.train.iter().any(|&i| labels[i] == class));
            assert!(split.test.iter().any(|&i| labels[i] == class));
        }
    }

    #[test]
    fn split_is_deterministic_for_a_seed() {
        let labels: Vec<u32> = (0..50).map(|i| (i % 3) as u32 + 1).collect();
        let a = train_test_split(&labels, 0.25, true, 42).unwrap();
        let b = train_test_split(&labels, 0.25, true, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_test_fraction_is_rejected() {
        assert!(train_test_split(&[1, 2], 0.0, false, 0).is_err());
        assert!(train_test_split(&[1, 2], 1.0, false, 0).is_err());
    }

    #[test]
    fn prepared_shapes_follow_labels() {
        let labeled = LabeledSet {
            features: array![[1.0, 5.0], [2.0, 6.0], [3.0, 7.0], [4.0, 8.0]],
            labels: vec![1, 2, 1, 2],
        };
        let prepared = PreparedData::prepare(&labeled, 0.5, true, 1).unwrap();
        assert_eq!(prepared.features.dim(), (4, 2));
        assert_eq!(prepared.targets.dim(), (4, 3));
        assert_eq!(prepared.num_classes, 3);

        let train = prepared.train();
        let test = prepared.test();
        assert_eq!(train.len() + test.len(), 4);
        for part in [&train, &test] {
            for (row, &label) in part.labels.iter().enumerate() {
                assert_eq!(part.targets[[row, label as usize]], 1.0);
            }
        }
    }

    #[test]
    fn preparing_an_empty_set_fails() {
        let labeled = LabeledSet {
            features: Array2::zeros((0, 3)),
            labels: vec![],
        };
        assert!(matches!(
            PreparedData::prepare(&labeled, 0.3, false, 0),
            Err(PipelineError::NoLabeledPixels)
        ));
    }
}
