//! Feature-wise standardisation of waveform amplitudes.
//!
//! Statistics are fitted once, on the training partition only, and the same
//! affine map is then applied to train, val and test.

use log::log;
use serde::{Deserialize, Serialize};

use crate::data::model::{DatasetBundle, PartitionKind, WAVEFORM_LEN, Waveform};
use crate::error::{PrepError, Result};

/// Scales below this are treated as zero variance and replaced by 1.
const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

/// Per-feature location and scale.
///
/// Always holds exactly [`WAVEFORM_LEN`] finite means and positive finite
/// scales; construct through [`fit`](Self::fit) or [`new`](Self::new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    mean: Vec<f64>,
    /// Population standard deviation, floored to 1 for constant features.
    scale: Vec<f64>,
    /// Rows the statistics were computed over.
    n_samples: usize,
}

impl ScaleParams {
    /// Wrap externally supplied statistics, e.g. read back from disk.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>, n_samples: usize) -> Result<Self> {
        let params = ScaleParams {
            mean,
            scale,
            n_samples,
        };
        params.validate()?;
        Ok(params)
    }

    /// Reject parameters that would rescale only part of a waveform or
    /// produce non-finite output.
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != WAVEFORM_LEN || self.scale.len() != WAVEFORM_LEN {
            return Err(PrepError::configuration(format!(
                "scale params cover {} means and {} scales, expected {WAVEFORM_LEN} of each",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(j) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(PrepError::configuration(format!(
                "mean of feature {j} is {}",
                self.mean[j]
            )));
        }
        if let Some(j) = self.scale.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(PrepError::configuration(format!(
                "scale of feature {j} is {}",
                self.scale[j]
            )));
        }
        Ok(())
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Fit mean and standard deviation of every feature over the rows
    /// selected by `mask` (all rows when `None`).
    pub fn fit(waveforms: &[Waveform], mask: Option<&[bool]>) -> Result<Self> {
        if let Some(mask) = mask {
            if mask.len() != waveforms.len() {
                return Err(PrepError::configuration(format!(
                    "fit mask has {} entries for {} waveforms",
                    mask.len(),
                    waveforms.len()
                )));
            }
        }
        let selected = |i: usize| mask.map_or(true, |m| m[i]);

        let mut n = 0usize;
        let mut sum = [0.0f64; WAVEFORM_LEN];
        for (i, wf) in waveforms.iter().enumerate() {
            if !selected(i) {
                continue;
            }
            n += 1;
            for (acc, &x) in sum.iter_mut().zip(wf) {
                *acc += x as f64;
            }
        }
        if n == 0 {
            return Err(PrepError::configuration("no rows selected for scale fit"));
        }
        let mean: Vec<f64> = sum.iter().map(|s| s / n as f64).collect();

        // Second pass keeps the variance accurate for large offsets.
        let mut sq = [0.0f64; WAVEFORM_LEN];
        for (i, wf) in waveforms.iter().enumerate() {
            if !selected(i) {
                continue;
            }
            for ((acc, &x), m) in sq.iter_mut().zip(wf).zip(&mean) {
                let d = x as f64 - m;
                *acc += d * d;
            }
        }

        let mut degenerate = 0usize;
        let scale: Vec<f64> = sq
            .iter()
            .map(|s| {
                let std = (s / n as f64).sqrt();
                if std < MIN_SCALE {
                    degenerate += 1;
                    1.0
                } else {
                    std
                }
            })
            .collect();
        if degenerate > 0 {
            log::warn!("{degenerate} feature(s) have zero variance; scale floored to 1");
        }

        ScaleParams::new(mean, scale, n)
    }

    /// Apply `(x - mean) / scale` to every feature in place.
    pub fn transform(&self, waveforms: &mut [Waveform]) {
        for wf in waveforms.iter_mut() {
            for ((x, m), s) in wf.iter_mut().zip(&self.mean).zip(&self.scale) {
                *x = ((*x as f64 - m) / s) as f32;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rescaler – fit on train, transform all partitions
// ---------------------------------------------------------------------------

/// Which training rows the scale fit sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMask {
    #[default]
    AllRows,
    /// Only rows of the catalog's pure reference classes.
    ReferenceRows,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Rescaler {
    mask: FitMask,
}

impl Rescaler {
    pub fn new(mask: FitMask) -> Self {
        Self { mask }
    }

    /// Fit on `bundle.train` and transform all three partitions with the
    /// same parameters. Consumes the bundle so nothing can observe it half
    /// rescaled.
    pub fn apply(
        &self,
        mut bundle: DatasetBundle,
        level: log::Level,
    ) -> Result<(DatasetBundle, ScaleParams)> {
        let mask = match self.mask {
            FitMask::AllRows => None,
            FitMask::ReferenceRows => Some(bundle.train.reference_mask()),
        };
        let params = ScaleParams::fit(bundle.train.waveforms(), mask)?;
        log!(
            level,
            "fitted scale on {} of {} training rows ({:?})",
            params.n_samples,
            bundle.train.len(),
            self.mask
        );

        for kind in PartitionKind::ALL {
            let partition = match kind {
                PartitionKind::Train => &mut bundle.train,
                PartitionKind::Val => &mut bundle.val,
                PartitionKind::Test => &mut bundle.test,
            };
            params.transform(&mut partition.waveforms);
        }
        Ok((bundle, params))
    }
}
