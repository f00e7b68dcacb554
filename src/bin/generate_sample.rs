use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use waveform_prep::catalog::evaluation_catalog;
use waveform_prep::data::model::{RawRecord, RecordSet, WAVEFORM_LEN, Waveform};
use waveform_prep::export::write_records;

/// Events written per class code.
const EVENTS_PER_CODE: usize = 400;

fn gaussian(t: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(t - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Pulses `(position, width, amplitude)` characteristic of a class code.
fn pulses(code: &str, rng: &mut ChaCha8Rng) -> Vec<(f64, f64, f64)> {
    let start = rng.gen_range(30.0..50.0);
    let amplitude = rng.gen_range(0.5..2.0);
    match code {
        "DP" => {
            let gap = rng.gen_range(8.0..20.0);
            let ratio = rng.gen_range(0.3..1.0);
            vec![(start, 3.0, amplitude), (start + gap, 3.5, amplitude * ratio)]
        }
        "NDP" => vec![(start, 3.0, amplitude), (start + 4.0, 3.0, amplitude * 0.1)],
        "CC" => vec![(start, 5.0, amplitude)],
        "AM" => (0..6)
            .map(|k| (start + k as f64 * 6.0, 4.0, amplitude * 0.4))
            .collect(),
        // NC and anything unknown: single cascade pulse
        _ => vec![(start, 4.0, amplitude)],
    }
}

fn generate_waveform(code: &str, noise: &Normal<f64>, rng: &mut ChaCha8Rng) -> Waveform {
    let peaks = pulses(code, rng);
    std::array::from_fn(|t| {
        let signal: f64 = peaks
            .iter()
            .map(|&(mu, sigma, amp)| gaussian(t as f64, mu, sigma, amp))
            .sum();
        (signal + noise.sample(&mut *rng)) as f32
    })
}

fn main() -> Result<()> {
    let out_dir = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "sample_data".to_string()),
    );
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let noise = Normal::new(0.0, 0.02).context("noise distribution")?;

    for spec in evaluation_catalog() {
        let mut records = RecordSet::default();
        let mut id: i64 = 0;
        // Interleave codes so first-N capping still sees every code.
        for _ in 0..EVENTS_PER_CODE {
            for code in &spec.included_class_codes {
                records.push(RawRecord {
                    waveform: generate_waveform(code, &noise, &mut rng),
                    class_code: code.clone(),
                    weight: rng.gen_range(1e-6..1e-4),
                    id,
                });
                id += 1;
            }
        }

        let path = out_dir.join(format!("{}.parquet", spec.category_id));
        write_records(&records, &path).with_context(|| format!("writing {}", path.display()))?;
        println!(
            "Wrote {} waveforms ({} samples each) to {}",
            records.len(),
            WAVEFORM_LEN,
            path.display()
        );
    }

    Ok(())
}
