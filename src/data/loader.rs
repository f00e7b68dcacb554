use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::filter::select_records;
use super::model::{RawRecord, RecordSet, WAVEFORM_LEN, Waveform};
use crate::error::{PrepError, Result};

// ---------------------------------------------------------------------------
// RecordLoader – the storage seam
// ---------------------------------------------------------------------------

/// Reads raw waveform records for one run category.
///
/// Implementations return every record whose class code is in
/// `class_codes`, in load order, truncated to the first `cap` matches.
/// A missing or unreadable store is [`PrepError::DataUnavailable`].
pub trait RecordLoader {
    fn load(
        &self,
        category_id: &str,
        class_codes: &BTreeSet<String>,
        cap: Option<usize>,
    ) -> Result<RecordSet>;
}

// ---------------------------------------------------------------------------
// MemoryRecordLoader
// ---------------------------------------------------------------------------

/// Serves categories from records already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordLoader {
    categories: BTreeMap<String, RecordSet>,
}

impl MemoryRecordLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category_id: impl Into<String>, records: RecordSet) {
        self.categories.insert(category_id.into(), records);
    }

    pub fn with_category(mut self, category_id: impl Into<String>, records: RecordSet) -> Self {
        self.insert(category_id, records);
        self
    }
}

impl RecordLoader for MemoryRecordLoader {
    fn load(
        &self,
        category_id: &str,
        class_codes: &BTreeSet<String>,
        cap: Option<usize>,
    ) -> Result<RecordSet> {
        let records = self.categories.get(category_id).ok_or_else(|| {
            PrepError::data_unavailable(category_id, "category not registered with loader")
        })?;
        Ok(select_records(records, class_codes, cap))
    }
}

// ---------------------------------------------------------------------------
// FileRecordLoader – one file per category under a root directory
// ---------------------------------------------------------------------------

/// Extensions probed for `<root>/<category_id>.<ext>`, in order.
pub const STORE_EXTENSIONS: [&str; 4] = ["parquet", "pq", "json", "csv"];

/// Loads `<root>/<category_id>.{parquet,pq,json,csv}`.
#[derive(Debug, Clone)]
pub struct FileRecordLoader {
    root: PathBuf,
}

impl FileRecordLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the store backing `category_id`, if one exists.
    pub fn store_path(&self, category_id: &str) -> Option<PathBuf> {
        STORE_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{category_id}.{ext}")))
            .find(|p| p.is_file())
    }
}

impl RecordLoader for FileRecordLoader {
    fn load(
        &self,
        category_id: &str,
        class_codes: &BTreeSet<String>,
        cap: Option<usize>,
    ) -> Result<RecordSet> {
        let path = self.store_path(category_id).ok_or_else(|| {
            PrepError::data_unavailable(
                category_id,
                format!("no store found under {}", self.root.display()),
            )
        })?;
        log::debug!("loading category {category_id} from {}", path.display());

        let records = load_file(&path).map_err(|e| PrepError::data_unavailable(category_id, e))?;
        Ok(select_records(&records, class_codes, cap))
    }
}

// ---------------------------------------------------------------------------
// Format dispatch
// ---------------------------------------------------------------------------

/// Load every record of a store file. Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `waveform` list column plus `class_code`, `weight`, `id`
/// * `.json`    – `[{ "waveform": [...], "class_code": "DP", "weight": 1.0, "id": 7 }, ...]`
/// * `.csv`     – `waveform` column of semicolon-separated floats plus the scalar columns
pub fn load_file(path: &Path) -> anyhow::Result<RecordSet> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

fn to_waveform(samples: &[f64], row: usize) -> anyhow::Result<Waveform> {
    if samples.len() != WAVEFORM_LEN {
        bail!(
            "Row {row}: waveform has {} samples, expected {WAVEFORM_LEN}",
            samples.len()
        );
    }
    let mut waveform = [0.0f32; WAVEFORM_LEN];
    for (j, (dst, &src)) in waveform.iter_mut().zip(samples).enumerate() {
        *dst = src as f32;
        if !dst.is_finite() {
            bail!("Row {row}, waveform[{j}]: sample {src} is not a finite f32");
        }
    }
    Ok(waveform)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct JsonRecord {
    waveform: Vec<f64>,
    class_code: String,
    weight: f64,
    id: i64,
}

fn load_json(path: &Path) -> anyhow::Result<RecordSet> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let rows: Vec<JsonRecord> = serde_json::from_str(&text).context("parsing JSON records")?;

    let mut records = RecordSet::default();
    for (i, row) in rows.into_iter().enumerate() {
        records.push(RawRecord {
            waveform: to_waveform(&row.waveform, i)?,
            class_code: row.class_code,
            weight: row.weight,
            id: row.id,
        });
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with `waveform`, `class_code`, `weight`, `id`.
/// `waveform` holds semicolon-separated samples: `"0.12;0.14;0.11;..."`.
fn load_csv(path: &Path) -> anyhow::Result<RecordSet> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let waveform_idx = column("waveform")?;
    let code_idx = column("class_code")?;
    let weight_idx = column("weight")?;
    let id_idx = column("id")?;

    let mut records = RecordSet::default();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let samples = parse_semicolon_floats(field(waveform_idx), row_no)?;
        let weight = field(weight_idx)
            .parse::<f64>()
            .with_context(|| format!("Row {row_no}: invalid weight '{}'", field(weight_idx)))?;
        let id = field(id_idx)
            .parse::<i64>()
            .with_context(|| format!("Row {row_no}: invalid id '{}'", field(id_idx)))?;

        records.push(RawRecord {
            waveform: to_waveform(&samples, row_no)?,
            class_code: field(code_idx).to_string(),
            weight,
            id,
        });
    }

    Ok(records)
}

fn parse_semicolon_floats(s: &str, row: usize) -> anyhow::Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, waveform[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Expected schema:
/// - `waveform`: List<Float32|Float64> or LargeList of the same
/// - `class_code`: Utf8 or LargeUtf8
/// - `weight`: Float32 or Float64
/// - `id`: Int32 or Int64
///
/// Extra columns are ignored.
fn load_parquet(path: &Path) -> anyhow::Result<RecordSet> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = RecordSet::default();
    let mut offset = 0usize;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let column = |name: &str| {
            schema
                .index_of(name)
                .map(|i| batch.column(i))
                .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))
        };
        let waveform_col = column("waveform")?;
        let code_col = column("class_code")?;
        let weight_col = column("weight")?;
        let id_col = column("id")?;

        for row in 0..batch.num_rows() {
            let global_row = offset + row;
            let samples = extract_samples(waveform_col, row)
                .with_context(|| format!("Row {global_row}: failed to read 'waveform'"))?;
            let class_code = extract_string(code_col, row)
                .with_context(|| format!("Row {global_row}: failed to read 'class_code'"))?;
            let weight = extract_f64(weight_col, row)
                .with_context(|| format!("Row {global_row}: failed to read 'weight'"))?;
            let id = extract_i64(id_col, row)
                .with_context(|| format!("Row {global_row}: failed to read 'id'"))?;

            records.push(RawRecord {
                waveform: to_waveform(&samples, global_row)?,
                class_code,
                weight,
                id,
            });
        }
        offset += batch.num_rows();
    }

    Ok(records)
}

// -- Parquet / Arrow helpers --

/// Samples of one row of a `List` / `LargeList` waveform column.
///
/// A null row or a null sample makes the store unreadable; no gap filling.
fn extract_samples(col: &Arc<dyn Array>, row: usize) -> anyhow::Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null waveform");
    }
    let values: ArrayRef = match col.data_type() {
        DataType::List(_) => col.as_list_opt::<i32>().map(|l| l.value(row)),
        DataType::LargeList(_) => col.as_list_opt::<i64>().map(|l| l.value(row)),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    }
    .context("list column downcast failed")?;

    let samples: Vec<Option<f64>> = match values.data_type() {
        DataType::Float64 => values
            .as_primitive_opt::<Float64Type>()
            .map(|a| a.iter().collect::<Vec<_>>()),
        DataType::Float32 => values
            .as_primitive_opt::<Float32Type>()
            .map(|a| a.iter().map(|v| v.map(f64::from)).collect::<Vec<_>>()),
        other => bail!("waveform samples are {other:?}, expected Float32 or Float64"),
    }
    .context("sample array downcast failed")?;

    samples
        .into_iter()
        .enumerate()
        .map(|(j, v)| v.with_context(|| format!("waveform[{j}]: null sample")))
        .collect()
}

fn extract_string(col: &Arc<dyn Array>, row: usize) -> anyhow::Result<String> {
    if col.is_null(row) {
        bail!("null class code");
    }
    let value = match col.data_type() {
        DataType::Utf8 => col.as_string_opt::<i32>().map(|s| s.value(row)),
        DataType::LargeUtf8 => col.as_string_opt::<i64>().map(|s| s.value(row)),
        other => bail!("Expected Utf8 column, got {other:?}"),
    };
    value
        .map(str::to_string)
        .context("string column downcast failed")
}

fn extract_f64(col: &Arc<dyn Array>, row: usize) -> anyhow::Result<f64> {
    if col.is_null(row) {
        bail!("null weight");
    }
    let value = match col.data_type() {
        DataType::Float64 => col.as_primitive_opt::<Float64Type>().map(|a| a.value(row)),
        DataType::Float32 => col
            .as_primitive_opt::<Float32Type>()
            .map(|a| a.value(row) as f64),
        other => bail!("Expected Float32 or Float64 column, got {other:?}"),
    };
    value.context("float column downcast failed")
}

fn extract_i64(col: &Arc<dyn Array>, row: usize) -> anyhow::Result<i64> {
    if col.is_null(row) {
        bail!("null id");
    }
    let value = match col.data_type() {
        DataType::Int64 => col.as_primitive_opt::<Int64Type>().map(|a| a.value(row)),
        DataType::Int32 => col
            .as_primitive_opt::<Int32Type>()
            .map(|a| a.value(row) as i64),
        other => bail!("Expected Int32 or Int64 column, got {other:?}"),
    };
    value.context("integer column downcast failed")
}
