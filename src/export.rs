use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float32Array, Float32Builder, Float64Array, Int64Array, ListArray,
    ListBuilder, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::data::model::{DatasetBundle, Partition, PartitionKind, RecordSet, Waveform};
use crate::error::Result;
use crate::rescale::ScaleParams;

fn waveform_field() -> Field {
    Field::new(
        "waveform",
        DataType::List(Arc::new(Field::new("item", DataType::Float32, true))),
        false,
    )
}

fn waveform_array(waveforms: &[Waveform]) -> ListArray {
    let mut builder = ListBuilder::new(Float32Builder::new());
    for wf in waveforms {
        builder.values().append_slice(wf);
        builder.append(true);
    }
    builder.finish()
}

fn write_batch(path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<()> {
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Write raw category records in the layout [`FileRecordLoader`] reads.
///
/// [`FileRecordLoader`]: crate::data::loader::FileRecordLoader
pub fn write_records(records: &RecordSet, path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        waveform_field(),
        Field::new("class_code", DataType::Utf8, false),
        Field::new("weight", DataType::Float64, false),
        Field::new("id", DataType::Int64, false),
    ]));
    let codes: Vec<&str> = records.class_codes.iter().map(String::as_str).collect();
    write_batch(
        path,
        schema,
        vec![
            Arc::new(waveform_array(&records.waveforms)),
            Arc::new(StringArray::from(codes)),
            Arc::new(Float64Array::from(records.weights.clone())),
            Arc::new(Int64Array::from(records.ids.clone())),
        ],
    )
}

/// Write one prepared partition: waveform, one-hot label columns, weight, id.
pub fn write_partition(partition: &Partition, path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        waveform_field(),
        Field::new("signal", DataType::Float32, false),
        Field::new("background", DataType::Float32, false),
        Field::new("weight", DataType::Float64, false),
        Field::new("id", DataType::Int64, false),
        Field::new("reference", DataType::Boolean, false),
    ]));
    let signal: Float32Array = partition.labels().iter().map(|l| Some(l[0])).collect();
    let background: Float32Array = partition.labels().iter().map(|l| Some(l[1])).collect();
    write_batch(
        path,
        schema,
        vec![
            Arc::new(waveform_array(partition.waveforms())),
            Arc::new(signal),
            Arc::new(background),
            Arc::new(Float64Array::from(partition.weights().to_vec())),
            Arc::new(Int64Array::from(partition.ids().to_vec())),
            Arc::new(BooleanArray::from(partition.reference_mask().to_vec())),
        ],
    )
}

/// Write `train.parquet`, `val.parquet` and `test.parquet` into `dir`.
pub fn write_bundle(bundle: &DatasetBundle, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    PartitionKind::ALL
        .iter()
        .map(|&kind| -> Result<PathBuf> {
            let path = dir.join(format!("{kind}.parquet"));
            write_partition(bundle.partition(kind), &path)?;
            log::debug!("wrote {} rows to {}", bundle.partition(kind).len(), path.display());
            Ok(path)
        })
        .collect()
}

pub fn write_scale_params(params: &ScaleParams, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(params)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read params written by [`write_scale_params`]; incomplete params are a
/// configuration error.
pub fn read_scale_params(path: &Path) -> Result<ScaleParams> {
    let text = std::fs::read_to_string(path)?;
    let params: ScaleParams = serde_json::from_str(&text)?;
    params.validate()?;
    Ok(params)
}
