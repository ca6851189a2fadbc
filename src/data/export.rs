use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float32Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::model::PixelTable;

/// Write the pixel table as Parquet: one `Float32` column per band
/// (`band1 .. bandN`) followed by a `UInt32` `class` column.
pub fn export_parquet(table: &PixelTable, path: &Path) -> Result<()> {
    let names = table.column_names();
    let (band_names, class_name) = names.split_at(table.bands());

    let mut fields: Vec<Field> = band_names
        .iter()
        .map(|name| Field::new(name, DataType::Float32, false))
        .collect();
    fields.push(Field::new(&class_name[0], DataType::UInt32, false));
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = table
        .features
        .columns()
        .into_iter()
        .map(|col| Arc::new(Float32Array::from(col.to_vec())) as ArrayRef)
        .collect();
    columns.push(Arc::new(UInt32Array::from(table.labels.clone())));

    let batch = RecordBatch::try_new(schema.clone(), columns)
        .context("building pixel table record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing pixel table")?;
    writer.close().context("closing parquet writer")?;

    log::info!(
        "Exported {} pixels x {} columns to {}",
        table.len(),
        names.len(),
        path.display()
    );
    Ok(())
}
