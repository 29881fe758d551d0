//! Streams a [`TableSource`] into a CSV file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use fire_map_spatial_models::TableSource;

use crate::{ReportError, RunEnvironment};

/// Writes `header`, then the `fields` of every `source` row in source order,
/// to `path`. Null values become empty cells.
///
/// Returns the number of data rows written.
///
/// # Errors
///
/// * [`ReportError::HeaderMismatch`] / [`ReportError::UnknownField`] before
///   anything touches the filesystem.
/// * [`ReportError::OutputExists`] if `path` exists and
///   `env.overwrite_output` is off.
/// * [`ReportError::PermissionDenied`] if `path` is locked or read-only.
pub fn write_csv<H: AsRef<str>>(
    path: &Path,
    header: &[H],
    source: &dyn TableSource,
    fields: &[&str],
    env: &RunEnvironment,
) -> Result<u64, ReportError> {
    write_csv_with(path, header, source, fields, env, |p: &Path| File::create(p))
}

/// [`write_csv`] with the destination opened by `create`.
fn write_csv_with<H, W, F>(
    path: &Path,
    header: &[H],
    source: &dyn TableSource,
    fields: &[&str],
    env: &RunEnvironment,
    create: F,
) -> Result<u64, ReportError>
where
    H: AsRef<str>,
    W: Write,
    F: FnOnce(&Path) -> std::io::Result<W>,
{
    if header.len() != fields.len() {
        return Err(ReportError::HeaderMismatch {
            header: header.len(),
            fields: fields.len(),
        });
    }

    let indices = fields
        .iter()
        .map(|name| {
            source
                .field_index(name)
                .ok_or_else(|| ReportError::UnknownField((*name).to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !env.overwrite_output && path.exists() {
        return Err(ReportError::OutputExists(path.to_path_buf()));
    }

    let file = create(path).map_err(|e| ReportError::from_io(path, e))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    writer.write_record(header.iter().map(AsRef::<str>::as_ref))?;

    let mut written = 0_u64;
    for row in source.rows() {
        writer.write_record(indices.iter().map(|&i| row[i].to_string()))?;
        written += 1;
    }
    writer.flush()?;

    log::info!("Wrote {written} row(s) to {}", path.display());

    Ok(written)
}
