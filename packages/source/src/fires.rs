//! Fire detection CSV loader.
//!
//! Each row of the CSV is one detection. The longitude and latitude columns
//! become a WGS84 point, and every column (coordinates included) is kept as
//! an attribute with an inferred type.

use fire_map_spatial_models::{
    AttributeTable, Field, FieldValue, OBJECTID, PointLayer, SpatialReference, infer_field_type,
};
use geo::Point;

use crate::{SourceError, build_client, is_url};

/// Location and column names of a fire detection CSV.
#[derive(Debug, Clone, Copy)]
pub struct FireCsv<'a> {
    /// Local path or `http(s)://` URL.
    pub location: &'a str,
    /// Longitude column, in decimal degrees.
    pub longitude_field: &'a str,
    /// Latitude column, in decimal degrees.
    pub latitude_field: &'a str,
    /// Detection confidence column.
    pub confidence_field: &'a str,
}

/// Loads the CSV at `input.location` as a WGS84 point layer.
///
/// # Errors
///
/// Returns [`SourceError`] if the CSV cannot be fetched or parsed, or lacks
/// one of the named columns.
pub fn load_fire_points(input: &FireCsv<'_>) -> Result<PointLayer, SourceError> {
    let data = if is_url(input.location) {
        log::info!("Downloading fire CSV from {}", input.location);
        let bytes = build_client()?
            .get(input.location)
            .send()?
            .error_for_status()?
            .bytes()?;
        log::debug!("Downloaded {} bytes from {}", bytes.len(), input.location);
        bytes.to_vec()
    } else {
        log::info!("Reading fire CSV from {}", input.location);
        std::fs::read(input.location)?
    };

    parse_fire_points(&data, input)
}

/// Parses fire CSV bytes into a WGS84 point layer.
///
/// Rows whose coordinates do not parse as finite numbers are skipped with a
/// warning.
///
/// # Errors
///
/// Returns [`SourceError::MissingField`] if a named column is absent, or
/// [`SourceError::Csv`] for malformed CSV.
pub fn parse_fire_points(data: &[u8], input: &FireCsv<'_>) -> Result<PointLayer, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SourceError::MissingField {
                field: name.to_string(),
                location: input.location.to_string(),
            })
    };
    let lon_idx = column(input.longitude_field)?;
    let lat_idx = column(input.latitude_field)?;
    column(input.confidence_field)?;

    let kept_columns: Vec<usize> = (0..headers.len())
        .filter(|&i| {
            if headers[i] == OBJECTID {
                log::warn!("Ignoring {OBJECTID} column in {}", input.location);
                false
            } else {
                true
            }
        })
        .collect();

    let mut points = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut skipped = 0_usize;

    for result in reader.records() {
        let record = result?;
        let cell = |i: usize| record.get(i).unwrap_or("").trim();

        match (parse_coordinate(cell(lon_idx)), parse_coordinate(cell(lat_idx))) {
            (Some(lon), Some(lat)) => {
                points.push(Point::new(lon, lat));
                rows.push(kept_columns.iter().map(|&i| cell(i).to_owned()).collect());
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {skipped} row(s) with unparseable coordinates in {}",
            input.location
        );
    }

    let field_types: Vec<_> = (0..kept_columns.len())
        .map(|col| infer_field_type(rows.iter().map(|row| row[col].as_str())))
        .collect();

    let mut table = AttributeTable::new(
        kept_columns
            .iter()
            .zip(&field_types)
            .map(|(&i, field_type)| Field::new(headers[i].clone(), *field_type))
            .collect(),
    )?;
    for row in &rows {
        table.push_row(
            row.iter()
                .zip(&field_types)
                .map(|(raw, field_type)| FieldValue::parse(raw, *field_type))
                .collect(),
        )?;
    }

    log::info!("Parsed {} fire detections from {}", points.len(), input.location);

    Ok(PointLayer::new(SpatialReference::WGS84, points, &table)?)
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
