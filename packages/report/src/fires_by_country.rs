//! Fire counts, confidence, spacing and border proximity by country.

use std::path::{Path, PathBuf};

use fire_map_source::{BoundarySource, FireCsv, load_fire_points};
use fire_map_spatial::near::{IN_FID, NEAR_DIST};
use fire_map_spatial::{
    LocationQuery, POINT_COUNT, SelectionType, SpatialEngine, Statistic, StatisticField,
    distance_reference,
};
use fire_map_spatial_models::{
    LinearDistance, OBJECTID, PointLayer, PolygonLayer, TableSource,
};
use serde::Deserialize;

use crate::scratch::{self, BOUNDARY_LINES, FIRE_POINTS};
use crate::{ReportError, RunEnvironment, write_csv};

/// Header replacing `MEAN_NEAR_DIST` in the average distance report.
pub const AVG_DIST_HEADER: &str = "Average Dist. to All Other Fires (meters)";

/// Inputs of a fires-by-country run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FiresByCountryParams {
    /// Fire detection CSV: a local path or `http(s)://` URL.
    pub fire_csv: String,
    /// Longitude column of the fire CSV.
    pub longitude_field: String,
    /// Latitude column of the fire CSV.
    pub latitude_field: String,
    /// Confidence column of the fire CSV.
    pub confidence_field: String,
    /// Country boundary polygons.
    pub boundaries: BoundarySource,
    /// Boundary attribute that identifies a country.
    pub boundary_id_field: String,
    /// Directory the reports are written to. Created if missing.
    pub output_dir: PathBuf,
    /// Also write the average distance report.
    #[serde(default = "default_true")]
    pub find_avg_dist: bool,
    /// Also write the near-border report.
    #[serde(default = "default_true")]
    pub find_near_border: bool,
    /// Search radius of the near-border report.
    #[serde(default)]
    pub border_distance: LinearDistance,
}

const fn default_true() -> bool {
    true
}

/// The reports a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Fire count and maximum confidence per country.
    CountByCountry,
    /// Every fire with its mean distance to all other fires.
    AvgDistToAllFires,
    /// Fires within the border distance of a country outline.
    FiresNearBorder,
}

/// A report written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    /// Which report.
    pub kind: ReportKind,
    /// Where it was written.
    pub path: PathBuf,
    /// Number of data rows.
    pub rows: u64,
}

/// Outcome of [`run_fires_by_country`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Fire detections loaded.
    pub fire_count: usize,
    /// Fires outside every boundary, and so missing from the country
    /// counts.
    pub outside_count: usize,
    /// Reports in the order they were written.
    pub reports: Vec<WrittenReport>,
}

impl RunSummary {
    /// The report of the given kind, if it was written.
    #[must_use]
    pub fn report(&self, kind: ReportKind) -> Option<&WrittenReport> {
        self.reports.iter().find(|r| r.kind == kind)
    }
}

/// Runs the fires-by-country analysis and writes its reports.
///
/// The fire CSV is loaded as WGS84 points and projected into the boundary
/// layer's spatial reference. Fires outside every boundary are counted and
/// reported as a warning. Fires are then summarised per boundary and
/// grouped by `boundary_id_field` into
/// `MODIS_fires_countByCountry_<MMDDYYYY>.csv`. The optional average
/// distance and near-border reports follow. When the boundaries are
/// geographic, both layers are first projected into the UTM zone of the
/// fires so those distances come out in meters.
///
/// The first failure aborts the run. Reports already written are left in
/// place.
///
/// # Errors
///
/// Returns [`ReportError`] if an input cannot be loaded, a geoprocessing
/// step fails, or a report cannot be written.
pub fn run_fires_by_country(
    engine: &dyn SpatialEngine,
    params: &FiresByCountryParams,
    env: &RunEnvironment,
) -> Result<RunSummary, ReportError> {
    let stamp = env.date_stamp();
    std::fs::create_dir_all(&params.output_dir)
        .map_err(|e| ReportError::from_io(&params.output_dir, e))?;

    log::info!("Loading boundaries from {}", params.boundaries.location());
    let boundaries = params.boundaries.load()?;
    let reference = boundaries.spatial_reference();

    log::info!("Converting rows to points...");
    let fires = load_fire_points(&FireCsv {
        location: &params.fire_csv,
        longitude_field: &params.longitude_field,
        latitude_field: &params.latitude_field,
        confidence_field: &params.confidence_field,
    })?;
    let fires = engine.reproject(&fires, reference)?;
    if let Some(dir) = &env.scratch_dir {
        scratch::write_layer(dir, FIRE_POINTS, &fires)?;
    }

    let outside = engine.select_by_location(
        LocationQuery::PointsWithin {
            points: &fires,
            polygons: &boundaries,
        },
        SelectionType::Invert,
    )?;
    if !outside.is_empty() {
        log::warn!("{} point(s) fall outside of boundaries!", outside.len());
        log::warn!("These data will not be included when summing by intersection!");
    }

    log::info!("Finding boundary shapes containing points...");
    let containing = engine.select_by_location(
        LocationQuery::PolygonsContaining {
            polygons: &boundaries,
            points: &fires,
        },
        SelectionType::New,
    )?;
    let boundaries_with_fire = boundaries.subset(&containing);

    let mut summary = RunSummary {
        fire_count: fires.len(),
        outside_count: outside.len(),
        reports: Vec::new(),
    };

    summary.reports.push(count_by_country(
        engine,
        &fires,
        &boundaries_with_fire,
        params,
        &params
            .output_dir
            .join(format!("MODIS_fires_countByCountry_{stamp}.csv")),
        env,
    )?);

    if !(params.find_avg_dist || params.find_near_border) {
        return Ok(summary);
    }

    let planar = distance_reference(&fires);
    let (mut fires, boundaries_with_fire) = if planar.is_equivalent(reference) {
        (fires, boundaries_with_fire)
    } else {
        log::info!("{reference} is geographic, measuring distances in {planar}");
        (
            engine.reproject(&fires, planar)?,
            engine.reproject_polygons(&boundaries_with_fire, planar)?,
        )
    };

    if params.find_avg_dist {
        log::info!("Finding average distance to all fires...");
        summary.reports.push(avg_dist_to_fires(
            engine,
            &mut fires,
            &params
                .output_dir
                .join(format!("MODIS_fires_avgDistToAllFires_{stamp}.csv")),
            env,
        )?);
    }

    if params.find_near_border {
        log::info!("Finding fires within a distance to a border...");
        let distance = params.border_distance;
        summary.reports.push(fires_within_distance_to_border(
            engine,
            &fires,
            &boundaries_with_fire,
            distance,
            &params.output_dir.join(format!(
                "MODIS_fires_{}{}ToBorders_{stamp}.csv",
                distance.value,
                distance.unit.title()
            )),
            env,
        )?);
    }

    Ok(summary)
}

fn count_by_country(
    engine: &dyn SpatialEngine,
    fires: &PointLayer,
    boundaries_with_fire: &PolygonLayer,
    params: &FiresByCountryParams,
    path: &Path,
    env: &RunEnvironment,
) -> Result<WrittenReport, ReportError> {
    let id_field = params.boundary_id_field.as_str();
    let confidence = params.confidence_field.as_str();

    log::info!("Finding point count and maximum confidence level by boundary...");
    let max_confidence = StatisticField::new(confidence, Statistic::Max);
    let within = engine.summarize_within(
        boundaries_with_fire,
        fires,
        std::slice::from_ref(&max_confidence),
    )?;

    log::info!("Summarizing by {id_field}");
    let total_count = StatisticField::new(POINT_COUNT, Statistic::Sum);
    let max_max_confidence = StatisticField::new(max_confidence.summary_name(), Statistic::Max);
    let stats = engine.compute_statistics(
        &within,
        &[total_count.clone(), max_max_confidence.clone()],
        Some(id_field),
    )?;

    log::info!("Clean up...");
    let header = [
        title_case(id_field),
        "Count".to_string(),
        format!("Max {}", title_case(confidence)),
    ];
    let total_name = total_count.output_name();
    let max_name = max_max_confidence.output_name();

    log::info!("Creating output CSV...");
    let rows = write_csv(
        path,
        &header,
        &stats,
        &[id_field, total_name.as_str(), max_name.as_str()],
        env,
    )?;

    Ok(WrittenReport {
        kind: ReportKind::CountByCountry,
        path: path.to_path_buf(),
        rows,
    })
}

/// Writes every fire with the mean planar distance to all other fires,
/// in the layer's linear units.
///
/// The mean is joined onto `fires` only for the duration of the write.
/// With a single fire there are no pairs and the mean is empty.
///
/// # Errors
///
/// Returns [`ReportError`] if `fires` is unprojected or the report cannot
/// be written.
pub fn avg_dist_to_fires(
    engine: &dyn SpatialEngine,
    fires: &mut PointLayer,
    path: &Path,
    env: &RunEnvironment,
) -> Result<WrittenReport, ReportError> {
    log::info!("Finding distances to all fires...");
    let near = engine.generate_near_table(fires)?;

    log::info!("Averaging distances...");
    let mean_dist = StatisticField::new(NEAR_DIST, Statistic::Mean);
    let averages =
        engine.compute_statistics(&near, std::slice::from_ref(&mean_dist), Some(IN_FID))?;

    log::info!("Joining average distance...");
    let mean_name = mean_dist.output_name();
    fires
        .attributes_mut()
        .join_field(OBJECTID, &averages, IN_FID, &[&mean_name])?;

    log::info!("Creating output CSV...");
    let fields = fires.user_field_names();
    let header: Vec<&str> = fields
        .iter()
        .map(|name| {
            if *name == mean_name {
                AVG_DIST_HEADER
            } else {
                name.as_str()
            }
        })
        .collect();
    let field_refs: Vec<&str> = fields.iter().map(String::as_str).collect();
    let written = write_csv(path, &header, &*fires, &field_refs, env);

    log::info!("Clean up...");
    fires.attributes_mut().delete_field(&mean_name)?;

    Ok(WrittenReport {
        kind: ReportKind::AvgDistToAllFires,
        path: path.to_path_buf(),
        rows: written?,
    })
}

/// Writes the fires lying within `distance` (inclusive) of any outline of
/// `boundaries`.
///
/// # Errors
///
/// Returns [`ReportError`] if the layers are unprojected or in different
/// references, or the report cannot be written.
pub fn fires_within_distance_to_border(
    engine: &dyn SpatialEngine,
    fires: &PointLayer,
    boundaries: &PolygonLayer,
    distance: LinearDistance,
    path: &Path,
    env: &RunEnvironment,
) -> Result<WrittenReport, ReportError> {
    log::info!("Converting boundaries to lines...");
    let lines = engine.polygon_to_line(boundaries)?;
    if let Some(dir) = &env.scratch_dir {
        scratch::write_layer(dir, BOUNDARY_LINES, &lines)?;
    }

    log::info!("Finding points within {distance} to a border...");
    let selection = engine.select_by_location(
        LocationQuery::PointsWithinDistance {
            points: fires,
            lines: &lines,
            distance,
        },
        SelectionType::New,
    )?;
    let near_border = fires.subset(&selection);

    log::info!("Creating output CSV...");
    let fields = near_border.user_field_names();
    let field_refs: Vec<&str> = fields.iter().map(String::as_str).collect();
    let rows = write_csv(path, &fields, &near_border, &field_refs, env)?;

    Ok(WrittenReport {
        kind: ReportKind::FiresNearBorder,
        path: path.to_path_buf(),
        rows,
    })
}

/// Upper-cases the first letter of every alphabetic run and lower-cases
/// the rest, so `COUNTRY` becomes `Country` and `bright_t31` becomes
/// `Bright_T31`.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut titled = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if in_word {
            titled.extend(c.to_lowercase());
        } else {
            titled.extend(c.to_uppercase());
        }
        in_word = c.is_alphabetic();
    }
    titled
}
