//! `ArcGIS` REST feature layer reader.
//!
//! Boundaries hosted on `ArcGIS` Online or Enterprise are read from a
//! `FeatureServer` or `MapServer` layer URL. The layer's own spatial
//! reference is looked up first so features come back unprojected, then
//! the query endpoint is paged with `resultOffset` + `resultRecordCount`
//! until the server stops reporting `exceededTransferLimit`.

use fire_map_spatial_models::{PolygonLayer, SpatialReference};
use geojson::Feature;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::SourceError;
use crate::features::polygons_from_features;

/// Records requested per page. Servers cap this at their own
/// `maxRecordCount`, which is why paging keys off `exceededTransferLimit`.
const PAGE_SIZE: usize = 1000;

/// Reads the layer's native spatial reference from its `?f=json`
/// description.
///
/// # Errors
///
/// Returns [`SourceError::ArcGis`] for a service error envelope, or
/// [`SourceError::Conversion`] if no spatial reference is described.
pub fn describe_layer(client: &Client, url: &str) -> Result<SpatialReference, SourceError> {
    let layer_url = url.trim_end_matches('/');
    log::info!("Describing boundary layer {layer_url}");

    let body = get_json(client, &format!("{layer_url}?f=json"))?;

    let reference = spatial_reference_from(&body).ok_or_else(|| SourceError::Conversion {
        message: format!("No spatial reference in layer description for {layer_url}"),
    })?;
    log::info!("Boundary layer spatial reference: {reference}");

    Ok(reference)
}

/// Fetches every feature of the layer as polygons in `reference`.
///
/// # Errors
///
/// Returns [`SourceError`] if any page request fails, the service returns
/// an error envelope, or no polygon features come back.
pub fn fetch_polygons(
    client: &Client,
    url: &str,
    reference: SpatialReference,
) -> Result<PolygonLayer, SourceError> {
    let layer_url = url.trim_end_matches('/');
    let mut features: Vec<Feature> = Vec::new();
    let mut offset = 0_usize;

    loop {
        let body = get_json(client, &query_url(layer_url, reference, offset))?;
        let exceeded = exceeded_transfer_limit(&body);

        let page: geojson::FeatureCollection = serde_json::from_value(body)?;
        let page_len = page.features.len();
        if page_len == 0 {
            break;
        }
        features.extend(page.features);

        if !exceeded {
            break;
        }

        offset += page_len;
        log::info!(
            "{layer_url}: fetched {page_len} features (total so far: {}), fetching next page...",
            features.len()
        );
    }

    polygons_from_features(&features, reference, layer_url)
}

fn get_json(client: &Client, url: &str) -> Result<Value, SourceError> {
    log::debug!("GET {url}");
    let body: Value = client.get(url).send()?.error_for_status()?.json()?;
    check_error(&body)?;
    Ok(body)
}

fn query_url(layer_url: &str, reference: SpatialReference, offset: usize) -> String {
    format!(
        "{layer_url}/query\
         ?where=1%3D1\
         &outFields=*\
         &returnGeometry=true\
         &outSR={}\
         &f=geojson\
         &resultOffset={offset}\
         &resultRecordCount={PAGE_SIZE}",
        reference.wkid()
    )
}

/// `ArcGIS` reports failures with HTTP 200 and an `{"error": {...}}` body.
fn check_error(body: &Value) -> Result<(), SourceError> {
    let Some(error) = body.get("error") else {
        return Ok(());
    };

    let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
    let mut message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    if let Some(details) = error.get("details").and_then(Value::as_array) {
        let details: Vec<&str> = details.iter().filter_map(Value::as_str).collect();
        if !details.is_empty() {
            message = format!("{message} ({})", details.join("; "));
        }
    }

    Err(SourceError::ArcGis { code, message })
}

/// GeoJSON responses carry the flag under `properties`; JSON responses
/// carry it at the top level.
fn exceeded_transfer_limit(body: &Value) -> bool {
    body.get("exceededTransferLimit")
        .or_else(|| body.get("properties")?.get("exceededTransferLimit"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn spatial_reference_from(description: &Value) -> Option<SpatialReference> {
    let wkid_of = |sr: &Value| {
        sr.get("latestWkid")
            .or_else(|| sr.get("wkid"))
            .and_then(Value::as_u64)
            .and_then(|wkid| u32::try_from(wkid).ok())
    };

    description
        .get("extent")
        .and_then(|extent| extent.get("spatialReference"))
        .and_then(wkid_of)
        .or_else(|| description.get("sourceSpatialReference").and_then(wkid_of))
        .map(SpatialReference::from_wkid)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prefers_latest_wkid_from_extent() {
        let description = json!({
            "extent": {"spatialReference": {"wkid": 102_100, "latestWkid": 3857}},
            "sourceSpatialReference": {"wkid": 4326}
        });

        assert_eq!(
            spatial_reference_from(&description),
            Some(SpatialReference::WEB_MERCATOR)
        );
    }

    #[test]
    fn falls_back_to_source_spatial_reference() {
        let description = json!({
            "extent": {"xmin": 0},
            "sourceSpatialReference": {"wkid": 4326}
        });

        assert_eq!(
            spatial_reference_from(&description),
            Some(SpatialReference::WGS84)
        );
        assert_eq!(spatial_reference_from(&json!({})), None);
    }

    #[test]
    fn surfaces_error_envelope() {
        let body = json!({
            "error": {"code": 400, "message": "Invalid URL", "details": ["Invalid URL"]}
        });

        let err = check_error(&body).unwrap_err();
        assert!(matches!(
            err,
            SourceError::ArcGis { code: 400, ref message } if message == "Invalid URL (Invalid URL)"
        ));
        assert!(check_error(&json!({"features": []})).is_ok());
    }

    #[test]
    fn reads_transfer_limit_from_either_location() {
        assert!(exceeded_transfer_limit(&json!({"exceededTransferLimit": true})));
        assert!(exceeded_transfer_limit(
            &json!({"properties": {"exceededTransferLimit": true}})
        ));
        assert!(!exceeded_transfer_limit(&json!({"features": []})));
    }

    #[test]
    fn builds_paged_geojson_query() {
        let url = query_url(
            "https://services.arcgis.com/x/FeatureServer/0",
            SpatialReference::WEB_MERCATOR,
            2000,
        );

        assert!(url.starts_with("https://services.arcgis.com/x/FeatureServer/0/query?where=1%3D1"));
        assert!(url.contains("&outSR=3857&f=geojson"));
        assert!(url.ends_with("&resultOffset=2000&resultRecordCount=1000"));
    }
}
