use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

use crate::input::{EntityKey, FieldRef, IngestSpec, LoadedRows, Row};

const TIME_COLUMNS: &[&str] = &["time", "timestamp", "t", "ts", "datetime"];
const ENTITY_COLUMNS: &[&str] = &["entity", "name", "id", "vehicle", "track"];
const GEOMETRY_COLUMNS: &[&str] = &["geometry", "geom", "position", "coordinates"];
const LAT_COLUMNS: &[&str] = &["lat", "latitude"];
const LNG_COLUMNS: &[&str] = &["lng", "lon", "long", "longitude"];

/// Load rows from a CSV file
///
/// Supports flexible column layouts:
/// - time,geometry
/// - time,entity,geometry
/// - timestamp,vehicle,lat,lng
///
/// Each row becomes a JSON object of the cell text keyed by header. Time and
/// coordinate cells are parsed at ingestion, so ids like `007` survive as written.
pub fn load_csv(path: &str) -> Result<LoadedRows> {
    let file_path = Path::new(path);
    let rdr = csv::Reader::from_path(file_path)
        .with_context(|| format!("Failed to open {path}"))?;
    let loaded = read_rows(rdr)?;
    info!(path, rows = loaded.rows.len(), "loaded CSV");
    Ok(loaded)
}

fn read_rows<R: std::io::Read>(mut rdr: csv::Reader<R>) -> Result<LoadedRows> {
    let headers = rdr.headers()?.clone();
    let columns = detect_columns(&headers)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.context("Failed to read CSV row")?;

        let fields: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_string(), Value::String(cell.trim().to_string())))
            .collect();
        rows.push(Row::Object(fields));
    }

    let geometry_field = match columns.geometry {
        GeometryColumns::Single(idx) => FieldRef::from(&headers[idx]),
        GeometryColumns::LatLng { lat, lng } => FieldRef::lat_lng(&headers[lat], &headers[lng]),
    };
    let entity = match columns.entity {
        Some(idx) => EntityKey::Column(FieldRef::Name(headers[idx].to_string())),
        None => EntityKey::Default,
    };

    Ok(LoadedRows {
        rows,
        spec: IngestSpec::new(entity).fields(
            FieldRef::Name(headers[columns.time].to_string()),
            geometry_field,
        ),
    })
}

enum GeometryColumns {
    Single(usize),
    LatLng { lat: usize, lng: usize },
}

struct Columns {
    time: usize,
    entity: Option<usize>,
    geometry: GeometryColumns,
}

/// Detect column indices from CSV headers
fn detect_columns(headers: &csv::StringRecord) -> Result<Columns> {
    let time = find_column(headers, TIME_COLUMNS)
        .with_context(|| format!("Could not find a time column, expected one of {TIME_COLUMNS:?}"))?;
    let entity = find_column(headers, ENTITY_COLUMNS);

    let geometry = match find_column(headers, GEOMETRY_COLUMNS) {
        Some(idx) => GeometryColumns::Single(idx),
        None => match (find_column(headers, LAT_COLUMNS), find_column(headers, LNG_COLUMNS)) {
            (Some(lat), Some(lng)) => GeometryColumns::LatLng { lat, lng },
            _ => anyhow::bail!(
                "Could not find a geometry column ({GEOMETRY_COLUMNS:?}) or a lat/lng pair"
            ),
        },
    };

    Ok(Columns {
        time,
        entity,
        geometry,
    })
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let header_lower = header.trim().to_lowercase();
        names.iter().any(|&name| header_lower == name)
    })
}
