use geojson::GeoJson;
use serde_json::{Map, Value};

use crate::core::{Geometry, LatLng};
use crate::error::GeometryParseError;

/// Turns a raw geometry field into a [`Geometry`]
pub trait GeometryParser {
    fn parse_geometry(&self, raw: &Value) -> Result<Geometry, GeometryParseError>;
}

/// Parser for the common text and JSON encodings of points and paths.
///
/// Coordinates are in longitude, latitude order everywhere except `{lat, lng}` objects:
/// - `"lng,lat"` or `"lng lat"` strings
/// - `{"lat": .., "lng": ..}` (or `lon`) objects
/// - `[lng, lat]` points and `[[lng, lat], ...]` paths
/// - GeoJSON `Point`, `LineString`, `Polygon` (outer ring) and `Feature`
/// - KML fragments with a `<coordinates>` element inside `Point`, `LineString` or `Polygon`
#[derive(Debug, Default, Clone, Copy)]
pub struct TextGeometryParser;

impl GeometryParser for TextGeometryParser {
    fn parse_geometry(&self, raw: &Value) -> Result<Geometry, GeometryParseError> {
        let parsed = match raw {
            Value::String(txt) => parse_text(txt),
            Value::Array(items) => parse_coordinates(items),
            Value::Object(map) => parse_object(map),
            _ => None,
        };
        parsed.ok_or_else(|| GeometryParseError::new(raw))
    }
}

fn parse_text(txt: &str) -> Option<Geometry> {
    let txt = txt.trim();
    if txt.starts_with('<') {
        return parse_kml(txt);
    }
    if txt.starts_with('{') || txt.starts_with('[') {
        return match serde_json::from_str::<Value>(txt).ok()? {
            Value::Array(items) => parse_coordinates(&items),
            Value::Object(map) => parse_object(&map),
            _ => None,
        };
    }

    let parts: Vec<&str> = if txt.contains(',') {
        txt.split(',').map(str::trim).collect()
    } else {
        txt.split_whitespace().collect()
    };
    if parts.len() != 2 {
        return None;
    }
    lng_lat(parts[0], parts[1]).map(Geometry::Point)
}

fn lng_lat(lng: &str, lat: &str) -> Option<LatLng> {
    checked(lat.parse().ok()?, lng.parse().ok()?)
}

fn checked(lat: f64, lng: f64) -> Option<LatLng> {
    let pt = LatLng::new(lat, lng);
    pt.is_valid().then_some(pt)
}

/// A `[lng, lat, (alt)]` position
fn position(items: &[Value]) -> Option<LatLng> {
    if !(2..=3).contains(&items.len()) {
        return None;
    }
    checked(items[1].as_f64()?, items[0].as_f64()?)
}

fn path(items: &[Value]) -> Option<Geometry> {
    let pts = items
        .iter()
        .map(|item| position(item.as_array()?))
        .collect::<Option<Vec<_>>>()?;
    (!pts.is_empty()).then_some(Geometry::Path(pts))
}

fn parse_coordinates(items: &[Value]) -> Option<Geometry> {
    if items.first()?.is_array() {
        path(items)
    } else {
        position(items).map(Geometry::Point)
    }
}

fn parse_object(map: &Map<String, Value>) -> Option<Geometry> {
    if map.contains_key("type") {
        let geometry = match GeoJson::from_json_object(map.clone()).ok()? {
            GeoJson::Geometry(geometry) => geometry,
            GeoJson::Feature(feature) => feature.geometry?,
            GeoJson::FeatureCollection(_) => return None,
        };
        return from_geojson(&geometry.value);
    }

    let lat = map.get("lat")?.as_f64()?;
    let lng = map.get("lng").or_else(|| map.get("lon"))?.as_f64()?;
    checked(lat, lng).map(Geometry::Point)
}

fn from_geojson(value: &geojson::Value) -> Option<Geometry> {
    match value {
        geojson::Value::Point(pos) => geojson_position(pos).map(Geometry::Point),
        geojson::Value::LineString(line) => geojson_path(line),
        // Outer ring only
        geojson::Value::Polygon(rings) => geojson_path(rings.first()?),
        _ => None,
    }
}

fn geojson_position(pos: &[f64]) -> Option<LatLng> {
    match pos {
        [lng, lat] | [lng, lat, _] => checked(*lat, *lng),
        _ => None,
    }
}

fn geojson_path(line: &[Vec<f64>]) -> Option<Geometry> {
    let pts = line
        .iter()
        .map(|pos| geojson_position(pos))
        .collect::<Option<Vec<_>>>()?;
    (!pts.is_empty()).then_some(Geometry::Path(pts))
}

fn parse_kml(txt: &str) -> Option<Geometry> {
    // ASCII lowercasing keeps byte offsets, so indices carry over to `txt`
    let lower = txt.to_ascii_lowercase();
    let open = "<coordinates>";
    let start = lower.find(open)? + open.len();
    let end = start + lower[start..].find("</coordinates>")?;

    let pts = txt[start..end]
        .split_whitespace()
        .map(|tuple| {
            let parts: Vec<&str> = tuple.split(',').collect();
            if !(2..=3).contains(&parts.len()) {
                return None;
            }
            lng_lat(parts[0], parts[1])
        })
        .collect::<Option<Vec<_>>>()?;

    if lower.contains("<point") {
        pts.first().copied().map(Geometry::Point)
    } else if (lower.contains("<linestring") || lower.contains("<polygon")) && !pts.is_empty() {
        Some(Geometry::Path(pts))
    } else {
        None
    }
}
