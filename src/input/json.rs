use anyhow::{Context, Result};
use tracing::info;

use crate::input::{EntityKey, FieldRef, IngestSpec, LoadedRows, Row};

/// Load rows from a JSON file holding an array of rows.
///
/// Array rows use the default layout (`[time, geometry, ...]`). Object rows use
/// the `time` key, `geometry` (or `lat` + `lng` when the first row has no
/// `geometry`), and `entity` when any row carries one.
pub fn load_json(path: &str) -> Result<LoadedRows> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let loaded = parse_rows(&text)?;
    info!(path, rows = loaded.rows.len(), "loaded JSON");
    Ok(loaded)
}

fn parse_rows(text: &str) -> Result<LoadedRows> {
    let rows: Vec<Row> = serde_json::from_str(text).context("Expected a JSON array of rows")?;

    let spec = match rows.first() {
        Some(first) if first.is_object() => {
            let entity = if rows.iter().any(|row| row.get("entity").is_some()) {
                EntityKey::Column(FieldRef::from("entity"))
            } else {
                EntityKey::Default
            };
            let geometry = if first.get("geometry").is_none() && first.get("lat").is_some() {
                FieldRef::lat_lng("lat", "lng")
            } else {
                FieldRef::from("geometry")
            };
            IngestSpec::new(entity).fields("time", geometry)
        }
        _ => IngestSpec::default(),
    };

    Ok(LoadedRows { rows, spec })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_rows() {
        let loaded = parse_rows(r#"[[0, "1,2"], [10, "3,4"]]"#).unwrap();
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.spec, IngestSpec::default());
    }

    #[test]
    fn test_object_rows() {
        let loaded = parse_rows(
            r#"[{"time": 0, "geometry": "1,2", "entity": "A"}, {"time": 1, "geometry": "1,2"}]"#,
        )
        .unwrap();
        assert_eq!(loaded.spec.entity, EntityKey::Column(FieldRef::from("entity")));
        assert_eq!(loaded.spec.time_field, FieldRef::from("time"));
    }

    #[test]
    fn test_lat_lng_rows() {
        let loaded = parse_rows(r#"[{"time": 0, "lat": 0, "lng": 0}, {"time": 10, "lat": 10, "lng": 10}]"#)
            .unwrap();
        assert_eq!(loaded.spec.entity, EntityKey::Default);
        assert_eq!(loaded.spec.geometry_field, FieldRef::lat_lng("lat", "lng"));
    }

    #[test]
    fn test_not_an_array() {
        assert!(parse_rows(r#"{"time": 0}"#).is_err());
    }
}
