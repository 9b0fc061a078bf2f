//! GeoJSON vector I/O
//!
//! The CRS comes from the legacy top-level `crs` member
//! (`{"type": "name", "properties": {"name": "EPSG:xxxx"}}`); files without it
//! are WGS 84 per RFC 7946.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use geo_types::Geometry;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read a GeoJSON file (FeatureCollection, Feature or bare Geometry)
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let fc = read_geojson_str(&text)?;
    debug!(path = %path.display(), features = fc.len(), crs = ?fc.crs, "read GeoJSON");
    Ok(fc)
}

/// Parse GeoJSON text into a [`FeatureCollection`]
pub fn read_geojson_str(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;

    let (features, foreign) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => {
            let foreign = f.foreign_members.clone();
            (vec![f], foreign)
        }
        GeoJson::Geometry(g) => (
            vec![geojson::Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            None,
        ),
    };

    let crs = match foreign.as_ref().and_then(|m| m.get("crs")) {
        Some(member) => Some(parse_crs_member(member)?),
        None => Some(CRS::wgs84()),
    };

    let mut out = FeatureCollection::with_crs(crs);
    for f in features {
        // First-seen property order defines the schema
        if let Some(props) = &f.properties {
            for key in props.keys() {
                if !out.schema.contains(key) {
                    out.schema.push(key.clone());
                }
            }
        }
        out.push(convert_feature(f)?);
    }
    Ok(out)
}

fn parse_crs_member(member: &JsonValue) -> Result<CRS> {
    member
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::GeoJson(format!("unsupported crs member: {}", member)))?
        .parse()
}

fn convert_feature(f: geojson::Feature) -> Result<Feature> {
    let geometry = f
        .geometry
        .map(Geometry::<f64>::try_from)
        .transpose()?;

    let properties = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, attribute_from_json(v)))
        .collect();

    let id = f.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });

    Ok(Feature { geometry, properties, id })
}

fn attribute_from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        // Nested values are kept as their JSON text
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

/// Write a collection as a GeoJSON FeatureCollection file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, write_geojson_string(collection)?)?;
    debug!(path = %path.display(), features = collection.len(), "wrote GeoJSON");
    Ok(())
}

/// Serialize a collection as GeoJSON text
pub fn write_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let features = collection
        .iter()
        .map(|f| {
            // Properties follow schema order, unknown keys last
            let mut props = JsonObject::new();
            for key in &collection.schema {
                if let Some(v) = f.properties.get(key) {
                    props.insert(key.clone(), attribute_to_json(v));
                }
            }
            let mut extra: Vec<_> = f
                .properties
                .iter()
                .filter(|(k, _)| !props.contains_key(*k))
                .collect();
            extra.sort_by(|a, b| a.0.cmp(b.0));
            for (k, v) in extra {
                props.insert(k.clone(), attribute_to_json(v));
            }

            geojson::Feature {
                bbox: None,
                geometry: f
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: f.id.clone().map(Id::String),
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = collection
        .crs
        .as_ref()
        .and_then(|c| c.epsg())
        .map(|code| {
            let mut members = JsonObject::new();
            members.insert(
                "crs".into(),
                serde_json::json!({
                    "type": "name",
                    "properties": { "name": format!("EPSG:{}", code) }
                }),
            );
            members
        });

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    serde_json::to_string(&fc).map_err(|e| Error::GeoJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FIELDS: &str = r#"{
      "type": "FeatureCollection",
      "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::32613" } },
      "features": [
        { "type": "Feature", "id": 7,
          "properties": { "zone": "north", "area": 12.5, "count": 3 },
          "geometry": { "type": "Polygon",
            "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]] } },
        { "type": "Feature",
          "properties": { "zone": "south", "area": null, "count": 1 },
          "geometry": { "type": "Point", "coordinates": [5, 5] } }
      ]
    }"#;

    #[test]
    fn test_reads_crs_and_schema_order() {
        let fc = read_geojson_str(FIELDS).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.crs.as_ref().and_then(|c| c.epsg()), Some(32613));
        assert_eq!(fc.schema, vec!["zone", "area", "count"]);
        assert_eq!(fc.features[0].id.as_deref(), Some("7"));
        assert_eq!(
            fc.features[0].get_property("count"),
            Some(&AttributeValue::Int(3))
        );
        assert!(matches!(fc.features[1].geometry, Some(Geometry::Point(_))));
    }

    #[test]
    fn test_default_crs_is_wgs84() {
        let fc = read_geojson_str(r#"{"type":"Point","coordinates":[1,2]}"#).unwrap();
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.crs.as_ref().and_then(|c| c.epsg()), Some(4326));
    }

    #[test]
    fn test_file_roundtrip_keeps_crs_and_attributes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fields.geojson");
        let fc = read_geojson_str(FIELDS).unwrap();

        write_geojson(&fc, &path).unwrap();
        let back = read_geojson(&path).unwrap();

        assert_eq!(back.crs, fc.crs);
        assert_eq!(back.schema, fc.schema);
        assert_eq!(back.features[0].geometry, fc.features[0].geometry);
        assert_eq!(
            back.features[1].get_property("zone"),
            Some(&AttributeValue::String("south".into()))
        );
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(read_geojson_str("{not json"), Err(Error::GeoJson(_))));
    }
}
