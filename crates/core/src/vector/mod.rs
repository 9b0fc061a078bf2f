//! Vector data structures
//!
//! Features wrap `geo_types` geometries with an attribute map; a collection
//! carries the CRS and the ordered attribute schema (column names).

use crate::crs::CRS;
use crate::error::{Error, Result};
use geo::BoundingRect;
use geo_types::{Coord, Geometry, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Same attributes and id, different geometry
    pub fn with_geometry(&self, geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: self.properties.clone(),
            id: self.id.clone(),
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Collection of features sharing a CRS and attribute schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<CRS>,
    /// Attribute column names in order
    pub schema: Vec<String>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crs(crs: Option<CRS>) -> Self {
        Self {
            crs,
            ..Self::default()
        }
    }

    /// Empty collection with the same CRS and schema as `self`
    pub fn empty_like(&self) -> Self {
        Self {
            features: Vec::new(),
            crs: self.crs.clone(),
            schema: self.schema.clone(),
        }
    }

    /// Append a feature; attribute names the schema does not know yet are
    /// appended to it in sorted order.
    pub fn push(&mut self, feature: Feature) {
        let mut new_keys: Vec<&String> = feature
            .properties
            .keys()
            .filter(|k| !self.schema.contains(k))
            .collect();
        new_keys.sort();
        self.schema.extend(new_keys.into_iter().cloned());
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// All present geometries, in feature order
    pub fn geometries(&self) -> impl Iterator<Item = &Geometry<f64>> {
        self.features.iter().filter_map(|f| f.geometry.as_ref())
    }

    /// Bounding box of every geometry, `None` when there is none
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::of_geometries(self.geometries())
    }

    /// Axis-aligned polygon covering the collection's extent
    pub fn extent_polygon(&self) -> Result<Polygon<f64>> {
        self.bounds()
            .map(|b| b.to_polygon())
            .ok_or_else(|| Error::EmptyInput("collection has no geometries".into()))
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Axis-aligned extent in CRS units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Validated constructor: `min_x <= max_x` and `min_y <= max_y`, all finite
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x > max_x || min_y > max_y {
            return Err(Error::InvalidParameter {
                name: "bounds",
                value: format!("{},{},{},{}", min_x, min_y, max_x, max_y),
                reason: "expected finite min_x <= max_x and min_y <= max_y".into(),
            });
        }
        Ok(Self { min_x, min_y, max_x, max_y })
    }

    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }

    /// Union of the bounding rectangles of each geometry
    pub fn of_geometries<'a>(geometries: impl IntoIterator<Item = &'a Geometry<f64>>) -> Option<Self> {
        geometries
            .into_iter()
            .filter_map(|g| g.bounding_rect())
            .map(Self::from_rect)
            .reduce(|a, b| a.union(&b))
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Whether the boxes share any point (touching edges count)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: self.min_x, y: self.min_y },
            Coord { x: self.max_x, y: self.max_y },
        )
    }

    /// Closed counter-clockwise polygon of the box
    pub fn to_polygon(&self) -> Polygon<f64> {
        self.to_rect().to_polygon()
    }
}

impl std::str::FromStr for BoundingBox {
    type Err = Error;

    /// Parse `min_x,min_y,max_x,max_y`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::InvalidParameter {
                name: "bounds",
                value: s.to_string(),
                reason: e.to_string(),
            })?;
        match parts.as_slice() {
            [min_x, min_y, max_x, max_y] => Self::new(*min_x, *min_y, *max_x, *max_y),
            _ => Err(Error::InvalidParameter {
                name: "bounds",
                value: s.to_string(),
                reason: "expected four comma-separated numbers".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point};

    #[test]
    fn test_bbox_validation() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_ok());
        assert!(BoundingBox::new(2.0, 0.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, f64::NAN, 1.0).is_err());
        assert!("0,0,1".parse::<BoundingBox>().is_err());
        assert_eq!(
            "1, 2, 3, 4".parse::<BoundingBox>().unwrap(),
            BoundingBox::new(1.0, 2.0, 3.0, 4.0).unwrap()
        );
    }

    #[test]
    fn test_collection_bounds_span_mixed_geometries() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(Geometry::Point(point!(x: 5.0, y: -1.0))));
        fc.push(Feature::new(Geometry::LineString(line_string![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 3.0),
        ])));

        let b = fc.bounds().unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, -1.0, 5.0, 3.0));

        let poly = fc.extent_polygon().unwrap();
        assert_eq!(poly.exterior().0.len(), 5);
    }

    #[test]
    fn test_schema_grows_on_push() {
        let mut fc = FeatureCollection::new();
        let mut f = Feature::empty();
        f.set_property("name", AttributeValue::String("a".into()));
        fc.push(f);
        let mut g = Feature::empty();
        g.set_property("name", AttributeValue::Null);
        g.set_property("area", AttributeValue::Float(1.0));
        fc.push(g);
        assert_eq!(fc.schema, vec!["name".to_string(), "area".to_string()]);
    }

    #[test]
    fn test_empty_extent_is_error() {
        assert!(FeatureCollection::new().extent_polygon().is_err());
    }
}
