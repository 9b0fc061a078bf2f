//! Clipping operations
//!
//! Clip a feature collection by the dissolved polygons of a boundary
//! collection. Points are filtered, lines are cut with
//! [`BooleanOps::clip`] and polygons are intersected; each resulting part
//! becomes its own feature carrying the source attributes.

use geo::{Area, BooleanOps, EuclideanLength, Intersects};
use geo_types::{Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};
use geolab_core::vector::{Feature, FeatureCollection};
use geolab_core::{Error, Result, CRS};
use tracing::debug;

/// Clip `subject` to the area covered by `boundary`.
///
/// Output schema and CRS are the subject's. Features that miss the boundary
/// are dropped, and clipping the result again returns the same features.
///
/// # Errors
/// - `CrsMismatch` when only one side declares a CRS, or both declare different ones
/// - `InvalidGeometry` when the boundary has no polygonal area
/// - `EmptyIntersection` when no subject feature touches the boundary
pub fn clip(subject: &FeatureCollection, boundary: &FeatureCollection) -> Result<FeatureCollection> {
    if !CRS::same_option(subject.crs.as_ref(), boundary.crs.as_ref()) {
        return Err(Error::CrsMismatch(
            crs_label(subject.crs.as_ref()),
            crs_label(boundary.crs.as_ref()),
        ));
    }

    let area = dissolve(boundary)?;

    let mut out = subject.empty_like();
    for feature in subject.iter() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        for part in clip_geometry(geometry, &area) {
            out.push(feature.with_geometry(part));
        }
    }

    debug!(
        subject = subject.len(),
        boundary = boundary.len(),
        clipped = out.len(),
        "clipped features"
    );

    if out.is_empty() {
        return Err(Error::EmptyIntersection(
            "shape and crop extent do not overlap".into(),
        ));
    }
    Ok(out)
}

fn crs_label(crs: Option<&CRS>) -> String {
    crs.map(CRS::identifier).unwrap_or_else(|| "undefined".into())
}

/// Union of every polygonal geometry in the collection
fn dissolve(boundary: &FeatureCollection) -> Result<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    for geometry in boundary.geometries() {
        collect_polygons(geometry, &mut polygons);
    }
    if polygons.is_empty() {
        return Err(Error::InvalidGeometry(
            "boundary contains no polygons".into(),
        ));
    }

    Ok(polygons
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, p| {
            acc.union(&MultiPolygon::new(vec![p]))
        }))
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

/// Parts of `geometry` inside `area`, one entry per output feature
fn clip_geometry(geometry: &Geometry<f64>, area: &MultiPolygon<f64>) -> Vec<Geometry<f64>> {
    match geometry {
        Geometry::Point(p) => {
            if area.intersects(p) {
                vec![Geometry::Point(*p)]
            } else {
                Vec::new()
            }
        }
        Geometry::MultiPoint(mp) => {
            let inside: Vec<_> = mp.iter().filter(|p| area.intersects(*p)).copied().collect();
            if inside.is_empty() {
                Vec::new()
            } else {
                vec![Geometry::MultiPoint(MultiPoint::new(inside))]
            }
        }
        Geometry::Line(l) => clip_lines(MultiLineString::new(vec![LineString::new(vec![l.start, l.end])]), area),
        Geometry::LineString(ls) => clip_lines(MultiLineString::new(vec![ls.clone()]), area),
        Geometry::MultiLineString(mls) => clip_lines(mls.clone(), area),
        Geometry::Polygon(p) => clip_polygons(MultiPolygon::new(vec![p.clone()]), area),
        Geometry::MultiPolygon(mp) => clip_polygons(mp.clone(), area),
        Geometry::Rect(r) => clip_polygons(MultiPolygon::new(vec![r.to_polygon()]), area),
        Geometry::Triangle(t) => clip_polygons(MultiPolygon::new(vec![t.to_polygon()]), area),
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(|g| clip_geometry(g, area)).collect(),
    }
}

fn clip_lines(lines: MultiLineString<f64>, area: &MultiPolygon<f64>) -> Vec<Geometry<f64>> {
    area.clip(&lines, false)
        .into_iter()
        .filter(|part| part.0.len() >= 2 && part.euclidean_length() > 0.0)
        .map(Geometry::LineString)
        .collect()
}

fn clip_polygons(polygons: MultiPolygon<f64>, area: &MultiPolygon<f64>) -> Vec<Geometry<f64>> {
    polygons
        .intersection(area)
        .into_iter()
        .filter(|part| part.unsigned_area() > 0.0)
        .map(Geometry::Polygon)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::{line_string, point, polygon};
    use geolab_core::vector::AttributeValue;

    fn collection(geometries: Vec<Geometry<f64>>, epsg: Option<u32>) -> FeatureCollection {
        let mut fc = FeatureCollection::with_crs(epsg.map(CRS::from_epsg));
        for (i, g) in geometries.into_iter().enumerate() {
            let mut f = Feature::new(g);
            f.set_property("name", AttributeValue::String(format!("f{}", i)));
            f.set_property("value", AttributeValue::Int(i as i64));
            fc.push(f);
        }
        fc
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ])
    }

    fn boundary() -> FeatureCollection {
        collection(vec![square(0.0, 0.0, 10.0, 10.0)], Some(32613))
    }

    #[test]
    fn test_point_outside_is_dropped() {
        let subject = collection(
            vec![
                Geometry::Point(point!(x: 5.0, y: 5.0)),
                Geometry::Point(point!(x: 20.0, y: 5.0)),
                Geometry::Point(point!(x: 10.0, y: 3.0)),
            ],
            Some(32613),
        );
        let out = clip(&subject, &boundary()).unwrap();

        assert_eq!(out.len(), 2);
        let names: Vec<_> = out.iter().filter_map(|f| f.get_property("name")).collect();
        assert!(!names.contains(&&AttributeValue::String("f1".into())));
    }

    #[test]
    fn test_line_is_cut_at_boundary() {
        let subject = collection(
            vec![Geometry::LineString(line_string![(x: -5.0, y: 5.0), (x: 5.0, y: 5.0)])],
            Some(32613),
        );
        let out = clip(&subject, &boundary()).unwrap();
        assert_eq!(out.len(), 1);
        match &out.features[0].geometry {
            Some(Geometry::LineString(ls)) => assert_relative_eq!(ls.euclidean_length(), 5.0, epsilon = 1e-9),
            other => panic!("expected a line, got {:?}", other),
        }
    }

    #[test]
    fn test_line_splits_into_parts() {
        // U-shaped boundary: a horizontal line crosses both arms
        let u = collection(
            vec![square(0.0, 0.0, 2.0, 10.0), square(8.0, 0.0, 10.0, 10.0)],
            Some(32613),
        );
        let subject = collection(
            vec![Geometry::LineString(line_string![(x: -1.0, y: 5.0), (x: 11.0, y: 5.0)])],
            Some(32613),
        );
        let out = clip(&subject, &u).unwrap();
        assert_eq!(out.len(), 2);
        for f in out.iter() {
            assert_eq!(f.get_property("name"), Some(&AttributeValue::String("f0".into())));
        }
    }

    #[test]
    fn test_polygon_intersection_area() {
        let subject = collection(vec![square(5.0, 5.0, 15.0, 15.0)], Some(32613));
        let out = clip(&subject, &boundary()).unwrap();
        assert_eq!(out.len(), 1);
        let area = out.features[0].geometry.as_ref().unwrap().unsigned_area();
        assert_relative_eq!(area, 25.0, epsilon = 1e-9);
        assert_eq!(out.schema, subject.schema);
        assert_eq!(out.crs, subject.crs);
    }

    #[test]
    fn test_touching_polygon_is_dropped() {
        // Shares only an edge with the boundary: zero-area intersection
        let subject = collection(
            vec![square(10.0, 0.0, 20.0, 10.0), square(2.0, 2.0, 4.0, 4.0)],
            Some(32613),
        );
        let out = clip(&subject, &boundary()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.features[0].get_property("value"), Some(&AttributeValue::Int(1)));
    }

    #[test]
    fn test_clip_is_idempotent() {
        let subject = collection(
            vec![
                square(5.0, 5.0, 15.0, 15.0),
                Geometry::LineString(line_string![(x: -5.0, y: 1.0), (x: 5.0, y: 1.0)]),
                Geometry::Point(point!(x: 1.0, y: 1.0)),
            ],
            Some(32613),
        );
        let once = clip(&subject, &boundary()).unwrap();
        let twice = clip(&once, &boundary()).unwrap();

        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.properties, b.properties);
            let (ga, gb) = (a.geometry.as_ref().unwrap(), b.geometry.as_ref().unwrap());
            assert_relative_eq!(ga.unsigned_area(), gb.unsigned_area(), epsilon = 1e-9);
            if let (Geometry::LineString(la), Geometry::LineString(lb)) = (ga, gb) {
                assert_relative_eq!(la.euclidean_length(), lb.euclidean_length(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_no_overlap_is_error() {
        let subject = collection(vec![Geometry::Point(point!(x: 50.0, y: 50.0))], Some(32613));
        assert!(matches!(clip(&subject, &boundary()), Err(Error::EmptyIntersection(_))));
    }

    #[test]
    fn test_crs_mismatch() {
        let subject = collection(vec![Geometry::Point(point!(x: 5.0, y: 5.0))], Some(4326));
        assert!(matches!(clip(&subject, &boundary()), Err(Error::CrsMismatch(_, _))));

        let undeclared = collection(vec![Geometry::Point(point!(x: 5.0, y: 5.0))], None);
        assert!(matches!(clip(&undeclared, &boundary()), Err(Error::CrsMismatch(_, _))));
    }

    #[test]
    fn test_boundary_without_polygons() {
        let subject = collection(vec![Geometry::Point(point!(x: 5.0, y: 5.0))], Some(32613));
        let points = collection(vec![Geometry::Point(point!(x: 5.0, y: 5.0))], Some(32613));
        assert!(matches!(clip(&subject, &points), Err(Error::InvalidGeometry(_))));
    }
}
