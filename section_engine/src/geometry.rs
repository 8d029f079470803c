//! Point-in-polygon containment.
//!
//! The test is the even-odd (ray casting) rule: a ray is cast from the point in the
//! +x direction and the crossings with the ring edges are counted. An odd count means
//! the point is inside.
//!
//! Known limitations:
//! - only the outer ring (index 0) of a polygon is considered. Holes are not subtracted.
//! - a point lying exactly on an edge or a vertex may be reported inside or outside,
//!   depending on the orientation of the edge. No special case is made for it.
//! - there is no bounding box or index: each call walks the full ring.

use std::error::Error;
use std::fmt::Display;

use crate::config::{Geometry, Point, Ring};

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum GeometryDefect {
    /// A multipolygon without any polygon.
    NoPolygons,
    /// A polygon without any ring.
    NoRings,
    /// An outer ring without any point.
    EmptyRing,
    /// A coordinate that is NaN or infinite.
    NonFiniteCoordinate,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct InvalidGeometry {
    pub defect: GeometryDefect,
}

impl Error for InvalidGeometry {}

impl Display for InvalidGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid geometry: {:?}", self.defect)
    }
}

fn invalid(defect: GeometryDefect) -> InvalidGeometry {
    InvalidGeometry { defect }
}

/// Returns true if the point is inside the geometry.
///
/// For a multipolygon, the point is contained if any of its polygons contains it. The
/// scan stops at the first match, so a malformed polygon placed after a matching one
/// is not reported.
pub fn contains(geometry: &Geometry, point: &Point) -> Result<bool, InvalidGeometry> {
    match geometry {
        Geometry::Polygon(rings) => ring_contains(outer_ring(rings)?, point),
        Geometry::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return Err(invalid(GeometryDefect::NoPolygons));
            }
            for rings in polygons.iter() {
                if ring_contains(outer_ring(rings)?, point)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Checks the whole geometry, including the parts `contains` may not reach.
pub fn validate(geometry: &Geometry) -> Result<(), InvalidGeometry> {
    let polygons: Vec<&Vec<Ring>> = match geometry {
        Geometry::Polygon(rings) => vec![rings],
        Geometry::MultiPolygon(polygons) if polygons.is_empty() => {
            return Err(invalid(GeometryDefect::NoPolygons));
        }
        Geometry::MultiPolygon(polygons) => polygons.iter().collect(),
    };
    for rings in polygons {
        check_ring(outer_ring(rings)?)?;
    }
    Ok(())
}

fn outer_ring(rings: &[Ring]) -> Result<&Ring, InvalidGeometry> {
    rings.first().ok_or_else(|| invalid(GeometryDefect::NoRings))
}

fn check_ring(ring: &[Point]) -> Result<(), InvalidGeometry> {
    if ring.is_empty() {
        return Err(invalid(GeometryDefect::EmptyRing));
    }
    if ring.iter().any(|p| !p.is_finite()) {
        return Err(invalid(GeometryDefect::NonFiniteCoordinate));
    }
    Ok(())
}

fn ring_contains(ring: &[Point], point: &Point) -> Result<bool, InvalidGeometry> {
    check_ring(ring)?;

    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    // Each edge goes from the previous vertex to the current one. The first edge closes
    // the ring from the last vertex, which is a zero-length edge for a closed ring.
    let mut prev = ring[ring.len() - 1];
    for cur in ring.iter() {
        if (cur.lat > y) != (prev.lat > y) {
            let x_cross = (prev.lon - cur.lon) * (y - cur.lat) / (prev.lat - cur.lat) + cur.lon;
            if x < x_cross {
                inside = !inside;
            }
        }
        prev = *cur;
    }
    Ok(inside)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(f64, f64)]) -> Ring {
        coords.iter().map(|(x, y)| Point::new(*x, *y)).collect()
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Ring {
        ring(&[(x0, y0), (x0, y1), (x1, y1), (x1, y0), (x0, y0)])
    }

    #[test]
    fn square_polygon() {
        let g = Geometry::Polygon(vec![square(0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(contains(&g, &Point::new(5.0, 5.0)), Ok(true));
        assert_eq!(contains(&g, &Point::new(15.0, 15.0)), Ok(false));
        assert_eq!(contains(&g, &Point::new(-1.0, 5.0)), Ok(false));
    }

    #[test]
    fn multipolygon_is_any_part() {
        let g = Geometry::MultiPolygon(vec![
            vec![square(0.0, 0.0, 1.0, 1.0)],
            vec![square(5.0, 5.0, 6.0, 6.0)],
        ]);
        assert_eq!(contains(&g, &Point::new(0.5, 0.5)), Ok(true));
        assert_eq!(contains(&g, &Point::new(5.5, 5.5)), Ok(true));
        assert_eq!(contains(&g, &Point::new(3.0, 3.0)), Ok(false));
    }

    #[test]
    fn concave_ring() {
        // A "U" shape open at the top.
        let u = ring(&[
            (0.0, 0.0),
            (0.0, 3.0),
            (1.0, 3.0),
            (1.0, 1.0),
            (2.0, 1.0),
            (2.0, 3.0),
            (3.0, 3.0),
            (3.0, 0.0),
            (0.0, 0.0),
        ]);
        let g = Geometry::Polygon(vec![u]);
        assert_eq!(contains(&g, &Point::new(0.5, 2.0)), Ok(true));
        assert_eq!(contains(&g, &Point::new(2.5, 2.0)), Ok(true));
        assert_eq!(contains(&g, &Point::new(1.5, 2.0)), Ok(false));
        assert_eq!(contains(&g, &Point::new(1.5, 0.5)), Ok(true));
    }

    #[test]
    fn holes_are_ignored() {
        let g = Geometry::Polygon(vec![
            square(0.0, 0.0, 10.0, 10.0),
            square(4.0, 4.0, 6.0, 6.0),
        ]);
        // Inside the hole, still reported inside the outer ring.
        assert_eq!(contains(&g, &Point::new(5.0, 5.0)), Ok(true));
    }

    #[test]
    fn real_world_coordinates() {
        // Negative longitudes, as found in Mexico.
        let g = Geometry::Polygon(vec![square(-99.20, 19.40, -99.10, 19.50)]);
        assert_eq!(contains(&g, &Point::new(-99.15, 19.45)), Ok(true));
        assert_eq!(contains(&g, &Point::new(-99.25, 19.45)), Ok(false));
    }

    #[test]
    fn malformed_geometries() {
        let p = Point::new(0.0, 0.0);
        assert_eq!(
            contains(&Geometry::Polygon(vec![]), &p),
            Err(invalid(GeometryDefect::NoRings))
        );
        assert_eq!(
            contains(&Geometry::Polygon(vec![vec![]]), &p),
            Err(invalid(GeometryDefect::EmptyRing))
        );
        assert_eq!(
            contains(&Geometry::MultiPolygon(vec![]), &p),
            Err(invalid(GeometryDefect::NoPolygons))
        );
        let nan_ring = ring(&[(0.0, 0.0), (f64::NAN, 1.0), (1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(
            contains(&Geometry::Polygon(vec![nan_ring]), &p),
            Err(invalid(GeometryDefect::NonFiniteCoordinate))
        );
    }

    #[test]
    fn multipolygon_short_circuits_before_bad_part() {
        let g = Geometry::MultiPolygon(vec![vec![square(0.0, 0.0, 1.0, 1.0)], vec![]]);
        assert_eq!(contains(&g, &Point::new(0.5, 0.5)), Ok(true));
        assert_eq!(
            contains(&g, &Point::new(3.0, 3.0)),
            Err(invalid(GeometryDefect::NoRings))
        );
        assert_eq!(validate(&g), Err(invalid(GeometryDefect::NoRings)));
    }

    #[test]
    fn validate_accepts_holes() {
        let g = Geometry::Polygon(vec![square(0.0, 0.0, 10.0, 10.0), vec![]]);
        assert_eq!(validate(&g), Ok(()));
    }
}
