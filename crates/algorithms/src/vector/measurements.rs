//! Area measurements for vectorized masks

use geo::{Area as GeoArea, Geometry};
use hydrodem_core::{GeoTransform, CRS};

/// Metres per degree of latitude or longitude at the equator.
///
/// Geographic areas are converted with this single factor, which
/// overestimates east-west extent away from the equator.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Unsigned area of a polygonal geometry in CRS units squared.
///
/// Holes are subtracted. Non-polygonal geometries have no area.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        _ => 0.0,
    }
}

/// Area in square metres: direct for projected CRS, scaled by
/// [`METERS_PER_DEGREE`]² for geographic CRS.
pub fn area_m2(geom: &Geometry<f64>, crs: &CRS) -> f64 {
    let a = area(geom);
    if crs.is_geographic() {
        a * METERS_PER_DEGREE * METERS_PER_DEGREE
    } else {
        a
    }
}

/// Cell size in metres, converting degrees for geographic CRS
pub fn cell_size_meters(transform: &GeoTransform, crs: Option<&CRS>) -> f64 {
    let size = transform.cell_size();
    match crs {
        Some(crs) if crs.is_geographic() => size * METERS_PER_DEGREE,
        _ => size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{LineString, MultiPolygon, Polygon};

    fn square(x0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, 0.0),
                (x0 + size, 0.0),
                (x0 + size, size),
                (x0, size),
                (x0, 0.0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_area_square() {
        assert_relative_eq!(area(&Geometry::Polygon(square(0.0, 10.0))), 100.0);
    }

    #[test]
    fn test_area_with_hole() {
        let poly = Polygon::new(
            square(0.0, 10.0).exterior().clone(),
            vec![LineString::from(vec![
                (2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0), (2.0, 2.0),
            ])],
        );
        assert_relative_eq!(area(&Geometry::Polygon(poly)), 64.0);
    }

    #[test]
    fn test_area_multipolygon() {
        let mp = MultiPolygon::new(vec![square(0.0, 1.0), square(5.0, 2.0)]);
        assert_relative_eq!(area(&Geometry::MultiPolygon(mp)), 5.0);
    }

    #[test]
    fn test_area_non_polygon() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 10.0)]));
        assert_eq!(area(&line), 0.0);
    }

    #[test]
    fn test_area_m2_geographic() {
        let cell = Geometry::Polygon(square(0.0, 0.001));
        let m2 = area_m2(&cell, &CRS::wgs84());
        assert_relative_eq!(m2, 111.32 * 111.32, epsilon = 1e-6);

        let projected = area_m2(&cell, &CRS::from_epsg(32633));
        assert_relative_eq!(projected, 1e-6, epsilon = 1e-15);
    }

    #[test]
    fn test_cell_size_meters() {
        let geographic = GeoTransform::new(0.0, 0.0, 0.001, -0.001);
        assert_relative_eq!(
            cell_size_meters(&geographic, Some(&CRS::wgs84())),
            111.32,
            epsilon = 1e-9
        );

        let projected = GeoTransform::new(0.0, 0.0, 30.0, -30.0);
        assert_eq!(cell_size_meters(&projected, Some(&CRS::from_epsg(32633))), 30.0);
        assert_eq!(cell_size_meters(&projected, None), 30.0);
    }
}
