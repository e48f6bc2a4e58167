//! Topology-preserving geometry simplification
//!
//! Visvalingam-Whyatt with the self-intersection guard from `geo`: vertices
//! are removed by effective area, but never when that would make a ring
//! cross itself or another ring of the same polygon.

use geo::{Geometry, SimplifyVwPreserve};
use hydrodem_core::{Error, Result};

/// Simplify a polygonal or linear geometry.
///
/// `tolerance` is a distance in CRS units; vertices whose effective
/// triangle is smaller than `tolerance²` are dropped. A tolerance of 0
/// returns the geometry unchanged. Geometries other than lines and polygons
/// are returned as they are.
pub fn simplify_preserve(geom: &Geometry<f64>, tolerance: f64) -> Result<Geometry<f64>> {
    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "simplify_tolerance",
            value: tolerance.to_string(),
            reason: "must be finite and non-negative".into(),
        });
    }
    if tolerance == 0.0 {
        return Ok(geom.clone());
    }

    let epsilon = tolerance * tolerance;
    let simplified = match geom {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify_vw_preserve(&epsilon)),
        Geometry::MultiLineString(mls) => {
            Geometry::MultiLineString(mls.simplify_vw_preserve(&epsilon))
        }
        Geometry::Polygon(p) => Geometry::Polygon(p.simplify_vw_preserve(&epsilon)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify_vw_preserve(&epsilon)),
        other => other.clone(),
    };

    Ok(simplified)
}
