//! Coordinate Reference System handling

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EPSG codes of the geographic (longitude/latitude) systems DEM providers ship.
const GEOGRAPHIC_EPSG: [u32; 6] = [4326, 4269, 4258, 4283, 4617, 4674];

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Whether coordinates are longitude/latitude degrees.
    ///
    /// Areas computed in a geographic CRS are in square degrees and need a
    /// degree-to-metre conversion; projected CRS areas are used directly.
    pub fn is_geographic(&self) -> bool {
        if let Some(code) = self.epsg {
            return GEOGRAPHIC_EPSG.contains(&code);
        }
        if let Some(wkt) = &self.wkt {
            let head = wkt.trim_start().to_ascii_uppercase();
            return head.starts_with("GEOGCS") || head.starts_with("GEOGCRS");
        }
        if let Some(proj) = &self.proj {
            return proj.contains("+proj=longlat") || proj.contains("+proj=latlong");
        }
        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Parse `EPSG:<code>`, a PROJ string or WKT
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidCrs("empty CRS string".into()));
        }

        if let Some(code) = s
            .strip_prefix("EPSG:")
            .or_else(|| s.strip_prefix("epsg:"))
        {
            return code
                .trim()
                .parse::<u32>()
                .map(CRS::from_epsg)
                .map_err(|_| Error::InvalidCrs(s.to_string()));
        }

        if s.starts_with("+proj=") {
            return Ok(CRS::from_proj(s));
        }

        let upper = s.to_ascii_uppercase();
        if ["GEOGCS", "GEOGCRS", "PROJCS", "PROJCRS", "GEODCRS"]
            .iter()
            .any(|k| upper.starts_with(k))
        {
            return Ok(CRS::from_wkt(s));
        }

        Err(Error::InvalidCrs(s.to_string()))
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_projected_is_not_geographic() {
        assert!(!CRS::from_epsg(32646).is_geographic());
        assert!(CRS::from_proj("+proj=longlat +datum=WGS84").is_geographic());
    }

    #[test]
    fn test_parse() {
        let crs: CRS = "EPSG:32646".parse().unwrap();
        assert_eq!(crs.epsg(), Some(32646));
        assert!("EPSG:abc".parse::<CRS>().is_err());
        assert!("".parse::<CRS>().is_err());
        assert!("GEOGCS[\"WGS 84\"]".parse::<CRS>().unwrap().is_geographic());
    }
}
