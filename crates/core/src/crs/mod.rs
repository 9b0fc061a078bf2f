//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

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

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether the EPSG code names a geographic (lat/lon) system.
    ///
    /// Only the common 4xxx geographic range is recognised; anything else is
    /// treated as projected.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(code) if (4000..5000).contains(&code))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // WKT text comparison is exact; reformatted WKT compares unequal
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Compare two optional CRS: both undeclared counts as equivalent.
    pub fn same_option(a: Option<&CRS>, b: Option<&CRS>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => a.is_equivalent(b),
            _ => false,
        }
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
            return format!("WKT:{}", wkt.chars().take(50).collect::<String>());
        }
        "Unknown".to_string()
    }
}

/// Parses `EPSG:xxxx`, OGC URNs (`urn:ogc:def:crs:EPSG::xxxx`), the
/// `OGC:CRS84` alias, PROJ strings (`+proj=...`) and falls back to WKT.
impl FromStr for CRS {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidParameter {
                name: "crs",
                value: String::new(),
                reason: "empty CRS identifier".into(),
            });
        }

        let upper = s.to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(CRS::wgs84());
        }
        if upper.starts_with("EPSG:") || upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            let code = upper
                .rsplit(':')
                .next()
                .and_then(|c| c.parse::<u32>().ok())
                .ok_or_else(|| Error::InvalidParameter {
                    name: "crs",
                    value: s.to_string(),
                    reason: "EPSG code is not a number".into(),
                })?;
            return Ok(CRS::from_epsg(code));
        }
        if s.starts_with('+') {
            return Ok(CRS::from_proj(s));
        }
        Ok(CRS::from_wkt(s))
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
