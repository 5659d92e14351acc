//! Projection descriptors and point transforms backed by `proj4rs`

use crate::errors::{Result, RuNeGridError};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::fmt;

pub const EPSG_WGS84: u32 = 4326;

/// PROJ.4 definition for one of the built-in EPSG codes
#[must_use]
pub fn epsg_definition(code: u32) -> Option<String> {
    let definition = match code {
        4326 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
        4269 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0 +no_defs".to_string(),
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
            .to_string(),
        5070 => "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +ellps=GRS80 +towgs84=0,0,0 +units=m +no_defs"
            .to_string(),
        32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", code - 32600),
        32701..=32760 => format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            code - 32700
        ),
        _ => return None,
    };
    Some(definition)
}

/// Value of `+proj=` in a PROJ.4 definition
fn proj_name(definition: &str) -> Option<&str> {
    definition
        .split_whitespace()
        .find_map(|token| token.strip_prefix("+proj="))
}

/// A coordinate reference system, given by EPSG code or PROJ.4 string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    definition: String,
    epsg: Option<u32>,
}

impl Projection {
    /// Parse `EPSG:NNNN` or a raw PROJ.4 definition
    pub fn parse(descriptor: &str) -> Result<Self> {
        let descriptor = descriptor.trim();
        let invalid = |reason: String| RuNeGridError::InvalidProjection {
            definition: descriptor.to_string(),
            reason,
        };

        let upper = descriptor.to_ascii_uppercase();
        let projection = if let Some(code) = upper
            .strip_prefix("EPSG:")
            .or_else(|| upper.strip_prefix("+INIT=EPSG:"))
        {
            let code: u32 = code
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .parse()
                .map_err(|_| invalid("EPSG code is not a number".to_string()))?;
            let definition =
                epsg_definition(code).ok_or_else(|| invalid(format!("EPSG:{code} is not supported")))?;
            Self {
                definition,
                epsg: Some(code),
            }
        } else if proj_name(descriptor).is_some() {
            Self {
                definition: descriptor.to_string(),
                epsg: None,
            }
        } else {
            return Err(invalid("expected EPSG:NNNN or a +proj= definition".to_string()));
        };

        projection.to_proj()?;
        Ok(projection)
    }

    /// Geographic WGS84
    #[must_use]
    pub fn wgs84() -> Self {
        Self {
            definition: epsg_definition(EPSG_WGS84).unwrap_or_default(),
            epsg: Some(EPSG_WGS84),
        }
    }

    #[must_use]
    pub fn definition(&self) -> &str {
        &self.definition
    }

    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Whether coordinates are longitude/latitude in degrees
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        matches!(
            proj_name(&self.definition),
            Some("longlat" | "latlong" | "lonlat" | "latlon")
        )
    }

    /// CF `grid_mapping_name` for the projection, when there is one
    #[must_use]
    pub fn grid_mapping_name(&self) -> Option<&'static str> {
        let name = match proj_name(&self.definition)? {
            "longlat" | "latlong" | "lonlat" | "latlon" => "latitude_longitude",
            "utm" | "tmerc" | "etmerc" => "transverse_mercator",
            "merc" => "mercator",
            "aea" => "albers_conical_equal_area",
            "lcc" => "lambert_conformal_conic",
            "laea" => "lambert_azimuthal_equal_area",
            "stere" | "sterea" => "stereographic",
            _ => return None,
        };
        Some(name)
    }

    pub(crate) fn to_proj(&self) -> Result<Proj> {
        Proj::from_proj_string(&self.definition).map_err(|e| RuNeGridError::InvalidProjection {
            definition: self.definition.clone(),
            reason: format!("{e:?}"),
        })
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg {
            Some(code) => write!(f, "EPSG:{code}"),
            None => f.write_str(&self.definition),
        }
    }
}

/// Reusable point transform between two projections
pub struct Transformer {
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
    identity: bool,
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("source_geographic", &self.source_geographic)
            .field("target_geographic", &self.target_geographic)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    pub fn new(from: &Projection, to: &Projection) -> Result<Self> {
        Ok(Self {
            source: from.to_proj()?,
            target: to.to_proj()?,
            source_geographic: from.is_geographic(),
            target_geographic: to.is_geographic(),
            identity: from.definition == to.definition,
        })
    }

    /// Transform one point; degrees in and out for geographic systems
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.identity {
            return Ok((x, y));
        }
        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.source, &self.target, &mut point)
            .map_err(|e| RuNeGridError::ReprojectionFailed(format!("transform of ({x}, {y}) failed: {e:?}")))?;
        let (out_x, out_y) = if self.target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if out_x.is_finite() && out_y.is_finite() {
            Ok((out_x, out_y))
        } else {
            Err(RuNeGridError::ReprojectionFailed(format!(
                "({x}, {y}) has no finite image"
            )))
        }
    }
}
