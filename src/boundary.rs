//! Region boundaries loaded from ESRI shapefiles or GeoJSON
//!
//! A [`BoundaryPolygon`] is a set of polygons in one [`Crs`]. Each polygon is
//! a list of closed rings tested with the even-odd rule, so holes and
//! multi-part shapefile records need no special casing.

use crate::errors::{ClimGridError, Result};
use crate::grid::Crs;
use log::{debug, info, warn};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// One polygon: outer ring(s) and holes, vertices as `(x, y)` = `(lon, lat)`
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub rings: Vec<Vec<(f64, f64)>>,
}

impl Polygon {
    #[must_use]
    pub fn new(rings: Vec<Vec<(f64, f64)>>) -> Self {
        Self { rings }
    }

    /// Axis-aligned rectangle, convenient for tests and extent clips
    #[must_use]
    pub fn rectangle(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self::new(vec![vec![
            (x_min, y_min),
            (x_max, y_min),
            (x_max, y_max),
            (x_min, y_max),
            (x_min, y_min),
        ]])
    }

    /// Even-odd point-in-polygon test across all rings
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.rings
            .iter()
            .fold(false, |inside, ring| inside ^ ring_contains(ring, x, y))
    }
}

fn ring_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let Some(&last) = ring.last() else {
        return false;
    };
    let mut inside = false;
    let mut prev = last;
    for &(xi, yi) in ring {
        let (xj, yj) = prev;
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        prev = (xi, yi);
    }
    inside
}

/// Polygon set used as a masking predicate and as a map overlay
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    pub polygons: Vec<Polygon>,
    pub crs: Crs,
    bbox: [f64; 4],
}

impl BoundaryPolygon {
    #[must_use]
    pub fn new(polygons: Vec<Polygon>, crs: Crs) -> Self {
        let bbox = polygons
            .iter()
            .flat_map(|p| p.rings.iter().flatten())
            .fold(
                [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
                |[x0, y0, x1, y1], &(x, y)| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
            );
        Self { polygons, crs, bbox }
    }

    /// Load a `.shp` or `.geojson`/`.json` file.
    ///
    /// `crs_override` replaces whatever reference system the file declares.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGridError::Load`] for unknown extensions or files
    /// without polygon geometry, and the underlying reader error otherwise.
    pub fn load(path: &Path, crs_override: Option<&Crs>) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let mut boundary = match extension.as_str() {
            "shp" => Self::from_shapefile(path)?,
            "geojson" | "json" => Self::from_geojson_str(&fs::read_to_string(path)?)?,
            other => {
                return Err(ClimGridError::load(format!(
                    "unsupported boundary format '{other}' for '{}'",
                    path.display()
                )))
            }
        };

        if boundary.polygons.is_empty() {
            return Err(ClimGridError::load(format!(
                "boundary file '{}' contains no polygons",
                path.display()
            )));
        }
        if let Some(crs) = crs_override {
            boundary.crs = crs.clone();
        }

        info!(
            "Loaded {} polygon(s) from {} ({})",
            boundary.polygons.len(),
            path.display(),
            boundary.crs
        );
        Ok(boundary)
    }

    /// Read polygon records from a shapefile; the CRS comes from the `.prj` sidecar.
    ///
    /// # Errors
    ///
    /// Returns the shapefile reader error if the file is not a polygon shapefile.
    pub fn from_shapefile(path: &Path) -> Result<Self> {
        let shapes = shapefile::read_shapes_as::<_, shapefile::Polygon>(path)?;
        let polygons = shapes
            .iter()
            .map(|shape| {
                Polygon::new(
                    shape
                        .rings()
                        .iter()
                        .map(|ring| ring.points().iter().map(|p| (p.x, p.y)).collect())
                        .collect(),
                )
            })
            .collect();

        let prj = path.with_extension("prj");
        let crs = if prj.exists() {
            Crs::from_wkt(&fs::read_to_string(&prj)?)
        } else {
            warn!("No .prj next to {}, CRS is undefined", path.display());
            Crs::Named("undefined".to_string())
        };

        Ok(Self::new(polygons, crs))
    }

    /// Parse a GeoJSON geometry, Feature or FeatureCollection.
    ///
    /// Without a legacy `crs` member the data is CRS84, as RFC 7946 requires.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or coordinates.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        let crs = root
            .pointer("/crs/properties/name")
            .and_then(Value::as_str)
            .map_or(Crs::WGS84, Crs::parse);

        let mut polygons = Vec::new();
        collect_geojson(&root, &mut polygons)?;
        debug!("GeoJSON yielded {} polygon(s)", polygons.len());
        Ok(Self::new(polygons, crs))
    }

    /// `[x_min, y_min, x_max, y_max]` over all vertices
    #[must_use]
    pub const fn bbox(&self) -> [f64; 4] {
        self.bbox
    }

    /// Whether `(x, y)` falls inside any polygon
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let [x0, y0, x1, y1] = self.bbox;
        if x < x0 || x > x1 || y < y0 || y > y1 {
            return false;
        }
        self.polygons.iter().any(|p| p.contains(x, y))
    }

    /// Map every vertex through `transform` and relabel as `target`.
    #[must_use]
    pub fn reproject(&self, target: Crs, transform: impl Fn(f64, f64) -> (f64, f64)) -> Self {
        let polygons = self
            .polygons
            .iter()
            .map(|p| {
                Polygon::new(
                    p.rings
                        .iter()
                        .map(|ring| ring.iter().map(|&(x, y)| transform(x, y)).collect())
                        .collect(),
                )
            })
            .collect();
        Self::new(polygons, target)
    }

    /// Every ring of every polygon, for outline drawing
    pub fn rings(&self) -> impl Iterator<Item = &[(f64, f64)]> {
        self.polygons.iter().flat_map(|p| p.rings.iter().map(Vec::as_slice))
    }
}

fn collect_geojson(node: &Value, out: &mut Vec<Polygon>) -> Result<()> {
    match node.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            for feature in node.get("features").and_then(Value::as_array).into_iter().flatten() {
                collect_geojson(feature, out)?;
            }
        }
        Some("Feature") => {
            if let Some(geometry) = node.get("geometry").filter(|g| !g.is_null()) {
                collect_geojson(geometry, out)?;
            }
        }
        Some("GeometryCollection") => {
            for geometry in node.get("geometries").and_then(Value::as_array).into_iter().flatten() {
                collect_geojson(geometry, out)?;
            }
        }
        Some("Polygon") => out.push(parse_polygon(coordinates(node)?)?),
        Some("MultiPolygon") => {
            for polygon in as_array(coordinates(node)?)? {
                out.push(parse_polygon(polygon)?);
            }
        }
        Some(other) => debug!("Ignoring GeoJSON geometry of type {other}"),
        None => return Err(ClimGridError::load("GeoJSON object without a type")),
    }
    Ok(())
}

fn coordinates(node: &Value) -> Result<&Value> {
    node.get("coordinates")
        .ok_or_else(|| ClimGridError::load("GeoJSON geometry without coordinates"))
}

fn as_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| ClimGridError::load("GeoJSON coordinates must be arrays"))
}

fn parse_polygon(value: &Value) -> Result<Polygon> {
    let rings = as_array(value)?
        .iter()
        .map(|ring| {
            as_array(ring)?
                .iter()
                .map(|position| {
                    let pair = as_array(position)?;
                    match (pair.first().and_then(Value::as_f64), pair.get(1).and_then(Value::as_f64)) {
                        (Some(x), Some(y)) => Ok((x, y)),
                        _ => Err(ClimGridError::load("GeoJSON position needs two numbers")),
                    }
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(rings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holes_are_outside() {
        let polygon = Polygon::new(vec![
            vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)],
            vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)],
        ]);
        assert!(polygon.contains(1.0, 1.0));
        assert!(!polygon.contains(5.0, 5.0));
        assert!(!polygon.contains(11.0, 5.0));
    }

    #[test]
    fn parses_feature_collection_with_multipolygon() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "a"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
                {"type": "Feature", "properties": {"name": "b"},
                 "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[5,5],[6,5],[6,6],[5,6],[5,5]]],
                    [[[8,8],[9,8],[9,9],[8,9],[8,8]]]
                 ]}}
            ]
        }"#;
        let boundary = BoundaryPolygon::from_geojson_str(text).unwrap();
        assert_eq!(boundary.polygons.len(), 3);
        assert_eq!(boundary.crs, Crs::WGS84);
        assert_eq!(boundary.bbox(), [0.0, 0.0, 9.0, 9.0]);
        assert!(boundary.contains(8.5, 8.5));
        assert!(!boundary.contains(3.0, 3.0));
    }

    #[test]
    fn reads_legacy_crs_member() {
        let text = r#"{"type": "Polygon",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32644"}},
            "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}"#;
        let boundary = BoundaryPolygon::from_geojson_str(text).unwrap();
        assert_eq!(boundary.crs, Crs::Epsg(32644));
    }
}
