//! Fixtures shared by the integration tests

#![allow(dead_code)]

use climgrid::errors::Result;
use ndarray::{Array1, Array3};
use netcdf::create;
use shapefile::{Point, Polygon, PolygonRing, ShapeWriter};
use std::fs;
use std::path::Path;

pub const LAT: [f64; 3] = [10.0, 11.0, 12.0];
pub const LON: [f64; 3] = [70.0, 71.0, 72.0];

/// Write a `(time, lat, lon)` rainfall file on the 3 x 3 test grid.
///
/// `days` are offsets in "days since 2000-01-01".
pub fn write_rainfall(path: &Path, variable: &str, days: &[f64], values: &[f32]) -> Result<()> {
    write_grid(path, variable, days, &LAT, &LON, values, None)
}

pub fn write_grid(
    path: &Path,
    variable: &str,
    days: &[f64],
    lat: &[f64],
    lon: &[f64],
    values: &[f32],
    fill_value: Option<f32>,
) -> Result<()> {
    let mut file = create(path)?;
    file.add_dimension("time", days.len())?;
    file.add_dimension("lat", lat.len())?;
    file.add_dimension("lon", lon.len())?;

    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "days since 2000-01-01 00:00:00")?;
        time.put_attribute("calendar", "standard")?;
        time.put(Array1::from(days.to_vec()).view(), ..)?;
    }
    {
        let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put(Array1::from(lat.to_vec()).view(), ..)?;
    }
    {
        let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put(Array1::from(lon.to_vec()).view(), ..)?;
    }

    let mut var = file.add_variable::<f32>(variable, &["time", "lat", "lon"])?;
    var.put_attribute("units", "mm/day")?;
    if let Some(fill) = fill_value {
        var.put_attribute("_FillValue", fill)?;
    }
    let data = Array3::from_shape_vec((days.len(), lat.len(), lon.len()), values.to_vec())?;
    var.put(data.view(), ..)?;

    Ok(())
}

/// GeoJSON rectangle in CRS84
pub fn write_rectangle_geojson(path: &Path, lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Result<()> {
    let text = format!(
        r#"{{"type": "FeatureCollection", "features": [{{"type": "Feature", "properties": {{"name": "region"}},
            "geometry": {{"type": "Polygon", "coordinates": [[[{lon_min}, {lat_min}], [{lon_max}, {lat_min}],
            [{lon_max}, {lat_max}], [{lon_min}, {lat_max}], [{lon_min}, {lat_min}]]]}}}}]}}"#
    );
    fs::write(path, text)?;
    Ok(())
}

/// ESRI WKT that ArcGIS writes for plain longitude/latitude data
pub const GCS_WGS_1984: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// Polygon shapefile holding one rectangle, with a `.prj` sidecar when `prj` is given
pub fn write_rectangle_shapefile(
    path: &Path,
    lon_min: f64,
    lat_min: f64,
    lon_max: f64,
    lat_max: f64,
    prj: Option<&str>,
) -> Result<()> {
    let ring = vec![
        Point::new(lon_min, lat_min),
        Point::new(lon_min, lat_max),
        Point::new(lon_max, lat_max),
        Point::new(lon_max, lat_min),
        Point::new(lon_min, lat_min),
    ];
    {
        let mut writer = ShapeWriter::from_path(path)?;
        writer.write_shape(&Polygon::new(PolygonRing::Outer(ring)))?;
    }
    if let Some(wkt) = prj {
        fs::write(path.with_extension("prj"), wkt)?;
    }
    Ok(())
}

/// Add a CF grid-mapping `crs` variable to an existing file
pub fn add_crs_variable(path: &Path, crs_wkt: Option<&str>, epsg_code: Option<i32>) -> Result<()> {
    let mut file = netcdf::append(path)?;
    let mut crs = file.add_variable::<i32>("crs", &[])?;
    if let Some(wkt) = crs_wkt {
        crs.put_attribute("crs_wkt", wkt)?;
    }
    if let Some(code) = epsg_code {
        crs.put_attribute("epsg_code", code)?;
    }
    Ok(())
}

/// The 3 x 3 field `[[1,2,3],[4,5,6],[7,8,9]]` repeated over `steps` time steps
pub fn repeated_field(steps: usize) -> Vec<f32> {
    let base = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
    (0..steps).flat_map(|_| base).collect()
}
