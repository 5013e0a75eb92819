//! Creates a sample daily rainfall dataset, a region boundary and a pipeline
//! configuration for trying out climgrid.
//!
//! Run it, then `climgrid run -c sample/pipeline.yaml`.

use ndarray::{Array1, Array3};
use netcdf::create;
use std::fs;
use std::path::Path;

const NLAT: usize = 33;
const NLON: usize = 33;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = Path::new("sample");
    fs::create_dir_all(dir)?;

    // One file per year so the pipeline has to join them along time
    for (year, start) in [(2000, 0.0), (2001, 366.0)] {
        let days = if year == 2000 { 366 } else { 365 };
        let path = dir.join(format!("rf_{year}.nc"));
        write_year(&path, start, days, year)?;
        println!("Created {}", path.display());
    }

    let region = dir.join("region.geojson");
    fs::write(
        &region,
        r#"{"type": "FeatureCollection", "features": [{"type": "Feature",
  "properties": {"name": "sample region"},
  "geometry": {"type": "Polygon", "coordinates": [[
    [76.5, 12.5], [84.5, 13.5], [85.0, 19.5], [80.0, 21.0], [76.0, 18.0], [76.5, 12.5]
  ]]}}]}"#,
    )?;
    println!("Created {}", region.display());

    let config = dir.join("pipeline.yaml");
    fs::write(
        &config,
        r#"output_path: sample/rainfall.png
netcdf_output: sample/rainfall_fields.nc
figure:
  ncols: 2
  panel_width: 420
  colorbar: panel
  lat_lines: 4
  lon_lines: 4
boundaries:
  - { name: region, path: sample/region.geojson, width: 2 }
panels:
  - input_paths: ["sample/rf_*.nc"]
    variable_name: rf
    reduction: { kind: mean }
    clip_to: region
    overlays: [region]
    render: { value_range: [0, 12], level_step: 1, palette: YlGnBu, extend: max, title: Mean, label: mm/day }
  - input_paths: ["sample/rf_*.nc"]
    variable_name: rf
    reduction: { kind: resample, frequency: monthly, statistic: sum }
    group_index: 6
    overlays: [region]
    render: { palette: jet, style: contourf, title: July 2000, label: mm }
"#,
    )?;
    println!("Created {}", config.display());

    Ok(())
}

fn write_year(path: &Path, start: f64, days: usize, year: i32) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    let mut file = create(path)?;
    file.add_attribute("title", format!("Synthetic daily rainfall {year}"))?;
    file.add_dimension("time", days)?;
    file.add_dimension("lat", NLAT)?;
    file.add_dimension("lon", NLON)?;

    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "days since 2000-01-01")?;
        time.put_attribute("calendar", "standard")?;
        let offsets: Vec<f64> = (0..days).map(|d| start + d as f64).collect();
        time.put(Array1::from(offsets).view(), ..)?;
    }
    {
        let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put(Array1::from_iter((0..NLAT).map(|i| 6.0 + i as f64)).view(), ..)?;
    }
    {
        let mut lon = file.add_variable::<f64>("lon", &["lon"])?;
        lon.put_attribute("units", "degrees_east")?;
        lon.put(Array1::from_iter((0..NLON).map(|j| 66.0 + j as f64)).view(), ..)?;
    }

    // Monsoon-shaped seasonal cycle, wetter towards the south-west coast
    let rf = Array3::from_shape_fn((days, NLAT, NLON), |(t, i, j)| {
        let season = (std::f64::consts::PI * (t as f64 - 150.0) / 120.0).cos().max(0.0);
        let coast = 1.0 - (i as f64 / NLAT as f64) * 0.5 + (j as f64 / NLON as f64) * 0.3;
        let wiggle = ((t * 7 + i * 3 + j * 5) % 11) as f64 / 10.0;
        if (i + j + t) % 97 == 0 {
            -999.0
        } else {
            (season * 14.0 * coast + wiggle) as f32
        }
    });

    let mut var = file.add_variable::<f32>("rf", &["time", "lat", "lon"])?;
    var.put_attribute("units", "mm/day")?;
    var.put_attribute("long_name", "daily rainfall")?;
    var.put_attribute("_FillValue", -999.0f32)?;
    var.put(rf.view(), ..)?;

    Ok(())
}
