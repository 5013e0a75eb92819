//! Defines command-line interface options using `clap` for the climgrid application.

use clap::{Args, Parser, Subcommand, ValueEnum};
use climgrid::statistics::{GroupKey, Reduction, Statistic};
use std::path::PathBuf;

/// Reduce gridded climate data over time, clip it to a region and map it
#[derive(Parser, Debug)]
#[command(
    name = "climgrid",
    version,
    about = "Reduce, clip and map gridded climate NetCDF data"
)]
pub struct Cli {
    /// Enable debug logging (overridden by CLIMGRID_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads for reductions and rendering. Defaults to number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every panel of a YAML pipeline configuration
    Run {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List dimensions and variables of a NetCDF file
    Inspect {
        /// Path to the NetCDF file
        #[arg(short, long)]
        file: PathBuf,

        /// Describe one variable with all of its attributes
        #[arg(long)]
        describe: Option<String>,
    },

    /// Reduce one variable and map it in a single panel
    Reduce(ReduceArgs),
}

#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// NetCDF files or glob patterns, joined along time
    #[arg(short, long, required = true, num_args = 1..)]
    pub files: Vec<String>,

    /// Variable to reduce
    #[arg(long = "var")]
    pub variable: String,

    /// Statistic over time
    #[arg(long, value_enum, default_value_t = KindArg::Mean)]
    pub kind: KindArg,

    /// Grouping key, required for `--kind group`
    #[arg(long, value_enum)]
    pub group_key: Option<GroupKeyArg>,

    /// Which group to draw
    #[arg(long)]
    pub group_index: Option<usize>,

    /// Shapefile or GeoJSON to clip to and outline
    #[arg(long)]
    pub clip: Option<PathBuf>,

    /// Fail when a cell has no valid sample instead of leaving it empty
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Treat samples at or below this value as missing
    #[arg(long, allow_hyphen_values = true)]
    pub discard_below: Option<f32>,

    /// Colour range, formatted as <min>:<max>
    #[arg(long, value_parser = parse_range_arg, allow_hyphen_values = true)]
    pub range: Option<(f64, f64)>,

    /// Colormap name, e.g. viridis, jet, RdYlBu_r
    #[arg(long, default_value = "viridis")]
    pub palette: String,

    /// Output image (png, jpg, bmp, tiff)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Also write the field to this NetCDF file
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// TrueType font for titles and colorbar labels
    #[arg(long)]
    pub font: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Mean,
    Variance,
    Std,
    Sum,
    Min,
    Max,
    Group,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GroupKeyArg {
    Year,
    Month,
    DayOfYear,
}

impl ReduceArgs {
    pub fn reduction(&self) -> Result<Reduction, String> {
        Ok(match self.kind {
            KindArg::Mean => Reduction::Mean,
            KindArg::Variance => Reduction::Variance,
            KindArg::Std => Reduction::Std,
            KindArg::Sum => Reduction::Sum,
            KindArg::Min => Reduction::Min,
            KindArg::Max => Reduction::Max,
            KindArg::Group => {
                let group_key = match self.group_key {
                    Some(GroupKeyArg::Year) => GroupKey::Year,
                    Some(GroupKeyArg::Month) => GroupKey::Month,
                    Some(GroupKeyArg::DayOfYear) => GroupKey::DayOfYear,
                    None => return Err("--kind group requires --group-key".to_string()),
                };
                Reduction::Group {
                    group_key,
                    statistic: Statistic::Mean,
                }
            }
        })
    }
}

fn parse_range_arg(s: &str) -> Result<(f64, f64), String> {
    let (min, max) = s
        .split_once(':')
        .ok_or_else(|| "Invalid format: Expected '<min>:<max>'.".to_string())?;
    let min = min
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid range minimum '{min}'"))?;
    let max = max
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid range maximum '{max}'"))?;
    if min >= max {
        return Err(format!("Range minimum {min} must be below maximum {max}"));
    }
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ranges() {
        assert_eq!(parse_range_arg("-3:3"), Ok((-3.0, 3.0)));
        assert!(parse_range_arg("3:-3").is_err());
        assert!(parse_range_arg("3").is_err());
    }

    #[test]
    fn parses_reduce_command() {
        let cli = Cli::parse_from([
            "climgrid", "reduce", "-f", "rf_*.nc", "--var", "rf", "--kind", "group",
            "--group-key", "month", "--range", "0:30", "-o", "out.png",
        ]);
        let Command::Reduce(args) = cli.command else {
            panic!("expected reduce");
        };
        assert_eq!(args.files, vec!["rf_*.nc".to_string()]);
        assert_eq!(args.range, Some((0.0, 30.0)));
        assert_eq!(
            args.reduction(),
            Ok(Reduction::Group { group_key: GroupKey::Month, statistic: Statistic::Mean })
        );
    }

    #[test]
    fn group_without_key_is_rejected() {
        let cli = Cli::parse_from(["climgrid", "reduce", "-f", "a.nc", "--var", "rf", "--kind", "group", "-o", "o.png"]);
        let Command::Reduce(args) = cli.command else {
            panic!("expected reduce");
        };
        assert!(args.reduction().is_err());
    }
}
