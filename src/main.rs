//! Entry point for the climgrid application.
//! Sets up logging, parses the command line and dispatches to the pipeline,
//! the dataset inspector or the single-panel reducer.

use clap::Parser;
use climgrid::config::{BoundarySource, PanelConfig, PipelineConfig};
use climgrid::errors::{ClimGridError, Result};
use climgrid::metadata::{describe_dataset, describe_variable};
use climgrid::netcdf_io::DimNames;
use climgrid::parallel::get_parallel_info;
use climgrid::pipeline::{run_pipeline, PipelineReport};
use climgrid::render::{FigureSpec, RenderSpec};
use climgrid::statistics::MissingPolicy;
use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;

mod cli;

use cli::{Cli, Command, ReduceArgs};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::new().filter_or("CLIMGRID_LOG", default_level))
        .format_timestamp_millis()
        .init();

    if cli.verbose {
        get_parallel_info().log_info();
    }

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("climgrid failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { config } => {
            let mut pipeline = PipelineConfig::new_from_file(&config)?;
            if cli.threads.is_some() {
                pipeline.threads = cli.threads;
            }
            let report = run_pipeline(&pipeline)?;
            log_report(&report);
        }
        Command::Inspect { file, describe } => match describe {
            Some(var) => {
                let meta = describe_variable(&file, &var)?;
                println!("\n Variable Description: {}", meta.name);
                println!(" Data type: {}", meta.data_type);
                println!(" Dimensions: [{}]", meta.dimensions.join(", "));
                println!(" Shape: {:?}", meta.shape);
                println!(" Total elements: {}", meta.total_elements());
                for (name, value) in &meta.attributes {
                    println!("   - {name}: {value}");
                }
            }
            None => describe_dataset(&file)?.print(),
        },
        Command::Reduce(args) => {
            let pipeline = single_panel(args, cli.threads)?;
            let report = run_pipeline(&pipeline)?;
            log_report(&report);
        }
    }
    Ok(())
}

fn single_panel(args: ReduceArgs, threads: Option<usize>) -> Result<PipelineConfig> {
    let reduction = args.reduction().map_err(ClimGridError::Config)?;

    let boundaries: Vec<BoundarySource> = args
        .clip
        .iter()
        .map(|path| BoundarySource {
            name: "clip".to_string(),
            path: path.clone(),
            crs: None,
            color: [0, 0, 0],
            width: 1,
        })
        .collect();
    let region = boundaries.first().map(|b| b.name.clone());

    let config = PipelineConfig {
        output_path: args.output,
        netcdf_output: args.output_netcdf,
        threads,
        figure: FigureSpec {
            font_path: args.font,
            ..FigureSpec::default()
        },
        panels: vec![PanelConfig {
            render: RenderSpec {
                value_range: args.range,
                palette: args.palette,
                title: Some(args.variable.clone()),
                ..RenderSpec::default()
            },
            input_paths: args.files,
            variable_name: args.variable,
            dims: DimNames::default(),
            field_crs: None,
            reduction,
            group_index: args.group_index,
            discard_below: args.discard_below,
            missing_policy: if args.strict {
                MissingPolicy::Strict
            } else {
                MissingPolicy::Lenient
            },
            clip_to: region.clone(),
            overlays: region.into_iter().collect(),
        }],
        boundaries,
    };
    config.check_bounds()?;
    Ok(config)
}

fn log_report(report: &PipelineReport) {
    for (index, panel) in report.panels.iter().enumerate() {
        let range = panel
            .value_range
            .map_or_else(|| "no valid data".to_string(), |(lo, hi)| format!("{lo:.3} .. {hi:.3}"));
        let group = panel.group.map(|g| format!(" [{g}]")).unwrap_or_default();
        info!(
            "Panel {}: {}{group}: {}/{} valid cells, {range}",
            index + 1,
            panel.field_name,
            panel.valid_cells,
            panel.total_cells
        );
    }
    if let Some(path) = &report.netcdf_output {
        info!("Fields written to {}", path.display());
    }
    info!("Figure written to {}", report.output_path.display());
}
