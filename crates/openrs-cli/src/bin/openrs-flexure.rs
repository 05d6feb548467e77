use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use openrs_cli::{FiducialInput, PipelineConfig, init_logging, run_flexure};

/// Compute the rigid-body-corrected closure of a bent U-bend specimen and the
/// boundary condition that reproduces it.
#[derive(Parser, Debug)]
#[command(name = "openrs-flexure", version)]
struct Args {
    /// Four fiducials: left-lower, left-upper, right-upper, right-lower
    #[arg(
        long,
        num_args = 4,
        value_name = "X,Y,Z",
        value_parser = parse_point,
        allow_hyphen_values = true,
        required_unless_present = "fiducials",
        conflicts_with = "fiducials"
    )]
    points: Vec<[f64; 3]>,

    /// Fiducial file written by openrs-extract
    #[arg(long, value_name = "FILE")]
    fiducials: Option<PathBuf>,

    /// Write an SVG of the construction
    #[arg(long, value_name = "out.svg")]
    plot: Option<PathBuf>,

    /// JSON configuration [env: OPENRS_CONFIG]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn parse_point(raw: &str) -> Result<[f64; 3], String> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid coordinate in {raw:?}: {err}"))?;
    match values.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(format!("expected x,y,z, got {raw:?}")),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    let config = match PipelineConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };

    let input = match (args.fiducials, args.points.as_slice()) {
        (Some(path), _) => FiducialInput::File(path),
        (None, [a, b, c, d]) => FiducialInput::Points([*a, *b, *c, *d]),
        (None, points) => {
            eprintln!("error: expected 4 points, got {}", points.len());
            return ExitCode::from(2);
        }
    };

    match run_flexure(&input, &config, args.plot.as_deref()) {
        Ok(report) => {
            println!("closure_displacement: {:.14}", report.closure.displacement);
            println!("dti_reading: {:.8}", report.dti_reading);
            print!("{}", report.boundary.to_inp_block());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
