use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use openrs_cli::{ExtractRequest, ExtractSummary, PipelineConfig, init_logging, run_extract};
use openrs_io::Backend;

/// Extract the deformed mesh, nodal stresses and fiducial positions from a
/// U-bend result container.
#[derive(Parser, Debug)]
#[command(name = "openrs-extract", version)]
struct Args {
    /// Result container: .frd (with .dat companion), .json or .odb.json
    result_file: PathBuf,

    /// Output mesh, .vtk or .vtu
    output_mesh_file: PathBuf,

    /// Output fiducial file
    output_fiducial_file: PathBuf,

    /// Printed-output companion of an .frd file [default: same stem, .dat]
    #[arg(long, value_name = "PATH")]
    dat: Option<PathBuf>,

    /// Result back-end, instead of detecting it from the extension
    #[arg(long, value_name = "frd|odb")]
    backend: Option<Backend>,

    /// JSON configuration [env: OPENRS_CONFIG]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Re-read both outputs after writing them
    #[arg(long)]
    verify: bool,
}

fn print_summary(summary: &ExtractSummary) {
    println!("backend: {}", summary.provenance.backend);
    if let Some(step) = &summary.provenance.step {
        println!("step: {step}");
    }
    if let Some(increment) = summary.provenance.increment {
        println!("increment: {increment}");
    }
    println!("nodes: {}", summary.nodes);
    println!("elements: {}", summary.elements);
    if summary.empty_stress_nodes > 0 {
        println!("nodes_without_stress: {}", summary.empty_stress_nodes);
    }
    println!("fiducial_sets: {}", summary.fiducial_sets);
    for path in &summary.written {
        println!("wrote: {}", path.display());
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

    let request = ExtractRequest {
        result_file: args.result_file,
        mesh_out: args.output_mesh_file,
        fiducial_out: args.output_fiducial_file,
        dat: args.dat,
        backend: args.backend,
        verify: args.verify,
    };

    match run_extract(&request, &config) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
