//! Command-line shell: loads the run configuration, dispatches the selected
//! mode, and maps the outcome onto exit codes (0 = at least one plan found,
//! 1 = configuration or I/O failure, 2 = no scenario produced a plan).

use clap::Parser;
use mixplan::{MixResult, ScenarioResult, dispatch, init_logging, random_provider, RunConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mixplan", version, about = "Optimal reagent-mixing plans for digital microfluidic biochips")]
struct Args {
    /// Run configuration JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Targets file: a flat spec list for manual/auto/permutation modes, a
    /// batch file for file_load mode.
    #[arg(long)]
    targets: Option<PathBuf>,

    /// Output root directory for run artifacts.
    #[arg(long, default_value = "runs")]
    out: PathBuf,

    /// Seed for random scenario generation.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match execute(&args) {
        Ok(results) if results.iter().any(|r| r.objective_value.is_some()) => ExitCode::SUCCESS,
        Ok(_) => {
            eprintln!("mixplan: no scenario produced a plan");
            ExitCode::from(2)
        }
        Err(error) => {
            eprintln!("mixplan: {}", error);
            ExitCode::from(1)
        }
    }
}

fn execute(args: &Args) -> MixResult<Vec<ScenarioResult>> {
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<RunConfig>(&text)
                .map_err(|e| mixplan::mix_err!(Serde: "{}: {}", path.display(), e))?
        }
        None => RunConfig::default(),
    };

    if let Some(seed) = args.seed {
        random_provider::set_seed(seed);
    }

    dispatch(&config, args.targets.as_deref(), &args.out)
}
