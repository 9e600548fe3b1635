#![forbid(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use jtree::{Outline, OutlineGuides, Program, SelectorConfig, SelectorModel, SelectorStatus};
use jtree_harness::FixtureSource;
use tracing::info;

use crate::error::{DemoError, Result};
use crate::step::Step;

/// How long one step may take before the run is abandoned.
const STEP_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(
    name = "jtree-demo",
    about = "Walk a jurisdiction fixture through scripted expand/check steps",
    version
)]
pub struct Cli {
    /// JSON fixture: [{"id": 1, "name": "USA", "children": [...]}, ...].
    #[arg(long)]
    pub fixture: PathBuf,

    /// Selector config (.toml or .json).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Draw guides with ASCII characters.
    #[arg(long)]
    pub ascii: bool,

    /// Simulated latency of every fetch, in milliseconds.
    #[arg(long, value_name = "N")]
    pub latency_ms: Option<u64>,

    /// Steps to run in order: expand:<path>, check:<path>, clear.
    #[arg(value_name = "STEP")]
    pub steps: Vec<Step>,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    let stdout = std::io::stdout();
    run(cli, &mut stdout.lock())
}

/// Run the script, printing the outline after loading and after each step.
pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config = match &cli.config {
        Some(path) => SelectorConfig::from_file(path)?,
        None => SelectorConfig::default(),
    };
    let mut outline = Outline::from_display(&config.display);
    if cli.ascii {
        outline = outline.with_guides(OutlineGuides::Ascii);
    }

    let mut source = FixtureSource::from_file(&cli.fixture).map_err(|source| DemoError::Fixture {
        path: cli.fixture.clone(),
        source,
    })?;
    if let Some(ms) = cli.latency_ms {
        source = source.with_latency(Duration::from_millis(ms));
    }

    let mut program = Program::new(SelectorModel::new(source, config));
    program.run_until_idle(STEP_DEADLINE)?;
    writeln!(out, "{}", outline.render(&program.model().snapshot()))?;
    if let SelectorStatus::Failed(error) = program.model().status() {
        return Err(DemoError::Exit {
            code: 3,
            message: format!("cannot load jurisdictions: {error}"),
        });
    }

    for step in cli.steps {
        info!(target: "jtree.program", step = %step, "running step");
        writeln!(out, "$ {step}")?;
        program.send(step.into_msg());
        program.run_until_idle(STEP_DEADLINE)?;
        writeln!(out, "{}", outline.render(&program.model().snapshot()))?;
    }
    Ok(())
}
