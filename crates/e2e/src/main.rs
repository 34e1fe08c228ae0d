//! Agibank blog search suite - Main Entry Point
//!
//! Exit code: 0 when every test passed, 1 on failed tests, 2 on harness errors.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use qa_common::report::write_reports;
use qa_common::{ci_from_env_value, load_toml, Runner, RunnerConfig, SpecFile, SuiteReport};
use qa_e2e::{build_cases, check_playwright_installed, Browser, WebConfig, WebStep, CI_WORKERS};

/// Browser suite for the Agibank blog search
#[derive(Parser, Debug)]
#[command(name = "blog-search-suite")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Suite config file (TOML with `[runner]` and `[web]` tables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the YAML specs
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/specs"))]
    specs: PathBuf,

    /// Only run tests whose full title matches this regex
    #[arg(short, long)]
    grep: Option<String>,

    /// Only run tests carrying this tag
    #[arg(long)]
    tag: Option<String>,

    /// Number of parallel workers
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Retries for a failing test
    #[arg(long)]
    retries: Option<u32>,

    /// Site under test
    #[arg(long)]
    base_url: Option<String>,

    /// Browser project to run (repeatable)
    #[arg(short, long, value_enum)]
    browser: Vec<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Output directory for artifacts and results.json
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for the HTML report
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Run with CI defaults (retries, workers, forbid_only)
    #[arg(long, env = "CI", num_args = 0..=1, default_missing_value = "true")]
    ci: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Contents of the `--config` file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SuiteConfig {
    runner: RunnerConfig,
    web: WebConfig,
}

impl Cli {
    /// Command-line flags win over the config file
    fn apply(&self, config: &mut SuiteConfig) {
        if let Some(grep) = &self.grep {
            config.runner.grep = Some(grep.clone());
        }
        if let Some(tag) = &self.tag {
            config.runner.tag = Some(tag.clone());
        }
        if let Some(workers) = self.workers {
            config.runner.workers = Some(workers);
        }
        if let Some(retries) = self.retries {
            config.runner.retries = Some(retries);
        }
        if let Some(output) = &self.output {
            config.runner.output_dir = output.clone();
        }
        if let Some(report_dir) = &self.report_dir {
            config.runner.report_dir = report_dir.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.web.base_url = base_url.clone();
        }
        if !self.browser.is_empty() {
            config.web.browsers = self.browser.clone();
        }
        if self.headed {
            config.web.headless = false;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    qa_common::logging::init(cli.verbose);

    let code = match run(cli).await {
        Ok(report) if report.success() => 0,
        Ok(_) => 1,
        Err(e) => {
            error!("{:#}", e);
            2
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<SuiteReport> {
    let mut config: SuiteConfig = load_toml(cli.config.as_deref())?;
    cli.apply(&mut config);

    let ci = ci_from_env_value(cli.ci.as_deref());
    let runner = Runner::new(config.runner.resolve(ci, CI_WORKERS)?);

    let specs = SpecFile::<WebStep>::load_all(&cli.specs)?;
    check_playwright_installed()?;

    let projects: Vec<&str> = config.web.browsers.iter().map(|b| b.as_str()).collect();
    info!(
        "Loaded {} spec file(s) from {} for {} on {}",
        specs.len(),
        cli.specs.display(),
        projects.join(", "),
        config.web.base_url
    );

    let report = runner.run(build_cases(specs, &config.web)).await?;
    for path in write_reports(&report, runner.config(), "Agibank blog search")? {
        info!("Report written to {}", path.display());
    }
    Ok(report)
}
