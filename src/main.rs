use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use deckweaver::ChartKind;
use deckweaver::cli::commands::{chart, config, extract, generate};

fn parse_chart_kind(s: &str) -> Result<ChartKind, String> {
    s.parse()
}

#[derive(Parser)]
#[command(name = "deckweaver")]
#[command(
    version,
    about = "Judge-checked merchant analytics rendered into Google Slides decks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Config file (skips global/project lookup)")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the judge loop for each metric and build the deck
    Generate {
        #[arg(help = "Merchant token")]
        merchant: String,
        #[arg(help = "Start date (YYYY-MM-DD)")]
        start: String,
        #[arg(help = "End date (YYYY-MM-DD)")]
        end: String,
        #[arg(long = "metric", short = 'm', help = "Metric to include (repeatable; default: all known)")]
        metrics: Vec<String>,
        #[arg(long, help = "Slides template id override")]
        template: Option<String>,
        #[arg(long, help = "Drive folder id override")]
        folder: Option<String>,
        #[arg(long, help = "Max iterations override")]
        max_iterations: Option<u32>,
        #[arg(long, help = "Confidence threshold override (0.0-1.0)")]
        threshold: Option<f32>,
        #[arg(long, help = "Chart fallback-sourced data instead of skipping it")]
        allow_fallback: bool,
        #[arg(long, help = "Render charts only, skip Slides assembly")]
        no_deck: bool,
        #[arg(long, help = "Skip PDF export")]
        no_pdf: bool,
        #[arg(long, help = "Write the run report as JSON")]
        report: Option<PathBuf>,
    },

    /// Extract structured data from saved agent output
    Extract {
        #[arg(help = "Input file (default: stdin)")]
        input: Option<PathBuf>,
        #[arg(long, help = "Accept only {\"parsed\": ...} / {\"parseError\": ...} payloads")]
        strict: bool,
    },

    /// Render a structured-data JSON file as a PNG chart
    Chart {
        #[arg(help = "Structured data JSON file")]
        input: PathBuf,
        #[arg(long, short, help = "Output PNG path")]
        output: PathBuf,
        #[arg(long, short, value_parser = parse_chart_kind, default_value = "bar", help = "bar, stacked_bar, line")]
        kind: ChartKind,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (merged from all sources)
    Show {
        #[arg(long, help = "Print as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Write a starter configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        eprintln!();
        eprintln!("{}", style("deckweaver crashed").red().bold());
        eprintln!("  {}", message);
        if let Some(location) = info.location() {
            eprintln!("  {}", style(format!("at {}", location)).dim());
        }
        eprintln!();

        previous(info);
    }));
}

fn main() -> ExitCode {
    install_panic_hook();

    if let Err(e) = run_cli() {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match (cli.verbose, cli.quiet) {
        (true, _) => "deckweaver=debug,info",
        (false, true) => "error",
        (false, false) => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    match cli.command {
        Commands::Generate {
            merchant,
            start,
            end,
            metrics,
            template,
            folder,
            max_iterations,
            threshold,
            allow_fallback,
            no_deck,
            no_pdf,
            report,
        } => {
            let rt = Runtime::new()?;
            let report = rt.block_on(generate::run(generate::GenerateOptions {
                merchant,
                start,
                end,
                metrics,
                config_path: cli.config,
                template,
                folder,
                max_iterations,
                threshold,
                allow_fallback,
                no_deck,
                no_pdf,
                report,
            }))?;

            if let Some(err) = report.deck_error {
                anyhow::bail!("deck assembly failed: {}", err);
            }
        }
        Commands::Extract { input, strict } => {
            extract::run(input.as_deref(), strict)?;
        }
        Commands::Chart {
            input,
            output,
            kind,
        } => {
            let chart_config = match &cli.config {
                Some(path) => deckweaver::ConfigLoader::load_from_file(path)?.chart,
                None => deckweaver::ConfigLoader::load()?.chart,
            };
            chart::run(&input, &output, kind, &chart_config)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                config::show(cli.config.as_deref(), json)?;
            }
            ConfigAction::Path => {
                config::path()?;
            }
            ConfigAction::Init { global, force } => {
                config::init(global, force)?;
            }
        },
    }

    Ok(())
}
