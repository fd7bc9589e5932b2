use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use organism_atlas::app::{App, EnrichOptions, EnrichResult, Outcome, StopFlag};
use organism_atlas::catalog::Catalog;
use organism_atlas::config::{ConfigLoader, ResolvedConfig};
use organism_atlas::deck::{DeckConverter, DeckStatus};
use organism_atlas::error::AtlasError;
use organism_atlas::inaturalist::InaturalistHttpClient;
use organism_atlas::ledger::Ledger;
use organism_atlas::output::{ConsoleOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "organism-atlas")]
#[command(about = "Organism photo enrichment and Anki deck conversion for the study site")]
#[command(version, author)]
struct Cli {
    /// Print a JSON summary instead of live progress lines.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Config file (defaults to organism-atlas.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download iNaturalist photos for every organism in the catalog")]
    Images(ImagesArgs),
    #[command(about = "Convert Anki .apkg decks to JSON card files")]
    Decks(DecksArgs),
}

#[derive(Args)]
struct ImagesArgs {
    #[arg(long)]
    catalog: Option<Utf8PathBuf>,

    #[arg(long)]
    image_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    ledger: Option<Utf8PathBuf>,

    #[arg(long)]
    pause_ms: Option<u64>,
}

#[derive(Args)]
struct DecksArgs {
    #[arg(long)]
    input_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    strip_html: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<AtlasError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AtlasError) -> u8 {
    match error {
        AtlasError::CatalogRead(_)
        | AtlasError::CatalogParse(_)
        | AtlasError::LiteralMarkerMissing(_)
        | AtlasError::LiteralUnbalanced(_)
        | AtlasError::ConfigRead(_)
        | AtlasError::ConfigParse(_)
        | AtlasError::InvalidRank(_) => 2,
        AtlasError::TaxaHttp(_)
        | AtlasError::TaxaStatus { .. }
        | AtlasError::PhotoHttp(_)
        | AtlasError::PhotoStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Images(args) => run_images(args, config, output_mode),
        Commands::Decks(args) => run_decks(args, config, output_mode),
    }
}

fn run_images(
    args: ImagesArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(catalog) = args.catalog {
        config.images.catalog_path = catalog;
    }
    if let Some(image_dir) = args.image_dir {
        config.images.image_dir = image_dir;
    }
    if let Some(ledger) = args.ledger {
        config.images.ledger_path = ledger;
    }
    if let Some(pause_ms) = args.pause_ms {
        config.images.pause = Duration::from_millis(pause_ms);
    }
    let settings = config.images;

    let catalog = Catalog::load(
        settings.catalog_path.as_std_path(),
        &settings.catalog_marker,
    )?;
    let entries = catalog.entries();
    let mut ledger = Ledger::load(settings.ledger_path.clone(), settings.ledger_global.clone());

    let stop = StopFlag::new();
    stop.install_interrupt_handler()?;

    let client = InaturalistHttpClient::new(config.search)?.with_stop(stop.clone());
    let app = App::new(
        client,
        EnrichOptions {
            image_dir: settings.image_dir,
            pause: settings.pause,
        },
    );

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.enrich(&entries, &mut ledger, &stop, &JsonOutput)?;
            JsonOutput::print_enrich(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.enrich(&entries, &mut ledger, &stop, &ConsoleOutput)?;
            print_enrich_summary(&result);
        }
    }
    Ok(())
}

fn run_decks(
    args: DecksArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(input_dir) = args.input_dir {
        config.decks.input_dir = input_dir;
    }
    if let Some(output_dir) = args.output_dir {
        config.decks.output_dir = output_dir;
    }
    if args.strip_html {
        config.decks.strip_html = true;
    }

    let converter = DeckConverter::new(config.decks);
    let result = match output_mode {
        OutputMode::NonInteractive => {
            let result = converter.convert_all(&JsonOutput);
            JsonOutput::print_decks(&result).into_diagnostic()?;
            result
        }
        OutputMode::Interactive => converter.convert_all(&ConsoleOutput),
    };

    let failed = result
        .decks
        .iter()
        .filter(|deck| matches!(deck.status, DeckStatus::Failed { .. }))
        .count();
    if failed > 0 {
        return Err(miette::miette!("{failed} deck(s) failed to convert"));
    }
    Ok(())
}

fn print_enrich_summary(result: &EnrichResult) {
    let saved = result.count(|outcome| matches!(outcome, Outcome::Saved { .. }));
    let skipped = result.count(|outcome| matches!(outcome, Outcome::Skipped { .. }));
    let unmatched = result.count(|outcome| {
        matches!(
            outcome,
            Outcome::NoMatch | Outcome::Mismatch { .. } | Outcome::NoPhoto
        )
    });
    let failed = result.count(|outcome| matches!(outcome, Outcome::Failed { .. }));
    println!(
        "{saved} saved, {skipped} skipped, {unmatched} without image, {failed} failed ({} in ledger)",
        result.ledger_entries
    );
}
