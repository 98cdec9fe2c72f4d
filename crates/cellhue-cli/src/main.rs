//! cellhue CLI - colored text runs of spreadsheet cells

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use cellhue_core::{
    walk_sheet, Classifier, ClassifierConfig, Error, ExtractOptions, Metric, Palette, Report,
    ReportFormat, ReportWriter, Rgb, SheetReport, SheetSource, TieBreak, WalkError,
};
use cellhue_libreoffice::{BridgeError, LibreOfficeBridge, LibreOfficeConfig, Workbook};
use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cellhue")]
#[command(
    author,
    version,
    about = "Extract per-run colored text from spreadsheet cells through LibreOffice"
)]
struct Cli {
    /// Input workbook (any format LibreOffice can open)
    #[arg(env = "CELLHUE_INPUT", default_value = "Book.xlsx")]
    input: PathBuf,

    /// Report file, replaced if it exists
    #[arg(
        short,
        long,
        env = "CELLHUE_OUTPUT",
        default_value = "output/parsed_cells.txt"
    )]
    output: PathBuf,

    /// Report format (text or json)
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    format: ReportFormat,

    /// Host of the LibreOffice URP listener
    #[arg(long, env = "CELLHUE_HOST", default_value = "localhost")]
    host: String,

    /// Port of the LibreOffice URP listener
    #[arg(long, env = "CELLHUE_PORT", default_value_t = 2002)]
    port: u16,

    /// Spawn a headless LibreOffice instead of attaching to a running one
    #[arg(long)]
    start: bool,

    /// soffice executable used with --start (default: soffice from PATH)
    #[arg(long, value_name = "PATH", requires = "start")]
    soffice: Option<PathBuf>,

    /// Extra argument passed to a spawned soffice (repeatable)
    #[arg(long = "soffice-arg", value_name = "ARG", requires = "start", allow_hyphen_values = true)]
    soffice_args: Vec<String>,

    /// Seconds to wait for a spawned LibreOffice to accept connections
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    startup_timeout: u64,

    /// Zero-based index of the sheet to read
    #[arg(long, default_value_t = 0, conflicts_with = "all_sheets")]
    sheet: usize,

    /// Read every sheet of the workbook
    #[arg(long)]
    all_sheets: bool,

    /// Color used for text whose color is automatic (RRGGBB)
    #[arg(long, value_name = "RRGGBB", default_value = "000000", value_parser = parse_rgb)]
    fallback_color: Rgb,

    /// Classification palette as name=RRGGBB pairs, comma separated
    #[arg(long, value_name = "LIST", value_parser = parse_palette)]
    palette: Option<Palette>,

    /// Color distance used for classification
    #[arg(long, value_enum, default_value_t = MetricArg::Squared)]
    metric: MetricArg,

    /// Which palette entry wins when several are equally close
    #[arg(long, value_enum, default_value_t = TieBreakArg::First)]
    tie_break: TieBreakArg,

    /// Label colors farther than this from every entry as "other"
    #[arg(long, value_name = "N")]
    max_distance: Option<u32>,

    /// Merge neighbouring runs of the same color
    #[arg(long)]
    coalesce: bool,

    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Squared,
    Manhattan,
}

#[derive(Clone, Copy, ValueEnum)]
enum TieBreakArg {
    First,
    Last,
}

impl Cli {
    fn classifier(&self) -> Classifier {
        let config = ClassifierConfig {
            metric: match self.metric {
                MetricArg::Squared => Metric::SquaredEuclidean,
                MetricArg::Manhattan => Metric::Manhattan,
            },
            tie_break: match self.tie_break {
                TieBreakArg::First => TieBreak::FirstDeclared,
                TieBreakArg::Last => TieBreak::LastDeclared,
            },
            max_distance: self.max_distance,
        };
        Classifier::new(self.palette.clone().unwrap_or_default(), config)
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            fallback: self.fallback_color,
            coalesce: self.coalesce,
        }
    }

    fn office_config(&self) -> LibreOfficeConfig {
        LibreOfficeConfig {
            soffice_path: self.soffice.clone(),
            host: self.host.clone(),
            port: self.port,
            startup_timeout: Duration::from_secs(self.startup_timeout),
            extra_args: self.soffice_args.clone(),
        }
    }
}

fn parse_rgb(s: &str) -> std::result::Result<Rgb, String> {
    s.parse::<Rgb>().map_err(|e| e.to_string())
}

fn parse_palette(s: &str) -> std::result::Result<Palette, String> {
    s.parse::<Palette>().map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Process exit status for a failed run.
fn exit_code(err: &anyhow::Error) -> u8 {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<Error>());
    match kind {
        Some(Error::InputNotFound(_)) => 3,
        Some(Error::HostUnreachable { .. }) => 4,
        Some(Error::WorkbookOpen { .. }) => 5,
        Some(Error::Walk(_)) => 6,
        Some(Error::Report { .. }) => 7,
        _ => 1,
    }
}

async fn run(cli: &Cli) -> Result<()> {
    if !cli.input.is_file() {
        return Err(Error::InputNotFound(cli.input.clone()).into());
    }
    let classifier = cli.classifier();
    let options = cli.extract_options();

    let endpoint = format!("{}:{}", cli.host, cli.port);
    let bridge = if cli.start {
        LibreOfficeBridge::start(cli.office_config()).await
    } else {
        LibreOfficeBridge::connect(&cli.host, cli.port).await
    };
    let mut bridge = bridge.map_err(|e| Error::HostUnreachable {
        endpoint,
        source: Box::new(e),
    })?;

    let report = read_workbook(&mut bridge, cli, &options).await;
    if let Err(e) = bridge.shutdown().await {
        tracing::warn!(error = %e, "LibreOffice shutdown failed");
    }
    let report = report?;

    ReportWriter::new(&classifier, cli.format).write_file(&report, &cli.output)?;
    eprintln!(
        "Wrote {} run(s) from {} sheet(s) to '{}'",
        report.run_count(),
        report.sheets.len(),
        cli.output.display()
    );
    Ok(())
}

async fn read_workbook(
    bridge: &mut LibreOfficeBridge,
    cli: &Cli,
    options: &ExtractOptions,
) -> Result<Report> {
    let mut workbook = bridge
        .open_workbook(&cli.input)
        .await
        .map_err(|e| Error::WorkbookOpen {
            path: cli.input.clone(),
            source: Box::new(e),
        })?;
    tracing::info!(url = workbook.url(), "workbook open");

    let report = walk_workbook(&mut workbook, cli, options).await;
    if let Err(e) = workbook.close().await {
        tracing::warn!(error = %e, "closing the workbook failed");
    }
    report
}

async fn walk_workbook(
    workbook: &mut Workbook<'_>,
    cli: &Cli,
    options: &ExtractOptions,
) -> Result<Report> {
    let count = workbook
        .sheet_count()
        .await
        .map_err(|e| host_failure(e, "getCount"))?;
    let indices: Vec<usize> = if cli.all_sheets {
        (0..count).collect()
    } else {
        vec![cli.sheet]
    };
    let source = file_name(&cli.input);

    let mut report = Report::new();
    for index in indices {
        let mut sheet = workbook.sheet(index).await.map_err(|e| match e {
            BridgeError::NoSuchSheet { .. } => anyhow::Error::new(e),
            other => host_failure(other, "getByIndex"),
        })?;
        let name = sheet
            .sheet_name()
            .await
            .map_err(|source| Error::Walk(WalkError { address: None, source }))?;
        tracing::info!(index = sheet.index(), %name, "reading sheet");

        let cells = walk_sheet(&mut sheet, options)
            .await
            .map_err(Error::from)
            .with_context(|| format!("reading sheet {index} ({name})"))?;
        report.push(SheetReport {
            source: source.clone(),
            index: sheet.index(),
            name,
            cells,
        });
    }
    Ok(report)
}

fn host_failure(e: BridgeError, operation: &str) -> anyhow::Error {
    Error::Walk(WalkError {
        address: None,
        source: e.into_host_error(operation),
    })
    .into()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
