//! kar - report on archived kernel statistics.
//!
//! Usage:
//!   kar iostat -f day.jsonl.zst              # whole day, disks only
//!   kar iostat -f day.jsonl -s 9 -e 17:30 -z # office hours, busy disks
//!   kar sar -f day.jsonl --graphite          # CPU shares for Graphite
//!   kar print -f day.jsonl cpu:0:sys:syscall
//!   kar info -f day.jsonl

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tikv_jemallocator::Jemalloc;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use kar::error::KarError;
use kar::fmt::OutputFormat;
use kar::provider::{HistorySequence, SnapshotSequence};
use kar::report::{
    ArchiveInfo, CpustatReport, FsstatOptions, FsstatReport, HeatReport, HeatSource,
    IostatOptions, IostatReport, LoadReport, MpstatReport, PartitionMode, PrintPattern,
    PrintReport, Report, SarReport, TimeStyle, run_report,
};
use kar::util::resolve_window;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Reports on archived kernel statistics.
#[derive(Parser)]
#[command(name = "kar", version, about = "Archived kernel statistics reporter")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Options shared by every report.
#[derive(Args)]
struct CommonArgs {
    /// Archive to read (newline-delimited JSON, optionally .zst).
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: PathBuf,

    /// Start of the window: H, H:M or H:M:S on the archive's first day.
    #[arg(short = 's', long = "start", value_name = "TIME")]
    start: Option<String>,

    /// End of the window (exclusive), same format as --start.
    #[arg(short = 'e', long = "end", value_name = "TIME")]
    end: Option<String>,

    /// Emit Graphite plaintext lines instead of a table.
    #[arg(long)]
    graphite: bool,
}

impl CommonArgs {
    fn format(&self) -> OutputFormat {
        if self.graphite {
            OutputFormat::Graphite
        } else {
            OutputFormat::Table
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TimeArg {
    /// Local HH:MM:SS.
    D,
    /// Seconds since the epoch.
    U,
}

#[derive(Clone, Copy, ValueEnum)]
enum HeatArg {
    Cpu,
    Io,
}

#[derive(Subcommand)]
enum Command {
    /// Extended device statistics.
    Iostat {
        #[command(flatten)]
        common: CommonArgs,
        /// Hide devices with no activity.
        #[arg(short = 'z')]
        zero_hide: bool,
        /// Throughput in MB/s.
        #[arg(short = 'M')]
        megabytes: bool,
        /// Show partitions as well as disks.
        #[arg(short = 'p', conflicts_with = "hide_disks")]
        show_partitions: bool,
        /// Hide disks, show partitions.
        #[arg(short = 'P')]
        hide_disks: bool,
    },
    /// Per-processor statistics.
    Mpstat {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// File system operation statistics.
    Fsstat {
        #[command(flatten)]
        common: CommonArgs,
        /// Hide file systems with no activity.
        #[arg(short = 'z')]
        zero_hide: bool,
    },
    /// System-wide CPU summary.
    Cpustat {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// CPU utilization shares.
    Sar {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Load averages.
    Load {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Raw statistics matching module:instance:name[:statistic] patterns.
    Print {
        #[command(flatten)]
        common: CommonArgs,
        /// Time column format.
        #[arg(short = 'T', value_enum, default_value = "d")]
        time: TimeArg,
        #[arg(short = 'M', value_name = "MODULE")]
        module: Option<String>,
        #[arg(short = 'I', value_name = "INSTANCE")]
        instance: Option<String>,
        #[arg(short = 'N', value_name = "NAME")]
        name: Option<String>,
        #[arg(short = 'S', value_name = "STATISTIC")]
        statistic: Option<String>,
        #[arg(value_name = "PATTERN")]
        patterns: Vec<String>,
    },
    /// Utilization heatmap.
    Heat {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(value_enum, default_value = "cpu")]
        source: HeatArg,
    },
    /// Archive summary.
    Info {
        #[arg(short = 'f', long = "file", value_name = "PATH")]
        file: PathBuf,
    },
}

/// Initializes the tracing subscriber on stderr.
/// Default level is WARN so stdout and stderr stay clean for reports.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("kar={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn build_report(command: Command) -> Result<(CommonArgs, Box<dyn Report>), KarError> {
    let built: (CommonArgs, Box<dyn Report>) = match command {
        Command::Iostat {
            common,
            zero_hide,
            megabytes,
            show_partitions,
            hide_disks,
        } => {
            let partitions = if show_partitions {
                PartitionMode::ShowAll
            } else if hide_disks {
                PartitionMode::HideDisks
            } else {
                PartitionMode::HidePartitions
            };
            let options = IostatOptions {
                format: common.format(),
                partitions,
                zero_hide,
                megabytes,
            };
            (common, Box::new(IostatReport::new(options)))
        }
        Command::Mpstat { common } => {
            let report = MpstatReport::new(common.format());
            (common, Box::new(report))
        }
        Command::Fsstat { common, zero_hide } => {
            let options = FsstatOptions {
                format: common.format(),
                zero_hide,
            };
            (common, Box::new(FsstatReport::new(options)))
        }
        Command::Cpustat { common } => {
            let report = CpustatReport::new(common.format());
            (common, Box::new(report))
        }
        Command::Sar { common } => {
            let report = SarReport::new(common.format());
            (common, Box::new(report))
        }
        Command::Load { common } => {
            let report = LoadReport::new(common.format());
            (common, Box::new(report))
        }
        Command::Print {
            common,
            time,
            module,
            instance,
            name,
            statistic,
            patterns,
        } => {
            let mut parsed = patterns
                .iter()
                .map(|p| p.parse())
                .collect::<Result<Vec<PrintPattern>, _>>()?;
            if module.is_some() || instance.is_some() || name.is_some() || statistic.is_some() {
                parsed.push(PrintPattern::from_parts(
                    module.as_deref(),
                    instance.as_deref(),
                    name.as_deref(),
                    statistic.as_deref(),
                )?);
            }
            if parsed.is_empty() {
                return Err(KarError::Parse("print needs at least one pattern".to_string()));
            }
            let time_style = match time {
                TimeArg::D => TimeStyle::Clock,
                TimeArg::U => TimeStyle::Epoch,
            };
            let report = PrintReport::new(common.format(), time_style, parsed);
            (common, Box::new(report))
        }
        Command::Heat { common, source } => {
            if common.graphite {
                warn!("heat has no Graphite output, printing the grid");
            }
            let source = match source {
                HeatArg::Cpu => HeatSource::Cpu,
                HeatArg::Io => HeatSource::Io,
            };
            (common, Box::new(HeatReport::new(source)))
        }
        Command::Info { .. } => {
            return Err(KarError::Parse("info is not a cycle report".to_string()));
        }
    };
    Ok(built)
}

/// Loads the archive and feeds every cycle of the window to `report`.
fn replay(common: &CommonArgs, report: &mut dyn Report) -> Result<(), KarError> {
    let mut sequence = HistorySequence::from_path(&common.file)?;
    let window = resolve_window(
        sequence.wall_clock_millis(),
        common.start.as_deref(),
        common.end.as_deref(),
    )?;

    let summary = run_report(&mut sequence, window, report)?;
    info!(
        "processed {} cycles ({} restarts) from {}",
        summary.cycles,
        summary.restarts,
        common.file.display()
    );
    Ok(())
}

/// Runs `report` and prints it to `out`.
///
/// An empty window only warns: the report prints whatever it collected,
/// which may be a bare header or nothing at all.
fn execute(common: &CommonArgs, report: &mut dyn Report, out: &mut dyn Write) -> Result<(), KarError> {
    match replay(common, report) {
        Ok(()) => {}
        Err(KarError::EmptyWindow) => {
            warn!("{}: {}", common.file.display(), KarError::EmptyWindow);
        }
        Err(e) => return Err(e),
    }
    report.render(out)?;
    Ok(())
}

fn summarize(file: &Path, out: &mut dyn Write) -> Result<(), KarError> {
    let info = match HistorySequence::from_path(file) {
        Ok(sequence) => ArchiveInfo::from_cycles(sequence.cycles()),
        Err(KarError::EmptyWindow) => {
            warn!("{}: {}", file.display(), KarError::EmptyWindow);
            ArchiveInfo::default()
        }
        Err(e) => return Err(e),
    };
    info.render(out)?;
    Ok(())
}

fn run(command: Command) -> Result<(), KarError> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if let Command::Info { file } = &command {
        summarize(file, &mut out)?;
    } else {
        let (common, mut report) = build_report(command)?;
        execute(&common, &mut *report, &mut out)?;
    }
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
