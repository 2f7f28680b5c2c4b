//! ioc_pinout CLI

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::Level;

use ioc_pinout::{
    relabel::{relabel, RelabelOptions, PLACEHOLDER},
    Config, KicadConfig, MatchBy, SchematicName,
};

#[derive(Parser)]
#[command(name = "ioc_pinout")]
#[command(about = "CubeMX .ioc pin report, checked against a KiCad symbol", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the .xlsx pin report of a .ioc file
    Report(ReportArgs),

    /// Fill placeholder net labels of a schematic from a pin report
    Relabel {
        /// .kicad_sch file to rewrite in place
        #[arg(value_name = "SCH")]
        schematic: PathBuf,

        /// Report written by `report`
        #[arg(value_name = "XLSX")]
        report: PathBuf,

        /// Label text to replace
        #[arg(long, default_value = PLACEHOLDER)]
        placeholder: String,

        /// Only follow labels to pins of this symbol, `Lib:Entry` or entry
        #[arg(long)]
        symbol: Option<String>,

        /// Do not keep a .bak copy of the schematic
        #[arg(long)]
        no_backup: bool,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// CubeMX project file
    #[arg(value_name = "IOC")]
    ioc: Option<PathBuf>,

    /// Output file, defaults to the .ioc path with an .xlsx extension
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// TOML config; command line options take precedence
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// KiCad schematic to compare with
    #[arg(long, value_name = "SCH")]
    schematic: Option<PathBuf>,

    /// KiCad symbol library holding the MCU symbol
    #[arg(long, value_name = "SYM")]
    library: Option<PathBuf>,

    /// Symbol unit to compare with
    #[arg(long)]
    unit: Option<u32>,

    /// Symbol name, `Lib:Entry` or entry
    #[arg(long)]
    symbol: Option<String>,

    /// Join .ioc and schematic pins by
    #[arg(long, value_enum)]
    match_by: Option<MatchArg>,

    /// Schematic text compared with the .ioc name
    #[arg(long, value_enum)]
    schematic_name: Option<NameArg>,

    /// Leave out the Peripherals sheet
    #[arg(long)]
    no_peripherals: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum MatchArg {
    /// .ioc pin index against symbol pin number
    Number,
    /// Port pin against symbol pin name
    Name,
}

#[derive(Clone, Copy, ValueEnum)]
enum NameArg {
    /// Declared symbol pin name
    Pin,
    /// Net label wired to the pin
    Label,
}

impl From<MatchArg> for MatchBy {
    fn from(value: MatchArg) -> Self {
        match value {
            MatchArg::Number => MatchBy::Number,
            MatchArg::Name => MatchBy::Name,
        }
    }
}

impl From<NameArg> for SchematicName {
    fn from(value: NameArg) -> Self {
        match value {
            NameArg::Pin => SchematicName::Pin,
            NameArg::Label => SchematicName::Label,
        }
    }
}

impl ReportArgs {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(ioc) = self.ioc {
            config.ioc = ioc;
        }
        if self.output.is_some() {
            config.output = self.output;
        }
        if let Some(match_by) = self.match_by {
            config.match_by = match_by.into();
        }
        if let Some(name) = self.schematic_name {
            config.schematic_name = name.into();
        }
        if self.no_peripherals {
            config.peripherals = false;
        }

        let kicad_args = self.schematic.is_some()
            || self.library.is_some()
            || self.unit.is_some()
            || self.symbol.is_some();
        if kicad_args {
            let kicad = config.kicad.get_or_insert_with(KicadConfig::default);
            if self.schematic.is_some() {
                kicad.schematic = self.schematic;
            }
            if self.library.is_some() {
                kicad.library = self.library;
            }
            if let Some(unit) = self.unit {
                kicad.unit = unit;
            }
            if self.symbol.is_some() {
                kicad.symbol = self.symbol;
            }
        }
        Ok(config)
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_report(args: ReportArgs) -> Result<i32> {
    let config = args.into_config()?;
    let summary = ioc_pinout::run(&config)
        .with_context(|| format!("Failed to write the report for {}", config.ioc.display()))?;

    println!("{} pins written to {}", summary.pins, summary.output.display());
    if let Some(mismatches) = summary.mismatches {
        println!("{} pins differ from the schematic", mismatches);
    }
    if summary.exti_conflicts > 0 {
        println!("{} EXTI lines used more than once", summary.exti_conflicts);
    }
    Ok(0)
}

fn handle_relabel(options: RelabelOptions) -> Result<i32> {
    let result = relabel(&options)
        .with_context(|| format!("Failed to relabel {}", options.schematic.display()))?;

    for replacement in &result.replacements {
        println!("{} -> {}", replacement.pin_name, replacement.text);
    }
    if result.unresolved.is_empty() {
        return Ok(0);
    }
    for unresolved in &result.unresolved {
        eprintln!("error: {}", unresolved);
    }
    Ok(2)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Report(args) => handle_report(args),
        Commands::Relabel {
            schematic,
            report,
            placeholder,
            symbol,
            no_backup,
        } => handle_relabel(RelabelOptions {
            placeholder,
            symbol,
            backup: !no_backup,
            ..RelabelOptions::new(schematic, report)
        }),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}
