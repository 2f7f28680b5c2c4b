//! Tabulates the pin configuration of a CubeMX `.ioc` project into an `.xlsx`
//! report, optionally checked against the pins of a KiCad symbol.

use std::path::PathBuf;

use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod ioc;
pub mod kicad;
pub mod reconcile;
pub mod relabel;
pub mod report;
pub mod sexpr;

pub use config::{Config, KicadConfig, MatchBy, SchematicName};
pub use error::{Error, ParseError};
pub use ioc::{IocFile, PinRecord};
pub use kicad::SchematicPinRecord;
pub use reconcile::{reconcile, ReconciledRow};

/// What a report run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub output: PathBuf,
    pub pins: usize,
    /// `None` when there was no schematic data to compare with
    pub mismatches: Option<usize>,
    pub exti_conflicts: usize,
}

/// Reads the configured inputs and writes the pin report.
pub fn run(config: &Config) -> Result<Summary, Error> {
    config.validate()?;

    let ioc = IocFile::read(&config.ioc)?;
    let schematic = config
        .kicad
        .as_ref()
        .map(kicad::read_symbol_pins)
        .transpose()?;
    let reconciled = reconcile(
        &ioc.pins,
        schematic.as_deref(),
        config.match_by,
        config.schematic_name,
    );
    if schematic.is_some() && !reconciled.has_schematic {
        warn!("no schematic pins found, writing the .ioc columns only");
    }

    let exti_conflicts = ioc.exti_conflicts();
    for conflict in &exti_conflicts {
        warn!(
            "EXTI line {} is used by {}",
            conflict.signal,
            conflict.pins.join(", ")
        );
    }

    let peripherals: &[_] = if config.peripherals {
        ioc.peripherals.as_slice()
    } else {
        &[]
    };
    let output = config.output_path();
    report::write(
        &output,
        &report::Report {
            mcu: &ioc.mcu,
            pins: &reconciled,
            exti_conflicts: &exti_conflicts,
            peripherals,
        },
    )?;

    let summary = Summary {
        output,
        pins: reconciled.rows.len(),
        mismatches: reconciled
            .has_schematic
            .then(|| reconciled.mismatches().count()),
        exti_conflicts: exti_conflicts.len(),
    };
    info!(
        "{} pins, {} EXTI conflicts",
        summary.pins, summary.exti_conflicts
    );
    Ok(summary)
}
