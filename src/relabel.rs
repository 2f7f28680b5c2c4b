//! Fills in placeholder net labels of a schematic from a pin report
//!
//! Each label whose text is the placeholder is followed along its wire to
//! the pin of a placed symbol, and takes the name the report gives that pin.
//! Only the label text is rewritten; the rest of the file is kept byte for
//! byte.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    error::Error,
    kicad::{
        self,
        net::{Nets, Point},
        PlacedPin,
        raw::Position,
    },
    reconcile::port_prefix,
    report,
    sexpr::span_of,
};

/// Label text KiCad users leave for the tool to fill in
pub const PLACEHOLDER: &str = "XXXXXXXXXXXXXXXXX";

#[derive(Debug, Clone)]
pub struct RelabelOptions {
    pub schematic: PathBuf,
    pub report: PathBuf,
    pub placeholder: String,
    /// Only trace pins of this symbol (`Lib:Entry` or entry)
    pub symbol: Option<String>,
    /// Copy the schematic to `<name>.bak` before overwriting it
    pub backup: bool,
}

impl RelabelOptions {
    pub fn new(schematic: impl Into<PathBuf>, report: impl Into<PathBuf>) -> Self {
        Self {
            schematic: schematic.into(),
            report: report.into(),
            placeholder: PLACEHOLDER.to_owned(),
            symbol: None,
            backup: true,
        }
    }
}

/// A placeholder label that could not be resolved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Unresolved {
    #[error("label at ({}, {}) is not on a wire", .0.x, .0.y)]
    NotOnWire(Position),
    #[error("no pin is connected to the label at ({}, {})", .0.x, .0.y)]
    NoPin(Position),
    #[error("pin {pin} (label at ({}, {})) is not in the report", .at.x, .at.y)]
    NotInReport { pin: String, at: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub at: Position,
    pub pin_name: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Relabeled {
    pub replacements: Vec<Replacement>,
    pub unresolved: Vec<Unresolved>,
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn report_name<'n>(names: &'n BTreeMap<String, String>, pin: &str) -> Option<&'n String> {
    names
        .get(pin)
        .or_else(|| port_prefix(pin).and_then(|port| names.get(port)))
}

/// Replaces the placeholder labels of the schematic `input` using `names`
/// (port pin name to new label text). Returns the new text.
///
/// With `symbol` set only pins of that symbol are traced. Otherwise a label
/// reaching several pins takes the first one the report knows.
pub fn relabel_text(
    path: &Path,
    input: &str,
    names: &BTreeMap<String, String>,
    placeholder: &str,
    symbol: Option<&str>,
) -> Result<(String, Relabeled), Error> {
    let schematic = kicad::parse_schematic(path, input)?;
    let nets = Nets::new(&schematic.wires, &schematic.labels);
    let pins = schematic.placed_pins(&schematic.lib_symbols, symbol);
    debug!(
        "{} wires, {} labels, {} placed pins",
        schematic.wires.len(),
        schematic.labels.len(),
        pins.len()
    );

    let mut result = Relabeled::default();
    let mut edits = Vec::new();
    for label in schematic.labels.iter().filter(|l| l.text == placeholder) {
        let at = Point::from(label.at);
        let connected: Vec<&PlacedPin> = pins
            .iter()
            .filter(|p| nets.connected(p.point, at))
            .collect();
        let chosen = connected
            .iter()
            .find(|p| report_name(names, &p.pin.name).is_some())
            .or_else(|| connected.first());
        let Some(pin) = chosen else {
            result.unresolved.push(match nets.net_at(at) {
                Some(_) => Unresolved::NoPin(label.at),
                None => Unresolved::NotOnWire(label.at),
            });
            continue;
        };

        let name: &str = &pin.pin.name;
        let Some(text) = report_name(names, name) else {
            result.unresolved.push(Unresolved::NotInReport {
                pin: name.to_owned(),
                at: label.at,
            });
            continue;
        };
        let Some(span) = span_of(input, label.raw) else {
            warn!("label at ({}, {}) is not part of the input", label.at.x, label.at.y);
            continue;
        };

        debug!("label at ({}, {}) on {} becomes {}", label.at.x, label.at.y, name, text);
        edits.push((span, escape(text)));
        result.replacements.push(Replacement {
            at: label.at,
            pin_name: name.to_owned(),
            text: text.clone(),
        });
    }

    edits.sort_by_key(|(span, _)| span.start);
    let mut output = String::with_capacity(input.len());
    let mut last = 0;
    for (span, text) in edits {
        output.push_str(&input[last..span.start]);
        output.push_str(&text);
        last = span.end;
    }
    output.push_str(&input[last..]);

    Ok((output, result))
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Rewrites the placeholder labels of a schematic file in place.
///
/// Resolved labels are written even when others could not be resolved; the
/// caller decides whether `unresolved` entries are a failure.
pub fn relabel(options: &RelabelOptions) -> Result<Relabeled, Error> {
    let names = report::read_signal_map(&options.report)?;
    let input = kicad::read_file(&options.schematic)?;
    let (output, result) = relabel_text(
        &options.schematic,
        &input,
        &names,
        &options.placeholder,
        options.symbol.as_deref(),
    )?;

    for unresolved in &result.unresolved {
        warn!("{}", unresolved);
    }
    if result.replacements.is_empty() {
        info!("no placeholder labels replaced in {}", options.schematic.display());
        return Ok(result);
    }

    if options.backup {
        let backup = backup_path(&options.schematic);
        std::fs::copy(&options.schematic, &backup).map_err(Error::io(&backup))?;
        info!("backup written to {}", backup.display());
    }
    std::fs::write(&options.schematic, output).map_err(Error::io(&options.schematic))?;
    info!(
        "replaced {} labels in {}",
        result.replacements.len(),
        options.schematic.display()
    );
    Ok(result)
}
