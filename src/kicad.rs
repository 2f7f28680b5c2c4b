//! KiCad symbol library and schematic reader

use std::path::Path;

use tracing::{debug, info, warn};

use crate::{
    config::KicadConfig,
    error::{Error, ParseError},
    sexpr::SExpr,
};

pub mod net;
mod parse;
pub mod raw;

pub use parse::{entry_name, LibPin, UnitId};

use net::{Nets, Point};

/// A pin of one symbol unit, as declared in the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchematicPinRecord {
    pub pin_number: u32,
    pub pin_name: String,
    pub unit: u32,
    /// Label wired to the pin on the sheet, if any
    pub net_label: Option<String>,
}

/// A library pin of a symbol placed on a sheet, at its sheet position
#[derive(Debug, Clone)]
pub struct PlacedPin<'a> {
    pub lib_id: &'a str,
    pub pin: LibPin<'a>,
    pub point: Point,
}

pub(crate) fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(Error::io(path))
}

fn root<'a>(path: &Path, input: &'a str, label: &str) -> Result<SExpr<'a>, Error> {
    let root = SExpr::try_from(input).map_err(Error::parse(path))?;
    match root.label() {
        Some(l) if l == label => Ok(root),
        found => Err(Error::parse(path)(ParseError::UnexpectedToken {
            expected: label.to_owned(),
            found: found.unwrap_or_default().to_owned(),
            at: 0..0,
        })),
    }
}

pub fn parse_library<'a>(path: &Path, input: &'a str) -> Result<raw::Library<'a>, Error> {
    let root = root(path, input, "kicad_symbol_lib")?;
    raw::Library::try_from(&root).map_err(Error::parse(path))
}

pub fn parse_schematic<'a>(path: &Path, input: &'a str) -> Result<raw::Schematic<'a>, Error> {
    let root = root(path, input, "kicad_sch")?;
    raw::Schematic::try_from(&root).map_err(Error::parse(path))
}

/// Picks the symbol to read: the configured one, else the first placed
/// symbol defined in `library`, else the library's only symbol.
fn resolve_symbol(
    requested: Option<&str>,
    library: &raw::Library,
    schematic: Option<&raw::Schematic>,
) -> Option<String> {
    if let Some(name) = requested {
        return Some(name.to_owned());
    }
    let placed = schematic
        .into_iter()
        .flat_map(|s| s.placed.iter())
        .find(|p| library.find(p.lib_id).is_some());
    if let Some(placed) = placed {
        debug!("using placed symbol {}", placed.lib_id);
        return Some(placed.lib_id.to_owned());
    }
    match library.symbols.as_slice() {
        [only] => Some(only.name.to_owned()),
        _ => None,
    }
}

impl<'a> raw::Schematic<'a> {
    /// Pins of every placed symbol (or only of `symbol`) at their sheet
    /// positions. Mirrored placements are skipped.
    pub fn placed_pins(
        &self,
        library: &raw::Library<'a>,
        symbol: Option<&str>,
    ) -> Vec<PlacedPin<'a>> {
        let mut pins = Vec::new();
        for placed in &self.placed {
            if symbol.is_some_and(|s| entry_name(s) != entry_name(placed.lib_id)) {
                continue;
            }
            if let Some(mirror) = placed.mirror {
                warn!("{} is mirrored ({}), its pins are not traced", placed.lib_id, mirror);
                continue;
            }
            let Ok(unit) = parse::pin_number(placed.unit) else {
                warn!("{} has an invalid unit {}", placed.lib_id, placed.unit);
                continue;
            };
            let Some(unit_pins) = library.unit_pins(placed.lib_id, unit) else {
                debug!("no definition for {} unit {}", placed.lib_id, unit);
                continue;
            };
            pins.extend(unit_pins.into_iter().map(|pin| PlacedPin {
                lib_id: placed.lib_id,
                point: net::pin_point(placed.at, pin.at),
                pin,
            }));
        }
        pins
    }
}

/// Reads the pins of the configured symbol unit.
///
/// A symbol or unit that cannot be found yields no pins rather than an
/// error; unreadable or malformed files are errors.
pub fn read_symbol_pins(config: &KicadConfig) -> Result<Vec<SchematicPinRecord>, Error> {
    let schematic_text = config.schematic.as_deref().map(read_file).transpose()?;
    let library_text = config.library.as_deref().map(read_file).transpose()?;

    let schematic = match (config.schematic.as_deref(), schematic_text.as_deref()) {
        (Some(path), Some(text)) => Some(parse_schematic(path, text)?),
        _ => None,
    };
    let library = match (config.library.as_deref(), library_text.as_deref()) {
        (Some(path), Some(text)) => parse_library(path, text)?,
        _ => schematic
            .as_ref()
            .map(|s| s.lib_symbols.clone())
            .unwrap_or_default(),
    };

    let Some(symbol) = resolve_symbol(config.symbol.as_deref(), &library, schematic.as_ref())
    else {
        warn!("cannot tell which KiCad symbol to read; set the symbol name");
        return Ok(vec![]);
    };
    let Some(pins) = library.unit_pins(&symbol, config.unit) else {
        warn!("unit {} of symbol {} not found", config.unit, symbol);
        return Ok(vec![]);
    };

    let labels = schematic.as_ref().map(|schematic| {
        let nets = Nets::new(&schematic.wires, &schematic.labels);
        let placed: Vec<PlacedPin> = schematic
            .placed_pins(&library, Some(symbol.as_str()))
            .into_iter()
            .filter(|p| p.pin.unit == config.unit)
            .collect();
        if placed.is_empty() {
            warn!("unit {} of {} is not placed on the schematic", config.unit, symbol);
        }
        move |number: u32| {
            placed
                .iter()
                .find(|p| p.pin.number == number)
                .and_then(|p| nets.label_at(p.point))
                .map(str::to_owned)
        }
    });

    let mut records: Vec<SchematicPinRecord> = pins
        .into_iter()
        .map(|pin| SchematicPinRecord {
            pin_number: pin.number,
            pin_name: pin.name.into_owned(),
            unit: pin.unit,
            net_label: labels.as_ref().and_then(|label| label(pin.number)),
        })
        .collect();
    records.sort_by_key(|r| r.pin_number);

    info!(
        "read {} pins of {} unit {} ({} with net labels)",
        records.len(),
        symbol,
        config.unit,
        records.iter().filter(|r| r.net_label.is_some()).count()
    );
    Ok(records)
}
