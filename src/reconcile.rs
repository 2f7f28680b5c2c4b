//! Joins `.ioc` pins with the pins of a schematic symbol unit

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::{
    config::{MatchBy, SchematicName},
    ioc::PinRecord,
    kicad::SchematicPinRecord,
};

lazy_static! {
    static ref PORT_PREFIX: Regex = Regex::new(r"^P[A-Z]\d+").unwrap();
}

/// One `.ioc` pin with the schematic pin it was matched to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledRow<'a> {
    pub pin: &'a PinRecord,
    pub schematic_name: Option<String>,
    pub net_label: Option<String>,
    /// Set only when a schematic pin matched and the names differ
    pub mismatch: bool,
}

impl<'a> ReconciledRow<'a> {
    pub fn pin_number(&self) -> u32 {
        self.pin.pin_number
    }

    pub fn ioc_name(&self) -> &'a str {
        self.pin.ioc_name()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciled<'a> {
    /// One row per `.ioc` pin, in `.ioc` order
    pub rows: Vec<ReconciledRow<'a>>,
    /// Schematic data was supplied and non-empty
    pub has_schematic: bool,
    /// At least one matched pin has a traced net label
    pub has_net_labels: bool,
}

impl<'a> Reconciled<'a> {
    pub fn mismatches(&self) -> impl Iterator<Item = &ReconciledRow<'a>> {
        self.rows.iter().filter(|row| row.mismatch)
    }
}

/// `PA0/WKUP` -> `PA0`
pub(crate) fn port_prefix(name: &str) -> Option<&str> {
    PORT_PREFIX.find(name).map(|m| m.as_str())
}

fn find<'s>(
    schematic: &'s [SchematicPinRecord],
    pin: &PinRecord,
    match_by: MatchBy,
) -> Option<&'s SchematicPinRecord> {
    match match_by {
        MatchBy::Number => schematic.iter().find(|s| s.pin_number == pin.pin_number),
        MatchBy::Name => schematic
            .iter()
            .find(|s| port_prefix(&s.pin_name) == Some(pin.pin_name.as_str())),
    }
}

/// Left join of `pins` with `schematic`.
///
/// An empty schematic pin list counts as no schematic data.
pub fn reconcile<'a>(
    pins: &'a [PinRecord],
    schematic: Option<&[SchematicPinRecord]>,
    match_by: MatchBy,
    name: SchematicName,
) -> Reconciled<'a> {
    let schematic = schematic.filter(|s| !s.is_empty());

    let rows: Vec<ReconciledRow> = pins
        .iter()
        .map(|pin| {
            let Some(matched) = schematic.and_then(|s| find(s, pin, match_by)) else {
                if schematic.is_some() {
                    debug!("no schematic pin for {} ({})", pin.pin_name, pin.pin_number);
                }
                return ReconciledRow {
                    pin,
                    schematic_name: None,
                    net_label: None,
                    mismatch: false,
                };
            };
            let schematic_name = match name {
                SchematicName::Pin => matched.pin_name.clone(),
                SchematicName::Label => matched
                    .net_label
                    .clone()
                    .unwrap_or_else(|| matched.pin_name.clone()),
            };
            ReconciledRow {
                pin,
                mismatch: schematic_name != pin.ioc_name(),
                schematic_name: Some(schematic_name),
                net_label: matched.net_label.clone(),
            }
        })
        .collect();

    let reconciled = Reconciled {
        has_schematic: schematic.is_some(),
        has_net_labels: rows.iter().any(|row| row.net_label.is_some()),
        rows,
    };
    if reconciled.has_schematic {
        info!(
            "{} of {} pins matched, {} mismatched",
            reconciled
                .rows
                .iter()
                .filter(|row| row.schematic_name.is_some())
                .count(),
            reconciled.rows.len(),
            reconciled.mismatches().count()
        );
    }
    reconciled
}
