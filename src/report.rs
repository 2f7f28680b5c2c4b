//! `.xlsx` pin report writer, and the reader for its pin/signal columns

use std::{collections::BTreeMap, path::Path};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet, XlsxError};
use tracing::{debug, info};

use crate::{
    error::Error,
    ioc::{ExtiConflict, McuInfo, PeripheralRecord},
    reconcile::Reconciled,
};

pub const PINS_SHEET: &str = "Pins";
pub const PERIPHERALS_SHEET: &str = "Peripherals";

/// Row of the column headers on the `Pins` sheet, counting from 0
pub const HEADER_ROW: u32 = 2;

pub(crate) const PIN_COLUMNS: [&str; 6] = [
    "PinNumber",
    "PinName",
    "PinFunction",
    "Signal",
    "Label",
    "Mode",
];
const PERIPHERAL_COLUMNS: [&str; 5] = [
    "Peripheral",
    "Mode",
    "Channel",
    "BaudRatePrescaler",
    "CalculatedBaudRate",
];

const HEADER_COLOR: u32 = 0x4285F4;
const OK_COLOR: u32 = 0x00FF00;
const ERROR_COLOR: u32 = 0xFF0000;
const MISMATCH_COLOR: u32 = 0xFFD1DC;

/// Everything that goes into one report file
pub struct Report<'a> {
    pub mcu: &'a McuInfo,
    pub pins: &'a Reconciled<'a>,
    pub exti_conflicts: &'a [ExtiConflict],
    /// Written to their own sheet when not empty
    pub peripherals: &'a [PeripheralRecord],
}

fn cell(color: Option<u32>) -> Format {
    let format = Format::new().set_border(FormatBorder::Thin);
    match color {
        Some(color) => format.set_background_color(Color::RGB(color)),
        None => format,
    }
}

fn pin_headers(pins: &Reconciled) -> Vec<&'static str> {
    let mut headers = PIN_COLUMNS.to_vec();
    if pins.has_schematic {
        headers.push("SchematicName");
        if pins.has_net_labels {
            headers.push("NetLabel");
        }
    }
    headers
}

fn exti_status(conflicts: &[ExtiConflict]) -> String {
    if conflicts.is_empty() {
        return "All good: no duplicated EXTI lines".to_owned();
    }
    let lines: Vec<String> = conflicts
        .iter()
        .map(|c| format!("{} on {}", c.signal, c.pins.join(", ")))
        .collect();
    format!("Error: Duplicate EXTI signal found ({})", lines.join("; "))
}

fn write_header(sheet: &mut Worksheet, row: u32, headers: &[&str]) -> Result<(), XlsxError> {
    let format = cell(Some(HEADER_COLOR)).set_bold();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *header, &format)?;
    }
    Ok(())
}

fn write_pins(sheet: &mut Worksheet, report: &Report) -> Result<(), XlsxError> {
    sheet.set_name(PINS_SHEET)?;
    let headers = pin_headers(report.pins);
    let last_col = headers.len() as u16 - 1;

    let status = cell(Some(if report.exti_conflicts.is_empty() {
        OK_COLOR
    } else {
        ERROR_COLOR
    }));
    sheet.write_string_with_format(0, 0, exti_status(report.exti_conflicts), &status)?;
    for col in 1..=last_col {
        sheet.write_blank(0, col, &status)?;
    }

    let plain = cell(None);
    let info = [
        format!("MCU: {}", report.mcu.name),
        format!("CPN: {}", report.mcu.cpn),
        format!("Footprint: {}", report.mcu.package),
    ];
    for (col, text) in info.iter().enumerate() {
        sheet.write_string_with_format(1, col as u16, text, &plain)?;
    }

    write_header(sheet, HEADER_ROW, &headers)?;

    let mismatch = cell(Some(MISMATCH_COLOR));
    for (i, row) in report.pins.rows.iter().enumerate() {
        let r = HEADER_ROW + 1 + i as u32;
        let format = if row.mismatch { &mismatch } else { &plain };
        let pin = row.pin;
        let mut values = vec![
            pin.pin_name.as_str(),
            pin.function.as_deref().unwrap_or_default(),
            pin.signal.as_deref().unwrap_or_default(),
            pin.label.as_deref().unwrap_or_default(),
            pin.mode.as_deref().unwrap_or_default(),
        ];
        if report.pins.has_schematic {
            values.push(row.schematic_name.as_deref().unwrap_or_default());
            if report.pins.has_net_labels {
                values.push(row.net_label.as_deref().unwrap_or_default());
            }
        }

        sheet.write_number_with_format(r, 0, pin.pin_number as f64, format)?;
        for (col, value) in values.into_iter().enumerate() {
            sheet.write_string_with_format(r, col as u16 + 1, value, format)?;
        }
    }

    sheet.autofit();
    sheet.set_freeze_panes(HEADER_ROW + 1, 0)?;
    Ok(())
}

fn write_peripherals(
    sheet: &mut Worksheet,
    peripherals: &[PeripheralRecord],
) -> Result<(), XlsxError> {
    sheet.set_name(PERIPHERALS_SHEET)?;
    write_header(sheet, 0, &PERIPHERAL_COLUMNS)?;
    let plain = cell(None);
    for (i, p) in peripherals.iter().enumerate() {
        let values = [
            &p.peripheral,
            &p.mode,
            &p.channel,
            &p.baud_rate_prescaler,
            &p.calculated_baud_rate,
        ];
        for (col, value) in values.into_iter().enumerate() {
            sheet.write_string_with_format(i as u32 + 1, col as u16, value, &plain)?;
        }
    }
    sheet.autofit();
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Writes `report` to `path`, replacing any existing file.
pub fn write(path: &Path, report: &Report) -> Result<(), Error> {
    let mut workbook = Workbook::new();
    write_pins(workbook.add_worksheet(), report)?;
    if !report.peripherals.is_empty() {
        write_peripherals(workbook.add_worksheet(), report.peripherals)?;
    }
    workbook.save(path)?;
    info!(
        "wrote {} pin rows to {}",
        report.pins.rows.len(),
        path.display()
    );
    Ok(())
}

fn text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_owned(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string().trim().to_owned(),
    }
}

/// Reads `PinName -> name` from the first sheet of a report: the `Label`
/// column when filled, else `Signal`.
///
/// The header row is the first one holding both `PinName` and `Signal`,
/// compared case-insensitively.
pub fn read_signal_map(path: &Path) -> Result<BTreeMap<String, String>, Error> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(Error::MissingHeader(path.to_owned(), "PinName and Signal")),
    };

    let mut rows = range.rows();
    let columns = rows.by_ref().find_map(|row| {
        let headers: Vec<String> = row.iter().map(|c| text(c).to_lowercase()).collect();
        let position = |name: &str| headers.iter().position(|h| h == name);
        Some((position("pinname")?, position("signal")?, position("label")))
    });
    let Some((name_col, signal_col, label_col)) = columns else {
        return Err(Error::MissingHeader(path.to_owned(), "PinName and Signal"));
    };

    let mut map = BTreeMap::new();
    for row in rows {
        let get = |col: usize| row.get(col).map(text).unwrap_or_default();
        let pin = get(name_col);
        if pin.is_empty() {
            continue;
        }
        let label = label_col.map(get).unwrap_or_default();
        let value = if label.is_empty() { get(signal_col) } else { label };
        debug!("{} -> {}", pin, value);
        map.insert(pin, value);
    }
    info!("read {} pin names from {}", map.len(), path.display());
    Ok(map)
}
