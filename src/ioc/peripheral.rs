use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::properties::Property;

lazy_static! {
    static ref PERIPHERAL_KEY: Regex = Regex::new(concat!(
        r"^(UART\d*|USART\d*|I2C\d*|SPI\d*|TIM\d*|CAN\d*|I2S\d*|SDIO\d*|SDMMC\d*|USB\d*",
        r"|RCC.*|SYS.*)\.([\w\- ]+)$"
    ))
    .unwrap();
    static ref SHARED_KEY: Regex = Regex::new(r"^SH\.\S+\.(\d+)$").unwrap();
}

/// Summary of one configured peripheral.
///
/// Every field holds the distinct values seen for that peripheral, sorted and
/// joined with `-`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeripheralRecord {
    pub peripheral: String,
    pub mode: String,
    pub channel: String,
    pub baud_rate_prescaler: String,
    pub calculated_baud_rate: String,
}

#[derive(Default)]
struct Fields {
    mode: BTreeSet<String>,
    channel: BTreeSet<String>,
    baud_rate_prescaler: BTreeSet<String>,
    calculated_baud_rate: BTreeSet<String>,
}

impl Fields {
    fn is_empty(&self) -> bool {
        self.mode.is_empty()
            && self.channel.is_empty()
            && self.baud_rate_prescaler.is_empty()
            && self.calculated_baud_rate.is_empty()
    }
}

fn join(values: BTreeSet<String>) -> String {
    values.into_iter().collect::<Vec<_>>().join("-")
}

pub(super) fn collect(properties: &[Property]) -> Vec<PeripheralRecord> {
    let mut peripherals: BTreeMap<String, Fields> = BTreeMap::new();

    for Property { key, value } in properties {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if let Some(captures) = SHARED_KEY.captures(key) {
            debug!("shared signal {} -> {}", &captures[0], value);
            let channel = value.split(',').next().unwrap_or(value);
            let peripheral = channel.split('_').next().unwrap_or(channel);
            peripherals
                .entry(peripheral.to_owned())
                .or_default()
                .channel
                .insert(channel.to_owned());
            continue;
        }

        let Some(captures) = PERIPHERAL_KEY.captures(key) else {
            continue;
        };
        let param = &captures[2];
        let fields = peripherals.entry(captures[1].to_owned()).or_default();
        let slot = match param {
            "Mode" | "VirtualType" | "VirtualMode" | "VirtualMode-Asynchronous" => &mut fields.mode,
            "BaudRatePrescaler" => &mut fields.baud_rate_prescaler,
            "CalculateBaudRate" | "CalculatedBaudRate" => &mut fields.calculated_baud_rate,
            p if p.starts_with("Channel-") => &mut fields.channel,
            _ => continue,
        };
        slot.insert(value.to_owned());
    }

    peripherals
        .into_iter()
        .filter(|(_, fields)| !fields.is_empty())
        .map(|(peripheral, fields)| PeripheralRecord {
            peripheral,
            mode: join(fields.mode),
            channel: join(fields.channel),
            baud_rate_prescaler: join(fields.baud_rate_prescaler),
            calculated_baud_rate: join(fields.calculated_baud_rate),
        })
        .collect()
}
