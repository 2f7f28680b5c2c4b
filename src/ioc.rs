//! CubeMX `.ioc` pin configuration reader

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::Error;

mod peripheral;
mod properties;

pub use peripheral::PeripheralRecord;
use properties::Property;

lazy_static! {
    /// `PA0`, `PC14-OSC32_IN (OSC32_IN)`, `PA13 (JTMS/SWDIO)`, `PA13(JTMS-SWDIO)`
    static ref PIN_KEY: Regex =
        Regex::new(r"^(P[A-Z]\d+)(?:-([^\s(]+))?\s*(?:\(([^)]*)\))?").unwrap();
}

/// One physical MCU pin as configured in CubeMX
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRecord {
    /// Index `N` of the `Mcu.PinN` entry
    pub pin_number: u32,
    /// Port pin, e.g. `PA0`
    pub pin_name: String,
    /// Alternate function encoded in the pin key, e.g. `OSC32_IN`
    pub function: Option<String>,
    pub signal: Option<String>,
    pub mode: Option<String>,
    /// `GPIO_Label`
    pub label: Option<String>,
}

impl PinRecord {
    /// The name this pin goes by: the user label, else the signal, else the
    /// port pin.
    pub fn ioc_name(&self) -> &str {
        self.label
            .as_deref()
            .or(self.signal.as_deref())
            .unwrap_or(&self.pin_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McuInfo {
    pub name: String,
    pub package: String,
    pub cpn: String,
}

/// An EXTI line routed to more than one pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtiConflict {
    pub signal: String,
    pub pins: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IocFile {
    pub mcu: McuInfo,
    /// Sorted by pin number
    pub pins: Vec<PinRecord>,
    pub peripherals: Vec<PeripheralRecord>,
}

impl IocFile {
    pub fn read(path: &Path) -> Result<Self, Error> {
        if path.extension().map_or(true, |ext| !ext.eq_ignore_ascii_case("ioc")) {
            warn!("{} does not have an .ioc extension", path.display());
        }
        let input = std::fs::read_to_string(path).map_err(Error::io(path))?;
        let ioc = Self::parse(&input);
        if ioc.pins.is_empty() {
            warn!("no pin entries found in {}", path.display());
        }
        info!(
            "read {} pins and {} peripherals from {}",
            ioc.pins.len(),
            ioc.peripherals.len(),
            path.display()
        );
        Ok(ioc)
    }

    pub fn parse(input: &str) -> Self {
        let properties = properties::parse(input);
        let mut mcu = McuInfo::default();
        let mut pins: BTreeMap<String, PinRecord> = BTreeMap::new();
        let mut numbers_seen: HashMap<u32, String> = HashMap::new();

        for Property { key, value } in &properties {
            match key.as_str() {
                "Mcu.Name" => mcu.name = value.clone(),
                "Mcu.Package" => mcu.package = value.clone(),
                "Mcu.CPN" => mcu.cpn = value.clone(),
                _ => {
                    let Some(number) = key
                        .strip_prefix("Mcu.Pin")
                        .and_then(|n| n.parse::<u32>().ok())
                    else {
                        continue;
                    };
                    let Some(record) = pin_record(number, value) else {
                        debug!("skipping non-port pin {}={}", key, value);
                        continue;
                    };
                    if pins.contains_key(value) {
                        warn!("pin {} declared more than once, keeping the first", value);
                        continue;
                    }
                    if let Some(previous) = numbers_seen.insert(number, value.clone()) {
                        pins.remove(&previous);
                    }
                    pins.insert(value.clone(), record);
                }
            }
        }

        for Property { key, value } in &properties {
            let Some((pin_key, attribute)) = key.rsplit_once('.') else {
                continue;
            };
            let Some(record) = pins.get_mut(pin_key) else {
                continue;
            };
            let slot = match attribute {
                "Signal" => &mut record.signal,
                "GPIO_Label" => &mut record.label,
                "Mode" => &mut record.mode,
                _ => continue,
            };
            if !value.is_empty() {
                *slot = Some(value.clone());
            }
        }

        let mut pins: Vec<PinRecord> = pins.into_values().collect();
        pins.sort_by_key(|pin| pin.pin_number);

        IocFile {
            mcu,
            pins,
            peripherals: peripheral::collect(&properties),
        }
    }

    /// EXTI lines (`GPXTIn` signals) assigned to more than one pin
    pub fn exti_conflicts(&self) -> Vec<ExtiConflict> {
        let mut lines: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for pin in &self.pins {
            if let Some(signal) = pin.signal.as_deref().filter(|s| s.starts_with("GPXTI")) {
                lines.entry(signal).or_default().push(pin.pin_name.clone());
            }
        }
        lines
            .into_iter()
            .filter(|(_, pins)| pins.len() > 1)
            .map(|(signal, pins)| ExtiConflict {
                signal: signal.to_owned(),
                pins,
            })
            .collect()
    }
}

fn pin_record(pin_number: u32, key: &str) -> Option<PinRecord> {
    let captures = PIN_KEY.captures(key)?;
    let function = captures
        .get(2)
        .or(captures.get(3))
        .map(|m| m.as_str().to_owned())
        .filter(|f| !f.is_empty());
    Some(PinRecord {
        pin_number,
        pin_name: captures[1].to_owned(),
        function,
        signal: None,
        mode: None,
        label: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    macro_rules! test_data {
        ($fname:expr) => {
            std::fs::read_to_string(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/resources/test/",
                $fname
            ))
            .unwrap()
        };
    }

    fn pin<'a>(ioc: &'a IocFile, name: &str) -> &'a PinRecord {
        ioc.pins.iter().find(|p| p.pin_name == name).unwrap()
    }

    #[rstest]
    #[case("PA0", "PA0", None)]
    #[case("PC14-OSC32_IN (OSC32_IN)", "PC14", Some("OSC32_IN"))]
    #[case("PH0-OSC_IN (PH0)", "PH0", Some("OSC_IN"))]
    #[case("PA13 (JTMS/SWDIO)", "PA13", Some("JTMS/SWDIO"))]
    #[case("PA13(JTMS-SWDIO)", "PA13", Some("JTMS-SWDIO"))]
    fn pin_keys(#[case] key: &str, #[case] name: &str, #[case] function: Option<&str>) {
        let record = pin_record(3, key).unwrap();
        assert_eq!(record.pin_number, 3);
        assert_eq!(record.pin_name, name);
        assert_eq!(record.function.as_deref(), function);
    }

    #[rstest]
    #[case("VP_SYS_VS_Systick")]
    #[case("VDD")]
    #[case("PDR_ON")]
    fn non_port_keys(#[case] key: &str) {
        assert!(pin_record(0, key).is_none());
    }

    #[test]
    fn reads_sample_file() {
        let ioc = IocFile::parse(&test_data!("board.ioc"));
        assert_eq!(ioc.mcu.name, "STM32F103C(8-B)Tx");
        assert_eq!(ioc.mcu.package, "LQFP48");
        assert_eq!(ioc.mcu.cpn, "STM32F103C8T6");

        let numbers: Vec<u32> = ioc.pins.iter().map(|p| p.pin_number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let led = pin(&ioc, "PA0");
        assert_eq!(led.signal.as_deref(), Some("GPIO_Output"));
        assert_eq!(led.label.as_deref(), Some("LED1"));
        assert_eq!(led.ioc_name(), "LED1");

        let osc = pin(&ioc, "PD0");
        assert_eq!(osc.function.as_deref(), Some("OSC_IN"));
        assert_eq!(osc.signal.as_deref(), Some("RCC_OSC_IN"));
        assert_eq!(osc.mode.as_deref(), Some("HSE-External-Oscillator"));

        let swd = pin(&ioc, "PA13");
        assert_eq!(swd.function.as_deref(), Some("JTMS-SWDIO"));
        assert_eq!(swd.signal.as_deref(), Some("SYS_JTMS-SWDIO"));

        assert!(ioc.pins.iter().all(|p| !p.pin_name.starts_with("VP")));
        assert!(!ioc.peripherals.is_empty());
    }

    #[test]
    fn attribute_order_does_not_matter() {
        let input = "PA5.GPIO_Label=BUTTON\nPA5.Signal=GPXTI5\nMcu.Pin0=PA5\nPA5.Locked=true\n";
        let ioc = IocFile::parse(input);
        assert_eq!(ioc.pins.len(), 1);
        assert_eq!(ioc.pins[0].label.as_deref(), Some("BUTTON"));
        assert_eq!(ioc.pins[0].signal.as_deref(), Some("GPXTI5"));
    }

    #[test]
    fn each_pin_identifier_appears_once() {
        let input = "Mcu.Pin0=PA0\nMcu.Pin1=PA1\nMcu.Pin2=PA0\nMcu.PinsNb=3\n";
        let ioc = IocFile::parse(input);
        let names: Vec<&str> = ioc.pins.iter().map(|p| p.pin_name.as_str()).collect();
        assert_eq!(names, vec!["PA0", "PA1"]);
    }

    #[test]
    fn ioc_name_falls_back_to_signal_then_pin() {
        let ioc = IocFile::parse("Mcu.Pin0=PB6\nMcu.Pin1=PB7\nPB6.Signal=I2C1_SCL\n");
        assert_eq!(ioc.pins[0].ioc_name(), "I2C1_SCL");
        assert_eq!(ioc.pins[1].ioc_name(), "PB7");
    }

    #[test]
    fn empty_input_has_no_pins() {
        let ioc = IocFile::parse("#MicroXplorer Configuration settings - do not modify\n");
        assert!(ioc.pins.is_empty());
        assert_eq!(ioc.mcu, McuInfo::default());
    }

    #[test]
    fn detects_exti_conflicts() {
        let input = "\
Mcu.Pin0=PA1
Mcu.Pin1=PB1
Mcu.Pin2=PC13
Mcu.Pin3=PB10
PA1.Signal=GPXTI1
PB1.Signal=GPXTI1
PC13.Signal=GPXTI13
PB10.Signal=GPXTI10
";
        let ioc = IocFile::parse(input);
        assert_eq!(
            ioc.exti_conflicts(),
            vec![ExtiConflict {
                signal: "GPXTI1".to_owned(),
                pins: vec!["PA1".to_owned(), "PB1".to_owned()],
            }]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = IocFile::read(Path::new("/nonexistent/board.ioc")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
