use std::borrow::Cow;

use tracing::warn;

use crate::error::ParseError;

use super::raw;

/// Unit and body style decoded from a `<entry>_<unit>_<style>` sub-symbol name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitId {
    pub unit: u32,
    pub style: u32,
}

/// A library pin with a numeric pin number
#[derive(Debug, Clone, PartialEq)]
pub struct LibPin<'a> {
    pub number: u32,
    pub name: Cow<'a, str>,
    pub at: raw::Position,
    pub unit: u32,
}

/// `Lib:Entry` -> `Entry`
pub fn entry_name(id: &str) -> &str {
    id.rsplit(':').next().unwrap_or(id)
}

pub fn pin_number(num: &str) -> Result<u32, ParseError> {
    num.trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber(num.to_owned()))
}

impl TryFrom<&raw::Unit<'_>> for UnitId {
    type Error = ParseError;

    fn try_from(value: &raw::Unit<'_>) -> Result<Self, Self::Error> {
        let mut parts = value.name.rsplitn(3, '_');
        let style = parts.next();
        let unit = parts.next();
        match (unit, style, parts.next()) {
            (Some(unit), Some(style), Some(_)) => Ok(UnitId {
                unit: pin_number(unit)?,
                style: pin_number(style)?,
            }),
            _ => Err(ParseError::InvalidNumber(value.name.to_owned())),
        }
    }
}

impl<'a> raw::Library<'a> {
    /// Looks a symbol up by full `Lib:Entry` id or by entry name.
    pub fn find(&self, name: &str) -> Option<&raw::Symbol<'a>> {
        self.symbols
            .iter()
            .find(|s| s.name == name)
            .or_else(|| {
                self.symbols
                    .iter()
                    .find(|s| entry_name(s.name) == entry_name(name))
            })
    }

    /// Pins of `unit` of the named symbol, following `extends` to the parent
    /// definition. `None` when the symbol or unit does not exist.
    pub fn unit_pins(&self, name: &str, unit: u32) -> Option<Vec<LibPin<'a>>> {
        let mut symbol = self.find(name)?;
        let mut depth = 0;
        while let Some(parent) = symbol.extends {
            depth += 1;
            if depth > self.symbols.len() {
                warn!("symbol {} extends itself", name);
                return None;
            }
            symbol = self.find(parent)?;
        }

        let mut found_unit = false;
        let mut only_shared = true;
        let mut pins = Vec::new();
        for sub in &symbol.units {
            let id = match UnitId::try_from(sub) {
                Ok(id) => id,
                Err(e) => {
                    warn!("ignoring sub-symbol {}: {}", sub.name, e);
                    continue;
                }
            };
            only_shared &= id.unit == 0;
            // Unit 0 holds what all units share.
            if id.unit != unit && id.unit != 0 {
                continue;
            }
            found_unit |= id.unit == unit;
            for pin in &sub.pins {
                match pin_number(pin.num) {
                    Ok(number) if !pins.iter().any(|p: &LibPin| p.number == number) => {
                        pins.push(LibPin {
                            number,
                            name: pin.name.clone(),
                            at: pin.at,
                            unit,
                        })
                    }
                    Ok(number) => warn!("pin {} repeated in unit {}", number, unit),
                    Err(_) => warn!("skipping pin {} ({}): not a number", pin.num, pin.name),
                }
            }
        }
        // A symbol drawn entirely in unit 0 has a single unit.
        let single_unit = only_shared && unit == 1 && !pins.is_empty();
        (found_unit || single_unit).then_some(pins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::SExpr;
    use rstest::*;

    #[rstest]
    #[case("STM32_TEST_1_1", 1, 1)]
    #[case("STM32_TEST_0_1", 0, 1)]
    #[case("LED_12_2", 12, 2)]
    fn unit_ids(#[case] name: &str, #[case] unit: u32, #[case] style: u32) {
        let sub = raw::Unit { name, pins: vec![] };
        assert_eq!(UnitId::try_from(&sub).unwrap(), UnitId { unit, style });
    }

    #[rstest]
    #[case("LED")]
    #[case("LED_A_1")]
    fn bad_unit_ids(#[case] name: &str) {
        let sub = raw::Unit { name, pins: vec![] };
        assert!(UnitId::try_from(&sub).is_err());
    }

    const LIBRARY: &str = r#"(kicad_symbol_lib
        (symbol "BASE"
            (symbol "BASE_0_1" (rectangle (start -5 5) (end 5 -5)))
            (symbol "BASE_1_1"
                (pin input line (at -7.62 2.54 0) (length 2.54)
                    (name "A" (effects)) (number "1" (effects)))
                (pin input line (at -7.62 0 0) (length 2.54)
                    (name "B" (effects)) (number "2" (effects)))
                (pin power_in line (at 0 -7.62 90) (length 2.54)
                    (name "GND" (effects)) (number "EP" (effects))))
            (symbol "BASE_2_1"
                (pin output line (at 7.62 0 180) (length 2.54)
                    (name "Y" (effects)) (number "3" (effects)))))
        (symbol "DERIVED" (extends "BASE"))
        (symbol "LOOP" (extends "LOOP"))
        (symbol "OPAMP"
            (symbol "OPAMP_0_1"
                (pin power_in line (at 0 7.62 270) (length 2.54)
                    (name "V+" (effects)) (number "8" (effects))))
            (symbol "OPAMP_1_1"
                (pin input line (at -7.62 2.54 0) (length 2.54)
                    (name "+" (effects)) (number "3" (effects))))
            (symbol "OPAMP_2_1"
                (pin input line (at -7.62 2.54 0) (length 2.54)
                    (name "+" (effects)) (number "5" (effects)))))
        (symbol "POWER_ONLY"
            (symbol "POWER_ONLY_0_1"
                (pin power_in line (at 0 0 0) (length 2.54)
                    (name "VCC" (effects)) (number "1" (effects))))))"#;

    #[test]
    fn unit_pins_by_unit() {
        let sexpr = SExpr::try_from(LIBRARY).unwrap();
        let library = raw::Library::try_from(&sexpr).unwrap();

        let pins = library.unit_pins("BASE", 1).unwrap();
        let numbers: Vec<(u32, &str)> = pins.iter().map(|p| (p.number, &*p.name)).collect();
        assert_eq!(numbers, vec![(1, "A"), (2, "B")]);

        let pins = library.unit_pins("Lib:BASE", 2).unwrap();
        assert_eq!(pins[0].name, "Y");
        assert_eq!(pins[0].unit, 2);

        assert!(library.unit_pins("BASE", 3).is_none());
        assert!(library.unit_pins("MISSING", 1).is_none());
    }

    #[rstest]
    #[case(1, vec![(8, 1), (3, 1)])]
    #[case(2, vec![(8, 2), (5, 2)])]
    fn shared_pins_belong_to_every_unit(#[case] unit: u32, #[case] expected: Vec<(u32, u32)>) {
        let sexpr = SExpr::try_from(LIBRARY).unwrap();
        let library = raw::Library::try_from(&sexpr).unwrap();
        let pins = library.unit_pins("OPAMP", unit).unwrap();
        let numbers: Vec<(u32, u32)> = pins.iter().map(|p| (p.number, p.unit)).collect();
        assert_eq!(numbers, expected);
        assert!(library.unit_pins("OPAMP", 3).is_none());
    }

    #[test]
    fn symbol_with_only_shared_pins() {
        let sexpr = SExpr::try_from(LIBRARY).unwrap();
        let library = raw::Library::try_from(&sexpr).unwrap();
        let pins = library.unit_pins("POWER_ONLY", 1).unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].name, "VCC");
        assert!(library.unit_pins("POWER_ONLY", 2).is_none());
    }

    #[test]
    fn derived_symbols_use_parent_pins() {
        let sexpr = SExpr::try_from(LIBRARY).unwrap();
        let library = raw::Library::try_from(&sexpr).unwrap();
        assert_eq!(library.unit_pins("DERIVED", 1).unwrap().len(), 2);
        assert!(library.unit_pins("LOOP", 1).is_none());
    }
}
