use std::borrow::Cow;

use crate::{
    error::ParseError,
    sexpr::{unescape, SExpr},
};

/// A symbol library, either a `.kicad_sym` file or the `lib_symbols` block
/// of a schematic
#[derive(Debug, Clone, Default)]
pub struct Library<'a> {
    pub symbols: Vec<Symbol<'a>>,
}

/// A symbol definition
#[derive(Debug, Clone)]
pub struct Symbol<'a> {
    pub name: &'a str,
    pub extends: Option<&'a str>,
    pub units: Vec<Unit<'a>>,
}

/// A `<entry>_<unit>_<style>` sub-symbol
#[derive(Debug, Clone)]
pub struct Unit<'a> {
    pub name: &'a str,
    pub pins: Vec<Pin<'a>>,
}

/// A pin as declared in the library
#[derive(Debug, Clone)]
pub struct Pin<'a> {
    pub num: &'a str,
    pub name: Cow<'a, str>,
    pub at: Position,
}

/// `(at x y angle)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

/// The parts of a schematic sheet needed for pin tracing
#[derive(Debug, Clone, Default)]
pub struct Schematic<'a> {
    pub lib_symbols: Library<'a>,
    pub placed: Vec<Placed<'a>>,
    pub wires: Vec<Wire>,
    pub labels: Vec<Label<'a>>,
}

/// A symbol instance placed on the sheet
#[derive(Debug, Clone)]
pub struct Placed<'a> {
    pub lib_id: &'a str,
    pub at: Position,
    pub unit: &'a str,
    pub mirror: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Wire {
    pub pts: Vec<Position>,
}

/// A local, global or hierarchical net label
#[derive(Debug, Clone)]
pub struct Label<'a> {
    /// Text as written in the file, escapes included
    pub raw: &'a str,
    pub text: Cow<'a, str>,
    pub at: Position,
}

pub(crate) const LABEL_KINDS: [&str; 3] = ["label", "global_label", "hierarchical_label"];

impl<'a> TryFrom<&SExpr<'a>> for Position {
    type Error = ParseError;

    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        let angle = match value.arg(2) {
            Some(_) => value.float_arg(2)?,
            None => 0.0,
        };
        Ok(Position {
            x: value.float_arg(0)?,
            y: value.float_arg(1)?,
            angle,
        })
    }
}

impl<'a> TryFrom<&SExpr<'a>> for Pin<'a> {
    type Error = ParseError;

    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        let num = value.value("number")?;
        let name = unescape(value.value("name")?);
        let at = value.child("at")?.try_into()?;
        Ok(Pin { num, name, at })
    }
}

impl<'a> TryFrom<&SExpr<'a>> for Unit<'a> {
    type Error = ParseError;

    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        let name = value.arg(0).ok_or(ParseError::MissingValue())?;
        let pins = value
            .descendants("pin")
            .into_iter()
            .map(Pin::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Unit { name, pins })
    }
}

impl<'a> TryFrom<&SExpr<'a>> for Symbol<'a> {
    type Error = ParseError;

    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        let name = value.arg(0).ok_or(ParseError::MissingValue())?;
        let extends = value.value("extends").ok();
        let units = value
            .children("symbol")
            .map(Unit::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Symbol {
            name,
            extends,
            units,
        })
    }
}

impl<'a> TryFrom<&SExpr<'a>> for Library<'a> {
    type Error = ParseError;

    /// Accepts `kicad_symbol_lib` and `lib_symbols` nodes alike.
    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        let symbols = value
            .children("symbol")
            .map(Symbol::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Library { symbols })
    }
}

impl<'a> TryFrom<&SExpr<'a>> for Placed<'a> {
    type Error = ParseError;

    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        Ok(Placed {
            lib_id: value.value("lib_id")?,
            at: value.child("at")?.try_into()?,
            unit: value.value("unit").unwrap_or("1"),
            mirror: value.value("mirror").ok(),
        })
    }
}

impl<'a> TryFrom<&SExpr<'a>> for Wire {
    type Error = ParseError;

    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        let pts = value
            .child("pts")?
            .children("xy")
            .map(Position::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Wire { pts })
    }
}

impl<'a> TryFrom<&SExpr<'a>> for Label<'a> {
    type Error = ParseError;

    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        let raw = value.arg(0).ok_or(ParseError::MissingValue())?;
        let at = value.child("at")?.try_into()?;
        Ok(Label {
            raw,
            text: unescape(raw),
            at,
        })
    }
}

impl<'a> TryFrom<&SExpr<'a>> for Schematic<'a> {
    type Error = ParseError;

    fn try_from(value: &SExpr<'a>) -> Result<Self, Self::Error> {
        let lib_symbols = match value.child("lib_symbols") {
            Ok(lib_symbols) => lib_symbols.try_into()?,
            Err(_) => Library::default(),
        };
        let placed = value
            .children("symbol")
            .map(Placed::try_from)
            .collect::<Result<_, _>>()?;
        let wires = value
            .children("wire")
            .map(Wire::try_from)
            .collect::<Result<_, _>>()?;
        let mut labels = Vec::new();
        for kind in LABEL_KINDS {
            for label in value.children(kind) {
                labels.push(Label::try_from(label)?);
            }
        }
        Ok(Schematic {
            lib_symbols,
            placed,
            wires,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_fields() {
        let input = r#"(pin bidirectional line (at -12.7 5.08 0) (length 2.54)
            (name "PA0" (effects (font (size 1.27 1.27))))
            (number "10" (effects (font (size 1.27 1.27)))))"#;
        let sexpr = SExpr::try_from(input).unwrap();
        let pin = Pin::try_from(&sexpr).unwrap();
        assert_eq!(pin.num, "10");
        assert_eq!(pin.name, "PA0");
        assert_eq!(
            pin.at,
            Position {
                x: -12.7,
                y: 5.08,
                angle: 0.0
            }
        );
    }

    #[test]
    fn pin_without_number_is_an_error() {
        let sexpr = SExpr::try_from(r#"(pin input line (at 0 0 0) (name "X"))"#).unwrap();
        assert!(matches!(
            Pin::try_from(&sexpr),
            Err(ParseError::MissingChild(label)) if label == "number"
        ));
    }

    #[test]
    fn placed_symbol_defaults_to_unit_one() {
        let sexpr =
            SExpr::try_from(r#"(symbol (lib_id "Device:R") (at 10 20 90) (mirror y))"#).unwrap();
        let placed = Placed::try_from(&sexpr).unwrap();
        assert_eq!(placed.lib_id, "Device:R");
        assert_eq!(placed.unit, "1");
        assert_eq!(placed.at.angle, 90.0);
        assert_eq!(placed.mirror, Some("y"));
    }

    #[test]
    fn derived_symbol_records_parent() {
        let sexpr = SExpr::try_from(
            r#"(kicad_symbol_lib
                (symbol "CHILD" (extends "PARENT"))
                (symbol "PARENT" (symbol "PARENT_1_1")))"#,
        )
        .unwrap();
        let library = Library::try_from(&sexpr).unwrap();
        assert_eq!(library.symbols[0].extends, Some("PARENT"));
        assert!(library.symbols[0].units.is_empty());
        assert_eq!(library.symbols[1].units[0].name, "PARENT_1_1");
    }

    #[test]
    fn escaped_names_are_resolved() {
        let sexpr = SExpr::try_from(
            r#"(pin input line (at 0 0 0) (name "\"RST\"" (effects)) (number "7" (effects)))"#,
        )
        .unwrap();
        assert_eq!(Pin::try_from(&sexpr).unwrap().name, r#""RST""#);

        let sexpr = SExpr::try_from(r#"(label "A\\B \"C\"" (at 1 2 0))"#).unwrap();
        let label = Label::try_from(&sexpr).unwrap();
        assert_eq!(label.raw, r#"A\\B \"C\""#);
        assert_eq!(label.text, r#"A\B "C""#);
    }
}
