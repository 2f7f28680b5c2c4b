//! Pipeline configuration
//!
//! Loaded from a TOML file and/or assembled by the command line:
//!
//! ```toml
//! ioc = "board.ioc"
//! output = "board_pins.xlsx"
//! match_by = "name"
//! schematic_name = "label"
//!
//! [kicad]
//! schematic = "board.kicad_sch"
//! library = "mcu.kicad_sym"
//! unit = 1
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Which field joins `.ioc` pins to schematic pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchBy {
    /// `Mcu.PinN` index against the symbol pin number
    #[default]
    Number,
    /// Port pin (`PA0`) against the port prefix of the symbol pin name
    Name,
}

/// Which schematic text is compared with the `.ioc` name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchematicName {
    /// Pin name declared in the symbol
    #[default]
    Pin,
    /// Net label wired to the pin, falling back to the declared name
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KicadConfig {
    pub schematic: Option<PathBuf>,
    pub library: Option<PathBuf>,
    /// Symbol unit to read pins from, starting at 1
    pub unit: u32,
    /// `Lib:Entry` or entry name; chosen from the schematic when unset
    pub symbol: Option<String>,
}

impl Default for KicadConfig {
    fn default() -> Self {
        Self {
            schematic: None,
            library: None,
            unit: 1,
            symbol: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub ioc: PathBuf,
    /// Defaults to the `.ioc` path with an `.xlsx` extension
    pub output: Option<PathBuf>,
    pub match_by: MatchBy,
    pub schematic_name: SchematicName,
    /// Write the `Peripherals` sheet
    pub peripherals: bool,
    pub kicad: Option<KicadConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ioc: PathBuf::new(),
            output: None,
            match_by: MatchBy::default(),
            schematic_name: SchematicName::default(),
            peripherals: true,
            kicad: None,
        }
    }
}

impl Config {
    /// Reads a TOML config. Relative paths are taken relative to the file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(Error::io(path))?;
        let mut config: Config = toml::from_str(&text)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        fn join(base: &Path, path: &mut PathBuf) {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = base.join(&*path);
            }
        }
        join(base, &mut self.ioc);
        if let Some(output) = self.output.as_mut() {
            join(base, output);
        }
        if let Some(kicad) = self.kicad.as_mut() {
            for path in [kicad.schematic.as_mut(), kicad.library.as_mut()]
                .into_iter()
                .flatten()
            {
                join(base, path);
            }
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.ioc.with_extension("xlsx"))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.ioc.as_os_str().is_empty() {
            return Err(Error::Config("no .ioc file given".to_owned()));
        }
        if let Some(kicad) = &self.kicad {
            if kicad.schematic.is_none() && kicad.library.is_none() {
                return Err(Error::Config(
                    "[kicad] needs a schematic or a library".to_owned(),
                ));
            }
            if kicad.unit == 0 {
                return Err(Error::Config("symbol units start at 1".to_owned()));
            }
        }
        if self.output_path() == self.ioc {
            return Err(Error::Config(
                "output would overwrite the .ioc file".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str(r#"ioc = "board.ioc""#).unwrap();
        assert_eq!(config.match_by, MatchBy::Number);
        assert_eq!(config.schematic_name, SchematicName::Pin);
        assert!(config.peripherals);
        assert!(config.kicad.is_none());
        assert_eq!(config.output_path(), PathBuf::from("board.xlsx"));
        config.validate().unwrap();
    }

    #[test]
    fn full_file() {
        let config: Config = toml::from_str(
            r#"
            ioc = "board.ioc"
            output = "out.xlsx"
            match_by = "name"
            schematic_name = "label"
            peripherals = false

            [kicad]
            library = "mcu.kicad_sym"
            unit = 2
            symbol = "MCU_ST:STM32F103C8Tx"
            "#,
        )
        .unwrap();
        assert_eq!(config.match_by, MatchBy::Name);
        assert_eq!(config.schematic_name, SchematicName::Label);
        let kicad = config.kicad.as_ref().unwrap();
        assert_eq!(kicad.unit, 2);
        assert_eq!(kicad.schematic, None);
        assert_eq!(config.output_path(), PathBuf::from("out.xlsx"));
        config.validate().unwrap();
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>(r#"iocc = "x""#).is_err());
    }

    #[test]
    fn invalid_configs() {
        assert!(Config::default().validate().is_err());

        let mut config = Config {
            ioc: "board.ioc".into(),
            kicad: Some(KicadConfig::default()),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.kicad = Some(KicadConfig {
            library: Some("mcu.kicad_sym".into()),
            unit: 0,
            ..KicadConfig::default()
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinout.toml");
        std::fs::write(
            &path,
            concat!(
                "ioc = \"board.ioc\"\n",
                "[kicad]\n",
                "schematic = \"/abs/board.kicad_sch\"\n",
                "library = \"lib/mcu.kicad_sym\"\n",
            ),
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.ioc, dir.path().join("board.ioc"));
        let kicad = config.kicad.unwrap();
        assert_eq!(kicad.schematic, Some(PathBuf::from("/abs/board.kicad_sch")));
        assert_eq!(kicad.library, Some(dir.path().join("lib/mcu.kicad_sym")));
    }
}
