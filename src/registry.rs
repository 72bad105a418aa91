//! Component categories.
//!
//! The library is split into a fixed set of categories. Each category owns one
//! symbol library (`lib_<key>.kicad_sym`) and one footprint directory
//! (`lib_<key>.pretty`). The registry is an ordinary value handed to whatever
//! needs it; tests build reduced registries with [`CategoryRegistry::new`].

use std::fmt;

use crate::error::ConfigError;

/// The standard categories: key, display name, description.
const STANDARD_CATEGORIES: [(&str, &str, &str); 15] = [
    (
        "connectors",
        "Connectors",
        "Headers, sockets, terminals, USB, edge connectors",
    ),
    (
        "passives",
        "Passives",
        "Resistors, capacitors, inductors, ferrite beads",
    ),
    (
        "discretes",
        "Discretes",
        "Diodes, transistors (BJT, MOSFET, JFET)",
    ),
    (
        "ics",
        "ICs",
        "Op-amps, comparators, logic, analog switches, ADC/DAC",
    ),
    (
        "power",
        "Power",
        "LDOs, DC-DC, battery chargers, power switches, PD",
    ),
    (
        "microcontrollers",
        "Microcontrollers",
        "MCUs, SoCs, FPGAs, processors",
    ),
    (
        "memory",
        "Memory",
        "Flash, EEPROM, SRAM, SD card interfaces",
    ),
    ("rf", "RF", "RF modules, antennas, BLE, WiFi, LoRa"),
    (
        "sensors",
        "Sensors",
        "Temperature, light, motion, pressure, IMU",
    ),
    (
        "optoelectronics",
        "Optoelectronics",
        "LEDs, displays, optocouplers, photodiodes, IR",
    ),
    (
        "electromechanical",
        "Electromechanical",
        "Switches, relays, buttons, encoders, motors",
    ),
    ("protection", "Protection", "TVS, ESD, fuses, PTC, MOVs"),
    (
        "audio",
        "Audio",
        "Speakers, buzzers, microphones, audio codecs",
    ),
    (
        "crystals_oscillators",
        "Crystals/Oscillators",
        "Crystals, oscillators, resonators, TCXO",
    ),
    (
        "mechanical",
        "Mechanical",
        "Standoffs, heatsinks, mounting hardware, test points",
    ),
];

/// A destination category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// 1-based position in the registry.
    pub index: usize,
    /// Stable identifier used in file names (`snake_case`).
    pub key: String,
    /// Display name.
    pub name: String,
    /// What belongs in this category.
    pub description: String,
}

impl Category {
    /// Library nickname, e.g. `lib_passives`.
    #[must_use]
    pub fn library_name(&self) -> String {
        format!("lib_{}", self.key)
    }

    /// File name of the category's symbol library.
    #[must_use]
    pub fn symbol_file_name(&self) -> String {
        format!("{}.kicad_sym", self.library_name())
    }

    /// Directory name of the category's footprint library.
    #[must_use]
    pub fn footprint_dir_name(&self) -> String {
        format!("{}.pretty", self.library_name())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Ordered, immutable set of categories.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
}

impl CategoryRegistry {
    /// The 15 standard categories.
    #[must_use]
    pub fn standard() -> Self {
        let categories = STANDARD_CATEGORIES
            .iter()
            .enumerate()
            .map(|(i, (key, name, description))| Category {
                index: i + 1,
                key: (*key).to_string(),
                name: (*name).to_string(),
                description: (*description).to_string(),
            })
            .collect();
        Self { categories }
    }

    /// Builds a registry from `(key, name, description)` entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, a key is not `snake_case`, or
    /// a key or name repeats.
    pub fn new<K, N, D>(entries: impl IntoIterator<Item = (K, N, D)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        N: Into<String>,
        D: Into<String>,
    {
        let mut categories: Vec<Category> = Vec::new();

        for (i, (key, name, description)) in entries.into_iter().enumerate() {
            let category = Category {
                index: i + 1,
                key: key.into(),
                name: name.into(),
                description: description.into(),
            };

            let valid_key = !category.key.is_empty()
                && category
                    .key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !valid_key {
                return Err(ConfigError::ValidationError {
                    message: format!("category key '{}' must be snake_case", category.key),
                });
            }
            if categories
                .iter()
                .any(|c| c.key == category.key || c.name == category.name)
            {
                return Err(ConfigError::ValidationError {
                    message: format!("duplicate category '{}'", category.key),
                });
            }
            categories.push(category);
        }

        if categories.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "at least one category is required".to_string(),
            });
        }

        Ok(Self { categories })
    }

    /// Returns the category at a 1-based index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Category> {
        index
            .checked_sub(1)
            .and_then(|i| self.categories.get(i))
    }

    /// Finds a category by key.
    ///
    /// Case-insensitive; `-`, `/` and spaces are read as `_`, so
    /// `"Crystals Oscillators"` finds `crystals_oscillators`.
    #[must_use]
    pub fn by_key(&self, key: &str) -> Option<&Category> {
        let wanted = normalise_key(key);
        self.categories
            .iter()
            .find(|c| c.key == wanted || normalise_key(&c.name) == wanted)
    }

    /// Resolves user input that is either a 1-based index or a key.
    #[must_use]
    pub fn resolve(&self, input: &str) -> Option<&Category> {
        let input = input.trim();
        match input.parse::<usize>() {
            Ok(index) => self.get(index),
            Err(_) => self.by_key(input),
        }
    }

    /// Iterates over categories in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Number of categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// True if the registry holds no categories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Comma-separated list of keys, for error messages.
    #[must_use]
    pub fn keys(&self) -> String {
        self.categories
            .iter()
            .map(|c| c.key.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn normalise_key(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' | '/' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
