//! Project library tables (`sym-lib-table`, `fp-lib-table`).
//!
//! A project registers each library it uses as a `(lib ...)` entry:
//!
//! ```text
//! (sym_lib_table
//!   (version 7)
//!   (lib (name "lib_passives")(type "KiCad")(uri "${KIPRJMOD}/lib/lib_sym/lib_passives.kicad_sym")(options "")(descr ""))
//! )
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use super::sexpr::{self, Expr};
use super::{KicadError, KicadResult};

/// Table format version written into new tables.
pub const TABLE_VERSION: u32 = 7;

/// Which of the two project tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Symbol library table.
    Symbol,
    /// Footprint library table.
    Footprint,
}

impl TableKind {
    /// File name of the table inside a project directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Symbol => "sym-lib-table",
            Self::Footprint => "fp-lib-table",
        }
    }

    /// Head token of the table expression.
    #[must_use]
    pub const fn head(self) -> &'static str {
        match self {
            Self::Symbol => "sym_lib_table",
            Self::Footprint => "fp_lib_table",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol => write!(f, "symbol"),
            Self::Footprint => write!(f, "footprint"),
        }
    }
}

/// A library registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibTableEntry {
    /// Nickname the design tool uses for the library.
    pub name: String,
    /// Location, usually `${KIPRJMOD}/...`.
    pub uri: String,
    /// Free-form description.
    pub descr: String,
}

impl LibTableEntry {
    /// Renders the entry as a single-line `(lib ...)` expression.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "(lib (name {})(type \"KiCad\")(uri {})(options \"\")(descr {}))",
            sexpr::quote(&self.name),
            sexpr::quote(&self.uri),
            sexpr::quote(&self.descr)
        )
    }
}

/// A library table held as text.
#[derive(Debug, Clone)]
pub struct LibTable {
    kind: TableKind,
    text: String,
}

impl LibTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            text: format!("({}\n  (version {TABLE_VERSION})\n)\n", kind.head()),
        }
    }

    /// Parses table text. Blank text yields an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is the wrong table type or unbalanced.
    pub fn parse(kind: TableKind, text: impl Into<String>) -> KicadResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Ok(Self::new(kind));
        }
        let table = Self { kind, text };
        table.root()?;
        Ok(table)
    }

    /// Path of this kind of table inside `project_dir`.
    #[must_use]
    pub fn path_in(kind: TableKind, project_dir: &Path) -> PathBuf {
        project_dir.join(kind.file_name())
    }

    /// Opens the table in `project_dir`, or starts an empty one if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing table cannot be read or parsed.
    pub fn open_or_new(kind: TableKind, project_dir: &Path) -> KicadResult<Self> {
        let path = Self::path_in(kind, project_dir);
        if !path.exists() {
            return Ok(Self::new(kind));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| KicadError::file_read(&path, e))?;
        Self::parse(kind, text)
    }

    /// Returns the table text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the names of all registered libraries.
    ///
    /// # Errors
    ///
    /// Returns an error if the table text is malformed.
    pub fn names(&self) -> KicadResult<Vec<String>> {
        let root = self.root()?;
        let mut names = Vec::new();
        for lib in sexpr::children(&self.text, &root)?
            .iter()
            .filter(|e| e.head == "lib")
        {
            let name = sexpr::children(&self.text, lib)?
                .iter()
                .find(|e| e.head == "name")
                .and_then(|e| sexpr::name(&self.text, e));
            if let Some(name) = name {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Adds an entry unless a library with the same name is registered.
    ///
    /// Returns `true` if the entry was added.
    ///
    /// # Errors
    ///
    /// Returns an error if the table text is malformed.
    pub fn add(&mut self, entry: &LibTableEntry) -> KicadResult<bool> {
        if self.names()?.iter().any(|n| *n == entry.name) {
            return Ok(false);
        }
        let root = self.root()?;
        sexpr::append_child(&mut self.text, &root, &entry.render());
        Ok(true)
    }

    fn root(&self) -> KicadResult<Expr> {
        let root = sexpr::root(&self.text)?;
        if root.head != self.kind.head() {
            return Err(KicadError::wrong_root(self.kind.head(), root.head));
        }
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> LibTableEntry {
        LibTableEntry {
            name: name.to_string(),
            uri: format!("${{KIPRJMOD}}/lib/lib_sym/{name}.kicad_sym"),
            descr: String::new(),
        }
    }

    #[test]
    fn new_table_is_valid() {
        let table = LibTable::new(TableKind::Footprint);
        assert!(table.as_str().starts_with("(fp_lib_table"));
        assert!(table.names().unwrap().is_empty());
    }

    #[test]
    fn add_is_idempotent() {
        let mut table = LibTable::new(TableKind::Symbol);
        assert!(table.add(&entry("lib_passives")).unwrap());
        assert!(!table.add(&entry("lib_passives")).unwrap());
        assert!(table.add(&entry("lib_power")).unwrap());
        assert_eq!(table.names().unwrap(), ["lib_passives", "lib_power"]);
    }

    #[test]
    fn add_preserves_existing_entries() {
        let existing = "(sym_lib_table\n  (version 7)\n  (lib (name \"Device\")(type \"KiCad\")(uri \"${KICAD8_SYMBOL_DIR}/Device.kicad_sym\")(options \"\")(descr \"\"))\n)\n";
        let mut table = LibTable::parse(TableKind::Symbol, existing).unwrap();
        table.add(&entry("lib_rf")).unwrap();

        assert!(table.as_str().contains("${KICAD8_SYMBOL_DIR}/Device.kicad_sym"));
        assert_eq!(table.names().unwrap(), ["Device", "lib_rf"]);
        assert!(table.as_str().trim_end().ends_with(')'));
    }

    #[test]
    fn wrong_table_kind_rejected() {
        let err = LibTable::parse(TableKind::Footprint, "(sym_lib_table (version 7))").unwrap_err();
        assert!(matches!(err, KicadError::WrongRoot { .. }));
    }

    #[test]
    fn render_escapes_description() {
        let e = LibTableEntry {
            name: "lib_audio".to_string(),
            uri: "${KIPRJMOD}/x".to_string(),
            descr: "Speakers \"and\" buzzers".to_string(),
        };
        assert!(e.render().contains(r#"(descr "Speakers \"and\" buzzers")"#));
    }
}
