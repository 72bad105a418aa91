//! Symbol library (`.kicad_sym`) handling.
//!
//! A symbol library is a `(kicad_symbol_lib ...)` expression whose children
//! are a version/generator header followed by one `(symbol "NAME" ...)` block
//! per component. Units of a multi-unit symbol (`NAME_1_1`, `NAME_2_1`, ...)
//! are nested inside their parent block and are never top-level.
//!
//! Editing is done on the text itself: replacing a symbol swaps exactly the
//! bytes of the old block, so the rest of the file keeps its formatting.

use std::path::Path;

use indexmap::IndexMap;

use super::sexpr::{self, Expr};
use super::{KicadError, KicadResult};

/// Head token of a symbol library file.
pub const LIBRARY_HEAD: &str = "kicad_symbol_lib";

/// Head token of a symbol definition.
pub const SYMBOL_HEAD: &str = "symbol";

/// Contents of a freshly initialised, empty symbol library.
pub const EMPTY_LIBRARY: &str =
    "(kicad_symbol_lib (version 20211014) (generator kicad_symbol_editor)\n)\n";

/// One top-level symbol definition, as raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolBlock {
    /// Component name.
    pub name: String,
    /// Full `(symbol "NAME" ...)` text.
    pub text: String,
}

/// What an upsert did to the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The name was new and the block was appended.
    Added,
    /// A block with the same name was replaced in place.
    Replaced,
    /// A block with the same name and identical text already existed.
    Unchanged,
}

/// A symbol library held as text.
#[derive(Debug, Clone)]
pub struct SymbolLibrary {
    text: String,
}

impl Default for SymbolLibrary {
    fn default() -> Self {
        Self {
            text: EMPTY_LIBRARY.to_string(),
        }
    }
}

impl SymbolLibrary {
    /// Creates a new empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses library text, checking that it is a balanced symbol library.
    ///
    /// Empty or whitespace-only text is treated as an empty library.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not `kicad_symbol_lib` or is unbalanced.
    pub fn parse(text: impl Into<String>) -> KicadResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        let lib = Self { text };
        lib.root()?;
        Ok(lib)
    }

    /// Opens a library file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> KicadResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| KicadError::file_read(path, e))?;
        Self::parse(text)
    }

    /// Returns the library text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the component names in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if the library text is malformed.
    pub fn names(&self) -> KicadResult<Vec<String>> {
        Ok(self.index()?.into_keys().collect())
    }

    /// Inserts a symbol, replacing any existing block with the same name.
    ///
    /// Stale duplicates of the name left by other tools are removed so the
    /// library ends up with exactly one block per component.
    ///
    /// # Errors
    ///
    /// Returns an error if the library text is malformed.
    pub fn upsert(&mut self, block: &SymbolBlock) -> KicadResult<Upsert> {
        let matches = self.index()?.swap_remove(&block.name).unwrap_or_default();
        let [first, duplicates @ ..] = matches.as_slice() else {
            let root = self.root()?;
            sexpr::append_child(&mut self.text, &root, &block.text);
            return Ok(Upsert::Added);
        };

        let unchanged = duplicates.is_empty() && first.text(&self.text) == block.text;
        if unchanged {
            return Ok(Upsert::Unchanged);
        }

        for duplicate in duplicates.iter().rev() {
            sexpr::remove_expr(&mut self.text, duplicate);
        }
        self.text.replace_range(first.span.clone(), &block.text);
        Ok(Upsert::Replaced)
    }

    fn root(&self) -> KicadResult<Expr> {
        let root = sexpr::root(&self.text)?;
        if root.head != LIBRARY_HEAD {
            return Err(KicadError::wrong_root(LIBRARY_HEAD, root.head));
        }
        Ok(root)
    }

    /// Top-level symbol expressions grouped by name, in order of first appearance.
    fn index(&self) -> KicadResult<IndexMap<String, Vec<Expr>>> {
        let root = self.root()?;
        let mut index: IndexMap<String, Vec<Expr>> = IndexMap::new();
        for expr in sexpr::children(&self.text, &root)?
            .into_iter()
            .filter(|e| e.head == SYMBOL_HEAD)
        {
            let name = sexpr::name(&self.text, &expr)
                .ok_or_else(|| KicadError::missing_name(SYMBOL_HEAD, expr.span.start))?;
            index.entry(name).or_default().push(expr);
        }
        Ok(index)
    }
}

/// Extracts the top-level symbol definitions from a vendor symbol file.
///
/// Accepts a full `(kicad_symbol_lib ...)` file as well as bare
/// `(symbol ...)` blocks.
///
/// # Errors
///
/// Returns an error if the text is unbalanced or a symbol has no name.
pub fn extract_symbols(source: &str) -> KicadResult<Vec<SymbolBlock>> {
    let mut blocks = Vec::new();

    for expr in sexpr::top_level(source)? {
        let candidates = match expr.head.as_str() {
            LIBRARY_HEAD => sexpr::children(source, &expr)?,
            SYMBOL_HEAD => vec![expr],
            _ => continue,
        };
        for symbol in candidates.into_iter().filter(|e| e.head == SYMBOL_HEAD) {
            let name = sexpr::name(source, &symbol)
                .ok_or_else(|| KicadError::missing_name(SYMBOL_HEAD, symbol.span.start))?;
            blocks.push(SymbolBlock {
                name,
                text: symbol.text(source).to_string(),
            });
        }
    }

    Ok(blocks)
}

/// Summary of a symbol shown to the user before choosing a category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Component name.
    pub name: String,
    /// Datasheet URL, if the symbol carries one.
    pub datasheet: Option<String>,
    /// Footprint property, if set.
    pub footprint: Option<String>,
}

impl SymbolInfo {
    /// Summarises the first symbol defined in `source`.
    #[must_use]
    pub fn from_source(source: &str) -> Option<Self> {
        extract_symbols(source).ok()?.first().map(Self::from_block)
    }

    /// Reads the name and key properties of a symbol block.
    #[must_use]
    pub fn from_block(block: &SymbolBlock) -> Self {
        let mut info = Self {
            name: block.name.clone(),
            ..Self::default()
        };

        let Ok(root) = sexpr::root(&block.text) else {
            return info;
        };
        let properties = sexpr::children(&block.text, &root)
            .unwrap_or_default()
            .into_iter()
            .filter(|e| e.head == "property");

        for property in properties {
            let atoms = sexpr::leading_atoms(&block.text, &property);
            let (Some(key), Some(value)) = (atoms.first(), atoms.get(1)) else {
                continue;
            };
            if value.is_empty() || value == "~" {
                continue;
            }
            match key.as_str() {
                "Datasheet" => info.datasheet = Some(value.clone()),
                "Footprint" => info.footprint = Some(value.clone()),
                _ => {}
            }
        }

        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VENDOR_FILE: &str = r#"(kicad_symbol_lib (version 20211014) (generator SamacSys_ECAD_Model)
  (symbol "TPS62160DGKR" (in_bom yes) (on_board yes)
    (property "Reference" "IC" (at 0 0 0))
    (property "Datasheet" "https://www.ti.com/lit/ds/symlink/tps62160.pdf" (at 0 0 0))
    (property "Footprint" "SOP65P490X110-8N" (at 0 0 0))
    (symbol "TPS62160DGKR_0_0"
      (pin power_in line (at 0 0 0) (length 5) (name "VIN") (number "1"))
    )
  )
)
"#;

    fn block(name: &str, body: &str) -> SymbolBlock {
        SymbolBlock {
            name: name.to_string(),
            text: format!("(symbol \"{name}\" {body})"),
        }
    }

    #[test]
    fn extract_skips_nested_units() {
        let blocks = extract_symbols(VENDOR_FILE).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "TPS62160DGKR");
        assert!(blocks[0].text.contains("TPS62160DGKR_0_0"));
        assert!(blocks[0].text.ends_with(')'));
    }

    #[test]
    fn extract_bare_blocks() {
        let blocks = extract_symbols("(symbol \"A\" (x))\n(symbol \"B\" (y))").unwrap();
        let names: Vec<_> = blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn upsert_appends_then_replaces() {
        let mut lib = SymbolLibrary::new();
        assert_eq!(lib.upsert(&block("R", "(v 1)")).unwrap(), Upsert::Added);
        assert_eq!(lib.upsert(&block("C", "(v 1)")).unwrap(), Upsert::Added);
        assert_eq!(lib.upsert(&block("R", "(v 2)")).unwrap(), Upsert::Replaced);
        assert_eq!(lib.upsert(&block("R", "(v 2)")).unwrap(), Upsert::Unchanged);

        assert_eq!(lib.names().unwrap(), ["R", "C"]);
        assert_eq!(lib.as_str().matches("(symbol \"R\"").count(), 1);
        assert!(lib.as_str().contains("(symbol \"R\" (v 2))"));

        // Still a valid library after edits.
        let reparsed = SymbolLibrary::parse(lib.as_str().to_string()).unwrap();
        assert_eq!(reparsed.names().unwrap().len(), 2);
    }

    #[test]
    fn upsert_collapses_existing_duplicates() {
        let text = "(kicad_symbol_lib (version 20211014)\n  (symbol \"R\" (v 1))\n  (symbol \"R\" (v 1))\n)\n";
        let mut lib = SymbolLibrary::parse(text).unwrap();
        assert_eq!(lib.upsert(&block("R", "(v 3)")).unwrap(), Upsert::Replaced);
        assert_eq!(lib.as_str().matches("(symbol \"R\"").count(), 1);
        assert_eq!(lib.names().unwrap(), ["R"]);
    }

    #[test]
    fn parse_rejects_other_roots() {
        let err = SymbolLibrary::parse("(footprint \"X\")").unwrap_err();
        assert!(matches!(err, KicadError::WrongRoot { .. }));
    }

    #[test]
    fn parse_blank_is_empty_library() {
        let lib = SymbolLibrary::parse("\n").unwrap();
        assert!(lib.names().unwrap().is_empty());
    }

    #[test]
    fn symbol_info_from_source() {
        let info = SymbolInfo::from_source(VENDOR_FILE).unwrap();
        assert_eq!(info.name, "TPS62160DGKR");
        assert!(SymbolInfo::from_source("(kicad_symbol_lib (version 1))").is_none());
    }

    #[test]
    fn symbol_info_properties() {
        let blocks = extract_symbols(VENDOR_FILE).unwrap();
        let info = SymbolInfo::from_block(&blocks[0]);
        assert_eq!(info.name, "TPS62160DGKR");
        assert_eq!(
            info.datasheet.as_deref(),
            Some("https://www.ti.com/lit/ds/symlink/tps62160.pdf")
        );
        assert_eq!(info.footprint.as_deref(), Some("SOP65P490X110-8N"));
    }
}
