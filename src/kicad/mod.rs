//! KiCad file format handling.
//!
//! The files this tool edits are S-expressions:
//!
//! - `.kicad_sym`: symbol libraries, one `(symbol "NAME" ...)` per component
//! - `.kicad_mod`: one footprint per file, inside a `.pretty` directory
//! - `sym-lib-table` / `fp-lib-table`: project library registrations
//!
//! The formats are treated as opaque apart from the few places we edit:
//! symbol blocks, model references and table entries. Everything else is
//! copied byte for byte.

pub mod error;
pub mod footprint;
pub mod lib_table;
pub mod sexpr;
pub mod symbol_lib;

pub use error::{KicadError, KicadResult};
pub use lib_table::{LibTable, LibTableEntry, TableKind};
pub use symbol_lib::{SymbolBlock, SymbolInfo, SymbolLibrary, Upsert};
