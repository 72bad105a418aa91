//! kicad-lib-manager: organise vendor KiCad component archives into a
//! categorised library.
//!
//! Component vendors ship a zip per part containing a symbol, a footprint and
//! usually a 3D model. This crate unpacks such an archive, works out what is
//! inside, asks which category the part belongs to and merges it into a
//! library laid out as one symbol library and one footprint directory per
//! category plus a shared model store.
//!
//! # Workflow
//!
//! 1. [`archive`] extracts the download into a temporary directory
//! 2. [`classify`] sorts the extracted files into symbols, footprints and models
//! 3. [`select`] asks for the destination category
//! 4. [`library`] merges the files, rewriting footprint model paths
//! 5. [`vcs`] optionally commits and pushes the result
//!
//! [`import`] ties these steps together. [`project`] registers the category
//! libraries in a KiCad project's library tables.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types and exit codes
//! - [`kicad`]: KiCad S-expression file handling
//! - [`registry`]: The category set

pub mod archive;
pub mod classify;
pub mod config;
pub mod error;
pub mod import;
pub mod kicad;
pub mod library;
pub mod project;
pub mod registry;
pub mod select;
pub mod vcs;
