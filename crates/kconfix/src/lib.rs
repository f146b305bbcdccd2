//! Kconfig parsing, evaluation, and configuration management.
//!
//! The crate parses a tree of Kconfig source files into a menu hierarchy and
//! symbol table ([`parser`], [`model`]), computes each symbol's visibility,
//! range, and effective value under the constraint system ([`eval`]), reads
//! and writes persisted configuration files with default-marker semantics
//! ([`conf`], [`renames`]), aggregates diagnostics ([`report`]), and speaks
//! the line-delimited JSON protocol used by IDE integrations ([`server`]).
#![warn(clippy::all)]
#![allow(clippy::result_large_err)]
#![warn(missing_docs)]

pub mod conf;
pub mod eval;
pub mod model;
pub mod parser;
pub mod renames;
pub mod report;
pub mod server;
pub mod value;

pub use {
    conf::DefaultsPolicy,
    eval::{Engine, Origin},
    model::Model,
    parser::{Kconfig, KconfigError, ParseContext},
    renames::RenameMap,
    report::{Report, Status, Verbosity},
    value::Value,
};
