//! Kconfig parser: lexing, entry parsing, and source-tree resolution.

mod block;
mod choice;
mod comment;
mod config;
mod context;
mod error;
mod expr;
mod ifblock;
mod kconfig;
mod location;
mod menu;
mod numeric;
mod source;
mod streams;
mod string_literal;
mod token;
mod types;

pub use {
    block::*, choice::*, comment::*, config::*, context::*, error::*, expr::*, ifblock::*, kconfig::*, location::*,
    menu::*, source::*, streams::*,
    string_literal::{parse_escape, parse_string_literal},
    token::*, types::*,
};
