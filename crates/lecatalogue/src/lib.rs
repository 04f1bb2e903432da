// lecatalogue - Built-in Commands
//
// *Le Catalogue* (The Catalogue) - The standard command set and the reference date/value codec

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Reader/writer contracts and the date/value codec.
pub mod convert;

/// Built-in command implementations.
pub mod commands;

pub use convert::{ConversionError, DateValueCodec, Period, ResultReader, ResultWriter};

use lecommande::CommandRegistry;

/// Registry holding every built-in command.
#[must_use]
pub fn standard_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    commands::register_all(&mut registry);
    registry
}
