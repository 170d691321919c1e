//! Settings come from a TOML file plus `AUTHLANE__*` environment overrides.
//! See `bin/settings_demo.rs` for a binary that loads and validates them.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
