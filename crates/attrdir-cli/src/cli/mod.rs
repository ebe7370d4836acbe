//! # CLI Behavior
//!
//! The CLI is one client of the attrdir library. It is the only place that knows
//! about terminal I/O, exit codes and output formatting.
//!
//! ## Container Location
//!
//! Every command works on the container directory given by `--root` (default: the
//! current directory). `attrdir init` creates it; other commands fail if it is
//! missing. Storage thresholds come from the layered configuration (environment,
//! `<root>/attrdir.toml`, global config file) at the time an object is created.
//!
//! ## Selecting Attributes
//!
//! Commands that act on one attribute take a selector: a name, `#N` for position `N`
//! in creation order, or `~N` for position `N` in name order. Prefix a name with `=`
//! when it would otherwise read as a position.
//!
//! ## Output
//!
//! Plain text by default, styled when stdout is a terminal. `--json` prints a single
//! JSON document per command instead.
//!
//! ## Logging
//!
//! Diagnostics go to stderr through `tracing`. `RUST_LOG` controls the filter;
//! `--verbose` raises the default from `warn` to `debug`.

mod commands;
mod handlers;
mod render;
mod setup;

pub use commands::run;
