//! # attrdir CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, while this file
//! only invokes `cli::run()` and handles process termination.
//!
//! ## Workspace Structure
//!
//! - `crates/attrdir/`: the library (container, directories, stores, codec)
//! - `crates/attrdir-cli/`: this tool, depends on the `attrdir` library
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/attrdir-cli/src/cli/)                    │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Container opening + dispatch (commands.rs)               │
//! │  - One function per subcommand (handlers.rs)                │
//! │  - Text or JSON output (render.rs)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (crates/attrdir/src/api.rs)                      │
//! │  - Resolves objects and selectors, returns Result types     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything from `api.rs` inward is UI agnostic. Terminal output, exit codes and
//! log setup belong to this crate alone.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
