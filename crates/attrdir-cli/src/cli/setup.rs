use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// `--version` text: `v0.3.0` for tagged release builds, with the commit appended
/// on a second line otherwise.
fn get_version() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let version = env!("CARGO_PKG_VERSION");
        match env!("IS_RELEASE") {
            "true" => format!("v{}", version),
            _ => format!(
                "v{}\ndev: {} {}",
                version,
                env!("GIT_HASH"),
                env!("GIT_COMMIT_DATE")
            ),
        }
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "attrdir",
    bin_name = "attrdir",
    version = get_version(),
    disable_help_subcommand = true
)]
#[command(about = "Inspect and edit object attributes in an attrdir container", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Container directory
    #[arg(long, global = true, default_value = ".", help_heading = "Options")]
    pub root: PathBuf,

    /// Print JSON instead of text
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Group,
    Dataset,
    Type,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Name,
    Order,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Object path
    pub object: String,

    /// Attribute name
    pub name: String,

    /// Size in bytes of one element
    #[arg(long)]
    pub elem_size: usize,

    /// Dimensions, comma separated (scalar when omitted)
    #[arg(long, value_delimiter = ',')]
    pub dims: Vec<u64>,

    /// Mark the name as UTF-8
    #[arg(long)]
    pub utf8: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty container
    Init,

    /// Create a group, dataset or named type
    #[command(alias = "mk")]
    Mkobj {
        /// Absolute object path
        path: String,

        #[arg(long, value_enum, default_value = "group")]
        kind: KindArg,
    },

    /// Remove an object and its attributes
    Rmobj {
        /// Absolute object path
        path: String,
    },

    /// List objects
    Objects,

    /// Create an attribute (value starts zeroed)
    Create(CreateArgs),

    /// Overwrite an attribute value with hex bytes
    Write {
        object: String,
        selector: String,
        /// Value as hex, e.g. 0a0b0c0d
        hex: String,
    },

    /// Print an attribute value as hex
    Read { object: String, selector: String },

    /// Show attribute metadata
    Info { object: String, selector: String },

    /// Rename an attribute
    #[command(alias = "mv")]
    Rename {
        object: String,
        old: String,
        new: String,
    },

    /// Delete an attribute
    #[command(alias = "rm")]
    Delete { object: String, selector: String },

    /// Check whether an attribute exists
    Exists { object: String, name: String },

    /// List attributes
    Ls {
        object: String,

        /// Ordering to list in
        #[arg(long, value_enum, default_value = "name")]
        by: OrderArg,

        /// Reverse the ordering
        #[arg(long)]
        desc: bool,
    },

    /// Count attributes
    Count { object: String },
}
