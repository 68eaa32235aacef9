use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "geostore",
    about = "Geospatial indexed store over an append-only log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Log file holding the store
    #[arg(long, global = true, default_value = "geostore.log")]
    pub db: PathBuf,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured tessellation level
    #[arg(long, global = true)]
    pub level: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Insert an item
    Insert(InsertArgs),
    /// Show an item by id
    Get(IdArgs),
    /// Show the cell containing a coordinate
    Cell(CellArgs),
    /// List cells within a radius
    Radius(RadiusArgs),
    /// Delete an item from every cell it covers
    Delete(IdArgs),
    /// List items whose entry key starts with a prefix
    Prefix(PrefixArgs),
    /// List every cell an item is stored in
    Covering(IdArgs),
    /// Check a cell's content hash
    Verify(VerifyArgs),
    /// Rewrite the log with live entries only
    Compact,
    /// Print the resolved configuration as TOML
    Config,
}

#[derive(Args)]
pub struct InsertArgs {
    #[arg(long)]
    pub key: String,
    /// Flattened lat,lng pairs; repeat the first pair last for a polygon
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub coords: Vec<f64>,
    /// JSON object of properties
    #[arg(long)]
    pub props: Option<String>,
}

#[derive(Args)]
pub struct IdArgs {
    /// Item id `<cellId>:<itemKey>`
    pub id: String,
}

#[derive(Args)]
pub struct CellArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,
}

#[derive(Args)]
pub struct RadiusArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,
    #[arg(long)]
    pub meters: f64,
}

#[derive(Args)]
pub struct PrefixArgs {
    /// `<hex cell id>[:<item key prefix>]`; empty lists everything
    #[arg(default_value = "")]
    pub prefix: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Decimal cell id
    pub cell: u64,
}
