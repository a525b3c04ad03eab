use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gqlstack")]
#[command(about = "Run GraphQL requests against the in-process stack")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (overrides GQLSTACK_CONFIG env var)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the schema in SDL form
    Schema(SchemaArgs),
    /// Execute a request through the transport bridge
    Exec(ExecArgs),
    /// List registered capabilities and their lifetimes
    Capabilities,
}

#[derive(clap::Args)]
pub struct SchemaArgs {
    /// Output file (defaults to schema.output_path from config)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Print to stdout instead of writing a file
    #[arg(long, conflicts_with = "out")]
    pub stdout: bool,
}

#[derive(clap::Args)]
pub struct ExecArgs {
    /// GraphQL document
    #[arg(short, long, required_unless_present = "file", conflicts_with = "file")]
    pub query: Option<String>,
    /// Read the GraphQL document from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Variables as a JSON object
    #[arg(short, long)]
    pub variables: Option<String>,
    /// Operation to run when the document defines several
    #[arg(short, long)]
    pub operation_name: Option<String>,
    /// Send the request this many times against the same stack
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,
    /// Pretty-print response bodies
    #[arg(long)]
    pub pretty: bool,
}
