mod cli;
mod observability;
mod output;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use gqlstack::{GqlStack, GraphQLRequest, load_config};

use cli::{Cli, Commands, ExecArgs, SchemaArgs};

/// Where the configuration path came from.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From GQLSTACK_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (gqlstack.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (GQLSTACK_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            output::print_warning(&format!("Failed to load .env file: {e}"));
        }
    }

    observability::init_tracing();

    if let Err(e) = run().await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, source) = resolve_config_path(cli.config);
    let config = load_config(config_path.as_deref()).context("Configuration error")?;
    tracing::info!(
        path = ?config_path,
        source = %source,
        "Configuration loaded"
    );
    observability::apply_logging_level(&config.logging.level);

    let stack = GqlStack::with_defaults(config).context("Stack initialization failed")?;

    match cli.command {
        Commands::Schema(args) => export_schema(&stack, &args),
        Commands::Exec(args) => exec(&stack, args).await,
        Commands::Capabilities => {
            for (name, lifetime) in stack.schema().registry().capabilities() {
                println!("{name}\t{lifetime}");
            }
            Ok(())
        }
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: GQLSTACK_CONFIG
/// 3. Default: gqlstack.toml (optional)
fn resolve_config_path(cli: Option<PathBuf>) -> (Option<PathBuf>, ConfigSource) {
    if let Some(path) = cli {
        return (Some(path), ConfigSource::CliArgument);
    }
    if let Ok(path) = env::var("GQLSTACK_CONFIG")
        && !path.is_empty()
    {
        return (Some(PathBuf::from(path)), ConfigSource::EnvironmentVariable);
    }
    (None, ConfigSource::Default)
}

fn export_schema(stack: &GqlStack, args: &SchemaArgs) -> Result<()> {
    if args.stdout {
        print!("{}", stack.sdl());
        return Ok(());
    }

    let path = args
        .out
        .clone()
        .unwrap_or_else(|| stack.config().schema.output_path.clone());
    stack
        .export_schema(&path)
        .with_context(|| format!("Failed to write schema to {}", path.display()))?;
    output::print_success(&format!("Schema written to {}", path.display()));
    Ok(())
}

async fn exec(stack: &GqlStack, args: ExecArgs) -> Result<()> {
    let query = match (args.query, &args.file) {
        (Some(query), _) => query,
        (None, Some(file)) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?,
        (None, None) => bail!("Either --query or --file is required"),
    };

    let variables = match args.variables.as_deref() {
        None => serde_json::Map::new(),
        Some(raw) => match serde_json::from_str(raw).context("Invalid --variables JSON")? {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            _ => bail!("--variables must be a JSON object"),
        },
    };

    let mut request = GraphQLRequest::new(query).variables(variables);
    if let Some(name) = args.operation_name {
        request = request.operation_name(name);
    }

    let body = request.to_vec().context("Failed to encode request")?;
    for _ in 0..args.repeat.max(1) {
        let response = stack.bridge().handle(&body).await;
        output::print_body(&response.body, args.pretty);
        if !response.status.is_success() {
            bail!("Request failed with status {}", response.status);
        }
    }
    Ok(())
}
