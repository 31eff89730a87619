use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scriptdeck_mcp::discover::resolve_manifest_path;
use scriptdeck_mcp::runner::DEFAULT_PACKAGE_MANAGER;
use scriptdeck_mcp::{ScriptServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "scriptdeck-mcp")]
#[command(about = "Serve package.json scripts as MCP tools", long_about = None)]
struct Args {
    /// package.json file or a directory containing one. Defaults to the
    /// nearest package.json above the current directory.
    path: Option<PathBuf>,

    #[arg(long, default_value = "stdio")]
    transport: String,

    /// Package manager used to run scripts, e.g. `pnpm` or `corepack yarn`.
    #[arg(long, env = "SCRIPTDECK_PACKAGE_MANAGER", default_value = DEFAULT_PACKAGE_MANAGER)]
    package_manager: String,

    /// Do not register the built-in tools.
    #[arg(long)]
    no_builtins: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scriptdeck_mcp=info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if args.transport != "stdio" {
        anyhow::bail!("only stdio transport is supported");
    }

    let cwd = std::env::current_dir()?;
    let manifest = match resolve_manifest_path(args.path.as_deref(), &cwd) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let server = ScriptServer::new(ServerConfig {
        package_manager: args.package_manager,
        builtin_tools: !args.no_builtins,
        ..ServerConfig::default()
    });

    // Everything must be registered before the transport connects.
    server.register_builtins().await;
    match manifest {
        Some(path) => {
            info!(path = %path.display(), "Using manifest");
            server.load_manifest(&path).await?;
        }
        None => warn!("No package.json found, serving without script tools"),
    }

    server.serve_stdio().await?;
    Ok(())
}
