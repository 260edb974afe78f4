mod cli;

use streamgate::{
    config, notify::SystemdNotifier, pipeline::CommandFactory, relay, server, tools, workspace,
};
use streamgate_common::{StreamAddress, StreamId};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

async fn start_server(
    config_path: Option<&Path>,
    input_urls: Vec<String>,
    host: Option<String>,
    port: Option<u16>,
    working_directory: Option<PathBuf>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI overrides
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if working_directory.is_some() {
        config.server.working_directory = working_directory;
    }
    if !input_urls.is_empty() {
        config.server.allow_list = input_urls;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting streamgate");

    let root = workspace::prepare_working_directory(config.server.working_directory.as_deref())?;
    workspace::install_assets(&root)?;

    let factory = Arc::new(CommandFactory::new(
        config.tools.clone(),
        config.hls.clone(),
        config.multicast.clone(),
    ));
    let ctx = server::AppContext::new(config, root, factory)?;

    let report = server::start_server(ctx, Arc::new(SystemdNotifier::from_env())).await?;
    if report.killed > 0 {
        tracing::warn!(killed = report.killed, "Some pipeline processes had to be killed");
    }
    Ok(())
}

async fn run_relay(config_path: Option<&Path>, input_url: &str, destination: &str) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let factory = CommandFactory::new(config.tools, config.hls, config.multicast);
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);

    let report = relay::run_relay(
        &factory,
        &StreamAddress::new(input_url),
        destination,
        grace,
        server::shutdown_signal(),
    )
    .await
    .with_context(|| format!("Failed to relay {}", input_url))?;

    tracing::info!(
        terminated = report.terminated,
        killed = report.killed,
        "Relay finished"
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "streamgate=trace,streamgate_common=debug,tower_http=debug".to_string()
        } else {
            "streamgate=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve {
            input_urls,
            host,
            port,
            working_directory,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(
                cli.config.as_deref(),
                input_urls,
                host,
                port,
                working_directory,
            ))
        }
        Commands::Relay {
            input_url,
            multicast_output,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_relay(cli.config.as_deref(), &input_url, &multicast_output))
        }
        Commands::Encode { url } => {
            println!("{}", StreamId::encode(&StreamAddress::new(url)));
            Ok(())
        }
        Commands::Decode { id } => {
            let address = StreamId::new(id).decode()?;
            println!("{}", address);
            Ok(())
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("streamgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = tools::check_tools(&config.tools);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {} ({})", status, tool.role, tool.program.display());

        if let Some(ref version) = tool.version {
            print!(" {}", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing; streams that need them cannot be tuned.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    match &config.server.working_directory {
        Some(dir) => println!("  Working directory: {}", dir.display()),
        None => println!(
            "  Working directory: {} (default)",
            workspace::default_working_directory().display()
        ),
    }
    println!(
        "  Allow list: {}",
        if config.server.allow_list.is_empty() {
            "any address".to_string()
        } else {
            format!("{} addresses", config.server.allow_list.len())
        }
    );
    println!("  HLS window: {} segments", config.hls.list_size);
    println!("  Passthrough enabled: {}", config.passthrough.enabled);

    Ok(())
}
