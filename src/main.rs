mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

use framefusion::server;
use framefusion_av::tools;
use framefusion_core::Config;

async fn start_server(host: String, port: u16, config_path: Option<&std::path::Path>) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // CLI wins over the config file.
    config.server.host = host;
    config.server.port = port;

    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    tracing::info!("Starting FrameFusion server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);

    match tools::find_ffmpeg(config.tools.ffmpeg_path.as_deref()) {
        Ok(path) => {
            let version = tools::ffmpeg_version(&path).unwrap_or_else(|| "unknown version".into());
            println!("ffmpeg: {} ({})", path.display(), version);
            Ok(())
        }
        Err(e) => anyhow::bail!("{e}"),
    }
}

fn validate_config(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let warnings = config.validate();
    if warnings.is_empty() {
        println!("Configuration OK");
    } else {
        for warning in &warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults based on the verbose
    // flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "framefusion=trace,framefusion_av=trace,framefusion_core=debug,tower_http=debug"
                .to_string()
        } else {
            "framefusion=debug,framefusion_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter.as_str())
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("framefusion {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
