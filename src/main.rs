//! Access Watch CLI.

use access_watch::{AccessWatchBuilder, Config, IncomingRequest, MemoryCache};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "access-watch")]
#[command(about = "Access Watch client - verify API credentials and inspect request identities")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "access-watch.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Print the identity of a request from this socket address and exit
    #[arg(long, value_name = "ADDR")]
    identity: Option<String>,

    /// Request header for --identity, as "name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,
}

fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Invalid header '{}', expected \"name: value\"", raw))?;
    Ok((name.trim(), value.trim()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load configuration
    info!(config = %args.config.display(), "Loading configuration");
    let config = Config::load(&args.config)?;

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let client = AccessWatchBuilder::from_config(&config)
        .with_cache(MemoryCache::new(
            config.cache.ttl_seconds,
            config.cache.max_entries,
        ))
        .build()?;

    // Handle --identity
    if let Some(address) = args.identity {
        let mut request = IncomingRequest::new(address);
        for raw in &args.headers {
            let (name, value) = parse_header(raw)?;
            request = request.with_header(name, value);
        }
        println!("{}", client.identity(&request));
        return Ok(());
    }

    info!(api_base = %client.api().base(), "Checking API credentials");
    client.hello().await.context("API rejected the configured credentials")?;
    info!("API credentials accepted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("User-Agent: curl/8.0").unwrap(), ("User-Agent", "curl/8.0"));
        assert_eq!(parse_header("dnt:1").unwrap(), ("dnt", "1"));
        assert!(parse_header("no-separator").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "access-watch",
            "--identity",
            "1.2.3.4",
            "-H",
            "user-agent: x",
            "-H",
            "dnt: 1",
        ]);
        assert_eq!(args.identity.as_deref(), Some("1.2.3.4"));
        assert_eq!(args.headers.len(), 2);
        assert_eq!(args.config, PathBuf::from("access-watch.yaml"));
    }
}
