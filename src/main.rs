//! Seedns - a lightweight authoritative DNS server for peer-discovery
//! seed zones.
//!
//! Answers A/AAAA/NS/SOA queries for a single delegated zone with a
//! rotating sampling of peer addresses, within the 512-byte UDP budget.

use seedns::config::load_config;
use seedns::dns::{bind_socket, run_server, Responder, ServerStats};
use seedns::error::SeedError;
use seedns::logging;
use seedns::seeds::StaticSeedList;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();

    // Parse command line arguments
    let mut config_path: Option<&str> = None;
    let mut cli_listen_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                config_path = args.get(i).map(|s| s.as_str());
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                return Ok(());
            }
            arg if !arg.starts_with('-') && cli_listen_addr.is_none() => {
                cli_listen_addr = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // Load config from file; CLI arguments override it
    let mut config = load_config(config_path)?;
    if let Some(addr) = cli_listen_addr {
        config.listen = addr;
    }

    // Initialize logging system
    let _log_guard = logging::init_logging(&config.logging);
    logging::spawn_retention_task(&config.logging);

    let zone = config.zone.to_zone()?;
    let seed_addrs = config.seed_addrs()?;
    if seed_addrs.is_empty() {
        warn!("no seed addresses configured; A/AAAA answers will be empty");
    }

    let listen_addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|_| SeedError::Config(format!("invalid listen address: {}", config.listen)))?;

    let selector = StaticSeedList::new(seed_addrs);
    let responder = Arc::new(Responder::new(zone, selector));
    let stats = Arc::new(ServerStats::new());

    let workers = config.workers.max(1);
    for _ in 0..workers {
        let socket = bind_socket(listen_addr, workers > 1)?;
        let responder = Arc::clone(&responder);
        let stats = Arc::clone(&stats);
        tokio::spawn(async move {
            if let Err(e) = run_server(socket, responder, stats).await {
                error!(error = %e, "dns server exited");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!(requests = stats.requests(), "shutting down");
    Ok(())
}

fn print_usage(prog: &str) {
    println!("Usage: {} [OPTIONS] [LISTEN_ADDR]", prog);
    println!();
    println!("Authoritative DNS server for a peer-discovery seed zone.");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>   Configuration file (default: config.yaml)");
    println!("  -h, --help            Show this help");
    println!();
    println!("  LISTEN_ADDR           Override the configured listen address,");
    println!("                        e.g. 0.0.0.0:53 or 127.0.0.1:5353");
}
