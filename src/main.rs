//! EmberKV - A Multi-Threaded In-Memory Key-Value Store
//!
//! This is the main entry point for the EmberKV server.
//! It parses the command line, sets up logging, and runs the server until
//! Ctrl+C.

use emberkv::{Server, ServerConfig, ShutdownHandle};
use std::thread;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Parse configuration from command-line arguments
fn config_from_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let args: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                config.host = option_value(&args, i, "--host").to_string();
                i += 2;
            }
            "--port" | "-p" => {
                config.port = option_value(&args, i, "--port").parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid port number");
                    std::process::exit(1);
                });
                i += 2;
            }
            "--threads" | "-t" => {
                config.threads = match option_value(&args, i, "--threads").parse() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        eprintln!("Error: --threads must be a positive integer");
                        std::process::exit(1);
                    }
                };
                i += 2;
            }
            "--sweep-interval" | "-s" => {
                let secs: u64 = match option_value(&args, i, "--sweep-interval").parse() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        eprintln!("Error: --sweep-interval must be a positive number of seconds");
                        std::process::exit(1);
                    }
                };
                config.expiry = config.expiry.with_interval(Duration::from_secs(secs));
                i += 2;
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("EmberKV version {}", emberkv::VERSION);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    config
}

/// Returns the value following the flag at `i`, or exits.
fn option_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
EmberKV - A Multi-Threaded In-Memory Key-Value Store

USAGE:
    emberkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>              Port to listen on (default: 8080)
    -t, --threads <N>              Worker threads (default: 4)
    -s, --sweep-interval <SECS>    Seconds between expiry sweeps (default: 1)
    -v, --version                  Print version information
        --help                     Print this help message

ENVIRONMENT:
    RUST_LOG                       Log filter (default: info)

EXAMPLES:
    emberkv                        # Start on 0.0.0.0:8080
    emberkv --port 9090 -t 8       # Port 9090, 8 workers

USAGE WITH CURL:
    $ curl -X PUT -d 'ember' localhost:8080/kv/name
    OK
    $ curl -X PUT -H 'X-TTL: 60' -d 'abc123' localhost:8080/kv/session
    OK
    $ curl localhost:8080/kv/name
    ember
    $ curl localhost:8080/kv
    name
    session
"#
    );
}

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
EmberKV v{} - Multi-Threaded In-Memory Key-Value Store
──────────────────────────────────────────────────────────────
Server starting on {} with {} workers
Expiry sweep every {:?}

Use Ctrl+C to shutdown gracefully.
"#,
        emberkv::VERSION,
        config.bind_address(),
        config.threads,
        config.expiry.interval,
    );
}

/// Waits for Ctrl+C on a helper thread, then triggers `handle`.
fn spawn_signal_listener(handle: ShutdownHandle) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("signal".to_string())
        .spawn(move || {
            match runtime.block_on(signal::ctrl_c()) {
                Ok(()) => info!("Shutdown signal received, stopping server..."),
                Err(e) => {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
            }
            handle.shutdown();
        })?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = config_from_args();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_names(true)
        .init();

    print_banner(&config);

    let server = Server::new(config);
    spawn_signal_listener(server.shutdown_handle())?;

    server.run()?;

    info!("Server shutdown complete");
    Ok(())
}
