//! kv-bench: a micro-benchmark harness for key-value backends
//!
//! Replays a stream of newline-terminated `get`/`put` commands against a
//! backend and reports how fast it went:
//! - Streaming scanner over one fixed buffer, no line pre-splitting
//! - Commands dispatch strictly in input order, one at a time
//! - Backends: dummy (no-op), in-process memory, memcached over TCP
//! - Configuration via CLI arguments or TOML file
//!
//! Every failure class has its own exit code, so wrapper scripts can tell
//! bad input from a bad backend without parsing logs.

mod backend;
mod bench;
mod config;
mod parser;
mod scanner;

use std::fs::File;
use std::io::{self, Read};
use std::process;

use config::Config;
use scanner::Scanner;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet.
            eprintln!("kv-bench: {}", e);
            process::exit(1);
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        backend = %config.backend,
        address = %config.address,
        input = %config
            .input
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stdin>".to_string()),
        buffer_size = config.buffer_size,
        "Starting kv-bench"
    );

    let mut backend = match backend::create(config.backend, &config.address) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "Failed to set up backend");
            process::exit(2);
        }
    };

    let mut source: Box<dyn Read> = match config.input {
        Some(ref path) => match File::open(path) {
            Ok(file) => Box::new(file),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to open input file");
                process::exit(3);
            }
        },
        None => Box::new(io::stdin().lock()),
    };

    let mut scanner = Scanner::new(config.buffer_size);
    match bench::run(&mut source, backend.as_mut(), &mut scanner) {
        Ok(stats) => {
            if let Err(e) = backend.close() {
                warn!(error = %e, "Backend close failed");
            }
            info!(
                gets = stats.gets,
                puts = stats.puts,
                bytes_read = stats.bytes_read,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                ops_per_sec = stats.ops_per_sec() as u64,
                "Done"
            );
        }
        Err(e) => {
            let _ = backend.close();
            error!(error = %e, "Benchmark failed");
            process::exit(e.exit_code());
        }
    }
}
