//! Tansu server binary
//!
//! HTTP front end for the tansu inode store.
//!
//! ## Usage
//!
//! ```bash
//! # Run with defaults (0.0.0.0:8080, ./tansu.db)
//! tansu-server
//!
//! # Pick a port and database location
//! tansu-server --port 9000 --db /var/lib/tansu/inodes.db
//! ```

use std::env;
use std::process::ExitCode;

use tansu_server::HttpServer;
use tansu_server::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_DB_PATH, DEFAULT_HTTP_PORT};
use tansu_store::InodeDb;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn print_usage() {
    eprintln!(
        r#"tansu-server - HTTP front end for the tansu inode store

USAGE:
    tansu-server [OPTIONS]

OPTIONS:
    --port <PORT>    Listen port (default: {port})
    --bind <ADDR>    Bind address (default: {bind})
    --db <PATH>      SQLite database path (default: {db})
    --help, -h       Show this help

A bare numeric argument is accepted as the port:
    tansu-server 9000
"#,
        port = DEFAULT_HTTP_PORT,
        bind = DEFAULT_BIND_ADDRESS,
        db = DEFAULT_DB_PATH
    );
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut port = DEFAULT_HTTP_PORT;
    let mut bind = DEFAULT_BIND_ADDRESS.to_string();
    let mut db_path = DEFAULT_DB_PATH.to_string();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "--port" => match args.get(i + 1).and_then(|s| s.parse().ok()) {
                Some(value) => {
                    port = value;
                    i += 2;
                }
                None => {
                    eprintln!("--port requires a port number");
                    return ExitCode::FAILURE;
                }
            },
            "--bind" => match args.get(i + 1) {
                Some(value) => {
                    bind = value.clone();
                    i += 2;
                }
                None => {
                    eprintln!("--bind requires an address");
                    return ExitCode::FAILURE;
                }
            },
            "--db" => match args.get(i + 1) {
                Some(value) => {
                    db_path = value.clone();
                    i += 2;
                }
                None => {
                    eprintln!("--db requires a path");
                    return ExitCode::FAILURE;
                }
            },
            arg => {
                // Bare port number for the flagless invocation form.
                if let Ok(value) = arg.parse::<u16>() {
                    port = value;
                    i += 1;
                } else {
                    eprintln!("Unknown argument: {}", arg);
                    print_usage();
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    run_server(&bind, port, &db_path)
}

fn run_server(bind: &str, port: u16, db_path: &str) -> ExitCode {
    let store = match InodeDb::open(db_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("failed to open inode db at {}: {}", db_path, e);
            return ExitCode::FAILURE;
        }
    };

    let addr = format!("{bind}:{port}");
    let server = match HttpServer::bind(&addr, store) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Serving inode store {} on http://{}...", db_path, addr);
    server.run();
    ExitCode::SUCCESS
}
