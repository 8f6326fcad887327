//! Basic example: Establish an authenticated connection and disconnect
//!
//! This example demonstrates the connection bootstrap: connect, handshake,
//! authenticate through the layered chain, then disconnect cleanly.
//!
//! # Prerequisites
//!
//! - SSH server reachable on the target host
//! - Valid credentials (password, SSH key, agent, or identity files)
//!
//! # Usage
//!
//! With password authentication:
//! ```bash
//! cargo run --example connect -- --host localhost --user your_username --password your_password
//! ```
//!
//! With an explicit SSH key:
//! ```bash
//! cargo run --example connect -- --host localhost --user your_username --key ~/.ssh/id_ed25519
//! ```
//!
//! With no credential flags the agent and the default identity files
//! (`~/.ssh/id_rsa`, `~/.ssh/id_dsa`, `~/.ssh/identity`) are tried.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use sshmoor::{ConnectConfig, Connection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("Connecting to {}:{}...", args.host, args.port);

    let mut builder = ConnectConfig::builder(&args.host)
        .port(args.port)
        .user(&args.user)
        .num_retries(args.retries)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    }
    if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    }

    let config = builder.build()?;

    let mut conn = Connection::connect(config).await?;
    println!(
        "Connected: {}@{}:{}, session ready for multiplexed I/O",
        conn.user(),
        conn.host(),
        conn.port()
    );

    println!("Closing connection...");
    conn.disconnect().await;
    println!("Done!");

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    retries: u32,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut password = None;
        let mut key = None;
        let mut retries = 3u32;
        let mut timeout = 30u64;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = Some(args[i].clone());
                    }
                }
                "--key" | "-k" => {
                    i += 1;
                    if i < args.len() {
                        key = Some(PathBuf::from(&args[i]));
                    }
                }
                "--retries" | "-r" => {
                    i += 1;
                    if i < args.len() {
                        retries = args[i].parse().unwrap_or(3);
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    Self::print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            retries,
            timeout,
        }
    }

    fn print_help() {
        println!("Usage: cargo run --example connect -- [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --host, -h <HOST>          Host to connect to (default: localhost)");
        println!("  --port, -p <PORT>          SSH port (default: 22)");
        println!("  --user, -u <USER>          User to connect as (default: $USER)");
        println!("  --password, -P <PASSWORD>  Password for authentication");
        println!("  --key, -k <PATH>           Explicit private key path");
        println!("  --retries, -r <N>          Attempt bound (default: 3)");
        println!("  --timeout, -t <SECONDS>    Connect timeout (default: 30)");
        println!("  --help                     Show this help");
    }
}
