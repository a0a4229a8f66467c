//!
//! menagerie server binary
//! -----------------------
//! Command-line entry point for starting the menagerie HTTP server. Supports
//! configuration via CLI flags and environment variables.

use anyhow::Result;
use std::env;
use std::path::PathBuf;

use menagerie::config::{Environment, ServerConfig};

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return args[i + 1].parse::<u16>().ok();
        }
        i += 1;
    }
    None
}

fn parse_path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).map(PathBuf::from)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn init_tracing(environment: Environment) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = match environment {
        Environment::Production => tracing_subscriber::fmt().json().with_env_filter(filter).try_init(),
        Environment::Dev => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("menagerie Server\n\nUSAGE:\n  menagerie_server [--http-port N] [--data-dir PATH] [--images-dir PATH]\n\nOPTIONS:\n  --http-port N        HTTP API port (env: MENAGERIE_HTTP_PORT, default 8080)\n  --data-dir PATH      Store snapshot folder (env: MENAGERIE_DATA_DIR, default data)\n  --images-dir PATH    Uploaded image folder (env: MENAGERIE_IMAGES_DIR, default images)\n\nENVIRONMENT:\n  ADMIN_PASSWORD       Admin password when /run/secrets/admin_password is absent\n  ENV                  'production' switches logs to JSON\n  RUST_LOG             Log filter (default info)\n");
        return Ok(());
    }

    // Environment first, CLI arguments override
    let mut config = ServerConfig::from_env();
    if let Some(port) = parse_port_arg(&args, "--http-port") { config.http_port = port; }
    if let Some(dir) = parse_path_arg(&args, "--data-dir") { config.data_dir = dir; }
    if let Some(dir) = parse_path_arg(&args, "--images-dir") { config.images_dir = dir; }

    init_tracing(config.environment);

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    println!(
        "menagerie starting: http={}, data_dir={}, images_dir={}",
        config.http_port,
        config.data_dir.display(),
        config.images_dir.display()
    );
    tracing::info!(target: "menagerie", "RUST_LOG='{}', config={:?}", rust_log, config);

    menagerie::server::run(config).await
}
