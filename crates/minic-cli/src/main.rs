//! mini-C language server entry point
//!
//! Speaks LSP on stdin/stdout and logs to stderr. The process exit code is 0
//! after a clean `shutdown`/`exit` sequence, 1 when the client leaves without
//! one, and the error's own code when a fatal error stops the server.

use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use minic_lsp::{ConfigLoader, LspServer, ServerConfig, Transport};
use tracing::{error, info};

/// Language server for mini-C over stdio
#[derive(Debug, Parser)]
#[command(name = "minic-lsp", version, about)]
struct Args {
    /// Configuration file (.yaml, .yml or .json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Verbose logging with targets, files and line numbers
    #[arg(long)]
    debug: bool,

    /// Exit with a distinct code on content, capacity and missing-document
    /// errors instead of recovering
    #[arg(long)]
    strict_exit: bool,
}

impl Args {
    /// File settings, then flags on top
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        } else if self.debug {
            config.log_level = "debug".to_string();
        }
        config.strict_exit |= self.strict_exit;

        config.validate().context("invalid command line settings")?;
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();
    let code = match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("minic-lsp: {:#}", err);
            1
        }
    };
    process::exit(code);
}

fn run(args: &Args) -> Result<i32> {
    let config = args.server_config()?;
    init_logging(&config.log_level, args.debug)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let code = runtime.block_on(serve(config));
    // stdin is read on a blocking thread that may still be parked in a read
    runtime.shutdown_background();
    Ok(code)
}

async fn serve(config: ServerConfig) -> i32 {
    info!("Starting LSP server");
    info!("Log level: {}", config.log_level);
    info!("Strict exit: {}", config.strict_exit);

    let mut transport = Transport::stdio().with_max_frame_bytes(config.max_frame_bytes);
    let mut server = LspServer::with_config(&config);

    info!("Listening on stdio transport");
    match server.run(&mut transport).await {
        Ok(status) => {
            info!("LSP server shut down ({:?})", status);
            status.code()
        }
        Err(e) => {
            error!("LSP server error: {}", e);
            e.exit_code()
        }
    }
}

/// Install the stderr log subscriber; stdout carries the protocol
fn init_logging(log_level: &str, debug: bool) -> Result<()> {
    use tracing_subscriber::fmt;

    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    fmt()
        .with_max_level(level)
        .with_target(debug)
        .with_file(debug)
        .with_line_number(debug)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::try_parse_from(["minic-lsp"]).unwrap();
        assert_eq!(args.server_config().unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_debug_flag_raises_log_level() {
        let args = Args::try_parse_from(["minic-lsp", "--debug"]).unwrap();
        assert_eq!(args.server_config().unwrap().log_level, "debug");

        let args =
            Args::try_parse_from(["minic-lsp", "--debug", "--log-level", "trace"]).unwrap();
        assert_eq!(args.server_config().unwrap().log_level, "trace");
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "log_level: warn\nmax_documents: 3").unwrap();

        let path = file.path().to_str().unwrap();
        let args = Args::try_parse_from(["minic-lsp", "--config", path, "--strict-exit"]).unwrap();
        let config = args.server_config().unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.max_documents, Some(3));
        assert!(config.strict_exit);
    }

    #[test]
    fn test_bad_log_level_is_rejected() {
        let args = Args::try_parse_from(["minic-lsp", "--log-level", "chatty"]).unwrap();
        assert!(args.server_config().is_err());
    }
}
