//! # Cinema Server
//!
//! Native control adapter for Dolby Cinema Processors.
//!
//! This crate runs one [`cinema_core::ProcessorController`] against a real
//! processor:
//! - Connects over TCP and reconnects with backoff after failures
//! - Accepts host actions as JSON lines on stdin
//! - Publishes variable and feedback updates to subscribers and, optionally,
//!   to stdout
//!
//! ## Architecture
//!
//! The server is built on top of [`cinema_core`] for platform-independent
//! protocol handling, with [`tokio`] providing the async runtime.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    cinema-server                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐ │
//! │  │ console     │  │ stdout      │  │ ProcessorHandle  │ │
//! │  │ (stdin)     │  │ (--output)  │  │ (library API)    │ │
//! │  └──────┬──────┘  └──────▲──────┘  └────────┬─────────┘ │
//! │         │ mpsc           │ broadcast        │ mpsc      │
//! │         ▼                │                  ▼           │
//! │  ┌─────────────────────────────────────────────────────┐│
//! │  │              ProcessorService                       ││
//! │  │  - Connection lifecycle & reconnect policy          ││
//! │  │  - Action dispatch                                  ││
//! │  │  - State update fan-out                             ││
//! │  └─────────────────────────────────────────────────────┘│
//! │         │                                               │
//! │         ▼                                               │
//! │  ┌─────────────────────────────────────────────────────┐│
//! │  │              SocketIoProvider                       ││
//! │  │  - Non-blocking TCP sockets                         ││
//! │  │  - Implements cinema_core::IoProvider               ││
//! │  └─────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`processor::ProcessorService`] - Runs the controller in a subsystem
//! - [`processor::ProcessorHandle`] - Send actions, reconfigure, subscribe
//! - [`socket_io::SocketIoProvider`] - Native I/O for cinema-core
//! - [`console`] - Stdin action reader
//! - [`config`] - Configuration file and command-line overrides
//!
//! ## Example: Starting the Server
//!
//! ```rust,no_run
//! use clap::Parser;
//! use cinema_server::{config, processor::ProcessorService, Cli};
//! use std::time::Duration;
//! use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let args = Cli::parse_from(["cinema-server", "--host", "10.0.0.5", "-m", "cp950"]);
//!     let device = config::load(&args).unwrap();
//!     let (service, handle) = ProcessorService::new(device, !args.no_reconnect);
//!
//!     Toplevel::new(|s| async move {
//!         s.start(SubsystemBuilder::new("processor", |s| service.run(s)));
//!         handle.execute(cinema_core::Action::MuteOn).await.ok();
//!     })
//!     .catch_signals()
//!     .handle_shutdown_requests(Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! }
//! ```
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options. Key options:
//!
//! - `--host`, `-p, --port`, `-m, --model` - Processor to control
//! - `-c, --config` - Configuration file (JSON)
//! - `-v` - Increase verbosity (use multiple times)
//! - `--output` - Write state updates to stdout as JSON lines
//! - `--list-actions` - Print the actions of the configured model and exit

extern crate tokio;

use clap::Parser;
use cinema_core::Model;
use std::path::PathBuf;

pub mod config;
pub mod console;
pub mod processor;
pub mod socket_io;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Configuration file, defaults to config.json in the user config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// IPv4 address of the processor
    #[arg(long)]
    pub host: Option<String>,

    /// Control port, defaults to the model's port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Processor model: cp650, cp750, cp850 or cp950
    #[arg(short, long)]
    pub model: Option<Model>,

    /// Log every command and status line at info level
    #[arg(long, default_value_t = false)]
    pub log_traffic: bool,

    /// Write state updates as JSON lines to stdout
    #[arg(long, default_value_t = false)]
    pub output: bool,

    /// Stay disconnected after the connection is lost
    #[arg(long, default_value_t = false)]
    pub no_reconnect: bool,

    /// Print the actions available for the configured model and exit
    #[arg(long, default_value_t = false)]
    pub list_actions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let args = Cli::parse_from([
            "cinema-server",
            "--host",
            "10.0.0.5",
            "-m",
            "CP750",
            "-p",
            "10001",
            "--output",
        ]);
        assert_eq!(args.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(args.model, Some(Model::Cp750));
        assert_eq!(args.port, Some(10001));
        assert!(args.output);
        assert!(!args.no_reconnect);
    }

    #[test]
    fn test_cli_rejects_unknown_model() {
        assert!(Cli::try_parse_from(["cinema-server", "-m", "cp555"]).is_err());
    }
}
