//! voipbill - VoIP rate listing, call simulation and billing reports
//!
//! This library provides the web layer and command-line front end over the
//! workspace crates:
//! - `voipbill-rates`: rate API client, rate book, simulator and CSV export
//! - `voipbill-analytics`: aggregation pipelines and daily/hourly reports
//! - `voipbill-terminal`: table and JSON output
//!
//! # Examples
//!
//! ```no_run
//! use voipbill::{cli::TimezoneArgs, config::AppConfig, server};
//!
//! # async fn example(args: voipbill::cli::ServeArgs) -> voipbill::Result<()> {
//! let config = AppConfig::from_args(&args, &TimezoneArgs::default())?;
//! let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
//! let state = server::AppState::from_config(config, listener.local_addr()?).await?;
//! server::serve(listener, state).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod server;

// Re-export commonly used types
pub use voipbill_core::{BillingError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
