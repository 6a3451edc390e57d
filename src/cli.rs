//! CLI interface for voipbill
//!
//! This module defines the command-line interface using clap. Every option
//! that configures a deployment can also be supplied through a `VOIPBILL_*`
//! environment variable.
//!
//! # Example
//!
//! ```bash
//! # Serve the web views and the rate API on port 8000
//! voipbill serve --users users.json --rate-book rates.json --analytic-data daily.jsonl
//!
//! # Daily billing for March 2013, switch 1, as JSON
//! voipbill --json daily --from 2013-03-01 --to 2013-03-31 --switch 1
//!
//! # Cheapest rate per retail plan for a dialed number
//! voipbill simulate --voipplan 1 34650123456
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use voipbill_analytics::pipeline::DAILY_ANALYTIC;
use voipbill_rates::csv_export::EXPORT_FILENAME;

/// VoIP rate listing, call simulation and billing reports
#[derive(Parser, Debug, Clone)]
#[command(name = "voipbill")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub timezone_args: TimezoneArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Timezone used to place analytic days on the epoch
#[derive(Args, Debug, Clone, Default)]
pub struct TimezoneArgs {
    /// Timezone for day boundaries (e.g. "Europe/Madrid", "UTC").
    /// If not specified, uses TZ or the system's local timezone
    #[arg(long, short = 'z', global = true)]
    pub timezone: Option<String>,

    /// Use UTC for day boundaries (overrides --timezone)
    #[arg(long, global = true)]
    pub utc: bool,
}

/// Where billing reports read analytic documents from
#[derive(Args, Debug, Clone)]
pub struct AnalyticArgs {
    /// JSON Lines file with daily analytic documents
    #[arg(long, env = "VOIPBILL_ANALYTIC_DATA")]
    pub analytic_data: PathBuf,

    /// Collection name the documents are loaded into
    #[arg(long, env = "VOIPBILL_COLLECTION", default_value = DAILY_ANALYTIC)]
    pub collection: String,
}

/// Filters shared by the billing reports
#[derive(Args, Debug, Clone)]
pub struct ReportFilterArgs {
    /// Restrict to one switch; 0 means all switches
    #[arg(long, default_value = "0")]
    pub switch: String,

    /// Restrict to one account code
    #[arg(long)]
    pub accountcode: Option<String>,
}

/// Rate book and plan selection
#[derive(Args, Debug, Clone)]
pub struct RateBookArgs {
    /// JSON rate book with VoIP plans and retail plans
    #[arg(long, env = "VOIPBILL_RATE_BOOK")]
    pub rate_book: PathBuf,

    /// VoIP plan to price against
    #[arg(long)]
    pub voipplan: u32,
}

/// Dialcode filter and ordering for rate listings
#[derive(Args, Debug, Clone)]
pub struct RateListingArgs {
    /// Only rates whose prefix leads this dialcode
    #[arg(long)]
    pub dialcode: Option<String>,

    /// Sort column (prefix, retail_rate, destination); a leading '-' sorts descending
    #[arg(long, default_value = "prefix", allow_hyphen_values = true)]
    pub sort_by: String,
}

/// Options of the web server
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "VOIPBILL_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to listen on
    #[arg(long, env = "VOIPBILL_PORT", default_value = "8000")]
    pub port: u16,

    /// Base URL of the rate API; defaults to this server's own API
    #[arg(long, env = "VOIPBILL_RATE_API_URL")]
    pub rate_api_url: Option<String>,

    /// JSON file with user accounts
    #[arg(long, env = "VOIPBILL_USERS")]
    pub users: PathBuf,

    /// JSON rate book served by the rate API and used by the simulator
    #[arg(long, env = "VOIPBILL_RATE_BOOK")]
    pub rate_book: Option<PathBuf>,

    /// JSON Lines file with daily analytic documents
    #[arg(long, env = "VOIPBILL_ANALYTIC_DATA")]
    pub analytic_data: Option<PathBuf>,

    /// Analytic collection name
    #[arg(long, env = "VOIPBILL_COLLECTION", default_value = DAILY_ANALYTIC)]
    pub collection: String,

    /// Rates per page in the rate listing
    #[arg(long, env = "VOIPBILL_PAGE_SIZE", default_value = "10")]
    pub page_size: usize,

    /// Timeout for rate API requests, in seconds
    #[arg(long, env = "VOIPBILL_HTTP_TIMEOUT_SECS", default_value = "30")]
    pub http_timeout_secs: u64,

    /// Drop browser sessions idle for longer than this, in seconds
    #[arg(long, env = "VOIPBILL_SESSION_TTL_SECS", default_value = "1800")]
    pub session_ttl_secs: u64,

    /// Most browser sessions kept at once
    #[arg(long, env = "VOIPBILL_MAX_SESSIONS", default_value = "10000")]
    pub max_sessions: usize,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the web views and the rate API
    Serve(ServeArgs),

    /// Daily buy/sell billing report
    Daily {
        #[command(flatten)]
        analytic: AnalyticArgs,

        #[command(flatten)]
        filter: ReportFilterArgs,

        /// First day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,
    },

    /// Hourly buy/sell billing report for a single day
    Hourly {
        #[command(flatten)]
        analytic: AnalyticArgs,

        #[command(flatten)]
        filter: ReportFilterArgs,

        /// Day to report (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// List retail rates of a VoIP plan
    Rates {
        #[command(flatten)]
        book: RateBookArgs,

        #[command(flatten)]
        listing: RateListingArgs,
    },

    /// Export retail rates of a VoIP plan as tab-separated CSV
    ExportRates {
        #[command(flatten)]
        book: RateBookArgs,

        #[command(flatten)]
        listing: RateListingArgs,

        /// Output file
        #[arg(long, short = 'o', default_value = EXPORT_FILENAME)]
        output: PathBuf,
    },

    /// Price a dialed number against every retail plan of a VoIP plan
    Simulate {
        #[command(flatten)]
        book: RateBookArgs,

        /// Dialed destination number
        destination_no: String,
    },
}
