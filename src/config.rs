//! Server configuration
//!
//! Resolved from [`ServeArgs`](crate::cli::ServeArgs), which clap fills from
//! flags or `VOIPBILL_*` environment variables.

use crate::cli::{ServeArgs, TimezoneArgs};
use std::path::PathBuf;
use std::time::Duration;
use voipbill_core::error::{BillingError, Result};
use voipbill_core::timezone::TimezoneConfig;

/// Settings of a running web server
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    /// Base URL of the rate API; `None` means this server's own API
    pub rate_api_url: Option<String>,
    pub users_path: PathBuf,
    pub rate_book_path: Option<PathBuf>,
    pub analytic_data: Option<PathBuf>,
    pub collection: String,
    pub page_size: usize,
    pub http_timeout: Duration,
    pub session_ttl: Duration,
    pub max_sessions: usize,
    pub timezone: TimezoneConfig,
}

impl AppConfig {
    pub fn from_args(args: &ServeArgs, tz_args: &TimezoneArgs) -> Result<Self> {
        if args.page_size == 0 {
            return Err(BillingError::Config("page size must be at least 1".into()));
        }
        if args.http_timeout_secs == 0 {
            return Err(BillingError::Config("HTTP timeout must be at least 1 second".into()));
        }
        if args.max_sessions == 0 {
            return Err(BillingError::Config("max sessions must be at least 1".into()));
        }

        let rate_api_url = args
            .rate_api_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            bind: args.bind.trim().to_string(),
            port: args.port,
            rate_api_url,
            users_path: args.users.clone(),
            rate_book_path: args.rate_book.clone(),
            analytic_data: args.analytic_data.clone(),
            collection: args.collection.clone(),
            page_size: args.page_size,
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            session_ttl: Duration::from_secs(args.session_ttl_secs),
            max_sessions: args.max_sessions,
            timezone: TimezoneConfig::from_cli(tz_args.timezone.as_deref(), tz_args.utc)?,
        })
    }

    /// `bind:port` as accepted by a TCP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Rate API base URL, falling back to the server's own address
    pub fn rate_api_base(&self, local_addr: &std::net::SocketAddr) -> String {
        match &self.rate_api_url {
            Some(url) => url.clone(),
            None => format!("http://{local_addr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_args() -> ServeArgs {
        ServeArgs {
            bind: " 0.0.0.0 ".to_string(),
            port: 8080,
            rate_api_url: Some("  ".to_string()),
            users: PathBuf::from("users.json"),
            rate_book: None,
            analytic_data: None,
            collection: "daily_analytic".to_string(),
            page_size: 25,
            http_timeout_secs: 5,
            session_ttl_secs: 600,
            max_sessions: 100,
        }
    }

    #[test]
    fn test_from_args() {
        let tz = TimezoneArgs {
            timezone: None,
            utc: true,
        };
        let config = AppConfig::from_args(&serve_args(), &tz).unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert!(config.rate_api_url.is_none());
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.session_ttl, Duration::from_secs(600));
        assert_eq!(config.max_sessions, 100);
        assert!(config.timezone.is_utc);

        let local: std::net::SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(config.rate_api_base(&local), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_explicit_rate_api_url_wins() {
        let mut args = serve_args();
        args.rate_api_url = Some("http://rates.internal:8000".to_string());
        let config = AppConfig::from_args(&args, &TimezoneArgs::default()).unwrap();
        let local: std::net::SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(config.rate_api_base(&local), "http://rates.internal:8000");
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let mut args = serve_args();
        args.page_size = 0;
        assert!(matches!(
            AppConfig::from_args(&args, &TimezoneArgs::default()),
            Err(BillingError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_zero_max_sessions() {
        let mut args = serve_args();
        args.max_sessions = 0;
        assert!(matches!(
            AppConfig::from_args(&args, &TimezoneArgs::default()),
            Err(BillingError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let tz = TimezoneArgs {
            timezone: Some("Mars/Olympus".to_string()),
            utc: false,
        };
        assert!(AppConfig::from_args(&serve_args(), &tz).is_err());
    }
}
