//! Rate API client
//!
//! Queries `GET {base}/api/v1/voip_rate/` with the caller's own Basic-auth
//! credentials and parses the bracketed list body into rate rows.

use crate::parser::parse_rate_list;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, warn};
use voipbill_core::error::{BillingError, Result};
use voipbill_core::types::{RateRow, RateSortField, SortOrder};

/// Path of the rate listing endpoint, relative to the API base URL
pub const RATE_API_PATH: &str = "/api/v1/voip_rate/";

/// Basic-auth credentials forwarded to the rate API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Parameters of one rate listing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateQuery {
    /// Only rates applicable to this dialed prefix; empty means all
    pub dialcode: Option<String>,
    pub sort_field: RateSortField,
    pub sort_order: SortOrder,
}

impl RateQuery {
    pub fn new(sort_field: RateSortField, sort_order: SortOrder) -> Self {
        Self {
            dialcode: None,
            sort_field,
            sort_order,
        }
    }

    /// Set the dialcode filter; blank strings clear it
    pub fn with_dialcode(mut self, dialcode: impl Into<String>) -> Self {
        let dialcode = dialcode.into();
        self.dialcode = if dialcode.trim().is_empty() {
            None
        } else {
            Some(dialcode.trim().to_string())
        };
        self
    }
}

/// HTTP client for the rate API
#[derive(Debug, Clone)]
pub struct RateApiClient {
    base_url: Url,
    client: Client,
}

impl RateApiClient {
    /// Create a client for the API rooted at `base_url`
    ///
    /// The base path is treated as a directory, with or without a trailing
    /// slash.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| BillingError::Config(format!("invalid rate API URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BillingError::Config(format!(
                "rate API URL {base_url} cannot be a base"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the request URL for a query
    pub fn rate_url(&self, query: &RateQuery) -> Result<Url> {
        let mut url = self
            .base_url
            .join(RATE_API_PATH.trim_start_matches('/'))
            .map_err(|e| BillingError::Config(format!("invalid rate API URL: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(dialcode) = &query.dialcode {
                pairs.append_pair("dialcode", dialcode);
            }
            pairs.append_pair("sort_field", query.sort_field.as_str());
            pairs.append_pair("sort_order", query.sort_order.as_api_str());
        }
        Ok(url)
    }

    /// Fetch and parse the rate listing
    pub async fn fetch_rates(
        &self,
        query: &RateQuery,
        credentials: &Credentials,
    ) -> Result<Vec<RateRow>> {
        let url = self.rate_url(query)?;
        debug!("Fetching rates from {}", url);

        let response = self
            .client
            .get(url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Rate API answered {} for user {}", status, credentials.username);
            return Err(BillingError::Upstream {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let rows = parse_rate_list(&body)?;
        debug!("Rate API returned {} rows", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> RateApiClient {
        RateApiClient::new(&server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rate_url_parameters() {
        let client = RateApiClient::new("http://localhost:8000", Duration::from_secs(1)).unwrap();
        let query = RateQuery::new(RateSortField::RetailRate, SortOrder::Desc).with_dialcode("34");
        let url = client.rate_url(&query).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/v1/voip_rate/?dialcode=34&sort_field=retail_rate&sort_order=DESC"
        );

        let query = RateQuery::new(RateSortField::Prefix, SortOrder::Asc).with_dialcode("  ");
        let url = client.rate_url(&query).unwrap();
        assert_eq!(url.query(), Some("sort_field=prefix&sort_order=ASC"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(RateApiClient::new("not a url", Duration::from_secs(1)).is_err());
        assert!(RateApiClient::new("mailto:rates@example.com", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let query = RateQuery::new(RateSortField::Prefix, SortOrder::Asc);
        for base in ["http://host/billing", "http://host/billing/"] {
            let client = RateApiClient::new(base, Duration::from_secs(1)).unwrap();
            assert_eq!(client.base_url().as_str(), "http://host/billing/");
            let url = client.rate_url(&query).unwrap();
            assert_eq!(
                url.as_str(),
                "http://host/billing/api/v1/voip_rate/?sort_field=prefix&sort_order=ASC"
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_rates_sends_basic_auth_and_parses() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/voip_rate/")
                    .query_param("dialcode", "32")
                    .query_param("sort_field", "prefix")
                    .query_param("sort_order", "ASC")
                    // alice:secret
                    .header("authorization", "Basic YWxpY2U6c2VjcmV0");
                then.status(200).body(
                    "[{'prefix': 32, 'retail_rate': 0.0250, 'prefix__destination': 'Belgium'}]",
                );
            })
            .await;

        let client = client_for(&server);
        let query = RateQuery::default().with_dialcode("32");
        let rows = client
            .fetch_rates(&query, &Credentials::new("alice", "secret"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows, vec![RateRow::new("32", "Belgium", "0.0250")]);
    }

    #[tokio::test]
    async fn test_fetch_rates_maps_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/voip_rate/");
                then.status(401).body("Unauthorized");
            })
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_rates(&RateQuery::default(), &Credentials::new("bob", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Upstream { status: 401, .. }));
    }

    #[test]
    fn test_fetch_rates_blocking_empty_listing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/voip_rate/");
            then.status(200).body("[]");
        });

        let client = client_for(&server);
        let rows = tokio_test::block_on(
            client.fetch_rates(&RateQuery::default(), &Credentials::new("alice", "secret")),
        )
        .unwrap();
        assert!(rows.is_empty());
    }
}
