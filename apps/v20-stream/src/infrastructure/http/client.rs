//! Streaming HTTP client.
//!
//! Builds the v20 streaming endpoints, attaches credentials and opens
//! [`StreamSession`]s over `reqwest`.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Url};

use crate::application::pool::RecordPool;
use crate::application::ports::{FrameRouter, PriceHandler, TransactionHandler};
use crate::domain::pricing::Price;
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::router::{PricingRouter, TransactionRouter};
use crate::infrastructure::stream::{SessionOptions, StreamError, StreamSession};

const USER_AGENT: &str = concat!("v20-stream/", env!("CARGO_PKG_VERSION"));

/// Build `{base}/v3/accounts/{account}/pricing/stream?instruments=..&snapshot=..`.
///
/// # Errors
///
/// Returns [`StreamError::InvalidRequest`] if the base URL is unusable, the
/// account ID is empty, or no instrument is given.
pub fn pricing_stream_url<S: AsRef<str>>(
    base_url: &str,
    account_id: &str,
    instruments: &[S],
    snapshot: bool,
) -> Result<Url, StreamError> {
    let instruments: Vec<&str> = instruments
        .iter()
        .map(|i| i.as_ref().trim())
        .filter(|i| !i.is_empty())
        .collect();
    if instruments.is_empty() {
        return Err(StreamError::InvalidRequest(
            "at least one instrument is required".to_string(),
        ));
    }

    let mut url = account_endpoint(base_url, account_id, &["pricing", "stream"])?;
    url.query_pairs_mut()
        .append_pair("instruments", &instruments.join(","))
        .append_pair("snapshot", if snapshot { "true" } else { "false" });
    Ok(url)
}

/// Build `{base}/v3/accounts/{account}/transactions/stream`.
///
/// # Errors
///
/// Returns [`StreamError::InvalidRequest`] if the base URL is unusable or
/// the account ID is empty.
pub fn transaction_stream_url(base_url: &str, account_id: &str) -> Result<Url, StreamError> {
    account_endpoint(base_url, account_id, &["transactions", "stream"])
}

fn account_endpoint(base_url: &str, account_id: &str, tail: &[&str]) -> Result<Url, StreamError> {
    let account_id = account_id.trim();
    if account_id.is_empty() {
        return Err(StreamError::InvalidRequest("account ID is empty".to_string()));
    }

    let mut url = Url::parse(base_url)
        .map_err(|e| StreamError::InvalidRequest(format!("invalid base URL {base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| StreamError::InvalidRequest(format!("{base_url} cannot be a base URL")))?
        .pop_if_empty()
        .extend(["v3", "accounts", account_id])
        .extend(tail);
    Ok(url)
}

/// Request headers every stream carries.
///
/// # Errors
///
/// Returns [`StreamError::InvalidHeader`] if the token is not a valid header
/// value.
pub fn stream_headers(token: &str) -> Result<HeaderMap, StreamError> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| StreamError::InvalidHeader(format!("authorization: {e}")))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert("Accept-Datetime-Format", HeaderValue::from_static("RFC3339"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Opens pricing and transaction streams for one account.
#[derive(Debug, Clone)]
pub struct StreamClient {
    client: Client,
    base_url: String,
    account_id: String,
    headers: HeaderMap,
    options: SessionOptions,
}

impl StreamClient {
    /// Create a new client from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, StreamError> {
        let headers = stream_headers(config.credentials.token())?;

        // No total timeout: a stream lives until closed.
        let client = Client::builder()
            .connect_timeout(config.http.connect_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.stream_base_url().to_string(),
            account_id: config.credentials.account_id().to_string(),
            headers,
            options: config.stream.session_options(),
        })
    }

    /// Stream host requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Options applied to every session this client opens.
    #[must_use]
    pub const fn session_options(&self) -> &SessionOptions {
        &self.options
    }

    /// Replace the session options, e.g. to install a reporting policy.
    #[must_use]
    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Open a pricing stream with a private record pool.
    ///
    /// # Errors
    ///
    /// See [`StreamSession::open`]; also fails on an empty instrument list.
    pub async fn stream_pricing<S, H>(
        &self,
        instruments: &[S],
        snapshot: bool,
        handler: H,
    ) -> Result<StreamSession, StreamError>
    where
        S: AsRef<str> + Sync,
        H: PriceHandler,
    {
        let url = pricing_stream_url(&self.base_url, &self.account_id, instruments, snapshot)?;
        self.open(url, PricingRouter::new(handler)).await
    }

    /// Open a pricing stream lending records from `pool`.
    ///
    /// # Errors
    ///
    /// See [`StreamClient::stream_pricing`].
    pub async fn stream_pricing_with_pool<S, H>(
        &self,
        instruments: &[S],
        snapshot: bool,
        handler: H,
        pool: Arc<RecordPool<Price>>,
    ) -> Result<StreamSession, StreamError>
    where
        S: AsRef<str> + Sync,
        H: PriceHandler,
    {
        let url = pricing_stream_url(&self.base_url, &self.account_id, instruments, snapshot)?;
        self.open(url, PricingRouter::with_pool(handler, pool)).await
    }

    /// Open the account's transaction stream.
    ///
    /// # Errors
    ///
    /// See [`StreamSession::open`].
    pub async fn stream_transactions<H>(&self, handler: H) -> Result<StreamSession, StreamError>
    where
        H: TransactionHandler,
    {
        let url = transaction_stream_url(&self.base_url, &self.account_id)?;
        self.open(url, TransactionRouter::new(handler)).await
    }

    async fn open<F>(&self, url: Url, router: F) -> Result<StreamSession, StreamError>
    where
        F: FrameRouter,
    {
        StreamSession::open(
            &self.client,
            url.as_str(),
            self.headers.clone(),
            router,
            self.options.clone(),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pricing_url() {
        let url = pricing_stream_url(
            "https://stream-fxpractice.oanda.com",
            "101-004-1435156-001",
            &["EUR_USD", " USD_JPY "],
            true,
        )
        .unwrap();

        assert_eq!(url.path(), "/v3/accounts/101-004-1435156-001/pricing/stream");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![
                ("instruments".to_string(), "EUR_USD,USD_JPY".to_string()),
                ("snapshot".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn transaction_url_keeps_base_path() {
        let url = transaction_stream_url("http://127.0.0.1:9000/proxy/", "001").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/proxy/v3/accounts/001/transactions/stream"
        );
    }

    #[test]
    fn account_id_is_path_encoded() {
        let url = transaction_stream_url("https://example.com", "a/b").unwrap();
        assert_eq!(url.path(), "/v3/accounts/a%2Fb/transactions/stream");
    }

    #[test]
    fn construction_errors() {
        let no_instruments: &[&str] = &[];
        assert!(matches!(
            pricing_stream_url("https://example.com", "001", no_instruments, false),
            Err(StreamError::InvalidRequest(_))
        ));
        assert!(matches!(
            pricing_stream_url("https://example.com", "001", &["", " "], false),
            Err(StreamError::InvalidRequest(_))
        ));
        assert!(matches!(
            transaction_stream_url("https://example.com", "  "),
            Err(StreamError::InvalidRequest(_))
        ));
        assert!(matches!(
            transaction_stream_url("not a url", "001"),
            Err(StreamError::InvalidRequest(_))
        ));
    }

    #[test]
    fn headers_carry_bearer_token() {
        let headers = stream_headers("tok-123").unwrap();

        assert_eq!(headers[AUTHORIZATION], "Bearer tok-123");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers["Accept-Datetime-Format"], "RFC3339");
        assert!(matches!(
            stream_headers("bad\ntoken"),
            Err(StreamError::InvalidHeader(_))
        ));
    }
}
