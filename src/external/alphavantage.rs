use crate::config::ProviderConfig;
use crate::external::price_provider::{FetchError, OutputSize, PriceProvider, RawSeries};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AvDailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<BTreeMap<String, Value>>,

    // When rate-limited Alpha Vantage returns:
    // { "Note": "Thank you for using Alpha Vantage! ... 5 calls per minute ..." }
    #[serde(rename = "Note")]
    note: Option<String>,

    // Newer quota notices use this key instead of "Note".
    #[serde(rename = "Information")]
    information: Option<String>,

    // When invalid:
    // { "Error Message": "Invalid API call. ..." }
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

/// Classifies a response body. Soft errors are detected before the
/// time-series key is trusted.
pub fn classify_daily_response(body: &str) -> Result<RawSeries, FetchError> {
    let parsed: AvDailyResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::UpstreamData(format!("unrecognized response shape: {}", e)))?;

    if let Some(msg) = parsed.error_message {
        return Err(FetchError::UpstreamData(msg));
    }

    if let Some(note) = parsed.note {
        return Err(FetchError::RateLimited(note));
    }

    // "Information" also carries non-quota notices such as the premium-only
    // `outputsize=full` message.
    if let Some(info) = parsed.information {
        if is_quota_notice(&info) {
            return Err(FetchError::RateLimited(info));
        }
        return Err(FetchError::UpstreamData(info));
    }

    let days = parsed
        .time_series
        .ok_or_else(|| FetchError::UpstreamData("missing time series".into()))?;

    Ok(RawSeries { days })
}

const QUOTA_MARKERS: &[&str] = &[
    "rate limit",
    "call frequency",
    "calls per",
    "requests per",
    "limit reached",
];

fn is_quota_notice(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    QUOTA_MARKERS.iter().any(|marker| message.contains(marker))
}

#[async_trait]
impl PriceProvider for AlphaVantageProvider {
    async fn fetch_series(
        &self,
        symbol: &str,
        output_size: OutputSize,
    ) -> Result<RawSeries, FetchError> {
        info!("Fetching data for {} (outputsize={})", symbol, output_size);

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", output_size.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP status {}", status)));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        match classify_daily_response(&body) {
            Ok(series) => {
                info!("Fetched {} days of data for {}", series.len(), symbol);
                Ok(series)
            }
            Err(e) => {
                warn!("Provider rejected request for {}: {}", symbol, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    const SUCCESS_BODY: &str = r#"{
        "Meta Data": {"2. Symbol": "JPM"},
        "Time Series (Daily)": {
            "2024-01-02": {"1. open": "151.0", "2. high": "154.0", "3. low": "150.5", "4. close": "153.0", "5. volume": "1000"},
            "2024-01-01": {"1. open": "149.0", "2. high": "151.0", "3. low": "148.0", "4. close": "150.0", "5. volume": "900"}
        }
    }"#;

    /// Serves exactly one HTTP response and reports the request line it saw.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if n == 0 || buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let request = String::from_utf8_lossy(&buf).to_string();
            let request_line = request.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(request_line);

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        (format!("http://{}/query", addr), rx)
    }

    fn provider(base_url: String) -> AlphaVantageProvider {
        AlphaVantageProvider::new(&ProviderConfig {
            api_key: "demo".to_string(),
            base_url,
        })
    }

    #[test]
    fn test_success_shape_yields_series() {
        let series = classify_daily_response(SUCCESS_BODY).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.days.contains_key("2024-01-01"));
    }

    #[test]
    fn test_note_is_rate_limited() {
        let err = classify_daily_response(r#"{"Note": "5 calls per minute"}"#).unwrap_err();
        assert_eq!(err, FetchError::RateLimited("5 calls per minute".to_string()));
    }

    #[test]
    fn test_quota_information_is_rate_limited() {
        let body = r#"{"Information": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."}"#;
        assert_eq!(classify_daily_response(body).unwrap_err().kind(), "rate_limited");

        let err = classify_daily_response(r#"{"Information": "daily limit reached"}"#).unwrap_err();
        assert_eq!(err.kind(), "rate_limited");
    }

    #[test]
    fn test_premium_information_is_upstream_error() {
        let body = r#"{"Information": "The **outputsize=full** parameter value is a premium feature for the TIME_SERIES_DAILY endpoint. You may subscribe to any of the premium plans to instantly unlock all premium features"}"#;
        let err = classify_daily_response(body).unwrap_err();
        assert_eq!(err.kind(), "upstream_data");
        assert!(err.to_string().contains("premium"));
    }

    #[test]
    fn test_error_message_is_upstream_error() {
        let err = classify_daily_response(r#"{"Error Message": "Invalid API call."}"#).unwrap_err();
        assert_eq!(err, FetchError::UpstreamData("Invalid API call.".to_string()));
    }

    #[test]
    fn test_error_message_wins_over_time_series() {
        let body = r#"{"Error Message": "bad", "Time Series (Daily)": {}}"#;
        assert_eq!(classify_daily_response(body).unwrap_err().kind(), "upstream_data");
    }

    #[test]
    fn test_unrecognized_shapes_are_upstream_errors() {
        for body in ["{}", "not json", "[1, 2]", r#"{"Time Series (Daily)": "oops"}"#] {
            let err = classify_daily_response(body).unwrap_err();
            assert_eq!(err.kind(), "upstream_data", "body: {}", body);
        }
    }

    #[test]
    fn test_malformed_day_does_not_reject_series() {
        let body = r#"{"Time Series (Daily)": {"2024-01-01": 42, "2024-01-02": {"4. close": "1"}}}"#;
        assert_eq!(classify_daily_response(body).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_sends_expected_query() {
        let (url, request_line) = serve_once("200 OK", SUCCESS_BODY).await;

        let series = provider(url).fetch_series("JPM", OutputSize::Full).await.unwrap();
        assert_eq!(series.len(), 2);

        let line = request_line.await.unwrap();
        assert!(line.starts_with("GET /query?"), "request line: {}", line);
        assert!(line.contains("function=TIME_SERIES_DAILY"));
        assert!(line.contains("symbol=JPM"));
        assert!(line.contains("outputsize=full"));
        assert!(line.contains("apikey=demo"));
    }

    #[tokio::test]
    async fn test_rate_limit_over_http_is_typed() {
        let (url, _rx) = serve_once("200 OK", r#"{"Note": "slow down"}"#).await;

        let err = provider(url).fetch_series("BAC", OutputSize::Compact).await.unwrap_err();
        assert_eq!(err, FetchError::RateLimited("slow down".to_string()));
    }

    #[tokio::test]
    async fn test_http_error_status_is_transport_error() {
        let (url, _rx) = serve_once("503 Service Unavailable", "{}").await;

        let err = provider(url).fetch_series("WFC", OutputSize::Compact).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider(format!("http://{}/query", addr))
            .fetch_series("GS", OutputSize::Compact)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
    }
}
