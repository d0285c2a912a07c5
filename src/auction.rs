use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use crate::types::{Lot, PriceHistory, Region};

/// Failure talking to the auction API. Shown to users as-is.
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auction API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("token response has no access_token")]
    MissingToken,
    #[error("invalid timestamp {0:?} in price history")]
    BadTimestamp(String),
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Read operations the bot needs from the auction service.
#[async_trait]
pub trait AuctionApi: Send + Sync {
    async fn fetch_price_history(
        &self,
        region: Region,
        item_id: &str,
    ) -> Result<PriceHistory, AuctionError>;

    async fn fetch_active_lots(&self, item_id: &str, region: Region)
    -> Result<Vec<Lot>, AuctionError>;
}

/// OAuth client-credentials pair.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    prices: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct PricePoint {
    price: f64,
    time: String,
}

#[derive(Deserialize)]
struct LotsResponse {
    #[serde(default)]
    lots: Vec<Lot>,
}

/// HTTP client for the Stalcraft auction endpoints.
///
/// The bearer token is fetched on first use and kept for the life of the
/// client. There is no refresh: an expired token shows up as a 401
/// [`AuctionError::Status`].
pub struct AuctionClient {
    http: reqwest::Client,
    api_base: Url,
    oauth_url: Url,
    credentials: Credentials,
    token: OnceCell<String>,
}

impl AuctionClient {
    pub fn new(
        api_base: &str,
        oauth_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_http(http, api_base, oauth_url, credentials)
    }

    fn with_http(
        http: reqwest::Client,
        api_base: &str,
        oauth_url: &str,
        credentials: Credentials,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            api_base: Url::parse(api_base)?,
            oauth_url: Url::parse(oauth_url)?,
            credentials,
            token: OnceCell::new(),
        })
    }

    /// `Bearer <token>`, exchanging credentials on the first call.
    async fn bearer(&self) -> Result<&str, AuctionError> {
        let token = self
            .token
            .get_or_try_init(|| async move {
                info!("Requesting auction API token");
                let params = [
                    ("client_id", self.credentials.client_id.as_str()),
                    ("client_secret", self.credentials.client_secret.as_str()),
                    ("grant_type", "client_credentials"),
                    ("scope", ""),
                ];
                let resp = self
                    .http
                    .post(self.oauth_url.clone())
                    .form(&params)
                    .send()
                    .await?;
                let resp = check_status(resp).await?;
                let body: TokenResponse = resp.json().await?;
                let token = body.access_token.ok_or(AuctionError::MissingToken)?;
                Ok::<_, AuctionError>(format!("Bearer {token}"))
            })
            .await?;
        Ok(token.as_str())
    }

    fn endpoint(&self, region: Region, item_id: &str, leaf: &str) -> Result<Url, AuctionError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend([region.as_str(), "auction", item_id, leaf]);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, AuctionError> {
        let bearer = self.bearer().await?;
        debug!("GET {url}");
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, bearer)
            .send()
            .await?;
        check_status(resp).await
    }
}

#[async_trait]
impl AuctionApi for AuctionClient {
    async fn fetch_price_history(
        &self,
        region: Region,
        item_id: &str,
    ) -> Result<PriceHistory, AuctionError> {
        let url = self.endpoint(region, item_id, "history")?;
        let body: HistoryResponse = self.get(url).await?.json().await?;
        let history = group_by_day(body.prices)?;
        debug!("Fetched {} day(s) of history for {item_id}", history.len());
        Ok(history)
    }

    async fn fetch_active_lots(
        &self,
        item_id: &str,
        region: Region,
    ) -> Result<Vec<Lot>, AuctionError> {
        let url = self.endpoint(region, item_id, "lots")?;
        let body: LotsResponse = self.get(url).await?.json().await?;
        debug!("Fetched {} active lot(s) for {item_id}", body.lots.len());
        Ok(body.lots)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AuctionError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AuctionError::Status { status, body })
}

/// Bucket price points by UTC day, keeping response order within a day.
fn group_by_day(points: Vec<PricePoint>) -> Result<PriceHistory, AuctionError> {
    let mut history = PriceHistory::new();
    for point in points {
        let at: DateTime<Utc> = DateTime::parse_from_rfc3339(&point.time)
            .map_err(|_| AuctionError::BadTimestamp(point.time.clone()))?
            .with_timezone(&Utc);
        history.entry(at.date_naive()).or_default().push(point.price);
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn client() -> AuctionClient {
        AuctionClient::new(
            "https://eapi.stalcraft.net",
            "https://exbo.net/oauth/token",
            Credentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn debug_hides_secret() {
        let shown = format!("{:?}", client().credentials);
        assert!(shown.contains("\"id\""));
        assert!(!shown.contains("secret\""));
    }

    #[test]
    fn endpoints() {
        let c = client();
        assert_eq!(
            c.endpoint(Region::Ru, "y1q9", "history").unwrap().as_str(),
            "https://eapi.stalcraft.net/ru/auction/y1q9/history"
        );
        assert_eq!(
            c.endpoint(Region::Eu, "y1q9", "lots").unwrap().as_str(),
            "https://eapi.stalcraft.net/eu/auction/y1q9/lots"
        );
    }

    #[test]
    fn endpoint_escapes_item_id() {
        let c = client();
        let url = c.endpoint(Region::Ru, "a/b", "lots").unwrap();
        assert_eq!(url.as_str(), "https://eapi.stalcraft.net/ru/auction/a%2Fb/lots");
    }

    #[test]
    fn history_groups_by_utc_day() {
        let body: HistoryResponse = serde_json::from_value(json!({
            "total": 4,
            "prices": [
                {"amount": 1, "price": 1000, "time": "2024-03-01T10:00:00Z"},
                {"amount": 1, "price": 3000, "time": "2024-03-01T23:30:00Z"},
                {"amount": 2, "price": 1500.5, "time": "2024-02-29T12:00:00.123Z"},
                {"amount": 1, "price": 2000, "time": "2024-03-02T01:00:00+03:00"}
            ]
        }))
        .unwrap();
        let history = group_by_day(body.prices).unwrap();
        let days: Vec<NaiveDate> = history.keys().copied().collect();
        assert_eq!(days, vec![day(2024, 2, 29), day(2024, 3, 1)]);
        assert_eq!(history[&day(2024, 3, 1)], vec![1000.0, 3000.0, 2000.0]);
        assert_eq!(history[&day(2024, 2, 29)], vec![1500.5]);
    }

    #[test]
    fn history_without_prices_is_empty() {
        let body: HistoryResponse = serde_json::from_value(json!({})).unwrap();
        assert!(group_by_day(body.prices).unwrap().is_empty());
    }

    #[test]
    fn history_rejects_bad_time() {
        let points = vec![PricePoint {
            price: 1.0,
            time: "yesterday".into(),
        }];
        assert!(matches!(
            group_by_day(points),
            Err(AuctionError::BadTimestamp(t)) if t == "yesterday"
        ));
    }

    #[test]
    fn lots_response_defaults() {
        let body: LotsResponse = serde_json::from_value(json!({"total": 0})).unwrap();
        assert!(body.lots.is_empty());

        let body: LotsResponse = serde_json::from_value(json!({
            "total": 2,
            "lots": [
                {"itemId": "y1q9", "amount": 1, "startPrice": 900, "currentPrice": 1000,
                 "buyoutPrice": 5000, "startTime": "x", "endTime": "y"},
                {"price": 700, "amount": 3}
            ]
        }))
        .unwrap();
        assert_eq!(body.lots.len(), 2);
        assert_eq!(body.lots[0].price, 1000.0);
        assert_eq!(body.lots[0].buyout_price, Some(5000.0));
        assert_eq!(body.lots[1].amount, 3);
    }

    #[test]
    fn token_response_without_token() {
        let body: TokenResponse = serde_json::from_value(json!({"error": "nope"})).unwrap();
        assert!(body.access_token.is_none());
    }

    /// Local stand-in for the OAuth and auction endpoints. Counts token
    /// exchanges and only serves auction data to `Bearer abc`.
    async fn stub_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let token_requests = Arc::new(AtomicUsize::new(0));
        let counter = token_requests.clone();
        tokio::spawn(async move {
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                tokio::spawn(serve_one(socket, counter.clone()));
            }
        });
        (base, token_requests)
    }

    async fn serve_one(mut socket: TcpStream, token_requests: Arc<AtomicUsize>) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or_default().to_string();
        let mut content_length = 0;
        let mut authorized = false;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap(),
                "authorization" => authorized = value.trim() == "Bearer abc",
                _ => {}
            }
        }
        while buf.len() < head_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default();
        let path = parts.next().unwrap_or_default();
        let (status, body) = match (method, path) {
            ("POST", "/oauth/token") => {
                token_requests.fetch_add(1, Ordering::SeqCst);
                ("200 OK", json!({"access_token": "abc"}).to_string())
            }
            _ if !authorized => ("401 Unauthorized", "missing token".to_string()),
            ("GET", "/ru/auction/y1q9/history") => (
                "200 OK",
                json!({"total": 2, "prices": [
                    {"amount": 1, "price": 1000, "time": "2024-03-01T10:00:00Z"},
                    {"amount": 1, "price": 3000, "time": "2024-03-01T12:00:00Z"}
                ]})
                .to_string(),
            ),
            ("GET", "/ru/auction/y1q9/lots") => (
                "200 OK",
                json!({"total": 1, "lots": [
                    {"itemId": "y1q9", "amount": 2, "currentPrice": 900, "buyoutPrice": 1500}
                ]})
                .to_string(),
            ),
            ("GET", "/ru/auction/gone/lots") => ("401 Unauthorized", "token expired".to_string()),
            _ => ("404 Not Found", String::new()),
        };
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    }

    fn stub_client(base: &str) -> AuctionClient {
        AuctionClient::with_http(
            reqwest::Client::builder().no_proxy().build().unwrap(),
            base,
            &format!("{base}/oauth/token"),
            Credentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn token_is_fetched_once_and_reused() {
        let (base, token_requests) = stub_server().await;
        let client = stub_client(&base);

        let history = client.fetch_price_history(Region::Ru, "y1q9").await.unwrap();
        assert_eq!(history[&day(2024, 3, 1)], vec![1000.0, 3000.0]);

        let lots = client.fetch_active_lots("y1q9", Region::Ru).await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].price, 900.0);
        assert_eq!(lots[0].buyout_price, Some(1500.0));

        assert_eq!(token_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let (base, token_requests) = stub_server().await;
        let client = stub_client(&base);

        let err = client.fetch_active_lots("gone", Region::Ru).await.unwrap_err();
        assert!(matches!(
            &err,
            AuctionError::Status { status, body }
                if *status == StatusCode::UNAUTHORIZED && body == "token expired"
        ));
        assert_eq!(
            err.to_string(),
            "auction API returned 401 Unauthorized: token expired"
        );

        // the cached token is kept after a failed call
        client.fetch_active_lots("y1q9", Region::Ru).await.unwrap();
        assert_eq!(token_requests.load(Ordering::SeqCst), 1);
    }
}
