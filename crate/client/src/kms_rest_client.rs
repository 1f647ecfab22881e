use std::{path::PathBuf, time::Duration};

use reqwest::{
    Certificate, Client, ClientBuilder, Identity, Method, Response, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
    tls,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use crate::{
    KmsClientError,
    encodings::private_key_pem_to_pkcs8,
    error::result::{KmsClientResult, KmsClientResultHelper},
    file_utils::read_bytes_from_file,
};

/// Number of retries applied when none is configured
pub const DEFAULT_RETRY: u32 = 4;

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_MAX: Duration = Duration::from_secs(5);

/// How the client authenticates to the REST API
#[derive(Clone, Debug)]
pub enum RestAuth {
    /// Mutual TLS with a PEM certificate and private key
    Mtls { cert: PathBuf, key: PathBuf },
    /// Bearer token
    Token { token: String },
}

#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL of the KMS, e.g. `https://eu-west-rbx.okms.ovh.net`
    pub endpoint: String,
    /// Extra CA bundle (PEM), added to the system roots
    pub ca: Option<PathBuf>,
    pub auth: RestAuth,
    /// Domain the requests are sent to
    pub okms_id: Uuid,
    pub retry: u32,
    pub timeout: Option<Duration>,
}

/// Client of the KMS REST API.
/// Every route is rooted at `/api/{okmsId}`.
#[derive(Clone)]
pub struct KmsRestClient {
    client: Client,
    base_url: Url,
    retry: u32,
}

/// Error body returned by the REST API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error_code: Option<i64>,
    #[serde(default)]
    errors: Vec<String>,
    error_id: Option<String>,
    request_id: Option<String>,
}

impl KmsRestClient {
    pub fn instantiate(config: &RestClientConfig) -> KmsClientResult<Self> {
        let endpoint = config
            .endpoint
            .strip_suffix('/')
            .unwrap_or(&config.endpoint);
        let base_url = Url::parse(&format!("{endpoint}/api/{}/", config.okms_id))?;

        let mut builder = ClientBuilder::new()
            .use_native_tls()
            .min_tls_version(tls::Version::TLS_1_2)
            .user_agent(format!("okms-cli/{}", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(60));

        if let Some(ca) = &config.ca {
            let bundle = read_bytes_from_file(ca)?;
            for certificate in Certificate::from_pem_bundle(&bundle)
                .with_context(|| format!("Invalid CA bundle {}", ca.display()))?
            {
                builder = builder.add_root_certificate(certificate);
            }
        }

        match &config.auth {
            RestAuth::Mtls { cert, key } => {
                let cert_pem = read_bytes_from_file(cert)?;
                let key_pem = private_key_pem_to_pkcs8(&read_bytes_from_file(key)?)?;
                builder = builder.identity(
                    Identity::from_pkcs8_pem(&cert_pem, &key_pem)
                        .context("Failed to create identity from client certificate and key")?,
                );
            }
            RestAuth::Token { token } => {
                let mut headers = HeaderMap::new();
                let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                builder = builder.default_headers(headers);
            }
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build().context("Reqwest client builder")?,
            base_url,
            retry: config.retry,
        })
    }

    /// URL of a route below `/api/{okmsId}`, each segment being escaped
    pub(crate) fn url<I, S>(&self, segments: I) -> KmsClientResult<Url>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| KmsClientError::Default("Invalid KMS endpoint URL".to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request, retrying on connection errors, HTTP 429 and 5xx
    async fn send<B>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> KmsClientResult<Response>
    where
        B: Serialize + ?Sized,
    {
        if let Some(body) = body {
            trace!(
                "==> {method} {url}\n{}",
                serde_json::to_string_pretty(body).unwrap_or_else(|_| "[N/A]".to_owned())
            );
        }
        let mut attempt = 0;
        loop {
            let mut request = self.client.request(method.clone(), url.clone()).query(query);
            if let Some(body) = body {
                request = request.json(body);
            }
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if attempt < self.retry
                        && (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                    {
                        debug!("{method} {url}: HTTP {status}, retrying");
                    } else if status.is_success() {
                        return Ok(response);
                    } else {
                        let p = handle_error(url.path(), response).await?;
                        return Err(KmsClientError::RequestFailed(p));
                    }
                }
                Err(e) if attempt < self.retry && (e.is_connect() || e.is_timeout()) => {
                    debug!("{method} {url}: {e}, retrying");
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(backoff(attempt)).await;
            attempt += 1;
        }
    }

    /// Send a request and decode its JSON response
    pub(crate) async fn call<B, R>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> KmsClientResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send(method, url, query, body).await?;
        let text = response.text().await?;
        trace!("<==\n{text}");
        serde_json::from_str(&text).map_err(|e| KmsClientError::ResponseFailed(e.to_string()))
    }

    /// Send a request whose response body is ignored
    pub(crate) async fn call_no_content<B>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> KmsClientResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(method, url, query, body).await.map(|_| ())
    }
}

/// Exponential backoff: 100 ms doubled at each attempt, capped at 5 s
pub(crate) fn backoff(attempt: u32) -> Duration {
    BACKOFF_BASE
        .checked_mul(2_u32.saturating_pow(attempt))
        .map_or(BACKOFF_MAX, |d| d.min(BACKOFF_MAX))
}

/// Some errors are returned by the load balancer without going through the
/// KMS error manager. In that case, make the error clearer for the user.
async fn handle_error(endpoint: &str, response: Response) -> KmsClientResult<String> {
    trace!("Error response received on {endpoint}: Response: {response:?}");
    let status = response.status();
    let text = response.text().await?;
    Ok(error_message(endpoint, status, &text))
}

pub(crate) fn error_message(endpoint: &str, status: StatusCode, text: &str) -> String {
    if text.is_empty() {
        return format!(
            "{endpoint}: {}",
            match status {
                StatusCode::NOT_FOUND => "KMS server endpoint does not exist".to_owned(),
                StatusCode::UNAUTHORIZED => "Bad authorization token".to_owned(),
                _ => status.to_string(),
            }
        );
    }
    match serde_json::from_str::<ErrorResponse>(text) {
        Ok(error) if error.error_code.is_some() || !error.errors.is_empty() => {
            let code = error
                .error_code
                .map_or_else(|| status.as_u16().to_string(), |c| c.to_string());
            let mut message = format!("KMS error {code}: {}", error.errors.join(", "));
            match (error.request_id, error.error_id) {
                (Some(request_id), _) => message.push_str(&format!(" (request-id: {request_id})")),
                (None, Some(error_id)) => message.push_str(&format!(" (error-id: {error_id})")),
                (None, None) => {}
            }
            message
        }
        _ => format!("{endpoint}: {status} {text}"),
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use reqwest::{Method, StatusCode};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };
    use uuid::Uuid;

    use super::{KmsRestClient, RestAuth, RestClientConfig, backoff, error_message};

    fn client(endpoint: &str) -> KmsRestClient {
        client_with_retry(endpoint, 0)
    }

    fn client_with_retry(endpoint: &str, retry: u32) -> KmsRestClient {
        KmsRestClient::instantiate(&RestClientConfig {
            endpoint: endpoint.to_owned(),
            ca: None,
            auth: RestAuth::Token {
                token: "secret".to_owned(),
            },
            okms_id: Uuid::nil(),
            retry,
            timeout: Some(Duration::from_secs(1)),
        })
        .unwrap()
    }

    #[test]
    fn test_routes_are_rooted_at_the_domain() {
        let client = client("https://kms.example.com/");
        let url = client.url(["v2", "secret", "app", "db password"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://kms.example.com/api/00000000-0000-0000-0000-000000000000/v2/secret/app/db%20password"
        );
    }

    #[test]
    fn test_backoff() {
        assert_eq!(backoff(0), Duration::from_millis(100));
        assert_eq!(backoff(3), Duration::from_millis(800));
        assert_eq!(backoff(10), Duration::from_secs(5));
        assert_eq!(backoff(40), Duration::from_secs(5));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            error_message("/api/x", StatusCode::NOT_FOUND, ""),
            "/api/x: KMS server endpoint does not exist"
        );
        assert_eq!(
            error_message("/api/x", StatusCode::UNAUTHORIZED, ""),
            "/api/x: Bad authorization token"
        );
        let body = r#"{"error_code":17125377,"errors":["key not found"],"error_id":"e-1","request_id":"r-1"}"#;
        assert_eq!(
            error_message("/api/x", StatusCode::NOT_FOUND, body),
            "KMS error 17125377: key not found (request-id: r-1)"
        );
        assert_eq!(
            error_message("/api/x", StatusCode::BAD_GATEWAY, "upstream down"),
            "/api/x: 502 Bad Gateway upstream down"
        );
    }

    /// Serve `statuses` in order, one per connection, counting the requests
    async fn serve(statuses: &'static [u16]) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0_u8; 4096];
                let _ = socket.read(&mut buf).await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                let body = if *status == 200 { "{\"ok\":true}" } else { "" };
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: \
                     {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn test_retry_on_server_errors() {
        let (endpoint, hits) = serve(&[503, 429, 200]).await;
        let client = client_with_retry(&endpoint, 4);
        let url = client.url(["v1", "servicekey"]).unwrap();
        let value: serde_json::Value = client
            .call::<(), _>(Method::GET, url, &[], None)
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_client_errors() {
        let (endpoint, hits) = serve(&[404]).await;
        let client = client_with_retry(&endpoint, 4);
        let url = client.url(["v1", "servicekey"]).unwrap();
        let err = client
            .call_no_content::<()>(Method::DELETE, url, &[], None)
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("KMS server endpoint does not exist"),
            "{err}"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
