//! Single-shot upstream HTTP fetching.
//!
//! Every call performs exactly one GET with the relay's spoofed client
//! identity: a browser `User-Agent`, the target's origin as `Referer` and
//! `Accept: */*`. There is no retry; the client-wide timeout bounds the
//! whole request including the body.

use crate::error::{ProxyError, Result};
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use futures_util::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// A manifest body fetched in full.
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    pub body: String,
    /// URL after redirects; relative references resolve against this
    pub final_url: Url,
    pub content_type: Option<String>,
}

/// An upstream response whose body has not been read yet.
pub struct SegmentStream {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    response: reqwest::Response,
}

impl SegmentStream {
    /// Turn the body into a chunk stream.
    ///
    /// Chunks are pulled from the socket only as the consumer polls, so a
    /// slow client slows the upstream read instead of growing a buffer.
    /// A mid-transfer failure is yielded as [`ProxyError::StreamInterrupted`]
    /// (or `UpstreamTimeout`).
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
        let url = self.url.to_string();
        self.response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| ProxyError::from_fetch(&url, e, true)))
    }
}

/// Outbound HTTP client shared by all handlers.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client,
}

impl Upstream {
    /// Build the pooled client with the given timeout and User-Agent.
    pub fn new(timeout: Duration, user_agent: &str) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client })
    }

    fn request(&self, url: &Url) -> RequestBuilder {
        let mut request = self.client.get(url.clone()).header(header::ACCEPT, "*/*");

        let origin = url.origin().ascii_serialization();
        match HeaderValue::from_str(&origin) {
            Ok(referer) => request = request.header(header::REFERER, referer),
            Err(_) => debug!("No usable Referer for {}", url),
        }

        request
    }

    /// Fetch a manifest and decode its body as text.
    ///
    /// # Errors
    /// `UpstreamHttpError` for non-2xx responses, `UpstreamTimeout` or
    /// `UpstreamUnreachable` for transport failures.
    pub async fn fetch_text(&self, url: &Url) -> Result<FetchedManifest> {
        let response = self
            .request(url)
            .send()
            .await
            .map_err(|e| ProxyError::from_fetch(url.as_str(), e, false))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Upstream returned {} for manifest {}", status, url);
            return Err(ProxyError::UpstreamHttpError {
                status,
                url: url.to_string(),
            });
        }

        let final_url = response.url().clone();
        if final_url != *url {
            debug!("Manifest {} redirected to {}", url, final_url);
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::from_fetch(url.as_str(), e, true))?;

        Ok(FetchedManifest {
            body,
            final_url,
            content_type,
        })
    }

    /// Open a segment response for streaming.
    ///
    /// Any upstream status is returned as-is; only transport failures are
    /// errors. `range` is forwarded so byte-range requests keep working.
    pub async fn open_stream(
        &self,
        url: &Url,
        range: Option<&HeaderValue>,
    ) -> Result<SegmentStream> {
        let mut request = self.request(url);
        if let Some(range) = range {
            request = request.header(header::RANGE, range.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProxyError::from_fetch(url.as_str(), e, false))?;

        Ok(SegmentStream {
            status: response.status(),
            headers: response.headers().clone(),
            url: url.clone(),
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn upstream(timeout: Duration) -> Upstream {
        Upstream::new(timeout, "TestAgent/1.0").unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[tokio::test]
    async fn sends_spoofed_client_headers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/live/index.m3u8"))
            .and(header_is("user-agent", "TestAgent/1.0"))
            .and(header_is("referer", server.uri().as_str()))
            .and(header_is("accept", "*/*"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = upstream(Duration::from_secs(5))
            .fetch_text(&url(&server, "/live/index.m3u8"))
            .await
            .unwrap();

        assert_eq!(fetched.body, "#EXTM3U\n");
    }

    #[tokio::test]
    async fn non_success_manifest_is_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = upstream(Duration::from_secs(5))
            .fetch_text(&url(&server, "/live/index.m3u8"))
            .await
            .unwrap_err();

        match err {
            ProxyError::UpstreamHttpError { status, .. } => {
                assert_eq!(status, StatusCode::FORBIDDEN)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = upstream(Duration::from_millis(100))
            .fetch_text(&url(&server, "/slow.m3u8"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::UpstreamTimeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn redirect_target_becomes_final_url() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/entry.m3u8"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/moved/live.m3u8", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/moved/live.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .mount(&server)
            .await;

        let fetched = upstream(Duration::from_secs(5))
            .fetch_text(&url(&server, "/entry.m3u8"))
            .await
            .unwrap();

        assert_eq!(fetched.final_url.path(), "/moved/live.m3u8");
    }

    #[tokio::test]
    async fn stream_keeps_status_and_forwards_range() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/seg.ts"))
            .and(header_is("range", "bytes=0-3"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![1u8, 2, 3, 4]))
            .expect(1)
            .mount(&server)
            .await;

        let range = HeaderValue::from_static("bytes=0-3");
        let stream = upstream(Duration::from_secs(5))
            .open_stream(&url(&server, "/seg.ts"), Some(&range))
            .await
            .unwrap();

        assert_eq!(stream.status, StatusCode::PARTIAL_CONTENT);

        let chunks: Vec<Bytes> = stream
            .into_body_stream()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), vec![1u8, 2, 3, 4]);
    }

    #[tokio::test]
    async fn stream_does_not_treat_error_status_as_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let stream = upstream(Duration::from_secs(5))
            .open_stream(&url(&server, "/missing.ts"), None)
            .await
            .unwrap();

        assert_eq!(stream.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreachable_host_is_reported() {
        // Port 9 on loopback (discard) is essentially never listening in CI
        let target = Url::parse("http://127.0.0.1:9/seg.ts").unwrap();
        let err = upstream(Duration::from_secs(5))
            .open_stream(&target, None)
            .await
            .err()
            .expect("connection should fail");

        assert!(
            matches!(
                err,
                ProxyError::UpstreamUnreachable { .. } | ProxyError::UpstreamTimeout(_)
            ),
            "{err:?}"
        );
    }
}
