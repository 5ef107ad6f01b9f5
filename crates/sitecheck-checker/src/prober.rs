//! HTTP probe against a fixed backend address.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sitecheck_core::Connection;

use crate::error::ProbeError;

pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Issues one request for `site` against `connection` and reports the
/// response status code.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(
        &self,
        connection: &Connection,
        site: &str,
        cancel: &CancellationToken,
    ) -> Result<u16, ProbeError>;
}

/// Plain HTTP/1.1 prober on hyper's client connection API.
///
/// Every probe opens a fresh connection to the backend and asks for
/// `http://<site>/` with a matching `Host` header, so name-based virtual
/// hosts answer regardless of what DNS says about the site.
#[derive(Debug, Clone)]
pub struct HttpProber {
    dial_timeout: Duration,
    request_timeout: Duration,
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(DEFAULT_DIAL_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }
}

impl HttpProber {
    /// `request_timeout` bounds the whole probe, dial included.
    pub fn new(dial_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            dial_timeout,
            request_timeout,
        }
    }

    async fn request(&self, connection: &Connection, site: &str) -> Result<u16, ProbeError> {
        let address = connection.to_string();

        let stream = match tokio::time::timeout(
            self.dial_timeout,
            TcpStream::connect(address.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ProbeError::Connect { address, source }),
            Err(_) => {
                return Err(ProbeError::DialTimeout {
                    address,
                    timeout: self.dial_timeout,
                });
            }
        };

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(io)
            .await
            .map_err(|source| ProbeError::Handshake {
                address: address.clone(),
                source,
            })?;

        let request = http::Request::builder()
            .method("GET")
            .uri("/")
            .header(http::header::HOST, site)
            .header(http::header::CONNECTION, "close")
            .header(http::header::USER_AGENT, "sitecheck/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|source| ProbeError::Request {
                site: site.to_string(),
                source,
            })?;

        // The connection is driven here rather than on a detached task so
        // that dropping the probe tears the socket down with it.
        let send = sender.send_request(request);
        tokio::pin!(send, conn);
        let response = tokio::select! {
            biased;
            response = &mut send => response,
            finished = &mut conn => match finished {
                Ok(()) => send.await,
                Err(e) => Err(e),
            },
        }
        .map_err(|source| ProbeError::Send {
            site: site.to_string(),
            source,
        })?;

        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(
        &self,
        connection: &Connection,
        site: &str,
        cancel: &CancellationToken,
    ) -> Result<u16, ProbeError> {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            outcome = tokio::time::timeout(self.request_timeout, self.request(connection, site)) => outcome,
        };

        match outcome {
            Ok(Ok(status)) => {
                debug!(%site, backend = %connection, status, "probe finished");
                Ok(status)
            }
            Ok(Err(e)) => {
                debug!(%site, backend = %connection, error = %e, "probe failed");
                Err(e)
            }
            Err(_) => Err(ProbeError::Timeout {
                site: site.to_string(),
                timeout: self.request_timeout,
            }),
        }
    }
}
