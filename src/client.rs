use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper::header::{CONNECTION, HOST, USER_AGENT};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use url::{Host, Url};

use crate::error::{ConfigError, TransportError};
use crate::meter::ThroughputMeter;
use crate::models::{BenchConfig, Header, Method};
use crate::transport::Connector;

/// A single request issued by a worker
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    pub headers: Vec<Header>,
    pub body: Option<Bytes>,
}

/// The part of a response the benchmark looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
}

/// Sends one request and waits for the complete response.
///
/// An `Err` means the transport failed (connect refused, timeout, reset...)
/// and no usable status code exists.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;
}

type Sender = SendRequest<Full<Bytes>>;

/// HTTP/1.1 [`HttpClient`] on hyper connections.
///
/// Every connection runs over a metered socket, so the run's
/// [`ThroughputMeter`] sees exactly the bytes sent and received, failed
/// requests included. With keep-alive, idle connections are pooled per
/// origin and reused.
pub struct HyperClient {
    connector: Connector,
    idle: Mutex<HashMap<String, Vec<Sender>>>,
    keepalive: bool,
    user_agent: Option<String>,
    connect_timeout: Duration,
    exchange_timeout: Duration,
}

impl HyperClient {
    pub fn new(config: &BenchConfig, meter: Arc<ThroughputMeter>) -> Result<Self, ConfigError> {
        Ok(Self {
            connector: Connector::new(config.insecure, meter)?,
            idle: Mutex::new(HashMap::new()),
            keepalive: config.keepalive,
            user_agent: config.user_agent.clone(),
            connect_timeout: config.write_timeout,
            exchange_timeout: config.read_timeout + config.write_timeout,
        })
    }

    /// Take a live idle connection to `origin`, dropping any that have closed.
    async fn checkout(&self, origin: &str) -> Option<Sender> {
        loop {
            let mut sender = self.idle.lock().await.get_mut(origin)?.pop()?;
            if sender.ready().await.is_ok() {
                return Some(sender);
            }
        }
    }

    async fn checkin(&self, origin: String, sender: Sender) {
        self.idle.lock().await.entry(origin).or_default().push(sender);
    }

    async fn open(&self, target: &Target) -> Result<Sender, TransportError> {
        let connect = self.connector.connect(&target.host, target.port, target.tls);
        let wire = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| TransportError::new(format!("connect to {} timed out", target.origin)))??;

        let (sender, connection) = http1::handshake(TokioIo::new(wire)).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!("connection closed: {}", err);
            }
        });

        Ok(sender)
    }

    fn build(&self, target: &Target, request: Request) -> Result<hyper::Request<Full<Bytes>>, TransportError> {
        let method = match request.method {
            Method::Get => hyper::Method::GET,
            Method::Post => hyper::Method::POST,
        };

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(target.path_and_query.as_str())
            .header(HOST, target.host_header.as_str());

        if let Some(agent) = &self.user_agent {
            builder = builder.header(USER_AGENT, agent.as_str());
        }
        if !self.keepalive {
            builder = builder.header(CONNECTION, "close");
        }
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }

        builder
            .body(Full::new(request.body.unwrap_or_default()))
            .map_err(|err| TransportError::new(format!("invalid request: {}", err)))
    }
}

#[async_trait]
impl HttpClient for HyperClient {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let target = Target::parse(&request.uri)?;

        let mut sender = match self.checkout(&target.origin).await {
            Some(sender) => sender,
            None => self.open(&target).await?,
        };
        let request = self.build(&target, request)?;

        let exchange = async {
            let response = sender.send_request(request).await?;
            let status = response.status().as_u16();
            // Read the whole body so the connection is idle again
            response.into_body().collect().await?;
            Ok::<_, hyper::Error>(status)
        };
        let status = tokio::time::timeout(self.exchange_timeout, exchange)
            .await
            .map_err(|_| TransportError::new(format!("no response from {} in time", target.origin)))??;

        if self.keepalive {
            self.checkin(target.origin, sender).await;
        }

        Ok(Response { status })
    }
}

/// Where a request goes and what its request line and `Host` header carry
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    origin: String,
    tls: bool,
    host: String,
    port: u16,
    host_header: String,
    path_and_query: String,
}

impl Target {
    fn parse(uri: &str) -> Result<Self, TransportError> {
        let url = Url::parse(uri).map_err(|err| TransportError::new(format!("invalid uri {}: {}", uri, err)))?;

        let tls = match url.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(TransportError::new(format!("unsupported scheme {}", other))),
        };
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(TransportError::new(format!("missing host in {}", uri))),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| TransportError::new(format!("missing port in {}", uri)))?;

        // host_str keeps the brackets around IPv6 literals
        let authority = url.host_str().unwrap_or_default();
        let host_header = match url.port() {
            Some(port) => format!("{}:{}", authority, port),
            None => authority.to_string(),
        };

        let mut path_and_query = url.path().to_string();
        if let Some(query) = url.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        Ok(Self {
            origin: format!("{}://{}:{}", url.scheme(), host, port),
            tls,
            host,
            port,
            host_header,
            path_and_query,
        })
    }
}
