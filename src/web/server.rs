//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches one HTTP/1.1 request per connection
//! to a handler function. Each connection is served on its own task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use super::http::{Request, RequestError, Response, StatusCode};
use crate::error::{QueryFormError, Result};

/// Largest request (head plus body) buffered before answering 413.
pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// HTTP server bound to a local address.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| QueryFormError::server(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| QueryFormError::server(format!("Failed to read local address: {e}")))?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// In-flight requests on already spawned tasks are allowed to finish.
    pub async fn run<H, F, S>(self, handler: H, shutdown: S) -> Result<()>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        info!("Listening on http://{}", self.local_addr);

        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down web server");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                    continue;
                }
            };

            debug!("Connection accepted from {peer_addr}");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!("Connection from {peer_addr} closed with error: {e}");
                }
            });
        }
    }
}

/// What came in on a connection.
enum Incoming {
    Request(Request),
    /// The request was refused before reaching the handler.
    Rejected(Response),
    /// The peer hung up before sending a full request.
    Closed,
}

/// Reads one request from the socket, dispatches it, and writes the response.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> std::io::Result<()>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let response = match read_request(&mut stream, peer_addr).await? {
        Incoming::Request(request) => {
            debug!("{} {} from {peer_addr}", request.method(), request.path());
            handler(request).await
        }
        Incoming::Rejected(response) => response,
        Incoming::Closed => {
            debug!("Connection closed by {peer_addr} before a full request arrived");
            return Ok(());
        }
    };

    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}

/// Reads the head until it parses, then reads exactly the declared body.
///
/// Body bytes are appended to the same buffer after the head and split off
/// without copying or re-parsing.
async fn read_request(stream: &mut TcpStream, peer_addr: SocketAddr) -> std::io::Result<Incoming> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    let (mut request, body_offset) = loop {
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(Incoming::Closed);
        }

        match Request::parse(&buf) {
            Ok(parsed) => break parsed,
            Err(RequestError::Incomplete) if buf.len() > MAX_REQUEST_SIZE => {
                warn!("Request head from {peer_addr} too large");
                return Ok(Incoming::Rejected(too_large()));
            }
            Err(RequestError::Incomplete) => continue,
            Err(e) => {
                warn!("Bad request from {peer_addr}: {e}");
                return Ok(Incoming::Rejected(bad_request(&e)));
            }
        }
    };

    let content_length = match request.content_length() {
        Ok(len) => len,
        Err(e) => return Ok(Incoming::Rejected(bad_request(&e))),
    };
    let total_needed = body_offset.saturating_add(content_length);
    if total_needed > MAX_REQUEST_SIZE {
        warn!("Request from {peer_addr} declares an oversized body");
        return Ok(Incoming::Rejected(too_large()));
    }

    buf.reserve(total_needed.saturating_sub(buf.len()));
    while buf.len() < total_needed {
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(Incoming::Closed);
        }
    }

    request.set_body(buf.split_to(total_needed).split_off(body_offset).freeze());
    Ok(Incoming::Request(request))
}

fn bad_request(error: &RequestError) -> Response {
    Response::text(StatusCode::BadRequest, format!("Bad Request: {error}"))
}

fn too_large() -> Response {
    Response::text(StatusCode::PayloadTooLarge, "Request entity too large")
}
