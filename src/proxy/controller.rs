//! # Capturing Proxy Controller
//!
//! Owns the TCP listener placed in front of the service-under-test. Every
//! accepted connection is handled by an independent task; each completed
//! request/response exchange emits exactly one [`Interaction`] onto the
//! session's interaction channel.
//!
//! ```text
//! ┌──────────┐      ┌────────────────┐      ┌─────────────────┐
//! │ Clients  │─────▶│ CapturingProxy │─────▶│ target service  │
//! └──────────┘      │                │      └─────────────────┘
//!                   │  Interaction   │
//!                   │  channel (mpsc)│─────▶ sink forwarder
//!                   └────────────────┘
//! ```
//!
//! Shutdown contract: after [`CapturingProxy::stop`] returns, no further
//! interactions are emitted. Exchanges already accepted are allowed to
//! drain first, and the channel closes strictly after the last emitted
//! event.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use super::http::{self, HttpRequest, HttpResponse};
use super::types::ProxyConfig;
use crate::capture::types::{CapturedBody, CapturedRequest, CapturedResponse, Interaction};
use crate::configuration::types::CaptureFlags;
use crate::error_handling::types::ProxyError;

pub struct CapturingProxy {
    shutdown_tx: Option<watch::Sender<bool>>,
    acceptor: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl CapturingProxy {
    pub fn new() -> Self {
        Self {
            shutdown_tx: None,
            acceptor: None,
            local_addr: None,
        }
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Fails with [`ProxyError::BindError`] before any traffic is processed
    /// when the address cannot be bound.
    pub async fn start(
        &mut self,
        config: ProxyConfig,
        sample_tx: UnboundedSender<Interaction>,
    ) -> Result<(), ProxyError> {
        if self.acceptor.is_some() {
            return Err(ProxyError::AlreadyRunning);
        }

        let listener = TcpListener::bind(config.bind_authority().as_str())
            .await
            .map_err(ProxyError::BindError)?;
        let local_addr = listener.local_addr().map_err(ProxyError::BindError)?;
        self.local_addr = Some(local_addr);

        match &config.target {
            Some(target) => info!("proxy listening on {} forwarding to {}", local_addr, target),
            None => info!("proxy listening on {} in transparent mode", local_addr),
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);
        self.acceptor = Some(tokio::spawn(accept_loop(
            listener,
            Arc::new(config),
            sample_tx,
            shutdown_rx,
        )));
        Ok(())
    }

    /// Stops accepting connections and drains in-flight exchanges.
    ///
    /// Resolves only after every connection task has finished, so no
    /// interaction is emitted after this returns.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(acceptor) = self.acceptor.take() {
            if let Err(e) = acceptor.await {
                warn!("proxy acceptor task failed during shutdown: {}", e);
            }
        }
        info!("proxy stopped");
    }

    /// Actual bound address, useful when the configured port was 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Default for CapturingProxy {
    fn default() -> Self {
        Self::new()
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<ProxyConfig>,
    sample_tx: UnboundedSender<Interaction>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("accepted connection from {}", peer);
                    connections.spawn(handle_connection(
                        stream,
                        peer,
                        Arc::clone(&config),
                        sample_tx.clone(),
                        shutdown_rx.clone(),
                    ));
                }
                Err(e) => warn!("accept failed: {}", e),
            }
        }
    }

    // No new connections past this point; let accepted exchanges drain.
    drop(listener);
    while connections.join_next().await.is_some() {}
    // `sample_tx` drops here, closing the channel strictly after the last
    // emitted interaction.
}

/// Serves one client connection, emitting one interaction per completed
/// exchange. Persistent connections are served sequentially until the client
/// closes, asks to close, or shutdown is requested between exchanges.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<ProxyConfig>,
    sample_tx: UnboundedSender<Interaction>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let request = tokio::select! {
            read = http::read_request(&mut reader) => match read {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(e) => {
                    debug!("[{}] dropping connection: {}", peer, e);
                    break;
                }
            },
            _ = shutdown_rx.changed() => break,
        };

        let close = request.wants_close();
        let response = run_exchange(&request, &config).await;

        if let Err(e) = write_half.write_all(&response.to_client_bytes(close)).await {
            debug!("[{}] client went away before response: {}", peer, e);
            // The exchange still completed against the target; record it.
        }

        let interaction = build_interaction(&request, &response, &config.flags);
        debug!(
            "[{}] captured sample {} {} -> {}",
            peer, interaction.request.method, interaction.request.path, response.status_code
        );
        if sample_tx.send(interaction).is_err() {
            warn!("[{}] interaction channel closed; sample dropped", peer);
        }

        if close {
            break;
        }
    }
}

/// Forwards one request to its resolved destination and returns the
/// response. Failures to reach the target are converted into a synthesized
/// 502 so that the attempted exchange is still observable.
async fn run_exchange(request: &HttpRequest, config: &ProxyConfig) -> HttpResponse {
    let authority = match &config.target {
        Some(target) => target.authority(),
        None => match request.requested_authority() {
            Some(authority) => authority,
            None => {
                warn!("transparent exchange carries no resolvable destination");
                return HttpResponse::bad_gateway("request names no destination");
            }
        },
    };

    match forward(request, &authority).await {
        Ok(response) => response,
        Err(e) => {
            warn!("exchange against {} failed: {}", authority, e);
            HttpResponse::bad_gateway(&e.to_string())
        }
    }
}

async fn forward(request: &HttpRequest, authority: &str) -> Result<HttpResponse, ProxyError> {
    let target = TcpStream::connect(authority).await?;
    let (target_read, mut target_write) = target.into_split();

    target_write
        .write_all(&request.to_forward_bytes(authority))
        .await?;

    let mut target_reader = BufReader::new(target_read);
    let head_request = request.method.eq_ignore_ascii_case("HEAD");
    http::read_response(&mut target_reader, head_request).await
}

fn build_interaction(
    request: &HttpRequest,
    response: &HttpResponse,
    flags: &CaptureFlags,
) -> Interaction {
    Interaction {
        sample_id: uuid::Uuid::new_v4(),
        request: CapturedRequest {
            method: request.method.clone(),
            path: request.path(),
            query: request.query(),
            headers: request.headers.clone(),
            body: CapturedBody::from_raw(&request.body, request.header("content-type"), flags),
        },
        response: CapturedResponse {
            status_code: response.status_code,
            headers: response.headers.clone(),
            body: CapturedBody::from_raw(&response.body, response.header("content-type"), flags),
        },
        captured_at: chrono::Utc::now(),
    }
}
