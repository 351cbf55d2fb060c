//! Network listener for the long-running server.
//!
//! A [`ServerListener`] describes the server before any socket exists, so
//! transports such as realtime can be attached ahead of binding. Binding only
//! happens in [`ServerListener::bind`].

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

/// Unbound server: an address plus the application and attached routes.
#[derive(Debug)]
pub struct ServerListener {
    addr: SocketAddr,
    app: Router,
    attachments: Vec<Router>,
}

impl ServerListener {
    pub fn new(addr: SocketAddr, app: Router) -> Self {
        Self {
            addr,
            app,
            attachments: Vec::new(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Add routes served next to the application, e.g. a socket transport.
    pub fn attach(&mut self, routes: Router) {
        self.attachments.push(routes);
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// The application with every attachment merged in.
    pub fn into_router(self) -> Router {
        self.attachments
            .into_iter()
            .fold(self.app, |app, routes| app.merge(routes))
    }

    /// Open the socket. Nothing is accepted until [`BoundServer::serve`].
    pub async fn bind(self) -> io::Result<BoundServer> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "listening");
        Ok(BoundServer {
            listener,
            local_addr,
            app: self.into_router(),
        })
    }
}

/// A bound socket with its application, ready to accept.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    app: Router,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` resolves, then drain.
    pub async fn serve<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(
            self.listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}
