// TCP and unix-socket listeners

use super::config::ServerConfig;
use super::connection::Connection;
use crate::commands::CommandDispatcher;
use crate::storage::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::sync::{Notify, Semaphore};
use tracing::{error, info};

pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<CommandDispatcher>,
    tcp: Option<TcpListener>,
    unix: Option<UnixListener>,
    /// Limit max concurrent connections
    limit_connections: Arc<Semaphore>,
    shutdown: Arc<Notify>,
}

impl Server {
    /// Bind the configured endpoints. When neither a TCP address nor a unix
    /// socket is configured, the server listens on 0.0.0.0:6379.
    pub async fn bind(mut config: ServerConfig, store: Arc<dyn Store>) -> anyhow::Result<Server> {
        if config.bind.is_none() && config.unixsocket.is_none() {
            config.bind = Some("0.0.0.0".to_string());
            if config.port == 0 {
                config.port = 6379;
            }
        }

        let tcp = match &config.bind {
            Some(host) => {
                let listener = TcpListener::bind((host.as_str(), config.port)).await?;
                info!("listening on {}", listener.local_addr()?);
                Some(listener)
            }
            None => None,
        };

        let unix = match &config.unixsocket {
            Some(path) => {
                // A stale socket file from a previous run blocks the bind.
                let _ = std::fs::remove_file(path);
                let listener = UnixListener::bind(path)?;
                info!("listening on unix socket {}", path);
                Some(listener)
            }
            None => None,
        };

        let shutdown = Arc::new(Notify::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store, shutdown.clone()));
        let limit_connections = Arc::new(Semaphore::new(config.max_clients));

        Ok(Server {
            config,
            dispatcher,
            tcp,
            unix,
            limit_connections,
            shutdown,
        })
    }

    /// The bound TCP address, if a TCP listener is active.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn max_clients(&self) -> usize {
        self.config.max_clients
    }

    /// Accept connections until SHUTDOWN is requested.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Pinned once so a notification raised while this task is waiting on
        // a connection permit is not lost.
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);

        loop {
            let permit = self.limit_connections.clone().acquire_owned().await?;

            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = accept_tcp(self.tcp.as_ref()) => {
                    match accepted {
                        Ok((socket, addr)) => {
                            info!("accepted connection from {}", addr);
                            if let Err(e) = socket.set_nodelay(true) {
                                error!("failed to set TCP_NODELAY: {}", e);
                            }
                            let dispatcher = self.dispatcher.clone();
                            tokio::spawn(async move {
                                let mut connection = Connection::new(socket, dispatcher);
                                if let Err(e) = connection.process().await {
                                    error!("connection error: {}", e);
                                }
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!("failed to accept connection: {}", e);
                        }
                    }
                }
                accepted = accept_unix(self.unix.as_ref()) => {
                    match accepted {
                        Ok(socket) => {
                            let dispatcher = self.dispatcher.clone();
                            tokio::spawn(async move {
                                let mut connection = Connection::new(socket, dispatcher);
                                if let Err(e) = connection.process().await {
                                    error!("connection error: {}", e);
                                }
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!("failed to accept unix connection: {}", e);
                        }
                    }
                }
            }
        }
    }
}

async fn accept_tcp(listener: Option<&TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

async fn accept_unix(listener: Option<&UnixListener>) -> std::io::Result<UnixStream> {
    match listener {
        Some(listener) => listener.accept().await.map(|(socket, _)| socket),
        None => std::future::pending().await,
    }
}
