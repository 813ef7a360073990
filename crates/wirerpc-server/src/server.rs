//! HTTP server acceptor and lifecycle.
//!
//! [`Server`] binds a TCP listener, accepts connections and spawns a
//! session per connection over a shared [`MethodRegistry`]. It can be
//! driven two ways: [`Server::run`] blocks the calling thread, while
//! [`Server::start`] drives the accept loop on a background thread until
//! [`Server::stop`]. A stopped server is restartable.
//!
//! # Example
//!
//! ```no_run
//! use wirerpc_server::Server;
//!
//! let server = Server::new(8080);
//! server.register("add", |a: i32, b: i32| a + b);
//! server.run().unwrap();
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::registry::{MethodRegistry, RpcHandler};
use crate::session;
use crate::Logger;

/// Server lifecycle and configuration failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `run`/`start` on a server that is already running, or
    /// reconfiguration that requires a stopped server.
    #[error("server is already running")]
    AlreadyRunning,

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The runtime or its driver thread could not be created.
    #[error("failed to start server runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

struct Control {
    shutdown: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
}

/// A JSON-RPC 2.0 server over HTTP/1.1.
pub struct Server {
    addr: SocketAddr,
    bound: Mutex<Option<SocketAddr>>,
    registry: Arc<MethodRegistry>,
    logger: Mutex<Option<Logger>>,
    running: Arc<AtomicBool>,
    control: Mutex<Option<Control>>,
}

impl Server {
    /// Creates a server listening on all interfaces.
    pub fn new(port: u16) -> Self {
        Self::bind(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// Creates a server listening on a specific address.
    pub fn bind(addr: SocketAddr) -> Self {
        Self {
            addr,
            bound: Mutex::new(None),
            registry: Arc::new(MethodRegistry::new()),
            logger: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            control: Mutex::new(None),
        }
    }

    /// The actual listening address, once the server has been started.
    /// Useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock().expect("bound address lock poisoned")
    }

    /// Registers an RPC method, replacing any previous handler of the same
    /// name. Registration is allowed while the server is running.
    ///
    /// Any closure with 0 to 8 parameters works, as long as the parameters
    /// convert from JSON and the return value converts back:
    ///
    /// ```
    /// # let server = wirerpc_server::Server::new(0);
    /// server.register("add", |a: i32, b: i32| a + b);
    /// server.register("greet", |name: String| format!("hello {}", name));
    /// server.register("ping", || ());
    /// ```
    pub fn register<H, Args, Marker>(&self, name: impl Into<String>, handler: H)
    where
        H: RpcHandler<Args, Marker>,
    {
        self.registry.register(name, handler);
    }

    /// The shared method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Sets the diagnostics callback. It is invoked from I/O threads;
    /// network errors and invalid requests are reported through it.
    pub fn set_logger<F>(&self, logger: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.logger.lock().expect("logger lock poisoned") = Some(Arc::new(logger));
    }

    /// Removes the diagnostics callback.
    pub fn clear_logger(&self) {
        *self.logger.lock().expect("logger lock poisoned") = None;
    }

    /// Sets the batch parallelism width. Rejected while the server is
    /// running; the worker pool is rebuilt on change.
    pub fn set_batch_concurrency(&self, width: usize) -> Result<(), ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }
        self.registry.set_batch_concurrency(width);
        Ok(())
    }

    /// Whether the server has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs the server, blocking the calling thread until [`Server::stop`]
    /// is called from another thread.
    pub fn run(&self) -> Result<(), ServerError> {
        let (runtime, listener, shutdown_rx) = self.prepare()?;
        tracing::info!(addr = %self.addr, "server listening");
        let signal = shutdown_rx.clone();
        runtime.block_on(accept_loop(
            listener,
            shutdown_rx,
            Arc::clone(&self.registry),
            self.current_logger(),
        ));
        // Dropping the runtime cancels any session still in flight.
        drop(runtime);
        // On a stop() the stopper owns the lifecycle state, and may already
        // have restarted the server; only clean up after a spontaneous exit.
        if !*signal.borrow() {
            self.control.lock().expect("control lock poisoned").take();
            self.running.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Starts the server on a background thread and returns once the
    /// listener is bound. Call [`Server::stop`] to halt it.
    pub fn start(&self) -> Result<(), ServerError> {
        let (runtime, listener, shutdown_rx) = self.prepare()?;
        tracing::info!(addr = %self.addr, "server listening");

        let registry = Arc::clone(&self.registry);
        let logger = self.current_logger();
        let running = Arc::clone(&self.running);
        let driver = std::thread::Builder::new()
            .name("wirerpc-acceptor".into())
            .spawn(move || {
                runtime.block_on(accept_loop(listener, shutdown_rx, registry, logger));
                drop(runtime);
                running.store(false, Ordering::SeqCst);
            });

        match driver {
            Ok(handle) => {
                if let Some(control) = self
                    .control
                    .lock()
                    .expect("control lock poisoned")
                    .as_mut()
                {
                    control.driver = Some(handle);
                }
                Ok(())
            }
            Err(source) => {
                self.control.lock().expect("control lock poisoned").take();
                self.running.store(false, Ordering::SeqCst);
                Err(ServerError::Runtime(source))
            }
        }
    }

    /// Stops the server: closes the acceptor, halts the driver and joins
    /// the background thread when one exists. Idempotent; a stopped server
    /// can be started again.
    pub fn stop(&self) {
        let control = self.control.lock().expect("control lock poisoned").take();
        let Some(control) = control else {
            return;
        };
        let _ = control.shutdown.send(true);
        if let Some(driver) = control.driver {
            if driver.join().is_err() {
                tracing::error!("server driver thread panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Marks the server running, builds its runtime and binds the listener.
    ///
    /// The listener is bound synchronously so bind failures surface from
    /// `run`/`start` directly; it is handed to the runtime afterwards.
    fn prepare(
        &self,
    ) -> Result<
        (
            tokio::runtime::Runtime,
            std::net::TcpListener,
            watch::Receiver<bool>,
        ),
        ServerError,
    > {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ServerError::AlreadyRunning);
        }

        let prepared = (|| {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let listener =
                std::net::TcpListener::bind(self.addr).map_err(|source| ServerError::Bind {
                    addr: self.addr,
                    source,
                })?;
            listener.set_nonblocking(true)?;
            Ok::<_, ServerError>((runtime, listener))
        })();

        match prepared {
            Ok((runtime, listener)) => {
                *self.bound.lock().expect("bound address lock poisoned") =
                    listener.local_addr().ok();
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                *self.control.lock().expect("control lock poisoned") = Some(Control {
                    shutdown: shutdown_tx,
                    driver: None,
                });
                Ok((runtime, listener, shutdown_rx))
            }
            Err(error) => {
                self.running.store(false, Ordering::SeqCst);
                Err(error)
            }
        }
    }

    fn current_logger(&self) -> Option<Logger> {
        self.logger.lock().expect("logger lock poisoned").clone()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Accepts connections until the shutdown signal fires. Accept failures
/// other than shutdown are logged and the loop continues.
async fn accept_loop(
    listener: std::net::TcpListener,
    mut shutdown: watch::Receiver<bool>,
    registry: Arc<MethodRegistry>,
    logger: Option<Logger>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, "failed to register listener with the runtime");
            session::log(&logger, &format!("listener registration failed: {}", error));
            return;
        }
    };
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "connection accepted");
                    let registry = Arc::clone(&registry);
                    let logger = logger.clone();
                    tokio::spawn(session::serve(stream, registry, logger));
                }
                Err(error) => {
                    tracing::error!(%error, "failed to accept connection");
                    session::log(&logger, &format!("accept failed: {}", error));
                }
            },
        }
    }
}
