//! App state and builder

use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::oneshot};

use crate::prelude::*;
use crate::routes;
use collabdocs_relay::{Relay, RelayConfig};
use collabdocs_types::meta_adapter::MetaAdapter;
use collabdocs_types::snapshot_adapter::SnapshotAdapter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long in-flight requests may take to finish after the shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct AppState {
	pub opts: AppBuilderOpts,
	pub meta_adapter: Arc<dyn MetaAdapter>,
	pub relay: Arc<Relay>,
}

pub type App = Arc<AppState>;

pub struct Adapters {
	pub meta_adapter: Option<Arc<dyn MetaAdapter>>,
	pub snapshot_adapter: Option<Arc<dyn SnapshotAdapter>>,
}

#[derive(Debug)]
pub struct AppBuilderOpts {
	pub listen: Box<str>,
	pub cors_origins: Box<[Box<str>]>,
	pub relay: RelayConfig,
}

pub struct AppBuilder {
	opts: AppBuilderOpts,
	adapters: Adapters,
}

impl AppBuilder {
	pub fn new() -> Self {
		AppBuilder {
			opts: AppBuilderOpts {
				listen: "0.0.0.0:8080".into(),
				cors_origins: Box::new(["http://localhost:5173".into()]),
				relay: RelayConfig::default(),
			},
			adapters: Adapters { meta_adapter: None, snapshot_adapter: None },
		}
	}

	// Opts
	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self { self.opts.listen = listen.into(); self }
	pub fn cors_origins(&mut self, origins: impl IntoIterator<Item = impl Into<Box<str>>>) -> &mut Self {
		self.opts.cors_origins = origins.into_iter().map(Into::into).collect();
		self
	}
	pub fn max_binary_bytes(&mut self, max: usize) -> &mut Self { self.opts.relay.max_binary_bytes = max; self }
	pub fn max_text_bytes(&mut self, max: usize) -> &mut Self { self.opts.relay.max_text_bytes = max; self }
	pub fn mailbox_capacity(&mut self, capacity: usize) -> &mut Self { self.opts.relay.room.mailbox_capacity = capacity; self }

	// Adapters
	pub fn meta_adapter(&mut self, meta_adapter: Arc<dyn MetaAdapter>) -> &mut Self { self.adapters.meta_adapter = Some(meta_adapter); self }
	pub fn snapshot_adapter(&mut self, snapshot_adapter: Arc<dyn SnapshotAdapter>) -> &mut Self { self.adapters.snapshot_adapter = Some(snapshot_adapter); self }

	/// Assembles the app state without binding a listener
	pub fn build(self) -> CdResult<App> {
		let Some(meta_adapter) = self.adapters.meta_adapter else {
			error!("FATAL: No meta adapter");
			return Err(Error::ConfigError("no meta adapter".to_string()));
		};
		if self.opts.relay.room.mailbox_capacity == 0 {
			return Err(Error::ConfigError("mailbox capacity must be positive".to_string()));
		}
		if self.adapters.snapshot_adapter.is_none() {
			warn!("No snapshot adapter, document updates will not be persisted");
		}

		let relay = Arc::new(Relay::new(self.opts.relay.clone(), self.adapters.snapshot_adapter));
		Ok(Arc::new(AppState { opts: self.opts, meta_adapter, relay }))
	}

	/// Builds the app and serves it until `shutdown` resolves
	pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> CdResult<()> {
		info!("collabdocs V{}", VERSION);
		let app = self.build()?;
		serve(app, shutdown).await
	}
}

impl Default for AppBuilder {
	fn default() -> Self { Self::new() }
}

/// Serves `app` on its configured address
///
/// On shutdown the relay is closed first so that websocket sessions end, then the
/// HTTP server drains in-flight requests for at most [`SHUTDOWN_GRACE`].
pub async fn serve(app: App, shutdown: impl Future<Output = ()> + Send + 'static) -> CdResult<()> {
	let listener = TcpListener::bind(app.opts.listen.as_ref()).await?;
	info!("Listening on {}", listener.local_addr()?);

	let router = routes::init(app.clone())?;
	let relay = app.relay.clone();
	let (draining_tx, draining_rx) = oneshot::channel::<()>();
	let signal = async move {
		shutdown.await;
		info!("Shutting down...");
		let rooms = relay.shutdown().await;
		info!(rooms = rooms, "Relay closed");
		let _ = draining_tx.send(());
	};

	let server = axum::serve(listener, router).with_graceful_shutdown(signal).into_future();
	tokio::pin!(server);

	tokio::select! {
		res = &mut server => res?,
		() = drain_deadline(draining_rx) => {
			warn!("Graceful shutdown timed out after {:?}", SHUTDOWN_GRACE);
		}
	}

	info!("Server stopped");
	Ok(())
}

async fn drain_deadline(draining: oneshot::Receiver<()>) {
	match draining.await {
		Ok(()) => tokio::time::sleep(SHUTDOWN_GRACE).await,
		// The server ended before the signal fired
		Err(_) => std::future::pending().await,
	}
}

// vim: ts=4
