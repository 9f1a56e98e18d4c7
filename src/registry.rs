//! Registry: top-level coordinator owning the dispatch context, the entry
//! cache and all live sessions.

use crate::config::RegistryConfig;
use crate::dispatch::{DispatchMsg, Dispatcher};
use crate::entry::{AppEntry, StaticInfo};
use crate::error::{RegistryError, Result};
use crate::events::{EventBus, RegistryEvent};
use crate::providers::Providers;
use crate::session::{Callbacks, Session, SessionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::info;

/// Application registry and session cache.
///
/// Not an ambient singleton: construct one per package-service handle and
/// pass it where it is needed. Independent instances may coexist in-process.
pub struct Registry {
	tx: mpsc::UnboundedSender<DispatchMsg>,
	events: Arc<EventBus>,
	next_session_id: AtomicU64,
}

impl Registry {
	/// Create the registry and start its dispatch context. When
	/// `config.refresh_interval_secs > 0`, a background ticker re-enumerates
	/// the package service at that interval.
	pub fn new(providers: Providers, config: RegistryConfig) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let events = Arc::new(EventBus::new(config.event_capacity));

		let dispatcher = Dispatcher::new(
			rx,
			tx.clone(),
			providers,
			config.users.clone(),
			events.clone(),
		);
		tokio::spawn(dispatcher.run());

		if config.refresh_interval_secs > 0 {
			let poll_tx = tx.clone();
			let interval_secs = config.refresh_interval_secs;
			tokio::spawn(async move {
				info!("package polling started (every {}s)", interval_secs);
				let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
				// The first tick fires immediately; skip it, construction
				// callers trigger the initial load themselves
				interval.tick().await;
				loop {
					interval.tick().await;
					if poll_tx.send(DispatchMsg::Refresh { reply: None }).is_err() {
						break;
					}
				}
				info!("package polling stopped");
			});
		}

		Self {
			tx,
			events,
			next_session_id: AtomicU64::new(1),
		}
	}

	/// Create a session for one observer. The session starts `Created` with
	/// all enrichment flags requested.
	pub fn new_session(&self, callbacks: Arc<dyn Callbacks>) -> Session {
		let id: SessionId = self.next_session_id.fetch_add(1, Ordering::Relaxed);
		let _ = self.tx.send(DispatchMsg::NewSession {
			id,
			callbacks,
		});
		Session::new(id, self.tx.clone())
	}

	/// Re-enumerate installed entities now. On failure the last-known cache
	/// contents are preserved.
	pub async fn refresh(&self) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(DispatchMsg::Refresh { reply: Some(reply) })
			.map_err(|_| RegistryError::ShutDown)?;
		rx.await.map_err(|_| RegistryError::ShutDown)?
	}

	/// Reset the cache to empty without re-enumerating
	pub async fn clear_entries(&self) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(DispatchMsg::Clear { reply })
			.map_err(|_| RegistryError::ShutDown)?;
		rx.await.map_err(|_| RegistryError::ShutDown)
	}

	/// Copies of all cached entries, in insertion order
	pub async fn entries(&self) -> Result<Vec<AppEntry>> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(DispatchMsg::Entries { reply })
			.map_err(|_| RegistryError::ShutDown)?;
		rx.await.map_err(|_| RegistryError::ShutDown)
	}

	/// The master entity list from the last enumeration, post hidden-module
	/// filtering, in enumeration order
	pub async fn applications(&self) -> Result<Vec<StaticInfo>> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(DispatchMsg::Applications { reply })
			.map_err(|_| RegistryError::ShutDown)?;
		rx.await.map_err(|_| RegistryError::ShutDown)
	}

	/// Wait until the dispatch queue is drained and no enrichment is in
	/// flight. Primarily a test barrier, replacing "drain all loopers".
	pub async fn settle(&self) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(DispatchMsg::Settle { reply })
			.map_err(|_| RegistryError::ShutDown)?;
		rx.await.map_err(|_| RegistryError::ShutDown)
	}

	/// Subscribe to registry events
	pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
		self.events.subscribe()
	}

	/// Stop the dispatch context. In-flight background work completes but its
	/// results are discarded.
	pub fn shutdown(&self) {
		let _ = self.tx.send(DispatchMsg::Shutdown);
	}
}
