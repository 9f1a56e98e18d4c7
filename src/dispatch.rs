//! Dispatch context: a single actor task owning all mutable registry state.
//!
//! Commands from sessions and results from background workers arrive on one
//! FIFO channel; the cache is therefore single-writer and observer callbacks
//! are delivered in the order their triggering events were enqueued.

use crate::cache::EntryCache;
use crate::enrichment::{
	spawn_enumerate, spawn_home, spawn_icon, spawn_launcher, spawn_size, EnrichKind, EnrichValue,
	PendingKey, RequestedData,
};
use crate::entry::{AppEntry, StaticInfo, UserId};
use crate::error::Result;
use crate::events::{EventBus, RegistryEvent};
use crate::rebuild::{build_visible, AppFilter, MissingData, SortOrder};
use crate::session::{Callbacks, SessionId, SessionState};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Everything the dispatch context can be asked to do
pub(crate) enum DispatchMsg {
	NewSession {
		id: SessionId,
		callbacks: Arc<dyn Callbacks>,
	},
	SetFlags {
		id: SessionId,
		flags: RequestedData,
	},
	Resume {
		id: SessionId,
	},
	Pause {
		id: SessionId,
	},
	Destroy {
		id: SessionId,
	},
	Rebuild {
		id: SessionId,
		filter: AppFilter,
		order: SortOrder,
	},
	/// Re-enumerate the package service; `reply` propagates enumeration
	/// failure to the caller of `Registry::refresh`
	Refresh {
		reply: Option<oneshot::Sender<Result<()>>>,
	},
	Clear {
		reply: oneshot::Sender<()>,
	},
	Entries {
		reply: oneshot::Sender<Vec<AppEntry>>,
	},
	Applications {
		reply: oneshot::Sender<Vec<StaticInfo>>,
	},
	/// A background worker finished; `value` is None on failure
	Enriched {
		key: PendingKey,
		value: Option<EnrichValue>,
		reply: Option<oneshot::Sender<Result<()>>>,
	},
	/// Resolves once the queue is drained and no background work is in flight
	Settle {
		reply: oneshot::Sender<()>,
	},
	Shutdown,
}

struct SessionRecord {
	flags: RequestedData,
	state: SessionState,
	callbacks: Arc<dyn Callbacks>,
	last_filter: Option<AppFilter>,
	last_order: Option<SortOrder>,
}

pub(crate) struct Dispatcher {
	rx: mpsc::UnboundedReceiver<DispatchMsg>,
	/// Handed to background workers so results come back through the queue
	tx: mpsc::UnboundedSender<DispatchMsg>,
	providers: crate::providers::Providers,
	users: Vec<UserId>,
	events: Arc<EventBus>,
	cache: EntryCache,
	/// Master list post hidden-module filtering, in enumeration order
	applications: Vec<StaticInfo>,
	sessions: HashMap<SessionId, SessionRecord>,
	pending: HashSet<PendingKey>,
	in_flight: usize,
	settle_waiters: Vec<oneshot::Sender<()>>,
	/// None until the first home query of this activation completes
	home_package: Option<Option<String>>,
}

impl Dispatcher {
	pub(crate) fn new(
		rx: mpsc::UnboundedReceiver<DispatchMsg>,
		tx: mpsc::UnboundedSender<DispatchMsg>,
		providers: crate::providers::Providers,
		users: Vec<UserId>,
		events: Arc<EventBus>,
	) -> Self {
		Self {
			rx,
			tx,
			providers,
			users,
			events,
			cache: EntryCache::new(),
			applications: Vec::new(),
			sessions: HashMap::new(),
			pending: HashSet::new(),
			in_flight: 0,
			settle_waiters: Vec::new(),
			home_package: None,
		}
	}

	pub(crate) async fn run(mut self) {
		info!("registry dispatch loop starting");

		while let Some(msg) = self.rx.recv().await {
			if matches!(msg, DispatchMsg::Shutdown) {
				break;
			}
			self.handle(msg);
			self.flush_settle_waiters();
		}

		info!(
			"registry dispatch loop stopped ({} entries, {} sessions)",
			self.cache.len(),
			self.sessions.len()
		);
	}

	fn handle(&mut self, msg: DispatchMsg) {
		match msg {
			DispatchMsg::NewSession { id, callbacks } => {
				self.sessions.insert(
					id,
					SessionRecord {
						flags: RequestedData::all(),
						state: SessionState::Created,
						callbacks,
						last_filter: None,
						last_order: None,
					},
				);
				debug!(session = id, "session created");
			}
			DispatchMsg::SetFlags { id, flags } => {
				if let Some(record) = self.sessions.get_mut(&id) {
					record.flags = flags;
				}
			}
			DispatchMsg::Resume { id } => self.resume_session(id),
			DispatchMsg::Pause { id } => {
				if let Some(record) = self.sessions.get_mut(&id) {
					if record.state == SessionState::Resumed {
						record.state = SessionState::Paused;
						debug!(session = id, "session paused");
					}
				}
			}
			DispatchMsg::Destroy { id } => {
				// Removing the record makes any in-flight work irrelevant to
				// this session; shared enrichment results still land in the
				// cache for everyone else.
				if self.sessions.remove(&id).is_some() {
					debug!(session = id, "session destroyed");
				}
			}
			DispatchMsg::Rebuild { id, filter, order } => {
				if let Some(record) = self.sessions.get_mut(&id) {
					record.last_filter = Some(filter);
					record.last_order = Some(order);
					self.rebuild_session(id);
				} else {
					warn!(session = id, "rebuild for unknown session ignored");
				}
			}
			DispatchMsg::Refresh { reply } => self.request_enumeration(reply),
			DispatchMsg::Clear { reply } => {
				self.cache.clear();
				self.applications.clear();
				self.home_package = None;
				self.events.emit(RegistryEvent::EntriesCleared);
				let _ = reply.send(());
			}
			DispatchMsg::Entries { reply } => {
				let _ = reply.send(self.cache.snapshot_all());
			}
			DispatchMsg::Applications { reply } => {
				let _ = reply.send(self.applications.clone());
			}
			DispatchMsg::Enriched { key, value, reply } => {
				self.in_flight = self.in_flight.saturating_sub(1);
				self.pending.remove(&key);
				if let Some(value) = value {
					self.apply_enrichment(value, reply);
				}
				// Failed work already replied from the worker side
			}
			DispatchMsg::Settle { reply } => self.settle_waiters.push(reply),
			DispatchMsg::Shutdown => {}
		}
	}

	fn flush_settle_waiters(&mut self) {
		if self.in_flight == 0 && !self.settle_waiters.is_empty() {
			for waiter in self.settle_waiters.drain(..) {
				let _ = waiter.send(());
			}
		}
	}

	fn resume_session(&mut self, id: SessionId) {
		let Some(record) = self.sessions.get_mut(&id) else {
			return;
		};
		match record.state {
			SessionState::Created | SessionState::Paused => {
				record.state = SessionState::Resumed;
				debug!(session = id, "session resumed");
			}
			SessionState::Resumed => return,
			SessionState::Destroyed => return,
		}

		// Resume re-reads the installed set and replays the last rebuild
		self.request_enumeration(None);
		if self
			.sessions
			.get(&id)
			.is_some_and(|record| record.last_filter.is_some())
		{
			self.rebuild_session(id);
		}
	}

	/// Run one rebuild for `id` with its stored filter/order and deliver a
	/// masked snapshot. Enqueues background work for missing data.
	fn rebuild_session(&mut self, id: SessionId) {
		let Some(record) = self.sessions.get(&id) else {
			return;
		};
		if record.state != SessionState::Resumed {
			// Paused/created sessions keep the request; it replays on resume
			return;
		}
		let (Some(filter), Some(order)) = (record.last_filter.clone(), record.last_order) else {
			return;
		};
		let flags = record.flags;
		let callbacks = record.callbacks.clone();

		// Labels are resolved lazily, before filtering and sorting
		self.cache.for_each_mut(|entry| {
			entry.ensure_label();
		});

		let visible = build_visible(self.cache.snapshot_all(), &filter, order);

		for entry in &visible {
			let missing = MissingData::of(entry, &flags);
			if missing.icon {
				self.request_entry_work(EnrichKind::Icon, entry, &flags);
			}
			if missing.size {
				self.request_entry_work(EnrichKind::Size, entry, &flags);
			}
			if missing.launcher {
				self.request_entry_work(EnrichKind::Launcher, entry, &flags);
			}
		}
		if flags.home_app && self.home_package.is_none() {
			self.request_home();
		}

		let delivery: Vec<AppEntry> = visible
			.iter()
			.map(|entry| entry.masked_for(&flags))
			.collect();
		debug!(session = id, entries = delivery.len(), "rebuild delivered");
		callbacks.on_rebuild_complete(delivery);
	}

	fn request_entry_work(&mut self, kind: EnrichKind, entry: &AppEntry, flags: &RequestedData) {
		let key = PendingKey::entry(kind, entry.id.clone());
		if !self.pending.insert(key) {
			return;
		}
		self.in_flight += 1;
		match kind {
			EnrichKind::Icon => spawn_icon(
				self.providers.clone(),
				self.tx.clone(),
				entry.info.clone(),
				entry.created_seq,
			),
			EnrichKind::Size => spawn_size(
				self.providers.clone(),
				self.tx.clone(),
				entry.info.clone(),
				entry.created_seq,
			),
			EnrichKind::Launcher => {
				// Query only the surfaces this entry has not answered yet
				let intents: Vec<_> = flags
					.launch_intents()
					.into_iter()
					.filter(|intent| !entry.resolved_intents.contains(intent))
					.collect();
				spawn_launcher(
					self.providers.clone(),
					self.tx.clone(),
					entry.id.clone(),
					entry.created_seq,
					intents,
				)
			}
			EnrichKind::Home | EnrichKind::Enumerate => unreachable!("global work"),
		}
	}

	fn request_home(&mut self) {
		let key = PendingKey::global(EnrichKind::Home);
		if !self.pending.insert(key) {
			return;
		}
		self.in_flight += 1;
		spawn_home(self.providers.clone(), self.tx.clone());
	}

	fn request_enumeration(&mut self, reply: Option<oneshot::Sender<Result<()>>>) {
		let key = PendingKey::global(EnrichKind::Enumerate);
		// Fire-and-forget reloads collapse; explicit refreshes always run so
		// their reply channel resolves
		if reply.is_none() && self.pending.contains(&key) {
			return;
		}
		self.pending.insert(key);
		self.in_flight += 1;
		spawn_enumerate(
			self.providers.clone(),
			self.tx.clone(),
			self.users.clone(),
			reply,
		);
	}

	fn apply_enrichment(
		&mut self,
		value: EnrichValue,
		reply: Option<oneshot::Sender<Result<()>>>,
	) {
		match value {
			EnrichValue::Icon {
				id,
				created_seq,
				icon,
			} => {
				let changed = match self.cache.get_mut(&id) {
					Some(entry) if entry.created_seq == created_seq => entry.set_icon(icon),
					// Entry removed or re-created since the request: discard
					_ => false,
				};
				if changed {
					self.events.emit(RegistryEvent::EntryUpdated { id });
					self.notify_change(|flags| flags.icons);
				}
			}
			EnrichValue::Size {
				id,
				created_seq,
				size_bytes,
			} => {
				let changed = match self.cache.get_mut(&id) {
					Some(entry) if entry.created_seq == created_seq => entry.set_size(size_bytes),
					_ => false,
				};
				if changed {
					self.events.emit(RegistryEvent::EntryUpdated { id });
					self.notify_change(|flags| flags.sizes);
				}
			}
			EnrichValue::Launcher {
				id,
				created_seq,
				intents,
				has_entry,
				enabled,
			} => {
				let changed = match self.cache.get_mut(&id) {
					Some(entry) if entry.created_seq == created_seq => {
						entry.set_launcher(&intents, has_entry, enabled)
					}
					_ => false,
				};
				if changed {
					self.events.emit(RegistryEvent::EntryUpdated { id });
					self.notify_change(|flags| flags.wants_launcher());
				}
			}
			EnrichValue::Home { home_package } => {
				self.home_package = Some(home_package.clone());
				let mut updated = Vec::new();
				self.cache.for_each_mut(|entry| {
					let is_home = home_package.as_deref() == Some(entry.id.package_name.as_str());
					if entry.set_home_app(is_home) {
						updated.push(entry.id.clone());
					}
				});
				for id in updated.iter().cloned() {
					self.events.emit(RegistryEvent::EntryUpdated { id });
				}
				if !updated.is_empty() {
					self.notify_change(|flags| flags.home_app);
				}
			}
			EnrichValue::Loaded { apps } => {
				self.apply_enumeration(apps, reply);
				return;
			}
		}
	}

	fn apply_enumeration(
		&mut self,
		apps: Vec<StaticInfo>,
		reply: Option<oneshot::Sender<Result<()>>>,
	) {
		let outcome = self.cache.reconcile(&apps);
		self.applications = apps;

		self.events.emit(RegistryEvent::EntriesLoaded {
			count: self.applications.len(),
		});
		for id in &outcome.added {
			self.events.emit(RegistryEvent::EntryAdded { id: id.clone() });
		}
		for id in &outcome.removed {
			self.events
				.emit(RegistryEvent::EntryRemoved { id: id.clone() });
		}
		for id in &outcome.updated {
			self.events
				.emit(RegistryEvent::EntryUpdated { id: id.clone() });
		}

		// A re-enumeration can change which entry matches the home activity
		if outcome.changed() {
			if let Some(home_package) = self.home_package.clone() {
				self.cache.for_each_mut(|entry| {
					let is_home =
						home_package.as_deref() == Some(entry.id.package_name.as_str());
					entry.set_home_app(is_home);
				});
			}
			info!(
				loaded = self.applications.len(),
				added = outcome.added.len(),
				removed = outcome.removed.len(),
				"package list reconciled"
			);
			let resumed: Vec<(SessionId, Arc<dyn Callbacks>)> = self
				.sessions
				.iter()
				.filter(|(_, record)| record.state == SessionState::Resumed)
				.map(|(id, record)| (*id, record.callbacks.clone()))
				.collect();
			for (_, callbacks) in &resumed {
				callbacks.on_package_list_changed();
			}
			for (id, _) in resumed {
				self.rebuild_session(id);
			}
		}

		if let Some(reply) = reply {
			let _ = reply.send(Ok(()));
		}
	}

	/// Relay "something changed" to every resumed session whose flags care,
	/// by re-running its last rebuild
	fn notify_change(&mut self, relevant: impl Fn(&RequestedData) -> bool) {
		let interested: Vec<(SessionId, Arc<dyn Callbacks>)> = self
			.sessions
			.iter()
			.filter(|(_, record)| {
				record.state == SessionState::Resumed
					&& record.last_filter.is_some()
					&& relevant(&record.flags)
			})
			.map(|(id, record)| (*id, record.callbacks.clone()))
			.collect();

		for (_, callbacks) in &interested {
			callbacks.on_entries_changed();
		}
		for (id, _) in interested {
			self.rebuild_session(id);
		}
	}
}
