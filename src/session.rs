//! Per-observer sessions: a view configuration plus a cache subscription.

use crate::dispatch::DispatchMsg;
use crate::enrichment::RequestedData;
use crate::entry::AppEntry;
use crate::error::SessionError;
use crate::rebuild::{AppFilter, SortOrder};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Identifies one session within its registry
pub type SessionId = u64;

/// Observer interface; all methods are invoked on the dispatch context, in
/// event order, never concurrently for the same session.
pub trait Callbacks: Send + Sync {
	/// Terminal (and provisional) delivery of a rebuild's sorted snapshot
	fn on_rebuild_complete(&self, entries: Vec<AppEntry>);

	/// The visible package set changed after a re-enumeration
	fn on_package_list_changed(&self) {}

	/// An enrichment result mutated the shared cache
	fn on_entries_changed(&self) {}
}

/// Session lifecycle. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Created,
	Resumed,
	Paused,
	Destroyed,
}

/// Handle owned by one observer. Commands are forwarded to the registry's
/// dispatch context; nothing here blocks on background work.
///
/// Teardown is explicit: a dropped-but-not-destroyed session keeps receiving
/// dispatch work on the registry side.
pub struct Session {
	id: SessionId,
	tx: mpsc::UnboundedSender<DispatchMsg>,
	destroyed: AtomicBool,
}

impl Session {
	pub(crate) fn new(id: SessionId, tx: mpsc::UnboundedSender<DispatchMsg>) -> Self {
		Self {
			id,
			tx,
			destroyed: AtomicBool::new(false),
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	fn send(&self, msg: DispatchMsg) -> Result<(), SessionError> {
		if self.destroyed.load(Ordering::Acquire) {
			return Err(SessionError::Destroyed);
		}
		self.tx.send(msg).map_err(|_| SessionError::RegistryShutDown)
	}

	/// Choose which enrichment data this session wants delivered. Effective
	/// at the next rebuild; may be called in any non-destroyed state.
	pub fn set_flags(&self, flags: RequestedData) -> Result<(), SessionError> {
		self.send(DispatchMsg::SetFlags { id: self.id, flags })
	}

	/// Subscribe to cache-change notifications and re-run the last rebuild,
	/// if one was requested before
	pub fn on_resume(&self) -> Result<(), SessionError> {
		self.send(DispatchMsg::Resume { id: self.id })
	}

	/// Stop callbacks without losing filter/sort/flags state
	pub fn on_pause(&self) -> Result<(), SessionError> {
		self.send(DispatchMsg::Pause { id: self.id })
	}

	/// Request a filtered, sorted snapshot. Returns immediately; the result
	/// arrives via [`Callbacks::on_rebuild_complete`]. A new rebuild
	/// supersedes any in-flight one for this session.
	pub fn rebuild(&self, filter: AppFilter, order: SortOrder) -> Result<(), SessionError> {
		self.send(DispatchMsg::Rebuild {
			id: self.id,
			filter,
			order,
		})
	}

	/// Terminal teardown; every later call on this handle fails with
	/// [`SessionError::Destroyed`]
	pub fn on_destroy(&self) -> Result<(), SessionError> {
		self.send(DispatchMsg::Destroy { id: self.id })?;
		self.destroyed.store(true, Ordering::Release);
		Ok(())
	}
}
