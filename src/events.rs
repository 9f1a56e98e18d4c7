//! Event bus for decoupled change notifications

use crate::entry::AppId;
use tokio::sync::broadcast;

/// Registry-related events
#[derive(Debug, Clone)]
pub enum RegistryEvent {
	/// The installed-package list was (re)loaded
	EntriesLoaded { count: usize },

	/// A new entry entered the cache
	EntryAdded { id: AppId },

	/// An enrichment result or reload mutated an entry
	EntryUpdated { id: AppId },

	/// An entry left the cache
	EntryRemoved { id: AppId },

	/// The cache was reset without re-enumeration
	EntriesCleared,
}

/// Event bus for broadcasting registry events
pub struct EventBus {
	sender: broadcast::Sender<RegistryEvent>,
}

impl EventBus {
	/// Create a new event bus with specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Emit an event
	pub fn emit(&self, event: RegistryEvent) {
		// Ignore send errors (no receivers)
		let _ = self.sender.send(event);
	}

	/// Subscribe to events
	pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}
