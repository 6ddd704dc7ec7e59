//! Thread-safe in-memory [`AuthTicketCache`] implementation.

// self
use crate::{
	_prelude::*,
	auth::AppAuthTicket,
	store::{AuthTicketCache, CacheFuture, CacheKey},
};

type CacheMap = Arc<RwLock<HashMap<CacheKey, AppAuthTicket>>>;

/// Process-local ticket cache; the default backing store for application managers.
///
/// Cloning the cache clones the handle, so clones observe each other's writes.
#[derive(Clone, Debug, Default)]
pub struct MemoryTicketCache(CacheMap);
impl MemoryTicketCache {
	/// Returns the number of cached tickets.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing has been cached yet.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Returns a snapshot of the ticket stored under `key`.
	pub fn peek(&self, key: &CacheKey) -> Option<AppAuthTicket> {
		self.0.read().get(key).cloned()
	}

	/// Drops every cached ticket.
	pub fn clear(&self) {
		self.0.write().clear();
	}
}
impl AuthTicketCache for MemoryTicketCache {
	fn get_auth_ticket<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<AppAuthTicket>> {
		let ticket = self.peek(key);

		Box::pin(async move { Ok(ticket) })
	}

	fn set_auth_ticket<'a>(
		&'a self,
		key: &'a CacheKey,
		ticket: AppAuthTicket,
	) -> CacheFuture<'a, ()> {
		self.0.write().insert(key.clone(), ticket);

		Box::pin(async move { Ok(()) })
	}
}
