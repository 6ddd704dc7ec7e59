//! Cache contracts and built-in cache implementations for application tickets.
//!
//! Caches are explicit objects: build one per client (or share one handle between several
//! managers) and pass it to the manager builder. Each manager reads and writes under its own
//! [`CacheKey`], so a shared cache never mixes tickets from different credentials.

pub mod file;
pub mod memory;

pub use file::FileTicketCache;
pub use memory::MemoryTicketCache;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::AppAuthTicket};

/// Boxed future returned by [`AuthTicketCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Storage contract for application tickets that should outlive a single manager.
pub trait AuthTicketCache
where
	Self: Send + Sync,
{
	/// Fetches the ticket stored under `key`, if present.
	fn get_auth_ticket<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<AppAuthTicket>>;

	/// Stores or replaces the ticket under `key`.
	fn set_auth_ticket<'a>(&'a self, key: &'a CacheKey, ticket: AppAuthTicket)
	-> CacheFuture<'a, ()>;
}

/// Error type produced by [`AuthTicketCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Namespace under which one manager's ticket is cached.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);
impl CacheKey {
	/// Derives a key from the credential identity (auth host + client id).
	///
	/// The key is a base64 (no padding) SHA-256 digest so client identifiers never land in a
	/// persisted cache verbatim.
	pub fn for_client(auth_host: &Url, client_id: &str) -> Self {
		let mut hasher = Sha256::new();

		hasher.update(auth_host.as_str().trim_end_matches('/').as_bytes());
		hasher.update(b"\n");
		hasher.update(client_id.as_bytes());

		Self(STANDARD_NO_PAD.encode(hasher.finalize()))
	}

	/// Uses a caller-chosen name verbatim.
	pub fn named(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	/// Returns the key as a string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn cache_error_converts_into_crate_error_with_source() {
		let cache_error = CacheError::Backend { message: "disk full".into() };
		let err: Error = cache_error.clone().into();

		assert!(matches!(err, Error::Storage(_)));
		assert!(err.to_string().contains("disk full"));

		let source =
			StdError::source(&err).expect("Crate error should expose the cache error as its source.");

		assert_eq!(source.to_string(), cache_error.to_string());
	}

	#[test]
	fn client_keys_are_stable_and_distinct() {
		let host = Url::parse("https://auth.example.com/").expect("Fixture host should parse.");
		let same_host = Url::parse("https://auth.example.com").expect("Fixture host should parse.");
		let key = CacheKey::for_client(&host, "app");

		assert_eq!(key, CacheKey::for_client(&same_host, "app"));
		assert_ne!(key, CacheKey::for_client(&host, "other-app"));
		assert_eq!(CacheKey::named("API_AUTH").to_string(), "API_AUTH");
	}
}
