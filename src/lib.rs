//! Dual-layer storefront credential management: an application-level client-credentials
//! ticket and an end-user shopper ticket, both refreshed on demand, single-flighted, and
//! injected into outgoing GraphQL request headers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod intercept;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::UserAuthTicket,
		flows::{
			ApplicationAuthManager, ReqwestApplicationAuthManager, ReqwestShopperAuthClient,
			ShopperAuthClient,
		},
		http::ReqwestHttpClient,
		store::MemoryTicketCache,
	};

	/// Client identifier used by reqwest-backed integration tests.
	pub const TEST_CLIENT_ID: &str = "app";
	/// Shared secret used by reqwest-backed integration tests.
	pub const TEST_SHARED_SECRET: &str = "secret";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs an [`ApplicationAuthManager`] against `auth_host`, backed by an in-memory
	/// cache that the caller can inspect.
	pub fn build_reqwest_test_app_manager(
		auth_host: &str,
	) -> (Arc<ReqwestApplicationAuthManager>, Arc<MemoryTicketCache>) {
		let cache = Arc::new(MemoryTicketCache::default());
		let manager = ApplicationAuthManager::builder()
			.client_id(TEST_CLIENT_ID)
			.shared_secret(TEST_SHARED_SECRET)
			.auth_host(auth_host)
			.http_client(Arc::new(test_reqwest_http_client()))
			.cache(cache.clone())
			.build()
			.expect("Application auth manager fixture should build.");

		(Arc::new(manager), cache)
	}

	/// Constructs a [`ShopperAuthClient`] whose application token comes from a manager that
	/// authenticates against the same mock host.
	pub fn build_reqwest_test_shopper_client(
		host: &str,
	) -> (ReqwestShopperAuthClient, Arc<ReqwestApplicationAuthManager>) {
		let (app_manager, _) = build_reqwest_test_app_manager(host);
		let client = ShopperAuthClient::builder()
			.api_host(host)
			.http_client(Arc::new(test_reqwest_http_client()))
			.app_auth(app_manager.clone())
			.build()
			.expect("Shopper auth client fixture should build.");

		(client, app_manager)
	}

	/// Builds a shopper ticket whose access token expires `access_ttl` from now and whose
	/// refresh token expires `refresh_ttl` from now. Negative durations produce past instants.
	pub fn user_ticket(
		access_token: &str,
		access_ttl: Duration,
		refresh_ttl: Duration,
	) -> UserAuthTicket {
		let now = OffsetDateTime::now_utc();

		UserAuthTicket::new(
			access_token,
			now + access_ttl,
			format!("{access_token}-refresh"),
			now + refresh_ttl,
		)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::{Mutex as AsyncMutex, OnceCell as AsyncOnceCell};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, storefront_auth as _};
