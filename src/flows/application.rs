//! Application (client-credentials) ticket management.
//!
//! [`ApplicationAuthManager::get_access_token`] reads the ticket from the configured
//! [`AuthTicketCache`], reuses it while it is fresh, and otherwise refreshes or
//! re-authenticates. Resolution is serialized behind a per-manager guard and the cache is
//! re-read once the guard is held, so concurrent callers piggy-back on the first caller's
//! network call instead of stampeding the authentication endpoint.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{AppAuthTicket, AppTicketResponse, TokenSecret},
	config,
	error::ConfigError,
	flows::{AccessTokenProvider, TokenFuture},
	http::{self, AuthRequest, HttpFetcher},
	obs::{self, FlowKind},
	store::{AuthTicketCache, CacheKey, MemoryTicketCache},
};
#[cfg(feature = "reqwest")] use crate::{config::ApiConfig, http::ReqwestHttpClient};

const AUTHENTICATE_PATH: &str = "/api/platform/applications/authtickets/oauth";
const REFRESH_PATH: &str = "/api/platform/applications/authtickets/refresh-ticket";

/// Application manager specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestApplicationAuthManager = ApplicationAuthManager<ReqwestHttpClient>;

/// Maintains exactly one valid application access token per client identity.
pub struct ApplicationAuthManager<C>
where
	C: ?Sized + HttpFetcher,
{
	client_id: String,
	shared_secret: TokenSecret,
	auth_host: Url,
	http_client: Arc<C>,
	cache: Arc<dyn AuthTicketCache>,
	cache_key: CacheKey,
	expiry_leeway: Duration,
	flow_guard: AsyncMutex<()>,
}
impl<C> ApplicationAuthManager<C>
where
	C: ?Sized + HttpFetcher,
{
	/// Starts a builder; see [`ApplicationAuthManagerBuilder`] for the required settings.
	pub fn builder() -> ApplicationAuthManagerBuilder<C> {
		ApplicationAuthManagerBuilder {
			client_id: None,
			shared_secret: None,
			auth_host: None,
			http_client: None,
			cache: None,
			cache_key: None,
			expiry_leeway: Duration::ZERO,
		}
	}

	/// Returns the normalized authentication host.
	pub fn auth_host(&self) -> &Url {
		&self.auth_host
	}

	/// Returns the key this manager reads and writes in its cache.
	pub fn cache_key(&self) -> &CacheKey {
		&self.cache_key
	}

	/// Returns a currently valid application access token.
	///
	/// A cached, unexpired ticket is returned as-is. An expired ticket carrying a refresh token
	/// is refreshed; anything else triggers a fresh client-credentials authentication. The new
	/// ticket is written to the cache before the token is returned.
	pub async fn get_access_token(&self) -> Result<String> {
		if let Some(ticket) = self.fresh_cached_ticket().await? {
			return Ok(ticket.access_token.expose().to_owned());
		}

		let _singleflight = self.flow_guard.lock().await;
		let ticket = match self.cache.get_auth_ticket(&self.cache_key).await? {
			Some(ticket) if !self.is_stale(&ticket) => ticket,
			Some(ticket) => self.refresh_ticket(&ticket).await?,
			None => self.authenticate().await?,
		};

		Ok(ticket.access_token.expose().to_owned())
	}

	/// Performs the client-credentials call and caches the resulting ticket.
	pub async fn authenticate(&self) -> Result<AppAuthTicket> {
		obs::observe(FlowKind::AppAuthenticate, "authenticate", async {
			let url = config::endpoint(&self.auth_host, AUTHENTICATE_PATH);
			let body = ClientCredentialsBody {
				client_id: &self.client_id,
				client_secret: self.shared_secret.expose(),
				grant_type: "client_credentials",
			};
			let request = AuthRequest::new(Method::POST, &url).json(&body)?.build()?;
			let issued_at = OffsetDateTime::now_utc();
			let response = http::send(self.http_client.as_ref(), request).await?;
			let ticket = http::parse_json::<AppTicketResponse>("app_authenticate", &response)?
				.into_ticket(issued_at)?;

			self.cache.set_auth_ticket(&self.cache_key, ticket.clone()).await?;

			Ok(ticket)
		})
		.await
	}

	/// Exchanges the ticket's refresh token for a new ticket and caches it.
	///
	/// Tickets without a refresh token are replaced through [`authenticate`](Self::authenticate).
	/// When the platform omits a refresh token in its answer the previous one is carried over.
	pub async fn refresh_ticket(&self, ticket: &AppAuthTicket) -> Result<AppAuthTicket> {
		let Some(refresh_token) = ticket.refresh_token.as_ref().filter(|token| !token.is_blank())
		else {
			return self.authenticate().await;
		};

		obs::observe(FlowKind::AppRefresh, "refresh_ticket", async {
			let url = config::endpoint(&self.auth_host, REFRESH_PATH);
			let body = RefreshTicketBody { refresh_token: refresh_token.expose() };
			let request = AuthRequest::new(Method::POST, &url).json(&body)?.build()?;
			let issued_at = OffsetDateTime::now_utc();
			let response = http::send(self.http_client.as_ref(), request).await?;
			let mut refreshed = http::parse_json::<AppTicketResponse>("app_refresh", &response)?
				.into_ticket(issued_at)?;

			if refreshed.refresh_token.is_none() {
				refreshed.refresh_token = Some(refresh_token.clone());
			}

			self.cache.set_auth_ticket(&self.cache_key, refreshed.clone()).await?;

			Ok(refreshed)
		})
		.await
	}

	async fn fresh_cached_ticket(&self) -> Result<Option<AppAuthTicket>> {
		let cached = self.cache.get_auth_ticket(&self.cache_key).await?;

		Ok(cached.filter(|ticket| !self.is_stale(ticket)))
	}

	fn is_stale(&self, ticket: &AppAuthTicket) -> bool {
		ticket.is_expired_at(OffsetDateTime::now_utc() + self.expiry_leeway)
	}
}
#[cfg(feature = "reqwest")]
impl ApplicationAuthManager<ReqwestHttpClient> {
	/// Builds a manager from validated settings, using a default reqwest transport and a
	/// private in-memory cache.
	pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		Self::builder()
			.client_id(config.client_id.as_str())
			.shared_secret(config.shared_secret.expose())
			.auth_host(config.auth_host_url()?.as_str())
			.http_client(Arc::new(ReqwestHttpClient::default()))
			.build()
	}
}
impl<C> AccessTokenProvider for ApplicationAuthManager<C>
where
	C: ?Sized + HttpFetcher,
{
	fn access_token(&self) -> TokenFuture<'_> {
		Box::pin(self.get_access_token())
	}
}
impl<C> Debug for ApplicationAuthManager<C>
where
	C: ?Sized + HttpFetcher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApplicationAuthManager")
			.field("client_id", &self.client_id)
			.field("shared_secret", &self.shared_secret)
			.field("auth_host", &self.auth_host.as_str())
			.field("cache_key", &self.cache_key)
			.field("expiry_leeway", &self.expiry_leeway)
			.finish()
	}
}

/// Fail-fast builder for [`ApplicationAuthManager`].
///
/// `client_id`, `shared_secret`, `auth_host`, and `http_client` are required. Without an
/// explicit cache the manager owns a private [`MemoryTicketCache`].
pub struct ApplicationAuthManagerBuilder<C>
where
	C: ?Sized + HttpFetcher,
{
	client_id: Option<String>,
	shared_secret: Option<TokenSecret>,
	auth_host: Option<String>,
	http_client: Option<Arc<C>>,
	cache: Option<Arc<dyn AuthTicketCache>>,
	cache_key: Option<CacheKey>,
	expiry_leeway: Duration,
}
impl<C> ApplicationAuthManagerBuilder<C>
where
	C: ?Sized + HttpFetcher,
{
	/// Sets the application client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the application shared secret.
	pub fn shared_secret(mut self, shared_secret: impl Into<String>) -> Self {
		self.shared_secret = Some(TokenSecret::new(shared_secret));

		self
	}

	/// Sets the authentication host; `https://` is assumed when no scheme is given.
	pub fn auth_host(mut self, auth_host: impl Into<String>) -> Self {
		self.auth_host = Some(auth_host.into());

		self
	}

	/// Sets the transport used for every authentication call.
	pub fn http_client(mut self, http_client: Arc<C>) -> Self {
		self.http_client = Some(http_client);

		self
	}

	/// Shares a cache handle, e.g. one cache across several managers or a persistent one.
	pub fn cache(mut self, cache: Arc<dyn AuthTicketCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Overrides the derived cache key.
	pub fn cache_key(mut self, cache_key: CacheKey) -> Self {
		self.cache_key = Some(cache_key);

		self
	}

	/// Treats tickets as expired `leeway` before their recorded expiry. Negative values are
	/// clamped to zero.
	pub fn expiry_leeway(mut self, leeway: Duration) -> Self {
		self.expiry_leeway = leeway.max(Duration::ZERO);

		self
	}

	/// Validates the settings and builds the manager.
	pub fn build(self) -> Result<ApplicationAuthManager<C>, ConfigError> {
		let client_id = self
			.client_id
			.filter(|id| !id.trim().is_empty())
			.ok_or(ConfigError::MissingField { field: "client_id" })?;
		let shared_secret = self
			.shared_secret
			.filter(|secret| !secret.is_blank())
			.ok_or(ConfigError::MissingField { field: "shared_secret" })?;
		let auth_host = config::parse_host("auth_host", self.auth_host.as_deref().unwrap_or(""))?;
		let http_client =
			self.http_client.ok_or(ConfigError::MissingField { field: "http_client" })?;
		let cache_key =
			self.cache_key.unwrap_or_else(|| CacheKey::for_client(&auth_host, &client_id));
		let cache = self.cache.unwrap_or_else(|| Arc::new(MemoryTicketCache::default()));

		Ok(ApplicationAuthManager {
			client_id,
			shared_secret,
			auth_host,
			http_client,
			cache,
			cache_key,
			expiry_leeway: self.expiry_leeway,
			flow_guard: AsyncMutex::new(()),
		})
	}
}
impl<C> Debug for ApplicationAuthManagerBuilder<C>
where
	C: ?Sized + HttpFetcher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApplicationAuthManagerBuilder")
			.field("client_id", &self.client_id)
			.field("shared_secret_set", &self.shared_secret.is_some())
			.field("auth_host", &self.auth_host)
			.field("http_client_set", &self.http_client.is_some())
			.field("cache_set", &self.cache.is_some())
			.finish()
	}
}

#[derive(Serialize)]
struct ClientCredentialsBody<'a> {
	client_id: &'a str,
	client_secret: &'a str,
	grant_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTicketBody<'a> {
	refresh_token: &'a str,
}
