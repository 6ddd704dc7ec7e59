//! Header injection for outgoing GraphQL requests.
//!
//! [`AuthInterceptor`] asks its providers for current tokens and writes them into a request's
//! header map: the application token as `Authorization: Bearer ...` and, when a shopper
//! provider is attached, the shopper token as [`USER_CLAIMS_HEADER`]. Hosted deployments
//! skip the credential flows and forward the platform's static claims and scope headers
//! instead ([`AuthInterceptor::hosted`]). Headers the caller already set are left untouched.

// crates.io
use oauth2::http::{
	HeaderMap, HeaderName, HeaderValue,
	header::{AUTHORIZATION, Entry},
};
// self
use crate::{
	_prelude::*,
	config::HostedConfig,
	error::ConfigError,
	flows::AccessTokenProvider,
	http::{self, USER_CLAIMS_HEADER},
};
#[cfg(feature = "reqwest")]
use crate::{
	config::ApiConfig,
	flows::{
		AuthHooks, ReqwestApplicationAuthManager, ReqwestShopperAuthClient, ShopperAuthManager,
	},
};

/// Composes authentication headers from static values, an application provider, and an
/// optional shopper provider.
#[derive(Clone)]
pub struct AuthInterceptor {
	app: Option<Arc<dyn AccessTokenProvider>>,
	shopper: Option<Arc<dyn AccessTokenProvider>>,
	static_headers: HeaderMap,
}
impl AuthInterceptor {
	/// Creates an interceptor that only injects the application token.
	pub fn new(app: Arc<dyn AccessTokenProvider>) -> Self {
		Self { app: Some(app), shopper: None, static_headers: HeaderMap::new() }
	}

	/// Creates an interceptor for a hosted deployment, forwarding the claims and scope headers
	/// carried by `config`. No token provider is consulted.
	pub fn hosted(config: &HostedConfig) -> Result<Self, ConfigError> {
		Ok(Self { app: None, shopper: None, static_headers: config.api_headers()? })
	}

	/// Additionally injects the shopper token from `shopper`.
	pub fn with_shopper(mut self, shopper: Arc<dyn AccessTokenProvider>) -> Self {
		self.shopper = Some(shopper);

		self
	}

	/// Returns `true` when shopper tokens are injected.
	pub fn has_shopper(&self) -> bool {
		self.shopper.is_some()
	}

	/// Resolves current tokens and returns them as a fresh header map.
	pub async fn headers(&self) -> Result<HeaderMap> {
		let mut headers = HeaderMap::new();

		self.apply(&mut headers).await?;

		Ok(headers)
	}

	/// Returns the headers forwarded verbatim on every request.
	pub fn static_headers(&self) -> &HeaderMap {
		&self.static_headers
	}

	/// Resolves current tokens and inserts any authentication header missing from `headers`.
	///
	/// Static headers are inserted first. Providers are only consulted for headers that still
	/// need a value.
	pub async fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
		for (name, value) in &self.static_headers {
			insert_missing(headers, name.clone(), value.clone());
		}

		if let Some(app) = self.app.as_ref().filter(|_| !headers.contains_key(AUTHORIZATION)) {
			let token = app.access_token().await?;

			insert_missing(headers, AUTHORIZATION, http::bearer_header(&token)?);
		}

		if let Some(shopper) = &self.shopper {
			let name = HeaderName::from_static(USER_CLAIMS_HEADER);

			if !headers.contains_key(&name) {
				let token = shopper.access_token().await?;
				let value = HeaderValue::try_from(token)
					.map_err(|_| ConfigError::InvalidHeader { header: USER_CLAIMS_HEADER })?;

				insert_missing(headers, name, value);
			}
		}

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl AuthInterceptor {
	/// Wires reqwest-backed managers from `config`.
	///
	/// The application manager is always created. The shopper client and manager are only
	/// created when `hooks` are supplied, because shopper state without a place to persist it
	/// would be lost with the interceptor.
	pub fn from_config(
		config: &ApiConfig,
		hooks: Option<Arc<dyn AuthHooks>>,
	) -> Result<Self, ConfigError> {
		let app = Arc::new(ReqwestApplicationAuthManager::from_config(config)?);
		let interceptor = Self::new(app.clone());
		let Some(hooks) = hooks else {
			return Ok(interceptor);
		};
		let client = ReqwestShopperAuthClient::from_config(config, app)?;
		let shopper =
			ShopperAuthManager::builder().user_auth_fetcher(Arc::new(client)).hooks(hooks).build()?;

		Ok(interceptor.with_shopper(Arc::new(shopper)))
	}

	/// Picks the deployment shape from the process environment.
	///
	/// When [`ENV_HOSTED`](crate::config::ENV_HOSTED) is set the hosted interceptor is built
	/// and `hooks` are ignored; otherwise [`ApiConfig::from_env`] feeds
	/// [`from_config`](Self::from_config).
	pub fn from_env(hooks: Option<Arc<dyn AuthHooks>>) -> Result<Self, ConfigError> {
		match HostedConfig::detect()? {
			Some(hosted) => Self::hosted(&hosted),
			None => Self::from_config(&ApiConfig::from_env()?, hooks),
		}
	}
}
impl Debug for AuthInterceptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthInterceptor")
			.field("app", &self.app.is_some())
			.field("shopper", &self.shopper.is_some())
			.field("static_headers", &self.static_headers.keys().collect::<Vec<_>>())
			.finish()
	}
}

fn insert_missing(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
	if let Entry::Vacant(entry) = headers.entry(name) {
		entry.insert(value);
	}
}
