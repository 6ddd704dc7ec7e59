//! API connection settings and host normalization.
//!
//! Two deployment shapes are supported. Standalone deployments authenticate with
//! [`ApiConfig`] credentials. Hosted deployments receive pre-issued claims and scoping values
//! through the [`ENV_HOSTED`] variable, read into [`HostedConfig`].

// std
use std::env;
// crates.io
use oauth2::http::{HeaderMap, HeaderName, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	http::{
		APP_CLAIMS_HEADER, CATALOG_HEADER, MASTER_CATALOG_HEADER, SITE_HEADER, TENANT_HEADER,
		USER_CLAIMS_HEADER,
	},
};

/// Environment variable holding the application client identifier.
pub const ENV_CLIENT_ID: &str = "KIBO_CLIENT_ID";
/// Environment variable holding the application shared secret.
pub const ENV_SHARED_SECRET: &str = "KIBO_SHARED_SECRET";
/// Environment variable holding the authentication host.
pub const ENV_AUTH_HOST: &str = "KIBO_AUTH_HOST";
/// Environment variable holding the commerce API host.
pub const ENV_API_HOST: &str = "KIBO_API_HOST";
/// Environment variable holding a full access-token URL (used when no auth host is set).
pub const ENV_ACCESS_TOKEN_URL: &str = "KIBO_ACCESS_TOKEN_URL";
/// Environment variable holding the hosted platform's JSON settings.
pub const ENV_HOSTED: &str = "mozuHosted";

/// Connection settings for the platform's authentication and commerce APIs.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
	/// Application client identifier.
	pub client_id: String,
	/// Application shared secret.
	pub shared_secret: TokenSecret,
	/// Authentication host; derived from `access_token_url` when absent.
	#[serde(default)]
	pub auth_host: Option<String>,
	/// Full access-token URL, accepted in place of `auth_host`.
	#[serde(default)]
	pub access_token_url: Option<String>,
	/// Commerce API host.
	pub api_host: String,
}
impl ApiConfig {
	/// Creates a config from explicit values.
	pub fn new(
		client_id: impl Into<String>,
		shared_secret: impl Into<String>,
		auth_host: impl Into<String>,
		api_host: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			shared_secret: TokenSecret::new(shared_secret),
			auth_host: Some(auth_host.into()),
			access_token_url: None,
			api_host: api_host.into(),
		}
	}

	/// Loads settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Loads settings through an arbitrary key lookup, then validates them.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let required = |key: &'static str| read(key).ok_or(ConfigError::MissingEnv { var: key });
		let config = Self {
			client_id: required(ENV_CLIENT_ID)?,
			shared_secret: TokenSecret::new(required(ENV_SHARED_SECRET)?),
			auth_host: read(ENV_AUTH_HOST),
			access_token_url: read(ENV_ACCESS_TOKEN_URL),
			api_host: required(ENV_API_HOST)?,
		};

		config.validate()?;

		Ok(config)
	}

	/// Checks that every required setting is present and every host parses.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "client_id" });
		}
		if self.shared_secret.is_blank() {
			return Err(ConfigError::MissingField { field: "shared_secret" });
		}

		self.auth_host_url()?;
		self.api_host_url()?;

		Ok(())
	}

	/// Returns `true` when [`validate`](Self::validate) succeeds.
	pub fn is_valid(&self) -> bool {
		self.validate().is_ok()
	}

	/// Resolves the authentication host, falling back to the origin of `access_token_url`.
	pub fn auth_host_url(&self) -> Result<Url, ConfigError> {
		let host = self
			.auth_host
			.as_deref()
			.filter(|host| !host.trim().is_empty())
			.map(str::to_owned)
			.or_else(|| self.access_token_url.as_deref().and_then(host_from_url))
			.ok_or(ConfigError::MissingField { field: "auth_host" })?;

		parse_host("auth_host", &host)
	}

	/// Resolves the commerce API host.
	pub fn api_host_url(&self) -> Result<Url, ConfigError> {
		parse_host("api_host", &self.api_host)
	}
}
impl Debug for ApiConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiConfig")
			.field("client_id", &self.client_id)
			.field("shared_secret", &self.shared_secret)
			.field("auth_host", &self.auth_host)
			.field("access_token_url", &self.access_token_url)
			.field("api_host", &self.api_host)
			.finish()
	}
}

/// Settings injected by the hosting platform.
///
/// The platform exports a JSON document whose `sdkConfig` object carries pre-issued claims
/// and the tenant/site/catalog scope. Requests made from a hosted deployment forward these
/// values as static headers instead of running the credential flows.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostedConfig {
	/// GraphQL base URL of the tenant.
	#[serde(default, rename = "baseUrl")]
	pub base_url: Option<String>,
	/// Payment service base URL.
	#[serde(default, rename = "basePciUrl")]
	pub base_pci_url: Option<String>,
	/// Tenant pod URL.
	#[serde(default, rename = "tenantPod")]
	pub tenant_pod: Option<String>,
	/// Pre-issued application claims.
	#[serde(default)]
	pub app_claims: Option<String>,
	/// Pre-issued shopper claims.
	#[serde(default)]
	pub user_claims: Option<String>,
	/// Tenant identifier.
	#[serde(default)]
	pub tenant: Option<String>,
	/// Site identifier.
	#[serde(default)]
	pub site: Option<String>,
	/// Master catalog identifier.
	#[serde(default)]
	pub master_catalog: Option<String>,
	/// Catalog identifier.
	#[serde(default)]
	pub catalog: Option<String>,
	/// Data view mode (`Live` or `Pending`); informational, never forwarded.
	#[serde(default)]
	pub dataview_mode: Option<String>,
}
impl HostedConfig {
	/// Reads [`ENV_HOSTED`] from the process environment; `None` when the variable is unset.
	pub fn detect() -> Result<Option<Self>, ConfigError> {
		Self::detect_with(|key| env::var(key).ok())
	}

	/// Like [`detect`](Self::detect), reading through an arbitrary key lookup.
	pub fn detect_with<F>(lookup: F) -> Result<Option<Self>, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		lookup(ENV_HOSTED).map(|raw| Self::from_json(&raw)).transpose()
	}

	/// Loads the hosted settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::detect()?.ok_or(ConfigError::MissingEnv { var: ENV_HOSTED })
	}

	/// Parses the platform's JSON document and extracts its `sdkConfig` object.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		#[derive(Deserialize)]
		struct Envelope {
			#[serde(rename = "sdkConfig")]
			sdk_config: HostedConfig,
		}

		serde_json::from_str::<Envelope>(raw)
			.map(|envelope| envelope.sdk_config)
			.map_err(ConfigError::HostedConfig)
	}

	/// Builds the static request headers; settings that are absent or empty are skipped.
	pub fn api_headers(&self) -> Result<HeaderMap, ConfigError> {
		let pairs = [
			(APP_CLAIMS_HEADER, &self.app_claims),
			(USER_CLAIMS_HEADER, &self.user_claims),
			(TENANT_HEADER, &self.tenant),
			(SITE_HEADER, &self.site),
			(MASTER_CATALOG_HEADER, &self.master_catalog),
			(CATALOG_HEADER, &self.catalog),
		];
		let mut headers = HeaderMap::new();

		for (header, value) in pairs {
			let Some(value) = value.as_deref().filter(|value| !value.is_empty()) else {
				continue;
			};
			let value =
				HeaderValue::try_from(value).map_err(|_| ConfigError::InvalidHeader { header })?;

			headers.insert(HeaderName::from_static(header), value);
		}

		Ok(headers)
	}
}
impl Debug for HostedConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HostedConfig")
			.field("base_url", &self.base_url)
			.field("app_claims", &self.app_claims.as_ref().map(|_| "<redacted>"))
			.field("user_claims", &self.user_claims.as_ref().map(|_| "<redacted>"))
			.field("tenant", &self.tenant)
			.field("site", &self.site)
			.field("master_catalog", &self.master_catalog)
			.field("catalog", &self.catalog)
			.field("dataview_mode", &self.dataview_mode)
			.finish()
	}
}

/// Prepends `https://` to hosts given without a scheme.
pub fn add_protocol_to_host(host: &str) -> String {
	let host = host.trim();

	if host.contains("://") { host.to_owned() } else { format!("https://{host}") }
}

/// Returns the `scheme://host[:port]/` origin of an absolute URL.
pub fn host_from_url(url: &str) -> Option<String> {
	let parsed = Url::parse(url.trim()).ok()?;

	parsed.host_str()?;

	let mut origin = parsed.origin().ascii_serialization();

	origin.push('/');

	Some(origin)
}

/// Normalizes a host setting (scheme defaulting, whitespace trimming) and parses it.
pub(crate) fn parse_host(field: &'static str, host: &str) -> Result<Url, ConfigError> {
	if host.trim().is_empty() {
		return Err(ConfigError::MissingField { field });
	}

	let url = Url::parse(&add_protocol_to_host(host))
		.map_err(|source| ConfigError::InvalidHost { field, source })?;

	if url.cannot_be_a_base() || url.host_str().is_none() {
		return Err(ConfigError::InvalidHost { field, source: url::ParseError::EmptyHost });
	}

	Ok(url)
}

/// Appends `path` to the base URL's path, keeping any prefix the host was configured with.
pub(crate) fn endpoint(base: &Url, path: &str) -> Url {
	let mut url = base.clone();
	let joined = format!("{}/{}", base.path().trim_end_matches('/'), path.trim_start_matches('/'));

	url.set_path(&joined);
	url.set_query(None);

	url
}
