//! HTTP implementation of the shopper ticket calls.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{LoginParameters, UserAuthTicket, UserTicketResponse},
	config,
	error::ConfigError,
	flows::{AccessTokenProvider, TicketFuture, UserAuthFetcher},
	http::{self, AuthRequest, HttpFetcher},
	obs::{self, FlowKind},
};
#[cfg(feature = "reqwest")] use crate::{config::ApiConfig, http::ReqwestHttpClient};

const ANONYMOUS_PATH: &str = "/api/commerce/customer/authtickets/anonymousshopper";
const PASSWORD_PATH: &str = "/api/commerce/customer/authtickets";
const REFRESH_PATH: &str = "/api/commerce/customer/authtickets/refresh/";

/// Shopper client specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestShopperAuthClient = ShopperAuthClient<ReqwestHttpClient>;

/// Calls the commerce API's shopper ticket endpoints, authenticating every call with the
/// application token.
pub struct ShopperAuthClient<C>
where
	C: ?Sized + HttpFetcher,
{
	api_host: Url,
	http_client: Arc<C>,
	app_auth: Arc<dyn AccessTokenProvider>,
}
impl<C> ShopperAuthClient<C>
where
	C: ?Sized + HttpFetcher,
{
	/// Starts a builder; `api_host`, `http_client`, and `app_auth` are required.
	pub fn builder() -> ShopperAuthClientBuilder<C> {
		ShopperAuthClientBuilder { api_host: None, http_client: None, app_auth: None }
	}

	/// Returns the normalized commerce API host.
	pub fn api_host(&self) -> &Url {
		&self.api_host
	}

	/// `GET /api/commerce/customer/authtickets/anonymousshopper`.
	pub async fn anonymous_auth(&self) -> Result<UserAuthTicket> {
		obs::observe(FlowKind::ShopperAnonymous, "anonymous_auth", async {
			let url = config::endpoint(&self.api_host, ANONYMOUS_PATH);

			self.call("shopper_anonymous", Method::GET, &url, None::<&()>).await
		})
		.await
	}

	/// `POST /api/commerce/customer/authtickets` with `{username, password}`.
	pub async fn customer_password_auth(&self, params: &LoginParameters) -> Result<UserAuthTicket> {
		obs::observe(FlowKind::ShopperPassword, "customer_password_auth", async {
			let url = config::endpoint(&self.api_host, PASSWORD_PATH);
			let body = PasswordBody { username: &params.username, password: params.password.expose() };

			self.call("shopper_password", Method::POST, &url, Some(&body)).await
		})
		.await
	}

	/// `PUT /api/commerce/customer/authtickets/refresh/?refreshToken=...`.
	pub async fn refresh_user_auth(&self, ticket: &UserAuthTicket) -> Result<UserAuthTicket> {
		obs::observe(FlowKind::ShopperRefresh, "refresh_user_auth", async {
			let mut url = config::endpoint(&self.api_host, REFRESH_PATH);

			url.query_pairs_mut().append_pair("refreshToken", ticket.refresh_token.expose());

			self.call("shopper_refresh", Method::PUT, &url, None::<&()>).await
		})
		.await
	}

	async fn call<B>(
		&self,
		endpoint: &'static str,
		method: Method,
		url: &Url,
		body: Option<&B>,
	) -> Result<UserAuthTicket>
	where
		B: ?Sized + Serialize + Sync,
	{
		let app_token = self.app_auth.access_token().await?;
		let mut request = AuthRequest::new(method, url).bearer(&app_token);

		if let Some(body) = body {
			request = request.json(body)?;
		}

		let response = http::send(self.http_client.as_ref(), request.build()?).await?;
		let raw = http::parse_json::<UserTicketResponse>(endpoint, &response)?;

		Ok(UserAuthTicket::try_from(raw)?)
	}
}
#[cfg(feature = "reqwest")]
impl ShopperAuthClient<ReqwestHttpClient> {
	/// Builds a client for `api_host` that shares `app_auth` and uses a default reqwest
	/// transport.
	pub fn from_config(
		config: &ApiConfig,
		app_auth: Arc<dyn AccessTokenProvider>,
	) -> Result<Self, ConfigError> {
		Self::builder()
			.api_host(config.api_host_url()?.as_str())
			.http_client(Arc::new(ReqwestHttpClient::default()))
			.app_auth(app_auth)
			.build()
	}
}
impl<C> UserAuthFetcher for ShopperAuthClient<C>
where
	C: ?Sized + HttpFetcher,
{
	fn anonymous_auth(&self) -> TicketFuture<'_> {
		Box::pin(ShopperAuthClient::anonymous_auth(self))
	}

	fn customer_password_auth<'a>(&'a self, params: &'a LoginParameters) -> TicketFuture<'a> {
		Box::pin(ShopperAuthClient::customer_password_auth(self, params))
	}

	fn refresh_user_auth<'a>(&'a self, ticket: &'a UserAuthTicket) -> TicketFuture<'a> {
		Box::pin(ShopperAuthClient::refresh_user_auth(self, ticket))
	}
}
impl<C> Debug for ShopperAuthClient<C>
where
	C: ?Sized + HttpFetcher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ShopperAuthClient").field("api_host", &self.api_host.as_str()).finish()
	}
}

/// Fail-fast builder for [`ShopperAuthClient`].
pub struct ShopperAuthClientBuilder<C>
where
	C: ?Sized + HttpFetcher,
{
	api_host: Option<String>,
	http_client: Option<Arc<C>>,
	app_auth: Option<Arc<dyn AccessTokenProvider>>,
}
impl<C> ShopperAuthClientBuilder<C>
where
	C: ?Sized + HttpFetcher,
{
	/// Sets the commerce API host; `https://` is assumed when no scheme is given.
	pub fn api_host(mut self, api_host: impl Into<String>) -> Self {
		self.api_host = Some(api_host.into());

		self
	}

	/// Sets the transport used for every shopper call.
	pub fn http_client(mut self, http_client: Arc<C>) -> Self {
		self.http_client = Some(http_client);

		self
	}

	/// Sets the provider of the application bearer token.
	pub fn app_auth(mut self, app_auth: Arc<dyn AccessTokenProvider>) -> Self {
		self.app_auth = Some(app_auth);

		self
	}

	/// Validates the settings and builds the client.
	pub fn build(self) -> Result<ShopperAuthClient<C>, ConfigError> {
		let api_host = config::parse_host("api_host", self.api_host.as_deref().unwrap_or(""))?;
		let http_client =
			self.http_client.ok_or(ConfigError::MissingField { field: "http_client" })?;
		let app_auth = self.app_auth.ok_or(ConfigError::MissingField { field: "app_auth" })?;

		Ok(ShopperAuthClient { api_host, http_client, app_auth })
	}
}
impl<C> Debug for ShopperAuthClientBuilder<C>
where
	C: ?Sized + HttpFetcher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ShopperAuthClientBuilder")
			.field("api_host", &self.api_host)
			.field("http_client_set", &self.http_client.is_some())
			.field("app_auth_set", &self.app_auth.is_some())
			.finish()
	}
}

#[derive(Serialize)]
struct PasswordBody<'a> {
	username: &'a str,
	password: &'a str,
}
