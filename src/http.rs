//! Transport primitives for authentication calls.
//!
//! The module exposes [`HttpFetcher`], the crate's only dependency on an HTTP stack. Managers
//! build [`HttpRequest`] values (the `http` crate types re-exported by `oauth2`), hand them to
//! the fetcher, and interpret the returned [`HttpResponse`] themselves, so any client able to
//! execute a request and report status + body can be plugged in.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
pub use oauth2::{HttpRequest, HttpResponse};
use oauth2::http::{
	HeaderValue, Method,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError, UpstreamError},
};

/// Boxed future returned by [`HttpFetcher::fetch`].
pub type FetchFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Header carrying the shopper's access token on commerce API calls.
pub const USER_CLAIMS_HEADER: &str = "x-vol-user-claims";
/// Header carrying pre-issued application claims in hosted deployments.
pub const APP_CLAIMS_HEADER: &str = "x-vol-app-claims";
/// Header selecting the tenant.
pub const TENANT_HEADER: &str = "x-vol-tenant";
/// Header selecting the site.
pub const SITE_HEADER: &str = "x-vol-site";
/// Header selecting the master catalog.
pub const MASTER_CATALOG_HEADER: &str = "x-vol-master-catalog";
/// Header selecting the catalog.
pub const CATALOG_HEADER: &str = "x-vol-catalog";

const BODY_PREVIEW_LIMIT: usize = 256;

/// Abstraction over HTTP transports capable of executing authentication calls.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// several managers behind an `Arc`, and the returned futures must be `Send` so manager futures
/// can hop executors. Non-success statuses are not errors at this layer; only failures to
/// obtain a response at all are reported through [`TransportError`](Self::TransportError).
pub trait HttpFetcher
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes `request` and resolves with the full response.
	fn fetch(&self, request: HttpRequest) -> FetchFuture<'_, Self::TransportError>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The default client honors the system proxy variables (`HTTP_PROXY`, `HTTPS_PROXY`);
/// [`with_proxy`](Self::with_proxy) pins an explicit proxy instead.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that routes every request through `proxy_url`.
	pub fn with_proxy(proxy_url: &str) -> Result<Self, ConfigError> {
		let proxy = reqwest::Proxy::all(proxy_url)?;
		let client = ReqwestClient::builder().proxy(proxy).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpFetcher for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn fetch(&self, request: HttpRequest) -> FetchFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Outbound authentication call under construction.
#[derive(Debug)]
pub(crate) struct AuthRequest<'a> {
	method: Method,
	url: &'a Url,
	bearer: Option<&'a str>,
	body: Option<Vec<u8>>,
}
impl<'a> AuthRequest<'a> {
	pub(crate) fn new(method: Method, url: &'a Url) -> Self {
		Self { method, url, bearer: None, body: None }
	}

	pub(crate) fn bearer(mut self, token: &'a str) -> Self {
		self.bearer = Some(token);

		self
	}

	pub(crate) fn json<B>(mut self, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body).map_err(ConfigError::RequestBody)?);

		Ok(self)
	}

	pub(crate) fn build(self) -> Result<HttpRequest, ConfigError> {
		let mut builder = oauth2::http::Request::builder()
			.method(self.method)
			.uri(self.url.as_str())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		if let Some(token) = self.bearer {
			builder = builder.header(AUTHORIZATION, bearer_header(token)?);
		}

		Ok(builder.body(self.body.unwrap_or_default())?)
	}
}

/// Formats `Bearer {token}` as a header value.
pub(crate) fn bearer_header(token: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::try_from(format!("Bearer {token}"))
		.map_err(|_| ConfigError::InvalidHeader { header: "authorization" })
}

/// Sends `request` through `http_client`, mapping transport failures into crate errors.
pub(crate) async fn send<C>(http_client: &C, request: HttpRequest) -> Result<HttpResponse>
where
	C: ?Sized + HttpFetcher,
{
	http_client.fetch(request).await.map_err(|e| TransportError::network(e).into())
}

/// Rejects non-success responses and parses the body as `T`.
pub(crate) fn parse_json<T>(endpoint: &'static str, response: &HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let status = response.status();
	let body = response.body();

	if !status.is_success() {
		return Err(UpstreamError::Status {
			endpoint,
			status: status.as_u16(),
			body_preview: body_preview(body),
		}
		.into());
	}

	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|source| {
		UpstreamError::ResponseParse { endpoint, source, status: Some(status.as_u16()) }.into()
	})
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
		Some((idx, _)) => format!("{}...", &trimmed[..idx]),
		None => trimmed.to_owned(),
	}
}
