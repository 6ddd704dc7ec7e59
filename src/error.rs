//! Crate-level error types shared across managers, transports, and caches.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Ticket cache failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Ticket rejected before it could be adopted.
	#[error(transparent)]
	InvalidTicket(#[from] crate::auth::TicketError),
	/// Authentication endpoint answered with an error status or an unreadable body.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Failure observed by every caller attached to the same in-flight ticket resolution.
	#[error(transparent)]
	Shared(Arc<Error>),
}
impl Error {
	/// Returns the underlying error, unwrapping any [`Error::Shared`] layers.
	pub fn root(&self) -> &Error {
		match self {
			Error::Shared(inner) => inner.root(),
			other => other,
		}
	}

	/// Returns the upstream HTTP status when the failure came from a non-success response.
	pub fn upstream_status(&self) -> Option<u16> {
		match self.root() {
			Error::Upstream(UpstreamError::Status { status, .. }) => Some(*status),
			Error::Upstream(UpstreamError::ResponseParse { status, .. }) => *status,
			_ => None,
		}
	}
}

/// Configuration and validation failures raised while constructing clients and requests.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required setting was not supplied or was empty.
	#[error("Missing required setting `{field}`.")]
	MissingField {
		/// Setting name.
		field: &'static str,
	},
	/// A host setting is not a valid URL.
	#[error("Setting `{field}` is not a valid URL.")]
	InvalidHost {
		/// Setting name.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A required environment variable is absent.
	#[error("Environment variable `{var}` is not set.")]
	MissingEnv {
		/// Variable name.
		var: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Request body could not be encoded.
	#[error("Request body could not be encoded.")]
	RequestBody(#[source] serde_json::Error),
	/// Hosted environment settings are not valid JSON of the expected shape.
	#[error("Hosted environment settings could not be parsed.")]
	HostedConfig(#[source] serde_json::Error),
	/// A header value contains characters HTTP does not allow.
	#[error("Header `{header}` contains an invalid value.")]
	InvalidHeader {
		/// Header name.
		header: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures reported by (or parsed from) the authentication endpoints.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Endpoint answered with a non-success status.
	#[error("The {endpoint} endpoint returned HTTP {status}: {body_preview}.")]
	Status {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
		/// Leading part of the response body.
		body_preview: String,
	},
	/// Endpoint responded with JSON that could not be parsed.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl UpstreamError {
	/// Returns `true` when the endpoint rejected the caller's credentials.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Status { status: 401 | 403, .. })
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling an authentication endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an authentication endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn root_unwraps_shared_layers() {
		let inner = Error::from(ConfigError::MissingField { field: "client_id" });
		let shared = Error::Shared(Arc::new(Error::Shared(Arc::new(inner))));

		assert!(matches!(shared.root(), Error::Config(ConfigError::MissingField { .. })));
		assert_eq!(shared.to_string(), "Missing required setting `client_id`.");
	}

	#[test]
	fn upstream_status_reads_through_shared_errors() {
		let upstream = UpstreamError::Status {
			endpoint: "anonymous_shopper",
			status: 401,
			body_preview: "denied".into(),
		};

		assert!(upstream.is_unauthorized());

		let err = Error::Shared(Arc::new(upstream.into()));

		assert_eq!(err.upstream_status(), Some(401));

		let transport = Error::from(TransportError::Io(std::io::ErrorKind::Other.into()));

		assert_eq!(transport.upstream_status(), None);
	}
}
