//! Application-level (client-credentials) ticket model.

// self
use crate::{
	_prelude::*,
	auth::{TicketError, TokenSecret},
};

/// Machine-to-machine credential issued by the platform's client-credentials endpoint.
///
/// Tickets are replaced whole; `expires_at` is derived once from the issue instant and never
/// recomputed. Field names follow the platform's snake_case wire format so cached tickets stay
/// readable by other clients sharing the same cache.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAuthTicket {
	/// Bearer token sent in the `Authorization` header.
	pub access_token: TokenSecret,
	/// Token type reported by the platform (usually `bearer`).
	#[serde(default)]
	pub token_type: String,
	/// Lifetime reported by the platform, in seconds.
	pub expires_in: i64,
	/// Absolute expiry in Unix epoch milliseconds.
	pub expires_at: i64,
	/// Refresh token, when the platform issued one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}
impl AppAuthTicket {
	/// Returns `true` once `instant` reaches the expiry (the boundary counts as expired).
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		epoch_millis(instant) >= self.expires_at
	}

	/// Convenience helper that checks expiry against the current UTC clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns the absolute expiry as a UTC timestamp.
	pub fn expires_at_datetime(&self) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.expires_at) * 1_000_000)
			.unwrap_or(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Debug for AppAuthTicket {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppAuthTicket")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("expires_at", &self.expires_at)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Raw body returned by the authenticate and refresh endpoints.
#[derive(Clone, Default, Deserialize)]
pub struct AppTicketResponse {
	/// Access token, if present.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Token type, if present.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Lifetime in seconds, if present.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Refresh token, if present.
	#[serde(default)]
	pub refresh_token: Option<String>,
}
impl AppTicketResponse {
	/// Validates the response and stamps `expires_at = issued_at + expires_in * 1000`.
	pub fn into_ticket(self, issued_at: OffsetDateTime) -> Result<AppAuthTicket, TicketError> {
		let access_token = self
			.access_token
			.filter(|token| !token.trim().is_empty())
			.ok_or(TicketError::MissingAccessToken)?;
		let expires_in =
			self.expires_in.filter(|secs| *secs > 0).ok_or(TicketError::InvalidLifetime)?;
		let expires_at = expires_in
			.checked_mul(1_000)
			.and_then(|ms| epoch_millis(issued_at).checked_add(ms))
			.ok_or(TicketError::InvalidLifetime)?;

		Ok(AppAuthTicket {
			access_token: TokenSecret::new(access_token),
			token_type: self.token_type.unwrap_or_default(),
			expires_in,
			expires_at,
			refresh_token: self.refresh_token.filter(|token| !token.is_empty()).map(TokenSecret::new),
		})
	}
}
impl Debug for AppTicketResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppTicketResponse")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Converts an instant into Unix epoch milliseconds.
pub fn epoch_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}
