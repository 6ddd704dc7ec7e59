//! Shopper (end-user) ticket model, wire normalization, and validation.

// crates.io
use time::{PrimitiveDateTime, format_description::well_known::Rfc3339, macros};
// self
use crate::{
	_prelude::*,
	auth::{JwtClaims, TicketError, TokenSecret},
};

/// How strictly a shopper ticket is checked before adoption.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketValidation {
	/// Requires an access token and a refresh token.
	#[default]
	Basic,
	/// Additionally requires a decodable JWT claims token.
	RequireClaims,
}

/// End-user credential, either anonymous (`user_id` is `None`) or password-authenticated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "UserTicketResponse")]
pub struct UserAuthTicket {
	/// Opaque token sent in the user-claims header.
	pub access_token: TokenSecret,
	/// Absolute instant at which the access token stops being valid.
	#[serde(serialize_with = "time::serde::rfc3339::serialize")]
	pub access_token_expiration: OffsetDateTime,
	/// Token used to renew the access token.
	pub refresh_token: TokenSecret,
	/// Absolute instant after which the refresh token can no longer be used.
	#[serde(serialize_with = "time::serde::rfc3339::serialize")]
	pub refresh_token_expiration: OffsetDateTime,
	/// Registered shopper identifier; `None` for anonymous shoppers.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	/// JWT form of the access token, when the platform includes one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub jwt_access_token: Option<TokenSecret>,
}
impl UserAuthTicket {
	/// Creates an anonymous ticket from its required parts.
	pub fn new(
		access_token: impl Into<String>,
		access_token_expiration: OffsetDateTime,
		refresh_token: impl Into<String>,
		refresh_token_expiration: OffsetDateTime,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			access_token_expiration,
			refresh_token: TokenSecret::new(refresh_token),
			refresh_token_expiration,
			user_id: None,
			jwt_access_token: None,
		}
	}

	/// Attaches a registered shopper identifier.
	pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());

		self
	}

	/// Attaches the JWT claims token.
	pub fn with_jwt_access_token(mut self, token: impl Into<String>) -> Self {
		self.jwt_access_token = Some(TokenSecret::new(token));

		self
	}

	/// Returns `true` once `instant` reaches the access-token expiration (the boundary counts
	/// as expired).
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.access_token_expiration
	}

	/// Convenience helper that checks expiry against the current UTC clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the refresh token is present and still usable at `instant`.
	pub fn can_refresh_at(&self, instant: OffsetDateTime) -> bool {
		!self.refresh_token.is_blank() && instant < self.refresh_token_expiration
	}

	/// Returns `true` for tickets not bound to a registered shopper.
	pub fn is_anonymous(&self) -> bool {
		self.user_id.is_none()
	}

	/// Decodes the (unverified) JWT claims, if the ticket carries a claims token.
	pub fn claims(&self) -> Option<Result<JwtClaims, TicketError>> {
		self.jwt_access_token.as_ref().map(|token| JwtClaims::decode(token.expose()))
	}

	/// Checks the invariants a ticket must satisfy before it replaces the current one.
	pub fn validate(&self, mode: TicketValidation) -> Result<(), TicketError> {
		if self.access_token.is_blank() {
			return Err(TicketError::MissingAccessToken);
		}
		if self.refresh_token.is_blank() {
			return Err(TicketError::MissingRefreshToken);
		}
		if mode == TicketValidation::RequireClaims {
			self.claims().ok_or(TicketError::MissingClaims)??;
		}

		Ok(())
	}
}
impl Debug for UserAuthTicket {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserAuthTicket")
			.field("access_token", &"<redacted>")
			.field("access_token_expiration", &self.access_token_expiration)
			.field("refresh_token", &"<redacted>")
			.field("refresh_token_expiration", &self.refresh_token_expiration)
			.field("user_id", &self.user_id)
			.field("jwt_access_token", &self.jwt_access_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}
impl TryFrom<UserTicketResponse> for UserAuthTicket {
	type Error = TicketError;

	fn try_from(raw: UserTicketResponse) -> Result<Self, Self::Error> {
		let access_token = raw
			.access_token
			.filter(|token| !token.trim().is_empty())
			.ok_or(TicketError::MissingAccessToken)?;
		let refresh_token = raw
			.refresh_token
			.filter(|token| !token.trim().is_empty())
			.ok_or(TicketError::MissingRefreshToken)?;
		let access_token_expiration =
			parse_timestamp("accessTokenExpiration", raw.access_token_expiration.as_deref())?;
		let refresh_token_expiration =
			parse_timestamp("refreshTokenExpiration", raw.refresh_token_expiration.as_deref())?;

		Ok(Self {
			access_token: TokenSecret::new(access_token),
			access_token_expiration,
			refresh_token: TokenSecret::new(refresh_token),
			refresh_token_expiration,
			user_id: raw.user_id.filter(|id| !id.is_empty()),
			jwt_access_token: raw.jwt_access_token.map(TokenSecret::new),
		})
	}
}

/// Raw shopper ticket body as returned by the commerce API.
///
/// Every field is optional so a partial response surfaces as a [`TicketError`] instead of a
/// generic parse failure; unrelated fields (customer profile and the like) are ignored.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTicketResponse {
	/// Access token, if present.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Access-token expiration as sent on the wire.
	#[serde(default)]
	pub access_token_expiration: Option<String>,
	/// Refresh token, if present.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Refresh-token expiration as sent on the wire.
	#[serde(default)]
	pub refresh_token_expiration: Option<String>,
	/// Registered shopper identifier.
	#[serde(default)]
	pub user_id: Option<String>,
	/// JWT form of the access token.
	#[serde(default)]
	pub jwt_access_token: Option<String>,
}
impl Debug for UserTicketResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserTicketResponse")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("access_token_expiration", &self.access_token_expiration)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token_expiration", &self.refresh_token_expiration)
			.field("user_id", &self.user_id)
			.finish()
	}
}

/// Password-grant credentials for a registered shopper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginParameters {
	/// Shopper login (usually an email address).
	pub username: String,
	/// Shopper password.
	pub password: TokenSecret,
}
impl LoginParameters {
	/// Builds login parameters from raw strings.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: TokenSecret::new(password) }
	}
}

/// Parses RFC 3339 timestamps, falling back to offset-less ISO-8601 interpreted as UTC.
fn parse_timestamp(field: &'static str, raw: Option<&str>) -> Result<OffsetDateTime, TicketError> {
	let raw = raw.map(str::trim).filter(|value| !value.is_empty());
	let Some(raw) = raw else {
		return Err(TicketError::MissingExpiration { field });
	};

	if let Ok(instant) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Ok(instant);
	}

	PrimitiveDateTime::parse(
		raw,
		macros::format_description!(
			"[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
		),
	)
	.map(PrimitiveDateTime::assume_utc)
	.map_err(|_| TicketError::InvalidTimestamp { field, value: raw.to_owned() })
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use time::macros::datetime;
	// self
	use super::*;

	fn wire(body: &str) -> Result<UserAuthTicket, TicketError> {
		let raw: UserTicketResponse =
			serde_json::from_str(body).expect("Fixture body should be valid JSON.");

		UserAuthTicket::try_from(raw)
	}

	#[test]
	fn normalizes_wire_body_and_drops_extra_fields() {
		let ticket = wire(
			r#"{
				"customer": {"name": "boo"},
				"accessToken": "a1",
				"accessTokenExpiration": "2025-01-01T01:00:00.000Z",
				"refreshToken": "r1",
				"refreshTokenExpiration": "2025-01-02T00:00:00",
				"userId": "1001"
			}"#,
		)
		.expect("Complete wire body should normalize.");

		assert_eq!(ticket.access_token.expose(), "a1");
		assert_eq!(ticket.access_token_expiration, datetime!(2025-01-01 01:00 UTC));
		assert_eq!(ticket.refresh_token_expiration, datetime!(2025-01-02 00:00 UTC));
		assert_eq!(ticket.user_id.as_deref(), Some("1001"));
		assert!(!ticket.is_anonymous());
	}

	#[test]
	fn wire_body_without_tokens_is_rejected() {
		assert_eq!(wire("{}"), Err(TicketError::MissingAccessToken));
		assert_eq!(
			wire(r#"{"accessToken":"a","accessTokenExpiration":"2025-01-01T00:00:00Z"}"#),
			Err(TicketError::MissingRefreshToken),
		);
		assert_eq!(
			wire(r#"{"accessToken":"a","refreshToken":"r","accessTokenExpiration":"soon"}"#),
			Err(TicketError::InvalidTimestamp {
				field: "accessTokenExpiration",
				value: "soon".into()
			}),
		);
	}

	#[test]
	fn expiry_boundary_counts_as_expired() {
		let expires = datetime!(2025-01-01 01:00 UTC);
		let ticket = UserAuthTicket::new("a", expires, "r", datetime!(2025-01-02 00:00 UTC));

		assert!(!ticket.is_expired_at(datetime!(2025-01-01 00:59:59 UTC)));
		assert!(ticket.is_expired_at(expires));
		assert!(ticket.is_expired_at(datetime!(2025-01-01 01:00:01 UTC)));
	}

	#[test]
	fn refresh_requires_live_refresh_token() {
		let ticket = UserAuthTicket::new(
			"a",
			datetime!(2025-01-01 01:00 UTC),
			"r",
			datetime!(2025-01-02 00:00 UTC),
		);

		assert!(ticket.can_refresh_at(datetime!(2025-01-01 12:00 UTC)));
		assert!(!ticket.can_refresh_at(datetime!(2025-01-02 00:00 UTC)));

		let blank = UserAuthTicket { refresh_token: TokenSecret::new(""), ..ticket };

		assert!(!blank.can_refresh_at(datetime!(2025-01-01 12:00 UTC)));
	}

	#[test]
	fn claims_validation_requires_decodable_token() {
		let base =
			UserAuthTicket::new("a", datetime!(2025-01-01 01:00 UTC), "r", datetime!(2025-01-02 00:00 UTC));

		assert_eq!(base.validate(TicketValidation::Basic), Ok(()));
		assert_eq!(base.validate(TicketValidation::RequireClaims), Err(TicketError::MissingClaims));

		let broken = base.clone().with_jwt_access_token("not-a-jwt");

		assert!(matches!(
			broken.validate(TicketValidation::RequireClaims),
			Err(TicketError::InvalidClaims { .. })
		));

		let jwt = format!("h.{}.s", URL_SAFE_NO_PAD.encode(r#"{"sub":"1001"}"#));
		let valid = base.with_jwt_access_token(jwt);

		assert_eq!(valid.validate(TicketValidation::RequireClaims), Ok(()));
	}

	#[test]
	fn serialized_ticket_reads_back() {
		let ticket = UserAuthTicket::new(
			"a",
			datetime!(2025-01-01 01:00 UTC),
			"r",
			datetime!(2025-01-02 00:00 UTC),
		)
		.with_user_id("1001");
		let json = serde_json::to_string(&ticket).expect("Ticket should serialize.");

		assert!(json.contains("\"accessTokenExpiration\":\"2025-01-01T01:00:00Z\""));

		let parsed: UserAuthTicket =
			serde_json::from_str(&json).expect("Serialized ticket should deserialize.");

		assert_eq!(parsed, ticket);
	}
}
