//! Informational JWT claims view.
//!
//! Claims are decoded without signature verification and must never drive authorization
//! decisions; they exist so callers can inspect who a shopper ticket belongs to.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, auth::TicketError};

/// Decoded (unverified) payload of a JWT.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JwtClaims(Map<String, Value>);
impl JwtClaims {
	/// Decodes the payload segment of a compact JWT.
	pub fn decode(token: &str) -> Result<Self, TicketError> {
		let mut segments = token.split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
			_ =>
				return Err(TicketError::InvalidClaims {
					reason: "expected three dot-separated segments".into(),
				}),
		};
		// Some issuers pad their segments even though the compact form forbids it.
		let bytes = URL_SAFE_NO_PAD
			.decode(payload.trim_end_matches('='))
			.map_err(|e| TicketError::InvalidClaims { reason: e.to_string() })?;
		let claims: Map<String, Value> = serde_json::from_slice(&bytes)
			.map_err(|e| TicketError::InvalidClaims { reason: e.to_string() })?;

		Ok(Self(claims))
	}

	/// Returns the raw claim value.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	/// Returns a string claim.
	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(Value::as_str)
	}

	/// Returns the `sub` claim.
	pub fn subject(&self) -> Option<&str> {
		self.get_str("sub")
	}

	/// Returns the `exp` claim as a UTC timestamp.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		let secs = self.get("exp").and_then(Value::as_i64)?;

		OffsetDateTime::from_unix_timestamp(secs).ok()
	}

	/// Iterates over all claim names.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}
}
