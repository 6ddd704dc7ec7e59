//! Ticket models for the application and shopper credential layers.

pub mod app;
pub mod claims;
pub mod secret;
pub mod user;

pub use app::*;
pub use claims::*;
pub use secret::*;
pub use user::*;

// self
use crate::_prelude::*;

/// Reasons a ticket is rejected before it can be adopted as current state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TicketError {
	/// Issued when no access token value was provided.
	#[error("Ticket is missing an access token.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Ticket is missing a refresh token.")]
	MissingRefreshToken,
	/// Issued when an expiration field is absent.
	#[error("Ticket is missing `{field}`.")]
	MissingExpiration {
		/// Wire name of the missing field.
		field: &'static str,
	},
	/// Issued when an expiration field cannot be parsed as a timestamp.
	#[error("Ticket field `{field}` is not a valid timestamp: {value}.")]
	InvalidTimestamp {
		/// Wire name of the offending field.
		field: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// Issued when the response omits `expires_in` or reports a non-positive lifetime.
	#[error("Ticket lifetime must be a positive expires_in value.")]
	InvalidLifetime,
	/// Issued when claims validation is enabled and no JWT claims token is present.
	#[error("Ticket is missing its JWT claims token.")]
	MissingClaims,
	/// Issued when the JWT claims token cannot be decoded.
	#[error("Ticket JWT claims token is malformed: {reason}.")]
	InvalidClaims {
		/// Decoder-supplied reason string.
		reason: String,
	},
}
