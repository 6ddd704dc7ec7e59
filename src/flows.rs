//! Credential managers and the collaborator contracts they are wired through.
//!
//! [`ApplicationAuthManager`] keeps the application (client-credentials) ticket fresh,
//! [`ShopperAuthClient`] performs the raw shopper ticket calls, and [`ShopperAuthManager`]
//! owns the shopper ticket lifecycle on top of any [`UserAuthFetcher`].

pub mod application;
pub mod shopper;
pub mod shopper_client;

pub use application::*;
pub use shopper::*;
pub use shopper_client::*;

// self
use crate::{
	_prelude::*,
	auth::{LoginParameters, UserAuthTicket},
};

/// Boxed future resolving to a bearer token.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a + Send>>;
/// Boxed future resolving to a shopper ticket.
pub type TicketFuture<'a> = Pin<Box<dyn Future<Output = Result<UserAuthTicket>> + 'a + Send>>;

/// Source of a currently valid access token.
pub trait AccessTokenProvider
where
	Self: Send + Sync,
{
	/// Resolves a token that is valid at the time of the call.
	fn access_token(&self) -> TokenFuture<'_>;
}

/// Performs the three shopper ticket calls.
///
/// [`ShopperAuthClient`] is the HTTP implementation; tests and alternative transports can
/// supply their own.
pub trait UserAuthFetcher
where
	Self: Send + Sync,
{
	/// Acquires a ticket for an anonymous shopper.
	fn anonymous_auth(&self) -> TicketFuture<'_>;

	/// Logs a registered shopper in with username and password.
	fn customer_password_auth<'a>(&'a self, params: &'a LoginParameters) -> TicketFuture<'a>;

	/// Exchanges the ticket's refresh token for a new ticket.
	fn refresh_user_auth<'a>(&'a self, ticket: &'a UserAuthTicket) -> TicketFuture<'a>;
}
