//! Shopper ticket lifecycle with single-flight resolution and change hooks.
//!
//! The manager holds at most one [`UserAuthTicket`]. When a caller needs a token and the held
//! ticket is missing or expired, a resolution plan is chosen under the state lock:
//!
//! - no ticket: acquire an anonymous ticket;
//! - expired ticket whose refresh token is still usable: refresh it;
//! - expired ticket whose refresh token is spent: acquire a fresh anonymous ticket.
//!
//! The plan is published in a pending slot. Every caller arriving while the slot is occupied
//! attaches to it and observes the identical token or the identical failure
//! ([`Error::Shared`]). The slot is cleared once the resolution settles, on success and on
//! failure alike, and the lock is never held across an `.await`.

mod metrics;

pub use metrics::FlightMetrics;

// std
use std::mem;
// crates.io
use parking_lot::ReentrantMutex;
// self
use crate::{
	_prelude::*,
	auth::{LoginParameters, TicketValidation, UserAuthTicket},
	error::ConfigError,
	flows::{AccessTokenProvider, TokenFuture, UserAuthFetcher},
	obs,
};

/// Observer of shopper ticket transitions, typically backed by a cookie or session store.
///
/// Hooks run synchronously on the caller's task and never while the ticket state is locked.
/// Calls are delivered one at a time and in the order tickets were installed, so the last
/// `on_ticket_change` always carries the ticket the manager holds.
pub trait AuthHooks
where
	Self: Send + Sync,
{
	/// Supplies a previously persisted ticket once, at construction.
	fn on_ticket_read(&self) -> Option<UserAuthTicket> {
		None
	}

	/// Called when a ticket with a different access token replaces the held one.
	fn on_ticket_change(&self, ticket: &UserAuthTicket) {
		let _ = ticket;
	}

	/// Called when the held ticket is cleared.
	fn on_ticket_remove(&self) {}
}

/// Maintains exactly one valid shopper credential.
pub struct ShopperAuthManager {
	fetcher: Arc<dyn UserAuthFetcher>,
	hooks: Option<Arc<dyn AuthHooks>>,
	validation: TicketValidation,
	expiry_leeway: Duration,
	state: Mutex<ShopperState>,
	// Taken before `state` and held through the hook call.
	hook_delivery: ReentrantMutex<()>,
	metrics: FlightMetrics,
}
impl ShopperAuthManager {
	/// Starts a builder; the user-auth fetcher is required.
	pub fn builder() -> ShopperAuthManagerBuilder {
		ShopperAuthManagerBuilder::default()
	}

	/// Returns a currently valid shopper access token, resolving one if necessary.
	pub async fn get_access_token(&self) -> Result<String> {
		let flight = {
			let mut guard = self.state.lock();
			let state = &mut *guard;
			let now = OffsetDateTime::now_utc();

			if let Some(ticket) = state.ticket.as_ref().filter(|t| !self.is_stale(t, now)) {
				return Ok(ticket.access_token.expose().to_owned());
			}

			match &state.pending {
				Some(pending) => {
					self.metrics.record_joined();

					pending.clone()
				},
				None => {
					let plan = match &state.ticket {
						Some(ticket) if ticket.can_refresh_at(now) =>
							Resolution::Refresh(ticket.clone()),
						Some(ticket) => Resolution::Reacquire { user_id: ticket.user_id.clone() },
						None => Resolution::Anonymous,
					};
					let pending = Arc::new(PendingResolution::new(plan));

					self.metrics.record_started();
					state.pending = Some(pending.clone());

					pending
				},
			}
		};

		flight.outcome.get_or_init(|| self.resolve(&flight)).await.clone().map_err(Error::Shared)
	}

	/// Validates and installs `ticket` (or clears it with `None`), then notifies hooks.
	///
	/// At most one hook fires: `on_ticket_remove` when a held ticket is cleared,
	/// `on_ticket_change` when the access token differs from the held one. Re-installing the
	/// same access token is silent. A ticket failing validation is rejected and the held ticket
	/// stays in place.
	pub fn set_ticket(&self, ticket: Option<UserAuthTicket>) -> Result<()> {
		if let Some(ticket) = &ticket {
			ticket.validate(self.validation)?;
		}

		self.replace_ticket(ticket);

		Ok(())
	}

	/// Logs a registered shopper in and installs the resulting ticket.
	pub async fn login_customer_and_set_auth_ticket(
		&self,
		params: &LoginParameters,
	) -> Result<UserAuthTicket> {
		let ticket = self.fetcher.customer_password_auth(params).await?;

		self.set_ticket(Some(ticket.clone()))?;

		Ok(ticket)
	}

	/// Drops the held ticket; the next access starts over with an anonymous ticket.
	pub fn invalidate(&self) {
		self.replace_ticket(None);
	}

	/// Returns a snapshot of the held ticket.
	pub fn current_ticket(&self) -> Option<UserAuthTicket> {
		self.state.lock().ticket.clone()
	}

	/// Returns `true` while a resolution is in flight.
	pub fn is_resolving(&self) -> bool {
		self.state.lock().pending.is_some()
	}

	/// Returns the resolution counters.
	pub fn metrics(&self) -> &FlightMetrics {
		&self.metrics
	}

	async fn resolve(&self, flight: &Arc<PendingResolution>) -> Result<String, Arc<Error>> {
		let fetched = match &flight.plan {
			Resolution::Anonymous => self.fetcher.anonymous_auth().await,
			Resolution::Refresh(ticket) => self.fetcher.refresh_user_auth(ticket).await,
			Resolution::Reacquire { user_id } => {
				obs::warn_anonymous_fallback(user_id.as_deref());

				self.fetcher.anonymous_auth().await
			},
		};
		let adopted = fetched.and_then(|ticket| {
			let token = ticket.access_token.expose().to_owned();

			self.set_ticket(Some(ticket)).map(|()| token)
		});

		{
			let mut state = self.state.lock();

			if state.pending.as_ref().is_some_and(|pending| Arc::ptr_eq(pending, flight)) {
				state.pending = None;
			}
		}

		match &adopted {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		adopted.map_err(Arc::new)
	}

	fn replace_ticket(&self, ticket: Option<UserAuthTicket>) {
		let _delivery = self.hook_delivery.lock();
		let transition = {
			let mut state = self.state.lock();
			let previous = mem::replace(&mut state.ticket, ticket);

			match (previous, &state.ticket) {
				(Some(_), None) => Transition::Removed,
				(Some(old), Some(new)) if old.access_token == new.access_token =>
					Transition::Unchanged,
				(_, Some(new)) => Transition::Changed(new.clone()),
				(None, None) => Transition::Unchanged,
			}
		};
		let Some(hooks) = &self.hooks else {
			return;
		};

		match transition {
			Transition::Changed(ticket) => hooks.on_ticket_change(&ticket),
			Transition::Removed => hooks.on_ticket_remove(),
			Transition::Unchanged => (),
		}
	}

	fn is_stale(&self, ticket: &UserAuthTicket, now: OffsetDateTime) -> bool {
		ticket.is_expired_at(now + self.expiry_leeway)
	}
}
impl AccessTokenProvider for ShopperAuthManager {
	fn access_token(&self) -> TokenFuture<'_> {
		Box::pin(self.get_access_token())
	}
}
impl Debug for ShopperAuthManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("ShopperAuthManager")
			.field("ticket", &state.ticket)
			.field("resolving", &state.pending.is_some())
			.field("hooks_set", &self.hooks.is_some())
			.field("validation", &self.validation)
			.field("expiry_leeway", &self.expiry_leeway)
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// Fail-fast builder for [`ShopperAuthManager`].
#[derive(Default)]
pub struct ShopperAuthManagerBuilder {
	fetcher: Option<Arc<dyn UserAuthFetcher>>,
	hooks: Option<Arc<dyn AuthHooks>>,
	validation: TicketValidation,
	expiry_leeway: Duration,
}
impl ShopperAuthManagerBuilder {
	/// Sets the collaborator performing the shopper ticket calls.
	pub fn user_auth_fetcher(mut self, fetcher: Arc<dyn UserAuthFetcher>) -> Self {
		self.fetcher = Some(fetcher);

		self
	}

	/// Attaches ticket hooks; `on_ticket_read` is consulted once during [`build`](Self::build).
	pub fn hooks(mut self, hooks: Arc<dyn AuthHooks>) -> Self {
		self.hooks = Some(hooks);

		self
	}

	/// Selects how strictly incoming tickets are checked.
	pub fn validation(mut self, validation: TicketValidation) -> Self {
		self.validation = validation;

		self
	}

	/// Treats tickets as expired `leeway` before their recorded expiry. Negative values are
	/// clamped to zero.
	pub fn expiry_leeway(mut self, leeway: Duration) -> Self {
		self.expiry_leeway = leeway.max(Duration::ZERO);

		self
	}

	/// Validates the settings, seeds the ticket from the hooks, and builds the manager.
	///
	/// A seeded ticket failing validation is discarded without notifying the hooks.
	pub fn build(self) -> Result<ShopperAuthManager, ConfigError> {
		let fetcher = self.fetcher.ok_or(ConfigError::MissingField { field: "user_auth_fetcher" })?;
		let ticket = self
			.hooks
			.as_ref()
			.and_then(|hooks| hooks.on_ticket_read())
			.filter(|ticket| ticket.validate(self.validation).is_ok());

		Ok(ShopperAuthManager {
			fetcher,
			hooks: self.hooks,
			validation: self.validation,
			expiry_leeway: self.expiry_leeway,
			state: Mutex::new(ShopperState { ticket, pending: None }),
			hook_delivery: ReentrantMutex::new(()),
			metrics: FlightMetrics::default(),
		})
	}
}
impl Debug for ShopperAuthManagerBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ShopperAuthManagerBuilder")
			.field("fetcher_set", &self.fetcher.is_some())
			.field("hooks_set", &self.hooks.is_some())
			.field("validation", &self.validation)
			.field("expiry_leeway", &self.expiry_leeway)
			.finish()
	}
}

struct ShopperState {
	ticket: Option<UserAuthTicket>,
	pending: Option<Arc<PendingResolution>>,
}

struct PendingResolution {
	plan: Resolution,
	outcome: AsyncOnceCell<Result<String, Arc<Error>>>,
}
impl PendingResolution {
	fn new(plan: Resolution) -> Self {
		Self { plan, outcome: AsyncOnceCell::new() }
	}
}

enum Resolution {
	Anonymous,
	Refresh(UserAuthTicket),
	Reacquire { user_id: Option<String> },
}

enum Transition {
	Changed(UserAuthTicket),
	Removed,
	Unchanged,
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::VecDeque;
	// self
	use super::*;
	use crate::{auth::TokenSecret, flows::TicketFuture};

	#[derive(Default)]
	struct QueueFetcher {
		anonymous: Mutex<VecDeque<UserAuthTicket>>,
		refreshed: Mutex<VecDeque<UserAuthTicket>>,
		calls: Mutex<Vec<&'static str>>,
	}
	impl UserAuthFetcher for QueueFetcher {
		fn anonymous_auth(&self) -> TicketFuture<'_> {
			self.calls.lock().push("anonymous");

			let next = self.anonymous.lock().pop_front();

			Box::pin(async move {
				next.ok_or_else(|| Error::from(ConfigError::MissingField { field: "script" }))
			})
		}

		fn customer_password_auth<'a>(&'a self, params: &'a LoginParameters) -> TicketFuture<'a> {
			self.calls.lock().push("password");

			let ticket = ticket(&format!("user-{}", params.username), Duration::hours(1))
				.with_user_id(params.username.clone());

			Box::pin(async move { Ok(ticket) })
		}

		fn refresh_user_auth<'a>(&'a self, _: &'a UserAuthTicket) -> TicketFuture<'a> {
			self.calls.lock().push("refresh");

			let next = self.refreshed.lock().pop_front();

			Box::pin(async move {
				next.ok_or_else(|| Error::from(ConfigError::MissingField { field: "script" }))
			})
		}
	}

	#[derive(Default)]
	struct RecordingHooks {
		seed: Option<UserAuthTicket>,
		events: Mutex<Vec<String>>,
	}
	impl AuthHooks for RecordingHooks {
		fn on_ticket_read(&self) -> Option<UserAuthTicket> {
			self.seed.clone()
		}

		fn on_ticket_change(&self, ticket: &UserAuthTicket) {
			self.events.lock().push(format!("change:{}", ticket.access_token.expose()));
		}

		fn on_ticket_remove(&self) {
			self.events.lock().push("remove".into());
		}
	}

	fn ticket(token: &str, ttl: Duration) -> UserAuthTicket {
		let now = OffsetDateTime::now_utc();

		UserAuthTicket::new(token, now + ttl, format!("{token}-r"), now + Duration::days(1))
	}

	fn manager(fetcher: Arc<QueueFetcher>, hooks: Arc<RecordingHooks>) -> ShopperAuthManager {
		ShopperAuthManager::builder()
			.user_auth_fetcher(fetcher)
			.hooks(hooks)
			.build()
			.expect("Manager fixture should build.")
	}

	#[test]
	fn hooks_fire_once_per_distinct_token() {
		let hooks = Arc::new(RecordingHooks::default());
		let manager = manager(Arc::default(), hooks.clone());
		let first = ticket("a1", Duration::hours(1));

		manager.set_ticket(Some(first.clone())).expect("Valid ticket should install.");
		manager.set_ticket(Some(first.clone())).expect("Valid ticket should install.");
		manager.set_ticket(None).expect("Clearing should succeed.");
		manager.set_ticket(None).expect("Clearing should succeed.");
		manager
			.set_ticket(Some(ticket("a2", Duration::hours(1))))
			.expect("Valid ticket should install.");

		assert_eq!(*hooks.events.lock(), vec!["change:a1", "remove", "change:a2"]);
	}

	#[test]
	fn invalid_ticket_is_not_adopted() {
		let hooks = Arc::new(RecordingHooks::default());
		let manager = manager(Arc::default(), hooks.clone());
		let held = ticket("held", Duration::hours(1));

		manager.set_ticket(Some(held.clone())).expect("Valid ticket should install.");

		let broken =
			UserAuthTicket { refresh_token: TokenSecret::new(""), ..ticket("b", Duration::hours(1)) };
		let err = manager.set_ticket(Some(broken)).expect_err("Blank refresh token should fail.");

		assert!(matches!(err, Error::InvalidTicket(_)));
		assert_eq!(manager.current_ticket(), Some(held));
		assert_eq!(hooks.events.lock().len(), 1);
	}

	#[test]
	fn builder_requires_fetcher_and_seeds_from_hooks() {
		let err = ShopperAuthManager::builder().build().expect_err("Missing fetcher should fail.");

		assert!(matches!(err, ConfigError::MissingField { field: "user_auth_fetcher" }));

		let seeded = ticket("seed", Duration::hours(1));
		let hooks = Arc::new(RecordingHooks { seed: Some(seeded.clone()), ..Default::default() });
		let manager = manager(Arc::default(), hooks.clone());

		assert_eq!(manager.current_ticket(), Some(seeded));
		assert!(hooks.events.lock().is_empty());

		let claims_required = ShopperAuthManager::builder()
			.user_auth_fetcher(Arc::new(QueueFetcher::default()))
			.hooks(hooks)
			.validation(TicketValidation::RequireClaims)
			.build()
			.expect("Manager should build.");

		assert_eq!(claims_required.current_ticket(), None);
	}

	#[tokio::test]
	async fn valid_ticket_is_served_without_fetching() {
		let fetcher = Arc::new(QueueFetcher::default());
		let manager = manager(fetcher.clone(), Arc::default());

		manager.set_ticket(Some(ticket("live", Duration::hours(1)))).expect("Install should succeed.");

		assert_eq!(manager.get_access_token().await.expect("Held token should be served."), "live");
		assert!(fetcher.calls.lock().is_empty());
	}

	#[tokio::test]
	async fn expired_ticket_refreshes_when_refresh_token_is_live() {
		let fetcher = Arc::new(QueueFetcher::default());

		fetcher.refreshed.lock().push_back(ticket("refreshed", Duration::hours(1)));

		let hooks = Arc::new(RecordingHooks::default());
		let manager = manager(fetcher.clone(), hooks.clone());

		manager
			.set_ticket(Some(ticket("stale", -Duration::minutes(1))))
			.expect("Install should succeed.");

		assert_eq!(manager.get_access_token().await.expect("Refresh should succeed."), "refreshed");
		assert_eq!(*fetcher.calls.lock(), vec!["refresh"]);
		assert_eq!(*hooks.events.lock(), vec!["change:stale", "change:refreshed"]);
		assert!(!manager.is_resolving());
	}

	#[tokio::test]
	async fn spent_refresh_token_falls_back_to_anonymous() {
		let fetcher = Arc::new(QueueFetcher::default());

		fetcher.anonymous.lock().push_back(ticket("anon", Duration::hours(1)));

		let manager = manager(fetcher.clone(), Arc::default());
		let now = OffsetDateTime::now_utc();
		let spent =
			UserAuthTicket::new("old", now - Duration::hours(2), "r", now - Duration::hours(1))
				.with_user_id("1001");

		manager.set_ticket(Some(spent)).expect("Install should succeed.");

		assert_eq!(manager.get_access_token().await.expect("Fallback should succeed."), "anon");
		assert_eq!(*fetcher.calls.lock(), vec!["anonymous"]);
		assert!(manager.current_ticket().is_some_and(|t| t.is_anonymous()));
	}

	#[tokio::test]
	async fn failed_resolution_clears_slot_and_keeps_ticket() {
		let fetcher = Arc::new(QueueFetcher::default());
		let manager = manager(fetcher.clone(), Arc::default());
		let err = manager.get_access_token().await.expect_err("Empty script should fail.");

		assert!(matches!(err.root(), Error::Config(_)));
		assert!(!manager.is_resolving());
		assert_eq!(manager.metrics().failures(), 1);

		fetcher.anonymous.lock().push_back(ticket("second", Duration::hours(1)));

		assert_eq!(manager.get_access_token().await.expect("Retry should succeed."), "second");
		assert_eq!(manager.metrics().started(), 2);
		assert_eq!(manager.metrics().successes(), 1);
	}

	#[tokio::test]
	async fn login_installs_ticket_and_invalidate_removes_it() {
		let hooks = Arc::new(RecordingHooks::default());
		let manager = manager(Arc::default(), hooks.clone());
		let ticket = manager
			.login_customer_and_set_auth_ticket(&LoginParameters::new("boo", "pw"))
			.await
			.expect("Login should succeed.");

		assert_eq!(ticket.user_id.as_deref(), Some("boo"));
		assert_eq!(manager.current_ticket(), Some(ticket));

		manager.invalidate();

		assert_eq!(manager.current_ticket(), None);
		assert_eq!(*hooks.events.lock(), vec!["change:user-boo", "remove"]);
	}
}
