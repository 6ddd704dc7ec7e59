// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use storefront_auth::{
	_preludet::*,
	auth::{LoginParameters, UserAuthTicket},
	error::UpstreamError,
	flows::{AuthHooks, ShopperAuthManager, TicketFuture, UserAuthFetcher},
};

const CALLERS: usize = 5;

/// Fetcher whose anonymous call blocks until the test releases `gate`.
#[derive(Default)]
struct GatedFetcher {
	gate: AsyncMutex<()>,
	anonymous_calls: AtomicUsize,
	fail: bool,
}
impl UserAuthFetcher for GatedFetcher {
	fn anonymous_auth(&self) -> TicketFuture<'_> {
		Box::pin(async move {
			let call = self.anonymous_calls.fetch_add(1, Ordering::SeqCst) + 1;
			let _open = self.gate.lock().await;

			if self.fail {
				return Err(Error::from(UpstreamError::Status {
					endpoint: "shopper_anonymous",
					status: 503,
					body_preview: "maintenance".into(),
				}));
			}

			Ok(user_ticket(&format!("anon-{call}"), Duration::hours(1), Duration::days(1)))
		})
	}

	fn customer_password_auth<'a>(&'a self, _: &'a LoginParameters) -> TicketFuture<'a> {
		panic!("Password auth is not scripted.")
	}

	fn refresh_user_auth<'a>(&'a self, _: &'a UserAuthTicket) -> TicketFuture<'a> {
		panic!("Refresh is not scripted.")
	}
}

#[derive(Default)]
struct CountingHooks {
	changes: AtomicUsize,
	removals: AtomicUsize,
}
impl AuthHooks for CountingHooks {
	fn on_ticket_change(&self, _: &UserAuthTicket) {
		self.changes.fetch_add(1, Ordering::SeqCst);
	}

	fn on_ticket_remove(&self) {
		self.removals.fetch_add(1, Ordering::SeqCst);
	}
}

/// Persists tickets like a cookie store whose write for `slow_token` stalls.
struct StallingStore {
	slow_token: &'static str,
	persisted: Mutex<Option<String>>,
}
impl AuthHooks for StallingStore {
	fn on_ticket_change(&self, ticket: &UserAuthTicket) {
		if ticket.access_token.expose() == self.slow_token {
			std::thread::sleep(std::time::Duration::from_millis(200));
		}

		*self.persisted.lock() = Some(ticket.access_token.expose().to_owned());
	}
}

fn build_manager(
	fetcher: Arc<GatedFetcher>,
	hooks: Arc<CountingHooks>,
) -> Arc<ShopperAuthManager> {
	let manager = ShopperAuthManager::builder()
		.user_auth_fetcher(fetcher)
		.hooks(hooks)
		.build()
		.expect("Shopper manager should build.");

	Arc::new(manager)
}

async fn wait_for_joiners(manager: &ShopperAuthManager, joiners: u64) {
	while manager.metrics().joined() < joiners {
		tokio::task::yield_now().await;
	}
}

#[tokio::test]
async fn concurrent_callers_share_one_anonymous_call() {
	let fetcher = Arc::new(GatedFetcher::default());
	let hooks = Arc::new(CountingHooks::default());
	let manager = build_manager(fetcher.clone(), hooks.clone());
	let gate = fetcher.gate.lock().await;
	let handles = (0..CALLERS)
		.map(|_| {
			let manager = manager.clone();

			tokio::spawn(async move { manager.get_access_token().await })
		})
		.collect::<Vec<_>>();

	wait_for_joiners(&manager, (CALLERS - 1) as u64).await;

	assert!(manager.is_resolving());

	drop(gate);

	for handle in handles {
		let token = handle.await.expect("Caller task should not panic.");

		assert_eq!(token.expect("Every caller should observe the token."), "anon-1");
	}

	assert_eq!(fetcher.anonymous_calls.load(Ordering::SeqCst), 1);
	assert_eq!(hooks.changes.load(Ordering::SeqCst), 1);
	assert_eq!(hooks.removals.load(Ordering::SeqCst), 0);
	assert_eq!(manager.metrics().started(), 1);
	assert_eq!(manager.metrics().successes(), 1);
	assert!(!manager.is_resolving());
}

#[tokio::test]
async fn concurrent_callers_observe_the_same_failure() {
	let fetcher = Arc::new(GatedFetcher { fail: true, ..Default::default() });
	let hooks = Arc::new(CountingHooks::default());
	let manager = build_manager(fetcher.clone(), hooks.clone());
	let gate = fetcher.gate.lock().await;
	let handles = (0..CALLERS)
		.map(|_| {
			let manager = manager.clone();

			tokio::spawn(async move { manager.get_access_token().await })
		})
		.collect::<Vec<_>>();

	wait_for_joiners(&manager, (CALLERS - 1) as u64).await;
	drop(gate);

	let mut shared = Vec::new();

	for handle in handles {
		match handle.await.expect("Caller task should not panic.") {
			Err(Error::Shared(inner)) => shared.push(inner),
			other => panic!("Expected a shared failure, got {other:?}."),
		}
	}

	assert!(shared.iter().all(|inner| Arc::ptr_eq(inner, &shared[0])));
	assert_eq!(shared[0].upstream_status(), Some(503));
	assert_eq!(fetcher.anonymous_calls.load(Ordering::SeqCst), 1);
	assert_eq!(hooks.changes.load(Ordering::SeqCst), 0);
	assert_eq!(manager.metrics().failures(), 1);
	assert!(!manager.is_resolving());
	assert!(manager.current_ticket().is_none());
}

#[tokio::test]
async fn dropped_leader_hands_resolution_to_waiter() {
	let fetcher = Arc::new(GatedFetcher::default());
	let manager = build_manager(fetcher.clone(), Arc::default());
	let gate = fetcher.gate.lock().await;
	let abandoned =
		tokio::time::timeout(std::time::Duration::from_millis(20), manager.get_access_token()).await;

	assert!(abandoned.is_err());
	assert!(manager.is_resolving());

	drop(gate);

	let token = manager.get_access_token().await.expect("Waiter should finish the resolution.");

	assert_eq!(token, "anon-2");
	assert_eq!(manager.metrics().started(), 1);
	assert_eq!(manager.metrics().joined(), 1);
	assert!(!manager.is_resolving());
}

#[test]
fn hook_delivery_follows_install_order_across_threads() {
	let store = Arc::new(StallingStore { slow_token: "first", persisted: Mutex::new(None) });
	let manager = ShopperAuthManager::builder()
		.user_auth_fetcher(Arc::new(GatedFetcher::default()))
		.hooks(store.clone())
		.build()
		.expect("Shopper manager should build.");

	std::thread::scope(|scope| {
		scope.spawn(|| {
			manager
				.set_ticket(Some(user_ticket("first", Duration::hours(1), Duration::days(1))))
				.expect("First ticket should install.");
		});
		std::thread::sleep(std::time::Duration::from_millis(50));
		manager
			.set_ticket(Some(user_ticket("second", Duration::hours(1), Duration::days(1))))
			.expect("Second ticket should install.");
	});

	let held = manager.current_ticket().map(|ticket| ticket.access_token.expose().to_owned());

	assert!(held.is_some());
	assert_eq!(*store.persisted.lock(), held);
}

#[tokio::test]
async fn manager_drives_http_client_end_to_end() {
	let server = MockServer::start_async().await;
	let _app = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/platform/applications/authtickets/oauth");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "access_token": "app-token", "expires_in": 3600 }));
		})
		.await;
	let anonymous = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/commerce/customer/authtickets/anonymousshopper")
				.header("authorization", "Bearer app-token");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"accessToken": "anon-http",
				"accessTokenExpiration": "2999-01-01T00:00:00Z",
				"refreshToken": "anon-refresh",
				"refreshTokenExpiration": "2999-01-02T00:00:00Z",
			}));
		})
		.await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/commerce/customer/authtickets")
				.json_body(json!({ "username": "boo", "password": "pw" }));
			then.status(200).header("content-type", "application/json").json_body(json!({
				"accessToken": "user-http",
				"accessTokenExpiration": "2999-01-01T00:00:00Z",
				"refreshToken": "user-refresh",
				"refreshTokenExpiration": "2999-01-02T00:00:00Z",
				"userId": "1001",
			}));
		})
		.await;
	let (client, _app_manager) = build_reqwest_test_shopper_client(&server.base_url());
	let hooks = Arc::new(CountingHooks::default());
	let manager = ShopperAuthManager::builder()
		.user_auth_fetcher(Arc::new(client))
		.hooks(hooks.clone())
		.build()
		.expect("Shopper manager should build.");

	assert_eq!(manager.get_access_token().await.expect("Anonymous token expected."), "anon-http");
	assert_eq!(manager.get_access_token().await.expect("Held token expected."), "anon-http");

	let ticket = manager
		.login_customer_and_set_auth_ticket(&LoginParameters::new("boo", "pw"))
		.await
		.expect("Login should succeed.");

	assert_eq!(ticket.user_id.as_deref(), Some("1001"));
	assert_eq!(manager.get_access_token().await.expect("User token expected."), "user-http");
	assert_eq!(hooks.changes.load(Ordering::SeqCst), 2);

	anonymous.assert_calls_async(1).await;
	login.assert_async().await;
}
