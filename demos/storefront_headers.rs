//! Wires an interceptor against a mock storefront and prints the headers a GraphQL request
//! would carry, first for an anonymous shopper and then after a password login.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use parking_lot::Mutex;
// self
use storefront_auth::{
	auth::{LoginParameters, UserAuthTicket},
	config::ApiConfig,
	flows::{
		AuthHooks, ReqwestApplicationAuthManager, ReqwestShopperAuthClient, ShopperAuthManager,
	},
	http::USER_CLAIMS_HEADER,
	intercept::AuthInterceptor,
};

#[derive(Default)]
struct CookieJar(Mutex<Option<UserAuthTicket>>);
impl AuthHooks for CookieJar {
	fn on_ticket_read(&self) -> Option<UserAuthTicket> {
		self.0.lock().clone()
	}

	fn on_ticket_change(&self, ticket: &UserAuthTicket) {
		println!("Persisting shopper ticket (anonymous: {}).", ticket.is_anonymous());

		*self.0.lock() = Some(ticket.clone());
	}

	fn on_ticket_remove(&self) {
		*self.0.lock() = None;
	}
}

fn shopper_body(token: &str, user_id: Option<&str>) -> String {
	let user_id = user_id.map(|id| format!(",\"userId\":\"{id}\"")).unwrap_or_default();

	format!(
		"{{\"accessToken\":\"{token}\",\"accessTokenExpiration\":\"2999-01-01T00:00:00Z\",\
		\"refreshToken\":\"{token}-refresh\",\"refreshTokenExpiration\":\"2999-01-02T00:00:00Z\"{user_id}}}"
	)
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let app_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/platform/applications/authtickets/oauth");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-app\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let anonymous_body = shopper_body("demo-anonymous", None);
	let _anonymous_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/commerce/customer/authtickets/anonymousshopper");
			then.status(200).header("content-type", "application/json").body(&anonymous_body);
		})
		.await;
	let login_body = shopper_body("demo-shopper", Some("1001"));
	let _login_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/commerce/customer/authtickets");
			then.status(200).header("content-type", "application/json").body(&login_body);
		})
		.await;
	let config = ApiConfig::new("demo-client", "demo-secret", server.base_url(), server.base_url());
	let app = Arc::new(ReqwestApplicationAuthManager::from_config(&config)?);
	let shopper = Arc::new(
		ShopperAuthManager::builder()
			.user_auth_fetcher(Arc::new(ReqwestShopperAuthClient::from_config(&config, app.clone())?))
			.hooks(Arc::new(CookieJar::default()))
			.build()?,
	);
	let interceptor = AuthInterceptor::new(app).with_shopper(shopper.clone());
	let headers = interceptor.headers().await?;

	println!("Anonymous user claims: {:?}.", headers[USER_CLAIMS_HEADER]);

	shopper.login_customer_and_set_auth_ticket(&LoginParameters::new("boo", "pw")).await?;

	let headers = interceptor.headers().await?;

	println!("Authorization: {:?}.", headers["authorization"]);
	println!("Registered user claims: {:?}.", headers[USER_CLAIMS_HEADER]);

	app_mock.assert_async().await;

	Ok(())
}
