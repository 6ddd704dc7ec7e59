// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by authentication flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("storefront_auth.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Reports that an expired shopper session could not be refreshed and falls back to an
/// anonymous ticket.
pub(crate) fn warn_anonymous_fallback(user_id: Option<&str>) {
	#[cfg(feature = "tracing")]
	{
		if let Some(user_id) = user_id {
			tracing::warn!(
				user_id,
				"Refresh token expired for a registered shopper; downgrading to an anonymous ticket."
			);
		} else {
			tracing::debug!("Refresh token expired; acquiring a new anonymous ticket.");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = user_id;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = FlowSpan::new(FlowKind::AppAuthenticate, "instrument_passes_output_through");

		assert_eq!(span.instrument(async { "token" }).await, "token");
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::ShopperRefresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn fallback_warning_is_silent_without_subscriber() {
		warn_anonymous_fallback(Some("1001"));
		warn_anonymous_fallback(None);
	}
}
