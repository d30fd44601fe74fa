use std::sync::Arc;
use std::time::Duration;

use wayfare_booking::{
    BookingSaga, NotificationDispatcher, ReissueCoordinator, RetryPolicy, SagaSettings,
    StateTracker,
};
use wayfare_core::{CarrierGateway, NotificationChannel, TicketRenderer, TicketStore};

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub saga: Arc<BookingSaga>,
    pub reissue: Arc<ReissueCoordinator>,
    pub store: Arc<dyn TicketStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub renderer: Arc<dyn TicketRenderer>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    /// TTL the admin listing uses to turn remaining TTL into an age.
    pub max_ttl: Duration,
}

/// Everything [`AppState::assemble`] wires together.
pub struct Collaborators {
    pub gateway: Arc<dyn CarrierGateway>,
    pub store: Arc<dyn TicketStore>,
    pub channels: Vec<Arc<dyn NotificationChannel>>,
    pub renderer: Arc<dyn TicketRenderer>,
}

impl AppState {
    pub fn assemble(
        parts: Collaborators,
        settings: SagaSettings,
        policy: RetryPolicy,
        auth: AuthConfig,
        max_ttl: Duration,
    ) -> Result<Self, prometheus::Error> {
        let tracker = StateTracker::new(parts.store.clone(), settings.ticket_ttl);
        let dispatcher = Arc::new(
            NotificationDispatcher::new(parts.channels, parts.renderer.clone(), policy)
                .with_tracker(tracker),
        );

        let saga = BookingSaga::new(
            parts.gateway.clone(),
            parts.store.clone(),
            dispatcher.clone(),
            settings,
        );
        let reissue = ReissueCoordinator::new(
            parts.gateway,
            parts.store.clone(),
            dispatcher.clone(),
            settings,
        );

        Ok(Self {
            saga: Arc::new(saga),
            reissue: Arc::new(reissue),
            store: parts.store,
            dispatcher,
            renderer: parts.renderer,
            metrics: Arc::new(Metrics::new()?),
            auth,
            max_ttl,
        })
    }
}
