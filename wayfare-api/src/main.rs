use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayfare_api::{
    app,
    state::{AppState, AuthConfig, Collaborators},
    worker,
};
use wayfare_booking::{PlainTextRenderer, RetryPolicy, SagaSettings};
use wayfare_carrier::{CarrierAuth, HttpCarrierGateway};
use wayfare_channels::{ChatMessageChannel, SmtpEmailChannel};
use wayfare_core::NotificationChannel;
use wayfare_store::app_config::{CarrierCredential, Config};

fn carrier_gateway(config: &Config) -> anyhow::Result<HttpCarrierGateway> {
    let carrier = &config.carrier;
    let auth = match &carrier.credential {
        CarrierCredential::Bearer { token } => CarrierAuth::Bearer { token: token.clone() },
        CarrierCredential::Basic { username, password } => CarrierAuth::Basic {
            username: username.clone(),
            password: password.clone(),
        },
    };

    HttpCarrierGateway::new(
        carrier.base_url.clone(),
        &carrier.tenant_id,
        auth,
        carrier.timeout(),
        carrier.payment_method.clone(),
    )
    .context("Failed to build carrier client")
}

fn channels(config: &Config) -> anyhow::Result<Vec<Arc<dyn NotificationChannel>>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if let Some(email) = &config.notifications.email {
        channels.push(Arc::new(
            SmtpEmailChannel::new(
                &email.smtp_host,
                email.smtp_port,
                email.username.clone(),
                email.password.clone(),
                &email.from_address,
            )
            .context("Failed to configure email channel")?,
        ));
    }
    if let Some(chat) = &config.notifications.chat {
        channels.push(Arc::new(
            ChatMessageChannel::new(chat.gateway_url.clone(), chat.api_token.clone())
                .context("Failed to configure chat channel")?,
        ));
    }

    if channels.is_empty() {
        tracing::warn!("No notification channels configured; tickets will not be sent");
    }
    Ok(channels)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "wayfare_api=debug,wayfare_booking=debug,tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Wayfare API on port {}", config.server.port);

    let store = wayfare_store::connect_store(&config.store, &config.redis)
        .await
        .context("Failed to connect ticket store")?;

    let app_state = AppState::assemble(
        Collaborators {
            gateway: Arc::new(carrier_gateway(&config)?),
            store,
            channels: channels(&config)?,
            renderer: Arc::new(PlainTextRenderer),
        },
        SagaSettings {
            call_timeout: config.carrier.timeout(),
            ticket_ttl: config.store.ticket_ttl(),
        },
        RetryPolicy {
            max_attempts: config.notifications.max_attempts,
            base_delay: config.notifications.base_delay(),
        },
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        config.store.max_ttl(),
    )
    .context("Failed to register metrics")?;

    if config.kafka.enabled {
        let producer = wayfare_store::EventProducer::new(&config.kafka.brokers)
            .context("Failed to create Kafka producer")?;
        let brokers = config.kafka.brokers.clone();
        let group_id = config.kafka.group_id.clone();
        let saga = app_state.saga.clone();
        let metrics = app_state.metrics.clone();
        tokio::spawn(async move {
            if let Err(e) =
                worker::start_booking_worker(brokers, group_id, saga, Arc::new(producer), metrics)
                    .await
            {
                tracing::error!("Booking worker stopped: {}", e);
            }
        });
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
