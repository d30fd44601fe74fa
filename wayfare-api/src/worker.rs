use std::sync::Arc;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use wayfare_booking::BookingSaga;
use wayfare_core::ReservationRequest;
use wayfare_shared::models::events::{ReservationConfirmedEvent, ReservationFailedEvent};
use wayfare_store::events::{
    EventProducer, TOPIC_PAYMENT_CONFIRMED, TOPIC_RESERVATION_CONFIRMED, TOPIC_RESERVATION_FAILED,
};

use crate::metrics::Metrics;

/// Published by the payment side once the customer has paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmedEvent {
    pub payment_id: String,
    pub reservation: ReservationRequest,
}

#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Confirmed(ReservationConfirmedEvent),
    /// The payment side compensates (refunds) on this.
    Failed(ReservationFailedEvent),
}

impl WorkerOutcome {
    pub fn topic(&self) -> &'static str {
        match self {
            WorkerOutcome::Confirmed(_) => TOPIC_RESERVATION_CONFIRMED,
            WorkerOutcome::Failed(_) => TOPIC_RESERVATION_FAILED,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            WorkerOutcome::Confirmed(e) => &e.order_id,
            WorkerOutcome::Failed(e) => &e.order_id,
        }
    }
}

/// Runs the booking saga for one `payment.confirmed` payload.
pub async fn process_payment_confirmed(
    saga: &BookingSaga,
    payload: &str,
) -> Result<WorkerOutcome, serde_json::Error> {
    let event: PaymentConfirmedEvent = serde_json::from_str(payload)?;
    let order_id = event.reservation.order_id.clone();
    info!(order_id = %order_id, payment_id = %event.payment_id, "Payment confirmed, booking seats");

    Ok(match saga.book(event.reservation).await {
        Ok(record) => WorkerOutcome::Confirmed(ReservationConfirmedEvent::new(
            record.order_id.clone(),
            record.locators(),
            record.seats.clone(),
            record.total_cents,
            record.reissued,
        )),
        Err(e) => WorkerOutcome::Failed(ReservationFailedEvent::new(
            order_id,
            e.kind(),
            e.to_string(),
        )),
    })
}

async fn publish(producer: &EventProducer, outcome: &WorkerOutcome) {
    let result = match outcome {
        WorkerOutcome::Confirmed(event) => {
            producer.publish_json(outcome.topic(), outcome.order_id(), event).await
        }
        WorkerOutcome::Failed(event) => {
            producer.publish_json(outcome.topic(), outcome.order_id(), event).await
        }
    };
    if let Err(e) = result {
        error!(order_id = %outcome.order_id(), "Failed to publish booking outcome: {}", e);
    }
}

pub async fn start_booking_worker(
    brokers: String,
    group_id: String,
    saga: Arc<BookingSaga>,
    producer: Arc<EventProducer>,
    metrics: Arc<Metrics>,
) -> Result<(), KafkaError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", &group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "earliest")
        .create()?;

    consumer.subscribe(&[TOPIC_PAYMENT_CONFIRMED])?;

    info!("Booking worker started, listening to {}", TOPIC_PAYMENT_CONFIRMED);

    loop {
        match consumer.recv().await {
            Err(e) => error!("Kafka error: {}", e),
            Ok(m) => match m.payload_view::<str>() {
                Some(Ok(payload)) => match process_payment_confirmed(&saga, payload).await {
                    Ok(outcome) => {
                        let label = match &outcome {
                            WorkerOutcome::Confirmed(_) => "confirmed",
                            WorkerOutcome::Failed(e) => e.error_kind.as_str(),
                        };
                        metrics.observe_booking("book", label);
                        publish(&producer, &outcome).await;
                    }
                    Err(e) => warn!("Skipping malformed {} payload: {}", TOPIC_PAYMENT_CONFIRMED, e),
                },
                Some(Err(e)) => error!("Error reading payload: {}", e),
                None => warn!("Empty {} message", TOPIC_PAYMENT_CONFIRMED),
            },
        }
    }
}
