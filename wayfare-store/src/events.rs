use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, error};

pub const TOPIC_PAYMENT_CONFIRMED: &str = "payment.confirmed";
pub const TOPIC_RESERVATION_CONFIRMED: &str = "reservation.confirmed";
pub const TOPIC_RESERVATION_FAILED: &str = "reservation.failed";

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    /// Serializes `event` as JSON and publishes it keyed by order id.
    pub async fn publish_json<T: Serialize>(&self, topic: &str, key: &str, event: &T) -> Result<(), EventError> {
        let payload = serde_json::to_string(event)?;
        self.publish(topic, key, &payload).await?;
        Ok(())
    }
}
