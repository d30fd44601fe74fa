//! Post-commit notification fan-out.
//!
//! A booking is committed once its ticket is cached. Everything here runs
//! after that point: failures are retried, logged and finally abandoned, but
//! never reported back to the booking caller.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wayfare_core::{
    ChannelKind, JobPayload, NotificationChannel, NotificationJob, NotificationMessage,
    ReservationState, TicketArtifact, TicketRecord, TicketRenderer,
};
use wayfare_shared::pii::redact_tail;

use crate::tracker::StateTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the given failed attempt: `base_delay * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Delivered { attempts: u32 },
    Abandoned { attempts: u32, last_error: String },
}

impl JobOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, JobOutcome::Delivered { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub channel: ChannelKind,
    /// Recipient with everything but the last four characters hidden.
    pub target: String,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub order_id: String,
    pub rendered: bool,
    pub jobs: Vec<JobReport>,
}

impl DispatchReport {
    pub fn delivered_any(&self) -> bool {
        self.jobs.iter().any(|j| j.outcome.is_delivered())
    }

    pub fn abandoned(&self) -> usize {
        self.jobs.iter().filter(|j| !j.outcome.is_delivered()).count()
    }
}

pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    renderer: Arc<dyn TicketRenderer>,
    policy: RetryPolicy,
    tracker: Option<StateTracker>,
}

impl NotificationDispatcher {
    pub fn new(
        channels: Vec<Arc<dyn NotificationChannel>>,
        renderer: Arc<dyn TicketRenderer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            channels,
            renderer,
            policy,
            tracker: None,
        }
    }

    /// Marks a `Cached` order `Notified` whenever a fan-out delivers on some
    /// channel.
    pub fn with_tracker(mut self, tracker: StateTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn channel(&self, kind: ChannelKind) -> Option<&Arc<dyn NotificationChannel>> {
        self.channels.iter().find(|c| c.kind() == kind)
    }

    /// One job per configured channel, addressed to the lead passenger.
    /// A channel is skipped when the passenger left its address blank.
    pub fn jobs_for(
        &self,
        record: &TicketRecord,
        artifact: Option<Arc<TicketArtifact>>,
    ) -> Vec<NotificationJob> {
        let Some(lead) = record.lead_passenger() else {
            return Vec::new();
        };

        self.channels
            .iter()
            .filter_map(|channel| {
                let target = match channel.kind() {
                    ChannelKind::Email => lead.email.clone().filter(|e| !e.trim().is_empty())?,
                    ChannelKind::ChatMessage => {
                        Some(lead.phone.expose().clone()).filter(|p| !p.trim().is_empty())?
                    }
                };
                Some(NotificationJob::new(
                    channel.kind(),
                    target,
                    JobPayload {
                        order_id: record.order_id.clone(),
                        artifact: artifact.clone(),
                    },
                ))
            })
            .collect()
    }

    /// Sends one job, retrying with exponential backoff until it is delivered
    /// or `max_attempts` is spent.
    pub async fn dispatch(
        &self,
        job: &mut NotificationJob,
        message: &NotificationMessage,
    ) -> JobOutcome {
        let target = redact_tail(&job.target);
        let Some(channel) = self.channel(job.channel) else {
            return JobOutcome::Abandoned {
                attempts: job.attempts,
                last_error: format!("no {} channel configured", job.channel),
            };
        };
        let max_attempts = self.policy.max_attempts.max(1);

        loop {
            job.attempts += 1;
            match channel.send(&job.target, message).await {
                Ok(()) => {
                    debug!(
                        order_id = %job.payload.order_id,
                        channel = %job.channel,
                        attempt = job.attempts,
                        "Notification delivered"
                    );
                    return JobOutcome::Delivered {
                        attempts: job.attempts,
                    };
                }
                Err(e) => {
                    warn!(
                        order_id = %job.payload.order_id,
                        channel = %job.channel,
                        target = %target,
                        attempt = job.attempts,
                        error = %e,
                        "Notification attempt failed"
                    );
                    job.last_error = Some(e.to_string());

                    if job.attempts >= max_attempts {
                        error!(
                            order_id = %job.payload.order_id,
                            channel = %job.channel,
                            target = %target,
                            attempts = job.attempts,
                            "Notification abandoned"
                        );
                        return JobOutcome::Abandoned {
                            attempts: job.attempts,
                            last_error: e.to_string(),
                        };
                    }
                    tokio::time::sleep(self.policy.delay_for(job.attempts)).await;
                }
            }
        }
    }

    /// Renders the ticket once and fans it out on every channel concurrently.
    /// A render failure downgrades to sending without an attachment.
    pub async fn notify(&self, record: &TicketRecord) -> DispatchReport {
        let artifact = match self.renderer.render(record).await {
            Ok(artifact) => Some(Arc::new(artifact)),
            Err(e) => {
                warn!(order_id = %record.order_id, "{}; sending without attachment", e);
                None
            }
        };
        let rendered = artifact.is_some();
        let message = compose(record, artifact.clone());
        let jobs = self.jobs_for(record, artifact);

        if jobs.is_empty() {
            info!(order_id = %record.order_id, "No notification targets for order");
        }

        let message = &message;
        let reports = join_all(jobs.into_iter().map(|mut job| async move {
            let outcome = self.dispatch(&mut job, message).await;
            JobReport {
                channel: job.channel,
                target: redact_tail(&job.target),
                outcome,
            }
        }))
        .await;

        let report = DispatchReport {
            order_id: record.order_id.clone(),
            rendered,
            jobs: reports,
        };

        if report.delivered_any() {
            if let Some(tracker) = &self.tracker {
                tracker
                    .promote(&record.order_id, ReservationState::Notified)
                    .await;
            }
        }

        info!(
            order_id = %record.order_id,
            jobs = report.jobs.len(),
            abandoned = report.abandoned(),
            "Notification fan-out finished"
        );
        report
    }

    /// Runs [`notify`](Self::notify) on its own task. Dropping the handle
    /// detaches the task; it still runs to completion.
    pub fn spawn_notify(self: &Arc<Self>, record: TicketRecord) -> JoinHandle<DispatchReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.notify(&record).await })
    }
}

/// Subject and body shared by every channel for one order.
pub fn compose(record: &TicketRecord, attachment: Option<Arc<TicketArtifact>>) -> NotificationMessage {
    let subject = if record.reissued {
        format!("Updated ticket {} - {}", record.itinerary.line, record.display_date)
    } else {
        format!("Your ticket {} - {}", record.itinerary.line, record.display_date)
    };

    let mut body = format!(
        "{} departing {}\n",
        record.itinerary.carrier_name,
        record.itinerary.departure.format("%d/%m/%Y %H:%M")
    );
    for (sale, passenger) in record.sales.iter().zip(&record.passengers) {
        body.push_str(&format!(
            "Seat {} - {} - locator {}\n",
            sale.seat, passenger.full_name, sale.locator
        ));
    }
    if let Some(previous) = &record.previous_seat {
        body.push_str(&format!("Replaces seat {}\n", previous));
    }

    NotificationMessage {
        subject,
        body,
        attachment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            base_delay: Duration::MAX,
        };
        assert_eq!(policy.delay_for(40), Duration::MAX);
    }

    #[test]
    fn test_report_counts() {
        let report = DispatchReport {
            order_id: "o".to_string(),
            rendered: true,
            jobs: vec![
                JobReport {
                    channel: ChannelKind::Email,
                    target: "****.com".to_string(),
                    outcome: JobOutcome::Abandoned {
                        attempts: 3,
                        last_error: "down".to_string(),
                    },
                },
                JobReport {
                    channel: ChannelKind::ChatMessage,
                    target: "****8888".to_string(),
                    outcome: JobOutcome::Delivered { attempts: 1 },
                },
            ],
        };

        assert!(report.delivered_any());
        assert_eq!(report.abandoned(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["jobs"][0]["outcome"], "abandoned");
        assert_eq!(json["jobs"][1]["attempts"], 1);
    }

    #[test]
    fn test_blank_addresses_get_no_job() {
        use crate::testing::{itinerary, passenger, sale, trip, FlakyChannel};
        use crate::PlainTextRenderer;
        use wayfare_shared::Masked;

        let mut lead = passenger("Ana");
        lead.email = Some("  ".to_string());
        lead.phone = Masked::new(" ".to_string());
        let record = TicketRecord::issue(
            "order-1".to_string(),
            trip(),
            itinerary(&trip()),
            vec![lead],
            vec![sale("12", 10_000)],
        );
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(FlakyChannel::reliable(ChannelKind::Email)),
            Arc::new(FlakyChannel::reliable(ChannelKind::ChatMessage)),
        ];
        let dispatcher =
            NotificationDispatcher::new(channels, Arc::new(PlainTextRenderer), RetryPolicy::default());

        assert!(dispatcher.jobs_for(&record, None).is_empty());

        let mut reachable = record.clone();
        reachable.passengers[0].phone = Masked::new("+5511999998888".to_string());
        let jobs = dispatcher.jobs_for(&reachable, None);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].channel, ChannelKind::ChatMessage);
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn test_only_the_failing_channel_is_logged() {
        use crate::testing::{itinerary, passenger, sale, trip, FlakyChannel};
        use crate::PlainTextRenderer;

        let record = TicketRecord::issue(
            "order-1".to_string(),
            trip(),
            itinerary(&trip()),
            vec![passenger("Ana")],
            vec![sale("12", 10_000)],
        );
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(FlakyChannel::always_failing(ChannelKind::Email)),
            Arc::new(FlakyChannel::reliable(ChannelKind::ChatMessage)),
        ];
        let dispatcher =
            NotificationDispatcher::new(channels, Arc::new(PlainTextRenderer), RetryPolicy::default());

        let report = dispatcher.notify(&record).await;

        assert_eq!(report.abandoned(), 1);
        logs_assert(|lines: &[&str]| {
            let failures: Vec<&&str> = lines
                .iter()
                .filter(|l| {
                    l.contains("Notification attempt failed") || l.contains("Notification abandoned")
                })
                .collect();
            if failures.len() != 4 {
                return Err(format!("expected 3 warnings and 1 error, got {}", failures.len()));
            }
            match failures.iter().find(|l| !l.contains("channel=email")) {
                Some(line) => Err(format!("unexpected failure line: {}", line)),
                None => Ok(()),
            }
        });
    }
}
