use std::sync::Arc;
use std::time::Duration;

use wayfare_booking::testing::{
    passenger, request, BrokenTicketStore, FailingRenderer, FlakyChannel, ScriptedGateway,
};
use wayfare_booking::{
    BookingSaga, JobOutcome, NotificationDispatcher, PlainTextRenderer, ReissueCoordinator,
    RetryPolicy, SagaSettings, StateTracker,
};
use wayfare_core::{
    BookingError, CarrierError, ChannelKind, NotificationChannel, ReservationState,
    TicketRenderer, TicketStore,
};
use wayfare_store::InMemoryTicketStore;

struct Harness {
    gateway: Arc<ScriptedGateway>,
    store: Arc<InMemoryTicketStore>,
    email: Arc<FlakyChannel>,
    chat: Arc<FlakyChannel>,
    saga: BookingSaga,
    reissue: ReissueCoordinator,
}

fn settings() -> SagaSettings {
    SagaSettings {
        call_timeout: Duration::from_secs(5),
        ticket_ttl: Duration::from_secs(3600),
    }
}

fn build(
    gateway: ScriptedGateway,
    email: FlakyChannel,
    chat: FlakyChannel,
    renderer: Arc<dyn TicketRenderer>,
) -> Harness {
    let gateway = Arc::new(gateway);
    let store = Arc::new(InMemoryTicketStore::new());
    let email = Arc::new(email);
    let chat = Arc::new(chat);

    let dyn_store: Arc<dyn TicketStore> = store.clone();
    let channels: Vec<Arc<dyn NotificationChannel>> = vec![email.clone(), chat.clone()];
    let dispatcher = Arc::new(
        NotificationDispatcher::new(channels, renderer, RetryPolicy::default())
            .with_tracker(StateTracker::new(dyn_store.clone(), settings().ticket_ttl)),
    );

    Harness {
        saga: BookingSaga::new(gateway.clone(), dyn_store.clone(), dispatcher.clone(), settings()),
        reissue: ReissueCoordinator::new(gateway.clone(), dyn_store, dispatcher, settings()),
        gateway,
        store,
        email,
        chat,
    }
}

fn harness(gateway: ScriptedGateway) -> Harness {
    build(
        gateway,
        FlakyChannel::reliable(ChannelKind::Email),
        FlakyChannel::reliable(ChannelKind::ChatMessage),
        Arc::new(PlainTextRenderer),
    )
}

#[tokio::test]
async fn test_two_seats_are_sold_and_cached() {
    let h = harness(
        ScriptedGateway::new()
            .with_fare("12", 10_000)
            .with_fare("13", 12_000),
    );

    let committed = h.saga.execute(request("order-1", &["12", "13"])).await.unwrap();
    let record = committed.record;

    assert_eq!(record.seats, vec!["12", "13"]);
    assert_eq!(record.sales.len(), 2);
    assert_eq!(record.total_cents, 10_450 + 12_450);
    assert_eq!(
        record.total_cents,
        record.per_seat_totals().iter().map(|(_, t)| t).sum::<i64>()
    );
    assert_eq!(record.display_date, "01/12/2025");
    assert_eq!(h.gateway.lock_calls(), vec!["12", "13"]);
    assert_eq!(h.gateway.confirm_calls(), vec!["12", "13"]);

    assert_eq!(h.store.get("order-1").await.unwrap(), Some(record));

    let report = committed.notifications.unwrap().await.unwrap();
    assert!(report.rendered);
    assert_eq!(report.jobs.len(), 2);
    assert!(report.jobs.iter().all(|j| j.outcome.is_delivered()));
    assert_eq!(h.email.sent()[0].target, "p0@example.com");
    assert_eq!(h.chat.sent()[0].attachment.as_deref(), Some("ticket-order-1.txt"));
    assert_eq!(
        h.store.get_state("order-1").await.unwrap(),
        Some(ReservationState::Notified)
    );
}

#[tokio::test]
async fn test_lock_failure_caches_nothing() {
    let h = harness(
        ScriptedGateway::new().fail_lock("12", CarrierError::SeatUnavailable("sold".into())),
    );

    let err = h.saga.book(request("order-1", &["12"])).await.unwrap_err();

    assert!(matches!(err, BookingError::SeatUnavailable { ref seat, .. } if seat == "12"));
    assert_eq!(h.store.get("order-1").await.unwrap(), None);
    assert!(h.gateway.confirm_calls().is_empty());
    assert!(matches!(
        h.store.get_state("order-1").await.unwrap(),
        Some(ReservationState::Failed { .. })
    ));
    assert_eq!(h.email.attempts() + h.chat.attempts(), 0);
}

#[tokio::test]
async fn test_confirm_failure_on_second_seat_aborts() {
    let h = harness(ScriptedGateway::new().fail_confirm(
        "13",
        CarrierError::ConfirmationRejected("document invalid".into()),
    ));

    let err = h.saga.book(request("order-1", &["12", "13", "14"])).await.unwrap_err();

    assert!(matches!(err, BookingError::ConfirmationRejected { ref seat, .. } if seat == "13"));
    assert_eq!(h.store.get("order-1").await.unwrap(), None);
    assert_eq!(h.gateway.lock_calls(), vec!["12", "13"]);
    assert_eq!(h.gateway.confirm_calls(), vec!["12", "13"]);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_carrier_times_out() {
    let h = harness(ScriptedGateway::new().stall_lock("12"));

    let err = h.saga.book(request("order-1", &["12"])).await.unwrap_err();

    assert!(matches!(
        err,
        BookingError::CarrierTimeout { operation: "lock_seat", ref seat } if seat == "12"
    ));
    assert_eq!(h.store.get("order-1").await.unwrap(), None);
}

#[tokio::test]
async fn test_protocol_error_is_surfaced() {
    let h = harness(
        ScriptedGateway::new().fail_lock("12", CarrierError::Protocol("bad json".into())),
    );

    let err = h.saga.book(request("order-1", &["12"])).await.unwrap_err();

    assert!(matches!(err, BookingError::CarrierProtocolError(_)));
}

#[tokio::test]
async fn test_mismatched_request_never_reaches_carrier() {
    let h = harness(ScriptedGateway::new());
    let mut req = request("order-1", &["12", "13"]);
    req.passengers.pop();

    let err = h.saga.book(req).await.unwrap_err();

    assert!(matches!(err, BookingError::InvalidRequest(_)));
    assert_eq!(h.gateway.total_calls(), 0);
}

fn saga_over(gateway: Arc<ScriptedGateway>, store: BrokenTicketStore) -> BookingSaga {
    let store: Arc<dyn TicketStore> = Arc::new(store);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        vec![],
        Arc::new(PlainTextRenderer),
        RetryPolicy::default(),
    ));
    BookingSaga::new(gateway, store, dispatcher, settings())
}

#[tokio::test]
async fn test_cache_write_failure_is_reported() {
    let gateway = Arc::new(ScriptedGateway::new());
    let saga = saga_over(gateway.clone(), BrokenTicketStore::rejecting_writes());

    let err = saga.book(request("order-1", &["12"])).await.unwrap_err();

    assert!(matches!(err, BookingError::CacheWriteFailure(_)));
    assert_eq!(gateway.confirm_calls(), vec!["12"]);
}

#[tokio::test]
async fn test_unreadable_store_aborts_before_selling() {
    let gateway = Arc::new(ScriptedGateway::new());
    let saga = saga_over(gateway.clone(), BrokenTicketStore::unreachable());

    let err = saga.book(request("order-1", &["12"])).await.unwrap_err();

    assert!(matches!(err, BookingError::CacheReadFailure(_)));
    assert_eq!(gateway.total_calls(), 0);
}

#[tokio::test]
async fn test_rebooking_ticketed_order_returns_cached_ticket() {
    let h = harness(ScriptedGateway::new());
    let first = h.saga.execute(request("order-1", &["12"])).await.unwrap();
    first.notifications.unwrap().await.unwrap();
    let calls = h.gateway.total_calls();

    let again = h.saga.execute(request("order-1", &["12"])).await.unwrap();

    assert_eq!(again.record, first.record);
    assert!(again.notifications.is_none());
    assert_eq!(h.gateway.total_calls(), calls);
    assert_eq!(h.email.attempts(), 1);
    assert_eq!(
        h.store.get_state("order-1").await.unwrap(),
        Some(ReservationState::Notified)
    );
}

#[tokio::test]
async fn test_invalid_request_keeps_state_of_ticketed_order() {
    let h = harness(ScriptedGateway::new());
    let committed = h.saga.execute(request("order-1", &["12"])).await.unwrap();
    committed.notifications.unwrap().await.unwrap();
    let state = h.store.get_state("order-1").await.unwrap();
    let mut req = request("order-1", &["12", "13"]);
    req.passengers.pop();

    let err = h.saga.book(req).await.unwrap_err();

    assert!(matches!(err, BookingError::InvalidRequest(_)));
    assert!(state.as_ref().is_some_and(|s| s.has_ticket()));
    assert_eq!(h.store.get_state("order-1").await.unwrap(), state);
}

#[tokio::test]
async fn test_booking_in_flight_is_rejected() {
    let h = harness(ScriptedGateway::new());
    h.store
        .put_state("order-1", &ReservationState::SeatLocked, Duration::from_secs(60))
        .await
        .unwrap();

    let err = h.saga.book(request("order-1", &["12"])).await.unwrap_err();

    assert!(matches!(err, BookingError::InvalidRequest(_)));
    assert_eq!(h.gateway.total_calls(), 0);
    assert_eq!(
        h.store.get_state("order-1").await.unwrap(),
        Some(ReservationState::SeatLocked)
    );
}

#[tokio::test]
async fn test_failed_order_can_be_booked_again() {
    let h = harness(
        ScriptedGateway::new().fail_lock("12", CarrierError::SeatUnavailable("sold".into())),
    );
    h.saga.book(request("order-1", &["12"])).await.unwrap_err();

    let record = h.saga.book(request("order-1", &["13"])).await.unwrap();

    assert_eq!(record.seats, vec!["13"]);
    assert!(h
        .store
        .get_state("order-1")
        .await
        .unwrap()
        .is_some_and(|s| s.has_ticket()));
}

#[tokio::test]
async fn test_resend_never_revives_failed_order() {
    let h = harness(ScriptedGateway::new());
    let dyn_store: Arc<dyn TicketStore> = h.store.clone();
    let committed = h.saga.execute(request("order-1", &["12"])).await.unwrap();
    committed.notifications.unwrap().await.unwrap();
    let failed = ReservationState::Failed {
        reason: "operator cancelled".to_string(),
    };
    h.store
        .put_state("order-1", &failed, Duration::from_secs(60))
        .await
        .unwrap();
    let channels: Vec<Arc<dyn NotificationChannel>> = vec![h.chat.clone()];
    let dispatcher = NotificationDispatcher::new(
        channels,
        Arc::new(PlainTextRenderer),
        RetryPolicy::default(),
    )
    .with_tracker(StateTracker::new(dyn_store, settings().ticket_ttl));

    let report = dispatcher.notify(&committed.record).await;

    assert!(report.delivered_any());
    assert_eq!(h.store.get_state("order-1").await.unwrap(), Some(failed));
}

#[tokio::test]
async fn test_reissue_moves_seat_and_keeps_passenger() {
    let h = harness(ScriptedGateway::new().with_fare("40", 11_000));
    let original = h.saga.book(request("order-1", &["12"])).await.unwrap();

    let next = h.reissue.reissue("order-1", "40").await.unwrap();

    assert_eq!(next.seat(), Some("40"));
    assert_eq!(next.previous_seat.as_deref(), Some("12"));
    assert!(next.reissued);
    assert_eq!(next.passengers, original.passengers);
    assert_eq!(next.passengers[0], passenger("P0"));
    assert_eq!(next.trip, original.trip);
    assert_eq!(next.total_cents, 11_450);
    assert_eq!(h.store.get("order-1").await.unwrap(), Some(next));
}

#[tokio::test]
async fn test_reissue_of_unknown_order_makes_no_carrier_calls() {
    let h = harness(ScriptedGateway::new());

    let err = h.reissue.reissue("missing", "40").await.unwrap_err();

    assert!(matches!(err, BookingError::ReservationNotFound(ref id) if id == "missing"));
    assert_eq!(h.gateway.total_calls(), 0);
}

#[tokio::test]
async fn test_reissue_rejects_multi_seat_orders() {
    let h = harness(ScriptedGateway::new());
    h.saga.book(request("order-1", &["12", "13"])).await.unwrap();
    let calls_after_booking = h.gateway.total_calls();

    let err = h.reissue.reissue("order-1", "40").await.unwrap_err();

    assert!(matches!(err, BookingError::UnsupportedReissue(_)));
    assert_eq!(h.gateway.total_calls(), calls_after_booking);
}

#[tokio::test]
async fn test_failed_reissue_keeps_ticket_and_state() {
    let h = harness(
        ScriptedGateway::new().fail_lock("40", CarrierError::SeatUnavailable("sold".into())),
    );
    let committed = h.saga.execute(request("order-1", &["12"])).await.unwrap();
    committed.notifications.unwrap().await.unwrap();

    let err = h.reissue.reissue("order-1", "40").await.unwrap_err();

    assert!(matches!(err, BookingError::SeatUnavailable { .. }));
    assert_eq!(h.store.get("order-1").await.unwrap(), Some(committed.record));
    assert_eq!(
        h.store.get_state("order-1").await.unwrap(),
        Some(ReservationState::Notified)
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_channel_does_not_fail_booking() {
    let h = build(
        ScriptedGateway::new(),
        FlakyChannel::always_failing(ChannelKind::Email),
        FlakyChannel::reliable(ChannelKind::ChatMessage),
        Arc::new(PlainTextRenderer),
    );

    let committed = h.saga.execute(request("order-1", &["12"])).await.unwrap();
    let report = committed.notifications.unwrap().await.unwrap();

    assert_eq!(h.email.attempts(), 3);
    assert_eq!(h.chat.attempts(), 1);
    let email = report.jobs.iter().find(|j| j.channel == ChannelKind::Email).unwrap();
    assert!(matches!(email.outcome, JobOutcome::Abandoned { attempts: 3, .. }));
    let chat = report.jobs.iter().find(|j| j.channel == ChannelKind::ChatMessage).unwrap();
    assert_eq!(chat.outcome, JobOutcome::Delivered { attempts: 1 });
    assert_eq!(report.abandoned(), 1);
    assert!(h.store.get("order-1").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_channel_recovers_within_retry_budget() {
    let h = build(
        ScriptedGateway::new(),
        FlakyChannel::new(ChannelKind::Email, 2),
        FlakyChannel::reliable(ChannelKind::ChatMessage),
        Arc::new(PlainTextRenderer),
    );

    let committed = h.saga.execute(request("order-1", &["12"])).await.unwrap();
    let report = committed.notifications.unwrap().await.unwrap();

    assert_eq!(report.abandoned(), 0);
    assert_eq!(h.email.attempts(), 3);
    assert_eq!(h.email.sent().len(), 1);
}

#[tokio::test]
async fn test_render_failure_sends_without_attachment() {
    let h = build(
        ScriptedGateway::new(),
        FlakyChannel::reliable(ChannelKind::Email),
        FlakyChannel::reliable(ChannelKind::ChatMessage),
        Arc::new(FailingRenderer),
    );

    let committed = h.saga.execute(request("order-1", &["12"])).await.unwrap();
    let report = committed.notifications.unwrap().await.unwrap();

    assert!(!report.rendered);
    assert!(report.delivered_any());
    assert!(h.email.sent()[0].attachment.is_none());
}

#[tokio::test]
async fn test_email_skipped_without_address() {
    let h = harness(ScriptedGateway::new());
    let mut req = request("order-1", &["12"]);
    req.passengers[0].email = None;

    let committed = h.saga.execute(req).await.unwrap();
    let report = committed.notifications.unwrap().await.unwrap();

    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.jobs[0].channel, ChannelKind::ChatMessage);
    assert_eq!(report.jobs[0].target, "****8888");
    assert_eq!(h.email.attempts(), 0);
}
