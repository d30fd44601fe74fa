//! Test doubles for the booking saga and notification fan-out.
//!
//! Enabled with the `test-support` feature so other crates' tests can use them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use wayfare_core::{
    BoardingWindow, CarrierError, CarrierGateway, ChannelError, ChannelKind, DocumentType,
    FareBreakdown, FiscalData, Itinerary, NotificationChannel, NotificationMessage,
    PassengerInput, RenderError, ReservationRequest, ReservationState, RouteShape,
    SaleConfirmation, SeatLock, StoreError, StoredTicket, TicketArtifact, TicketRecord,
    TicketRenderer, TicketStore, TripRef,
};
use wayfare_shared::Masked;

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Trip 55 from 100 to 200 on 2025-12-01.
pub fn trip() -> TripRef {
    TripRef {
        origin_id: 100,
        destination_id: 200,
        service_id: 55,
        travel_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap_or_default(),
    }
}

pub fn passenger(name: &str) -> PassengerInput {
    PassengerInput {
        full_name: name.to_string(),
        document_number: Masked::new("12345678900".to_string()),
        document_type: DocumentType::Cpf,
        nationality: "BR".to_string(),
        phone: Masked::new("+5511999998888".to_string()),
        email: Some(format!("{}@example.com", name.to_lowercase())),
    }
}

/// One passenger per seat, named P0, P1, ...
pub fn request(order_id: &str, seats: &[&str]) -> ReservationRequest {
    ReservationRequest {
        order_id: order_id.to_string(),
        trip: trip(),
        passengers: (0..seats.len()).map(|i| passenger(&format!("P{}", i))).collect(),
        seats: seats.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn itinerary(trip: &TripRef) -> Itinerary {
    let departure = trip.travel_date.and_hms_opt(22, 30, 0).unwrap_or_default();
    Itinerary {
        line: "SAO-RIO".to_string(),
        platform: Some("12".to_string()),
        departure,
        arrival: departure + chrono::Duration::hours(6),
        carrier_name: "Viação Exemplo".to_string(),
        class_id: "LEITO".to_string(),
        route: RouteShape::Direct,
    }
}

/// Sale for `seat` with the given base fare; toll and boarding tax add 450 cents.
pub fn sale(seat: &str, fare: i64) -> SaleConfirmation {
    let opens_at = trip().travel_date.and_hms_opt(21, 30, 0).unwrap_or_default();
    SaleConfirmation {
        locator: format!("LOC{}", seat),
        ticket_number: format!("T{}", seat),
        system_number: format!("S{}", seat),
        seat: seat.to_string(),
        fare: FareBreakdown {
            fare,
            toll: 150,
            boarding_tax: 300,
            insurance: 0,
            other: 0,
        },
        fiscal: FiscalData {
            access_key: "3525".to_string(),
            qr_payload: "https://bpe.example/qr".to_string(),
            authorization_protocol: "135250000000001".to_string(),
            issuer_header: vec!["VIACAO EXEMPLO LTDA".to_string()],
        },
        boarding: BoardingWindow {
            opens_at,
            closes_at: opens_at + chrono::Duration::minutes(55),
        },
    }
}

#[derive(Default)]
struct Script {
    lock_failures: HashMap<String, CarrierError>,
    confirm_failures: HashMap<String, CarrierError>,
    stalled_locks: Vec<String>,
    fares: HashMap<String, i64>,
    lock_calls: Vec<String>,
    confirm_calls: Vec<String>,
    next_tx: u32,
}

/// Carrier double driven by per-seat scripts. Unscripted seats succeed with
/// a base fare of 10000 cents.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub const DEFAULT_FARE: i64 = 10_000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_lock(self, seat: &str, err: CarrierError) -> Self {
        guard(&self.script).lock_failures.insert(seat.to_string(), err);
        self
    }

    pub fn fail_confirm(self, seat: &str, err: CarrierError) -> Self {
        guard(&self.script).confirm_failures.insert(seat.to_string(), err);
        self
    }

    /// Lock calls for `seat` never answer.
    pub fn stall_lock(self, seat: &str) -> Self {
        guard(&self.script).stalled_locks.push(seat.to_string());
        self
    }

    pub fn with_fare(self, seat: &str, fare: i64) -> Self {
        guard(&self.script).fares.insert(seat.to_string(), fare);
        self
    }

    pub fn lock_calls(&self) -> Vec<String> {
        guard(&self.script).lock_calls.clone()
    }

    pub fn confirm_calls(&self) -> Vec<String> {
        guard(&self.script).confirm_calls.clone()
    }

    pub fn total_calls(&self) -> usize {
        let script = guard(&self.script);
        script.lock_calls.len() + script.confirm_calls.len()
    }
}

#[async_trait]
impl CarrierGateway for ScriptedGateway {
    async fn lock_seat(&self, trip: &TripRef, seat: &str) -> Result<SeatLock, CarrierError> {
        let (stalled, outcome) = {
            let mut script = guard(&self.script);
            script.lock_calls.push(seat.to_string());
            script.next_tx += 1;
            let stalled = script.stalled_locks.iter().any(|s| s == seat);
            let outcome = match script.lock_failures.get(seat) {
                Some(err) => Err(err.clone()),
                None => Ok(SeatLock {
                    transaction_id: format!("tx-{}", script.next_tx),
                    operation_number: format!("op-{}", script.next_tx),
                    locator: None,
                    seat: seat.to_string(),
                    itinerary: itinerary(trip),
                }),
            };
            (stalled, outcome)
        };

        if stalled {
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        }
        outcome
    }

    async fn confirm_sale(
        &self,
        lock: SeatLock,
        _passenger: &PassengerInput,
    ) -> Result<SaleConfirmation, CarrierError> {
        let mut script = guard(&self.script);
        script.confirm_calls.push(lock.seat.clone());
        if let Some(err) = script.confirm_failures.get(&lock.seat) {
            return Err(err.clone());
        }
        let fare = script
            .fares
            .get(&lock.seat)
            .copied()
            .unwrap_or(Self::DEFAULT_FARE);
        Ok(sale(&lock.seat, fare))
    }
}

/// A message as seen by [`FlakyChannel`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub target: String,
    pub subject: String,
    pub attachment: Option<String>,
}

/// Notification channel that fails a fixed number of times before succeeding.
pub struct FlakyChannel {
    kind: ChannelKind,
    failures_left: Mutex<Option<u32>>,
    attempts: Mutex<u32>,
    sent: Mutex<Vec<SentMessage>>,
}

impl FlakyChannel {
    pub fn new(kind: ChannelKind, failures_before_success: u32) -> Self {
        Self {
            kind,
            failures_left: Mutex::new(Some(failures_before_success)),
            attempts: Mutex::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn reliable(kind: ChannelKind) -> Self {
        Self::new(kind, 0)
    }

    pub fn always_failing(kind: ChannelKind) -> Self {
        let channel = Self::new(kind, 0);
        *guard(&channel.failures_left) = None;
        channel
    }

    pub fn attempts(&self) -> u32 {
        *guard(&self.attempts)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        guard(&self.sent).clone()
    }
}

#[async_trait]
impl NotificationChannel for FlakyChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, target: &str, message: &NotificationMessage) -> Result<(), ChannelError> {
        *guard(&self.attempts) += 1;

        let mut failures_left = guard(&self.failures_left);
        match failures_left.as_mut() {
            None => return Err(ChannelError::Transport(format!("{} is down", self.kind))),
            Some(0) => {}
            Some(n) => {
                *n -= 1;
                return Err(ChannelError::Transport(format!("{} hiccup", self.kind)));
            }
        }
        drop(failures_left);

        guard(&self.sent).push(SentMessage {
            target: target.to_string(),
            subject: message.subject.clone(),
            attachment: message.attachment.as_ref().map(|a| a.file_name.clone()),
        });
        Ok(())
    }
}

pub struct FailingRenderer;

#[async_trait]
impl TicketRenderer for FailingRenderer {
    async fn render(&self, _record: &TicketRecord) -> Result<TicketArtifact, RenderError> {
        Err(RenderError::Failed("renderer offline".to_string()))
    }
}

/// Store whose ticket calls fail. State calls succeed and are dropped.
pub struct BrokenTicketStore {
    reads_fail: bool,
}

impl BrokenTicketStore {
    /// Every ticket read and write fails.
    pub fn unreachable() -> Self {
        Self { reads_fail: true }
    }

    /// Reads find nothing; writes fail.
    pub fn rejecting_writes() -> Self {
        Self { reads_fail: false }
    }

    fn read<T: Default>(&self) -> Result<T, StoreError> {
        if self.reads_fail {
            Err(StoreError::Backend("connection refused".to_string()))
        } else {
            Ok(T::default())
        }
    }
}

#[async_trait]
impl TicketStore for BrokenTicketStore {
    async fn put(&self, _: &str, _: &TicketRecord, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("read-only replica".to_string()))
    }

    async fn get(&self, _: &str) -> Result<Option<TicketRecord>, StoreError> {
        self.read()
    }

    async fn list(&self, _: &str) -> Result<Vec<StoredTicket>, StoreError> {
        self.read()
    }

    async fn put_state(&self, _: &str, _: &ReservationState, _: Duration) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_state(&self, _: &str) -> Result<Option<ReservationState>, StoreError> {
        Ok(None)
    }
}
