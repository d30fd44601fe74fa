use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfare_shared::Masked;

use crate::{BookingError, BookingResult};

/// Carrier-side identifiers of the trip being sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRef {
    pub origin_id: u64,
    pub destination_id: u64,
    pub service_id: u64,
    pub travel_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Rg,
    Cpf,
    Passport,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerInput {
    pub full_name: String,
    pub document_number: Masked<String>,
    pub document_type: DocumentType,
    pub nationality: String,
    pub phone: Masked<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// What the post-payment handler submits to the booking saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub order_id: String,
    pub trip: TripRef,
    pub passengers: Vec<PassengerInput>,
    pub seats: Vec<String>,
}

impl ReservationRequest {
    /// Seats and passengers are paired by position, so both lists must be
    /// non-empty and of equal length.
    pub fn validate(&self) -> BookingResult<()> {
        if self.order_id.trim().is_empty() {
            return Err(BookingError::InvalidRequest("order_id is empty".to_string()));
        }
        if self.seats.is_empty() {
            return Err(BookingError::InvalidRequest("no seats requested".to_string()));
        }
        if self.seats.len() != self.passengers.len() {
            return Err(BookingError::InvalidRequest(format!(
                "{} seats requested for {} passengers",
                self.seats.len(),
                self.passengers.len()
            )));
        }
        if let Some(blank) = self.seats.iter().position(|s| s.trim().is_empty()) {
            return Err(BookingError::InvalidRequest(format!("seat at index {} is blank", blank)));
        }
        Ok(())
    }

    /// (seat, passenger) pairs in request order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &PassengerInput)> {
        self.seats.iter().map(String::as_str).zip(self.passengers.iter())
    }
}

/// One leg of a connecting itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub origin_name: String,
    pub destination_name: String,
    pub line: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
}

/// Whether the service runs straight through or changes vehicle once.
/// Decided at the carrier boundary; downstream code matches on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteShape {
    Direct,
    Connecting { legs: [Leg; 2] },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    pub line: String,
    pub platform: Option<String>,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub carrier_name: String,
    pub class_id: String,
    pub route: RouteShape,
}

/// Single-use seat hold returned by the carrier. Deliberately not `Clone`:
/// `confirm_sale` consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct SeatLock {
    pub transaction_id: String,
    pub operation_number: String,
    pub locator: Option<String>,
    pub seat: String,
    pub itinerary: Itinerary,
}

/// Fare components in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub fare: i64,
    pub toll: i64,
    pub boarding_tax: i64,
    pub insurance: i64,
    pub other: i64,
}

impl FareBreakdown {
    /// Sum of all components, saturating at the `i64` bounds.
    pub fn total(&self) -> i64 {
        [self.toll, self.boarding_tax, self.insurance, self.other]
            .into_iter()
            .fold(self.fare, i64::saturating_add)
    }
}

/// Electronic bus ticket (BPe) metadata needed to print a valid ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalData {
    pub access_key: String,
    pub qr_payload: String,
    pub authorization_protocol: String,
    pub issuer_header: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardingWindow {
    pub opens_at: NaiveDateTime,
    pub closes_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfirmation {
    pub locator: String,
    pub ticket_number: String,
    pub system_number: String,
    pub seat: String,
    pub fare: FareBreakdown,
    pub fiscal: FiscalData,
    pub boarding: BoardingWindow,
}

/// The cached, reprintable projection of a confirmed reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub order_id: String,
    pub trip: TripRef,
    pub itinerary: Itinerary,
    pub passengers: Vec<PassengerInput>,
    pub sales: Vec<SaleConfirmation>,
    pub seats: Vec<String>,
    pub total_cents: i64,
    pub display_date: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub reissued: bool,
    #[serde(default)]
    pub previous_seat: Option<String>,
}

impl TicketRecord {
    /// Builds a fresh record from the confirmations of a booking, one per
    /// passenger in the same order.
    pub fn issue(
        order_id: String,
        trip: TripRef,
        itinerary: Itinerary,
        passengers: Vec<PassengerInput>,
        sales: Vec<SaleConfirmation>,
    ) -> Self {
        let seats = sales.iter().map(|s| s.seat.clone()).collect();
        let total_cents = sales
            .iter()
            .map(|s| s.fare.total())
            .fold(0, i64::saturating_add);
        let display_date = trip.travel_date.format("%d/%m/%Y").to_string();

        Self {
            order_id,
            trip,
            itinerary,
            passengers,
            sales,
            seats,
            total_cents,
            display_date,
            issued_at: Utc::now(),
            reissued: false,
            previous_seat: None,
        }
    }

    /// Builds the replacement for a single-seat record after a seat change.
    /// Passengers and trip are carried over untouched.
    pub fn reissue(&self, itinerary: Itinerary, sale: SaleConfirmation) -> Self {
        let mut next = TicketRecord::issue(
            self.order_id.clone(),
            self.trip.clone(),
            itinerary,
            self.passengers.clone(),
            vec![sale],
        );
        next.reissued = true;
        next.previous_seat = self.seat().map(str::to_string);
        next
    }

    pub fn seat(&self) -> Option<&str> {
        self.seats.first().map(String::as_str)
    }

    /// The passenger who receives notifications for the order.
    pub fn lead_passenger(&self) -> Option<&PassengerInput> {
        self.passengers.first()
    }

    pub fn per_seat_totals(&self) -> Vec<(&str, i64)> {
        self.sales
            .iter()
            .map(|s| (s.seat.as_str(), s.fare.total()))
            .collect()
    }

    pub fn locators(&self) -> Vec<String> {
        self.sales.iter().map(|s| s.locator.clone()).collect()
    }
}
