pub mod carrier;
pub mod notification;
pub mod repository;
pub mod reservation;
pub mod state;

pub use carrier::{CarrierError, CarrierGateway};
pub use notification::{
    ChannelError, ChannelKind, JobPayload, NotificationChannel, NotificationJob,
    NotificationMessage, RenderError, TicketArtifact, TicketRenderer,
};
pub use repository::{StoreError, StoredTicket, TicketStore};
pub use reservation::{
    BoardingWindow, DocumentType, FareBreakdown, FiscalData, Itinerary, Leg, PassengerInput,
    ReservationRequest, RouteShape, SaleConfirmation, SeatLock, TicketRecord, TripRef,
};
pub use state::{ReservationState, StateError};

/// Errors surfaced to the caller of a booking or reissue.
///
/// Every variant is fatal for the operation that raised it; notification
/// failures never appear here (see [`ChannelError`]).
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid reservation request: {0}")]
    InvalidRequest(String),
    #[error("Seat {seat} is unavailable: {message}")]
    SeatUnavailable { seat: String, message: String },
    #[error("Carrier timed out during {operation} for seat {seat}")]
    CarrierTimeout { operation: &'static str, seat: String },
    #[error("Unexpected carrier response: {0}")]
    CarrierProtocolError(String),
    #[error("Sale confirmation rejected for seat {seat}: {message}")]
    ConfirmationRejected { seat: String, message: String },
    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),
    #[error("Reissue not supported: {0}")]
    UnsupportedReissue(String),
    #[error("Failed to cache ticket record: {0}")]
    CacheWriteFailure(String),
    #[error("Failed to read ticket record: {0}")]
    CacheReadFailure(String),
}

impl BookingError {
    /// Maps a gateway failure onto the booking taxonomy, attaching the seat
    /// and the step that was running.
    pub fn from_carrier(err: CarrierError, operation: &'static str, seat: &str) -> Self {
        match err {
            CarrierError::SeatUnavailable(message) => BookingError::SeatUnavailable {
                seat: seat.to_string(),
                message,
            },
            CarrierError::ConfirmationRejected(message) => BookingError::ConfirmationRejected {
                seat: seat.to_string(),
                message,
            },
            CarrierError::Timeout(_) => BookingError::CarrierTimeout {
                operation,
                seat: seat.to_string(),
            },
            CarrierError::Protocol(message) => BookingError::CarrierProtocolError(message),
        }
    }

    /// Stable machine-readable name, used in events and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::InvalidRequest(_) => "INVALID_REQUEST",
            BookingError::SeatUnavailable { .. } => "SEAT_UNAVAILABLE",
            BookingError::CarrierTimeout { .. } => "CARRIER_TIMEOUT",
            BookingError::CarrierProtocolError(_) => "CARRIER_PROTOCOL_ERROR",
            BookingError::ConfirmationRejected { .. } => "CONFIRMATION_REJECTED",
            BookingError::ReservationNotFound(_) => "RESERVATION_NOT_FOUND",
            BookingError::UnsupportedReissue(_) => "UNSUPPORTED_REISSUE",
            BookingError::CacheWriteFailure(_) => "CACHE_WRITE_FAILURE",
            BookingError::CacheReadFailure(_) => "CACHE_READ_FAILURE",
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
