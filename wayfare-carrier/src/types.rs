//! Carrier wire format for the seat-lock and sale-confirm endpoints.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use wayfare_core::reservation::{
    BoardingWindow, FareBreakdown, FiscalData, Itinerary, Leg, PassengerInput, RouteShape,
    SaleConfirmation,
};

#[derive(Debug, Clone, Serialize)]
pub struct LockSeatRequest<'a> {
    pub origin_id: u64,
    pub destination_id: u64,
    pub service_id: u64,
    pub travel_date: NaiveDate,
    pub seat: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockSeatResponse {
    pub transaction_id: String,
    pub operation_number: String,
    #[serde(default)]
    pub locator: Option<String>,
    pub itinerary: ItineraryDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegDto {
    pub origin_name: String,
    pub destination_name: String,
    pub line: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
}

/// Present only when the service changes vehicle midway.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDto {
    pub first_leg: LegDto,
    pub second_leg: LegDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItineraryDto {
    pub line: String,
    #[serde(default)]
    pub platform: Option<String>,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub carrier_name: String,
    pub class_id: String,
    #[serde(default)]
    pub connection: Option<ConnectionDto>,
}

impl From<LegDto> for Leg {
    fn from(dto: LegDto) -> Self {
        Leg {
            origin_name: dto.origin_name,
            destination_name: dto.destination_name,
            line: dto.line,
            departure: dto.departure,
            arrival: dto.arrival,
        }
    }
}

impl From<ItineraryDto> for Itinerary {
    fn from(dto: ItineraryDto) -> Self {
        let route = match dto.connection {
            Some(c) => RouteShape::Connecting {
                legs: [c.first_leg.into(), c.second_leg.into()],
            },
            None => RouteShape::Direct,
        };

        Itinerary {
            line: dto.line,
            platform: dto.platform,
            departure: dto.departure,
            arrival: dto.arrival,
            carrier_name: dto.carrier_name,
            class_id: dto.class_id,
            route,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PassengerDto<'a> {
    pub name: &'a str,
    pub document: &'a str,
    pub document_type: &'a wayfare_core::DocumentType,
    pub nationality: &'a str,
    pub phone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
}

impl<'a> From<&'a PassengerInput> for PassengerDto<'a> {
    fn from(p: &'a PassengerInput) -> Self {
        PassengerDto {
            name: &p.full_name,
            document: p.document_number.expose(),
            document_type: &p.document_type,
            nationality: &p.nationality,
            phone: p.phone.expose(),
            email: p.email.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmSaleRequest<'a> {
    pub transaction_id: &'a str,
    pub operation_number: &'a str,
    pub seat: &'a str,
    pub passenger: PassengerDto<'a>,
    pub payment_method: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FareDto {
    pub fare: i64,
    #[serde(default)]
    pub toll: i64,
    #[serde(default)]
    pub boarding_tax: i64,
    #[serde(default)]
    pub insurance: i64,
    #[serde(default)]
    pub other: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FiscalDto {
    pub access_key: String,
    pub qr_payload: String,
    pub authorization_protocol: String,
    #[serde(default)]
    pub issuer_header: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardingDto {
    pub opens_at: NaiveDateTime,
    pub closes_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmSaleResponse {
    pub locator: String,
    pub ticket_number: String,
    pub system_number: String,
    pub seat: String,
    pub fare: FareDto,
    pub fiscal: FiscalDto,
    pub boarding: BoardingDto,
}

impl From<ConfirmSaleResponse> for SaleConfirmation {
    fn from(dto: ConfirmSaleResponse) -> Self {
        SaleConfirmation {
            locator: dto.locator,
            ticket_number: dto.ticket_number,
            system_number: dto.system_number,
            seat: dto.seat,
            fare: FareBreakdown {
                fare: dto.fare.fare,
                toll: dto.fare.toll,
                boarding_tax: dto.fare.boarding_tax,
                insurance: dto.fare.insurance,
                other: dto.fare.other,
            },
            fiscal: FiscalData {
                access_key: dto.fiscal.access_key,
                qr_payload: dto.fiscal.qr_payload,
                authorization_protocol: dto.fiscal.authorization_protocol,
                issuer_header: dto.fiscal.issuer_header,
            },
            boarding: BoardingWindow {
                opens_at: dto.boarding.opens_at,
                closes_at: dto.boarding.closes_at,
            },
        }
    }
}

/// Error body the carrier returns alongside non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct CarrierErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}
