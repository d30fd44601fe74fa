use async_trait::async_trait;
use std::fmt::Write;
use wayfare_core::{RenderError, RouteShape, TicketArtifact, TicketRecord, TicketRenderer};

/// Renders a ticket as UTF-8 text. Used when no PDF service is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

fn money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

impl PlainTextRenderer {
    pub fn render_text(record: &TicketRecord) -> Result<String, std::fmt::Error> {
        let itinerary = &record.itinerary;
        let mut out = String::new();

        for line in record.sales.first().map(|s| s.fiscal.issuer_header.as_slice()).unwrap_or_default() {
            writeln!(out, "{}", line)?;
        }
        writeln!(out, "{}", itinerary.carrier_name)?;
        writeln!(out, "Order {}  Date {}", record.order_id, record.display_date)?;
        if record.reissued {
            if let Some(previous) = &record.previous_seat {
                writeln!(out, "REISSUED (was seat {})", previous)?;
            }
        }
        writeln!(out, "Line {}  Class {}", itinerary.line, itinerary.class_id)?;
        if let Some(platform) = &itinerary.platform {
            writeln!(out, "Platform {}", platform)?;
        }
        writeln!(
            out,
            "Departure {}  Arrival {}",
            itinerary.departure.format("%d/%m/%Y %H:%M"),
            itinerary.arrival.format("%d/%m/%Y %H:%M")
        )?;

        if let RouteShape::Connecting { legs } = &itinerary.route {
            for (i, leg) in legs.iter().enumerate() {
                writeln!(
                    out,
                    "  Leg {}: {} -> {} ({}) {} - {}",
                    i + 1,
                    leg.origin_name,
                    leg.destination_name,
                    leg.line,
                    leg.departure.format("%H:%M"),
                    leg.arrival.format("%H:%M")
                )?;
            }
        }

        for (sale, passenger) in record.sales.iter().zip(&record.passengers) {
            writeln!(out)?;
            writeln!(out, "Passenger {}  Seat {}", passenger.full_name, sale.seat)?;
            writeln!(
                out,
                "Locator {}  Ticket {}  System {}",
                sale.locator, sale.ticket_number, sale.system_number
            )?;
            writeln!(
                out,
                "Fare {}  Toll {}  Boarding tax {}  Insurance {}  Other {}  Total {}",
                money(sale.fare.fare),
                money(sale.fare.toll),
                money(sale.fare.boarding_tax),
                money(sale.fare.insurance),
                money(sale.fare.other),
                money(sale.fare.total())
            )?;
            writeln!(
                out,
                "Boarding {} - {}",
                sale.boarding.opens_at.format("%H:%M"),
                sale.boarding.closes_at.format("%H:%M")
            )?;
            writeln!(out, "Access key {}", sale.fiscal.access_key)?;
            writeln!(out, "Protocol {}", sale.fiscal.authorization_protocol)?;
            writeln!(out, "QR {}", sale.fiscal.qr_payload)?;
        }

        writeln!(out)?;
        writeln!(out, "TOTAL {}", money(record.total_cents))?;
        Ok(out)
    }
}

#[async_trait]
impl TicketRenderer for PlainTextRenderer {
    async fn render(&self, record: &TicketRecord) -> Result<TicketArtifact, RenderError> {
        if record.sales.is_empty() {
            return Err(RenderError::Failed(format!(
                "order {} has no confirmed sales",
                record.order_id
            )));
        }

        let text = Self::render_text(record).map_err(|e| RenderError::Failed(e.to_string()))?;

        Ok(TicketArtifact {
            file_name: format!("ticket-{}.txt", record.order_id),
            content_type: "text/plain; charset=utf-8".to_string(),
            bytes: text.into_bytes(),
        })
    }
}
