use serde::Deserialize;
use tracing::info;

/// A booking request submitted from the public site.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date: String,
    pub time: String,
    pub service: String,
    pub message: Option<String>,
}

impl BookingRequest {
    /// Every field except `message` must be present and non-blank.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("date", &self.date),
            ("time", &self.time),
            ("service", &self.service),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("Missing required fields: {}", missing.join(", ")))
        }
    }
}

/// Record an accepted booking for the studio's inbox.
pub fn record_booking(booking: &BookingRequest, recipient: &str) {
    info!(
        recipient,
        name = %booking.name,
        email = %booking.email,
        phone = %booking.phone,
        date = %booking.date,
        time = %booking.time,
        service = %booking.service,
        message = booking.message.as_deref().unwrap_or(""),
        "booking request received"
    );
}
