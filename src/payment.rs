use url::Url;

use crate::ids;
use crate::models::PaymentConfig;

const SHORT_LINK_HOST: &str = "shorturl.at";

/// What a simulated payment request produced: the full UPI deep link and the
/// shortened form shown to staff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDispatch {
    pub reference: String,
    pub contact_number: String,
    pub upi_uri: String,
    pub short_link: String,
}

/// Builds UPI payment links and pretends to text them to patients.
#[derive(Debug, Clone)]
pub struct PaymentLinkSimulator {
    config: PaymentConfig,
}

impl PaymentLinkSimulator {
    pub fn new(config: PaymentConfig) -> Self {
        Self { config }
    }

    pub fn upi_uri(&self, amount: u32, note: &str) -> String {
        let amount = amount.to_string();
        let params = [
            ("pa", self.config.upi_id.as_str()),
            ("pn", self.config.payee_name.as_str()),
            ("am", amount.as_str()),
            ("cu", self.config.currency.as_str()),
            ("tn", note),
        ];
        match Url::parse_with_params("upi://pay", &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                log::error!("Failed to build UPI link: {}", e);
                format!("upi://pay?am={}&cu={}", amount, self.config.currency)
            }
        }
    }

    pub fn appointment_uri(&self, booking_id: &str, fee: u32) -> String {
        self.upi_uri(fee, &format!("Doctor Appointment Fee - {}", booking_id))
    }

    pub fn tests_uri(&self, invoice_number: &str, total: u32) -> String {
        self.upi_uri(total, &format!("Diagnostic Tests - {}", invoice_number))
    }

    pub fn shorten(&self) -> String {
        format!("{}/{}", SHORT_LINK_HOST, ids::random_code(4))
    }

    /// Stand-in for the SMS gateway: the message only reaches the log.
    pub fn send_sms(&self, reference: &str, contact_number: &str, upi_uri: String) -> PaymentDispatch {
        log::info!("📱 SMS sent to +91{} with payment link: {}", contact_number, upi_uri);
        PaymentDispatch {
            reference: reference.to_string(),
            contact_number: contact_number.to_string(),
            upi_uri,
            short_link: self.shorten(),
        }
    }
}
