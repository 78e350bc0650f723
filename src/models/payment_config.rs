use serde::{Serialize, Deserialize};

/// Payee details embedded into every simulated UPI link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub upi_id: String,
    pub payee_name: String,
    pub currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            upi_id: "ajaychowdarys@ybl".to_string(),
            payee_name: "DoctorClinic".to_string(),
            currency: "INR".to_string(),
        }
    }
}
