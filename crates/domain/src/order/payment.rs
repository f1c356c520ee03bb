use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::error::CommerceError;

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cash,
    /// Bank transfer proven by an uploaded screenshot, reviewed by an admin.
    #[default]
    Screenshot,
}

impl PaymentMethod {
    /// The status a freshly placed order starts in.
    pub fn initial_status(&self) -> OrderStatus {
        match self {
            PaymentMethod::Cash => OrderStatus::Pending,
            PaymentMethod::Screenshot => OrderStatus::PendingVerification,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Screenshot => "screenshot",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "screenshot" => Ok(PaymentMethod::Screenshot),
            other => Err(CommerceError::Validation(format!(
                "Invalid payment method '{other}'. Use 'cash' or 'screenshot'"
            ))),
        }
    }
}

/// An admin's decision on a screenshot payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationAction {
    Approve,
    Reject,
}

impl VerificationAction {
    pub fn target_status(&self) -> OrderStatus {
        match self {
            VerificationAction::Approve => OrderStatus::Paid,
            VerificationAction::Reject => OrderStatus::PaymentRejected,
        }
    }
}

impl std::str::FromStr for VerificationAction {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(VerificationAction::Approve),
            "reject" => Ok(VerificationAction::Reject),
            _ => Err(CommerceError::Validation(
                "Invalid action. Use 'approve' or 'reject'".to_string(),
            )),
        }
    }
}
