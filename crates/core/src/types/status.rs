//! Status enums for users, orders and payments.

use serde::{Deserialize, Serialize};

/// Account role as reported by the backend (`USER`, `ADMIN`, `SUPER_ADMIN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Lowercase form written to the role cookie (`user`, `admin`, `super_admin`).
    #[must_use]
    pub const fn cookie_value(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Whether the role may use the admin back-office.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cookie_value())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    /// Accepts either the wire form (`SUPER_ADMIN`) or the cookie form (`super_admin`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Delivered orders are the only ones customers can review.
    #[must_use]
    pub const fn is_reviewable(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Payment status recorded on an order by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
    PartiallyRefunded,
}

/// Status of a payment intent as reported by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    RequiresCapture,
    Canceled,
}

impl PaymentIntentStatus {
    /// Whether the processor may still move the intent to another state.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::Processing | Self::RequiresConfirmation | Self::RequiresAction
        )
    }

    /// Message shown to the shopper after returning from the processor.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Succeeded => "Payment succeeded!",
            Self::Processing => "Your payment is processing.",
            Self::RequiresPaymentMethod => {
                "Your payment was not successful, please try again."
            }
            _ => "Something went wrong.",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_and_cookie_forms() {
        let role: Role = serde_json::from_str("\"SUPER_ADMIN\"").unwrap();
        assert_eq!(role, Role::SuperAdmin);
        assert_eq!(role.cookie_value(), "super_admin");
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_payment_intent_status_from_processor() {
        let status: PaymentIntentStatus =
            serde_json::from_str("\"requires_payment_method\"").unwrap();
        assert_eq!(status, PaymentIntentStatus::RequiresPaymentMethod);
        assert!(!status.is_pending());
        assert!(PaymentIntentStatus::Processing.is_pending());
    }
}
