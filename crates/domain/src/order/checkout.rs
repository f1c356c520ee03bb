//! Checkout input validation and cart-to-order planning.

use common::{BookId, CartItemId, Money};
use serde::{Deserialize, Serialize};

use super::{OrderLine, OrderStatus, PaymentMethod};
use crate::error::{CommerceError, StockShortfall};

/// Checkout form as submitted by the client. Every field is optional here so
/// that missing input is reported as a validation error rather than a parse
/// failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub payment_method: Option<String>,
    /// Proof-of-payment image, usually a base64 data URL.
    pub payment_screenshot: Option<String>,
}

/// Contact and shipping details snapshotted onto an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub shipping_address: String,
    /// Same as the shipping address unless the customer gave another one.
    pub billing_address: String,
    pub city: String,
    pub zip_code: String,
}

/// A validated checkout, ready to be turned into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub contact: ContactDetails,
    pub payment_method: PaymentMethod,
    /// Present iff the method is `screenshot`.
    pub payment_screenshot: Option<String>,
}

impl OrderDraft {
    pub fn initial_status(&self) -> OrderStatus {
        self.payment_method.initial_status()
    }
}

/// The details a returning customer last checked out with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingInfo {
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub payment_method: PaymentMethod,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts `local@domain.tld`-shaped addresses: one `@`, no whitespace, and a
/// dot inside the domain part.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

impl CheckoutForm {
    /// Checks required fields, email shape and the screenshot requirement.
    pub fn validate(self) -> Result<OrderDraft, CommerceError> {
        let full_name = present(self.full_name);
        let email = present(self.email);
        let phone_number = present(self.phone_number);
        let shipping_address = present(self.shipping_address);
        let city = present(self.city);

        let (
            Some(full_name),
            Some(email),
            Some(phone_number),
            Some(shipping_address),
            Some(city),
        ) = (full_name, email, phone_number, shipping_address, city)
        else {
            return Err(CommerceError::Validation(
                "Full name, email, phone number, shipping address, and city are required"
                    .to_string(),
            ));
        };

        if !is_valid_email(&email) {
            return Err(CommerceError::Validation(
                "Valid email address is required".to_string(),
            ));
        }

        let payment_method = match present(self.payment_method) {
            Some(method) => method.parse()?,
            None => PaymentMethod::default(),
        };

        let payment_screenshot = match payment_method {
            PaymentMethod::Screenshot => Some(present(self.payment_screenshot).ok_or_else(|| {
                CommerceError::Validation(
                    "Payment screenshot is required for screenshot verification".to_string(),
                )
            })?),
            PaymentMethod::Cash => None,
        };

        let billing_address =
            present(self.billing_address).unwrap_or_else(|| shipping_address.clone());

        Ok(OrderDraft {
            contact: ContactDetails {
                full_name,
                email,
                phone_number,
                shipping_address,
                billing_address,
                city,
                zip_code: present(self.zip_code).unwrap_or_default(),
            },
            payment_method,
            payment_screenshot,
        })
    }
}

/// A cart row read under lock together with its book's stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedCartLine {
    pub cart_item_id: CartItemId,
    pub book_id: BookId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: u32,
    /// On-hand stock counter.
    pub on_hand: u32,
    /// Quantity held by other unpaid open orders.
    pub reserved: u32,
}

impl LockedCartLine {
    pub fn available(&self) -> u32 {
        self.on_hand.saturating_sub(self.reserved)
    }
}

/// Order lines and total derived from a locked cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<OrderLine>,
    pub total: Money,
}

/// Turns locked cart rows into order lines.
///
/// Prices are the ones read under lock and become the order's snapshot.
/// Fails with `EmptyCart` for an empty cart, or `InsufficientStock` listing
/// every line whose quantity exceeds what is available.
pub fn plan_checkout(lines: &[LockedCartLine]) -> Result<CheckoutPlan, CommerceError> {
    if lines.is_empty() {
        return Err(CommerceError::EmptyCart);
    }

    let shortfalls: Vec<StockShortfall> = lines
        .iter()
        .filter(|line| line.quantity > line.available())
        .map(|line| StockShortfall {
            book_id: line.book_id,
            title: line.title.clone(),
            requested: line.quantity,
            available: line.available(),
        })
        .collect();
    if !shortfalls.is_empty() {
        return Err(CommerceError::InsufficientStock(shortfalls));
    }

    let lines: Vec<OrderLine> = lines
        .iter()
        .map(|line| OrderLine {
            book_id: line.book_id,
            title: line.title.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        })
        .collect();
    let total = lines
        .iter()
        .try_fold(Money::zero(), |total, line| {
            line.unit_price
                .checked_multiply(line.quantity)
                .and_then(|line_total| total.checked_add(line_total))
        })
        .ok_or_else(|| CommerceError::Validation("Order total is too large".to_string()))?;

    Ok(CheckoutPlan { lines, total })
}
