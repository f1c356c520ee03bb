use serde::{Deserialize, Serialize};

/// A price or order total in integer cents.
///
/// Prices are stored and summed as cents; the two-decimal string form only
/// exists at the HTTP boundary.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Unit price times quantity, clamped to the representable range.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Unit price times quantity, or `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// `"20.00"`-style rendering used in API responses.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// `$20.50`, as shown in notification text.
impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let decimal = self.to_decimal_string();
        match decimal.strip_prefix('-') {
            Some(abs) => write!(f, "-${abs}"),
            None => write!(f, "${decimal}"),
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_string_pads_cents() {
        assert_eq!(Money::from_dollars(20).to_decimal_string(), "20.00");
        assert_eq!(Money::from_cents(1999).to_decimal_string(), "19.99");
        assert_eq!(Money::from_cents(5).to_decimal_string(), "0.05");
        assert_eq!(Money::from_cents(-50).to_decimal_string(), "-0.50");
    }

    #[test]
    fn display_adds_currency_sign() {
        assert_eq!(Money::from_cents(2050).to_string(), "$20.50");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn order_total_is_sum_of_line_totals() {
        let lines = [(Money::from_cents(1000), 2), (Money::from_cents(250), 3)];
        let total: Money = lines.iter().map(|(unit, qty)| unit.multiply(*qty)).sum();
        assert_eq!(total.cents(), 2750);
    }

    #[test]
    fn overflow_is_detected_not_wrapped() {
        let huge = Money::from_cents(i64::MAX / 2);
        assert_eq!(huge.checked_multiply(3), None);
        assert_eq!(huge.checked_add(huge).map(|m| m.cents()), Some(i64::MAX - 1));
        assert_eq!(huge.checked_add(Money::from_cents(i64::MAX)), None);

        assert_eq!(huge.multiply(3).cents(), i64::MAX);
        assert_eq!((huge + huge + huge).cents(), i64::MAX);
    }

    #[test]
    fn serializes_as_bare_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(2000)).unwrap(), "2000");
    }
}
