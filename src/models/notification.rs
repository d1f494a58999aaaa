//! Payment notification payload.
//!
//! Sent to the account owner after a card payment has been committed.
//! It only ever carries the last four digits of the card number.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentNotification {
    /// Destination e-mail address
    pub to: String,

    /// Recipient display name
    pub name: String,

    pub card_last4: String,
    pub amount: Decimal,
    pub balance: Decimal,
    pub currency: String,
    pub date: DateTime<Utc>,
}

impl PaymentNotification {
    pub fn subject(&self) -> String {
        format!("Payment of {} {} completed", self.amount.round_dp(2), self.currency)
    }

    /// HTML body of the notification e-mail.
    pub fn html(&self) -> String {
        format!(
            "<h2>Payment completed</h2>\
             <p>Hello, {name}</p>\
             <p>Card <strong>**** **** **** {last4}</strong> was charged \
             <strong>{amount:.2} {currency}</strong></p>\
             <p>New balance: {balance:.2} {currency}</p>\
             <p>Date: {date}</p>",
            name = self.name,
            last4 = self.card_last4,
            amount = self.amount,
            balance = self.balance,
            currency = self.currency,
            date = self.date.format("%d.%m.%Y %H:%M"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn body_shows_masked_card_and_amounts() {
        let notification = PaymentNotification {
            to: "alice@example.com".to_string(),
            name: "alice".to_string(),
            card_last4: "5678".to_string(),
            amount: Decimal::from_str("120").unwrap(),
            balance: Decimal::from_str("380.5").unwrap(),
            currency: "RUB".to_string(),
            date: Utc::now(),
        };

        let html = notification.html();
        assert!(html.contains("**** **** **** 5678"));
        assert!(html.contains("120.00 RUB"));
        assert!(html.contains("380.50 RUB"));
        assert_eq!(notification.subject(), "Payment of 120 RUB completed");
    }
}
