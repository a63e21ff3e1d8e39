//! Checkout hand-off: the cart is rendered as a pre-filled WhatsApp message.
//! There is no payment step; the shop confirms the order in the chat.

use std::fmt::Write as _;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::cart::Cart;

const WHATSAPP_BASE: &str = "https://wa.me/";

/// Unreserved characters per RFC 3986 stay as-is; everything else is encoded.
const MESSAGE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("whatsapp number '{0}' contains no digits")]
    InvalidNumber(String),
}

/// Formats an amount as `$1234.50`.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("${rounded:.2}")
}

/// Builds the order text sent to the shop.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] if the cart has no lines.
pub fn whatsapp_message(cart: &Cart, customer_note: Option<&str>) -> Result<String, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut text = String::from("¡Hola! Quiero hacer el siguiente pedido:\n\n");
    for item in cart.items() {
        let _ = write!(text, "• {} x {}", item.quantity, item.name);
        if let Some(sku) = item.sku.as_deref() {
            let _ = write!(text, " (SKU {sku})");
        }
        let _ = writeln!(text, " - {}", format_amount(item.line_total()));
    }
    let _ = write!(
        text,
        "\nTotal: {} ({} artículos)",
        format_amount(cart.total()),
        cart.count()
    );

    if let Some(note) = customer_note.map(str::trim).filter(|n| !n.is_empty()) {
        let _ = write!(text, "\n\nNota: {note}");
    }

    Ok(text)
}

/// Builds a `wa.me` link that opens a chat with `number` pre-filled with `message`.
///
/// # Errors
///
/// Returns [`CheckoutError::InvalidNumber`] if `number` has no digits.
pub fn whatsapp_url(number: &str, message: &str) -> Result<String, CheckoutError> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(CheckoutError::InvalidNumber(number.to_owned()));
    }
    let encoded = utf8_percent_encode(message, MESSAGE_ENCODE_SET);
    Ok(format!("{WHATSAPP_BASE}{digits}?text={encoded}"))
}
