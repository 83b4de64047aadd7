use lightning_invoice::Bolt11Invoice;
use std::str::FromStr;

use crate::error::{CashuError, Result};
use crate::nuts::MintQuoteResponse;

/// Expiry checks underestimate by this many seconds
const EXPIRY_SLACK_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedBolt11 {
    pub amount_sat: Option<u64>,
    pub expiry_unix_seconds: Option<u64>,
}

pub fn decode_bolt11(invoice: &str) -> Result<DecodedBolt11> {
    let invoice = Bolt11Invoice::from_str(invoice.trim())
        .map_err(|e| CashuError::InvalidInvoice(e.to_string()))?;

    Ok(DecodedBolt11 {
        amount_sat: invoice.amount_milli_satoshis().map(|msat| msat / 1000),
        expiry_unix_seconds: invoice.expires_at().map(|d| d.as_secs()),
    })
}

/// Whether a mint quote or its invoice has expired as of `now_unix` (seconds).
/// An invoice that cannot be decoded only counts via the quote's own expiry.
pub fn is_mint_quote_expired(quote: &MintQuoteResponse, now_unix: u64) -> bool {
    let threshold = now_unix.saturating_sub(EXPIRY_SLACK_SECS);

    if matches!(quote.expiry, Some(expiry) if expiry < threshold) {
        return true;
    }

    match decode_bolt11(&quote.request) {
        Ok(decoded) => matches!(decoded.expiry_unix_seconds, Some(expiry) if expiry < threshold),
        Err(e) => {
            log::debug!("Could not decode invoice for quote {}: {}", quote.quote, e);
            false
        }
    }
}

/// Human readable amount for a unit
pub fn format_amount(unit: &str, amount: u64) -> String {
    match unit {
        "sat" => format!("{} sats", group_thousands(amount)),
        "usd" => format!("${}.{:02}", amount / 100, amount % 100),
        "eur" => format!("{}.{:02} €", amount / 100, amount % 100),
        other => format!("{} {}", amount, other),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
