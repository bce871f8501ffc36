//! Conversion between human token amounts and base units.

use crate::error::ClientError;

pub const DEFAULT_DECIMALS: u8 = 9;

/// Largest decimals value whose scale factor fits in a `u64`.
const MAX_DECIMALS: u8 = 19;

fn scale(decimals: u8) -> Result<u64, ClientError> {
    if decimals > MAX_DECIMALS {
        return Err(ClientError::InvalidAmount(format!(
            "decimals {decimals} exceeds {MAX_DECIMALS}"
        )));
    }
    Ok(10u64.pow(u32::from(decimals)))
}

/// `round(amount * 10^decimals)`. Rejects negative, non-finite and
/// unrepresentable amounts.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<u64, ClientError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ClientError::InvalidAmount(format!("{amount} is not a valid amount")));
    }
    let scaled = (amount * scale(decimals)? as f64).round();
    // u64::MAX as f64 rounds up to 2^64.
    if scaled >= u64::MAX as f64 {
        return Err(ClientError::InvalidAmount(format!(
            "{amount} with {decimals} decimals overflows u64"
        )));
    }
    Ok(scaled as u64)
}

/// `units / 10^decimals`. Precision is limited to what an `f64` holds.
pub fn from_base_units(units: u64, decimals: u8) -> f64 {
    units as f64 / 10f64.powi(i32::from(decimals))
}

/// Exact decimal rendering of `units`, trailing zeros trimmed.
pub fn format_base_units(units: u64, decimals: u8) -> String {
    let decimals = usize::from(decimals);
    let digits = format!("{units:0>width$}", width = decimals + 1);
    let (whole, frac) = digits.split_at(digits.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    }
}
