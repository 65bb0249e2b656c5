//! Price Codec
//!
//! Decodes the upstream's compact time-series encoding into a clean,
//! chronological sequence of price points.
//!
//! The wire format per channel is a flat array of pairs:
//! `[minute0, price0, minute1, price1, ...]` where minutes count from the
//! Unix epoch and prices are integer hundredths of the currency unit.
//! A price of `-1` means "no observation at this timestamp".

use crate::{
    error::{Result, TrackerError},
    types::PricePoint,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Upstream "no observation" marker in every numeric price field.
pub const SENTINEL: i64 = -1;

/// Raw timestamps are minutes since the Unix epoch. The upstream epoch is
/// assumed to equal the Unix epoch; this constant is the only place the
/// unit conversion lives.
pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Primary price channel (marketplace-owned price).
const PRIMARY_CHANNEL: usize = 0;
/// Secondary price channel (third-party new-offer price), used to fill gaps.
const SECONDARY_CHANNEL: usize = 1;

/// Convert a raw minute-epoch timestamp to an absolute instant.
pub fn minutes_to_datetime(minutes: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(minutes.checked_mul(MILLIS_PER_MINUTE)?)
}

/// Convert a raw price in hundredths to a decimal amount.
///
/// Sentinel and negative values map to `None`; they must never surface as
/// numeric prices.
pub fn convert_raw_price(raw: i64) -> Option<Decimal> {
    if raw < 0 {
        return None;
    }
    Some(Decimal::new(raw, 2))
}

/// Decode one or more raw channels into an ordered price history.
///
/// Pairs are read from the primary channel; when the primary price is the
/// sentinel and the secondary channel has a real value at the same pair
/// index, the secondary value is substituted, otherwise the pair is skipped.
/// Points older than `retention_days` before `now` are dropped (cutoff
/// computed once per call). Output is sorted ascending by timestamp.
///
/// # Errors
/// `MalformedHistory` when a channel has odd length.
pub fn decode_history(
    channels: &[Vec<i64>],
    retention_days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<PricePoint>> {
    let secondary = channels.get(SECONDARY_CHANNEL);

    // Validate shape before any early return, so a malformed secondary is
    // reported even when the primary is empty or absent.
    for (idx, channel) in [channels.get(PRIMARY_CHANNEL), secondary]
        .into_iter()
        .flatten()
        .enumerate()
    {
        if channel.len() % 2 != 0 {
            return Err(TrackerError::MalformedHistory(format!(
                "channel {} has odd length {}",
                idx,
                channel.len()
            )));
        }
    }

    let Some(primary) = channels.get(PRIMARY_CHANNEL) else {
        return Ok(Vec::new());
    };
    if primary.is_empty() {
        return Ok(Vec::new());
    }

    let cutoff = now - Duration::days(retention_days);
    let mut points = Vec::with_capacity(primary.len() / 2);

    for pair in (0..primary.len()).step_by(2) {
        let raw_minutes = primary[pair];
        let mut raw_price = primary[pair + 1];

        if raw_price == SENTINEL {
            if let Some(value) = secondary.and_then(|ch| ch.get(pair + 1)) {
                if *value != SENTINEL {
                    raw_price = *value;
                }
            }
        }

        let Some(price) = convert_raw_price(raw_price) else {
            continue;
        };
        if raw_minutes <= 0 {
            tracing::debug!("skipping pair with non-positive timestamp {}", raw_minutes);
            continue;
        }
        let Some(timestamp) = minutes_to_datetime(raw_minutes) else {
            tracing::warn!("timestamp {} out of representable range", raw_minutes);
            continue;
        };
        if timestamp < cutoff {
            continue;
        }

        points.push(PricePoint { timestamp, price });
    }

    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}
