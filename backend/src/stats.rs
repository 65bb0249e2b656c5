//! Statistics Engine
//!
//! Computes windowed aggregates (30/90/180 days) from a decoded price
//! history and resolves a "current price" from the upstream's pre-aggregated
//! stats block, falling back to the freshest history point.

use crate::{
    history::convert_raw_price,
    types::{PricePoint, PriceStats, RawStats},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Trailing windows, in days, over which aggregates are computed.
const WINDOWS: [i64; 3] = [30, 90, 180];

/// How many leading entries of the upstream `current` array participate in
/// current-price resolution (marketplace price, then new-offer price).
const CURRENT_CHANNELS: usize = 2;

/// Compute windowed min/avg/max and the resolved current price.
///
/// Windows are anchored at `fetched_at` rather than wall-clock "now" so the
/// stats stay consistent with the history decoded in the same fetch. Empty
/// windows yield `None`.
pub fn compute_stats(
    history: &[PricePoint],
    upstream: Option<&RawStats>,
    fetched_at: DateTime<Utc>,
) -> PriceStats {
    let [w30, w90, w180] = WINDOWS.map(|days| window_aggregate(history, days, fetched_at));

    PriceStats {
        current: resolve_current(history, upstream),
        avg30: w30.avg,
        avg90: w90.avg,
        avg180: w180.avg,
        min30: w30.min,
        min90: w90.min,
        min180: w180.min,
        max30: w30.max,
        max90: w90.max,
        max180: w180.max,
    }
}

struct WindowAggregate {
    min: Option<Decimal>,
    max: Option<Decimal>,
    avg: Option<Decimal>,
}

fn window_aggregate(history: &[PricePoint], days: i64, fetched_at: DateTime<Utc>) -> WindowAggregate {
    let cutoff = fetched_at - Duration::days(days);
    let mut min: Option<Decimal> = None;
    let mut max: Option<Decimal> = None;
    let mut sum = Decimal::ZERO;
    let mut count = 0u32;

    for point in history.iter().filter(|p| p.timestamp >= cutoff) {
        min = Some(min.map_or(point.price, |m| m.min(point.price)));
        max = Some(max.map_or(point.price, |m| m.max(point.price)));
        sum += point.price;
        count += 1;
    }

    let avg = (count > 0).then(|| {
        (sum / Decimal::from(count))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    });

    WindowAggregate { min, max, avg }
}

/// Resolve the current price by channel preference.
///
/// The upstream `current` array is positionally indexed like the history
/// channels; the first non-sentinel entry among the leading channels wins.
/// When the upstream offers nothing, the most recent history point stands in.
fn resolve_current(history: &[PricePoint], upstream: Option<&RawStats>) -> Option<Decimal> {
    let from_upstream = upstream
        .and_then(|s| s.current.as_ref())
        .and_then(|channels| {
            channels
                .iter()
                .take(CURRENT_CHANNELS)
                .find_map(|raw| convert_raw_price(*raw))
        });

    from_upstream.or_else(|| history.last().map(|p| p.price))
}
