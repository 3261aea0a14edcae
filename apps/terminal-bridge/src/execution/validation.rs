//! Trade validation and adjustment against broker constraints.
//!
//! Pure adjustment logic: volume is clamped into the instrument's tradable
//! range and stop/take-profit levels are pushed out to the broker's minimum
//! distance from the reference price. The reference price is fetched once
//! per validation by the caller so every distance check sees the same quote.
//! Adjustments are diagnostic-logged but never fail the intent.

use rust_decimal::Decimal;
use tracing::warn;

use crate::broker::gateway::SymbolMeta;
use crate::models::{Side, TradeIntent};

/// An intent after volume and distance adjustment. Zero still means unset
/// for every price level.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedIntent {
    /// Volume clamped to the instrument's tradable range.
    pub volume: Decimal,
    /// Stop-loss pushed to at least the minimum distance; 0 means none.
    pub stop_loss: Decimal,
    /// Single take-profit level; 0 means none.
    pub take_profit: Decimal,
    /// First split take-profit level; 0 means none.
    pub tp1: Decimal,
    /// Second split take-profit level; 0 means none.
    pub tp2: Decimal,
}

impl AdjustedIntent {
    /// The take-profit used on the single-leg path: `tp1` wins over the
    /// plain level when both are set.
    #[must_use]
    pub fn single_take_profit(&self) -> Decimal {
        if self.tp1 > Decimal::ZERO {
            self.tp1
        } else {
            self.take_profit
        }
    }
}

/// Minimum stop distance the broker enforces for this instrument.
///
/// Brokers that publish a zero stops level still reject stops placed at the
/// market, so a 10-point floor stands in.
#[must_use]
pub fn min_stop_distance(meta: &SymbolMeta) -> Decimal {
    let distance = Decimal::from(meta.stops_level) * meta.point;
    if distance.is_zero() {
        Decimal::from(10) * meta.point
    } else {
        distance
    }
}

/// Clamp a requested volume into the instrument's tradable range.
#[must_use]
pub fn clamp_volume(volume: Decimal, meta: &SymbolMeta) -> Decimal {
    if volume < meta.min_volume {
        warn!(requested = %volume, adjusted = %meta.min_volume, "volume below instrument minimum, clamped");
        meta.min_volume
    } else if volume > meta.max_volume {
        warn!(requested = %volume, adjusted = %meta.max_volume, "volume above instrument maximum, clamped");
        meta.max_volume
    } else {
        volume
    }
}

/// Push a stop-loss out to the minimum distance from the reference price.
/// A zero level stays unset.
#[must_use]
pub fn adjust_stop_loss(
    side: Side,
    stop_loss: Decimal,
    reference: Decimal,
    distance: Decimal,
) -> Decimal {
    if stop_loss <= Decimal::ZERO {
        return stop_loss;
    }

    let floor = match side {
        Side::Long => {
            if stop_loss < reference - distance {
                return stop_loss;
            }
            reference - distance
        }
        Side::Short => {
            if stop_loss > reference + distance {
                return stop_loss;
            }
            reference + distance
        }
    };

    warn!(requested = %stop_loss, adjusted = %floor, "stop loss inside minimum distance, adjusted");
    floor
}

/// Push a take-profit level out to the minimum distance from the reference
/// price. A zero level stays unset.
#[must_use]
pub fn adjust_take_profit(
    side: Side,
    level: Decimal,
    reference: Decimal,
    distance: Decimal,
) -> Decimal {
    if level <= Decimal::ZERO {
        return level;
    }

    let floor = match side {
        Side::Long => {
            if level > reference + distance {
                return level;
            }
            reference + distance
        }
        Side::Short => {
            if level < reference - distance {
                return level;
            }
            reference - distance
        }
    };

    warn!(requested = %level, adjusted = %floor, "take profit inside minimum distance, adjusted");
    floor
}

/// Apply every adjustment rule to an intent, in order: volume clamp, then
/// stop-loss, then each take-profit candidate independently.
#[must_use]
pub fn adjust(
    intent: &TradeIntent,
    side: Side,
    meta: &SymbolMeta,
    reference_price: Decimal,
) -> AdjustedIntent {
    let distance = min_stop_distance(meta);

    AdjustedIntent {
        volume: clamp_volume(intent.volume, meta),
        stop_loss: adjust_stop_loss(side, intent.stop_loss, reference_price, distance),
        take_profit: adjust_take_profit(side, intent.take_profit, reference_price, distance),
        tp1: adjust_take_profit(side, intent.tp1, reference_price, distance),
        tp2: adjust_take_profit(side, intent.tp2, reference_price, distance),
    }
}
