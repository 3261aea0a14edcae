//! Core data model: trade intents, cached positions, execution reports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::broker::gateway::PositionSnapshot;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Bought position, profits when price rises.
    Long,
    /// Sold position, profits when price falls.
    Short,
}

impl Side {
    /// The side that closes a position of this side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

/// Caller-requested action for a trade intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    /// Open (or add to) a long position.
    Buy,
    /// Open (or add to) a short position.
    Sell,
    /// Close the position whose ticket is carried in `magic`.
    Close,
}

impl TradeAction {
    /// Position side opened by this action, if it opens one.
    #[must_use]
    pub const fn side(self) -> Option<Side> {
        match self {
            Self::Buy => Some(Side::Long),
            Self::Sell => Some(Side::Short),
            Self::Close => None,
        }
    }
}

/// How the order should be worked by the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Fill immediately at the current market price.
    #[default]
    Market,
    /// Rest as a pending order at the caller-supplied price.
    Limit,
}

/// A caller's abstract trade request, before validation and adjustment.
///
/// Price-like fields follow the terminal's convention: `0` means unset
/// (`price == 0` on a market order means "use the current quote").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    /// Instrument name as supplied by the caller (may include `/` separators
    /// or the wrong case; resolved against the broker before use).
    pub symbol: String,
    /// Requested action.
    pub action: TradeAction,
    /// Requested volume in lots.
    pub volume: Decimal,
    /// Market or limit execution.
    #[serde(rename = "order_type", default)]
    pub kind: OrderKind,
    /// Entry price; 0 means current market.
    #[serde(default)]
    pub price: Decimal,
    /// Stop-loss level; 0 means none.
    #[serde(default)]
    pub stop_loss: Decimal,
    /// Single take-profit level; 0 means none. Superseded by `tp1` when set.
    #[serde(default)]
    pub take_profit: Decimal,
    /// First take-profit leg; 0 means none.
    #[serde(default)]
    pub tp1: Decimal,
    /// Second take-profit leg; 0 means none. Together with `tp1` this splits
    /// the intent into two half-volume orders.
    #[serde(default)]
    pub tp2: Decimal,
    /// Free-text tag attached to every resulting order.
    #[serde(default = "default_comment")]
    pub comment: String,
    /// Caller correlation tag; for `close` actions this is the target ticket.
    #[serde(default)]
    pub magic: i64,
}

fn default_comment() -> String {
    "terminal-bridge".to_string()
}

impl TradeIntent {
    /// Whether this intent requests the two-leg take-profit split.
    #[must_use]
    pub fn wants_split(&self) -> bool {
        self.tp1 > Decimal::ZERO && self.tp2 > Decimal::ZERO
    }
}

/// One broker-reported open position as last observed locally.
///
/// Records are owned by the position cache: they are created, replaced and
/// deleted only by reconciliation passes, never by request-handling code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRecord {
    /// Broker-assigned unique id, immutable for the life of the position.
    pub ticket: u64,
    /// Canonical tradable symbol.
    pub symbol: String,
    /// Open volume in lots.
    pub volume: Decimal,
    /// Position direction.
    pub side: Side,
    /// Fill price at open.
    pub open_price: Decimal,
    /// Stop-loss level; 0 means unset.
    pub stop_loss: Decimal,
    /// Take-profit level; 0 means unset.
    pub take_profit: Decimal,
    /// Correlation tag carried from the opening order.
    pub magic: i64,
    /// Free-text comment carried from the opening order.
    pub comment: String,
    /// When a reconciliation pass last touched this ticket.
    pub last_observed_at: DateTime<Utc>,
}

impl PositionRecord {
    /// Build a record from a freshly fetched terminal snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &PositionSnapshot, observed_at: DateTime<Utc>) -> Self {
        Self {
            ticket: snapshot.ticket,
            symbol: snapshot.symbol.clone(),
            volume: snapshot.volume,
            side: snapshot.side,
            open_price: snapshot.open_price,
            stop_loss: snapshot.stop_loss,
            take_profit: snapshot.take_profit,
            magic: snapshot.magic,
            comment: snapshot.comment.clone(),
            last_observed_at: observed_at,
        }
    }
}

/// A cached position paired with the freshest quote available for it.
#[derive(Debug, Clone, Serialize)]
pub struct QuotedPosition {
    /// The cached record.
    pub position: PositionRecord,
    /// Closing-side price at listing time (bid for longs, ask for shorts);
    /// `None` when the quote could not be fetched.
    pub current_price: Option<Decimal>,
}

/// One broker submission that succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedLeg {
    /// Ticket assigned by the broker.
    pub ticket: u64,
    /// Volume actually filled or resting.
    pub volume: Decimal,
    /// Fill or resting price.
    pub price: Decimal,
    /// Correlation tag this leg was submitted under.
    pub magic: i64,
}

/// Accumulated profit figures copied from a closed position's last snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedPnl {
    /// Floating profit at close time.
    pub profit: Decimal,
    /// Accumulated commission.
    pub commission: Decimal,
    /// Accumulated swap.
    pub swap: Decimal,
}

/// Outcome of a successful trade, close or modify operation.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// Every broker submission that succeeded, in submission order.
    pub legs: Vec<ExecutedLeg>,
    /// Profit figures when the operation closed a position.
    pub closed: Option<ClosedPnl>,
    /// Error from a failed second split leg. The operation still succeeded
    /// for the first leg; the live position is not rolled back.
    pub partial_error: Option<String>,
}

impl ExecutionReport {
    /// Build a report for a single successful leg.
    #[must_use]
    pub fn single(leg: ExecutedLeg) -> Self {
        Self {
            legs: vec![leg],
            closed: None,
            partial_error: None,
        }
    }

    /// Ticket of the first (primary) leg.
    #[must_use]
    pub fn ticket(&self) -> Option<u64> {
        self.legs.first().map(|leg| leg.ticket)
    }

    /// Whether a split leg failed after the first leg succeeded.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.partial_error.is_some()
    }
}
