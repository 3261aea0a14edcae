//! Broker gateway port.
//!
//! The only channel to the trading terminal. The bridge core consumes this
//! abstract capability set; concrete transports (in-process terminal API,
//! RPC shim, test double) implement it. Every call returns a typed result so
//! failure handling lives in the type system, not in string inspection.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{OrderKind, Side};

/// Retcode the terminal reports for an accepted request.
pub const RETCODE_DONE: u32 = 10009;

/// Failure of a single gateway call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The terminal is not reachable or refused the session.
    #[error("terminal unavailable: {message}")]
    Unavailable {
        /// Failure details.
        message: String,
    },

    /// The call reached the terminal but failed in transport or decoding.
    #[error("gateway call failed: {message}")]
    Transport {
        /// Failure details.
        message: String,
    },
}

/// Connectivity and permission state of the terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TerminalStatus {
    /// Terminal is connected to its trade server.
    pub connected: bool,
    /// Algorithmic trading is permitted (not read-only, toggle enabled).
    pub trade_allowed: bool,
}

/// Read-only projection of broker account state. Always fetched fresh,
/// never cached locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account balance.
    pub balance: Decimal,
    /// Account equity.
    pub equity: Decimal,
    /// Margin currently in use.
    pub margin: Decimal,
    /// Free margin.
    pub free_margin: Decimal,
    /// Deposit currency.
    pub currency: String,
    /// Account leverage.
    pub leverage: u32,
}

/// Trading constraints the broker enforces for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMeta {
    /// Smallest tradable volume in lots.
    pub min_volume: Decimal,
    /// Largest tradable volume in lots.
    pub max_volume: Decimal,
    /// Price increment of one point.
    pub point: Decimal,
    /// Minimum stop distance in points; 0 means the broker publishes none.
    pub stops_level: u32,
    /// Units per lot.
    pub contract_size: Decimal,
}

/// Current top-of-book quote for one instrument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tick {
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
}

/// Direction of an order submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy at the ask.
    Buy,
    /// Sell at the bid.
    Sell,
}

impl OrderSide {
    /// The submission side that opens a position of the given side.
    #[must_use]
    pub const fn opening(side: Side) -> Self {
        match side {
            Side::Long => Self::Buy,
            Side::Short => Self::Sell,
        }
    }

    /// The submission side that closes a position of the given side.
    #[must_use]
    pub const fn closing(side: Side) -> Self {
        match side {
            Side::Long => Self::Sell,
            Side::Short => Self::Buy,
        }
    }
}

/// What the terminal should do with an [`OrderRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    /// Execute a deal at market immediately.
    Deal,
    /// Place a pending order at the given price.
    Pending,
    /// Replace the stop-loss/take-profit levels of a live position.
    ModifyStops,
}

/// One order submission to the terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Kind of request.
    pub action: RequestAction,
    /// Canonical tradable symbol.
    pub symbol: String,
    /// Submission direction.
    pub side: OrderSide,
    /// Volume in lots.
    pub volume: Decimal,
    /// Execution or resting price.
    pub price: Decimal,
    /// Stop-loss level to attach; `None` leaves it unset.
    pub stop_loss: Option<Decimal>,
    /// Take-profit level to attach; `None` leaves it unset.
    pub take_profit: Option<Decimal>,
    /// Ticket of the position this request targets (close, modify).
    pub position: Option<u64>,
    /// Correlation tag.
    pub magic: i64,
    /// Free-text comment.
    pub comment: String,
}

impl OrderRequest {
    /// A market deal opening a new position.
    #[must_use]
    pub fn market(
        symbol: &str,
        side: OrderSide,
        volume: Decimal,
        price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        magic: i64,
        comment: String,
    ) -> Self {
        Self {
            action: RequestAction::Deal,
            symbol: symbol.to_string(),
            side,
            volume,
            price,
            stop_loss,
            take_profit,
            position: None,
            magic,
            comment,
        }
    }

    /// A pending limit order resting at `price`.
    #[must_use]
    pub fn pending_limit(
        symbol: &str,
        side: OrderSide,
        volume: Decimal,
        price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        magic: i64,
        comment: String,
    ) -> Self {
        Self {
            action: RequestAction::Pending,
            symbol: symbol.to_string(),
            side,
            volume,
            price,
            stop_loss,
            take_profit,
            position: None,
            magic,
            comment,
        }
    }

    /// A market deal closing the position `ticket`.
    #[must_use]
    pub fn close(
        symbol: &str,
        side: OrderSide,
        volume: Decimal,
        price: Decimal,
        ticket: u64,
        magic: i64,
    ) -> Self {
        Self {
            action: RequestAction::Deal,
            symbol: symbol.to_string(),
            side,
            volume,
            price,
            stop_loss: None,
            take_profit: None,
            position: Some(ticket),
            magic,
            comment: "Close by signal".to_string(),
        }
    }

    /// A stop-level replacement for the position `ticket`.
    #[must_use]
    pub fn modify_stops(
        symbol: &str,
        ticket: u64,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        magic: i64,
    ) -> Self {
        Self {
            action: RequestAction::ModifyStops,
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            volume: Decimal::ZERO,
            price: Decimal::ZERO,
            stop_loss,
            take_profit,
            position: Some(ticket),
            magic,
            comment: String::new(),
        }
    }
}

/// The terminal's answer to an order submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReport {
    /// Numeric return code; [`RETCODE_DONE`] means accepted.
    pub retcode: u32,
    /// Ticket assigned to the resulting order or position.
    pub ticket: u64,
    /// Volume filled or resting.
    pub volume: Decimal,
    /// Fill or resting price.
    pub price: Decimal,
    /// The terminal's comment on the result.
    pub comment: String,
}

impl OrderReport {
    /// Whether the terminal accepted the request.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.retcode == RETCODE_DONE
    }
}

/// One open position as reported by the terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Broker-assigned ticket.
    pub ticket: u64,
    /// Tradable symbol.
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
    /// Correlation tag from the opening order.
    pub magic: i64,
    /// Comment from the opening order.
    pub comment: String,
    /// Floating profit.
    pub profit: Decimal,
    /// Accumulated commission.
    pub commission: Decimal,
    /// Accumulated swap.
    pub swap: Decimal,
}

/// One pending (not yet filled) order as reported by the terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Broker-assigned ticket.
    pub ticket: u64,
    /// Tradable symbol.
    pub symbol: String,
    /// Requested volume in lots.
    pub volume: Decimal,
    /// Submission direction.
    pub side: OrderSide,
    /// Order kind.
    pub kind: OrderKind,
    /// Resting price.
    pub price: Decimal,
    /// Stop-loss level; 0 means unset.
    pub stop_loss: Decimal,
    /// Take-profit level; 0 means unset.
    pub take_profit: Decimal,
    /// Correlation tag.
    pub magic: i64,
    /// Free-text comment.
    pub comment: String,
}

/// Port for the trading terminal.
///
/// `list_positions` distinguishes an explicit empty book (`Some(vec![])`)
/// from the terminal's ambiguous "no data" reply (`None`); callers must
/// treat `None` as a transient failure, never as "everything closed".
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Open a terminal session.
    async fn connect(&self) -> Result<(), GatewayError>;

    /// Tear down the terminal session.
    async fn disconnect(&self) -> Result<(), GatewayError>;

    /// Lightweight liveness and permission probe.
    async fn terminal_status(&self) -> Result<TerminalStatus, GatewayError>;

    /// Fresh account projection.
    async fn account_snapshot(&self) -> Result<AccountSnapshot, GatewayError>;

    /// Activate a symbol; `Ok(false)` when the name is not tradable here.
    async fn select_symbol(&self, name: &str) -> Result<bool, GatewayError>;

    /// Trading constraints for a symbol.
    async fn symbol_meta(&self, name: &str) -> Result<SymbolMeta, GatewayError>;

    /// Current quote for a symbol.
    async fn tick(&self, name: &str) -> Result<Tick, GatewayError>;

    /// Submit one order request.
    async fn send_order(&self, request: OrderRequest) -> Result<OrderReport, GatewayError>;

    /// Open positions, optionally filtered to a single ticket. `None` means
    /// the terminal returned no data (transient), not an empty book.
    async fn list_positions(
        &self,
        ticket: Option<u64>,
    ) -> Result<Option<Vec<PositionSnapshot>>, GatewayError>;

    /// Pending orders currently resting at the terminal.
    async fn list_pending_orders(&self) -> Result<Vec<PendingOrder>, GatewayError>;
}
