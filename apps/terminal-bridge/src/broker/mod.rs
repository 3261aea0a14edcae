//! Terminal gateway port and submission retry policy.

pub mod gateway;
pub mod retry;

pub use gateway::{
    AccountSnapshot, BrokerGateway, GatewayError, OrderReport, OrderRequest, OrderSide,
    PendingOrder, PositionSnapshot, RequestAction, SymbolMeta, TerminalStatus, Tick, RETCODE_DONE,
};
pub use retry::{BackoffSchedule, VerifyRetryPolicy};
