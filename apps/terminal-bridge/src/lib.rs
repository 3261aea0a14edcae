// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::default_trait_access
    )
)]

//! Terminal Bridge - Rust Core Library
//!
//! Broker-side bridge that translates abstract trade intents into orders
//! valid for an external, eventually-consistent trading terminal, and keeps
//! a local view of the terminal's open-position state current despite the
//! terminal exposing no push notifications.
//!
//! # Architecture
//!
//! - [`broker`]: the [`broker::gateway::BrokerGateway`] port (the only
//!   channel to the terminal) plus the verify retry policy.
//! - [`execution`]: the stateful core: symbol resolution, trade
//!   validation/adjustment, order execution with the create-then-verify
//!   protocol, the reconciled position cache with its background
//!   synchronizer, and connection supervision.
//! - [`bridge`]: the context object wiring it all together; one instance is
//!   constructed at startup and passed to every operation.
//! - [`models`], [`config`], [`error`], [`telemetry`]: data model, YAML
//!   configuration, error taxonomy and tracing setup.
//!
//! The inbound request layer (wire format, transport, authentication) is an
//! external collaborator: it consumes [`bridge::TerminalBridge`] and is not
//! part of this crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Terminal gateway port and retry policy.
pub mod broker;

/// The stateful execution core.
pub mod execution;

/// Bridge context object.
pub mod bridge;

/// Core data model.
pub mod models;

/// YAML configuration.
pub mod config;

/// Error taxonomy.
pub mod error;

/// Tracing setup.
pub mod telemetry;

pub use bridge::TerminalBridge;
pub use broker::gateway::{
    AccountSnapshot, BrokerGateway, GatewayError, OrderReport, OrderRequest, OrderSide,
    PendingOrder, PositionSnapshot, RequestAction, SymbolMeta, TerminalStatus, Tick, RETCODE_DONE,
};
pub use broker::retry::VerifyRetryPolicy;
pub use config::{load_config, BridgeConfig, ConfigError};
pub use error::BridgeError;
pub use execution::{
    ConnectionSupervisor, OrderExecutor, PositionStateCache, SymbolResolver, Synchronizer,
};
pub use models::{
    ClosedPnl, ExecutedLeg, ExecutionReport, OrderKind, PositionRecord, QuotedPosition, Side,
    TradeAction, TradeIntent,
};
pub use telemetry::init_telemetry;
