//! Trade validation, order execution and position-state reconciliation.

pub mod executor;
pub mod state;
pub mod supervisor;
pub mod symbols;
pub mod validation;

pub use executor::OrderExecutor;
pub use state::{PositionStateCache, ReconcilePass, Synchronizer};
pub use supervisor::ConnectionSupervisor;
pub use symbols::SymbolResolver;
pub use validation::AdjustedIntent;
