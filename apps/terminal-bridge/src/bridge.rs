//! The bridge context object.
//!
//! One [`TerminalBridge`] is constructed at startup and passed to every
//! operation; there is no ambient global state. It wires the connection
//! supervisor, symbol resolver, position cache, synchronizer and executor
//! together and exposes the operation surface the request layer consumes.
//! Every operation ensures a live, trade-permitted session first.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::broker::gateway::{AccountSnapshot, BrokerGateway, PendingOrder, Tick};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::execution::executor::OrderExecutor;
use crate::execution::state::{PositionStateCache, Synchronizer};
use crate::execution::supervisor::ConnectionSupervisor;
use crate::execution::symbols::SymbolResolver;
use crate::models::{ExecutionReport, QuotedPosition, Side, TradeAction, TradeIntent};

/// Bridge between abstract trade intents and one trading terminal.
pub struct TerminalBridge<G> {
    gateway: Arc<G>,
    supervisor: ConnectionSupervisor<G>,
    resolver: SymbolResolver,
    cache: Arc<PositionStateCache>,
    synchronizer: Arc<Synchronizer<G>>,
    executor: OrderExecutor<G>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl<G: BrokerGateway + Send + Sync + 'static> TerminalBridge<G> {
    /// Wire a bridge over the given gateway.
    #[must_use]
    pub fn new(gateway: Arc<G>, config: &BridgeConfig) -> Self {
        let cache = Arc::new(PositionStateCache::new());
        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&gateway),
            Arc::clone(&cache),
            config.sync.interval(),
        ));
        let executor = OrderExecutor::new(
            Arc::clone(&gateway),
            Arc::clone(&cache),
            Arc::clone(&synchronizer),
            config.verify.policy(),
        );

        Self {
            supervisor: ConnectionSupervisor::new(Arc::clone(&gateway)),
            resolver: SymbolResolver::new(&config.symbols),
            cache,
            synchronizer,
            executor,
            gateway,
            sync_task: Mutex::new(None),
        }
    }

    /// Start the background position synchronizer.
    pub async fn start(&self) {
        let mut task = self.sync_task.lock().await;
        if task.is_some() {
            warn!("position synchronizer already running");
            return;
        }
        *task = Some(Arc::clone(&self.synchronizer).spawn());
    }

    /// Stop the background synchronizer and wait for it to exit.
    pub async fn shutdown(&self) {
        self.synchronizer.stop();
        if let Some(task) = self.sync_task.lock().await.take() {
            if let Err(e) = task.await {
                error!(error = %e, "position synchronizer task panicked");
            }
        }
    }

    /// Execute a trade intent.
    ///
    /// `close` intents are routed to close-by-ticket (the target ticket is
    /// carried in `magic`); everything else goes through symbol resolution,
    /// validation and the executor.
    pub async fn execute_trade(&self, intent: &TradeIntent) -> Result<ExecutionReport, BridgeError> {
        self.supervisor.ensure_connected().await?;

        if intent.action == TradeAction::Close {
            return self.executor.close(close_target(intent)?).await;
        }

        let symbol = self
            .resolver
            .resolve(self.gateway.as_ref(), &intent.symbol)
            .await?;
        self.executor.execute(intent, &symbol).await
    }

    /// Close a live position by ticket.
    pub async fn close_position(&self, ticket: u64) -> Result<ExecutionReport, BridgeError> {
        self.supervisor.ensure_connected().await?;
        self.executor.close(ticket).await
    }

    /// Replace a position's stop levels or place a partial-close order.
    pub async fn modify_position(
        &self,
        ticket: u64,
        new_stop_loss: Option<Decimal>,
        new_take_profit: Option<Decimal>,
        partial_volume: Option<Decimal>,
    ) -> Result<ExecutionReport, BridgeError> {
        self.supervisor.ensure_connected().await?;
        self.executor
            .modify(ticket, new_stop_loss, new_take_profit, partial_volume)
            .await
    }

    /// Open positions with the freshest quote per symbol.
    ///
    /// Forces a reconciliation pass first; a failed pass degrades to the
    /// cached view rather than failing the listing.
    pub async fn positions(&self) -> Result<Vec<QuotedPosition>, BridgeError> {
        self.supervisor.ensure_connected().await?;
        self.reconcile_best_effort().await;

        let records = self.cache.all().await;

        // One tick fetch per distinct symbol.
        let mut quotes: HashMap<String, Option<Tick>> = HashMap::new();
        for record in &records {
            if !quotes.contains_key(&record.symbol) {
                let tick = match self.gateway.tick(&record.symbol).await {
                    Ok(tick) => Some(tick),
                    Err(e) => {
                        debug!(symbol = %record.symbol, error = %e, "quote unavailable for listing");
                        None
                    }
                };
                quotes.insert(record.symbol.clone(), tick);
            }
        }

        Ok(records
            .into_iter()
            .map(|record| {
                let current_price = quotes.get(&record.symbol).copied().flatten().map(|tick| {
                    match record.side {
                        Side::Long => tick.bid,
                        Side::Short => tick.ask,
                    }
                });
                QuotedPosition {
                    position: record,
                    current_price,
                }
            })
            .collect())
    }

    /// Number of open positions after a forced reconciliation.
    pub async fn position_count(&self) -> Result<usize, BridgeError> {
        self.supervisor.ensure_connected().await?;
        self.reconcile_best_effort().await;
        Ok(self.cache.count().await)
    }

    /// Pending orders currently resting at the terminal.
    pub async fn pending_orders(&self) -> Result<Vec<PendingOrder>, BridgeError> {
        self.supervisor.ensure_connected().await?;
        Ok(self.gateway.list_pending_orders().await?)
    }

    /// Number of pending orders.
    pub async fn pending_order_count(&self) -> Result<usize, BridgeError> {
        Ok(self.pending_orders().await?.len())
    }

    /// Fresh account projection; never served from a cache.
    pub async fn account_info(&self) -> Result<AccountSnapshot, BridgeError> {
        self.supervisor.ensure_connected().await?;
        Ok(self.gateway.account_snapshot().await?)
    }

    /// Whether a live, trade-permitted session can be established.
    pub async fn is_healthy(&self) -> bool {
        self.supervisor.is_healthy().await
    }

    /// The cache's contract is eventually consistent; a failed on-demand
    /// pass is logged and the stale view served.
    async fn reconcile_best_effort(&self) {
        if let Err(e) = self.synchronizer.reconcile().await {
            error!(error = %e, "on-demand reconciliation pass failed");
        }
    }
}

/// The ticket a `close` intent targets, carried in its `magic` field.
fn close_target(intent: &TradeIntent) -> Result<u64, BridgeError> {
    u64::try_from(intent.magic)
        .ok()
        .filter(|ticket| *ticket > 0)
        .ok_or_else(|| BridgeError::InvalidIntent {
            message: "close requires the target ticket in the magic field".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::OrderKind;

    fn make_close_intent(magic: i64) -> TradeIntent {
        TradeIntent {
            symbol: "EURUSDm".to_string(),
            action: TradeAction::Close,
            volume: Decimal::ZERO,
            kind: OrderKind::Market,
            price: Decimal::ZERO,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            tp1: Decimal::ZERO,
            tp2: Decimal::ZERO,
            comment: String::new(),
            magic,
        }
    }

    #[test]
    fn close_target_requires_positive_magic() {
        assert_eq!(close_target(&make_close_intent(42)).unwrap(), 42);
        assert!(close_target(&make_close_intent(0)).is_err());
        assert!(close_target(&make_close_intent(-5)).is_err());
    }

    #[test]
    fn close_target_error_is_invalid_intent() {
        let err = close_target(&make_close_intent(0)).unwrap_err();
        assert_eq!(err.kind(), "INVALID_INTENT");
    }
}
