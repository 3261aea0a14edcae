//! Position cache and its background synchronizer.
//!
//! The terminal pushes nothing, so the bridge keeps its own snapshot of open
//! positions and refreshes it on a fixed cadence and on demand. The cache is
//! the single local source of truth for position state: records are created,
//! replaced and deleted only by reconciliation passes, and the whole map is
//! guarded by one lock so a pass is atomic with respect to readers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::broker::gateway::{BrokerGateway, GatewayError, PositionSnapshot};
use crate::models::PositionRecord;

/// Outcome of one reconciliation pass that reached the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePass {
    /// Positions in the fetched snapshot.
    pub observed: usize,
    /// Tickets not previously known.
    pub inserted: usize,
    /// Tickets dropped because they left the terminal's list.
    pub removed: usize,
}

/// Lock-guarded map of ticket to last-observed position record.
#[derive(Debug, Default)]
pub struct PositionStateCache {
    positions: RwLock<HashMap<u64, PositionRecord>>,
}

impl PositionStateCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a ticket, if currently known.
    pub async fn get(&self, ticket: u64) -> Option<PositionRecord> {
        self.positions.read().await.get(&ticket).cloned()
    }

    /// Every record carrying the given correlation tag.
    pub async fn get_by_magic(&self, magic: i64) -> Vec<PositionRecord> {
        self.positions
            .read()
            .await
            .values()
            .filter(|record| record.magic == magic)
            .cloned()
            .collect()
    }

    /// Number of known open positions.
    pub async fn count(&self) -> usize {
        self.positions.read().await.len()
    }

    /// Every known record, ordered by ticket.
    pub async fn all(&self) -> Vec<PositionRecord> {
        let mut records: Vec<PositionRecord> =
            self.positions.read().await.values().cloned().collect();
        records.sort_by_key(|record| record.ticket);
        records
    }

    /// Replace the map contents with a fresh terminal snapshot.
    ///
    /// Runs entirely under the write lock: every fetched record overwrites
    /// its predecessor whole (stale fields never survive) and tickets absent
    /// from the snapshot are deleted.
    async fn replace_all(
        &self,
        snapshots: &[PositionSnapshot],
        observed_at: DateTime<Utc>,
    ) -> ReconcilePass {
        let mut positions = self.positions.write().await;

        let fresh: HashSet<u64> = snapshots.iter().map(|snapshot| snapshot.ticket).collect();
        let removed: Vec<u64> = positions
            .keys()
            .filter(|ticket| !fresh.contains(ticket))
            .copied()
            .collect();
        for ticket in &removed {
            positions.remove(ticket);
            info!(ticket, "removed closed position from cache");
        }

        let mut inserted = 0;
        for snapshot in snapshots {
            let record = PositionRecord::from_snapshot(snapshot, observed_at);
            if positions.insert(snapshot.ticket, record).is_none() {
                inserted += 1;
            }
        }

        ReconcilePass {
            observed: snapshots.len(),
            inserted,
            removed: removed.len(),
        }
    }
}

/// Background task that keeps a [`PositionStateCache`] reconciled against
/// the terminal, on a timer and on demand.
pub struct Synchronizer<G> {
    gateway: Arc<G>,
    cache: Arc<PositionStateCache>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl<G: BrokerGateway + Send + Sync + 'static> Synchronizer<G> {
    /// Create a synchronizer over the given gateway and cache.
    #[must_use]
    pub fn new(gateway: Arc<G>, cache: Arc<PositionStateCache>, interval: Duration) -> Self {
        Self {
            gateway,
            cache,
            interval,
            shutdown: CancellationToken::new(),
        }
    }

    /// Run one reconciliation pass now.
    ///
    /// `Ok(None)` means the terminal returned no data; that is a transient
    /// condition and the cache is left untouched rather than wiped.
    pub async fn reconcile(&self) -> Result<Option<ReconcilePass>, GatewayError> {
        let Some(snapshots) = self.gateway.list_positions(None).await? else {
            debug!("terminal returned no position data, cache left unchanged");
            return Ok(None);
        };

        let pass = self.cache.replace_all(&snapshots, Utc::now()).await;
        debug!(
            observed = pass.observed,
            inserted = pass.inserted,
            removed = pass.removed,
            "position reconciliation pass completed"
        );
        Ok(Some(pass))
    }

    /// Spawn the timer-driven reconciliation loop.
    ///
    /// Errors in a single pass are logged and the loop continues; the loop
    /// exits cooperatively after [`Synchronizer::stop`], finishing any
    /// in-flight pass first.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let sync = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sync.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = sync.reconcile().await {
                            error!(error = %e, "position reconciliation pass failed");
                        }
                    }
                    () = sync.shutdown.cancelled() => {
                        info!("position synchronizer shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Signal the reconciliation loop to stop after its current cycle.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::broker::gateway::{
        AccountSnapshot, OrderReport, OrderRequest, PendingOrder, SymbolMeta, TerminalStatus, Tick,
    };
    use crate::models::Side;

    /// Gateway double with a settable position book. `None` simulates the
    /// terminal's ambiguous no-data reply.
    struct BookGateway {
        book: Mutex<Option<Vec<PositionSnapshot>>>,
    }

    impl BookGateway {
        fn new(book: Option<Vec<PositionSnapshot>>) -> Self {
            Self {
                book: Mutex::new(book),
            }
        }

        fn set_book(&self, book: Option<Vec<PositionSnapshot>>) {
            *self.book.lock().unwrap() = book;
        }
    }

    #[async_trait]
    impl BrokerGateway for BookGateway {
        async fn connect(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn terminal_status(&self) -> Result<TerminalStatus, GatewayError> {
            Ok(TerminalStatus {
                connected: true,
                trade_allowed: true,
            })
        }

        async fn account_snapshot(&self) -> Result<AccountSnapshot, GatewayError> {
            Err(GatewayError::Transport {
                message: "not scripted".to_string(),
            })
        }

        async fn select_symbol(&self, _name: &str) -> Result<bool, GatewayError> {
            Ok(true)
        }

        async fn symbol_meta(&self, _name: &str) -> Result<SymbolMeta, GatewayError> {
            Err(GatewayError::Transport {
                message: "not scripted".to_string(),
            })
        }

        async fn tick(&self, _name: &str) -> Result<Tick, GatewayError> {
            Err(GatewayError::Transport {
                message: "not scripted".to_string(),
            })
        }

        async fn send_order(&self, _request: OrderRequest) -> Result<OrderReport, GatewayError> {
            Err(GatewayError::Transport {
                message: "not scripted".to_string(),
            })
        }

        async fn list_positions(
            &self,
            ticket: Option<u64>,
        ) -> Result<Option<Vec<PositionSnapshot>>, GatewayError> {
            let book = self.book.lock().unwrap().clone();
            Ok(book.map(|positions| match ticket {
                Some(t) => positions.into_iter().filter(|p| p.ticket == t).collect(),
                None => positions,
            }))
        }

        async fn list_pending_orders(&self) -> Result<Vec<PendingOrder>, GatewayError> {
            Ok(vec![])
        }
    }

    fn make_snapshot(ticket: u64, magic: i64) -> PositionSnapshot {
        PositionSnapshot {
            ticket,
            symbol: "EURUSDm".to_string(),
            volume: dec!(0.10),
            side: Side::Long,
            open_price: dec!(1.1000),
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            magic,
            comment: "test".to_string(),
            profit: Decimal::ZERO,
            commission: Decimal::ZERO,
            swap: Decimal::ZERO,
        }
    }

    fn make_sync(gateway: Arc<BookGateway>) -> (Arc<Synchronizer<BookGateway>>, Arc<PositionStateCache>) {
        let cache = Arc::new(PositionStateCache::new());
        let sync = Arc::new(Synchronizer::new(
            gateway,
            Arc::clone(&cache),
            Duration::from_secs(5),
        ));
        (sync, cache)
    }

    #[tokio::test]
    async fn reconcile_mirrors_upstream_ticket_set() {
        let gateway = Arc::new(BookGateway::new(Some(vec![
            make_snapshot(1, 10),
            make_snapshot(2, 20),
        ])));
        let (sync, cache) = make_sync(Arc::clone(&gateway));

        let pass = sync.reconcile().await.unwrap().unwrap();
        assert_eq!(pass.observed, 2);
        assert_eq!(pass.inserted, 2);
        assert_eq!(pass.removed, 0);

        let tickets: Vec<u64> = cache.all().await.iter().map(|r| r.ticket).collect();
        assert_eq!(tickets, vec![1, 2]);
    }

    #[tokio::test]
    async fn reconcile_removes_closed_positions() {
        let gateway = Arc::new(BookGateway::new(Some(vec![
            make_snapshot(1, 10),
            make_snapshot(2, 20),
        ])));
        let (sync, cache) = make_sync(Arc::clone(&gateway));
        sync.reconcile().await.unwrap();

        gateway.set_book(Some(vec![make_snapshot(2, 20)]));
        let pass = sync.reconcile().await.unwrap().unwrap();

        assert_eq!(pass.removed, 1);
        assert!(cache.get(1).await.is_none());
        assert!(cache.get(2).await.is_some());
        assert_eq!(cache.count().await, 1);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let gateway = Arc::new(BookGateway::new(Some(vec![make_snapshot(1, 10)])));
        let (sync, cache) = make_sync(gateway);

        sync.reconcile().await.unwrap();
        let before = cache.all().await;

        let pass = sync.reconcile().await.unwrap().unwrap();
        assert_eq!(pass.inserted, 0);
        assert_eq!(pass.removed, 0);

        let after = cache.all().await;
        assert_eq!(
            before.iter().map(|r| r.ticket).collect::<Vec<_>>(),
            after.iter().map(|r| r.ticket).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn no_data_fetch_leaves_cache_unchanged() {
        let gateway = Arc::new(BookGateway::new(Some(vec![make_snapshot(1, 10)])));
        let (sync, cache) = make_sync(Arc::clone(&gateway));
        sync.reconcile().await.unwrap();

        gateway.set_book(None);
        let pass = sync.reconcile().await.unwrap();

        assert!(pass.is_none());
        assert_eq!(cache.count().await, 1);
        assert!(cache.get(1).await.is_some());
    }

    #[tokio::test]
    async fn explicit_empty_book_clears_cache() {
        let gateway = Arc::new(BookGateway::new(Some(vec![make_snapshot(1, 10)])));
        let (sync, cache) = make_sync(Arc::clone(&gateway));
        sync.reconcile().await.unwrap();

        gateway.set_book(Some(vec![]));
        let pass = sync.reconcile().await.unwrap().unwrap();

        assert_eq!(pass.removed, 1);
        assert_eq!(cache.count().await, 0);
    }

    #[tokio::test]
    async fn records_replaced_whole_not_merged() {
        let gateway = Arc::new(BookGateway::new(Some(vec![make_snapshot(1, 10)])));
        let (sync, cache) = make_sync(Arc::clone(&gateway));
        sync.reconcile().await.unwrap();

        let mut updated = make_snapshot(1, 10);
        updated.stop_loss = dec!(1.0950);
        updated.volume = dec!(0.05);
        gateway.set_book(Some(vec![updated]));
        sync.reconcile().await.unwrap();

        let record = cache.get(1).await.unwrap();
        assert_eq!(record.stop_loss, dec!(1.0950));
        assert_eq!(record.volume, dec!(0.05));
    }

    #[tokio::test]
    async fn get_by_magic_scans_records() {
        let gateway = Arc::new(BookGateway::new(Some(vec![
            make_snapshot(1, 10),
            make_snapshot(2, 20),
            make_snapshot(3, 10),
        ])));
        let (sync, cache) = make_sync(gateway);
        sync.reconcile().await.unwrap();

        let matched = cache.get_by_magic(10).await;
        assert_eq!(matched.len(), 2);
        assert!(cache.get_by_magic(99).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_loop_reconciles_and_stops_cooperatively() {
        let gateway = Arc::new(BookGateway::new(Some(vec![make_snapshot(1, 10)])));
        let cache = Arc::new(PositionStateCache::new());
        let sync = Arc::new(Synchronizer::new(
            Arc::clone(&gateway),
            Arc::clone(&cache),
            Duration::from_secs(5),
        ));

        let handle = Arc::clone(&sync).spawn();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.count().await, 1);

        // A no-data pass must not disturb the cache or the loop.
        gateway.set_book(None);
        tokio::time::sleep(Duration::from_secs(6)).await;
        gateway.set_book(Some(vec![make_snapshot(1, 10), make_snapshot(2, 20)]));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.count().await, 2);

        sync.stop();
        handle.await.unwrap();
    }
}
