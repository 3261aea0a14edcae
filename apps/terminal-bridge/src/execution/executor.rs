//! Order execution: one validated intent to one or more terminal submissions.
//!
//! The executor owns the hard parts of the submission path: resolving market
//! prices, splitting two-leg take-profit intents, close-by-ticket, position
//! modifies, and the create-then-verify protocol. A broker-acknowledged
//! market order is only reported as success once the resulting position has
//! been observed by a forced reconciliation pass; an acknowledgment whose
//! position never appears is a failure, not a success.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::broker::gateway::{
    BrokerGateway, OrderReport, OrderRequest, OrderSide, PositionSnapshot,
};
use crate::broker::retry::{BackoffSchedule, VerifyRetryPolicy};
use crate::error::BridgeError;
use crate::execution::state::{PositionStateCache, Synchronizer};
use crate::execution::validation;
use crate::models::{ClosedPnl, ExecutedLeg, ExecutionReport, OrderKind, Side, TradeIntent};

/// Turns adjusted intents into terminal submissions and verified positions.
pub struct OrderExecutor<G> {
    gateway: Arc<G>,
    cache: Arc<PositionStateCache>,
    synchronizer: Arc<Synchronizer<G>>,
    verify: VerifyRetryPolicy,
}

impl<G: BrokerGateway + Send + Sync + 'static> OrderExecutor<G> {
    /// Create an executor.
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        cache: Arc<PositionStateCache>,
        synchronizer: Arc<Synchronizer<G>>,
        verify: VerifyRetryPolicy,
    ) -> Self {
        Self {
            gateway,
            cache,
            synchronizer,
            verify,
        }
    }

    /// Execute an opening (buy/sell) intent against its resolved symbol.
    pub async fn execute(
        &self,
        intent: &TradeIntent,
        symbol: &str,
    ) -> Result<ExecutionReport, BridgeError> {
        let Some(side) = intent.action.side() else {
            return Err(BridgeError::InvalidIntent {
                message: format!("action {:?} is not an opening action", intent.action),
            });
        };
        if intent.kind == OrderKind::Limit && intent.price <= Decimal::ZERO {
            return Err(BridgeError::InvalidIntent {
                message: "limit orders require a non-zero price".to_string(),
            });
        }

        let meta = self.gateway.symbol_meta(symbol).await?;
        let tick = self.gateway.tick(symbol).await?;
        let reference = match side {
            Side::Long => tick.ask,
            Side::Short => tick.bid,
        };

        let adjusted = validation::adjust(intent, side, &meta, reference);
        let price = if intent.price.is_zero() {
            reference
        } else {
            intent.price
        };
        let order_side = OrderSide::opening(side);
        let stop_loss = level(adjusted.stop_loss);

        if intent.wants_split() {
            let half = adjusted.volume / Decimal::TWO;
            info!(
                symbol,
                tp1 = %adjusted.tp1,
                tp2 = %adjusted.tp2,
                leg_volume = %half,
                "splitting intent into two take-profit legs"
            );

            let first = self
                .submit_leg(
                    symbol,
                    order_side,
                    intent.kind,
                    half,
                    price,
                    stop_loss,
                    level(adjusted.tp1),
                    intent.magic,
                    format!("{} (TP1)", intent.comment),
                )
                .await?;

            match self
                .submit_leg(
                    symbol,
                    order_side,
                    intent.kind,
                    half,
                    price,
                    stop_loss,
                    level(adjusted.tp2),
                    intent.magic + 1,
                    format!("{} (TP2)", intent.comment),
                )
                .await
            {
                Ok(second) => Ok(ExecutionReport {
                    legs: vec![first, second],
                    closed: None,
                    partial_error: None,
                }),
                // The first leg is live; cancelling it would trade one risk
                // for another, so the operation stays a (partial) success.
                Err(e) => {
                    error!(
                        error = %e,
                        first_ticket = first.ticket,
                        "second take-profit leg failed, first leg stays open"
                    );
                    Ok(ExecutionReport {
                        legs: vec![first],
                        closed: None,
                        partial_error: Some(e.to_string()),
                    })
                }
            }
        } else {
            let leg = self
                .submit_leg(
                    symbol,
                    order_side,
                    intent.kind,
                    adjusted.volume,
                    price,
                    stop_loss,
                    level(adjusted.single_take_profit()),
                    intent.magic,
                    intent.comment.clone(),
                )
                .await?;
            Ok(ExecutionReport::single(leg))
        }
    }

    /// Close a live position by ticket.
    ///
    /// Looks the position up at the gateway directly for the freshest
    /// single-ticket truth; the cache catches up on its own cadence.
    pub async fn close(&self, ticket: u64) -> Result<ExecutionReport, BridgeError> {
        let position = self.find_position(ticket).await?;
        let tick = self.gateway.tick(&position.symbol).await?;
        let price = match position.side {
            Side::Long => tick.bid,
            Side::Short => tick.ask,
        };

        let request = OrderRequest::close(
            &position.symbol,
            OrderSide::closing(position.side),
            position.volume,
            price,
            ticket,
            position.magic,
        );
        let report = self.gateway.send_order(request).await?;
        ensure_done(&report)?;

        info!(ticket, close_ticket = report.ticket, price = %report.price, "position closed");
        Ok(ExecutionReport {
            legs: vec![ExecutedLeg {
                ticket: report.ticket,
                volume: report.volume,
                price: report.price,
                magic: position.magic,
            }],
            closed: Some(ClosedPnl {
                profit: position.profit,
                commission: position.commission,
                swap: position.swap,
            }),
            partial_error: None,
        })
    }

    /// Replace a position's stop levels, or place a partial-close order.
    ///
    /// With a positive `partial_volume` and a take-profit level, a pending
    /// limit order on the opposite side is created for
    /// `min(partial_volume, position.volume)` instead of touching the
    /// position's own levels. Otherwise the stop-loss/take-profit are
    /// replaced directly, omitted fields keeping their current values.
    pub async fn modify(
        &self,
        ticket: u64,
        new_stop_loss: Option<Decimal>,
        new_take_profit: Option<Decimal>,
        partial_volume: Option<Decimal>,
    ) -> Result<ExecutionReport, BridgeError> {
        let position = self.find_position(ticket).await?;

        let partial = partial_volume.filter(|volume| *volume > Decimal::ZERO);
        if let (Some(volume), Some(target)) = (partial, new_take_profit) {
            return self.partial_close_order(&position, volume, target).await;
        }

        let stop_loss = new_stop_loss.unwrap_or(position.stop_loss);
        let take_profit = new_take_profit.unwrap_or(position.take_profit);
        let request = OrderRequest::modify_stops(
            &position.symbol,
            ticket,
            level(stop_loss),
            level(take_profit),
            position.magic,
        );
        let report = self.gateway.send_order(request).await?;
        ensure_done(&report)?;

        info!(ticket, stop_loss = %stop_loss, take_profit = %take_profit, "position stop levels replaced");
        Ok(ExecutionReport::single(ExecutedLeg {
            ticket,
            volume: position.volume,
            price: report.price,
            magic: position.magic,
        }))
    }

    /// Pending limit order that closes part of `position` when the market
    /// reaches the (distance-revalidated) take-profit level.
    async fn partial_close_order(
        &self,
        position: &PositionSnapshot,
        volume: Decimal,
        target: Decimal,
    ) -> Result<ExecutionReport, BridgeError> {
        let meta = self.gateway.symbol_meta(&position.symbol).await?;
        let tick = self.gateway.tick(&position.symbol).await?;
        let reference = match position.side {
            Side::Long => tick.ask,
            Side::Short => tick.bid,
        };
        let distance = validation::min_stop_distance(&meta);
        let price = validation::adjust_take_profit(position.side, target, reference, distance);
        let volume = volume.min(position.volume);

        let request = OrderRequest::pending_limit(
            &position.symbol,
            OrderSide::closing(position.side),
            volume,
            price,
            None,
            None,
            position.magic,
            format!("partial close {}", position.ticket),
        );
        let report = self.gateway.send_order(request).await?;
        ensure_done(&report)?;

        info!(
            ticket = position.ticket,
            pending_ticket = report.ticket,
            volume = %volume,
            price = %price,
            "partial-close limit order placed"
        );
        Ok(ExecutionReport::single(ExecutedLeg {
            ticket: report.ticket,
            volume: report.volume,
            price: report.price,
            magic: position.magic,
        }))
    }

    /// Submit one leg and, for market deals, verify it materialized.
    #[allow(clippy::too_many_arguments)]
    async fn submit_leg(
        &self,
        symbol: &str,
        side: OrderSide,
        kind: OrderKind,
        volume: Decimal,
        price: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        magic: i64,
        comment: String,
    ) -> Result<ExecutedLeg, BridgeError> {
        let request = match kind {
            OrderKind::Market => OrderRequest::market(
                symbol, side, volume, price, stop_loss, take_profit, magic, comment,
            ),
            OrderKind::Limit => OrderRequest::pending_limit(
                symbol, side, volume, price, stop_loss, take_profit, magic, comment,
            ),
        };

        let report = self.gateway.send_order(request).await?;
        ensure_done(&report)?;
        info!(
            ticket = report.ticket,
            volume = %report.volume,
            price = %report.price,
            "order accepted by terminal"
        );

        // Pending orders are not expected to appear as positions; only
        // immediately-filled deals go through create-then-verify.
        if kind == OrderKind::Market {
            self.verify_open(report.ticket).await?;
        }

        Ok(ExecutedLeg {
            ticket: report.ticket,
            volume: report.volume,
            price: report.price,
            magic,
        })
    }

    /// Poll the cache, forcing a reconciliation before each check, until the
    /// ticket appears or attempts run out.
    async fn verify_open(&self, ticket: u64) -> Result<(), BridgeError> {
        let mut schedule = BackoffSchedule::new(&self.verify);
        loop {
            if let Err(e) = self.synchronizer.reconcile().await {
                warn!(error = %e, "reconciliation pass during verification failed");
            }
            if self.cache.get(ticket).await.is_some() {
                debug!(ticket, attempt = schedule.attempt(), "position verified in cache");
                return Ok(());
            }
            match schedule.next_backoff() {
                Some(pause) => tokio::time::sleep(pause).await,
                None => break,
            }
        }

        error!(ticket, "position did not appear after an accepted submission");
        Err(BridgeError::PositionNotFound { ticket })
    }

    async fn find_position(&self, ticket: u64) -> Result<PositionSnapshot, BridgeError> {
        let positions = self.gateway.list_positions(Some(ticket)).await?;
        positions
            .and_then(|mut list| {
                if list.is_empty() {
                    None
                } else {
                    Some(list.swap_remove(0))
                }
            })
            .ok_or(BridgeError::PositionNotFound { ticket })
    }
}

fn ensure_done(report: &OrderReport) -> Result<(), BridgeError> {
    if report.is_done() {
        Ok(())
    } else {
        Err(BridgeError::BrokerRejected {
            retcode: report.retcode,
            message: report.comment.clone(),
        })
    }
}

fn level(value: Decimal) -> Option<Decimal> {
    if value > Decimal::ZERO {
        Some(value)
    } else {
        None
    }
}
