//! Terminal connection supervision.
//!
//! Every bridge operation runs behind [`ConnectionSupervisor::ensure_connected`]:
//! a full initialize on first use, a lightweight status probe afterwards, and
//! a disconnect-and-reinitialize cycle when the probe reports (or fails with)
//! a lost connection. Initialization fails closed: a terminal that is
//! reachable but not allowed to trade is treated as disconnected.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::broker::gateway::BrokerGateway;
use crate::error::BridgeError;

/// Keeps the gateway session live, reconnecting on detected loss.
pub struct ConnectionSupervisor<G> {
    gateway: Arc<G>,
    /// Serializes connection checks so concurrent operations cannot race
    /// a reconnect.
    connected: Mutex<bool>,
}

impl<G: BrokerGateway + Send + Sync> ConnectionSupervisor<G> {
    /// Create a supervisor over the given gateway.
    #[must_use]
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            connected: Mutex::new(false),
        }
    }

    /// Ensure a live, trade-permitted session before an operation proceeds.
    pub async fn ensure_connected(&self) -> Result<(), BridgeError> {
        let mut connected = self.connected.lock().await;

        if !*connected {
            self.initialize().await?;
            *connected = true;
            return Ok(());
        }

        match self.gateway.terminal_status().await {
            Ok(status) if status.connected => Ok(()),
            probe => {
                match probe {
                    Ok(_) => warn!("terminal reports disconnected, reinitializing"),
                    Err(ref e) => warn!(error = %e, "terminal status probe failed, reinitializing"),
                }
                *connected = false;
                let _ = self.gateway.disconnect().await;
                self.initialize().await?;
                *connected = true;
                Ok(())
            }
        }
    }

    /// Whether a live session can be established right now.
    pub async fn is_healthy(&self) -> bool {
        self.ensure_connected().await.is_ok()
    }

    /// Full session bring-up. Fails closed on any missing precondition.
    async fn initialize(&self) -> Result<(), BridgeError> {
        // Tear down any half-open session first; failures here are expected
        // when no session exists.
        let _ = self.gateway.disconnect().await;

        self.gateway.connect().await.map_err(|e| connection(format!(
            "terminal refused to initialize: {e}"
        )))?;

        let status = self
            .gateway
            .terminal_status()
            .await
            .map_err(|e| connection(format!("failed to get terminal status: {e}")))?;

        if !status.connected {
            return Err(connection(
                "terminal is not connected to its trade server".to_string(),
            ));
        }
        if !status.trade_allowed {
            return Err(connection(
                "trading is not allowed in the terminal (algorithmic trading disabled or read-only)"
                    .to_string(),
            ));
        }

        let account = self
            .gateway
            .account_snapshot()
            .await
            .map_err(|e| connection(format!("failed to get account snapshot: {e}")))?;

        info!(
            balance = %account.balance,
            currency = %account.currency,
            leverage = account.leverage,
            "terminal session initialized"
        );
        Ok(())
    }
}

fn connection(message: String) -> BridgeError {
    BridgeError::Connection { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use crate::broker::gateway::{
        AccountSnapshot, GatewayError, OrderReport, OrderRequest, PendingOrder, PositionSnapshot,
        SymbolMeta, TerminalStatus, Tick,
    };

    struct ScriptedGateway {
        trade_allowed: AtomicBool,
        status_connected: AtomicBool,
        account_ok: AtomicBool,
        connects: AtomicU32,
        disconnects: AtomicU32,
    }

    impl ScriptedGateway {
        fn healthy() -> Self {
            Self {
                trade_allowed: AtomicBool::new(true),
                status_connected: AtomicBool::new(true),
                account_ok: AtomicBool::new(true),
                connects: AtomicU32::new(0),
                disconnects: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl BrokerGateway for ScriptedGateway {
        async fn connect(&self) -> Result<(), GatewayError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), GatewayError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn terminal_status(&self) -> Result<TerminalStatus, GatewayError> {
            Ok(TerminalStatus {
                connected: self.status_connected.load(Ordering::SeqCst),
                trade_allowed: self.trade_allowed.load(Ordering::SeqCst),
            })
        }

        async fn account_snapshot(&self) -> Result<AccountSnapshot, GatewayError> {
            if self.account_ok.load(Ordering::SeqCst) {
                Ok(AccountSnapshot {
                    balance: dec!(10000),
                    equity: dec!(10000),
                    margin: dec!(0),
                    free_margin: dec!(10000),
                    currency: "USD".to_string(),
                    leverage: 100,
                })
            } else {
                Err(GatewayError::Transport {
                    message: "account unavailable".to_string(),
                })
            }
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
            _ticket: Option<u64>,
        ) -> Result<Option<Vec<PositionSnapshot>>, GatewayError> {
            Ok(Some(vec![]))
        }

        async fn list_pending_orders(&self) -> Result<Vec<PendingOrder>, GatewayError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn first_ensure_performs_full_initialize() {
        let gateway = Arc::new(ScriptedGateway::healthy());
        let supervisor = ConnectionSupervisor::new(Arc::clone(&gateway));

        supervisor.ensure_connected().await.unwrap();
        assert_eq!(gateway.connects.load(Ordering::SeqCst), 1);

        // Subsequent ensures only probe status.
        supervisor.ensure_connected().await.unwrap();
        assert_eq!(gateway.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trade_disallowed_fails_closed() {
        let gateway = Arc::new(ScriptedGateway::healthy());
        gateway.trade_allowed.store(false, Ordering::SeqCst);
        let supervisor = ConnectionSupervisor::new(Arc::clone(&gateway));

        let err = supervisor.ensure_connected().await.unwrap_err();
        assert_eq!(err.kind(), "CONNECTION_ERROR");
        assert!(!supervisor.is_healthy().await);
    }

    #[tokio::test]
    async fn disconnected_status_fails_closed() {
        let gateway = Arc::new(ScriptedGateway::healthy());
        gateway.status_connected.store(false, Ordering::SeqCst);
        let supervisor = ConnectionSupervisor::new(Arc::clone(&gateway));

        assert!(supervisor.ensure_connected().await.is_err());
    }

    #[tokio::test]
    async fn missing_account_snapshot_fails_closed() {
        let gateway = Arc::new(ScriptedGateway::healthy());
        gateway.account_ok.store(false, Ordering::SeqCst);
        let supervisor = ConnectionSupervisor::new(Arc::clone(&gateway));

        let err = supervisor.ensure_connected().await.unwrap_err();
        assert!(err.to_string().contains("account snapshot"));
    }

    #[tokio::test]
    async fn lost_connection_triggers_reinitialize() {
        let gateway = Arc::new(ScriptedGateway::healthy());
        let supervisor = ConnectionSupervisor::new(Arc::clone(&gateway));
        supervisor.ensure_connected().await.unwrap();

        // Terminal drops; the next ensure reconnects.
        gateway.status_connected.store(false, Ordering::SeqCst);
        assert!(supervisor.ensure_connected().await.is_err());

        gateway.status_connected.store(true, Ordering::SeqCst);
        supervisor.ensure_connected().await.unwrap();
        assert!(gateway.connects.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn healthy_gateway_reports_healthy() {
        let gateway = Arc::new(ScriptedGateway::healthy());
        let supervisor = ConnectionSupervisor::new(gateway);
        assert!(supervisor.is_healthy().await);
    }
}
