//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `ClientSession`.
//!
//! ## Concurrency-Modell
//! Alle Session-Tasks laufen in einem `JoinSet` auf der Multi-Thread-Runtime.
//! Beim Shutdown wird nicht mehr akzeptiert; laufende Sessions bekommen
//! `shutdown_grace` Zeit, danach werden sie abgebrochen.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::error::RelayResult;
use crate::server_state::RelayState;
use crate::session::ClientSession;

/// TCP-Relay-Server
///
/// Der Socket wird schon in [`RelayServer::binden`] gebunden, damit die
/// tatsaechliche Adresse (z.B. bei Port 0) vor dem Start bekannt ist.
pub struct RelayServer {
    state: Arc<RelayState>,
    listener: TcpListener,
}

impl RelayServer {
    /// Bindet den Socket und legt das Dateiverzeichnis an
    pub async fn binden(state: Arc<RelayState>, bind_addr: SocketAddr) -> RelayResult<Self> {
        state.dateien.verzeichnis_anlegen().await?;
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Tatsaechlich gebundene Adresse
    pub fn lokale_adresse(&self) -> RelayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> RelayResult<()> {
        let lokale_addr = self.lokale_adresse()?;
        let max_clients = self.state.config.max_clients;
        let mut sessions = JoinSet::new();

        tracing::info!(adresse = %lokale_addr, max_clients, "TCP Relay-Server gestartet");

        while !*shutdown_rx.borrow() {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            if sessions.len() >= max_clients {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            }

                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let session = ClientSession::neu(Arc::clone(&self.state), peer_addr);
                            sessions.spawn(session.verarbeiten(stream, shutdown_rx.clone()));
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Beendete Sessions einsammeln
                Some(beendet) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = beendet {
                        if e.is_panic() {
                            tracing::error!(fehler = %e, "Session-Task ist abgestuerzt");
                        }
                    }
                }

                // Shutdown-Signal
                geaendert = shutdown_rx.changed() => {
                    if geaendert.is_err() {
                        tracing::debug!("Shutdown-Sender verworfen");
                        break;
                    }
                }
            }
        }

        tracing::info!(offen = sessions.len(), "Relay-Server: Shutdown, warte auf Sessions");
        self.sessions_beenden(sessions).await;
        tracing::info!("TCP Relay-Server gestoppt");
        Ok(())
    }

    /// Wartet bis `shutdown_grace` auf alle Sessions und bricht den Rest ab
    async fn sessions_beenden(&self, mut sessions: JoinSet<crate::session::SessionZustand>) {
        let grace = self.state.config.shutdown_grace;
        let abwarten = async { while sessions.join_next().await.is_some() {} };

        if tokio::time::timeout(grace, abwarten).await.is_err() {
            tracing::warn!(
                offen = sessions.len(),
                "Grace-Periode abgelaufen – verbleibende Sessions werden abgebrochen"
            );
            sessions.shutdown().await;
        }
    }
}
