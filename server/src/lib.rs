//! flurfunk-server – Bibliotheks-Root
//!
//! Verdrahtet Relay, Dateiablage und Observability und stellt den
//! oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use flurfunk_observability::FlurfunkMetrics;
use flurfunk_relay::{RelayServer, RelayState};
use std::net::SocketAddr;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Haelt den Server-Zustand vor dem Start zusammen
pub struct Server {
    pub config: ServerConfig,
}

/// Ein gebundener, laufender Server
pub struct LaufenderServer {
    adresse: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    relay_task: JoinHandle<Result<()>>,
    observability_task: Option<JoinHandle<()>>,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bindet alle Sockets und startet die Subsysteme im Hintergrund
    ///
    /// Reihenfolge:
    /// 1. Metriken-Registry anlegen
    /// 2. Dateiverzeichnis anlegen, TCP-Listener binden
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. Accept-Loop starten
    pub async fn binden(self) -> Result<LaufenderServer> {
        let metriken = FlurfunkMetrics::neu().context("Metriken-Registry")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = RelayState::neu(self.config.relay_config(), metriken.clone());
        let relay = RelayServer::binden(state, self.config.tcp_bind_adresse()?)
            .await
            .context("Chat-Port konnte nicht gebunden werden")?;
        let adresse = relay.lokale_adresse()?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            dateien = %self.config.dateien.verzeichnis.display(),
            "Server startet"
        );

        let observability_task = if self.config.observability.aktiviert {
            let bind_addr = self.config.observability_bind_adresse()?;
            let max_clients = self.config.server.max_clients;
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = flurfunk_observability::observability_server_starten(
                    bind_addr,
                    metriken,
                    max_clients,
                    rx,
                )
                .await
                {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }))
        } else {
            None
        };

        let relay_task = tokio::spawn(async move {
            relay
                .starten(shutdown_rx)
                .await
                .context("Relay-Server abgebrochen")
        });

        Ok(LaufenderServer {
            adresse,
            shutdown_tx,
            relay_task,
            observability_task,
        })
    }

    /// Startet den Server und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let laufend = self.binden().await?;

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        laufend.stoppen().await
    }
}

impl LaufenderServer {
    /// Tatsaechliche Adresse des Chat-Ports
    pub fn adresse(&self) -> SocketAddr {
        self.adresse
    }

    /// Signalisiert den Shutdown und wartet auf alle Subsysteme
    pub async fn stoppen(self) -> Result<()> {
        // Fehler nur wenn alle Empfaenger schon weg sind
        let _ = self.shutdown_tx.send(true);

        let ergebnis = self
            .relay_task
            .await
            .context("Relay-Task abgestuerzt")?;

        if let Some(task) = self.observability_task {
            if let Err(e) = task.await {
                tracing::warn!(fehler = %e, "Observability-Task abgestuerzt");
            }
        }

        tracing::info!("Server beendet");
        ergebnis
    }
}
