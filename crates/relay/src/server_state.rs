//! Gemeinsamer Zustand aller Session-Tasks

use flurfunk_files::{DateiConfig, FileService};
use flurfunk_observability::FlurfunkMetrics;
use flurfunk_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::EventBroadcaster;
use crate::registry::{Registry, SEND_QUEUE_GROESSE};

/// Laufzeit-Konfiguration des Relays
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: usize,
    /// Frist fuer den Nickname-Handshake
    pub handshake_timeout: Duration,
    /// Groesse der Send-Queue pro Session
    pub send_queue_groesse: usize,
    pub max_frame_bytes: usize,
    /// Wartezeit auf laufende Sessions beim Herunterfahren
    pub shutdown_grace: Duration,
    pub dateien: DateiConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            handshake_timeout: Duration::from_secs(5),
            send_queue_groesse: SEND_QUEUE_GROESSE,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            shutdown_grace: Duration::from_secs(10),
            dateien: DateiConfig::default(),
        }
    }
}

/// Geteilter Zustand (Arc) fuer alle Verbindungen
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    /// Registrierte Sessions in Beitrittsreihenfolge
    pub registry: Arc<Registry>,
    pub broadcaster: EventBroadcaster,
    /// Upload/Download und Datei-Index
    pub dateien: Arc<FileService>,
    pub metriken: FlurfunkMetrics,
    /// Startzeitpunkt des Relays (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    pub fn neu(config: RelayConfig, metriken: FlurfunkMetrics) -> Arc<Self> {
        let registry = Arc::new(Registry::neu(config.send_queue_groesse));
        let broadcaster = EventBroadcaster::neu(Arc::clone(&registry), metriken.clone());
        let dateien = FileService::neu(config.dateien.clone());

        Arc::new(Self {
            config: Arc::new(config),
            registry,
            broadcaster,
            dateien,
            metriken,
            start_time: Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
