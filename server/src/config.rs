//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::Context;
use flurfunk_files::DateiConfig;
use flurfunk_relay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Dateiversand
    pub dateien: DateiEinstellungen,
    /// Fristen und Puffergroessen
    pub limits: LimitEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Flurfunk".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer Chat und Observability
    pub bind_adresse: String,
    /// Port fuer die Chat-Verbindungen
    pub tcp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 5555,
        }
    }
}

/// Dateiversand-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DateiEinstellungen {
    /// Ablageverzeichnis fuer hochgeladene Dateien
    pub verzeichnis: PathBuf,
    /// Groesste akzeptierte Datei in Bytes
    pub max_bytes: u64,
    /// Chunk-Groesse beim Lesen und Schreiben
    pub chunk_bytes: usize,
}

impl Default for DateiEinstellungen {
    fn default() -> Self {
        Self {
            verzeichnis: PathBuf::from("server_files"),
            max_bytes: 1024 * 1024 * 1024,
            chunk_bytes: 8192,
        }
    }
}

/// Fristen und Puffergroessen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitEinstellungen {
    pub handshake_timeout_sek: u64,
    /// Maximale Wartezeit pro Datei-Chunk
    pub transfer_timeout_sek: u64,
    /// Umschlaege pro Session, bevor ein langsamer Client getrennt wird
    pub send_queue: usize,
    pub max_frame_bytes: usize,
    /// Wartezeit auf laufende Sessions beim Herunterfahren
    pub shutdown_grace_sek: u64,
}

impl Default for LimitEinstellungen {
    fn default() -> Self {
        Self {
            handshake_timeout_sek: 5,
            transfer_timeout_sek: 60,
            send_queue: 256,
            max_frame_bytes: 1024 * 1024,
            shutdown_grace_sek: 10,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// EnvFilter-Ausdruck, z.B. "info" oder "info,flurfunk_relay=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Bind-Adresse fuer die Chat-Verbindungen
    pub fn tcp_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Bind-Adresse fuer den Observability-Server
    pub fn observability_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.observability.port)
    }

    /// Uebersetzt die Datei-Konfiguration in die Laufzeit-Konfiguration des Relays
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            max_clients: self.server.max_clients,
            handshake_timeout: Duration::from_secs(self.limits.handshake_timeout_sek),
            send_queue_groesse: self.limits.send_queue,
            max_frame_bytes: self.limits.max_frame_bytes,
            shutdown_grace: Duration::from_secs(self.limits.shutdown_grace_sek),
            dateien: DateiConfig {
                verzeichnis: self.dateien.verzeichnis.clone(),
                max_bytes: self.dateien.max_bytes,
                chunk_bytes: self.dateien.chunk_bytes,
                transfer_timeout: Duration::from_secs(self.limits.transfer_timeout_sek),
            },
        }
    }
}

fn adresse(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let text = if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    text.parse()
        .with_context(|| format!("Ungueltige Bind-Adresse '{text}'"))
}
