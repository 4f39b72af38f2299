//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Config-Datei):
//! - `FF_LOG_LEVEL`: EnvFilter-Ausdruck, z.B. `info` oder `flurfunk_relay=debug`
//! - `FF_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Session-IDs und Peer-Adressen werden als Span-Felder propagiert.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anders => Err(format!("Unbekanntes Log-Format: {anders}")),
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `FF_LOG_LEVEL` und `FF_LOG_FORMAT` ueberschreiben die uebergebenen Werte.
/// Ungueltige Werte fallen auf `info` / `text` zurueck. Ein zweiter Aufruf
/// ist wirkungslos.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("FF_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = log_format_aus_env()
        .unwrap_or_else(|| format.to_string())
        .parse::<LogFormat>()
        .unwrap_or_default();

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging war bereits initialisiert");
    }
}

/// Log-Format aus `FF_LOG_FORMAT`, falls gesetzt
pub fn log_format_aus_env() -> Option<String> {
    std::env::var("FF_LOG_FORMAT").ok()
}

/// Prueft ob ein Level-Ausdruck als EnvFilter gueltig ist
pub fn log_level_gueltig(level: &str) -> bool {
    !level.trim().is_empty() && EnvFilter::try_new(level).is_ok()
}
