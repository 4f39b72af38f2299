//! Oeffentliche Typen fuer den Datei-Service

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Server-seitiger Eintrag fuer eine vollstaendig hochgeladene Datei
///
/// `size` entspricht immer der Anzahl tatsaechlich gespeicherter Bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Bereinigter Dateiname (zugleich Download-Schluessel)
    pub filename: String,
    pub size: u64,
    /// Nickname des Absenders
    pub sender: String,
    pub pfad: PathBuf,
    /// Server-Uhrzeit des Uploads (`HH:MM`)
    pub zeit: String,
    pub hochgeladen_am: DateTime<Utc>,
    /// SHA-256 des Inhalts (hex)
    pub sha256: String,
}
