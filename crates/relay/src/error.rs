//! Fehlertypen fuer das Relay

use flurfunk_files::FileError;
use thiserror::Error;

/// Fehlertyp fuer das Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Umschlag ist kein gueltiges JSON fuer den erwarteten Typ
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    /// Fehler beim Dateiversand
    #[error("Dateifehler: {0}")]
    Datei(#[from] FileError),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Kein Handshake innerhalb der Frist
    #[error("Handshake-Timeout")]
    HandshakeTimeout,

    /// Handshake ohne brauchbaren Nickname
    #[error("Ungueltiger Nickname")]
    UngueltigerNickname,
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;
