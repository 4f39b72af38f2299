//! Fehler die bei der Server-Verbindung auftreten koennen

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP-Verbindung oder Datei-IO fehlgeschlagen
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Umschlag konnte nicht (de)serialisiert werden
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    /// Server hat die Verbindung beendet
    #[error("Verbindung vom Server getrennt")]
    VerbindungGetrennt,

    /// Keine passende Antwort innerhalb der Frist
    #[error("Timeout beim Warten auf den Server")]
    Timeout,

    /// Server hat den Handshake nicht bestaetigt
    #[error("Handshake abgelehnt")]
    HandshakeAbgelehnt,

    /// Server hat den Upload mit FILE_ACK error beantwortet
    #[error("Upload abgelehnt: {0}")]
    UploadAbgelehnt(String),

    /// Pfad hat keinen verwendbaren Dateinamen
    #[error("Ungueltiger Dateipfad: {0}")]
    UngueltigerPfad(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
