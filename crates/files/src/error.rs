//! Fehlertypen fuer das Datei-Crate

use thiserror::Error;

/// Fehler beim Hoch- oder Herunterladen von Dateien
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Ungueltiger Dateiname: {0:?}")]
    UngueltigerDateiname(String),

    #[error("Datei zu gross: {size} Bytes (Maximum: {max} Bytes)")]
    DateiZuGross { size: u64, max: u64 },

    #[error("Transfer unterbrochen: {erhalten} von {erwartet} Bytes")]
    TransferUnterbrochen { erwartet: u64, erhalten: u64 },

    #[error("Transfer-Timeout: {0} Sekunden ohne Daten")]
    Timeout(u64),

    #[error("Datei nicht gefunden: {0}")]
    DateiNichtGefunden(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type FileResult<T> = Result<T, FileError>;
