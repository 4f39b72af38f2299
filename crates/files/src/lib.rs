//! flurfunk-files – Dateiversand
//!
//! Dieses Crate implementiert:
//! - Dateinamen-Bereinigung gegen Path-Traversal
//! - DiskStorage: streamendes Speichern und Lesen mit fester Chunk-Groesse
//! - FileIndex: Datei-Eintraege fuer spaetere Downloads (prozessweit)
//! - FileService: Upload/Download-Ablauf mit Groessen-Limit und SHA-256
//!
//! # Beispiel
//!
//! ```no_run
//! use flurfunk_files::{DateiConfig, FileService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = FileService::neu(DateiConfig::default());
//!     service.verzeichnis_anlegen().await.unwrap();
//! }
//! ```

pub mod dateiname;
pub mod error;
pub mod index;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use dateiname::dateiname_bereinigen;
pub use error::{FileError, FileResult};
pub use index::FileIndex;
pub use service::{DateiConfig, Download, FileService};
pub use storage::{DiskStorage, EmpfangeneDatei};
pub use types::FileRecord;
