//! FileService – Upload und Download mit Groessen-Pruefung
//!
//! Ablauf Upload:
//!
//! ```text
//! FILE_METADATA ──► upload_pruefen ──► FILE_ACK ready ──► upload_empfangen
//!                        │                                     │
//!                        ▼                                     ▼
//!                  FILE_ACK error                  FileIndex + FILE_AVAILABLE
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    dateiname::dateiname_bereinigen,
    error::{FileError, FileResult},
    index::FileIndex,
    storage::DiskStorage,
    types::FileRecord,
};

/// Konfiguration des Datei-Service
#[derive(Debug, Clone)]
pub struct DateiConfig {
    pub verzeichnis: PathBuf,
    /// Groesstes akzeptiertes Upload in Bytes
    pub max_bytes: u64,
    pub chunk_bytes: usize,
    /// Maximale Wartezeit pro Chunk
    pub transfer_timeout: Duration,
}

impl Default for DateiConfig {
    fn default() -> Self {
        Self {
            verzeichnis: PathBuf::from("server_files"),
            max_bytes: 1024 * 1024 * 1024,
            chunk_bytes: 8192,
            transfer_timeout: Duration::from_secs(60),
        }
    }
}

/// Verwaltet Datei-Uploads und Downloads
pub struct FileService {
    storage: DiskStorage,
    index: FileIndex,
    max_bytes: u64,
}

impl FileService {
    pub fn neu(config: DateiConfig) -> Arc<Self> {
        Arc::new(Self {
            storage: DiskStorage::new(
                config.verzeichnis,
                config.chunk_bytes,
                config.transfer_timeout,
            ),
            index: FileIndex::neu(),
            max_bytes: config.max_bytes,
        })
    }

    pub async fn verzeichnis_anlegen(&self) -> FileResult<()> {
        self.storage.verzeichnis_anlegen().await
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    /// Prueft die Metadaten eines Uploads, gibt den bereinigten Namen zurueck
    pub fn upload_pruefen(&self, dateiname: &str, size: u64) -> FileResult<String> {
        let bereinigt = dateiname_bereinigen(dateiname)
            .ok_or_else(|| FileError::UngueltigerDateiname(dateiname.to_string()))?;

        if size > self.max_bytes {
            return Err(FileError::DateiZuGross {
                size,
                max: self.max_bytes,
            });
        }
        Ok(bereinigt)
    }

    /// Empfaengt `size` Rohbytes und registriert die Datei im Index
    ///
    /// `dateiname` muss bereits durch [`Self::upload_pruefen`] bereinigt sein.
    /// Nur ein vollstaendiger Upload erzeugt einen Eintrag. Umbenennen und
    /// Eintragen passieren in einem Schritt, bei parallelen Uploads desselben
    /// Namens gewinnt der zuletzt fertige vollstaendig.
    pub async fn upload_empfangen<R>(
        &self,
        dateiname: &str,
        size: u64,
        sender: &str,
        leser: &mut R,
    ) -> FileResult<FileRecord>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let empfangen = self.storage.empfangen(dateiname, leser, size).await?;

        let record = FileRecord {
            filename: dateiname.to_string(),
            size: empfangen.size,
            sender: sender.to_string(),
            pfad: self.storage.pfad(dateiname),
            zeit: flurfunk_core::uhrzeit_jetzt(),
            hochgeladen_am: Utc::now(),
            sha256: empfangen.sha256.clone(),
        };

        let ersetzt = self.index.ersetzen_mit(record.clone(), || {
            self.storage.veroeffentlichen(&empfangen, dateiname).map(drop)
        });
        match ersetzt {
            Ok(Some(_)) => {
                tracing::debug!(dateiname = %record.filename, "Vorhandener Datei-Eintrag ersetzt");
            }
            Ok(None) => {}
            Err(e) => {
                self.storage.verwerfen(&empfangen).await;
                return Err(e);
            }
        }

        tracing::info!(
            dateiname = %record.filename,
            bytes = record.size,
            sender = %record.sender,
            sha256 = %record.sha256,
            "Datei hochgeladen"
        );
        Ok(record)
    }

    /// Sucht eine Datei fuer einen Download
    pub fn download_finden(&self, dateiname: &str) -> Option<FileRecord> {
        self.index.finden(dateiname)
    }

    /// Oeffnet eine registrierte Datei samt dem dazu passenden Eintrag
    ///
    /// `Ok(None)` fuer unbekannte Namen.
    pub fn download_oeffnen(&self, dateiname: &str) -> FileResult<Option<Download>> {
        let geoeffnet = self.index.lesen_mit(dateiname, |record| {
            self.storage.oeffnen(&record.pfad).map(|datei| Download {
                record: record.clone(),
                datei,
            })
        });
        geoeffnet.transpose()
    }

    /// Sendet den Inhalt einer geoeffneten Datei als Rohbytes
    pub async fn download_senden<W>(&self, download: Download, schreiber: &mut W) -> FileResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let Download { record, datei } = download;
        let gesendet = self.storage.senden(datei, schreiber, record.size).await?;
        tracing::info!(dateiname = %record.filename, bytes = gesendet, "Datei heruntergeladen");
        Ok(gesendet)
    }
}

/// Zum Senden geoeffnete Datei
///
/// Inhalt und `record` gehoeren zum selben Upload, auch wenn der Name
/// inzwischen neu belegt wurde.
#[derive(Debug)]
pub struct Download {
    pub record: FileRecord,
    datei: File,
}
