//! Disk-Speicher fuer Datei-Uploads
//!
//! Jeder Upload schreibt in eine eigene Teil-Datei `<name>.<uuid>.part`, die
//! erst nach vollstaendigem Empfang umbenannt wird. Ein abgebrochener Upload
//! hinterlaesst damit nie eine Datei unter dem endgueltigen Namen, und
//! parallele Uploads desselben Namens mischen nie ihre Bytes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{FileError, FileResult};

/// Vollstaendig empfangener, noch nicht veroeffentlichter Upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmpfangeneDatei {
    /// Eigene Teil-Datei dieses Uploads
    pub teil: PathBuf,
    pub size: u64,
    pub sha256: String,
}

/// Disk-basierter Speicher
///
/// Speichert Dateien flach unter `base_dir/<dateiname>`.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    base_dir: PathBuf,
    chunk_bytes: usize,
    timeout: Duration,
}

impl DiskStorage {
    pub fn new(base_dir: impl Into<PathBuf>, chunk_bytes: usize, timeout: Duration) -> Self {
        Self {
            base_dir: base_dir.into(),
            chunk_bytes: chunk_bytes.max(1),
            timeout,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Basisverzeichnis anlegen falls noetig
    pub async fn verzeichnis_anlegen(&self) -> FileResult<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    /// Endgueltiger Speicherort einer Datei
    pub fn pfad(&self, dateiname: &str) -> PathBuf {
        self.base_dir.join(dateiname)
    }

    /// Teil-Datei pro Upload, parallele Uploads gleichen Namens teilen sie nie
    fn teil_pfad(&self, dateiname: &str) -> PathBuf {
        self.base_dir
            .join(format!("{dateiname}.{}.part", Uuid::new_v4().simple()))
    }

    /// Liest genau `size` Bytes aus `leser` in eine eigene Teil-Datei
    ///
    /// Jeder einzelne Lesevorgang ist durch den Transfer-Timeout begrenzt.
    /// Bei Fehler wird die Teil-Datei entfernt. Sichtbar wird die Datei erst
    /// durch [`Self::veroeffentlichen`].
    pub async fn empfangen<R>(
        &self,
        dateiname: &str,
        leser: &mut R,
        size: u64,
    ) -> FileResult<EmpfangeneDatei>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let teil = self.teil_pfad(dateiname);
        match self.in_datei_schreiben(&teil, leser, size).await {
            Ok(sha256) => Ok(EmpfangeneDatei { teil, size, sha256 }),
            Err(e) => {
                teil_entfernen(&teil).await;
                Err(e)
            }
        }
    }

    /// Benennt die Teil-Datei in `dateiname` um
    ///
    /// Synchron, damit der Aufruf unter dem Lock des Index-Eintrags laufen
    /// kann. Eine vorhandene Datei wird atomar ersetzt.
    pub fn veroeffentlichen(&self, datei: &EmpfangeneDatei, dateiname: &str) -> FileResult<PathBuf> {
        let ziel = self.pfad(dateiname);
        std::fs::rename(&datei.teil, &ziel)?;
        tracing::debug!(pfad = %ziel.display(), bytes = datei.size, "Datei gespeichert");
        Ok(ziel)
    }

    /// Entfernt die Teil-Datei eines nicht veroeffentlichten Uploads
    pub async fn verwerfen(&self, datei: &EmpfangeneDatei) {
        teil_entfernen(&datei.teil).await;
    }

    /// Oeffnet eine gespeicherte Datei zum Senden
    ///
    /// Synchron wie [`Self::veroeffentlichen`]. Die geoeffnete Datei behaelt
    /// ihren Inhalt, auch wenn danach ein neuer Upload den Namen ersetzt.
    pub fn oeffnen(&self, pfad: &Path) -> FileResult<File> {
        match std::fs::File::open(pfad) {
            Ok(datei) => Ok(File::from_std(datei)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FileError::DateiNichtGefunden(pfad.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn in_datei_schreiben<R>(
        &self,
        teil: &Path,
        leser: &mut R,
        size: u64,
    ) -> FileResult<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut datei = File::create(teil).await?;
        let mut hasher = Sha256::new();
        let mut puffer = vec![0u8; self.chunk_bytes];
        let mut empfangen: u64 = 0;

        while empfangen < size {
            let rest = (size - empfangen).min(puffer.len() as u64) as usize;
            let n = tokio::time::timeout(self.timeout, leser.read(&mut puffer[..rest]))
                .await
                .map_err(|_| FileError::Timeout(self.timeout.as_secs()))??;

            if n == 0 {
                return Err(FileError::TransferUnterbrochen {
                    erwartet: size,
                    erhalten: empfangen,
                });
            }

            datei.write_all(&puffer[..n]).await?;
            hasher.update(&puffer[..n]);
            empfangen += n as u64;
        }

        datei.flush().await?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Schreibt genau `size` Bytes aus `datei` nach `schreiber`
    ///
    /// Ist die Datei kuerzer als angekuendigt, endet der Transfer mit
    /// `TransferUnterbrochen`.
    pub async fn senden<W>(&self, mut datei: File, schreiber: &mut W, size: u64) -> FileResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut puffer = vec![0u8; self.chunk_bytes];
        let mut gesendet: u64 = 0;

        while gesendet < size {
            let rest = (size - gesendet).min(puffer.len() as u64) as usize;
            let n = datei.read(&mut puffer[..rest]).await?;
            if n == 0 {
                return Err(FileError::TransferUnterbrochen {
                    erwartet: size,
                    erhalten: gesendet,
                });
            }
            tokio::time::timeout(self.timeout, schreiber.write_all(&puffer[..n]))
                .await
                .map_err(|_| FileError::Timeout(self.timeout.as_secs()))??;
            gesendet += n as u64;
        }

        tokio::time::timeout(self.timeout, schreiber.flush())
            .await
            .map_err(|_| FileError::Timeout(self.timeout.as_secs()))??;
        tracing::debug!(bytes = gesendet, "Datei gesendet");
        Ok(gesendet)
    }
}

async fn teil_entfernen(teil: &Path) {
    if let Err(e) = tokio::fs::remove_file(teil).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(pfad = %teil.display(), fehler = %e, "Teil-Datei nicht entfernt");
        }
    }
}
