//! Prozessweiter Index aller hochgeladenen Dateien

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::FileResult;
use crate::types::FileRecord;

/// Datei-Index, Schluessel ist der bereinigte Dateiname
///
/// Ein erneuter Upload unter demselben Namen ersetzt den Eintrag.
/// Eintraege bleiben bis zum Prozessende erhalten.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    eintraege: Arc<DashMap<String, FileRecord>>,
}

impl FileIndex {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuehrt `ablegen` aus und traegt danach `record` ein
    ///
    /// Beides laeuft unter dem Lock des Eintrags: wer denselben Namen liest
    /// oder ersetzt, sieht Datei und Eintrag immer zusammen. Schlaegt
    /// `ablegen` fehl, bleibt der alte Eintrag unveraendert. Gibt den
    /// ersetzten Eintrag zurueck.
    pub fn ersetzen_mit<F>(&self, record: FileRecord, ablegen: F) -> FileResult<Option<FileRecord>>
    where
        F: FnOnce() -> FileResult<()>,
    {
        match self.eintraege.entry(record.filename.clone()) {
            Entry::Occupied(mut eintrag) => {
                ablegen()?;
                Ok(Some(eintrag.insert(record)))
            }
            Entry::Vacant(eintrag) => {
                ablegen()?;
                eintrag.insert(record);
                Ok(None)
            }
        }
    }

    /// Ruft `f` auf, solange der Eintrag gegen Ersetzen gesperrt ist
    ///
    /// `f` darf nicht blockieren.
    pub fn lesen_mit<T>(&self, dateiname: &str, f: impl FnOnce(&FileRecord) -> T) -> Option<T> {
        self.eintraege.get(dateiname).map(|eintrag| f(eintrag.value()))
    }

    pub fn finden(&self, dateiname: &str) -> Option<FileRecord> {
        self.lesen_mit(dateiname, FileRecord::clone)
    }

    pub fn anzahl(&self) -> usize {
        self.eintraege.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.eintraege.is_empty()
    }
}
