//! Unit-Tests fuer den DiskStorage

use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::error::FileError;
use crate::storage::DiskStorage;

fn temp_storage() -> (DiskStorage, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
    let storage = DiskStorage::new(dir.path(), 4, Duration::from_secs(5));
    (storage, dir)
}

#[tokio::test]
async fn test_empfangen_schreibt_genau_size_bytes() {
    let (storage, dir) = temp_storage();

    // Nach den angekuendigten Bytes folgt bereits die naechste Nachricht
    let mut leser: &[u8] = b"Hallo Welt{\"type\":\"X\"}";
    let empfangen = storage
        .empfangen("gruss.txt", &mut leser, 10)
        .await
        .expect("Empfangen fehlgeschlagen");

    assert_eq!(empfangen.size, 10);
    assert_eq!(leser, b"{\"type\":\"X\"}");
    // Vor dem Veroeffentlichen gibt es den endgueltigen Namen noch nicht
    assert!(!dir.path().join("gruss.txt").exists());

    storage.veroeffentlichen(&empfangen, "gruss.txt").unwrap();
    assert!(!empfangen.teil.exists());
    let inhalt = std::fs::read(dir.path().join("gruss.txt")).unwrap();
    assert_eq!(inhalt, b"Hallo Welt");
}

#[tokio::test]
async fn test_empfangen_berechnet_sha256() {
    let (storage, _dir) = temp_storage();

    let mut leser: &[u8] = b"abc";
    let gespeichert = storage.empfangen("abc.txt", &mut leser, 3).await.unwrap();

    assert_eq!(
        gespeichert.sha256,
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[tokio::test]
async fn test_empfangen_null_bytes() {
    let (storage, dir) = temp_storage();

    let mut leser: &[u8] = b"";
    let empfangen = storage.empfangen("leer.txt", &mut leser, 0).await.unwrap();
    storage.veroeffentlichen(&empfangen, "leer.txt").unwrap();

    assert_eq!(empfangen.size, 0);
    assert_eq!(std::fs::read(dir.path().join("leer.txt")).unwrap().len(), 0);
}

#[tokio::test]
async fn test_abgebrochener_upload_hinterlaesst_keine_datei() {
    let (storage, dir) = temp_storage();

    let mut leser: &[u8] = b"nur sieben";
    let ergebnis = storage.empfangen("kaputt.bin", &mut leser, 100).await;

    match ergebnis {
        Err(FileError::TransferUnterbrochen { erwartet, erhalten }) => {
            assert_eq!(erwartet, 100);
            assert_eq!(erhalten, 10);
        }
        anders => panic!("Unerwartetes Ergebnis: {anders:?}"),
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empfangen_timeout_ohne_daten() {
    let dir = tempfile::tempdir().unwrap();
    let storage = DiskStorage::new(dir.path(), 8, Duration::from_secs(60));

    // Schreibseite bleibt offen, sendet aber nichts
    let (mut leser, _schreiber) = tokio::io::duplex(64);
    let ergebnis = storage.empfangen("wartet.bin", &mut leser, 5).await;

    assert!(matches!(ergebnis, Err(FileError::Timeout(60))));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_senden_liefert_dateiinhalt() {
    let (storage, dir) = temp_storage();
    let pfad = dir.path().join("quelle.bin");
    let daten: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    std::fs::write(&pfad, &daten).unwrap();

    let mut ziel = Vec::new();
    let datei = storage.oeffnen(&pfad).unwrap();
    let gesendet = storage
        .senden(datei, &mut ziel, daten.len() as u64)
        .await
        .unwrap();

    assert_eq!(gesendet, 1000);
    assert_eq!(ziel, daten);
}

#[tokio::test]
async fn test_senden_zu_kurze_datei_fehler() {
    let (storage, dir) = temp_storage();
    let pfad = dir.path().join("kurz.bin");
    std::fs::write(&pfad, b"123").unwrap();

    let mut ziel = Vec::new();
    let datei = storage.oeffnen(&pfad).unwrap();
    let ergebnis = storage.senden(datei, &mut ziel, 10).await;

    assert!(matches!(
        ergebnis,
        Err(FileError::TransferUnterbrochen {
            erwartet: 10,
            erhalten: 3
        })
    ));
}

#[tokio::test]
async fn test_oeffnen_fehlende_datei() {
    let (storage, dir) = temp_storage();

    let ergebnis = storage.oeffnen(&dir.path().join("gibt_es_nicht"));

    assert!(matches!(ergebnis, Err(FileError::DateiNichtGefunden(_))));
}

#[tokio::test]
async fn test_empfangen_aus_duplex_in_mehreren_teilen() {
    let (storage, dir) = temp_storage();
    let (mut leser, mut schreiber) = tokio::io::duplex(3);

    let sender = tokio::spawn(async move {
        schreiber.write_all(b"0123456789abcdef").await.unwrap();
    });

    let empfangen = storage.empfangen("teile.txt", &mut leser, 16).await.unwrap();
    sender.await.unwrap();
    storage.veroeffentlichen(&empfangen, "teile.txt").unwrap();

    assert_eq!(empfangen.size, 16);
    assert_eq!(
        std::fs::read(dir.path().join("teile.txt")).unwrap(),
        b"0123456789abcdef"
    );
}

#[tokio::test]
async fn test_parallele_uploads_haben_eigene_teil_dateien() {
    let (storage, _dir) = temp_storage();

    let mut erster: &[u8] = b"aaaa";
    let mut zweiter: &[u8] = b"bbbb";
    let a = storage.empfangen("gleich.bin", &mut erster, 4).await.unwrap();
    let b = storage.empfangen("gleich.bin", &mut zweiter, 4).await.unwrap();

    assert_ne!(a.teil, b.teil);
    assert_eq!(std::fs::read(&a.teil).unwrap(), b"aaaa");
    assert_eq!(std::fs::read(&b.teil).unwrap(), b"bbbb");
}

#[tokio::test]
async fn test_verwerfen_entfernt_teil_datei() {
    let (storage, dir) = temp_storage();

    let mut leser: &[u8] = b"weg";
    let empfangen = storage.empfangen("weg.txt", &mut leser, 3).await.unwrap();
    storage.verwerfen(&empfangen).await;

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
