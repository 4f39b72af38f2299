//! File-Handler – Upload und Download ueber den Chat-Stream
//!
//! Nach `FILE_ACK ready` bzw. `FILE_START` folgen genau `size` Rohbytes ohne
//! Framing. Bytes, die der Framer bereits gepuffert hat, gehoeren dabei zum
//! Upload; was nach `size` Bytes uebrig bleibt, geht an den Framer zurueck.

use bytes::Bytes;
use flurfunk_protocol::{JsonFrameCodec, ServerNachricht};
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::codec::Framed;

use crate::dispatcher::Verarbeitung;
use crate::server_state::RelayState;
use crate::session::{direkt_senden, SessionEreignis, SessionKontext};

/// Verarbeitet FILE_METADATA: pruefen, bestaetigen, empfangen, ankuendigen
pub async fn handle_upload<S>(
    state: &RelayState,
    ctx: &SessionKontext,
    framed: &mut Framed<S, JsonFrameCodec>,
    filename: &str,
    size: u64,
    target: Option<String>,
) -> Verarbeitung
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let dateiname = match state.dateien.upload_pruefen(filename, size) {
        Ok(dateiname) => dateiname,
        Err(e) => {
            tracing::info!(dateiname = %filename, size, fehler = %e, "Upload abgelehnt");
            return ack_senden(framed, ServerNachricht::ack_fehler(e.to_string())).await;
        }
    };

    if let trennen @ Verarbeitung::Trennen(_) =
        ack_senden(framed, ServerNachricht::ack_bereit(&dateiname)).await
    {
        return trennen;
    }

    // Bereits gepufferte Bytes zuerst, danach direkt vom Stream
    let gepuffert = framed.read_buffer_mut().split().freeze();
    let mut leser = Cursor::new(gepuffert).chain(framed.get_mut());
    let ergebnis = state
        .dateien
        .upload_empfangen(&dateiname, size, &ctx.nickname, &mut leser)
        .await;

    let (rest, _) = leser.into_inner();
    let ungelesen = ungelesene_bytes(rest);
    if !ungelesen.is_empty() {
        framed.read_buffer_mut().extend_from_slice(&ungelesen);
    }

    match ergebnis {
        Ok(record) => {
            state.metriken.upload_bytes(record.size);
            let privat = target.as_deref().map(str::trim).filter(|t| !t.is_empty());
            let nachricht = ServerNachricht::FileAvailable {
                filename: record.filename.clone(),
                size: record.size,
                sender: record.sender.clone(),
                private: privat.is_some(),
                time: record.zeit.clone(),
            };

            match privat {
                Some(ziel) => state
                    .broadcaster
                    .an_passende_senden(&[ctx.nickname.as_str(), ziel], &nachricht),
                None => state.broadcaster.an_alle_senden(&nachricht),
            }
            Verarbeitung::Weiter
        }
        Err(e) => {
            state.metriken.file_transfers_failed_total.inc();
            tracing::warn!(dateiname = %dateiname, size, fehler = %e, "Upload fehlgeschlagen");
            ack_senden(framed, ServerNachricht::ack_fehler(e.to_string())).await
        }
    }
}

/// Verarbeitet FILE_REQUEST: FILE_START und danach den Dateiinhalt
///
/// Unbekannte Dateien werden ignoriert. Bricht der Download ab, ist der
/// Stream nicht mehr synchron und die Session endet.
pub async fn handle_download<S>(
    state: &RelayState,
    _ctx: &SessionKontext,
    framed: &mut Framed<S, JsonFrameCodec>,
    filename: &str,
) -> Verarbeitung
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let download = match state.dateien.download_oeffnen(filename) {
        Ok(Some(download)) => download,
        Ok(None) => {
            tracing::debug!(dateiname = %filename, "Download einer unbekannten Datei ignoriert");
            return Verarbeitung::Weiter;
        }
        Err(e) => {
            tracing::warn!(dateiname = %filename, fehler = %e, "Datei nicht lesbar, Download ignoriert");
            return Verarbeitung::Weiter;
        }
    };

    let dateiname = download.record.filename.clone();
    let start = ServerNachricht::FileStart {
        filename: dateiname.clone(),
        size: download.record.size,
    };
    if let Err(e) = direkt_senden(framed, &start).await {
        tracing::warn!(fehler = %e, "FILE_START konnte nicht gesendet werden");
        return Verarbeitung::Trennen(SessionEreignis::SendenFehlgeschlagen);
    }

    match state.dateien.download_senden(download, framed.get_mut()).await {
        Ok(gesendet) => {
            state.metriken.download_bytes(gesendet);
            Verarbeitung::Weiter
        }
        Err(e) => {
            state.metriken.file_transfers_failed_total.inc();
            tracing::warn!(dateiname = %dateiname, fehler = %e, "Download abgebrochen");
            Verarbeitung::Trennen(SessionEreignis::SendenFehlgeschlagen)
        }
    }
}

/// Sendet ein FILE_ACK, ein Schreibfehler beendet die Session
async fn ack_senden<S>(framed: &mut Framed<S, JsonFrameCodec>, ack: ServerNachricht) -> Verarbeitung
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match direkt_senden(framed, &ack).await {
        Ok(()) => Verarbeitung::Weiter,
        Err(e) => {
            tracing::debug!(fehler = %e, "FILE_ACK konnte nicht gesendet werden");
            Verarbeitung::Trennen(SessionEreignis::SendenFehlgeschlagen)
        }
    }
}

/// Bytes hinter der aktuellen Cursor-Position
fn ungelesene_bytes(cursor: Cursor<Bytes>) -> Bytes {
    let pos = cursor.position() as usize;
    let puffer = cursor.into_inner();
    if pos >= puffer.len() {
        Bytes::new()
    } else {
        puffer.slice(pos..)
    }
}
