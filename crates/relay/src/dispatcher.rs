//! Message-Dispatcher – Routet Umschlaege an die richtigen Handler
//!
//! Der Dispatcher parst einen vom Framer gelieferten Umschlag und ruft den
//! zustaendigen Handler auf. Unbekannte oder kaputte Umschlaege werden
//! ignoriert und nie beantwortet.

use flurfunk_protocol::{ClientNachricht, JsonFrameCodec};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::handlers::{chat_handler, file_handler};
use crate::server_state::RelayState;
use crate::session::{SessionEreignis, SessionKontext};

/// Ergebnis der Verarbeitung eines Umschlags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verarbeitung {
    /// Session laeuft weiter
    Weiter,
    /// Session muss beendet werden
    Trennen(SessionEreignis),
}

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<RelayState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Verarbeitet einen eingehenden Umschlag
    ///
    /// Datei-Handler brauchen den Stream selbst, weil nach FILE_ACK bzw.
    /// FILE_START Rohbytes ohne Framing folgen.
    pub async fn dispatch<S>(
        &self,
        rohdaten: &[u8],
        ctx: &SessionKontext,
        framed: &mut Framed<S, JsonFrameCodec>,
    ) -> Verarbeitung
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let nachricht = match ClientNachricht::aus_json(rohdaten) {
            Ok(nachricht) => nachricht,
            Err(e) => {
                tracing::debug!(fehler = %e, bytes = rohdaten.len(), "Umschlag ignoriert");
                return Verarbeitung::Weiter;
            }
        };

        self.state.metriken.umschlag_zaehlen(nachricht.typ_name());
        tracing::trace!(typ = nachricht.typ_name(), "Umschlag empfangen");

        match nachricht {
            ClientNachricht::TextMessage { message } => {
                chat_handler::handle_text(&self.state, ctx, message);
                Verarbeitung::Weiter
            }
            ClientNachricht::Whisper { target, message } => {
                chat_handler::handle_whisper(&self.state, ctx, &target, message);
                Verarbeitung::Weiter
            }
            ClientNachricht::FileMetadata {
                filename,
                size,
                target,
            } => {
                file_handler::handle_upload(&self.state, ctx, framed, &filename, size, target)
                    .await
            }
            ClientNachricht::FileRequest { filename } => {
                file_handler::handle_download(&self.state, ctx, framed, &filename).await
            }
            ClientNachricht::Disconnect => {
                tracing::debug!("Client hat DISCONNECT gesendet");
                Verarbeitung::Trennen(SessionEreignis::TrennenAngefordert)
            }
        }
    }
}
