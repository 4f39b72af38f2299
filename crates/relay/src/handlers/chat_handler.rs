//! Chat-Handler – Oeffentliche Nachrichten und Fluestern

use flurfunk_core::uhrzeit_jetzt;
use flurfunk_protocol::ServerNachricht;

use crate::server_state::RelayState;
use crate::session::SessionKontext;

/// Verteilt eine oeffentliche Nachricht an alle, auch an den Absender
pub fn handle_text(state: &RelayState, ctx: &SessionKontext, message: String) {
    let nachricht = ServerNachricht::TextMessage {
        sender: ctx.nickname.clone(),
        message,
        time: uhrzeit_jetzt(),
    };
    state.broadcaster.an_alle_senden(&nachricht);
}

/// Stellt eine private Nachricht nur dem Ziel zu
///
/// Unbekannte Ziele werden still verworfen. Der Absender bekommt kein Echo.
pub fn handle_whisper(state: &RelayState, ctx: &SessionKontext, target: &str, message: String) {
    let nachricht = ServerNachricht::Whisper {
        sender: ctx.nickname.clone(),
        message,
        time: uhrzeit_jetzt(),
    };

    if state.broadcaster.an_nickname_senden(target, &nachricht) {
        tracing::debug!(ziel = %target, "Fluesternachricht zugestellt");
    } else {
        tracing::debug!(ziel = %target, "Fluester-Ziel unbekannt – verworfen");
    }
}
