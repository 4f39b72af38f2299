//! Event-Broadcaster – Verteilt Umschlaege an registrierte Sessions
//!
//! Jeder Umschlag wird genau einmal serialisiert. Eingereiht wird unter dem
//! Registry-Lock: Beitritt, Austritt und Teilnehmerliste kommen dadurch bei
//! allen Empfaengern in derselben Reihenfolge an, und die zuletzt gesendete
//! Liste entspricht immer dem aktuellen Stand.
//!
//! ## Selektives Broadcasting
//! - An alle Sessions: `an_alle_senden`
//! - An den ersten Treffer eines Nicknames: `an_nickname_senden`
//! - An alle Sessions mit passendem Nickname: `an_passende_senden`
//!
//! Scheitert die Zustellung an eine Session (Queue voll oder geschlossen),
//! wird genau diese Session nach dem Fan-out getrennt.

use bytes::Bytes;
use flurfunk_core::{uhrzeit_jetzt, SessionId};
use flurfunk_observability::FlurfunkMetrics;
use flurfunk_protocol::ServerNachricht;
use std::sync::Arc;

use crate::registry::{entfernen_aus, nicknames_von, Registry, SendeQueue, SessionHandle};

/// Zentraler Broadcaster fuer alle registrierten Sessions
///
/// Clone teilt Registry und Metriken.
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<Registry>,
    metriken: FlurfunkMetrics,
}

impl EventBroadcaster {
    pub fn neu(registry: Arc<Registry>, metriken: FlurfunkMetrics) -> Self {
        Self { registry, metriken }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Beitritt und Austritt
    // -----------------------------------------------------------------------

    /// Registriert eine Session und kuendigt sie allen an
    ///
    /// Sendet `"<nick> joined the chat"` und danach die neue Teilnehmerliste.
    pub fn session_beitreten(&self, id: SessionId, nickname: &str) -> SendeQueue {
        let (handle, queue) = self.registry.handle_anlegen(id, nickname);
        let meldung = ServerNachricht::system(format!("{nickname} joined the chat"), uhrzeit_jetzt());

        let (anzahl, fehlgeschlagen) = self.registry.gesperrt(|sessions| {
            sessions.push(handle);
            (sessions.len(), mit_liste_zustellen(sessions, &meldung))
        });
        self.metriken.connected_clients.set(anzahl as i64);

        tracing::info!(session = %id, nick = %nickname, "Teilnehmer beigetreten");
        self.fehlgeschlagene_trennen(fehlgeschlagen);
        queue
    }

    /// Entfernt eine Session und kuendigt den Austritt an
    ///
    /// Idempotent: nur der Aufruf, der den Eintrag tatsaechlich entfernt,
    /// sendet `"<nick> left the chat"` und die Teilnehmerliste.
    pub fn session_trennen(&self, id: &SessionId) -> bool {
        let entfernt = self.registry.gesperrt(|sessions| {
            let handle = entfernen_aus(sessions, id)?;
            let meldung = ServerNachricht::system(
                format!("{} left the chat", handle.nickname),
                uhrzeit_jetzt(),
            );
            let fehlgeschlagen = mit_liste_zustellen(sessions, &meldung);
            Some((handle, sessions.len(), fehlgeschlagen))
        });
        let Some((handle, anzahl, fehlgeschlagen)) = entfernt else {
            return false;
        };
        self.metriken.connected_clients.set(anzahl as i64);

        tracing::info!(session = %handle.id, nick = %handle.nickname, "Teilnehmer gegangen");
        self.fehlgeschlagene_trennen(fehlgeschlagen);
        true
    }

    // -----------------------------------------------------------------------
    // Zustellung
    // -----------------------------------------------------------------------

    /// Sendet einen Umschlag an alle registrierten Sessions
    pub fn an_alle_senden(&self, nachricht: &ServerNachricht) {
        let Some(umschlag) = serialisieren(nachricht) else {
            return;
        };
        let fehlgeschlagen = self
            .registry
            .gesperrt(|sessions| einreihen(sessions.iter(), &[umschlag]));
        self.fehlgeschlagene_trennen(fehlgeschlagen);
    }

    /// Sendet einen Umschlag an die erste Session mit diesem Nickname
    ///
    /// Gibt `false` zurueck wenn kein Teilnehmer so heisst.
    pub fn an_nickname_senden(&self, nickname: &str, nachricht: &ServerNachricht) -> bool {
        let Some(umschlag) = serialisieren(nachricht) else {
            return false;
        };
        let fehlgeschlagen = self.registry.gesperrt(|sessions| {
            let handle = sessions.iter().find(|s| s.nickname == nickname)?;
            Some(einreihen(std::iter::once(handle), &[umschlag]))
        });
        match fehlgeschlagen {
            Some(fehlgeschlagen) => {
                self.fehlgeschlagene_trennen(fehlgeschlagen);
                true
            }
            None => false,
        }
    }

    /// Sendet einen Umschlag an alle Sessions, deren Nickname in `nicknames` steht
    pub fn an_passende_senden(&self, nicknames: &[&str], nachricht: &ServerNachricht) {
        let Some(umschlag) = serialisieren(nachricht) else {
            return;
        };
        let fehlgeschlagen = self.registry.gesperrt(|sessions| {
            einreihen(
                sessions
                    .iter()
                    .filter(|s| nicknames.contains(&s.nickname.as_str())),
                &[umschlag],
            )
        });
        self.fehlgeschlagene_trennen(fehlgeschlagen);
    }

    /// Sendet die aktuelle Teilnehmerliste an alle
    pub fn roster_senden(&self) {
        let fehlgeschlagen = self.registry.gesperrt(|sessions| {
            let liste = ServerNachricht::UserList {
                users: nicknames_von(sessions),
            };
            match serialisieren(&liste) {
                Some(umschlag) => einreihen(sessions.iter(), &[umschlag]),
                None => Vec::new(),
            }
        });
        self.fehlgeschlagene_trennen(fehlgeschlagen);
    }

    /// Trennt Sessions, bei denen das Einreihen scheiterte
    fn fehlgeschlagene_trennen(&self, fehlgeschlagen: Vec<SessionId>) {
        for id in fehlgeschlagen {
            self.metriken.dropped_deliveries_total.inc();
            self.session_trennen(&id);
        }
    }
}

/// Reiht `meldung` und danach die Teilnehmerliste bei allen `sessions` ein
fn mit_liste_zustellen(sessions: &[SessionHandle], meldung: &ServerNachricht) -> Vec<SessionId> {
    let liste = ServerNachricht::UserList {
        users: nicknames_von(sessions),
    };
    match (serialisieren(meldung), serialisieren(&liste)) {
        (Some(meldung), Some(liste)) => einreihen(sessions.iter(), &[meldung, liste]),
        _ => Vec::new(),
    }
}

/// Reiht `umschlaege` der Reihe nach ein, gibt die gescheiterten Sessions zurueck
fn einreihen<'a>(
    empfaenger: impl Iterator<Item = &'a SessionHandle>,
    umschlaege: &[Bytes],
) -> Vec<SessionId> {
    empfaenger
        .filter(|s| !umschlaege.iter().all(|u| s.zustellen(u.clone())))
        .map(|s| s.id)
        .collect()
}

fn serialisieren(nachricht: &ServerNachricht) -> Option<Bytes> {
    match nachricht.to_bytes() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!(typ = nachricht.typ_name(), fehler = %e, "Serialisierung fehlgeschlagen");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
