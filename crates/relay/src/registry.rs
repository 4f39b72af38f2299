//! Registry – Wer ist verbunden
//!
//! Haelt die Handles aller registrierten Sessions in Beitrittsreihenfolge.
//! Jede Aenderung und jeder Lesezugriff laeuft unter einem Mutex. Der
//! Broadcaster reiht unter diesem Lock ein; das Einreihen blockiert nie,
//! geschrieben wird erst vom Worker der jeweiligen Session.
//!
//! Nicknames sind reiner Anzeigetext und nicht eindeutig. Der Schluessel
//! einer Session ist ihre `SessionId`.
//!
//! ## Send-Queue
//! Jede Session hat eine Queue mit `queue_groesse` Plaetzen. Ist sie voll,
//! gilt die Zustellung als gescheitert. Solange der Worker selbst einen
//! Umschlag verarbeitet (etwa einen Dateitransfer) und die Queue deshalb
//! nicht leert, haelt eine [`Nachsicht`] das Limit offen.

use bytes::Bytes;
use flurfunk_core::SessionId;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standard-Groesse der Send-Queue pro Session
pub const SEND_QUEUE_GROESSE: usize = 256;

/// Vielfaches der Queue-Groesse, das waehrend einer Nachsicht erlaubt ist
const NACHSICHT_FAKTOR: usize = 64;

// ---------------------------------------------------------------------------
// Fuellstand
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Fuellstand {
    limit: usize,
    zaehler: Mutex<Zaehler>,
}

#[derive(Debug)]
struct Zaehler {
    ausstehend: usize,
    /// Aktuell wirksame Obergrenze
    grenze: usize,
    nachsichten: usize,
}

impl Fuellstand {
    fn neu(limit: usize) -> Self {
        Self {
            limit,
            zaehler: Mutex::new(Zaehler {
                ausstehend: 0,
                grenze: limit,
                nachsichten: 0,
            }),
        }
    }

    fn reservieren(&self) -> bool {
        let mut z = self.zaehler.lock();
        if z.ausstehend >= z.grenze {
            return false;
        }
        z.ausstehend += 1;
        true
    }

    fn zuruecknehmen(&self) {
        let mut z = self.zaehler.lock();
        z.ausstehend = z.ausstehend.saturating_sub(1);
    }

    fn entnommen(&self) {
        let mut z = self.zaehler.lock();
        z.ausstehend = z.ausstehend.saturating_sub(1);
        if z.nachsichten == 0 && z.ausstehend < self.limit {
            z.grenze = self.limit;
        }
    }

    fn nachsicht_beginnen(&self) {
        let mut z = self.zaehler.lock();
        z.nachsichten += 1;
        z.grenze = self.limit.saturating_mul(NACHSICHT_FAKTOR);
    }

    /// Der aufgelaufene Rueckstand darf noch abgearbeitet werden, erst
    /// danach gilt wieder das normale Limit
    fn nachsicht_beenden(&self) {
        let mut z = self.zaehler.lock();
        z.nachsichten = z.nachsichten.saturating_sub(1);
        if z.nachsichten == 0 {
            z.grenze = if z.ausstehend < self.limit {
                self.limit
            } else {
                z.ausstehend.saturating_add(self.limit)
            };
        }
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer registrierten Session
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub nickname: String,
    tx: mpsc::UnboundedSender<Bytes>,
    stand: Arc<Fuellstand>,
}

impl SessionHandle {
    /// Reiht einen serialisierten Umschlag nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn zustellen(&self, umschlag: Bytes) -> bool {
        if !self.stand.reservieren() {
            tracing::warn!(session = %self.id, nick = %self.nickname, "Send-Queue voll");
            return false;
        }
        if self.tx.send(umschlag).is_err() {
            self.stand.zuruecknehmen();
            tracing::debug!(session = %self.id, "Send-Queue geschlossen (Session beendet)");
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// SendeQueue
// ---------------------------------------------------------------------------

/// Empfangsseite der Send-Queue, gehoert dem Worker der Session
#[derive(Debug)]
pub struct SendeQueue {
    rx: mpsc::UnboundedReceiver<Bytes>,
    stand: Arc<Fuellstand>,
}

impl SendeQueue {
    /// Naechster Umschlag; `None` sobald die Session aus der Registry entfernt ist
    pub async fn recv(&mut self) -> Option<Bytes> {
        let umschlag = self.rx.recv().await?;
        self.stand.entnommen();
        Some(umschlag)
    }

    pub fn try_recv(&mut self) -> Result<Bytes, mpsc::error::TryRecvError> {
        let umschlag = self.rx.try_recv()?;
        self.stand.entnommen();
        Ok(umschlag)
    }

    /// Haelt das Queue-Limit offen, bis die zurueckgegebene Nachsicht faellt
    pub fn nachsicht(&self) -> Nachsicht {
        self.stand.nachsicht_beginnen();
        Nachsicht {
            stand: Arc::clone(&self.stand),
        }
    }
}

/// Solange sie lebt, trennt eine volle Queue die Session nicht
///
/// Obergrenze ist dann das `NACHSICHT_FAKTOR`-fache der Queue-Groesse.
#[derive(Debug)]
pub struct Nachsicht {
    stand: Arc<Fuellstand>,
}

impl Drop for Nachsicht {
    fn drop(&mut self) {
        self.stand.nachsicht_beenden();
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Geordnete Sammlung aller registrierten Sessions
#[derive(Debug)]
pub struct Registry {
    sessions: Mutex<Vec<SessionHandle>>,
    queue_groesse: usize,
}

impl Registry {
    pub fn neu(queue_groesse: usize) -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            queue_groesse: queue_groesse.max(1),
        }
    }

    /// Erzeugt Handle und Queue einer Session, ohne sie einzutragen
    pub fn handle_anlegen(
        &self,
        id: SessionId,
        nickname: impl Into<String>,
    ) -> (SessionHandle, SendeQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stand = Arc::new(Fuellstand::neu(self.queue_groesse));
        let handle = SessionHandle {
            id,
            nickname: nickname.into(),
            tx,
            stand: Arc::clone(&stand),
        };
        (handle, SendeQueue { rx, stand })
    }

    /// Registriert eine Session und gibt ihre Empfangs-Queue zurueck
    ///
    /// Der Session-Worker liest aus dieser Queue und schreibt auf den Stream.
    /// Sobald der Eintrag entfernt wird, endet die Queue.
    pub fn registrieren(&self, id: SessionId, nickname: impl Into<String>) -> SendeQueue {
        let (handle, queue) = self.handle_anlegen(id, nickname);
        tracing::debug!(session = %id, nick = %handle.nickname, "Session registriert");
        self.sessions.lock().push(handle);
        queue
    }

    /// Fuehrt `f` unter dem Registry-Lock aus
    ///
    /// `f` darf nicht blockieren; Zustellen ueber
    /// [`SessionHandle::zustellen`] ist erlaubt.
    pub fn gesperrt<T>(&self, f: impl FnOnce(&mut Vec<SessionHandle>) -> T) -> T {
        f(&mut self.sessions.lock())
    }

    /// Entfernt eine Session, gibt `None` zurueck wenn sie schon weg war
    pub fn entfernen(&self, id: &SessionId) -> Option<SessionHandle> {
        self.gesperrt(|sessions| entfernen_aus(sessions, id))
    }

    /// Erste Session (Beitrittsreihenfolge) mit diesem Nickname
    pub fn finden(&self, nickname: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .iter()
            .find(|s| s.nickname == nickname)
            .cloned()
    }

    /// Kopie aller Handles in Beitrittsreihenfolge
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.lock().clone()
    }

    /// Alle Nicknames in Beitrittsreihenfolge
    pub fn nicknames(&self) -> Vec<String> {
        nicknames_von(&self.sessions.lock())
    }

    pub fn ist_registriert(&self, id: &SessionId) -> bool {
        self.sessions.lock().iter().any(|s| &s.id == id)
    }

    pub fn anzahl(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::neu(SEND_QUEUE_GROESSE)
    }
}

pub(crate) fn entfernen_aus(sessions: &mut Vec<SessionHandle>, id: &SessionId) -> Option<SessionHandle> {
    let index = sessions.iter().position(|s| &s.id == id)?;
    Some(sessions.remove(index))
}

pub(crate) fn nicknames_von(sessions: &[SessionHandle]) -> Vec<String> {
    sessions.iter().map(|s| s.nickname.clone()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
