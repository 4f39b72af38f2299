//! Client-Session – Verwaltet eine einzelne Verbindung
//!
//! Jede Verbindung bekommt eine `ClientSession` in einem eigenen
//! tokio-Task. Die State Machine ist eine reine Funktion und damit ohne
//! Netzwerk testbar.
//!
//! ## State Machine
//! ```text
//! Handshake --HandshakeEmpfangen--> Aktiv --NachrichtEmpfangen--+
//!     |                               |  ^                       |
//!     |                               |  +-----------------------+
//!     +---- jeder Fehler ---------> Geschlossen <-- Trennen/EOF/Shutdown
//! ```
//!
//! ## Ablauf
//! - Handshake: erster Umschlag muss einen Nickname tragen (mit Frist)
//! - Aktiv: `select!` ueber eingehende Frames, die eigene Send-Queue und
//!   das Shutdown-Signal
//! - Geschlossen: Austritt aus der Registry, Abschied an alle

use flurfunk_core::SessionId;
use flurfunk_protocol::{Handshake, JsonFrameCodec, ServerNachricht};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::Instrument;

use crate::dispatcher::{MessageDispatcher, Verarbeitung};
use crate::error::{RelayError, RelayResult};
use crate::server_state::RelayState;

// ---------------------------------------------------------------------------
// Sessionzustand
// ---------------------------------------------------------------------------

/// Zustand einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    /// Verbunden, Nickname noch nicht empfangen
    Handshake,
    /// Registriert, Nachrichten werden verarbeitet
    Aktiv,
    /// Verbindung beendet (Endzustand)
    Geschlossen,
}

/// Ereignisse, die den Sessionzustand veraendern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEreignis {
    /// Gueltiger Nickname empfangen
    HandshakeEmpfangen,
    /// Handshake ohne Nickname, mit kaputtem JSON oder nach Fristablauf
    HandshakeUngueltig,
    /// Umschlag im aktiven Zustand empfangen
    NachrichtEmpfangen,
    /// Gegenseite hat die Verbindung geschlossen
    VerbindungGeschlossen,
    /// Lese- oder Protokollfehler auf dem Stream
    Lesefehler,
    /// Client hat DISCONNECT gesendet
    TrennenAngefordert,
    /// Schreiben fehlgeschlagen oder Session vom Broadcaster entfernt
    SendenFehlgeschlagen,
    /// Server faehrt herunter
    Shutdown,
}

impl SessionZustand {
    /// Berechnet den Folgezustand
    pub fn uebergang(self, ereignis: SessionEreignis) -> Self {
        use SessionEreignis::*;

        match (self, ereignis) {
            (Self::Geschlossen, _) => Self::Geschlossen,
            (Self::Handshake, HandshakeEmpfangen) => Self::Aktiv,
            (Self::Aktiv, NachrichtEmpfangen) => Self::Aktiv,
            (
                _,
                HandshakeUngueltig | VerbindungGeschlossen | Lesefehler | TrennenAngefordert
                | SendenFehlgeschlagen | Shutdown,
            ) => Self::Geschlossen,
            // Unpassende Ereignisse aendern nichts
            (zustand, HandshakeEmpfangen | NachrichtEmpfangen) => zustand,
        }
    }

    pub fn ist_aktiv(self) -> bool {
        self == Self::Aktiv
    }
}

/// Kontext der aktuellen Session fuer die Handler
#[derive(Debug, Clone)]
pub struct SessionKontext {
    pub id: SessionId,
    pub nickname: String,
    pub peer_addr: SocketAddr,
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne Verbindung
///
/// Generisch ueber den Stream, damit Tests `tokio::io::duplex` verwenden
/// koennen.
pub struct ClientSession {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
}

impl ClientSession {
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Fuehrt die Session bis zum Ende aus und gibt den Endzustand zurueck
    pub async fn verarbeiten<S>(self, stream: S, shutdown_rx: watch::Receiver<bool>) -> SessionZustand
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let peer_addr = self.peer_addr;
        let mut framed = Framed::new(
            stream,
            JsonFrameCodec::with_max_size(self.state.config.max_frame_bytes),
        );
        let zustand = SessionZustand::Handshake;

        let nickname = match self.handshake(&mut framed).await {
            Ok(nickname) => nickname,
            Err(e) => {
                tracing::info!(peer = %peer_addr, fehler = %e, "Handshake fehlgeschlagen");
                return zustand.uebergang(SessionEreignis::HandshakeUngueltig);
            }
        };

        let ctx = SessionKontext {
            id: SessionId::new(),
            nickname,
            peer_addr,
        };
        let span = tracing::info_span!("session", session = %ctx.id, nick = %ctx.nickname, peer = %peer_addr);

        self.aktiv(framed, ctx, shutdown_rx, zustand.uebergang(SessionEreignis::HandshakeEmpfangen))
            .instrument(span)
            .await
    }

    /// Liest den ersten Umschlag und gibt den getrimmten Nickname zurueck
    async fn handshake<S>(&self, framed: &mut Framed<S, JsonFrameCodec>) -> RelayResult<String>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let frame = tokio::time::timeout(self.state.config.handshake_timeout, framed.next())
            .await
            .map_err(|_| RelayError::HandshakeTimeout)?;

        let rohdaten = match frame {
            Some(Ok(rohdaten)) => rohdaten,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(RelayError::VerbindungGetrennt),
        };

        let handshake: Handshake = serde_json::from_slice(&rohdaten)?;
        handshake
            .gueltiger_nickname()
            .map(str::to_string)
            .ok_or(RelayError::UngueltigerNickname)
    }

    async fn aktiv<S>(
        self,
        mut framed: Framed<S, JsonFrameCodec>,
        ctx: SessionKontext,
        mut shutdown_rx: watch::Receiver<bool>,
        mut zustand: SessionZustand,
    ) -> SessionZustand
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let broadcaster = &self.state.broadcaster;

        // Begruessung geht direkt raus, bevor die eigene Queue gelesen wird
        let willkommen = ServerNachricht::ConnectionSuccess {
            message: format!("Welcome, {}!", ctx.nickname),
        };
        if let Err(e) = direkt_senden(&mut framed, &willkommen).await {
            tracing::warn!(fehler = %e, "Begruessung konnte nicht gesendet werden");
            return zustand.uebergang(SessionEreignis::SendenFehlgeschlagen);
        }

        let mut sende_rx = broadcaster.session_beitreten(ctx.id, &ctx.nickname);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        let ende = if *shutdown_rx.borrow() {
            SessionEreignis::Shutdown
        } else {
            loop {
                tokio::select! {
                    // Eingehender Umschlag vom Client
                    frame = framed.next() => {
                        match frame {
                            Some(Ok(rohdaten)) => {
                                zustand = zustand.uebergang(SessionEreignis::NachrichtEmpfangen);
                                // Waehrend der Verarbeitung (auch Dateitransfers) leert
                                // niemand die eigene Queue
                                let nachsicht = sende_rx.nachsicht();
                                let verarbeitung =
                                    dispatcher.dispatch(&rohdaten, &ctx, &mut framed).await;
                                drop(nachsicht);
                                if let Verarbeitung::Trennen(ereignis) = verarbeitung {
                                    break ereignis;
                                }
                            }
                            Some(Err(e)) => {
                                tracing::warn!(fehler = %e, "Frame-Lesefehler");
                                break SessionEreignis::Lesefehler;
                            }
                            None => {
                                tracing::debug!("Verbindung vom Client getrennt");
                                break SessionEreignis::VerbindungGeschlossen;
                            }
                        }
                    }

                    // Ausgehender Umschlag aus dem Broadcaster
                    ausgehend = sende_rx.recv() => {
                        match ausgehend {
                            Some(umschlag) => {
                                if let Err(e) = framed.send(umschlag).await {
                                    tracing::warn!(fehler = %e, "Senden fehlgeschlagen");
                                    break SessionEreignis::SendenFehlgeschlagen;
                                }
                            }
                            // Vom Broadcaster entfernt (Queue lief ueber)
                            None => break SessionEreignis::SendenFehlgeschlagen,
                        }
                    }

                    // Shutdown-Signal
                    Ok(()) = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Shutdown-Signal – Session wird beendet");
                            break SessionEreignis::Shutdown;
                        }
                    }
                }
            }
        };

        zustand = zustand.uebergang(ende);
        broadcaster.session_trennen(&ctx.id);
        drop(framed);

        tracing::info!(grund = ?ende, "Session beendet");
        zustand
    }
}

/// Schreibt einen Umschlag direkt auf den Stream, an der Queue vorbei
pub(crate) async fn direkt_senden<S>(
    framed: &mut Framed<S, JsonFrameCodec>,
    nachricht: &ServerNachricht,
) -> RelayResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(nachricht.to_bytes()?).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use SessionEreignis::*;

    const SCHLIESSEND: [SessionEreignis; 6] = [
        HandshakeUngueltig,
        VerbindungGeschlossen,
        Lesefehler,
        TrennenAngefordert,
        SendenFehlgeschlagen,
        Shutdown,
    ];

    #[test]
    fn handshake_wird_aktiv() {
        assert_eq!(
            SessionZustand::Handshake.uebergang(HandshakeEmpfangen),
            SessionZustand::Aktiv
        );
    }

    #[test]
    fn aktiv_bleibt_bei_nachrichten_aktiv() {
        let mut zustand = SessionZustand::Aktiv;
        for _ in 0..3 {
            zustand = zustand.uebergang(NachrichtEmpfangen);
        }
        assert!(zustand.ist_aktiv());
    }

    #[test]
    fn fehler_schliessen_aus_jedem_zustand() {
        for ereignis in SCHLIESSEND {
            assert_eq!(
                SessionZustand::Handshake.uebergang(ereignis),
                SessionZustand::Geschlossen,
                "Handshake + {ereignis:?}"
            );
            assert_eq!(
                SessionZustand::Aktiv.uebergang(ereignis),
                SessionZustand::Geschlossen,
                "Aktiv + {ereignis:?}"
            );
        }
    }

    #[test]
    fn geschlossen_ist_endzustand() {
        for ereignis in [HandshakeEmpfangen, NachrichtEmpfangen]
            .into_iter()
            .chain(SCHLIESSEND)
        {
            assert_eq!(
                SessionZustand::Geschlossen.uebergang(ereignis),
                SessionZustand::Geschlossen
            );
        }
    }

    #[test]
    fn nachricht_vor_handshake_aendert_nichts() {
        assert_eq!(
            SessionZustand::Handshake.uebergang(NachrichtEmpfangen),
            SessionZustand::Handshake
        );
    }
}
