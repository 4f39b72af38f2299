//! Client-seitige TCP-Verbindung zum Flurfunk-Server
//!
//! Nutzt den JsonFrameCodec aus flurfunk-protocol fuer das Wire-Format
//! (aneinandergehaengte JSON-Objekte). Alle Operationen sind async.
//!
//! Umschlaege, die beim Warten auf eine bestimmte Antwort ankommen, werden
//! gepuffert und von [`ChatClient::naechste_nachricht`] in Reihenfolge
//! ausgeliefert.

use futures_util::{SinkExt, StreamExt};
use flurfunk_protocol::{AckStatus, ClientNachricht, Handshake, JsonFrameCodec, ServerNachricht};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::error::{ClientError, ClientResult};

/// Standard-Frist fuer Antworten vom Server
const ANTWORT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// TCP-Verbindung zu einem Flurfunk-Server nach erfolgreichem Handshake
pub struct ChatClient {
    framed: Framed<TcpStream, JsonFrameCodec>,
    nickname: String,
    /// Bereits gelesene, noch nicht abgeholte Umschlaege
    ausstehend: VecDeque<ServerNachricht>,
    antwort_timeout: Duration,
}

impl ChatClient {
    /// Baut eine Verbindung auf und fuehrt den Nickname-Handshake durch
    ///
    /// Kehrt erst nach `CONNECTION_SUCCESS` zurueck.
    pub async fn verbinden(addr: impl ToSocketAddrs, nickname: &str) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        tracing::debug!(server = %peer, nick = %nickname, "TCP-Verbindung hergestellt");

        let mut client = Self {
            framed: Framed::new(stream, JsonFrameCodec::new()),
            nickname: nickname.trim().to_string(),
            ausstehend: VecDeque::new(),
            antwort_timeout: ANTWORT_TIMEOUT,
        };

        client.framed.send(Handshake::neu(nickname).to_bytes()?).await?;
        match client.lesen().await {
            Ok(ServerNachricht::ConnectionSuccess { message }) => {
                tracing::info!(server = %peer, "{message}");
                Ok(client)
            }
            Ok(anders) => {
                tracing::warn!(typ = anders.typ_name(), "Unerwartete Antwort auf Handshake");
                Err(ClientError::HandshakeAbgelehnt)
            }
            Err(ClientError::VerbindungGetrennt) => Err(ClientError::HandshakeAbgelehnt),
            Err(e) => Err(e),
        }
    }

    /// Setzt die Frist fuer Antworten vom Server
    pub fn mit_timeout(mut self, timeout: Duration) -> Self {
        self.antwort_timeout = timeout;
        self
    }

    /// Eigener (getrimmter) Nickname
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    pub async fn text_senden(&mut self, message: &str) -> ClientResult<()> {
        self.senden(&ClientNachricht::TextMessage {
            message: message.to_string(),
        })
        .await
    }

    /// Sendet eine Fluesternachricht; der Server schickt kein Echo zurueck
    pub async fn fluestern(&mut self, ziel: &str, message: &str) -> ClientResult<()> {
        self.senden(&ClientNachricht::Whisper {
            target: ziel.to_string(),
            message: message.to_string(),
        })
        .await
    }

    /// Meldet sich mit DISCONNECT ab und schliesst die Verbindung
    pub async fn trennen(mut self) -> ClientResult<()> {
        self.senden(&ClientNachricht::Disconnect).await?;
        self.framed.close().await?;
        tracing::debug!(nick = %self.nickname, "Verbindung getrennt");
        Ok(())
    }

    /// Naechster Umschlag vom Server (gepufferte zuerst)
    pub async fn naechste_nachricht(&mut self) -> ClientResult<ServerNachricht> {
        match self.ausstehend.pop_front() {
            Some(nachricht) => Ok(nachricht),
            None => self.lesen().await,
        }
    }

    /// Wartet auf den ersten Umschlag, der `pruefen` erfuellt
    ///
    /// Uebersprungene Umschlaege bleiben fuer `naechste_nachricht` erhalten.
    pub async fn warten_auf(
        &mut self,
        pruefen: impl Fn(&ServerNachricht) -> bool,
    ) -> ClientResult<ServerNachricht> {
        if let Some(index) = self.ausstehend.iter().position(&pruefen) {
            if let Some(nachricht) = self.ausstehend.remove(index) {
                return Ok(nachricht);
            }
        }

        loop {
            let nachricht = self.lesen().await?;
            if pruefen(&nachricht) {
                return Ok(nachricht);
            }
            self.ausstehend.push_back(nachricht);
        }
    }

    // -----------------------------------------------------------------------
    // Dateien
    // -----------------------------------------------------------------------

    /// Laedt eine lokale Datei hoch, gibt den vom Server bereinigten Namen zurueck
    pub async fn datei_hochladen(&mut self, pfad: &Path, ziel: Option<&str>) -> ClientResult<String> {
        let dateiname = pfad
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::UngueltigerPfad(pfad.display().to_string()))?
            .to_string();
        let mut datei = tokio::fs::File::open(pfad).await?;
        let size = datei.metadata().await?.len();

        self.hochladen_von(&dateiname, size, &mut datei, ziel).await
    }

    /// Laedt Bytes aus dem Speicher unter `dateiname` hoch
    pub async fn daten_hochladen(
        &mut self,
        dateiname: &str,
        daten: &[u8],
        ziel: Option<&str>,
    ) -> ClientResult<String> {
        let mut leser = daten;
        self.hochladen_von(dateiname, daten.len() as u64, &mut leser, ziel)
            .await
    }

    async fn hochladen_von<R>(
        &mut self,
        dateiname: &str,
        size: u64,
        leser: &mut R,
        ziel: Option<&str>,
    ) -> ClientResult<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.senden(&ClientNachricht::FileMetadata {
            filename: dateiname.to_string(),
            size,
            target: ziel.map(str::to_string),
        })
        .await?;

        let ack = self
            .warten_auf(|n| matches!(n, ServerNachricht::FileAck { .. }))
            .await?;
        let bereinigt = match ack {
            ServerNachricht::FileAck {
                status: AckStatus::Ready,
                filename,
                ..
            } => filename.unwrap_or_else(|| dateiname.to_string()),
            ServerNachricht::FileAck { message, .. } => {
                return Err(ClientError::UploadAbgelehnt(message.unwrap_or_default()));
            }
            _ => return Err(ClientError::UploadAbgelehnt(String::new())),
        };

        let stream = self.framed.get_mut();
        let gesendet = tokio::io::copy(&mut leser.take(size), stream).await?;
        stream.flush().await?;
        if gesendet < size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("Quelle lieferte nur {gesendet} von {size} Bytes"),
            )
            .into());
        }

        tracing::debug!(dateiname = %bereinigt, bytes = size, "Upload gesendet");
        Ok(bereinigt)
    }

    /// Fordert eine Datei an und schreibt ihren Inhalt nach `ziel`
    ///
    /// Unbekannte Dateien beantwortet der Server nicht, das endet hier mit
    /// `ClientError::Timeout`.
    pub async fn datei_herunterladen<W>(&mut self, dateiname: &str, ziel: &mut W) -> ClientResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.senden(&ClientNachricht::FileRequest {
            filename: dateiname.to_string(),
        })
        .await?;

        let start = self
            .warten_auf(|n| matches!(n, ServerNachricht::FileStart { filename, .. } if filename == dateiname))
            .await?;
        let ServerNachricht::FileStart { size, .. } = start else {
            return Err(ClientError::VerbindungGetrennt);
        };

        // Rohbytes, die der Framer schon gelesen hat, gehoeren zur Datei
        let puffer = self.framed.read_buffer_mut();
        let aus_puffer = puffer.len().min(usize::try_from(size).unwrap_or(usize::MAX));
        let vorab = puffer.split_to(aus_puffer);
        ziel.write_all(&vorab).await?;

        let rest = size - aus_puffer as u64;
        let kopiert = tokio::time::timeout(
            self.antwort_timeout,
            tokio::io::copy(&mut self.framed.get_mut().take(rest), ziel),
        )
        .await
        .map_err(|_| ClientError::Timeout)??;
        ziel.flush().await?;

        if kopiert < rest {
            return Err(ClientError::VerbindungGetrennt);
        }
        tracing::debug!(dateiname = %dateiname, bytes = size, "Download abgeschlossen");
        Ok(size)
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    async fn senden(&mut self, nachricht: &ClientNachricht) -> ClientResult<()> {
        self.framed.send(nachricht.to_bytes()?).await?;
        Ok(())
    }

    async fn lesen(&mut self) -> ClientResult<ServerNachricht> {
        let frame = tokio::time::timeout(self.antwort_timeout, self.framed.next())
            .await
            .map_err(|_| ClientError::Timeout)?;

        match frame {
            Some(Ok(rohdaten)) => Ok(ServerNachricht::aus_json(&rohdaten)?),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::VerbindungGetrennt),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
