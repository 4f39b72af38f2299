//! Wire-Format fuer TCP-Verbindungen
//!
//! Umschlaege sind UTF-8-JSON-Objekte ohne Laengenpraefix und ohne
//! Trennzeichen. Die Grenzen werden von einem inkrementellen Scanner
//! bestimmt, der Verschachtelung, Strings und Escapes kennt.
//!
//! ## Frame-Erkennung
//!
//! ```text
//!  {"type":"TEXT_MESSAGE","message":"a } b"}{"type":"WHISPER",...
//!  ^ Tiefe 1          } im String zaehlt nicht ^ Tiefe 0 -> Frame fertig
//! ```
//!
//! - Leerraum zwischen Umschlaegen wird verworfen
//! - Jeder Umschlag muss mit `{` beginnen
//! - Der Scan-Fortschritt bleibt zwischen zwei `decode`-Aufrufen erhalten,
//!   jedes Byte wird genau einmal betrachtet
//! - Maximale Frame-Groesse ist konfigurierbar (Standard: 1 MB)
//!
//! Ob ein fertiger Frame ein gueltiger Umschlag ist, entscheidet erst der
//! Empfaenger beim typisierten Parsen.

use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Scanner-Zustand
// ---------------------------------------------------------------------------

/// Fortschritt innerhalb des aktuell unvollstaendigen Umschlags
#[derive(Debug, Clone, Default)]
struct ScanZustand {
    /// Naechste noch nicht betrachtete Position (relativ zum Frame-Anfang)
    pos: usize,
    /// Aktuelle Verschachtelungstiefe ueber `{`/`[`
    tiefe: usize,
    im_string: bool,
    escape: bool,
}

// ---------------------------------------------------------------------------
// JsonFrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer aneinandergehaengte JSON-Objekte
///
/// Der Decoder liefert jeden vollstaendigen Umschlag als `Bytes`, der
/// Encoder schreibt bereits serialisierte Umschlaege unveraendert.
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::Framed;
/// use flurfunk_protocol::wire::JsonFrameCodec;
///
/// // let stream = TcpStream::connect(...).await?;
/// // let framed = Framed::new(stream, JsonFrameCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct JsonFrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
    scan: ScanZustand,
}

impl JsonFrameCodec {
    /// Erstellt einen neuen `JsonFrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `JsonFrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            scan: ScanZustand::default(),
        }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn zu_gross(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Umschlag zu gross (Maximum: {} Bytes)",
                self.max_frame_size
            ),
        )
    }
}

impl Default for JsonFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for JsonFrameCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.scan.pos == 0 {
            let leerraum = src.iter().take_while(|b| b.is_ascii_whitespace()).count();
            src.advance(leerraum);

            match src.first().copied() {
                None => return Ok(None),
                Some(b'{') => {}
                Some(anderes) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Umschlag muss mit '{{' beginnen, erhalten: 0x{anderes:02x}"),
                    ));
                }
            }
        }

        let mut i = self.scan.pos;
        while i < src.len() {
            if i >= self.max_frame_size {
                return Err(self.zu_gross());
            }

            let byte = src[i];
            if self.scan.im_string {
                if self.scan.escape {
                    self.scan.escape = false;
                } else if byte == b'\\' {
                    self.scan.escape = true;
                } else if byte == b'"' {
                    self.scan.im_string = false;
                }
            } else {
                match byte {
                    b'"' => self.scan.im_string = true,
                    b'{' | b'[' => self.scan.tiefe += 1,
                    b'}' | b']' => {
                        self.scan.tiefe = self.scan.tiefe.saturating_sub(1);
                        if self.scan.tiefe == 0 {
                            self.scan = ScanZustand::default();
                            return Ok(Some(src.split_to(i + 1).freeze()));
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }

        self.scan.pos = i;
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            Ok(None)
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Verbindung mitten im Umschlag getrennt ({} Bytes offen)",
                    src.len()
                ),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<Bytes> for JsonFrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                    item.len(),
                    self.max_frame_size
                ),
            ));
        }

        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
