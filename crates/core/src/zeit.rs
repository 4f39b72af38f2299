//! Server-Uhr fuer Zeitstempel in Nachrichten
//!
//! Alle `time`-Felder auf dem Draht tragen die lokale Uhrzeit des Servers
//! im Format `HH:MM`.

use chrono::{DateTime, Local, TimeZone};

/// Format der Zeitstempel auf dem Draht
pub const UHRZEIT_FORMAT: &str = "%H:%M";

/// Aktuelle lokale Server-Uhrzeit als `HH:MM`
pub fn uhrzeit_jetzt() -> String {
    uhrzeit_formatieren(&Local::now())
}

/// Formatiert einen beliebigen Zeitpunkt als `HH:MM`
pub fn uhrzeit_formatieren<Tz: TimeZone>(zeitpunkt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    zeitpunkt.format(UHRZEIT_FORMAT).to_string()
}
