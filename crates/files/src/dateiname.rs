//! Bereinigung von Dateinamen aus Client-Metadaten

/// Behaelt nur alphanumerische Zeichen, Leerzeichen, `.`, `_` und `-`
///
/// Pfad-Trenner verschwinden dadurch vollstaendig. Gibt `None` zurueck,
/// wenn nach der Bereinigung kein brauchbarer Name uebrig bleibt (leer
/// oder nur Punkte).
pub fn dateiname_bereinigen(roh: &str) -> Option<String> {
    let bereinigt: String = roh
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();
    let bereinigt = bereinigt.trim_end();

    if bereinigt.is_empty() || bereinigt.chars().all(|c| c == '.') {
        return None;
    }
    Some(bereinigt.to_string())
}
