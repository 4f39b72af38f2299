//! Prometheus-kompatible Metriken fuer Flurfunk
//!
//! Registrierte Metriken:
//! - `flurfunk_connected_clients` – Gauge: Aktuell registrierte Sessions
//! - `flurfunk_envelopes_total` – Counter: Empfangene Umschlaege (type)
//! - `flurfunk_dropped_deliveries_total` – Counter: Zustellungen an volle/geschlossene Queues
//! - `flurfunk_file_bytes_total` – Counter: Datei-Bytes (direction = upload/download)
//! - `flurfunk_file_transfers_failed_total` – Counter: Abgebrochene Transfers

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Flurfunk-Prometheus-Metriken
///
/// Jede Instanz hat eine eigene Registry, Tests koennen also beliebig viele
/// Server parallel starten.
#[derive(Clone)]
pub struct FlurfunkMetrics {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub envelopes_total: IntCounterVec,
    pub dropped_deliveries_total: IntCounter,
    pub file_bytes_total: IntCounterVec,
    pub file_transfers_failed_total: IntCounter,
}

impl FlurfunkMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "flurfunk_connected_clients",
            "Anzahl aktuell registrierter Chat-Sessions",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let envelopes_total = IntCounterVec::new(
            Opts::new(
                "flurfunk_envelopes_total",
                "Gesamtanzahl empfangener Umschlaege nach Typ",
            ),
            &["type"],
        )?;
        registry.register(Box::new(envelopes_total.clone()))?;

        let dropped_deliveries_total = IntCounter::with_opts(Opts::new(
            "flurfunk_dropped_deliveries_total",
            "Zustellungen, die an einer vollen oder geschlossenen Queue scheiterten",
        ))?;
        registry.register(Box::new(dropped_deliveries_total.clone()))?;

        let file_bytes_total = IntCounterVec::new(
            Opts::new(
                "flurfunk_file_bytes_total",
                "Uebertragene Datei-Bytes nach Richtung",
            ),
            &["direction"],
        )?;
        registry.register(Box::new(file_bytes_total.clone()))?;

        let file_transfers_failed_total = IntCounter::with_opts(Opts::new(
            "flurfunk_file_transfers_failed_total",
            "Abgebrochene Datei-Uploads und Downloads",
        ))?;
        registry.register(Box::new(file_transfers_failed_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            envelopes_total,
            dropped_deliveries_total,
            file_bytes_total,
            file_transfers_failed_total,
        })
    }

    /// Zaehlt einen empfangenen Umschlag
    pub fn umschlag_zaehlen(&self, typ: &str) {
        self.envelopes_total.with_label_values(&[typ]).inc();
    }

    pub fn upload_bytes(&self, bytes: u64) {
        self.file_bytes_total
            .with_label_values(&["upload"])
            .inc_by(bytes);
    }

    pub fn download_bytes(&self, bytes: u64) {
        self.file_bytes_total
            .with_label_values(&["download"])
            .inc_by(bytes);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: FlurfunkMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<FlurfunkMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
