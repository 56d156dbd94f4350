// Copyright (C) 2026  kubestate Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! HTTP handlers for the metrics feed

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::stream::{self, Stream, StreamExt};
use kubestate_collectors::Collector;
use kubestate_metrics::{validate, ExpositionWriter, Metric, MetricFamilyDef, TEXT_CONTENT_TYPE};
use std::future;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use crate::state::AppState;

const INDEX_PAGE: &str = r#"<html>
<head><title>kubestate</title></head>
<body>
<h1>kubestate</h1>
<ul>
<li><a href="/metrics">metrics</a></li>
<li><a href="/telemetry">telemetry</a></li>
<li><a href="/health">health</a></li>
</ul>
</body>
</html>
"#;

/// Whether the client listed gzip in `Accept-Encoding`
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|coding| {
            let mut parts = coding.split(';');
            let name = parts.next().unwrap_or_default().trim();
            let refused = parts.any(|param| {
                param
                    .trim()
                    .strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    == Some(0.0)
            });
            name.eq_ignore_ascii_case("gzip") && !refused
        })
}

/// Incremental encoder of the feed body
///
/// Each collector's output is encoded and drained on its own, so the body
/// never holds more than one collector at a time.
pub enum FeedEncoder {
    /// Uncompressed exposition text
    Plain(ExpositionWriter<Vec<u8>>),
    /// Exposition text through one gzip stream
    Gzip(ExpositionWriter<GzEncoder<Vec<u8>>>),
}

impl FeedEncoder {
    /// Create an encoder, compressing when `gzip` is set
    pub fn new(gzip: bool) -> Self {
        if gzip {
            FeedEncoder::Gzip(ExpositionWriter::new(GzEncoder::new(
                Vec::new(),
                Compression::default(),
            )))
        } else {
            FeedEncoder::Plain(ExpositionWriter::new(Vec::new()))
        }
    }

    /// Encode one collector's records and return the bytes ready to send
    pub fn encode(&mut self, families: &[MetricFamilyDef], records: &[Metric]) -> io::Result<Bytes> {
        match self {
            FeedEncoder::Plain(writer) => {
                writer.write_collection(families, records)?;
                Ok(Bytes::from(std::mem::take(writer.get_mut())))
            }
            FeedEncoder::Gzip(writer) => {
                writer.write_collection(families, records)?;
                writer.flush()?;
                Ok(Bytes::from(std::mem::take(writer.get_mut().get_mut())))
            }
        }
    }

    /// Finish the body and return its last bytes
    pub fn finish(self) -> io::Result<Bytes> {
        match self {
            FeedEncoder::Plain(mut writer) => Ok(Bytes::from(std::mem::take(writer.get_mut()))),
            FeedEncoder::Gzip(writer) => writer.into_inner().finish().map(Bytes::from),
        }
    }
}

struct FeedProgress {
    state: Arc<AppState>,
    next: usize,
    encoder: Option<FeedEncoder>,
    gzip: bool,
    started: Instant,
}

/// Stream the feed one collector at a time
///
/// The scrape duration is recorded once the last chunk has been produced.
pub fn feed_stream(state: Arc<AppState>, gzip: bool) -> impl Stream<Item = io::Result<Bytes>> + Send {
    let progress = FeedProgress {
        state,
        next: 0,
        encoder: Some(FeedEncoder::new(gzip)),
        gzip,
        started: Instant::now(),
    };

    stream::unfold(progress, |mut progress| async move {
        let mut encoder = progress.encoder.take()?;

        if let Some(collector) = progress.state.collectors.get(progress.next) {
            progress.next += 1;
            let chunk = encode_collector(&mut encoder, collector).await;
            if chunk.is_ok() {
                progress.encoder = Some(encoder);
            }
            return Some((chunk, progress));
        }

        let tail = encoder.finish();
        let elapsed = progress.started.elapsed();
        progress.state.telemetry.observe_scrape(elapsed.as_secs_f64());
        tracing::debug!(
            gzip = progress.gzip,
            elapsed_ms = elapsed.as_millis() as u64,
            "Served metrics feed"
        );
        Some((tail, progress))
    })
    .filter(|chunk| future::ready(!matches!(chunk, Ok(bytes) if bytes.is_empty())))
}

async fn encode_collector(encoder: &mut FeedEncoder, collector: &Collector) -> io::Result<Bytes> {
    let records = collector.emit().await;
    encoder.encode(collector.families(), &records).inspect_err(|e| {
        tracing::error!(collector = collector.name(), "Failed to render metrics feed: {}", e);
    })
}

/// Log label-schema defects of the current feed
async fn log_validation_issues(collectors: &[Collector]) {
    for collector in collectors {
        let records = collector.emit().await;
        for issue in validate(&records) {
            tracing::warn!(collector = collector.name(), "Invalid metric output: {}", issue);
        }
    }
}

/// GET /metrics - The object metrics feed
///
/// Serves whatever the stores hold right now; a struggling watcher only
/// makes its kind stale. The body is streamed one collector at a time.
pub async fn get_metrics(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let gzip = state.enable_gzip && accepts_gzip(&headers);

    if state.validate_output {
        log_validation_issues(&state.collectors).await;
    }

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        Body::from_stream(feed_stream(state, gzip)),
    )
        .into_response();
    if gzip {
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    response
}

/// GET /telemetry - The exporter's own metrics
pub async fn get_telemetry(State(state): State<Arc<AppState>>) -> Response {
    match state.telemetry.encode_text() {
        Ok(body) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to encode telemetry: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /health - Liveness check
pub async fn get_health() -> &'static str {
    "OK"
}

/// GET / - Landing page with links to the endpoints
pub async fn get_index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}
