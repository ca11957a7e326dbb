//! HTTP server for the Prometheus metrics endpoint and health probes

use super::Metrics;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// HTTP server exposing `/metrics`, `/health` and `/ready`
pub struct MetricsServer {
    metrics: Arc<Metrics>,
    addr: SocketAddr,
}

impl MetricsServer {
    pub fn new(metrics: Arc<Metrics>, addr: SocketAddr) -> Self {
        Self { metrics, addr }
    }

    /// Serve until `shutdown` flips to true
    pub async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Metrics server listening on http://{}/metrics", self.addr);

        loop {
            let (stream, _) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = shutdown.changed() => {
                    debug!("Metrics server shutting down");
                    return Ok(());
                }
            };
            let io = TokioIo::new(stream);
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let metrics = metrics.clone();
                    async move { Ok::<_, Infallible>(route(req.uri().path(), &metrics)) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving metrics connection: {:?}", err);
                }
            });
        }
    }
}

fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn route(path: &str, metrics: &Metrics) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => {
            let encoder = TextEncoder::new();
            let mut buffer = Vec::new();

            match encoder.encode(&metrics.registry.gather(), &mut buffer) {
                Ok(_) => {
                    let mut response = respond(StatusCode::OK, buffer);
                    if let Ok(value) = encoder.format_type().parse() {
                        response
                            .headers_mut()
                            .insert(hyper::header::CONTENT_TYPE, value);
                    }
                    response
                }
                Err(e) => {
                    error!("Failed to encode metrics: {}", e);
                    respond(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to encode metrics",
                    )
                }
            }
        }
        "/health" | "/healthz" => respond(StatusCode::OK, "OK"),
        "/ready" | "/readyz" => {
            if metrics.is_ready() {
                respond(StatusCode::OK, "OK")
            } else {
                respond(StatusCode::SERVICE_UNAVAILABLE, "MQTT not connected")
            }
        }
        _ => respond(StatusCode::NOT_FOUND, "Not Found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        let metrics = Metrics::new();

        assert_eq!(route("/health", &metrics).status(), StatusCode::OK);
        assert_eq!(route("/metrics", &metrics).status(), StatusCode::OK);
        assert_eq!(route("/nope", &metrics).status(), StatusCode::NOT_FOUND);

        assert_eq!(
            route("/ready", &metrics).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        metrics.set_inbound_connected(true);
        assert_eq!(route("/readyz", &metrics).status(), StatusCode::OK);
    }

    #[test]
    fn test_metrics_content_type() {
        let metrics = Metrics::new();
        let response = route("/metrics", &metrics);
        let content_type = response
            .headers()
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("text/plain"));
    }
}
