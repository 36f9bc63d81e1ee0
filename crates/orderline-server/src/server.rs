use std::net::SocketAddr;

use axum::{Router, routing::get};
use orderline_auth::{AuthHttpState, auth_router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{config::AppConfig, handlers};

pub struct OrderlineServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(auth: AuthHttpState) -> Router {
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .merge(auth_router(auth))
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &axum::http::Request<_>| {
                        use tracing::field::Empty;
                        // Query strings carry authorization codes and state; log the path only.
                        tracing::info_span!(
                            "http.request",
                            http.method = %req.method(),
                            http.target = %req.uri().path(),
                            http.status_code = Empty,
                        )
                    })
                    .on_response(
                        |res: &axum::http::Response<_>,
                         latency: std::time::Duration,
                         span: &tracing::Span| {
                            span.record(
                                "http.status_code",
                                tracing::field::display(res.status().as_u16()),
                            );
                            tracing::info!(
                                http.status = %res.status().as_u16(),
                                elapsed_ms = %latency.as_millis(),
                                "request handled"
                            );
                        },
                    ),
            ),
        )
}

pub struct ServerBuilder {
    addr: SocketAddr,
    auth: AuthHttpState,
}

impl ServerBuilder {
    pub fn new(auth: AuthHttpState) -> Self {
        Self {
            addr: AppConfig::default().addr(),
            auth,
        }
    }

    pub fn with_config(mut self, cfg: &AppConfig) -> Self {
        self.addr = cfg.addr();
        self
    }

    pub fn build(self) -> OrderlineServer {
        OrderlineServer {
            addr: self.addr,
            app: build_app(self.auth),
        }
    }
}

impl OrderlineServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
