use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use probe_state::{render_prometheus, ProbeRecord, ProbeStore};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProbeStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/httpStatus", get(http_status))
        .route("/results.json", get(results_json))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn http_status(State(state): State<AppState>) -> StatusCode {
    if state.store.all_ok() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn results_json(State(state): State<AppState>) -> Json<BTreeMap<String, Option<ProbeRecord>>> {
    let snapshot = state.store.snapshot();
    Json(snapshot.into_iter().map(|(host, r)| (host, r.as_deref().cloned())).collect())
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_prometheus(&state.store),
    )
}

async fn status_page(State(state): State<AppState>) -> Markup {
    render_status_page(&state.store)
}

const STYLE: &str = "body { font-family: sans-serif; } td, th { padding: 4px 8px; text-align: left; } \
    .OK { background: #dff0d8; } .ExpiresSoon { background: #fcf8e3; } \
    .Invalid, .NotFound, .GeneralFailure { background: #f2dede; }";

fn render_status_page(store: &ProbeStore) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "certcheck" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                table {
                    tr {
                        th { "Host" } th { "Result" } th { "Subject" } th { "Issuer" }
                        th { "Expires" } th { "Alt names" } th { "Checked" }
                    }
                    @for (host, record) in store.snapshot() {
                        @match record {
                            Some(r) => {
                                tr class=(r.kind.to_string()) {
                                    td { (host) }
                                    td { (r.description) }
                                    @if let Some(c) = &r.certificate {
                                        td { (c.subject_common_name) }
                                        td { (c.issuer_common_name) }
                                        td { (c.not_after.to_string()) }
                                        td { (c.subject_alternative_names.join(", ")) }
                                    } @else {
                                        td {} td {} td {} td {}
                                    }
                                    td { (r.checked_at.to_string()) }
                                }
                            }
                            None => {
                                tr {
                                    td { (host) }
                                    td colspan="6" { "not checked yet" }
                                }
                            }
                        }
                    }
                }
                p { "certcheck " (env!("CARGO_PKG_VERSION")) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Response;
    use certcheck_core::ProbeKind;
    use std::time::Duration;
    use time::OffsetDateTime;

    fn record(kind: ProbeKind) -> ProbeRecord {
        ProbeRecord {
            kind,
            description: kind.describe(Duration::from_secs(86400)),
            certificate: None,
            checked_at: OffsetDateTime::now_utc(),
            detail: None,
        }
    }

    fn state(hosts: &[&str]) -> AppState {
        AppState { store: Arc::new(ProbeStore::new(hosts.iter().copied())) }
    }

    async fn body(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn http_status_tracks_all_ok() {
        let st = state(&["a.example", "b.example"]);
        assert_eq!(http_status(State(st.clone())).await, StatusCode::INTERNAL_SERVER_ERROR);
        st.store.replace("a.example", record(ProbeKind::Ok)).unwrap();
        st.store.replace("b.example", record(ProbeKind::ExpiresSoon)).unwrap();
        assert_eq!(http_status(State(st.clone())).await, StatusCode::INTERNAL_SERVER_ERROR);
        st.store.replace("b.example", record(ProbeKind::Ok)).unwrap();
        assert_eq!(http_status(State(st)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn results_json_has_every_host() {
        let st = state(&["a.example", "b.example:8443"]);
        st.store.replace("a.example", record(ProbeKind::NotFound)).unwrap();
        let text = body(results_json(State(st)).await.into_response()).await;
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v.as_object().unwrap().len(), 2);
        assert_eq!(v["a.example"]["kind"], "NotFound");
        assert_eq!(v["a.example"]["description"], "Did not find a certificate valid for this domain");
        assert!(v["a.example"]["checked_at"].is_string());
        assert!(v.as_object().unwrap().contains_key("b.example:8443"));
        assert!(v["b.example:8443"].is_null());
    }

    #[tokio::test]
    async fn metrics_are_prometheus_text() {
        let st = state(&["a.example"]);
        st.store.replace("a.example", record(ProbeKind::Ok)).unwrap();
        let resp = metrics(State(st)).await.into_response();
        assert!(resp.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
        let text = body(resp).await;
        assert!(text.contains("certcheck_valid{host=\"a.example\"} 1"));
    }

    #[tokio::test]
    async fn status_page_escapes_values() {
        let st = state(&["<b>.example", "c.example"]);
        st.store.replace("<b>.example", record(ProbeKind::Invalid)).unwrap();
        let page = status_page(State(st)).await.into_string();
        assert!(page.contains("&lt;b&gt;.example"));
        assert!(page.contains("<tr class=\"Invalid\">"));
        assert!(!page.contains("<b>.example"));
        assert!(page.contains("Certificate invalid"));
        assert!(page.contains("not checked yet"));
    }

    #[tokio::test]
    async fn router_answers_over_tcp() {
        let st = state(&["a.example"]);
        st.store.replace("a.example", record(ProbeKind::Ok)).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { axum::serve(listener, router(st)).await });

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET /httpStatus HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        conn.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200"));
        server.abort();
    }
}
