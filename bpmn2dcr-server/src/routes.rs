//! HTTP handlers for the translation service.

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use bpmn2dcr_core::dcr::model::{DcrGraph, RelationKind};
use bpmn2dcr_core::xml::dcr_xml;
use bpmn2dcr_core::CompileError;

const SERVICE_NAME: &str = "BPMN2DCR Translation Service";
const SERVICE_VERSION: &str = "1.0.0";

pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/translate", post(translate))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

#[derive(Serialize)]
struct RootEndpoints {
    health: &'static str,
    translate: &'static str,
}

#[derive(Serialize)]
struct RootResponse {
    service: &'static str,
    version: &'static str,
    endpoints: RootEndpoints,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        endpoints: RootEndpoints {
            health: "/health",
            translate: "/translate",
        },
    })
}

#[derive(Deserialize)]
struct TranslateRequest {
    bpmn_xml: String,
}

#[derive(Serialize)]
struct EventView {
    id: String,
    label: String,
    included: bool,
    executed: bool,
    pending: bool,
}

#[derive(Serialize)]
struct RelationView {
    source: String,
    target: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct MarkingView {
    executed: Vec<String>,
    included: Vec<String>,
    pending: Vec<String>,
}

#[derive(Serialize)]
struct GraphView {
    events: Vec<EventView>,
    relations: Vec<RelationView>,
    marking: MarkingView,
}

#[derive(Serialize, Default)]
struct TranslateResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    dcr_xml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    graph: Option<GraphView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn translate(Json(req): Json<TranslateRequest>) -> Json<TranslateResponse> {
    let dcr = match bpmn2dcr_core::compile(&req.bpmn_xml) {
        Ok(dcr) => dcr,
        Err(CompileError::Validation(errors)) => {
            return Json(TranslateResponse {
                error: Some(format!("BPMN validation failed: {}", errors.join("; "))),
                ..Default::default()
            });
        }
        Err(e) => {
            warn!(error = %e, "BPMN translation failed");
            return Json(TranslateResponse {
                error: Some(e.to_string()),
                ..Default::default()
            });
        }
    };

    match dcr_xml::to_xml(&dcr) {
        Ok(xml) => Json(TranslateResponse {
            success: true,
            dcr_xml: Some(xml),
            graph: Some(to_graph_view(&dcr)),
            ..Default::default()
        }),
        Err(e) => {
            warn!(error = %e, "DCR XML emission failed");
            Json(TranslateResponse {
                error: Some(e.to_string()),
                ..Default::default()
            })
        }
    }
}

/// Reads each event's marking fields from the graph's actual computed
/// initial marking.
fn to_graph_view(dcr: &DcrGraph) -> GraphView {
    let events = dcr
        .events
        .values()
        .map(|e| {
            let marking = dcr.initial_marking.get(&e.id).copied().unwrap_or_default();
            EventView {
                id: e.id.clone(),
                label: e.label.clone(),
                included: marking.included,
                executed: marking.executed,
                pending: marking.pending,
            }
        })
        .collect();

    let relations = dcr
        .relations
        .iter()
        .map(|r| RelationView {
            source: r.source_id.clone(),
            target: r.target_id.clone(),
            kind: relation_kind_str(r.relation).to_string(),
        })
        .collect();

    let marking = MarkingView {
        executed: dcr
            .initial_marking
            .iter()
            .filter(|(_, m)| m.executed)
            .map(|(id, _)| id.clone())
            .collect(),
        included: dcr
            .initial_marking
            .iter()
            .filter(|(_, m)| m.included)
            .map(|(id, _)| id.clone())
            .collect(),
        pending: dcr
            .initial_marking
            .iter()
            .filter(|(_, m)| m.pending)
            .map(|(id, _)| id.clone())
            .collect(),
    };

    GraphView {
        events,
        relations,
        marking,
    }
}

fn relation_kind_str(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Condition => "condition",
        RelationKind::Response => "response",
        RelationKind::Include => "include",
        RelationKind::Exclude => "exclude",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn translate_rejects_malformed_xml() {
        let body = serde_json::to_vec(&serde_json::json!({ "bpmn_xml": "not xml" })).unwrap();
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/translate")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["success"], false);
    }
}
