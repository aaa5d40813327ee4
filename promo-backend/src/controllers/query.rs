use actix_web::{web, HttpResponse};
use futures_util::stream;
use promo_types::{ErrorResponse, QueryRequest, QueryResponse, StreamEvent};
use tokio::sync::mpsc;

use super::loaded_system;
use crate::AppState;

/// Events buffered per streaming request before the agent waits on the client
const STREAM_BUFFER: usize = 32;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/query").route(web::post().to(query)))
        .service(web::resource("/query/stream").route(web::post().to(query_stream)));
}

fn validate_question(request: &QueryRequest) -> Result<String, HttpResponse> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(HttpResponse::BadRequest().json(ErrorResponse::new("Question cannot be empty")));
    }
    Ok(question.to_string())
}

async fn query(state: web::Data<AppState>, body: web::Json<QueryRequest>) -> HttpResponse {
    let question = match validate_question(&body) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let system = match loaded_system(&state) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    if state.config.log_queries {
        log::info!("[QUERY] {}", question);
    }
    let result = system.agent.query(&question).await;

    HttpResponse::Ok().json(QueryResponse {
        answer: result.answer,
        tools_used: result.usage.tool_names(),
    })
}

/// One server-sent event frame
fn sse_frame(event: &StreamEvent) -> web::Bytes {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        format!(r#"{{"type":"error","message":"failed to encode event: {}"}}"#, e)
    });
    web::Bytes::from(format!("data: {}\n\n", data))
}

async fn query_stream(state: web::Data<AppState>, body: web::Json<QueryRequest>) -> HttpResponse {
    let question = match validate_question(&body) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let system = match loaded_system(&state) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    if state.config.log_queries {
        log::info!("[QUERY] (stream) {}", question);
    }

    let (tx, rx) = mpsc::channel::<StreamEvent>(STREAM_BUFFER);
    actix_web::rt::spawn(async move {
        system.agent.query_stream(&question, tx).await;
    });

    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, actix_web::Error>(sse_frame(&event)), rx))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::{ScriptedModel, tool_call};
    use crate::ai::AiResponse;
    use crate::controllers::tests::{CSV, state};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_blank_question_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(ScriptedModel::default()), Some(CSV)).await;
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/query")
            .set_json(serde_json::json!({"question": "   "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_no_dataset_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(ScriptedModel::default()), None).await;
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/query/stream")
            .set_json(serde_json::json!({"question": "total sales?"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_query_returns_answer_and_tools() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(
            vec!["SELECT COUNT(*) AS n FROM promotions"],
            vec![
                AiResponse::with_tools(String::new(), vec![tool_call("c1", "sql_query", "how many rows")]),
                AiResponse::text("There are 2 promotions.".to_string()),
            ],
        ));
        let state = state(dir.path(), model.clone(), Some(CSV)).await;
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/query")
            .set_json(serde_json::json!({"question": "how many rows?"}))
            .to_request();
        let body: QueryResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.answer, "There are 2 promotions.");
        assert_eq!(body.tools_used, vec!["sql_query".to_string()]);

        let history = model.last_history().unwrap();
        assert!(!history[0].tool_responses[0].is_error);
        assert!(history[0].tool_responses[0].content.starts_with("Results (1 rows):"));
    }

    #[actix_web::test]
    async fn test_stream_emits_sse_frames() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::responses(vec![AiResponse::text("Hello".to_string())]));
        let state = state(dir.path(), model, Some(CSV)).await;
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/query/stream")
            .set_json(serde_json::json!({"question": "hi"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("X-Accel-Buffering").unwrap(), "no");
        assert_eq!(resp.headers().get("Cache-Control").unwrap(), "no-cache");

        let body = test::read_body(resp).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert_eq!(
            text,
            "data: {\"type\":\"content\",\"content\":\"Hello\"}\n\n\
             data: {\"type\":\"done\",\"content\":\"Hello\"}\n\n"
        );
    }
}
