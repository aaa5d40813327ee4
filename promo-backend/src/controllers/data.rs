use actix_web::{web, HttpResponse};
use promo_types::ErrorResponse;
use std::io::ErrorKind;

use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/data/csv").route(web::get().to(get_csv)));
}

/// Raw source CSV for frontend visualisations
async fn get_csv(state: web::Data<AppState>) -> HttpResponse {
    let Some(path) = state.data.current_csv() else {
        return HttpResponse::NotFound().json(ErrorResponse::new("CSV file not found"));
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => HttpResponse::Ok().content_type("text/csv").body(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            HttpResponse::NotFound().json(ErrorResponse::new("CSV file not found"))
        }
        Err(e) => {
            log::error!("Failed to read {}: {}", path.display(), e);
            HttpResponse::InternalServerError().json(ErrorResponse::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::ScriptedModel;
    use crate::controllers::tests::{CSV, state};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_serves_loaded_csv() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(ScriptedModel::default()), Some(CSV)).await;
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get().uri("/data/csv").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "text/csv");
        let body = test::read_body(resp).await;
        assert_eq!(body, CSV.as_bytes());
    }

    #[actix_web::test]
    async fn test_missing_csv_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(ScriptedModel::default()), None).await;
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get().uri("/data/csv").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "CSV file not found");
    }
}
