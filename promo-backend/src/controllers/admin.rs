use actix_web::{web, HttpResponse};
use promo_types::{ErrorResponse, SyncResponse};

use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/admin").route("/sync-data", web::post().to(sync_data)));
}

/// Fetch the newest remote CSV and rebuild the system when it changed or was never loaded
async fn sync_data(state: web::Data<AppState>) -> HttpResponse {
    match state.data.sync().await {
        Ok(outcome) => {
            let Some(file) = outcome.file else {
                return HttpResponse::NotFound()
                    .json(ErrorResponse::new("No CSV file found in remote storage or locally."));
            };
            let message = match (outcome.rebuild, outcome.loaded) {
                (true, _) => "New file detected and system rebuilt.",
                (false, true) => "Dataset loaded. System is ready.",
                (false, false) => "No new file detected. System remains unchanged.",
            };
            log::info!("[SYNC] Manual sync: {}", message);
            HttpResponse::Ok().json(SyncResponse::success(message, Some(file.display().to_string())))
        }
        Err(e) => {
            log::error!("[SYNC] Manual sync failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new(e.to_string()))
        }
    }
}
