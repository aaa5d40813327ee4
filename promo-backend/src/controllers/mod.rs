pub mod admin;
pub mod data;
pub mod health;
pub mod query;

use crate::AppState;
use crate::system::AnalyticsSystem;
use actix_web::HttpResponse;
use promo_types::ErrorResponse;
use std::sync::Arc;

/// Current system snapshot, or 503 while nothing is loaded
pub(crate) fn loaded_system(state: &AppState) -> Result<Arc<AnalyticsSystem>, HttpResponse> {
    state.data.current().ok_or_else(|| {
        HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
            "No dataset is loaded yet. Trigger /admin/sync-data once a CSV is available.",
        ))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::AppState;
    use crate::ai::ChatModel;
    use crate::cache::AnswerCache;
    use crate::config::Config;
    use crate::execution::ExecutionTracker;
    use crate::system::{DataService, Services};
    use crate::vector::index::tests::KeywordEmbedder;
    use actix_web::web;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    pub(crate) const CSV: &str = "Region,Week,ROI%\nNorth,3,10\nSouth,20,5\n";

    /// App state over `dir`; with `csv` the dataset is loaded before returning
    pub(crate) async fn state(dir: &Path, model: Arc<dyn ChatModel>, csv: Option<&str>) -> web::Data<AppState> {
        let config = Config {
            download_dir: dir.join("downloads"),
            analytics_db_path: dir.join("analytics.db"),
            vector_index_path: dir.join("index.db"),
            ..Config::default()
        };
        if let Some(csv) = csv {
            std::fs::create_dir_all(&config.download_dir).unwrap();
            std::fs::write(config.download_dir.join("promo.csv"), csv).unwrap();
        }
        let services = Services {
            model,
            embedder: Arc::new(KeywordEmbedder::new()),
            cache: Some(Arc::new(AnswerCache::new(10, Duration::from_secs(60)))),
            tracker: Arc::new(ExecutionTracker::new()),
        };
        let data = Arc::new(DataService::new(config.clone(), services, None));
        if csv.is_some() {
            data.startup(false).await.unwrap();
        }
        web::Data::new(AppState { config, data })
    }
}
