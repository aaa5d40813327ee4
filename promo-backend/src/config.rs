use crate::agent::DEFAULT_MAX_ITERATIONS;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub llm_temperature: f32,
    pub port: u16,
    pub cors_origin: String,
    pub download_dir: PathBuf,
    pub analytics_db_path: PathBuf,
    pub vector_index_path: PathBuf,
    pub table_name: String,
    pub top_k_results: usize,
    pub embedding_chunk_size: usize,
    pub sql_max_retries: u32,
    pub sql_retry_delay_ms: u64,
    pub ml_training_timeout_secs: u64,
    pub ml_cache_enabled: bool,
    pub cache_max_entries: u64,
    pub cache_ttl_secs: u64,
    pub agent_max_iterations: usize,
    pub log_queries: bool,
    /// Mounted storage container used as the remote file source
    pub blob_store_dir: Option<PathBuf>,
    pub blob_store_prefix: String,
    pub few_shot_examples_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            llm_temperature: 0.0,
            port: 8000,
            cors_origin: "http://localhost:4200".to_string(),
            download_dir: PathBuf::from("./downloads"),
            analytics_db_path: PathBuf::from("./promotion_data.db"),
            vector_index_path: PathBuf::from("./vector_index.db"),
            table_name: "promotions".to_string(),
            top_k_results: 10,
            embedding_chunk_size: 100,
            sql_max_retries: 5,
            sql_retry_delay_ms: 1000,
            ml_training_timeout_secs: 900,
            ml_cache_enabled: true,
            cache_max_entries: 1000,
            cache_ttl_secs: 3600,
            agent_max_iterations: DEFAULT_MAX_ITERATIONS,
            log_queries: true,
            blob_store_dir: None,
            blob_store_prefix: String::new(),
            few_shot_examples_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| "OPENAI_API_KEY environment variable not set".to_string())?;

        Ok(Self {
            openai_api_key,
            openai_base_url: env_string("OPENAI_BASE_URL", defaults.openai_base_url),
            llm_model: env_string("LLM_MODEL", defaults.llm_model),
            embedding_model: env_string("EMBEDDING_MODEL", defaults.embedding_model),
            llm_temperature: env_parse("LLM_TEMPERATURE", defaults.llm_temperature),
            port: env_parse("PORT", defaults.port),
            cors_origin: env_string("CORS_ORIGIN", defaults.cors_origin),
            download_dir: env_path("DOWNLOAD_DIR").unwrap_or(defaults.download_dir),
            analytics_db_path: env_path("ANALYTICS_DB_PATH").unwrap_or(defaults.analytics_db_path),
            vector_index_path: env_path("VECTOR_INDEX_PATH").unwrap_or(defaults.vector_index_path),
            table_name: env_string("TABLE_NAME", defaults.table_name),
            top_k_results: env_parse("TOP_K_RESULTS", defaults.top_k_results),
            embedding_chunk_size: env_parse("EMBEDDING_CHUNK_SIZE", defaults.embedding_chunk_size),
            sql_max_retries: env_parse("SQL_MAX_RETRIES", defaults.sql_max_retries),
            sql_retry_delay_ms: env_parse("SQL_RETRY_DELAY_MS", defaults.sql_retry_delay_ms),
            ml_training_timeout_secs: env_parse(
                "ML_TRAINING_TIMEOUT_SECS",
                defaults.ml_training_timeout_secs,
            ),
            ml_cache_enabled: env_parse("ML_CACHE_ENABLED", defaults.ml_cache_enabled),
            cache_max_entries: env_parse("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_ttl_secs: env_parse("CACHE_TTL_SECS", defaults.cache_ttl_secs),
            agent_max_iterations: env_parse("AGENT_MAX_ITERATIONS", defaults.agent_max_iterations),
            log_queries: env_parse("LOG_QUERIES", defaults.log_queries),
            blob_store_dir: env_path("BLOB_STORE_DIR"),
            blob_store_prefix: env_string("BLOB_STORE_PREFIX", defaults.blob_store_prefix),
            few_shot_examples_path: env_path("FEW_SHOT_EXAMPLES_PATH"),
        })
    }

    /// Load optional few-shot examples for the agent prompt
    pub fn few_shot_examples(&self) -> String {
        let Some(path) = &self.few_shot_examples_path else {
            return String::new();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Could not read few-shot examples from {}: {}", path.display(), e);
                String::new()
            }
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("{} has invalid value '{}', using default", key, raw);
            default
        }
    }
}
