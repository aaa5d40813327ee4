//! Natural-language analytics over a promotions dataset.
//!
//! Questions go to a tool-selecting agent that answers with SQL aggregation,
//! semantic search over embedded rows, or statistical/ML prediction.

pub mod agent;
pub mod ai;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod data;
pub mod errors;
pub mod execution;
pub mod http;
pub mod ml;
pub mod retry;
pub mod routing;
pub mod sync;
pub mod system;
pub mod tools;
pub mod vector;

use config::Config;
use std::sync::Arc;
use system::DataService;

pub struct AppState {
    pub config: Config,
    pub data: Arc<DataService>,
}
