use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::models::Session;
use crate::services::backend::SchedulingBackend;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub backend: Box<dyn SchedulingBackend>,
    pub sessions: Mutex<HashMap<String, Session>>,
}
