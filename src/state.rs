use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{
    calendar::{CalendarSink, LogCalendarSink},
    config::Config,
};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub calendar: Arc<dyn CalendarSink>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            calendar: Arc::new(LogCalendarSink),
        }
    }

    pub fn with_calendar(mut self, sink: Arc<dyn CalendarSink>) -> Self {
        self.calendar = sink;
        self
    }
}
