use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::bookings::BookingLedger;
use crate::notify::ChangeFeed;
use crate::schedule::AllocationStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Services shared by every handler, built once in `main`.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub schedule: AllocationStore,
    pub bookings: BookingLedger,
    pub changes: Option<ChangeFeed>,
}
