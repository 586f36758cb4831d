pub mod api;
pub mod config;
pub mod db;
pub mod metrics;
pub mod notifications;
pub mod storage;

pub use db::DbPool;

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api::lockout::LoginLockout;
use crate::config::Config;
use crate::notifications::VisitNotification;
use crate::storage::PdfStorage;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub storage: PdfStorage,
    pub lockout: Arc<LoginLockout>,
    pub notify_tx: mpsc::Sender<VisitNotification>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        storage: PdfStorage,
        notify_tx: mpsc::Sender<VisitNotification>,
    ) -> Self {
        let lockout = Arc::new(LoginLockout::new(config.lockout.clone()));
        Self {
            config,
            db,
            storage,
            lockout,
            notify_tx,
        }
    }
}
