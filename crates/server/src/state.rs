use std::sync::Arc;

use relay_hub::HubHandle;
use relay_scheduler::SchedulerStatus;
use relay_store::MessageStore;
use tokio::sync::watch;

use crate::live::Keepalive;

pub struct AppState {
    /// Writes through this store trigger a scheduler reload.
    pub store: Arc<dyn MessageStore>,
    pub hub: HubHandle,
    pub scheduler: watch::Receiver<SchedulerStatus>,
    pub keepalive: Keepalive,
}
