use std::sync::Arc;

use crate::config::PracticeConfig;
use crate::content::QuestionStore;
use crate::session::SessionManagerHandle;

#[derive(Clone)]
pub struct AppState {
    pub session_manager: SessionManagerHandle,
    pub store: Arc<dyn QuestionStore>,
    pub practice: Arc<PracticeConfig>,
}
