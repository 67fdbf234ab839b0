use crate::services::MasteryTracker;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub tracker: MasteryTracker,
}

impl FromRef<AppState> for MasteryTracker {
    fn from_ref(state: &AppState) -> Self {
        state.tracker.clone()
    }
}
