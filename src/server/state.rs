//! Shared application state, following the teacher's `AxumAppState`
//! convention (`server/app.rs`): one cloneable struct bundling everything a
//! handler needs, injected via `Extension`.

use std::sync::Arc;

use crate::config::Config;
use crate::remote::RemoteApi;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub remote: Arc<dyn RemoteApi>,
    pub config: Arc<Config>,
}
