use std::sync::Arc;

use swapmeet_chat::ChatService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub chat: ChatService,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(chat: ChatService, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            chat,
            jwt_secret: jwt_secret.into(),
        })
    }
}
