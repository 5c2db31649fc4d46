//! Shared application state handed to every handler.

use crate::{
    config::AppConfig,
    services::{
        jamendo_client::JamendoClient, library_service::LibraryService, token_codec::TokenCodec,
        user_service::UserService,
    },
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub library: LibraryService,
    pub users: UserService,
    pub tokens: Arc<TokenCodec>,
    pub search: JamendoClient,
    pub config: Arc<AppConfig>,
}
