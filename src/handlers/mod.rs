pub mod auth_handlers;
pub mod health_handlers;
pub mod search_handlers;
pub mod song_handlers;
