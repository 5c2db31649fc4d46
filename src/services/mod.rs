pub mod catalog;
pub mod credentials;
pub mod jamendo_client;
pub mod library_service;
pub mod token_codec;
pub mod user_service;
