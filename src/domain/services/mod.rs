pub mod auth_service;
pub mod avatar_storage;
pub mod geolocation_service;
pub mod password_service;
pub mod registration_service;
pub mod token_service;
