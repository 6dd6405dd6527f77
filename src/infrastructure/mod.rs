pub mod argon2_password_hasher;
pub mod configured_geolocation;
pub mod entity;
pub mod file_avatar_storage;
pub mod in_memory_user_repository;
pub mod jwt_token_generator;
pub mod local_auth_provider;
pub mod user_repository;
