pub mod avatar;
pub mod credential;
pub mod draft;
pub mod step;
pub mod user;
