pub mod storage_handler;
pub mod user_handler;
pub mod wizard_handler;
