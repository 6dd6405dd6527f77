pub mod dashboard_usecase;
pub mod login_usecase;
pub mod wizard_usecase;
