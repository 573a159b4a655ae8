pub mod admin;
pub mod backup_exchange;
pub mod core;
pub mod notifications;
pub mod permissions;
pub mod save;
pub mod session;
pub mod stash;
pub mod student;
