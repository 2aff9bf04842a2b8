pub mod attachments;
pub mod auth;
pub mod sync;
pub mod users;
