pub mod approval;
pub mod user;
