pub mod admin;
pub mod org;
