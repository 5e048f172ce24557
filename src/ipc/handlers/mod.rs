pub mod admin;
pub mod catalog;
pub mod core;
pub mod reports;
pub mod results;
pub mod scoring;
pub mod session;
