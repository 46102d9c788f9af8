pub mod admin;
pub mod gallery;
pub mod public;
pub mod upload;
