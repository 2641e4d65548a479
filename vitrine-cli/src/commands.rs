pub mod build;
pub mod image;
pub mod info;
pub mod search;
