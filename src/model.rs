pub mod blob;
pub mod error;
pub mod settings;
