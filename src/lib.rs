//! Blob storage connector: uploads a staged local file as a block blob, or
//! lists every blob in a container, against the Azure Blob REST API.

pub mod activity;
pub mod adapters;
pub mod classify;
pub mod container;
pub mod credential;
pub mod model;
pub mod ops;
pub mod util;

pub use activity::BlobActivity;
pub use model::blob::{BlobDescriptor, ListOutput, Output, UploadInput, UploadReceipt};
pub use model::error::{ConnectorError, Result, ServiceError};
pub use model::settings::{ConnectionSettings, ListOptions, Method, UploadTuning};
