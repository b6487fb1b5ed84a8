use bytes::Bytes;
use futures::future::BoxFuture;

use crate::model;

pub mod azure;
pub mod mock;

pub type ServiceResult<T> = Result<T, model::error::ServiceError>;

/// The remote capabilities the connector needs from a blob service, bound to
/// one container.
pub trait BlobService: Send + Sync {
    fn container_name(&self) -> &str;

    /// Creates the bound container with no public access.
    fn create_container(&self) -> BoxFuture<'_, ServiceResult<()>>;

    /// Stages one block of `blob`.
    fn put_block<'a>(
        &'a self,
        blob: &'a str,
        block_id: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, ServiceResult<()>>;

    /// Commits staged blocks, in order, as the content of `blob`.
    fn put_block_list<'a>(
        &'a self,
        blob: &'a str,
        block_ids: &'a [String],
    ) -> BoxFuture<'a, ServiceResult<()>>;

    /// Fetches the listing segment that starts at `marker`.
    fn list_blobs_segment<'a>(
        &'a self,
        marker: &'a model::blob::PageMarker,
        options: &'a model::settings::ListOptions,
    ) -> BoxFuture<'a, ServiceResult<model::blob::ListSegment>>;
}

impl<T: BlobService + ?Sized> BlobService for std::sync::Arc<T> {
    fn container_name(&self) -> &str {
        (**self).container_name()
    }

    fn create_container(&self) -> BoxFuture<'_, ServiceResult<()>> {
        (**self).create_container()
    }

    fn put_block<'a>(
        &'a self,
        blob: &'a str,
        block_id: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, ServiceResult<()>> {
        (**self).put_block(blob, block_id, data)
    }

    fn put_block_list<'a>(
        &'a self,
        blob: &'a str,
        block_ids: &'a [String],
    ) -> BoxFuture<'a, ServiceResult<()>> {
        (**self).put_block_list(blob, block_ids)
    }

    fn list_blobs_segment<'a>(
        &'a self,
        marker: &'a model::blob::PageMarker,
        options: &'a model::settings::ListOptions,
    ) -> BoxFuture<'a, ServiceResult<model::blob::ListSegment>> {
        (**self).list_blobs_segment(marker, options)
    }
}
