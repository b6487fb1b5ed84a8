use tracing::info;

use crate::{adapters, classify, model, util};

/// Collects every blob in the container, one segment at a time, until the
/// service stops returning a continuation marker.
///
/// Any failing segment aborts the whole listing; partial results are dropped.
#[tracing::instrument(name = "list", skip_all, fields(container = service.container_name()))]
pub async fn list_blobs(
    service: &dyn adapters::BlobService,
    options: &model::settings::ListOptions,
    ctx: &util::context::InvocationContext,
) -> model::error::Result<model::blob::ListOutput> {
    info!("called");

    let mut output = model::blob::ListOutput::default();
    let mut marker = model::blob::PageMarker::Start;
    let mut segments = 0usize;

    while !marker.is_done() {
        let segment = ctx
            .guard(service.list_blobs_segment(&marker, options))
            .await?
            .map_err(|err| {
                classify::classify(err, "list_blobs_segment", service.container_name())
            })?;

        segments += 1;
        for blob in segment.blobs {
            if let Some(previous) = output.insert(blob) {
                info!(blob = %previous.name, "blob listed again, keeping latest");
            }
        }

        marker = segment.next_marker;
    }

    info!(segments = segments, blobs = output.len(), "listed");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{Call, MemoryBlobService};

    #[tokio::test]
    async fn test_list_empty_container() {
        let service = MemoryBlobService::new("sample").with_existing_container();
        let ctx = util::context::InvocationContext::new();

        let out = list_blobs(&service, &Default::default(), &ctx).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(service.calls(), vec![Call::ListBlobsSegment { marker: None }]);
    }

    #[tokio::test]
    async fn test_list_follows_markers() {
        let service = MemoryBlobService::new("sample")
            .with_page_size(1)
            .with_blob("a.txt", b"a")
            .with_blob("b.txt", b"bb");
        let ctx = util::context::InvocationContext::new();

        let out = list_blobs(&service, &Default::default(), &ctx).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.result["b.txt"].content_length, 2);
        assert_eq!(
            service.calls(),
            vec![
                Call::ListBlobsSegment { marker: None },
                Call::ListBlobsSegment {
                    marker: Some("b.txt".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_respects_max_results() {
        let service = MemoryBlobService::new("sample")
            .with_blob("a", b"1")
            .with_blob("b", b"2")
            .with_blob("c", b"3");
        let ctx = util::context::InvocationContext::new();
        let options = model::settings::ListOptions {
            max_results: Some(2),
        };

        let out = list_blobs(&service, &options, &ctx).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(service.calls().len(), 2);
    }
}
