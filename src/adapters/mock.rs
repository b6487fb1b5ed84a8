use std::{
    collections::{BTreeMap, HashMap},
    future,
    sync::Mutex,
};

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::{
    adapters::{self, ServiceResult},
    model::{
        self,
        error::{ServiceError, CONTAINER_ALREADY_EXISTS},
    },
};

const DEFAULT_PAGE_SIZE: usize = 5000;

/// A call received by [`MemoryBlobService`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateContainer,
    PutBlock { blob: String, block_id: String, len: usize },
    PutBlockList { blob: String, blocks: usize },
    ListBlobsSegment { marker: Option<String> },
}

#[derive(Default)]
struct State {
    container_exists: bool,
    blobs: BTreeMap<String, Bytes>,
    staged: HashMap<(String, String), Bytes>,
    calls: Vec<Call>,
    list_calls: usize,
}

/// In-memory blob service that records every call it receives.
///
/// Listing pages through the stored blobs `page_size` at a time, or replays
/// scripted segments when they are set.
pub struct MemoryBlobService {
    container: String,
    page_size: usize,
    scripted: Option<Vec<model::blob::ListSegment>>,
    fail_list_at: Option<(usize, ServiceError)>,
    fail_create: Option<ServiceError>,
    state: Mutex<State>,
}

impl MemoryBlobService {
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            scripted: None,
            fail_list_at: None,
            fail_create: None,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_existing_container(self) -> Self {
        self.lock().container_exists = true;
        self
    }

    pub fn with_blob(self, name: &str, data: &[u8]) -> Self {
        {
            let mut state = self.lock();
            state.container_exists = true;
            state.blobs.insert(name.to_string(), Bytes::copy_from_slice(data));
        }
        self
    }

    /// Replays `segments` instead of paging through stored blobs. Segment
    /// `i + 1` is served for the marker segment `i` returned.
    pub fn with_scripted_segments(mut self, segments: Vec<model::blob::ListSegment>) -> Self {
        self.lock().container_exists = true;
        self.scripted = Some(segments);
        self
    }

    /// Fails the `n`th list call (zero based) with `err`.
    pub fn fail_list_at(mut self, n: usize, err: ServiceError) -> Self {
        self.fail_list_at = Some((n, err));
        self
    }

    pub fn fail_create_container(mut self, err: ServiceError) -> Self {
        self.fail_create = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn container_exists(&self) -> bool {
        self.lock().container_exists
    }

    pub fn blob(&self, name: &str) -> Option<Bytes> {
        self.lock().blobs.get(name).cloned()
    }

    pub fn blob_names(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .expect("failed to acquire `state` guard")
    }

    fn do_create_container(&self) -> ServiceResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::CreateContainer);

        if let Some(err) = &self.fail_create {
            return Err(err.clone());
        }

        if state.container_exists {
            return Err(ServiceError::status(
                409,
                Some(CONTAINER_ALREADY_EXISTS),
                "The specified container already exists.",
            ));
        }

        state.container_exists = true;
        Ok(())
    }

    fn do_put_block(&self, blob: &str, block_id: &str, data: Bytes) -> ServiceResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::PutBlock {
            blob: blob.to_string(),
            block_id: block_id.to_string(),
            len: data.len(),
        });

        if !state.container_exists {
            return Err(container_not_found());
        }

        state
            .staged
            .insert((blob.to_string(), block_id.to_string()), data);
        Ok(())
    }

    fn do_put_block_list(&self, blob: &str, block_ids: &[String]) -> ServiceResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::PutBlockList {
            blob: blob.to_string(),
            blocks: block_ids.len(),
        });

        if !state.container_exists {
            return Err(container_not_found());
        }

        let mut content = Vec::new();
        for id in block_ids {
            match state.staged.get(&(blob.to_string(), id.clone())) {
                Some(block) => content.extend_from_slice(block),
                None => {
                    return Err(ServiceError::status(
                        400,
                        Some("InvalidBlockList"),
                        format!("block `{}` was never staged", id),
                    ))
                }
            }
        }

        state.staged.retain(|(name, _), _| name != blob);
        state.blobs.insert(blob.to_string(), Bytes::from(content));
        Ok(())
    }

    fn do_list_blobs_segment(
        &self,
        marker: &model::blob::PageMarker,
        options: &model::settings::ListOptions,
    ) -> ServiceResult<model::blob::ListSegment> {
        let mut state = self.lock();
        state.calls.push(Call::ListBlobsSegment {
            marker: marker.token().map(str::to_string),
        });

        let n = state.list_calls;
        state.list_calls += 1;

        if let Some((fail_at, err)) = &self.fail_list_at {
            if *fail_at == n {
                return Err(err.clone());
            }
        }

        if !state.container_exists {
            return Err(container_not_found());
        }

        if let Some(segments) = &self.scripted {
            return Ok(scripted_segment(segments, marker));
        }

        let page_size = options
            .max_results
            .map(|m| (m as usize).max(1))
            .unwrap_or(self.page_size);

        let mut names = state
            .blobs
            .range::<str, _>((bound_for(marker), std::ops::Bound::Unbounded))
            .map(|(name, data)| descriptor(name, data));

        let blobs: Vec<_> = names.by_ref().take(page_size).collect();
        let next = names.next().map(|d| d.name);

        Ok(model::blob::ListSegment {
            blobs,
            next_marker: model::blob::PageMarker::from_next(next),
        })
    }
}

fn bound_for(marker: &model::blob::PageMarker) -> std::ops::Bound<&str> {
    match marker.token() {
        Some(token) => std::ops::Bound::Included(token),
        None => std::ops::Bound::Unbounded,
    }
}

fn scripted_segment(
    segments: &[model::blob::ListSegment],
    marker: &model::blob::PageMarker,
) -> model::blob::ListSegment {
    let index = match marker {
        model::blob::PageMarker::Continue(_) => segments
            .iter()
            .position(|s| &s.next_marker == marker)
            .map(|i| i + 1),
        model::blob::PageMarker::Start | model::blob::PageMarker::Done => Some(0),
    };

    index
        .and_then(|i| segments.get(i))
        .cloned()
        .unwrap_or_else(|| model::blob::ListSegment {
            blobs: Vec::new(),
            next_marker: model::blob::PageMarker::Done,
        })
}

fn descriptor(name: &str, data: &Bytes) -> model::blob::BlobDescriptor {
    model::blob::BlobDescriptor {
        name: name.to_string(),
        content_length: data.len() as u64,
        content_type: Some("application/octet-stream".to_string()),
        etag: Some(format!("0x{:X}", data.len())),
        blob_type: Some("BlockBlob".to_string()),
        ..Default::default()
    }
}

fn container_not_found() -> ServiceError {
    ServiceError::status(
        404,
        Some("ContainerNotFound"),
        "The specified container does not exist.",
    )
}

impl adapters::BlobService for MemoryBlobService {
    fn container_name(&self) -> &str {
        &self.container
    }

    fn create_container(&self) -> BoxFuture<'_, ServiceResult<()>> {
        Box::pin(future::ready(self.do_create_container()))
    }

    fn put_block<'a>(
        &'a self,
        blob: &'a str,
        block_id: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(future::ready(self.do_put_block(blob, block_id, data)))
    }

    fn put_block_list<'a>(
        &'a self,
        blob: &'a str,
        block_ids: &'a [String],
    ) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(future::ready(self.do_put_block_list(blob, block_ids)))
    }

    fn list_blobs_segment<'a>(
        &'a self,
        marker: &'a model::blob::PageMarker,
        options: &'a model::settings::ListOptions,
    ) -> BoxFuture<'a, ServiceResult<model::blob::ListSegment>> {
        Box::pin(future::ready(self.do_list_blobs_segment(marker, options)))
    }
}
