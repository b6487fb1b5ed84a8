use std::sync::Arc;

use blobact::{
    adapters::mock::{Call, MemoryBlobService},
    model::blob::{ListSegment, PageMarker},
    ops,
    util::context::InvocationContext,
    BlobActivity, BlobDescriptor, ConnectionSettings, ConnectorError, Output, ServiceError,
    UploadInput,
};

fn list_settings() -> ConnectionSettings {
    ConnectionSettings::new("blobtest", "unused", "sample", "list").unwrap()
}

fn descriptor(name: &str, len: u64) -> BlobDescriptor {
    BlobDescriptor {
        name: name.to_string(),
        content_length: len,
        ..Default::default()
    }
}

fn two_segments() -> Vec<ListSegment> {
    vec![
        ListSegment {
            blobs: vec![descriptor("a.txt", 1), descriptor("b.txt", 2)],
            next_marker: PageMarker::Continue("m1".to_string()),
        },
        ListSegment {
            blobs: vec![descriptor("c.txt", 3)],
            next_marker: PageMarker::Done,
        },
    ]
}

async fn list(service: &MemoryBlobService) -> Result<blobact::ListOutput, ConnectorError> {
    let output = ops::dispatch(
        &list_settings(),
        service,
        &UploadInput::default(),
        &InvocationContext::new(),
    )
    .await?;

    match output {
        Output::Listed(listed) => Ok(listed),
        other => panic!("unexpected output: {:?}", other),
    }
}

#[tokio::test]
async fn test_list_empty_container() {
    let service = MemoryBlobService::new("sample").with_existing_container();

    let listed = list(&service).await.unwrap();
    assert!(listed.is_empty());
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test]
async fn test_list_two_segments() {
    let service = MemoryBlobService::new("sample").with_scripted_segments(two_segments());

    let listed = list(&service).await.unwrap();
    assert_eq!(
        listed.result.keys().cloned().collect::<Vec<_>>(),
        vec!["a.txt", "b.txt", "c.txt"]
    );
    assert_eq!(
        service.calls(),
        vec![
            Call::ListBlobsSegment { marker: None },
            Call::ListBlobsSegment {
                marker: Some("m1".to_string())
            },
        ]
    );
}

#[tokio::test]
async fn test_list_twice_is_stable() {
    let service = MemoryBlobService::new("sample")
        .with_page_size(2)
        .with_blob("a.txt", b"a")
        .with_blob("dir/b.txt", b"bb")
        .with_blob("dir/c.txt", b"ccc");

    let first = list(&service).await.unwrap();
    let second = list(&service).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_list_failure_on_second_segment() {
    let service = MemoryBlobService::new("sample")
        .with_scripted_segments(two_segments())
        .fail_list_at(1, ServiceError::status(500, Some("InternalError"), "boom"));

    match list(&service).await {
        Err(ConnectorError::Transport { operation, source }) => {
            assert_eq!(operation, "list_blobs_segment");
            assert_eq!(source.status_code(), Some(500));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_list_duplicate_names_keep_latest() {
    let segments = vec![
        ListSegment {
            blobs: vec![descriptor("a.txt", 1)],
            next_marker: PageMarker::Continue("m1".to_string()),
        },
        ListSegment {
            blobs: vec![descriptor("a.txt", 10), descriptor("b.txt", 2)],
            next_marker: PageMarker::Done,
        },
    ];
    let service = MemoryBlobService::new("sample").with_scripted_segments(segments);

    let listed = list(&service).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed.result["a.txt"].content_length, 10);
}

#[tokio::test]
async fn test_list_cancelled_before_any_call() {
    let service = MemoryBlobService::new("sample").with_existing_container();
    let ctx = InvocationContext::new();
    ctx.cancel();

    let err = ops::dispatch(&list_settings(), &service, &UploadInput::default(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::Cancelled));
    assert!(service.calls().is_empty());
}

#[test]
fn test_unrecognized_method_makes_no_calls() {
    let service = MemoryBlobService::new("sample").with_existing_container();

    for method in ["delete", "LIST", "", "upload "] {
        let res = ConnectionSettings::new("blobtest", "unused", "sample", method);
        assert!(
            matches!(res, Err(ConnectorError::UnsupportedMethod(ref m)) if m == method),
            "failed on `method` for case: {:?}",
            method
        );
    }
    assert!(service.calls().is_empty());
}

#[test]
fn test_sync_eval_list_map() {
    let service = Arc::new(MemoryBlobService::new("sample").with_scripted_segments(two_segments()));
    let activity = BlobActivity::with_service(list_settings(), Box::new(Arc::clone(&service)));

    let output = activity.eval_map(&serde_json::Map::new()).unwrap();
    let result = output["result"].as_object().unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result["c.txt"]["content_length"], serde_json::json!(3));
    assert_eq!(service.calls().len(), 2);
}
