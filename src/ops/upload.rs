use std::{fs::File, io, sync::Arc};

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::{
    adapters, classify,
    model::{self, error::ConnectorError},
    util,
};

/// Writes `input.data` to `input.file`, then uploads that file as a block blob
/// named after its path.
///
/// The local file is written and opened before anything goes over the wire,
/// so a bad path never reaches the service.
#[tracing::instrument(name = "upload", skip_all, fields(container = service.container_name(), file = %input.file))]
pub async fn upload_file(
    service: &dyn adapters::BlobService,
    input: &model::blob::UploadInput,
    tuning: &model::settings::UploadTuning,
    ctx: &util::context::InvocationContext,
) -> model::error::Result<model::blob::UploadReceipt> {
    info!("called");

    ctx.guard(write_staging_file(&input.file, input.data.as_bytes()))
        .await?
        .map_err(|err| ConnectorError::local_io(&input.file, err))?;

    let (file, len) = ctx
        .guard(open_staging_file(&input.file))
        .await?
        .map_err(|err| ConnectorError::local_io(&input.file, err))?;

    ctx.guard(service.create_container())
        .await?
        .map_err(|err| classify::classify(err, "create_container", service.container_name()))?;

    let blob_name = util::object::blob_name_from_path(&input.file);
    let blob_name = blob_name.as_str();
    let ranges = util::object::block_ranges(len, tuning.block_size());
    let block_ids: Vec<String> = (0..ranges.len()).map(util::object::block_id).collect();
    info!(blob = blob_name, blocks = ranges.len(), bytes = len, "staging blocks");

    let file = Arc::new(file);
    let ids = &block_ids;
    futures::stream::iter(ranges.iter().copied().enumerate())
        .map(Ok::<_, ConnectorError>)
        .try_for_each_concurrent(tuning.parallelism(), move |(index, (offset, size))| {
            let file = Arc::clone(&file);
            async move {
                let data = ctx
                    .guard(read_block(file, offset, size))
                    .await?
                    .map_err(|err| ConnectorError::local_io(&input.file, err))?;

                ctx.guard(service.put_block(blob_name, &ids[index], data))
                    .await?
                    .map_err(|err| classify::classify(err, "put_block", service.container_name()))
            }
        })
        .await?;

    ctx.guard(service.put_block_list(blob_name, &block_ids))
        .await?
        .map_err(|err| classify::classify(err, "put_block_list", service.container_name()))?;

    info!(blob = blob_name, blocks = block_ids.len(), bytes = len, "uploaded");
    Ok(model::blob::UploadReceipt {
        blob_name: blob_name.to_string(),
        blocks: block_ids.len(),
        bytes: len,
    })
}

async fn write_staging_file(path: &str, data: &[u8]) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o700);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await
}

async fn open_staging_file(path: &str) -> io::Result<(File, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();

    Ok((file.into_std().await, len))
}

async fn read_block(file: Arc<File>, offset: u64, size: usize) -> io::Result<Bytes> {
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; size];
        read_exact_at(&file, &mut buf, offset)?;
        Ok(Bytes::from(buf))
    })
    .await
    .map_err(io::Error::other)?
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{Call, MemoryBlobService};

    fn path_in(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn test_upload_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = path_in(&dir, "sample.txt");
        let service = MemoryBlobService::new("sample");
        let ctx = util::context::InvocationContext::new();

        let receipt = upload_file(
            &service,
            &model::blob::UploadInput::new(&file, "Sample Blob"),
            &Default::default(),
            &ctx,
        )
        .await
        .unwrap();

        let name = util::object::blob_name_from_path(&file);
        assert_eq!(receipt.blob_name, name);
        assert_eq!(receipt.blocks, 1);
        assert_eq!(receipt.bytes, 11);
        assert_eq!(service.blob(&name), Some(Bytes::from_static(b"Sample Blob")));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "Sample Blob");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_staging_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = path_in(&dir, "mode.txt");
        write_staging_file(&file, b"x").await.unwrap();

        // The process umask can only clear bits.
        let mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & !0o700, 0);
    }

    #[tokio::test]
    async fn test_staging_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let file = path_in(&dir, "t.txt");
        write_staging_file(&file, b"longer content").await.unwrap();
        write_staging_file(&file, b"short").await.unwrap();
        assert_eq!(std::fs::read(&file).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_upload_empty_data() {
        let dir = tempfile::tempdir().unwrap();
        let file = path_in(&dir, "empty.txt");
        let service = MemoryBlobService::new("sample");
        let ctx = util::context::InvocationContext::new();

        let receipt = upload_file(
            &service,
            &model::blob::UploadInput::new(&file, ""),
            &Default::default(),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(receipt.blocks, 0);
        let name = util::object::blob_name_from_path(&file);
        assert_eq!(service.blob(&name), Some(Bytes::new()));
        assert_eq!(
            service.calls(),
            vec![
                Call::CreateContainer,
                Call::PutBlockList {
                    blob: name.to_string(),
                    blocks: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_read_block_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let file = path_in(&dir, "r.txt");
        write_staging_file(&file, b"0123456789").await.unwrap();
        let (handle, len) = open_staging_file(&file).await.unwrap();
        assert_eq!(len, 10);

        let handle = Arc::new(handle);
        let block = read_block(Arc::clone(&handle), 4, 3).await.unwrap();
        assert_eq!(block, Bytes::from_static(b"456"));
        assert!(read_block(handle, 8, 5).await.is_err());
    }
}
