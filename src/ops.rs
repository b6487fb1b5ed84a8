use tracing::info;

use crate::{adapters, model, util};

pub mod list;
pub mod upload;

/// Runs the single operation selected by `settings.method`.
///
/// Exactly one operation runs per call. Method names are validated when the
/// settings are built, so every variant reaching this point is supported.
pub async fn dispatch(
    settings: &model::settings::ConnectionSettings,
    service: &dyn adapters::BlobService,
    input: &model::blob::UploadInput,
    ctx: &util::context::InvocationContext,
) -> model::error::Result<model::blob::Output> {
    info!(method = %settings.method, container = service.container_name(), "executing method");

    match settings.method {
        model::settings::Method::Upload => {
            upload::upload_file(service, input, &settings.tuning, ctx)
                .await
                .map(model::blob::Output::Uploaded)
        }
        model::settings::Method::List => list::list_blobs(service, &settings.list, ctx)
            .await
            .map(model::blob::Output::Listed),
    }
}
