use std::sync::OnceLock;

use tokio::runtime::Runtime;

/// Runtime backing the synchronous entry points.
pub(crate) fn get_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();

    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("blobact-worker")
            .build()
            .expect("failed to build tokio runtime")
    })
}
