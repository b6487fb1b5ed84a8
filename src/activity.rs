use serde_json::{Map, Value};
use tracing::{error, info, span, Level};

use crate::{
    adapters::{self, azure::AzureBlobClient},
    container::ContainerHandle,
    credential::SharedKeyCredential,
    model, ops, util,
};

/// A configured blob connector: settings plus the service they resolve to.
///
/// Everything that can be checked without the network is checked in
/// [`BlobActivity::new`]; each `eval` then runs exactly one method.
pub struct BlobActivity {
    settings: model::settings::ConnectionSettings,
    service: Box<dyn adapters::BlobService>,
}

impl BlobActivity {
    pub fn new(settings: model::settings::ConnectionSettings) -> model::error::Result<Self> {
        let credential = SharedKeyCredential::new(&settings.account, &settings.access_key)?;

        let handle = match &settings.endpoint {
            Some(endpoint) => {
                ContainerHandle::with_endpoint(endpoint, &settings.account, &settings.container_name)?
            }
            None => ContainerHandle::new(&settings.account, &settings.container_name)?,
        };
        info!(
            container_url = %handle.container_url(),
            method = %settings.method,
            "container handle ready"
        );

        let client = AzureBlobClient::new(handle, credential)?;
        Ok(Self::with_service(settings, Box::new(client)))
    }

    pub fn from_map(values: &Map<String, Value>) -> model::error::Result<Self> {
        Self::new(model::settings::ConnectionSettings::from_map(values)?)
    }

    /// Binds `settings` to an already built service, skipping credential and
    /// endpoint resolution.
    pub fn with_service(
        settings: model::settings::ConnectionSettings,
        service: Box<dyn adapters::BlobService>,
    ) -> Self {
        Self { settings, service }
    }

    pub fn settings(&self) -> &model::settings::ConnectionSettings {
        &self.settings
    }

    /// Fresh context for one invocation, with the configured timeout if any.
    pub fn context(&self) -> util::context::InvocationContext {
        match self.settings.timeout {
            Some(timeout) => util::context::InvocationContext::with_timeout(timeout),
            None => util::context::InvocationContext::new(),
        }
    }

    pub async fn eval_async(
        &self,
        input: &model::blob::UploadInput,
    ) -> model::error::Result<model::blob::Output> {
        self.eval_with_context(input, &self.context()).await
    }

    pub async fn eval_with_context(
        &self,
        input: &model::blob::UploadInput,
        ctx: &util::context::InvocationContext,
    ) -> model::error::Result<model::blob::Output> {
        ops::dispatch(&self.settings, self.service.as_ref(), input, ctx).await
    }

    /// Blocking entry point for hosts that are not async.
    pub fn eval(&self, input: &model::blob::UploadInput) -> model::error::Result<model::blob::Output> {
        let span = span!(Level::INFO, "eval", context = "eval");
        let _e = span.enter();
        info!(method = %self.settings.method, "called");

        let res = util::runtime::get_runtime().block_on(self.eval_async(input));
        if let Err(err) = &res {
            error!(error_message=%err, error_group="eval");
        }

        res
    }

    /// [`BlobActivity::eval`] over the host's generic input and output maps.
    pub fn eval_map(&self, values: &Map<String, Value>) -> model::error::Result<Map<String, Value>> {
        let input = model::blob::UploadInput::from_map(values)?;
        self.eval(&input).map(|output| output.to_map())
    }
}
