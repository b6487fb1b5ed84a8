use reqwest::Url;

use crate::{
    credential,
    model::error::{ConnectorError, Result},
};

pub const BLOB_SERVICE_DOMAIN: &str = "blob.core.windows.net";

/// A container bound to its service endpoint. Built once, read-only after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    account: String,
    container: String,
    service: Url,
}

impl ContainerHandle {
    /// `https://{account}.blob.core.windows.net/{container}`. The account
    /// must be a valid storage account name since it forms the host.
    pub fn new(account: &str, container: &str) -> Result<Self> {
        credential::check_account_name(account)?;
        let endpoint = format!("https://{}.{}", account, BLOB_SERVICE_DOMAIN);
        Self::with_endpoint(&endpoint, account, container)
    }

    /// Binds `container` under an explicit service endpoint, such as a local
    /// emulator at `http://127.0.0.1:10000/devstoreaccount1`.
    pub fn with_endpoint(endpoint: &str, account: &str, container: &str) -> Result<Self> {
        let service = Url::parse(endpoint).map_err(|err| {
            ConnectorError::InvalidConfig(format!("invalid endpoint `{}`: {}", endpoint, err))
        })?;

        if service.cannot_be_a_base() || !matches!(service.scheme(), "http" | "https") {
            return Err(ConnectorError::InvalidConfig(format!(
                "endpoint `{}` is not an http(s) base url",
                endpoint
            )));
        }

        Ok(Self {
            account: account.to_string(),
            container: container.to_string(),
            service,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn container_url(&self) -> Url {
        self.url_with_segments(std::iter::once(self.container.as_str()))
    }

    /// Blob names keep their `/` separators as path segments.
    pub fn blob_url(&self, blob: &str) -> Url {
        self.url_with_segments(std::iter::once(self.container.as_str()).chain(blob.split('/')))
    }

    fn url_with_segments<'a>(&self, segments: impl Iterator<Item = &'a str>) -> Url {
        let mut url = self.service.clone();
        // Checked in `with_endpoint`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
