use bytes::Bytes;
use futures::{future::BoxFuture, FutureExt};
use reqwest::{
    header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
    Method, Response, Url,
};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};
use tracing::debug;

use crate::{
    adapters::{self, ServiceResult},
    container::ContainerHandle,
    credential::SharedKeyCredential,
    model::{
        self,
        error::{ConnectorError, ServiceError},
    },
};

/// REST API version sent with, and signed into, every request.
pub const API_VERSION: &str = "2021-08-06";

const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// Blob service client speaking the REST protocol with Shared Key auth.
#[derive(Debug)]
pub struct AzureBlobClient {
    http: reqwest::Client,
    handle: ContainerHandle,
    credential: SharedKeyCredential,
}

impl AzureBlobClient {
    pub fn new(handle: ContainerHandle, credential: SharedKeyCredential) -> model::error::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| ConnectorError::InvalidConfig(format!("failed to build http client: {}", err)))?;

        Ok(Self {
            http,
            handle,
            credential,
        })
    }

    pub fn handle(&self) -> &ContainerHandle {
        &self.handle
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        content_type: Option<&'static str>,
        body: Option<Bytes>,
    ) -> ServiceResult<Response> {
        let date = format_date(OffsetDateTime::now_utc())?;
        let content_length = body.as_ref().map(Bytes::len).unwrap_or(0);
        let resource = canonical_resource(self.credential.account(), &url);
        let to_sign = string_to_sign(
            method.as_str(),
            content_length,
            content_type.unwrap_or(""),
            &[("x-ms-date", date.as_str()), ("x-ms-version", API_VERSION)],
            &resource,
        );
        let authorization = self
            .credential
            .authorization(&to_sign)
            .map_err(|err| ServiceError::transport(err.to_string()))?;

        debug!(method = %method, url = %url, "sending request");

        let mut req = self
            .http
            .request(method, url)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header(AUTHORIZATION, authorization);

        if let Some(content_type) = content_type {
            req = req.header(CONTENT_TYPE, content_type);
        }

        if let Some(body) = body {
            req = req.header(CONTENT_LENGTH, content_length).body(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|err| ServiceError::transport(err.to_string()))?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        Err(service_error(resp).await)
    }
}

impl adapters::BlobService for AzureBlobClient {
    fn container_name(&self) -> &str {
        self.handle.container()
    }

    fn create_container(&self) -> BoxFuture<'_, ServiceResult<()>> {
        async move {
            let mut url = self.handle.container_url();
            url.query_pairs_mut().append_pair("restype", "container");

            self.execute(Method::PUT, url, None, Some(Bytes::new()))
                .await
                .map(|_| ())
        }
        .boxed()
    }

    fn put_block<'a>(
        &'a self,
        blob: &'a str,
        block_id: &'a str,
        data: Bytes,
    ) -> BoxFuture<'a, ServiceResult<()>> {
        async move {
            let mut url = self.handle.blob_url(blob);
            url.query_pairs_mut()
                .append_pair("comp", "block")
                .append_pair("blockid", block_id);

            self.execute(Method::PUT, url, Some("application/octet-stream"), Some(data))
                .await
                .map(|_| ())
        }
        .boxed()
    }

    fn put_block_list<'a>(
        &'a self,
        blob: &'a str,
        block_ids: &'a [String],
    ) -> BoxFuture<'a, ServiceResult<()>> {
        async move {
            let mut url = self.handle.blob_url(blob);
            url.query_pairs_mut().append_pair("comp", "blocklist");

            let body = block_list_xml(block_ids)?;
            self.execute(Method::PUT, url, Some("application/xml"), Some(Bytes::from(body)))
                .await
                .map(|_| ())
        }
        .boxed()
    }

    fn list_blobs_segment<'a>(
        &'a self,
        marker: &'a model::blob::PageMarker,
        options: &'a model::settings::ListOptions,
    ) -> BoxFuture<'a, ServiceResult<model::blob::ListSegment>> {
        async move {
            let mut url = self.handle.container_url();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("restype", "container").append_pair("comp", "list");
                if let Some(token) = marker.token() {
                    query.append_pair("marker", token);
                }
                if let Some(max_results) = options.max_results {
                    query.append_pair("maxresults", &max_results.to_string());
                }
            }

            let resp = self.execute(Method::GET, url, None, None).await?;
            let body = resp
                .text()
                .await
                .map_err(|err| ServiceError::transport(err.to_string()))?;

            parse_list_segment(&body)
        }
        .boxed()
    }
}

/// RFC 1123 date as the service expects in `x-ms-date`.
fn format_date(now: OffsetDateTime) -> ServiceResult<String> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );

    now.format(format)
        .map_err(|err| ServiceError::transport(format!("failed to format request date: {}", err)))
}

/// `/{account}{path}` followed by the sorted, lower-cased query parameters.
fn canonical_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account, url.path());

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
        .collect();
    params.sort();

    for (k, v) in params {
        resource.push('\n');
        resource.push_str(&k);
        resource.push(':');
        resource.push_str(&v);
    }

    resource
}

/// Shared Key string-to-sign. Only the headers this client sends are
/// non-empty; `Content-Length` is blank when zero.
fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    canonical_resource: &str,
) -> String {
    let content_length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers = ms_headers.to_vec();
    headers.sort_by(|a, b| a.0.cmp(b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        verb, content_length, content_type, canonical_headers, canonical_resource
    )
}

#[derive(Serialize)]
#[serde(rename = "BlockList")]
struct BlockList<'a> {
    #[serde(rename = "Latest")]
    latest: &'a [String],
}

fn block_list_xml(block_ids: &[String]) -> ServiceResult<String> {
    quick_xml::se::to_string(&BlockList { latest: block_ids })
        .map_err(|err| ServiceError::transport(format!("failed to encode block list: {}", err)))
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct EnumerationResults {
    blobs: Blobs,
    next_marker: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Blobs {
    blob: Vec<Blob>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Blob {
    name: String,
    properties: Properties,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Properties {
    #[serde(rename = "Content-Length")]
    content_length: u64,
    #[serde(rename = "Content-Type")]
    content_type: String,
    #[serde(rename = "Last-Modified")]
    last_modified: String,
    #[serde(rename = "Content-MD5")]
    content_md5: String,
    etag: String,
    blob_type: String,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ErrorBody {
    code: String,
    message: String,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_list_segment(body: &str) -> ServiceResult<model::blob::ListSegment> {
    let out: EnumerationResults = quick_xml::de::from_str(body.trim_start_matches('\u{feff}'))
        .map_err(|err| ServiceError::transport(format!("failed to parse blob listing: {}", err)))?;

    let blobs = out
        .blobs
        .blob
        .into_iter()
        .map(|blob| model::blob::BlobDescriptor {
            name: blob.name,
            content_length: blob.properties.content_length,
            content_type: non_empty(blob.properties.content_type),
            etag: non_empty(blob.properties.etag),
            last_modified: non_empty(blob.properties.last_modified),
            content_md5: non_empty(blob.properties.content_md5),
            blob_type: non_empty(blob.properties.blob_type),
        })
        .collect();

    Ok(model::blob::ListSegment {
        blobs,
        next_marker: model::blob::PageMarker::from_next(out.next_marker),
    })
}

async fn service_error(resp: Response) -> ServiceError {
    let status = resp.status();
    let header_code = resp
        .headers()
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await.unwrap_or_default();

    let (body_code, message) = parse_error_body(&body);
    let message = message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    });

    ServiceError::Status {
        status: status.as_u16(),
        code: header_code.or(body_code),
        message,
    }
}

fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    match quick_xml::de::from_str::<ErrorBody>(body.trim_start_matches('\u{feff}')) {
        Ok(err) => (non_empty(err.code), non_empty(err.message)),
        Err(_) => (None, None),
    }
}
