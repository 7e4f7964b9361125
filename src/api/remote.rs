//! Purpose: HTTP implementation of the record and media store traits.
//! Exports: `HttpStore`.
//! Role: Transport client for any backend speaking the v0 collections API.
//! Invariants: Request/response envelopes are JSON; errors arrive either as
//! an error envelope or as a bare HTTP status, both mapped to `ErrorKind`.
//! Invariants: The base URL is normalized to scheme + authority only.

use crate::core::error::{Error, ErrorKind};
use crate::core::record::{Cursor, Page, Record};
use crate::core::store::{MediaStore, RecordStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Clone)]
pub struct HttpStore {
    inner: Arc<HttpStoreInner>,
}

struct HttpStoreInner {
    base_url: Url,
    token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct RecordsEnvelope {
    records: Vec<RemoteRecord>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct RecordEnvelope {
    record: RemoteRecord,
}

#[derive(Deserialize)]
struct RemoteRecord {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct MediaEnvelope {
    media: RemoteMedia,
}

#[derive(Deserialize)]
struct RemoteMedia {
    url: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
    collection: Option<String>,
    record_id: Option<String>,
}

#[derive(Serialize)]
struct InsertRequest<'a> {
    fields: &'a Map<String, Value>,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(HttpStoreInner {
                base_url,
                token: None,
                agent,
            }),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = Some(token.into());
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.token = token;
        } else {
            self.inner = Arc::new(HttpStoreInner {
                base_url: self.inner.base_url.clone(),
                token,
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    /// Per-request timeout for every call made through this store. Timeouts
    /// surface to callers as plain store failures; nothing retries here.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.agent = agent;
        } else {
            self.inner = Arc::new(HttpStoreInner {
                base_url: self.inner.base_url.clone(),
                token: self.inner.token.clone(),
                agent,
            });
        }
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let mut request = self.inner.agent.request(method, url.as_str());
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn request_json<T, R>(&self, method: &str, url: &Url, body: &T) -> Result<R, Error>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let request = self.request(method, url).set("Accept", "application/json");
        let response = if method == "GET" {
            request.call()
        } else {
            let payload = serde_json::to_string(body).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode request json")
                    .with_source(err)
            })?;
            request
                .set("Content-Type", "application/json")
                .send_string(&payload)
        };

        match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Unavailable)
                .with_message("request failed")
                .with_source(err)),
        }
    }
}

impl RecordStore for HttpStore {
    fn query(
        &self,
        collection: &str,
        page_size: usize,
        after: Option<&Cursor>,
    ) -> Result<Page, Error> {
        let mut url = build_url(
            &self.inner.base_url,
            &["v0", "collections", collection, "records"],
        )?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &page_size.to_string());
            if let Some(after) = after {
                pairs.append_pair("after", after.token());
            }
        }
        let envelope: RecordsEnvelope = self
            .request_json::<(), _>("GET", &url, &())
            .map_err(|err| err.with_collection(collection))?;
        Ok(Page {
            records: envelope
                .records
                .into_iter()
                .map(|rec| Record::new(rec.id, rec.fields))
                .collect(),
            cursor: envelope.cursor.map(Cursor::new),
        })
    }

    fn insert(&self, collection: &str, fields: Map<String, Value>) -> Result<String, Error> {
        let url = build_url(
            &self.inner.base_url,
            &["v0", "collections", collection, "records"],
        )?;
        let payload = InsertRequest { fields: &fields };
        let envelope: RecordEnvelope = self
            .request_json("POST", &url, &payload)
            .map_err(|err| err.with_collection(collection))?;
        Ok(envelope.record.id)
    }

    fn remove(&self, collection: &str, id: &str) -> Result<(), Error> {
        let url = build_url(
            &self.inner.base_url,
            &["v0", "collections", collection, "records", id],
        )?;
        let response = self
            .request("DELETE", &url)
            .set("Accept", "application/json")
            .call();
        match response {
            // Success needs no body; backends answer 204 or an empty 200.
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)
                .with_collection(collection)
                .with_record_id(id)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Unavailable)
                .with_message("request failed")
                .with_source(err)
                .with_collection(collection)
                .with_record_id(id)),
        }
    }
}

impl MediaStore for HttpStore {
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String, Error> {
        let mut url = match build_url(&self.inner.base_url, &["v0", "media"]) {
            Ok(url) => url,
            Err(err) => return Err(upload_failed(err)),
        };
        url.query_pairs_mut().append_pair("name", name);
        let response = self
            .request("POST", &url)
            .set("Accept", "application/json")
            .set("Content-Type", "application/octet-stream")
            .send_bytes(bytes);

        let result: Result<MediaEnvelope, Error> = match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Unavailable)
                .with_message("request failed")
                .with_source(err)),
        };
        match result {
            Ok(envelope) => Ok(envelope.media.url),
            Err(err) => Err(upload_failed(err)),
        }
    }
}

/// Fold any upload-path failure into the `UploadFailed` kind, keeping the
/// underlying error as the cause.
fn upload_failed(err: Error) -> Error {
    if err.kind() == ErrorKind::UploadFailed {
        return err;
    }
    Error::new(ErrorKind::UploadFailed)
        .with_message("media upload failed")
        .with_source(err)
}

fn normalize_base_url(raw: String) -> Result<Url, Error> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message("invalid store base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("store base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("store base url must not include a path"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::InvalidArgument).with_message("store base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_json_response<R>(response: ureq::Response) -> Result<R, Error>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return error_from_remote(envelope.error);
    }
    let kind = error_kind_from_status(status);
    Error::new(kind).with_message(format!("store error status {status}"))
}

fn error_from_remote(remote: RemoteError) -> Error {
    let mut err = Error::new(parse_error_kind(&remote.kind));
    if let Some(message) = remote.message {
        err = err.with_message(message);
    }
    if let Some(collection) = remote.collection {
        err = err.with_collection(collection);
    }
    if let Some(record_id) = remote.record_id {
        err = err.with_record_id(record_id);
    }
    err
}

fn parse_error_kind(kind: &str) -> ErrorKind {
    match kind {
        "Internal" => ErrorKind::Internal,
        "InvalidArgument" => ErrorKind::InvalidArgument,
        "NotFound" => ErrorKind::NotFound,
        "Unavailable" => ErrorKind::Unavailable,
        "Timeout" => ErrorKind::Timeout,
        "PermissionDenied" => ErrorKind::PermissionDenied,
        "UploadFailed" => ErrorKind::UploadFailed,
        "Io" => ErrorKind::Io,
        _ => ErrorKind::Internal,
    }
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 => ErrorKind::InvalidArgument,
        401 | 403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::NotFound,
        408 | 504 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Unavailable,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}
