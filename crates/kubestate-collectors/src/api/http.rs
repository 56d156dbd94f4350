// Copyright (C) 2026  kubestate Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! HTTP implementation of [`ResourceApi`]
//!
//! Talks to a Kubernetes-style API server: lists are plain `GET`s on the
//! collection path, watches are `GET`s with `watch=1` whose body is a stream
//! of newline-delimited JSON events.

use super::{ObjectList, RawObject, ResourceApi, ResourceType, Tombstone, WatchEvent, WatchStream};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use bytes::BytesMut;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Server-side watch timeout; the stream then ends cleanly and is resumed
const WATCH_TIMEOUT_SECS: u64 = 300;

/// Resource API client over HTTP
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListBody {
    #[serde(default)]
    metadata: ListMeta,
    #[serde(default)]
    items: Vec<RawObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMeta {
    #[serde(default)]
    resource_version: String,
}

#[derive(Debug, Deserialize)]
struct WatchLine {
    #[serde(rename = "type")]
    kind: String,
    object: Value,
}

#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

impl HttpApi {
    /// Create a client for the API server at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Server root (e.g., "https://10.0.0.1:6443")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            token: None,
        }
    }

    /// Authenticate every request with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Server root this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, resource: &ResourceType, namespace: Option<&str>) -> String {
        format!("{}/{}", self.base_url, resource.collection_path(namespace))
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Map a non-success response to an error, reading the status body when present
async fn error_for_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StatusBody>(&body)
        .map(|s| s.message)
        .unwrap_or(body);

    if status == 410 {
        ApiError::Gone(message)
    } else {
        ApiError::Status { status, message }
    }
}

/// Decode one line of a watch response
///
/// Returns `Ok(None)` for blank lines.
pub fn parse_watch_line(kind: &str, line: &[u8]) -> ApiResult<Option<WatchEvent>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let line: WatchLine = serde_json::from_slice(line)?;
    let object = RawObject::new(line.object);

    let event = match line.kind.as_str() {
        "ADDED" => WatchEvent::Added(object),
        "MODIFIED" => WatchEvent::Modified(object),
        "DELETED" => {
            let tombstone = Tombstone::from_object(kind, &object)
                .ok_or_else(|| ApiError::decode("deleted object without a name"))?;
            WatchEvent::Deleted(tombstone)
        }
        "BOOKMARK" => {
            let rv = object
                .resource_version()
                .ok_or_else(|| ApiError::decode("bookmark without resourceVersion"))?;
            WatchEvent::Bookmark(rv.to_string())
        }
        "ERROR" => {
            let status: StatusBody = serde_json::from_value(object.value().clone())?;
            return Err(if status.code == 410 {
                ApiError::Gone(status.message)
            } else {
                ApiError::Status {
                    status: status.code,
                    message: status.message,
                }
            });
        }
        other => return Err(ApiError::decode(format!("unknown watch event type {}", other))),
    };

    Ok(Some(event))
}

fn take_line(buffer: &mut BytesMut) -> Option<BytesMut> {
    let end = buffer.iter().position(|b| *b == b'\n')?;
    let mut line = buffer.split_to(end + 1);
    line.truncate(end);
    Some(line)
}

#[async_trait]
impl ResourceApi for HttpApi {
    async fn list(&self, resource: &ResourceType, namespace: Option<&str>) -> ApiResult<ObjectList> {
        let url = self.url(resource, namespace);
        debug!("GET {}", url);

        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let body: ListBody = response.json().await?;
        Ok(ObjectList {
            items: body.items,
            resource_version: body.metadata.resource_version,
        })
    }

    async fn watch(
        &self,
        resource: &ResourceType,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> ApiResult<WatchStream> {
        let url = self.url(resource, namespace);
        debug!("GET {} (watch from {})", url, resource_version);

        let response = self
            .get(&url)
            .query(&[
                ("watch", "1"),
                ("allowWatchBookmarks", "true"),
                ("resourceVersion", resource_version),
            ])
            .query(&[("timeoutSeconds", WATCH_TIMEOUT_SECS)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let kind = resource.kind;
        let body = response.bytes_stream().boxed();
        let events = stream::unfold(
            Some((body, BytesMut::new())),
            move |state| async move {
                let (mut body, mut buffer) = state?;
                loop {
                    if let Some(line) = take_line(&mut buffer) {
                        match parse_watch_line(kind, &line) {
                            Ok(Some(event)) => return Some((Ok(event), Some((body, buffer)))),
                            Ok(None) => continue,
                            Err(e) => return Some((Err(e), None)),
                        }
                    }

                    match body.next().await {
                        Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                        Some(Err(e)) => return Some((Err(ApiError::from(e)), None)),
                        None => {
                            // Trailing line without a newline
                            let rest = buffer.split();
                            return match parse_watch_line(kind, &rest) {
                                Ok(Some(event)) => Some((Ok(event), None)),
                                Ok(None) => None,
                                Err(e) => Some((Err(e), None)),
                            };
                        }
                    }
                }
            },
        );

        Ok(events.boxed())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kubestate_store::ObjectIdentity;

    #[test]
    fn test_parse_added() {
        let line = br#"{"type":"ADDED","object":{"metadata":{"name":"a","namespace":"ns","resourceVersion":"5"}}}"#;
        let event = parse_watch_line("ConfigMap", line).unwrap().unwrap();
        assert_eq!(event.as_label(), "added");
        assert_eq!(event.resource_version(), Some("5"));
    }

    #[test]
    fn test_parse_deleted_builds_tombstone() {
        let line = br#"{"type":"DELETED","object":{"metadata":{"name":"a","namespace":"ns","resourceVersion":"9"}}}"#;
        match parse_watch_line("ConfigMap", line).unwrap().unwrap() {
            WatchEvent::Deleted(t) => {
                assert_eq!(t.identity, ObjectIdentity::namespaced("ConfigMap", "ns", "a"));
                assert_eq!(t.resource_version.as_deref(), Some("9"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_bookmark() {
        let line = br#"{"type":"BOOKMARK","object":{"metadata":{"resourceVersion":"12"}}}"#;
        assert_eq!(
            parse_watch_line("Pod", line).unwrap(),
            Some(WatchEvent::Bookmark("12".into()))
        );
    }

    #[test]
    fn test_parse_error_gone() {
        let line = br#"{"type":"ERROR","object":{"kind":"Status","code":410,"message":"too old resource version"}}"#;
        let err = parse_watch_line("Pod", line).unwrap_err();
        assert!(err.is_stale_cursor());
        assert_eq!(err, ApiError::Gone("too old resource version".into()));
    }

    #[test]
    fn test_parse_error_other_status() {
        let line = br#"{"type":"ERROR","object":{"code":500,"message":"internal"}}"#;
        let err = parse_watch_line("Pod", line).unwrap_err();
        assert!(!err.is_stale_cursor());
    }

    #[test]
    fn test_blank_and_garbage_lines() {
        assert_eq!(parse_watch_line("Pod", b"  \r").unwrap(), None);
        assert!(matches!(
            parse_watch_line("Pod", b"{not json"),
            Err(ApiError::Decode(_))
        ));
        assert!(parse_watch_line("Pod", br#"{"type":"WHAT","object":{}}"#).is_err());
    }

    #[test]
    fn test_take_line_splits_on_newline() {
        let mut buffer = BytesMut::from(&b"first\nsecond\npart"[..]);
        assert_eq!(&take_line(&mut buffer).unwrap()[..], b"first");
        assert_eq!(&take_line(&mut buffer).unwrap()[..], b"second");
        assert!(take_line(&mut buffer).is_none());
        assert_eq!(&buffer[..], b"part");
    }

    #[test]
    fn test_urls() {
        let api = HttpApi::new("https://cluster.local:6443/");
        let pods = ResourceType::core("v1", "Pod", "pods", true);
        assert_eq!(api.base_url(), "https://cluster.local:6443");
        assert_eq!(
            api.url(&pods, Some("kube-system")),
            "https://cluster.local:6443/api/v1/namespaces/kube-system/pods"
        );
    }
}
