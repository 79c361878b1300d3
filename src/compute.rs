//! Client for the compute server's `GET /solve/<definition>` endpoint.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::inputs::InputSet;
use crate::metrics::NamedMetrics;

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request could not be sent: {0}")]
    Network(String),
    #[error("request failed: {status} {status_text}")]
    RequestFailed { status: u16, status_text: String },
    #[error("could not decode solve result: {0}")]
    DecodeFailed(String),
    #[error("no geometry objects to load")]
    EmptyResult { metrics: NamedMetrics },
}

impl From<serde_json::Error> for ComputeError {
    fn from(e: serde_json::Error) -> Self {
        ComputeError::DecodeFailed(e.to_string())
    }
}

/// `<base>/solve/<definition>?<id>=<value>&…`, one pair per input.
pub fn build_solve_url(base: &str, definition: &str, inputs: &InputSet) -> Result<Url, ComputeError> {
    let mut url = Url::parse(base)?;
    url.set_path(&format!("/solve/{definition}"));
    url.set_query(None);
    if !inputs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (id, value) in inputs.iter() {
            query.append_pair(id, &value.to_string());
        }
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Response model
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct TreeItem {
    #[serde(rename = "type")]
    pub type_tag: String,
    /// JSON text of the item.
    pub data: String,
}

/// Branches of one output, in the order the server sent them.
#[derive(Clone, Debug, Default)]
pub struct DataTree {
    pub branches: Vec<(String, Vec<TreeItem>)>,
}

impl<'de> Deserialize<'de> for DataTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BranchVisitor;

        impl<'de> Visitor<'de> for BranchVisitor {
            type Value = DataTree;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of branch path to items")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DataTree, A::Error> {
                let mut branches = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((path, items)) = map.next_entry::<String, Vec<TreeItem>>()? {
                    branches.push((path, items));
                }
                Ok(DataTree { branches })
            }
        }

        deserializer.deserialize_map(BranchVisitor)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SolveOutput {
    #[serde(rename = "ParamName")]
    pub param_name: String,
    #[serde(rename = "InnerTree", default)]
    pub inner_tree: DataTree,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SolveResponse {
    pub values: Vec<SolveOutput>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SolveResponse {
    pub fn parse(body: &str) -> Result<Self, ComputeError> {
        let response: SolveResponse = serde_json::from_str(body)?;
        for e in &response.errors {
            log::error!("solver: {e}");
        }
        for w in &response.warnings {
            log::warn!("solver: {w}");
        }
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct HttpReply {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpReply {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a GET and hands back whatever status came back.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(&self, url: &str) -> Result<HttpReply, ComputeError>;
}

/// Browser `fetch` through gloo-net.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct GlooTransport;

#[cfg(target_arch = "wasm32")]
impl Transport for GlooTransport {
    async fn get(&self, url: &str) -> Result<HttpReply, ComputeError> {
        use gloo_net::http::Request;

        let resp = Request::get(url)
            .send()
            .await
            .map_err(|e| ComputeError::Network(e.to_string()))?;
        let status = resp.status();
        let status_text = resp.status_text();
        let body = resp.text().await.map_err(|e| ComputeError::Network(e.to_string()))?;
        Ok(HttpReply { status, status_text, body })
    }
}

/// Blocking ehttp request; runs on the worker thread spawned by `execute`.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct EhttpTransport;

#[cfg(not(target_arch = "wasm32"))]
impl Transport for EhttpTransport {
    async fn get(&self, url: &str) -> Result<HttpReply, ComputeError> {
        let resp = ehttp::fetch_blocking(&ehttp::Request::get(url)).map_err(ComputeError::Network)?;
        let body = String::from_utf8_lossy(&resp.bytes).into_owned();
        Ok(HttpReply { status: resp.status, status_text: resp.status_text, body })
    }
}

#[cfg(target_arch = "wasm32")]
pub type DefaultTransport = GlooTransport;
#[cfg(not(target_arch = "wasm32"))]
pub type DefaultTransport = EhttpTransport;

/// Performs the request and parses the body. Non-2xx is `RequestFailed`.
pub async fn solve<T: Transport>(transport: &T, url: &Url) -> Result<SolveResponse, ComputeError> {
    log::info!("{url}");
    let reply = transport.get(url.as_str()).await?;
    if !reply.ok() {
        return Err(ComputeError::RequestFailed {
            status: reply.status,
            status_text: reply.status_text,
        });
    }
    SolveResponse::parse(&reply.body)
}

// ---------------------------------------------------------------------------
// Ordering of overlapping requests
// ---------------------------------------------------------------------------

/// Hands out sequence numbers; only the newest one may update the view.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: u64,
}

impl RequestTracker {
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.latest
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::inputs::InputValue;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Replies with a canned response and remembers what was asked.
    pub(crate) struct CannedTransport {
        pub reply: Result<HttpReply, String>,
        pub requested: RefCell<Vec<String>>,
    }

    impl CannedTransport {
        pub(crate) fn status(status: u16, status_text: &str, body: &str) -> Self {
            Self {
                reply: Ok(HttpReply {
                    status,
                    status_text: status_text.into(),
                    body: body.into(),
                }),
                requested: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn ok(body: &str) -> Self {
            Self::status(200, "OK", body)
        }
    }

    impl Transport for CannedTransport {
        async fn get(&self, url: &str) -> Result<HttpReply, ComputeError> {
            self.requested.borrow_mut().push(url.to_string());
            self.reply.clone().map_err(ComputeError::Network)
        }
    }

    fn sample_inputs() -> InputSet {
        let mut inputs = InputSet::new();
        inputs.insert("RH_IN:width", InputValue::Number(20.0));
        inputs.insert("RH_IN:spacing", InputValue::Number(0.25));
        inputs.insert("RH_IN:showStructure", InputValue::Bool(false));
        inputs
    }

    #[test]
    fn url_has_one_pair_per_input() {
        let inputs = sample_inputs();
        let url = build_solve_url("http://localhost:8081", "solarcanopy.gh", &inputs).unwrap();
        assert_eq!(url.path(), "/solve/solarcanopy.gh");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("RH_IN:width".to_string(), "20".to_string()),
                ("RH_IN:spacing".to_string(), "0.25".to_string()),
                ("RH_IN:showStructure".to_string(), "false".to_string()),
            ]
        );
    }

    #[test]
    fn url_replaces_base_path_and_query() {
        let url = build_solve_url("https://example.org/app/index.html?x=1", "a.gh", &InputSet::new())
            .unwrap();
        assert_eq!(url.as_str(), "https://example.org/solve/a.gh");
    }

    #[test]
    fn bad_base_is_rejected() {
        let err = build_solve_url("not a url", "a.gh", &InputSet::new()).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidUrl(_)));
    }

    #[test]
    fn inner_tree_keeps_server_order() {
        let body = r#"{"values": [{"ParamName": "RH_OUT:x", "InnerTree": {
            "{ 1; }": [{"type": "System.Double", "data": "1"}],
            "{ 0; }": [{"type": "System.Double", "data": "0"}]
        }}]}"#;
        let response = SolveResponse::parse(body).unwrap();
        let paths: Vec<&str> = response.values[0]
            .inner_tree
            .branches
            .iter()
            .map(|(p, _)| p.as_str())
            .collect();
        assert_eq!(paths, vec!["{ 1; }", "{ 0; }"]);
    }

    #[test]
    fn non_success_status_is_request_failed() {
        let transport = CannedTransport::status(500, "Internal Server Error", "boom");
        let url = build_solve_url("http://localhost:8081", "a.gh", &sample_inputs()).unwrap();
        let err = block_on(solve(&transport, &url)).unwrap_err();
        match err {
            ComputeError::RequestFailed { status, status_text } => {
                assert_eq!(status, 500);
                assert_eq!(status_text, "Internal Server Error");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(transport.requested.borrow().as_slice(), &[url.to_string()]);
    }

    #[test]
    fn malformed_body_is_decode_failed() {
        let transport = CannedTransport::ok("<html>not json</html>");
        let url = build_solve_url("http://localhost:8081", "a.gh", &InputSet::new()).unwrap();
        let err = block_on(solve(&transport, &url)).unwrap_err();
        assert!(matches!(err, ComputeError::DecodeFailed(_)));
    }

    #[test]
    fn network_failure_is_reported() {
        let transport = CannedTransport {
            reply: Err("connection refused".into()),
            requested: RefCell::new(Vec::new()),
        };
        let url = build_solve_url("http://localhost:8081", "a.gh", &InputSet::new()).unwrap();
        let err = block_on(solve(&transport, &url)).unwrap_err();
        assert_eq!(err.to_string(), "request could not be sent: connection refused");
    }

    #[test]
    fn only_latest_sequence_is_current() {
        let mut tracker = RequestTracker::default();
        let first = tracker.issue();
        let second = tracker.issue();
        assert!(first < second);
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
        assert_eq!(tracker.latest(), second);
    }
}
