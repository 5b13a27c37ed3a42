use async_trait::async_trait;
use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use xbrlkit::{Transport, TransportResponse, Xbrl, XbrlConfig};

pub fn fixture_path(relative: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn read_fixture(relative: impl AsRef<Path>) -> String {
    fs::read_to_string(fixture_path(relative)).expect("fixture file should be readable")
}

/// Serves canned responses in order and records the requested URLs.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<TransportResponse>>,
    requests: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, status: u16, reason: &str, body: impl Into<String>) {
        self.responses.lock().unwrap().push_back(TransportResponse {
            status,
            reason: reason.to_string(),
            url: String::new(),
            body: body.into(),
        });
    }

    pub fn push_ok(&self, body: impl Into<String>) {
        self.push(200, "OK", body);
    }

    pub fn push_fixture(&self, relative: &str) {
        self.push_ok(read_fixture(relative));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> xbrlkit::Result<TransportResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        let mut response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no canned response for {url}"));
        response.url = url.to_string();
        Ok(response)
    }
}

#[allow(dead_code)]
pub fn xbrl(transport: &Arc<MockTransport>) -> Xbrl {
    xbrl_with_config(XbrlConfig::default(), transport)
}

#[allow(dead_code)]
pub fn xbrl_with_config(config: XbrlConfig, transport: &Arc<MockTransport>) -> Xbrl {
    Xbrl::with_transport(config, transport.clone()).unwrap()
}

/// A JSON:API filing document. `entity` and `messages` become
/// relationships of the filing.
#[allow(dead_code)]
pub fn filing_json(id: &str, country: &str, entity: &str, messages: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "type": "filing",
        "id": id,
        "attributes": {
            "country": country,
            "fxo_id": format!("{entity}-2023-12-31-ESEF-{country}-0"),
            "period_end": "2023-12-31",
            "date_added": "2024-03-01 10:00:00.000000",
            "processed": "2024-03-02 11:30:00.000000",
            "error_count": 0,
            "inconsistency_count": messages.len(),
            "warning_count": 0,
            "package_url": format!("/{entity}/2023-12-31/ESEF/{country}/0/report-{id}-2023-12-31-en.zip"),
            "sha256": format!("sha-{id}")
        },
        "relationships": {
            "entity": {"data": {"type": "entity", "id": entity}},
            "validation_messages": {
                "data": messages
                    .iter()
                    .map(|m| serde_json::json!({"type": "validation_message", "id": m}))
                    .collect::<Vec<_>>()
            }
        },
        "links": {"self": format!("/api/filings/{id}")}
    })
}

#[allow(dead_code)]
pub fn entity_json(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "entity",
        "id": id,
        "attributes": {"identifier": format!("LEI{id}"), "name": name},
        "links": {"self": format!("/api/entities/LEI{id}")}
    })
}

#[allow(dead_code)]
pub fn message_json(id: &str, code: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "validation_message",
        "id": id,
        "attributes": {"severity": "inconsistency", "code": code, "message": text}
    })
}

/// A page document. `next` is a relative link to the following page.
#[allow(dead_code)]
pub fn page_json(
    data: Vec<serde_json::Value>,
    included: Vec<serde_json::Value>,
    next: Option<&str>,
    count: usize,
) -> String {
    let mut links = serde_json::json!({"self": "/api/filings"});
    if let Some(next) = next {
        links["next"] = serde_json::json!(next);
    }
    serde_json::json!({
        "data": data,
        "included": included,
        "links": links,
        "meta": {"count": count},
        "jsonapi": {"version": "1.0"}
    })
    .to_string()
}
