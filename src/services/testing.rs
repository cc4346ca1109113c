//! Scripted in-memory gateway for unit tests.

use crate::error::GatewayError;
use crate::schema::CatalogOption;
use crate::services::gateway::{Gateway, Record};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

type Reply<T> = Result<T, GatewayError>;

#[derive(Default)]
pub(crate) struct FakeGateway {
    lists: Mutex<HashMap<String, Reply<Vec<CatalogOption>>>>,
    records: Mutex<HashMap<String, Reply<Record>>>,
    writes: Mutex<HashMap<String, Reply<Record>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, String)>>,
    payloads: Mutex<Vec<(String, String, Record)>>,
}

fn not_found(path: &str) -> GatewayError {
    GatewayError::Http {
        status: 404,
        body: format!("no fixture for {path}"),
    }
}

impl FakeGateway {
    pub(crate) fn set_list(&self, endpoint: &str, reply: Reply<Vec<CatalogOption>>) {
        self.lists.lock().unwrap().insert(endpoint.to_string(), reply);
    }

    pub(crate) fn set_record(&self, path: &str, reply: Reply<Record>) {
        self.records.lock().unwrap().insert(path.to_string(), reply);
    }

    /// Reply for a write, keyed by "METHOD path".
    pub(crate) fn set_write(&self, method: &str, path: &str, reply: Reply<Record>) {
        self.writes
            .lock()
            .unwrap()
            .insert(format!("{method} {path}"), reply);
    }

    pub(crate) fn set_delay(&self, path: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(path.to_string(), delay);
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| p == path)
            .count()
    }

    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn payloads(&self) -> Vec<(String, String, Record)> {
        self.payloads.lock().unwrap().clone()
    }

    fn enter(&self, method: &str, path: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), path.to_string()));
        let delay = self.delays.lock().unwrap().get(path).copied();
        if let Some(d) = delay {
            std::thread::sleep(d);
        }
    }

    fn write(&self, method: &str, path: &str, payload: &Record) -> Reply<Record> {
        self.enter(method, path);
        self.payloads
            .lock()
            .unwrap()
            .push((method.to_string(), path.to_string(), payload.clone()));
        self.writes
            .lock()
            .unwrap()
            .get(&format!("{method} {path}"))
            .cloned()
            .unwrap_or_else(|| match json!({"id": "new-1"}) {
                serde_json::Value::Object(m) => Ok(m),
                _ => Ok(Record::new()),
            })
    }
}

impl Gateway for FakeGateway {
    fn fetch_list(&self, endpoint: &str) -> Result<Vec<CatalogOption>, GatewayError> {
        self.enter("GET", endpoint);
        self.lists
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| Err(not_found(endpoint)))
    }

    fn fetch_record(&self, endpoint: &str, id: &str) -> Result<Record, GatewayError> {
        let path = format!("{endpoint}/{id}");
        self.enter("GET", &path);
        self.records
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| Err(not_found(&path)))
    }

    fn create_record(&self, endpoint: &str, payload: &Record) -> Result<Record, GatewayError> {
        self.write("POST", endpoint, payload)
    }

    fn update_record(
        &self,
        endpoint: &str,
        id: &str,
        payload: &Record,
    ) -> Result<Record, GatewayError> {
        self.write("PUT", &format!("{endpoint}/{id}"), payload)
    }

    fn delete_record(&self, endpoint: &str, id: &str) -> Result<(), GatewayError> {
        self.write("DELETE", &format!("{endpoint}/{id}"), &Record::new())
            .map(|_| ())
    }

    fn put_resource(&self, path: &str, payload: &Record) -> Result<Record, GatewayError> {
        self.write("PUT", path, payload)
    }

    fn post_resource(&self, path: &str, payload: &Record) -> Result<Record, GatewayError> {
        self.write("POST", path, payload)
    }
}

pub(crate) fn record(v: serde_json::Value) -> Record {
    match v {
        serde_json::Value::Object(m) => m,
        other => panic!("fixture is not an object: {other}"),
    }
}
