use crate::error::GatewayError;
use crate::schema::CatalogOption;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value as JsonValue;
use std::time::Duration;

pub type Record = serde_json::Map<String, JsonValue>;

/// Blocking access to the compliance REST API. Concurrency is the caller's
/// business: every method performs exactly one request on the calling
/// thread and propagates failures unchanged.
pub trait Gateway: Send + Sync {
    fn fetch_list(&self, endpoint: &str) -> Result<Vec<CatalogOption>, GatewayError>;
    fn fetch_record(&self, endpoint: &str, id: &str) -> Result<Record, GatewayError>;
    fn create_record(&self, endpoint: &str, payload: &Record) -> Result<Record, GatewayError>;
    fn update_record(
        &self,
        endpoint: &str,
        id: &str,
        payload: &Record,
    ) -> Result<Record, GatewayError>;
    #[allow(dead_code)]
    fn delete_record(&self, endpoint: &str, id: &str) -> Result<(), GatewayError>;
    fn put_resource(&self, path: &str, payload: &Record) -> Result<Record, GatewayError>;
    fn post_resource(&self, path: &str, payload: &Record) -> Result<Record, GatewayError>;
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, self.url(path))
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn send(&self, req: RequestBuilder) -> Result<Option<JsonValue>, GatewayError> {
        let resp = req
            .send()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| GatewayError::Network(format!("reading body: {e}")))?;
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    fn send_json(
        &self,
        method: Method,
        path: &str,
        payload: &Record,
    ) -> Result<Record, GatewayError> {
        let req = self
            .request(method.clone(), path)
            .header(CONTENT_TYPE, "application/json")
            .json(payload);
        tracing::debug!(%method, path, "sending record");
        record_from_body(self.send(req)?)
    }
}

impl Gateway for HttpGateway {
    fn fetch_list(&self, endpoint: &str) -> Result<Vec<CatalogOption>, GatewayError> {
        match self.send(self.request(Method::GET, endpoint))? {
            Some(v) => options_from_json(&v),
            None => Ok(Vec::new()),
        }
    }

    fn fetch_record(&self, endpoint: &str, id: &str) -> Result<Record, GatewayError> {
        let path = format!("{}/{id}", endpoint.trim_end_matches('/'));
        match self.send(self.request(Method::GET, &path))? {
            Some(JsonValue::Object(map)) => Ok(map),
            Some(other) => Err(GatewayError::Decode(format!(
                "expected an object for {path}, got {}",
                json_kind(&other)
            ))),
            None => Err(GatewayError::Decode(format!("empty body for {path}"))),
        }
    }

    fn create_record(&self, endpoint: &str, payload: &Record) -> Result<Record, GatewayError> {
        self.send_json(Method::POST, endpoint, payload)
    }

    fn update_record(
        &self,
        endpoint: &str,
        id: &str,
        payload: &Record,
    ) -> Result<Record, GatewayError> {
        let path = format!("{}/{id}", endpoint.trim_end_matches('/'));
        self.send_json(Method::PUT, &path, payload)
    }

    fn delete_record(&self, endpoint: &str, id: &str) -> Result<(), GatewayError> {
        let path = format!("{}/{id}", endpoint.trim_end_matches('/'));
        self.send(self.request(Method::DELETE, &path)).map(|_| ())
    }

    fn put_resource(&self, path: &str, payload: &Record) -> Result<Record, GatewayError> {
        self.send_json(Method::PUT, path, payload)
    }

    fn post_resource(&self, path: &str, payload: &Record) -> Result<Record, GatewayError> {
        self.send_json(Method::POST, path, payload)
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.trim_end_matches('/').to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn record_from_body(body: Option<JsonValue>) -> Result<Record, GatewayError> {
    match body {
        None => Ok(Record::new()),
        Some(JsonValue::Object(map)) => Ok(map),
        // Some endpoints answer with a bare id or list; keep it reachable.
        Some(other) => {
            let mut map = Record::new();
            map.insert("data".to_string(), other);
            Ok(map)
        }
    }
}

/// Turn a catalog response into options. Accepts a bare array or an object
/// wrapping it under `items`, `data` or `data.items`.
pub(crate) fn options_from_json(v: &JsonValue) -> Result<Vec<CatalogOption>, GatewayError> {
    let arr = v
        .as_array()
        .or_else(|| v.get("items").and_then(|x| x.as_array()))
        .or_else(|| v.get("data").and_then(|x| x.as_array()))
        .or_else(|| {
            v.get("data")
                .and_then(|d| d.get("items"))
                .and_then(|x| x.as_array())
        })
        .ok_or_else(|| {
            GatewayError::Decode(format!("expected a list of options, got {}", json_kind(v)))
        })?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        if let Some(s) = item.as_str() {
            out.push(CatalogOption::new(s, s));
        } else if let Some(obj) = item.as_object() {
            let Some(id) = obj.get("id").or_else(|| obj.get("value")).cloned() else {
                tracing::debug!(item = %item, "skipping catalog item without id");
                continue;
            };
            let label = ["label", "nombre", "name", "title"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(|x| x.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| plain_string(&id));
            out.push(CatalogOption { id, label });
        }
    }
    Ok(out)
}

/// String form used for loose identity comparisons: strings unquoted,
/// everything else as JSON text.
pub(crate) fn plain_string(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_url_avoids_double_slashes() {
        assert_eq!(join_url("http://h/api/", "/assets"), "http://h/api/assets");
        assert_eq!(
            join_url("http://h", "setup/divisions?unit=3"),
            "http://h/setup/divisions?unit=3"
        );
        assert_eq!(join_url("http://h/", ""), "http://h");
    }

    #[test]
    fn options_accept_several_envelopes_and_label_keys() {
        let bare = json!([{"id": 1, "nombre": "Uno"}, {"id": "b", "title": "Bravo"}, "plain"]);
        let opts = options_from_json(&bare).unwrap();
        assert_eq!(opts[0], CatalogOption::new(1, "Uno"));
        assert_eq!(opts[1].label, "Bravo");
        assert_eq!(opts[2], CatalogOption::new("plain", "plain"));

        let wrapped = json!({"data": {"items": [{"value": "x", "label": "X"}]}});
        assert_eq!(options_from_json(&wrapped).unwrap()[0].id, json!("x"));

        let labelless = json!({"items": [{"id": 7}, {"label": "no id"}]});
        let opts = options_from_json(&labelless).unwrap();
        assert_eq!(opts, vec![CatalogOption::new(7, "7")]);
    }

    #[test]
    fn non_list_catalog_body_is_a_decode_error() {
        let err = options_from_json(&json!({"detail": "nope"})).unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn record_bodies_keep_non_objects_under_data() {
        assert!(record_from_body(None).unwrap().is_empty());
        let map = record_from_body(Some(json!(42))).unwrap();
        assert_eq!(map.get("data"), Some(&json!(42)));
    }

    /// Serve exactly one canned response on a local port. The join handle
    /// yields the raw request text.
    fn serve_once(status: &str, body: &str) -> (String, std::thread::JoinHandle<String>) {
        use std::io::{Read, Write};
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 1024];
            let head_end = loop {
                let n = conn.read(&mut chunk).unwrap();
                raw.extend_from_slice(&chunk[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                if n == 0 {
                    break raw.len();
                }
            };
            let head = String::from_utf8_lossy(&raw[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while raw.len() < head_end + content_length {
                let n = conn.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
            }
            conn.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (base, handle)
    }

    fn gateway(base: &str, token: Option<&str>) -> HttpGateway {
        HttpGateway::new(base, token.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn non_success_status_keeps_status_and_body() {
        let (base, server) = serve_once("422 Unprocessable Entity", r#"{"detail":"name required"}"#);
        let err = gateway(&base, None)
            .create_record("/assets", &Record::new())
            .unwrap_err();
        server.join().unwrap();
        assert_eq!(
            err,
            GatewayError::Http {
                status: 422,
                body: r#"{"detail":"name required"}"#.into()
            }
        );
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn success_with_non_json_body_is_a_decode_error() {
        let (base, server) = serve_once("200 OK", "<html>oops</html>");
        let err = gateway(&base, None).fetch_list("/units").unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn empty_success_body_is_an_empty_record() {
        let (base, server) = serve_once("204 No Content", "");
        let rec = gateway(&base, None)
            .put_resource("/assets/7/ai", &Record::new())
            .unwrap();
        server.join().unwrap();
        assert!(rec.is_empty());
    }

    #[test]
    fn record_that_is_not_an_object_is_a_decode_error() {
        let (base, server) = serve_once("200 OK", "[1,2]");
        let err = gateway(&base, None).fetch_record("/assets", "7").unwrap_err();
        let request = server.join().unwrap();
        assert!(request.starts_with("GET /assets/7 "));
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn bearer_token_and_json_payload_are_sent() {
        let (base, server) = serve_once("201 Created", r#"{"id":"a-1"}"#);
        let mut payload = Record::new();
        payload.insert("name".into(), json!("Laptop"));
        let rec = gateway(&base, Some("s3cret"))
            .create_record("/assets", &payload)
            .unwrap();
        let request = server.join().unwrap();
        assert_eq!(rec.get("id"), Some(&json!("a-1")));
        assert!(request.starts_with("POST /assets "));
        assert!(request.to_lowercase().contains("authorization: bearer s3cret"));
        assert!(request.ends_with(r#"{"name":"Laptop"}"#));
    }

    #[test]
    fn no_authorization_header_without_a_token() {
        let (base, server) = serve_once("200 OK", "[]");
        assert!(gateway(&base, None).fetch_list("/units").unwrap().is_empty());
        let request = server.join().unwrap();
        assert!(!request.to_lowercase().contains("authorization:"));
    }
}
