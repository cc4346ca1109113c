use super::{DialogState, DialogStatus, Effect, NoticeLevel};
use crate::app::dependency::render_template;
use crate::error::GatewayError;
use crate::form::payload::{serialize, sub_resource_payload};
use crate::schema::{SaveMethod, SubResourceSpec};
use crate::services::catalog::CatalogService;
use crate::services::gateway::{plain_string, Gateway, Record};
use serde_json::Value as JsonValue;

/// Everything the save worker needs, captured on the UI thread.
#[derive(Debug, Clone)]
pub struct SubmitPlan {
    pub endpoint: String,
    pub record_id: Option<String>,
    pub record_id_key: String,
    pub payload: Record,
    pub sub_resources: Vec<(SubResourceSpec, Record)>,
    pub invalidate: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SubResourceOutcome {
    pub name: String,
    pub result: Result<(), GatewayError>,
}

#[derive(Debug, Clone)]
pub struct SubmitReport {
    pub record_id: Option<String>,
    pub created: bool,
    pub response: Record,
    pub sub_resources: Vec<SubResourceOutcome>,
}

impl SubmitReport {
    pub fn failed_sub_resources(&self) -> Vec<&str> {
        self.sub_resources
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Main save, then each sub-resource on its own, then cache invalidation.
/// Only a failing main save is an error; sub-resource failures are
/// reported in the outcome list.
pub fn execute(
    gateway: &dyn Gateway,
    catalogs: &CatalogService,
    plan: SubmitPlan,
) -> Result<SubmitReport, GatewayError> {
    let created = plan.record_id.is_none();
    let response = match &plan.record_id {
        Some(id) => gateway.update_record(&plan.endpoint, id, &plan.payload),
        None => gateway.create_record(&plan.endpoint, &plan.payload),
    }
    .inspect_err(|e| {
        tracing::error!(endpoint = %plan.endpoint, error = %e, "record save failed");
    })?;
    let record_id = plan
        .record_id
        .clone()
        .or_else(|| response.get(&plan.record_id_key).map(plain_string))
        .filter(|id| !id.is_empty());
    tracing::info!(endpoint = %plan.endpoint, id = ?record_id, created, "record saved");

    let mut outcomes = Vec::with_capacity(plan.sub_resources.len());
    for (spec, payload) in &plan.sub_resources {
        let result = match &record_id {
            Some(id) => save_sub_resource(gateway, spec, id, payload),
            None => Err(GatewayError::Decode(format!(
                "response carries no '{}' to address {}",
                plan.record_id_key, spec.name
            ))),
        };
        if let Err(e) = &result {
            tracing::warn!(sub_resource = %spec.name, error = %e, "sub-resource save failed");
        }
        outcomes.push(SubResourceOutcome {
            name: spec.name.clone(),
            result,
        });
    }

    for key in &plan.invalidate {
        catalogs.invalidate(key);
    }

    Ok(SubmitReport {
        record_id,
        created,
        response,
        sub_resources: outcomes,
    })
}

fn save_sub_resource(
    gateway: &dyn Gateway,
    spec: &SubResourceSpec,
    id: &str,
    payload: &Record,
) -> Result<(), GatewayError> {
    let path = render_template(&spec.endpoint, &[("id", id)]);
    match spec.method {
        SaveMethod::Put => gateway.put_resource(&path, payload),
        SaveMethod::Post => gateway.post_resource(&path, payload),
    }
    .map(|_| ())
}

pub(crate) fn build_plan(state: &DialogState) -> Option<SubmitPlan> {
    let schema = &state.bundle.schema;
    let endpoint = schema.endpoint.clone()?;
    let mut payload = serialize(&state.form);
    if let (Some(key), Some(identity)) = (&schema.identity_key, &state.identity) {
        payload.insert(key.clone(), JsonValue::String(identity.clone()));
    }
    let sub_resources = schema
        .sub_resources
        .iter()
        .filter(|s| s.extension.is_none() || s.extension == state.extension)
        .map(|s| (s.clone(), sub_resource_payload(s, &payload)))
        .collect();
    Some(SubmitPlan {
        endpoint,
        record_id: state.record_id.clone(),
        record_id_key: schema.record_id_key.clone(),
        payload,
        sub_resources,
        invalidate: schema.invalidate_cache_keys.clone(),
    })
}

pub(crate) fn begin(state: &mut DialogState, effects: &mut Vec<Effect>) {
    if state.status != DialogStatus::Open {
        tracing::debug!(status = ?state.status, "submit ignored");
        return;
    }
    let Some(plan) = build_plan(state) else {
        tracing::warn!("submit requested but the form has no endpoint");
        effects.push(Effect::Notify {
            text: "This form has no endpoint to save to.".into(),
            level: NoticeLevel::Error,
        });
        return;
    };
    tracing::info!(
        endpoint = %plan.endpoint,
        edit = plan.record_id.is_some(),
        sub_resources = plan.sub_resources.len(),
        "submitting"
    );
    state.status = DialogStatus::Submitting;
    effects.push(Effect::Submit(plan));
}

pub(crate) fn finish(
    state: &mut DialogState,
    result: Result<SubmitReport, GatewayError>,
    effects: &mut Vec<Effect>,
) {
    match result {
        Ok(report) => {
            if report.record_id.is_some() {
                state.record_id = report.record_id.clone();
            }
            let schema = &state.bundle.schema;
            let text = if report.created {
                format!("{} saved.", schema.title_new)
            } else {
                format!("{} updated.", schema.title_edit)
            };
            effects.push(Effect::Notify {
                text,
                level: NoticeLevel::Success,
            });
            let failed = report.failed_sub_resources();
            if !failed.is_empty() {
                effects.push(Effect::Notify {
                    text: format!(
                        "Saved, but these sections could not be stored: {}",
                        failed.join(", ")
                    ),
                    level: NoticeLevel::Warning,
                });
            }
            state.status = DialogStatus::Closed;
            effects.push(Effect::Close);
        }
        Err(e) => {
            state.status = DialogStatus::Open;
            effects.push(Effect::Notify {
                text: format!("Could not save: {}", e.friendly_message()),
                level: NoticeLevel::Error,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::OptionCache;
    use crate::services::testing::{record, FakeGateway};
    use crate::schema::CatalogOption;
    use serde_json::json;
    use std::sync::Arc;

    fn spec(name: &str, endpoint: &str, method: SaveMethod) -> SubResourceSpec {
        SubResourceSpec {
            name: name.into(),
            endpoint: endpoint.into(),
            method,
            fields: Default::default(),
            extension: None,
        }
    }

    fn plan(record_id: Option<&str>) -> SubmitPlan {
        SubmitPlan {
            endpoint: "/assets".into(),
            record_id: record_id.map(String::from),
            record_id_key: "id".into(),
            payload: record(json!({"name": "Acme"})),
            sub_resources: vec![
                (spec("privacy", "/assets/{id}/privacy", SaveMethod::Put), Record::new()),
                (spec("owners", "/assets/{id}/owners", SaveMethod::Post), Record::new()),
                (spec("risk", "/assets/{id}/risk", SaveMethod::Put), Record::new()),
            ],
            invalidate: vec!["cache_assets".into()],
        }
    }

    fn catalogs(gw: Arc<FakeGateway>, dir: &tempfile::TempDir) -> (CatalogService, Arc<OptionCache>) {
        let cache = Arc::new(OptionCache::new(dir.path().join("c.json")));
        (CatalogService::new(gw, cache.clone()), cache)
    }

    #[test]
    fn create_then_sub_resources_with_returned_id() {
        let dir = tempfile::tempdir().unwrap();
        let gw = Arc::new(FakeGateway::default());
        gw.set_write("POST", "/assets", Ok(record(json!({"id": 41}))));
        let (cat, cache) = catalogs(gw.clone(), &dir);
        cache.put("cache_assets", &[CatalogOption::new(1, "old")]);

        let report = execute(gw.as_ref(), &cat, plan(None)).unwrap();
        assert!(report.created);
        assert_eq!(report.record_id.as_deref(), Some("41"));
        assert!(report.failed_sub_resources().is_empty());
        assert_eq!(gw.calls_to("/assets/41/privacy"), 1);
        assert_eq!(gw.calls_to("/assets/41/owners"), 1);
        assert!(cache.get("cache_assets").is_none());
    }

    #[test]
    fn one_failing_sub_resource_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let gw = Arc::new(FakeGateway::default());
        gw.set_write(
            "POST",
            "/assets/7/owners",
            Err(GatewayError::Http {
                status: 500,
                body: "db down".into(),
            }),
        );
        let (cat, _) = catalogs(gw.clone(), &dir);
        let report = execute(gw.as_ref(), &cat, plan(Some("7"))).unwrap();
        assert!(!report.created);
        assert_eq!(gw.calls_to("/assets/7"), 1);
        assert_eq!(report.failed_sub_resources(), vec!["owners"]);
        assert_eq!(gw.calls_to("/assets/7/risk"), 1);
        assert_eq!(report.sub_resources.len(), 3);
    }

    #[test]
    fn failing_main_save_skips_everything_else() {
        let dir = tempfile::tempdir().unwrap();
        let gw = Arc::new(FakeGateway::default());
        gw.set_write(
            "POST",
            "/assets",
            Err(GatewayError::Http {
                status: 422,
                body: "{}".into(),
            }),
        );
        let (cat, cache) = catalogs(gw.clone(), &dir);
        cache.put("cache_assets", &[CatalogOption::new(1, "old")]);
        let err = execute(gw.as_ref(), &cat, plan(None)).unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(gw.calls().len(), 1);
        assert!(cache.get("cache_assets").is_some());
    }

    #[test]
    fn missing_id_in_create_response_fails_sub_resources_only() {
        let dir = tempfile::tempdir().unwrap();
        let gw = Arc::new(FakeGateway::default());
        gw.set_write("POST", "/assets", Ok(Record::new()));
        let (cat, _) = catalogs(gw.clone(), &dir);
        let report = execute(gw.as_ref(), &cat, plan(None)).unwrap();
        assert_eq!(report.record_id, None);
        assert_eq!(report.failed_sub_resources().len(), 3);
        assert_eq!(gw.calls().len(), 1);
    }
}
