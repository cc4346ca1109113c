//! Dialog state machine. `update` is the only mutator and runs on the UI
//! thread; workers report back through `FormMsg`.

pub mod dependency;
pub mod extension;
pub mod load;
pub mod pending;
pub mod runtime;
pub mod submit;


use crate::error::GatewayError;
use crate::form::progress::{compute_progress, Progress};
use crate::form::{FormState, InputCapability, SectionOrigin};
use crate::schema::{CatalogOption, SchemaBundle, Section};
use crate::services::gateway::Record;
use dependency::DependencyGraph;
use load::LoadCounter;
use pending::PendingRecord;
use serde_json::Value as JsonValue;
use submit::{SubmitPlan, SubmitReport};

pub enum FormMsg {
    Start,
    CatalogLoaded {
        key: String,
        result: Result<Vec<CatalogOption>, GatewayError>,
    },
    RecordLoaded {
        result: Result<Record, GatewayError>,
    },
    DependentLoaded {
        key: String,
        generation: u64,
        result: Result<Vec<CatalogOption>, GatewayError>,
    },
    SetValue {
        key: String,
        value: JsonValue,
    },
    NextStep,
    PrevStep,
    GoToStep(usize),
    Submit,
    Submitted {
        result: Result<SubmitReport, GatewayError>,
    },
    Cancel,
}

#[allow(clippy::large_enum_variant)]
pub enum Effect {
    FetchCatalog {
        key: String,
        endpoint: String,
        cache_key: Option<String>,
    },
    FetchRecord {
        endpoint: String,
        id: String,
    },
    FetchDependent {
        key: String,
        url: String,
        cache_key: Option<String>,
        generation: u64,
    },
    Submit(SubmitPlan),
    Notify {
        text: String,
        level: NoticeLevel,
    },
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogStatus {
    Open,
    Submitting,
    Closed,
}

pub struct DialogState {
    pub bundle: SchemaBundle,
    pub record_id: Option<String>,
    // Caller identity injected on submit
    pub identity: Option<String>,
    pub form: FormState,
    pub graph: DependencyGraph,
    pub pending: PendingRecord,
    pub loads: LoadCounter,
    pub loading: bool,
    pub progress: Progress,
    pub extension: Option<String>,
    pub step: usize,
    pub status: DialogStatus,
    pub notices: Vec<Notice>,
    started: bool,
}

impl DialogState {
    pub fn new(bundle: SchemaBundle, record_id: Option<String>, identity: Option<String>) -> Self {
        let mut state = Self {
            bundle,
            record_id,
            identity,
            form: FormState::default(),
            graph: DependencyGraph::default(),
            pending: PendingRecord::default(),
            loads: LoadCounter::default(),
            loading: false,
            progress: Progress::default(),
            extension: None,
            step: 0,
            status: DialogStatus::Open,
            notices: Vec::new(),
            started: false,
        };
        let sections = state.bundle.schema.sections.clone();
        for section in &sections {
            state.add_section(section, SectionOrigin::Base);
        }
        state.progress = compute_progress(&state.form);
        state
    }

    pub fn title(&self) -> &str {
        if self.record_id.is_some() {
            &self.bundle.schema.title_edit
        } else {
            &self.bundle.schema.title_new
        }
    }

    pub fn is_edit(&self) -> bool {
        self.record_id.is_some()
    }

    /// Returns the keys that were actually registered.
    pub(crate) fn add_section(&mut self, section: &Section, origin: SectionOrigin) -> Vec<String> {
        let keys = self.form.add_section(section, origin);
        for spec in section.leaf_fields() {
            if keys.contains(&spec.key) {
                self.graph.register(spec);
            }
        }
        keys
    }

    pub fn step_count(&self) -> usize {
        self.form.sections().len()
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }
}

pub fn update(state: &mut DialogState, msg: FormMsg) -> Vec<Effect> {
    use FormMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    match msg {
        Start => load::start_loading(state, &mut effects),
        CatalogLoaded { key, result } => {
            apply_options(state, &key, result);
            hydrate(state, &mut effects);
            load::complete_one(state);
        }
        RecordLoaded { result } => {
            match result {
                Ok(record) => {
                    tracing::debug!(keys = record.len(), "record received");
                    state.pending.hold(record);
                    hydrate(state, &mut effects);
                }
                Err(e) => {
                    effects.push(Effect::Notify {
                        text: format!("Could not load the record: {}", e.friendly_message()),
                        level: NoticeLevel::Error,
                    });
                }
            }
            load::complete_one(state);
        }
        DependentLoaded {
            key,
            generation,
            result,
        } => {
            if state.graph.is_current(&key, generation) {
                apply_options(state, &key, result);
                hydrate(state, &mut effects);
            } else {
                tracing::debug!(
                    field = %key,
                    generation,
                    current = state.graph.generation(&key),
                    "discarding stale dependent options"
                );
            }
        }
        SetValue { key, value } => {
            if state.form.set_value(&key, &value) {
                state.pending.forget(&key);
                on_field_changed(state, &key, &mut effects);
                hydrate(state, &mut effects);
            } else {
                tracing::debug!(field = %key, %value, "value not applicable");
            }
        }
        NextStep => {
            if state.step + 1 < state.step_count() {
                state.step += 1;
            }
        }
        PrevStep => state.step = state.step.saturating_sub(1),
        GoToStep(i) => {
            if i < state.step_count() {
                state.step = i;
            }
        }
        Submit => submit::begin(state, &mut effects),
        Submitted { result } => submit::finish(state, result, &mut effects),
        Cancel => {
            if state.status == DialogStatus::Submitting {
                tracing::debug!("cancel ignored while submitting");
            } else {
                tracing::info!("dialog cancelled");
                state.status = DialogStatus::Closed;
                effects.push(Effect::Close);
            }
        }
    }
    state.progress = compute_progress(&state.form);
    effects
}

fn apply_options(
    state: &mut DialogState,
    key: &str,
    result: Result<Vec<CatalogOption>, GatewayError>,
) {
    if state.form.get(key).is_none() {
        tracing::debug!(field = %key, "options for a field no longer in the form");
        return;
    }
    let (options, error) = match result {
        Ok(options) => (options, None),
        Err(e) => (Vec::new(), Some(e.friendly_message())),
    };
    let lost_value = state.form.set_options(key, options);
    if let Some(field) = state.form.get_mut(key) {
        field.load_error = error;
    }
    dependency::options_replaced(state, key, lost_value);
}

/// Dependents reload and extensions swap off a changed value.
fn on_field_changed(state: &mut DialogState, key: &str, effects: &mut Vec<Effect>) {
    dependency::fire(state, key, effects);
    extension::on_trigger_changed(state, key, effects);
}

/// Push pending record values into whichever inputs can take them now.
/// Applying a trigger can reload dependents or activate an extension, so
/// this repeats until a pass applies nothing.
fn hydrate(state: &mut DialogState, effects: &mut Vec<Effect>) {
    loop {
        let mut applied = Vec::new();
        for key in state.pending.unresolved_keys() {
            let Some(value) = state.pending.value(&key).cloned() else {
                continue;
            };
            let Some(field) = state.form.get_mut(&key) else {
                continue;
            };
            if value.is_null() {
                state.pending.resolve(&key);
                continue;
            }
            if field.input.set_json(&value) {
                state.pending.resolve(&key);
                applied.push(key);
            }
        }
        if applied.is_empty() {
            break;
        }
        tracing::debug!(fields = ?applied, "applied record values");
        for key in applied {
            on_field_changed(state, &key, effects);
        }
    }
}
