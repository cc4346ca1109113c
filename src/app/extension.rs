use super::{dependency, load, DialogState, Effect, NoticeLevel};
use crate::form::SectionOrigin;
use crate::schema::{LoadedExtension, SchemaBundle};
use crate::services::gateway::plain_string;
use serde_json::Value as JsonValue;

/// Extension selected by `trigger`'s current choice: first by option id,
/// then by a case-insensitive label fragment.
pub fn resolve<'a>(
    bundle: &'a SchemaBundle,
    trigger: &str,
    id: Option<&JsonValue>,
    label: Option<&str>,
) -> Option<&'a LoadedExtension> {
    let candidates = || bundle.extensions.iter().filter(|e| e.spec.trigger == trigger);
    if let Some(id) = id.map(plain_string) {
        let by_id = candidates().find(|e| e.spec.values.iter().any(|v| plain_string(v) == id));
        if by_id.is_some() {
            return by_id;
        }
    }
    let label = label?.to_lowercase();
    candidates().find(|e| {
        e.spec
            .label_contains
            .iter()
            .any(|needle| !needle.is_empty() && label.contains(&needle.to_lowercase()))
    })
}

/// Re-evaluate the active extension after `key` changed.
pub(crate) fn on_trigger_changed(state: &mut DialogState, key: &str, effects: &mut Vec<Effect>) {
    if !state.bundle.extensions.iter().any(|e| e.spec.trigger == key) {
        return;
    }
    let (id, label) = match state.form.get(key) {
        Some(f) => (f.input.selected_id(), f.input.selected_label()),
        None => return,
    };
    let target = resolve(&state.bundle, key, id.as_ref(), label.as_deref())
        .map(|e| e.spec.name.clone());
    if target == state.extension {
        return;
    }
    swap(state, target, effects);
}

/// Replace the active extension. Removal and insertion happen within one
/// update so no frame observes a half-swapped form.
pub(crate) fn swap(state: &mut DialogState, target: Option<String>, effects: &mut Vec<Effect>) {
    if let Some(old) = state.extension.take() {
        let removed = state.form.remove_extension_sections(&old);
        for key in &removed {
            state.graph.remove_key(key);
            // In-flight dependent fetches for the removed field are stale.
            state.graph.next_generation(key);
            state.pending.reopen(key);
        }
        tracing::info!(extension = %old, fields = removed.len(), "extension deactivated");
    }
    if let Some(name) = target {
        let Some(ext) = state.bundle.extension(&name).cloned() else {
            tracing::warn!(extension = %name, "unknown extension");
            return;
        };
        let mut added = Vec::new();
        for section in &ext.sections {
            added.extend(state.add_section(section, SectionOrigin::Extension(name.clone())));
        }
        load::launch_catalogs(state, load::catalog_jobs(&ext.sections), effects);
        for key in &added {
            dependency::load_joined(state, key, effects);
        }
        tracing::info!(extension = %name, sections = ext.sections.len(), "extension activated");
        let titles: Vec<&str> = ext.sections.iter().map(|s| s.title.as_str()).collect();
        effects.push(Effect::Notify {
            text: format!("Added: {}", titles.join(", ")),
            level: NoticeLevel::Info,
        });
        state.extension = Some(name);
    }
    let last = state.form.sections().len().saturating_sub(1);
    state.step = state.step.min(last);
}
