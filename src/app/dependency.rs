use super::{DialogState, Effect};
use crate::schema::FieldSpec;
use crate::services::gateway::plain_string;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

/// Substitute `{name}` placeholders from `vars`. Unknown names are kept
/// verbatim.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[derive(Debug, Clone)]
pub struct DependentConfig {
    pub trigger: String,
    pub endpoint_template: String,
    pub cache_key: Option<String>,
}

#[derive(Debug, Clone)]
struct Edge {
    trigger: String,
    dependent: String,
    // Field whose declaration created the edge
    owner: String,
}

/// Trigger → dependent edges plus per-dependent fetch configuration and
/// generation counters. Generations only ever grow, so a response tagged
/// with an older value is always recognisable as stale.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: Vec<Edge>,
    configs: HashMap<String, DependentConfig>,
    generations: HashMap<String, u64>,
}

impl DependencyGraph {
    /// Record the edges and config a field declares.
    pub fn register(&mut self, spec: &FieldSpec) {
        for target in &spec.triggers_reload {
            self.add_edge(&spec.key, target, &spec.key);
        }
        if let Some(parent) = &spec.depends_on {
            self.add_edge(parent, &spec.key, &spec.key);
            if let Some(template) = &spec.dependency_endpoint_template {
                self.configs.insert(
                    spec.key.clone(),
                    DependentConfig {
                        trigger: parent.clone(),
                        endpoint_template: template.clone(),
                        cache_key: spec.cache_key.clone(),
                    },
                );
            }
        }
    }

    fn add_edge(&mut self, trigger: &str, dependent: &str, owner: &str) {
        let exists = self
            .edges
            .iter()
            .any(|e| e.trigger == trigger && e.dependent == dependent && e.owner == owner);
        if !exists {
            self.edges.push(Edge {
                trigger: trigger.to_string(),
                dependent: dependent.to_string(),
                owner: owner.to_string(),
            });
        }
    }

    /// Forget what `key` declared. Generations are kept.
    pub fn remove_key(&mut self, key: &str) {
        self.edges.retain(|e| e.owner != key);
        self.configs.remove(key);
    }

    /// Dependents of `trigger`, de-duplicated, in declaration order.
    pub fn dependents_of(&self, trigger: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in self.edges.iter().filter(|e| e.trigger == trigger) {
            if !out.contains(&e.dependent) {
                out.push(e.dependent.clone());
            }
        }
        out
    }

    pub fn config(&self, dependent: &str) -> Option<&DependentConfig> {
        self.configs.get(dependent)
    }

    pub fn next_generation(&mut self, dependent: &str) -> u64 {
        let g = self.generations.entry(dependent.to_string()).or_insert(0);
        *g += 1;
        *g
    }

    pub fn generation(&self, dependent: &str) -> u64 {
        self.generations.get(dependent).copied().unwrap_or(0)
    }

    pub fn is_current(&self, dependent: &str, generation: u64) -> bool {
        self.generation(dependent) == generation
    }
}

/// Reload every dependent of `trigger` from the trigger's current value.
/// Each dependent is emptied before its fetch is dispatched.
pub(crate) fn fire(state: &mut DialogState, trigger: &str, effects: &mut Vec<Effect>) {
    for dep in state.graph.dependents_of(trigger) {
        reload(state, trigger, &dep, effects);
    }
}

/// Fetch options for a dependent that just joined the form while its
/// trigger already holds a selection.
pub(crate) fn load_joined(state: &mut DialogState, dependent: &str, effects: &mut Vec<Effect>) {
    let Some(trigger) = state.graph.config(dependent).map(|c| c.trigger.clone()) else {
        return;
    };
    let selected = state
        .form
        .get(&trigger)
        .is_some_and(|f| f.input.selected_id().is_some());
    if selected {
        reload(state, &trigger, dependent, effects);
    }
}

fn reload(state: &mut DialogState, trigger: &str, dep: &str, effects: &mut Vec<Effect>) {
    if state.form.get(dep).is_none() {
        tracing::debug!(trigger, dependent = %dep, "dependent not in the form; skipping");
        return;
    }
    let Some(cfg) = state.graph.config(dep).cloned() else {
        tracing::debug!(trigger, dependent = %dep, "dependent has no endpoint template; skipping");
        return;
    };
    let value = state
        .form
        .get(trigger)
        .and_then(|f| f.input.selected_id())
        .map(|v| plain_string(&v))
        .unwrap_or_default();
    let url = render_template(&cfg.endpoint_template, &[("value", value.as_str())]);
    state.form.clear_options(dep);
    let generation = state.graph.next_generation(dep);
    clear_downstream(state, dep);
    tracing::debug!(trigger, dependent = %dep, %url, generation, "reloading dependent");
    effects.push(Effect::FetchDependent {
        key: dep.to_string(),
        url,
        cache_key: cfg.cache_key.map(|k| format!("{k}:{value}")),
        generation,
    });
}

/// Empty every configured dependent below `key` and invalidate fetches in
/// flight for them. They are refetched once their own trigger gets a value
/// again.
pub(crate) fn clear_downstream(state: &mut DialogState, key: &str) {
    let mut queue = state.graph.dependents_of(key);
    let mut seen: HashSet<String> = HashSet::new();
    while let Some(k) = queue.pop() {
        if k == key || !seen.insert(k.clone()) || state.graph.config(&k).is_none() {
            continue;
        }
        state.form.clear_options(&k);
        state.graph.next_generation(&k);
        queue.extend(state.graph.dependents_of(&k));
    }
}

/// A trigger's option list was replaced. Anything downstream built on the
/// old selection is stale.
pub(crate) fn options_replaced(state: &mut DialogState, key: &str, lost_value: bool) {
    if lost_value {
        clear_downstream(state, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn combo(key: &str) -> FieldSpec {
        FieldSpec {
            key: key.into(),
            field_type: FieldType::ComboDynamic,
            ..Default::default()
        }
    }

    #[test]
    fn template_substitutes_known_placeholders_only() {
        assert_eq!(
            render_template("/divisions?unit={value}", &[("value", "3")]),
            "/divisions?unit=3"
        );
        assert_eq!(render_template("/x?u={value}", &[("value", "")]), "/x?u=");
        assert_eq!(
            render_template("/assets/{id}/{other}", &[("id", "7")]),
            "/assets/7/{other}"
        );
    }

    #[test]
    fn back_edges_and_reload_lists_are_deduplicated() {
        let mut g = DependencyGraph::default();
        let mut unit = combo("unit");
        unit.triggers_reload = vec!["division".into(), "division".into()];
        let mut division = combo("division");
        division.depends_on = Some("unit".into());
        division.dependency_endpoint_template = Some("/d?u={value}".into());
        g.register(&unit);
        g.register(&division);
        assert_eq!(g.dependents_of("unit"), vec!["division"]);
        assert_eq!(g.config("division").unwrap().trigger, "unit");
    }

    #[test]
    fn removing_a_key_drops_what_it_declared_but_not_generations() {
        let mut g = DependencyGraph::default();
        let mut model = combo("model");
        model.depends_on = Some("vendor".into());
        model.dependency_endpoint_template = Some("/m?v={value}".into());
        g.register(&model);
        let current = g.next_generation("model");
        g.remove_key("model");
        assert!(g.dependents_of("vendor").is_empty());
        assert!(g.config("model").is_none());
        assert_eq!(g.generation("model"), current);
        assert_eq!(g.next_generation("model"), current + 1);
    }

    #[test]
    fn only_the_latest_generation_is_current() {
        let mut g = DependencyGraph::default();
        let first = g.next_generation("b");
        let second = g.next_generation("b");
        assert!(!g.is_current("b", first));
        assert!(g.is_current("b", second));
    }
}
