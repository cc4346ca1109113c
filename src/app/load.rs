use super::{DialogState, Effect};
use crate::form::progress::compute_progress;
use crate::schema::Section;

/// Outstanding catalog and record fetches for one dialog.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadCounter {
    outstanding: usize,
    launched: usize,
    completed: usize,
}

impl LoadCounter {
    pub fn launch(&mut self, n: usize) {
        self.outstanding += n;
        self.launched += n;
    }

    /// Count one finished fetch. True exactly when this completion brought
    /// the counter to zero.
    pub fn complete(&mut self) -> bool {
        if self.outstanding == 0 {
            tracing::warn!(
                launched = self.launched,
                completed = self.completed,
                "load completion with nothing outstanding"
            );
            return false;
        }
        self.outstanding -= 1;
        self.completed += 1;
        self.outstanding == 0
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn launched(&self) -> usize {
        self.launched
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding == 0
    }
}

/// A catalog fetch to launch for a freshly constructed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogJob {
    pub key: String,
    pub endpoint: String,
    pub cache_key: Option<String>,
}

pub(crate) fn catalog_jobs(sections: &[Section]) -> Vec<CatalogJob> {
    sections
        .iter()
        .flat_map(|s| s.leaf_fields())
        .filter(|f| f.is_preloaded_catalog())
        .filter_map(|f| {
            Some(CatalogJob {
                key: f.key.clone(),
                endpoint: f.source.clone()?,
                cache_key: f.effective_cache_key(),
            })
        })
        .collect()
}

/// Kick off the initial load: base catalogs plus the record in edit mode.
pub(crate) fn start_loading(state: &mut DialogState, effects: &mut Vec<Effect>) {
    if state.started {
        tracing::debug!("start requested twice; ignoring");
        return;
    }
    state.started = true;
    let jobs = catalog_jobs(&state.bundle.schema.sections);
    let record = match (&state.record_id, &state.bundle.schema.endpoint) {
        (Some(id), Some(endpoint)) => Some((endpoint.clone(), id.clone())),
        (Some(id), None) => {
            tracing::warn!(id = %id, "edit mode without an endpoint; record not loaded");
            None
        }
        _ => None,
    };
    let total = jobs.len() + usize::from(record.is_some());
    tracing::info!(catalogs = jobs.len(), edit = record.is_some(), "loading form data");
    if total == 0 {
        finish(state);
        return;
    }
    state.loads.launch(total);
    state.loading = true;
    for job in jobs {
        push_catalog(job, effects);
    }
    if let Some((endpoint, id)) = record {
        effects.push(Effect::FetchRecord { endpoint, id });
    }
}

/// Launch catalog preloads added after start (extension fields).
pub(crate) fn launch_catalogs(
    state: &mut DialogState,
    jobs: Vec<CatalogJob>,
    effects: &mut Vec<Effect>,
) {
    if jobs.is_empty() {
        return;
    }
    state.loads.launch(jobs.len());
    state.loading = true;
    for job in jobs {
        push_catalog(job, effects);
    }
}

fn push_catalog(job: CatalogJob, effects: &mut Vec<Effect>) {
    effects.push(Effect::FetchCatalog {
        key: job.key,
        endpoint: job.endpoint,
        cache_key: job.cache_key,
    });
}

pub(crate) fn complete_one(state: &mut DialogState) {
    if state.loads.complete() {
        finish(state);
    }
}

fn finish(state: &mut DialogState) {
    state.loading = false;
    state.progress = compute_progress(&state.form);
    tracing::info!(
        fetches = state.loads.launched(),
        filled = state.progress.global.0,
        required = state.progress.global.1,
        "form data loaded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_zero_exactly_once() {
        let mut c = LoadCounter::default();
        c.launch(2);
        assert!(!c.complete());
        assert!(c.complete());
        assert!(c.is_idle());
    }

    #[test]
    fn never_goes_negative() {
        let mut c = LoadCounter::default();
        assert!(!c.complete());
        assert_eq!(c.outstanding(), 0);
        c.launch(1);
        assert!(c.complete());
        assert!(!c.complete());
        assert_eq!(c.outstanding(), 0);
    }

    #[test]
    fn later_launches_extend_the_batch() {
        let mut c = LoadCounter::default();
        c.launch(1);
        c.launch(2);
        assert!(!c.complete());
        assert!(!c.complete());
        assert!(c.complete());
        assert_eq!(c.launched(), 3);
    }
}
