use super::{update, DialogState, DialogStatus, Effect, FormMsg, Notice};
use crate::services::catalog::CatalogService;
use crate::services::gateway::Gateway;
use crate::services::loader;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

/// Shared handles the workers run against.
#[derive(Clone)]
pub struct Services {
    pub gateway: Arc<dyn Gateway>,
    pub catalogs: CatalogService,
}

pub fn run_effects(
    state: &mut DialogState,
    services: &Services,
    tx: &Sender<FormMsg>,
    effects: Vec<Effect>,
) {
    for eff in effects {
        match eff {
            Effect::FetchCatalog {
                key,
                endpoint,
                cache_key,
            } => {
                tracing::debug!(field = %key, %endpoint, "fetch catalog");
                loader::spawn_catalog_load(
                    services.catalogs.clone(),
                    key,
                    endpoint,
                    cache_key,
                    tx.clone(),
                );
            }
            Effect::FetchRecord { endpoint, id } => {
                tracing::debug!(%endpoint, %id, "fetch record");
                loader::spawn_record_load(services.gateway.clone(), endpoint, id, tx.clone());
            }
            Effect::FetchDependent {
                key,
                url,
                cache_key,
                generation,
            } => {
                loader::spawn_dependent_load(
                    services.catalogs.clone(),
                    key,
                    url,
                    cache_key,
                    generation,
                    tx.clone(),
                );
            }
            Effect::Submit(plan) => {
                loader::spawn_submit(
                    services.gateway.clone(),
                    services.catalogs.clone(),
                    plan,
                    tx.clone(),
                );
            }
            Effect::Notify { text, level } => {
                tracing::info!(?level, %text, "notice");
                state.notices.push(Notice { text, level });
            }
            Effect::Close => {
                state.status = DialogStatus::Closed;
            }
        }
    }
}

pub fn dispatch(
    state: &mut DialogState,
    services: &Services,
    tx: &Sender<FormMsg>,
    msg: FormMsg,
) {
    let effects = update(state, msg);
    run_effects(state, services, tx, effects);
}

/// Feed every queued worker result through `update`. Returns how many
/// messages were handled.
pub fn pump(
    state: &mut DialogState,
    services: &Services,
    tx: &Sender<FormMsg>,
    rx: &Receiver<FormMsg>,
) -> usize {
    let mut handled = 0;
    while let Ok(msg) = rx.try_recv() {
        dispatch(state, services, tx, msg);
        handled += 1;
    }
    handled
}
