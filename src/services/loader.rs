use crate::app::submit::{self, SubmitPlan};
use crate::app::FormMsg;
use crate::services::catalog::CatalogService;
use crate::services::gateway::Gateway;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

// Every spawner runs one blocking job on its own thread and reports back
// through the dialog channel. A closed channel means the dialog is gone, so
// send failures are ignored.

pub fn spawn_catalog_load(
    catalogs: CatalogService,
    key: String,
    endpoint: String,
    cache_key: Option<String>,
    tx: Sender<FormMsg>,
) {
    thread::spawn(move || {
        let result = catalogs.get_catalog(&endpoint, cache_key.as_deref());
        if let Err(e) = &result {
            tracing::warn!(field = %key, endpoint = %endpoint, error = %e, "catalog load failed");
        }
        let _ = tx.send(FormMsg::CatalogLoaded { key, result });
    });
}

pub fn spawn_record_load(
    gateway: Arc<dyn Gateway>,
    endpoint: String,
    id: String,
    tx: Sender<FormMsg>,
) {
    thread::spawn(move || {
        let result = gateway.fetch_record(&endpoint, &id);
        if let Err(e) = &result {
            tracing::warn!(endpoint = %endpoint, id = %id, error = %e, "record load failed");
        }
        let _ = tx.send(FormMsg::RecordLoaded { result });
    });
}

pub fn spawn_dependent_load(
    catalogs: CatalogService,
    key: String,
    url: String,
    cache_key: Option<String>,
    generation: u64,
    tx: Sender<FormMsg>,
) {
    thread::spawn(move || {
        let result = catalogs.get_catalog(&url, cache_key.as_deref());
        if let Err(e) = &result {
            tracing::warn!(field = %key, url = %url, error = %e, "dependent options load failed");
        }
        let _ = tx.send(FormMsg::DependentLoaded {
            key,
            generation,
            result,
        });
    });
}

pub fn spawn_submit(
    gateway: Arc<dyn Gateway>,
    catalogs: CatalogService,
    plan: SubmitPlan,
    tx: Sender<FormMsg>,
) {
    thread::spawn(move || {
        let result = submit::execute(gateway.as_ref(), &catalogs, plan);
        let _ = tx.send(FormMsg::Submitted { result });
    });
}
