//! Purge engine.
//!
//! States run `Idle → EnforcementRelaxed → PerTable → EnforcementRestored`.
//! Once enforcement is relaxed nothing returns early, so the restore step
//! always runs. If the future is dropped mid-run the session is dropped with
//! it, and adapters close the underlying connection, which discards the
//! relaxed setting.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::domain::Error;
use crate::domain::ports::{
    ActivityEntry, ActivityLog, PurgeCommand, PurgeRequest, PurgeSelection, PurgeSession,
    PurgeStore, PurgeStoreError,
};
use crate::domain::report::{PurgeReport, TableOutcome};

use super::{PurgeConfig, PurgeTarget, TableClass, classify};

/// Domain service implementing [`PurgeCommand`].
///
/// Purges through one service instance are serialised; the adapter also
/// serialises purges across processes.
pub struct PurgeService<S, A> {
    store: Arc<S>,
    activity: Arc<A>,
    config: PurgeConfig,
    in_progress: Mutex<()>,
}

impl<S, A> PurgeService<S, A> {
    pub fn new(store: Arc<S>, activity: Arc<A>, config: PurgeConfig) -> Self {
        Self {
            store,
            activity,
            config,
            in_progress: Mutex::new(()),
        }
    }
}

/// Requested targets in deletion order plus names the catalogue does not know.
#[derive(Debug, Default)]
struct Plan {
    targets: BTreeSet<PurgeTarget>,
    unknown: Vec<String>,
}

fn plan(selection: &PurgeSelection) -> Result<Plan, Error> {
    let names = match selection {
        PurgeSelection::All => {
            return Ok(Plan {
                targets: PurgeTarget::ORDERED.into_iter().collect(),
                unknown: Vec::new(),
            });
        }
        PurgeSelection::Tables(names) => names,
    };
    if names.is_empty() {
        return Err(Error::invalid_request("at least one table must be named"));
    }

    let mut plan = Plan::default();
    let mut protected = Vec::new();
    for name in names {
        match classify(name) {
            TableClass::Target(target) => {
                plan.targets.insert(target);
            }
            TableClass::Protected(table) => protected.push(table.table_name()),
            TableClass::Unknown(raw) => plan.unknown.push(raw),
        }
    }
    if !protected.is_empty() {
        return Err(
            Error::invalid_request("protected tables cannot be purged")
                .with_details(json!({ "protected": protected })),
        );
    }
    Ok(plan)
}

#[async_trait]
impl<S, A> PurgeCommand for PurgeService<S, A>
where
    S: PurgeStore,
    A: ActivityLog,
{
    async fn purge(&self, request: PurgeRequest) -> Result<PurgeReport, Error> {
        let plan = plan(&request.selection)?;
        let mut report = PurgeReport::new();
        for name in plan.unknown {
            warn!(table = %name, "ignoring unknown table");
            report.reject_unknown(name);
        }

        if !plan.targets.is_empty() {
            let _guard = self.in_progress.lock().await;
            let mut session = self.store.open_session().await.map_err(map_store_error)?;
            session
                .relax_enforcement()
                .await
                .map_err(map_store_error)?;
            debug!(tables = plan.targets.len(), "referential integrity relaxed");

            for target in &plan.targets {
                let outcome = self.purge_table(session.as_mut(), *target).await;
                report.push_table(outcome);
            }

            let restored = match session.restore_enforcement().await {
                Ok(()) => true,
                Err(err) => {
                    error!(error = %err, "failed to restore referential integrity; closing session");
                    false
                }
            };
            report.set_enforcement_restored(restored);
        }

        info!(
            cleared = report.cleared().len(),
            missing = report.missing().len(),
            errors = report.errors().len(),
            enforcement_restored = report.enforcement_restored(),
            "purge finished"
        );
        self.record_activity(&request.actor, &report).await;
        Ok(report)
    }
}

impl<S, A> PurgeService<S, A>
where
    S: PurgeStore,
    A: ActivityLog,
{
    async fn purge_table(&self, session: &mut dyn PurgeSession, target: PurgeTarget) -> TableOutcome {
        match timeout(self.config.table_timeout, purge_one(session, target)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(table = target.table_name(), error = %err, "table purge failed");
                TableOutcome::failed(target, err.to_string())
            }
            Err(_) => {
                warn!(table = target.table_name(), "table purge timed out");
                TableOutcome::failed(target, "table purge timed out")
            }
        }
    }

    async fn record_activity(&self, actor: &str, report: &PurgeReport) {
        let entry = ActivityEntry {
            action: "purge".to_owned(),
            detail: format!(
                "cleared: [{}]; missing: [{}]; errors: {}",
                report.cleared().join(", "),
                report.missing().join(", "),
                report.errors().len()
            ),
            actor: actor.to_owned(),
        };
        if let Err(err) = self.activity.record(&entry).await {
            warn!(error = %err, "failed to record purge activity");
        }
    }
}

async fn purge_one(
    session: &mut dyn PurgeSession,
    target: PurgeTarget,
) -> Result<TableOutcome, PurgeStoreError> {
    if !session.table_exists(target).await? {
        debug!(table = target.table_name(), "table missing; skipped");
        return Ok(TableOutcome::missing(target));
    }
    let rows = session.delete_all(target).await?;
    let identity_reset = match session.reset_identity(target).await {
        Ok(reset) => reset,
        Err(err) => {
            warn!(table = target.table_name(), error = %err, "identity reset failed");
            false
        }
    };
    debug!(table = target.table_name(), rows, identity_reset, "table cleared");
    Ok(TableOutcome::cleared(target, rows, identity_reset))
}

fn map_store_error(error: PurgeStoreError) -> Error {
    match error {
        PurgeStoreError::Connection { message }
        | PurgeStoreError::Enforcement { message }
        | PurgeStoreError::Timeout { message } => {
            Error::service_unavailable(format!("purge store unavailable: {message}"))
        }
        PurgeStoreError::Query { message } => {
            Error::internal(format!("purge store query failed: {message}"))
        }
    }
}
