//! `OutboxDispatcher` — the worker loop that drains the outbox, modeled on
//! the teacher's `OutboxWorker` lifecycle (`start`/`stop`, `CancellationToken`,
//! tracked `JoinHandle`, `Drop` cancels outstanding work). Per claimed event
//! it calls `forgesheet_core::dispatcher::dispatch_event` and then commits
//! the event's own status transition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use forgesheet_core::dispatcher::{dispatch_event, DispatchOutcome};
use forgesheet_core::gateway::{ForgeGateway, SheetGateway};
use forgesheet_core::identity::IdentityResolver;
use forgesheet_core::store::Store;
use forgesheet_domain::Config;
use forgesheet_common::{BackoffStrategy, Jitter};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub batch_size: usize,
    pub workers: usize,
    pub poll_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub reclaim_threshold: chrono::Duration,
}

impl DispatcherConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.sync.dispatcher_batch_size,
            workers: config.sync.dispatcher_workers,
            poll_interval: Duration::from_millis(500),
            backoff_base: Duration::from_millis(config.sync.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.sync.backoff_cap_ms),
            reclaim_threshold: chrono::Duration::from_std(config.sync.reclaim_threshold)
                .unwrap_or_else(|_| chrono::Duration::seconds(120)),
        }
    }
}

pub struct OutboxDispatcher {
    store: Arc<dyn Store>,
    forge: Arc<dyn ForgeGateway>,
    sheet: Arc<dyn SheetGateway>,
    identity: Arc<dyn IdentityResolver>,
    config: Config,
    dispatcher_config: DispatcherConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl OutboxDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        forge: Arc<dyn ForgeGateway>,
        sheet: Arc<dyn SheetGateway>,
        identity: Arc<dyn IdentityResolver>,
        config: Config,
    ) -> Self {
        let dispatcher_config = DispatcherConfig::from_config(&config);
        Self {
            store,
            forge,
            sheet,
            identity,
            config,
            dispatcher_config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    #[instrument(skip(self))]
    pub fn start(&mut self) {
        if self.is_running() {
            warn!("dispatcher already running");
            return;
        }
        self.cancellation = CancellationToken::new();
        let store = Arc::clone(&self.store);
        let forge = Arc::clone(&self.forge);
        let sheet = Arc::clone(&self.sheet);
        let identity = Arc::clone(&self.identity);
        let config = self.config.clone();
        let dispatcher_config = self.dispatcher_config.clone();
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            process_loop(store, forge, sheet, identity, config, dispatcher_config, cancel).await;
        });
        self.task_handle = Some(handle);
        info!("outbox dispatcher started");
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.cancellation.cancel();
        if let Some(handle) = self.task_handle.take() {
            if let Err(err) = handle.await {
                warn!(%err, "dispatcher task panicked");
            }
        }
        info!("outbox dispatcher stopped");
    }
}

impl Drop for OutboxDispatcher {
    fn drop(&mut self) {
        if self.is_running() {
            self.cancellation.cancel();
        }
    }
}

async fn process_loop(
    store: Arc<dyn Store>,
    forge: Arc<dyn ForgeGateway>,
    sheet: Arc<dyn SheetGateway>,
    identity: Arc<dyn IdentityResolver>,
    config: Config,
    dispatcher_config: DispatcherConfig,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("dispatcher loop cancelled");
                break;
            }
            _ = tokio::time::sleep(dispatcher_config.poll_interval) => {
                if let Err(err) = store
                    .outbox()
                    .reclaim_stale(Utc::now(), dispatcher_config.reclaim_threshold)
                    .await
                {
                    error!(%err, "failed to reclaim stale outbox events");
                }

                if let Err(err) = process_batch(
                    &store, &forge, &sheet, &identity, &config, &dispatcher_config, &cancel,
                )
                .await
                {
                    error!(%err, "outbox batch processing failed");
                }
            }
        }
    }
}

async fn process_batch(
    store: &Arc<dyn Store>,
    forge: &Arc<dyn ForgeGateway>,
    sheet: &Arc<dyn SheetGateway>,
    identity: &Arc<dyn IdentityResolver>,
    config: &Config,
    dispatcher_config: &DispatcherConfig,
    cancel: &CancellationToken,
) -> forgesheet_domain::Result<()> {
    let events = store.outbox().claim(Utc::now(), dispatcher_config.batch_size).await?;
    if events.is_empty() {
        return Ok(());
    }
    info!(count = events.len(), "claimed outbox events");

    let semaphore = Arc::new(tokio::sync::Semaphore::new(dispatcher_config.workers.max(1)));
    let mut handles = Vec::with_capacity(events.len());

    for event in events {
        let permit = Arc::clone(&semaphore).acquire_owned().await;
        let store = Arc::clone(store);
        let forge = Arc::clone(forge);
        let sheet = Arc::clone(sheet);
        let identity = Arc::clone(identity);
        let config = config.clone();
        let backoff = dispatcher_config.clone();
        let cancel = cancel.clone();

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            process_one(&store, &forge, &sheet, &identity, &config, &backoff, &cancel, event).await
        }));
    }

    for handle in handles {
        if let Err(err) = handle.await {
            error!(%err, "outbox worker task panicked");
        }
    }
    Ok(())
}

async fn process_one(
    store: &Arc<dyn Store>,
    forge: &Arc<dyn ForgeGateway>,
    sheet: &Arc<dyn SheetGateway>,
    identity: &Arc<dyn IdentityResolver>,
    config: &Config,
    dispatcher_config: &DispatcherConfig,
    cancel: &CancellationToken,
    event: forgesheet_domain::OutboxEvent,
) {
    let outcome = dispatch_event(
        &event,
        store.as_ref(),
        forge.as_ref(),
        sheet.as_ref(),
        identity.as_ref(),
        config,
        cancel,
    )
    .await;

    let result = match outcome {
        // `dispatch_event`'s handlers already commit their own `mark_sent`
        // as part of whatever transaction produced the `Sent` outcome.
        DispatchOutcome::Sent => Ok(()),
        DispatchOutcome::Transient(reason) => {
            let next_attempt = event.attempts + 1;
            if next_attempt >= event.max_attempts {
                handle_dead(store, &event, &reason).await
            } else {
                let delay = Jitter::Full.apply(
                    BackoffStrategy::Exponential {
                        initial_delay: dispatcher_config.backoff_base,
                        base: 2.0,
                        max_delay: dispatcher_config.backoff_cap,
                    }
                    .calculate_delay(next_attempt),
                    next_attempt,
                );
                let next_not_before = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(1));
                store.outbox().mark_failed(event.event_id, &reason, next_not_before).await
            }
        }
        DispatchOutcome::Dead(reason) => handle_dead(store, &event, &reason).await,
    };

    if let Err(err) = result {
        error!(event_id = %event.event_id, %err, "failed to commit outbox event outcome");
    }
}

async fn handle_dead(
    store: &Arc<dyn Store>,
    event: &forgesheet_domain::OutboxEvent,
    reason: &str,
) -> forgesheet_domain::Result<()> {
    let event_id = event.event_id;
    let reason = reason.to_string();

    let Some(task_id) = event.kind.task_id() else {
        return store.outbox().mark_dead(event_id, &reason).await;
    };

    let mapping = store.mappings().get_by_task(task_id).await?;
    let task = store.tasks().get(task_id).await?;
    let notify_event = task.as_ref().map(|task| {
        forgesheet_domain::OutboxEvent::new(
            forgesheet_domain::OutboxEventKind::NotifyMember(forgesheet_domain::NotifyMemberPayload {
                member_id: task.assignee_member_id,
                message: format!("task {task_id} failed to sync: {reason}"),
            }),
            5,
        )
    });

    store
        .transaction(Box::new(move |tx| {
            tx.outbox().mark_dead(event_id, &reason)?;
            if let Some(mut mapping) = mapping {
                mapping.sync_status = forgesheet_domain::SyncStatus::Error;
                mapping.updated_at = Utc::now();
                tx.mappings().update(&mapping)?;
            }
            if let Some(notify_event) = &notify_event {
                tx.outbox().enqueue(notify_event)?;
            }
            Ok(())
        }))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{open_pool, SqliteStore};
    use forgesheet_domain::{
        OutboxEvent, OutboxEventKind, OutboxStatus, Task, TaskPriority, TaskSource, TaskStatus,
    };

    fn test_config() -> Config {
        use forgesheet_domain::{DatabaseConfig, ForgeConfig, SheetAuthMode, SheetConfig, SheetFieldNames, SyncConfig};
        Config {
            forge: ForgeConfig {
                token: "tok".to_string(),
                base_url: "https://api.github.test".to_string(),
                owner: "acme".to_string(),
                repo: "acme/widgets".to_string(),
                api_version: "2022-11-28".to_string(),
                request_timeout: Duration::from_secs(5),
            },
            sheet: SheetConfig {
                app_token: "app".to_string(),
                oauth_mode: SheetAuthMode::TenantAppToken,
                default_app_token: None,
                default_table_id: None,
                field_names: SheetFieldNames::default(),
                rpc_command: "sheet-bridge".to_string(),
                rpc_args: Vec::new(),
                request_timeout: Duration::from_secs(5),
            },
            database: DatabaseConfig { path: ":memory:".to_string(), pool_size: 4 },
            sync: SyncConfig::default(),
        }
    }

    #[tokio::test]
    async fn dead_lettering_marks_mapping_error_and_notifies() {
        let dir = tempfile::TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("d.db"), 4).unwrap();
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));

        let now = chrono::Utc::now();
        let task = Task {
            task_id: uuid::Uuid::new_v4(),
            title: "t".to_string(),
            body: String::new(),
            status: TaskStatus::ToDo,
            priority: TaskPriority::Medium,
            source: TaskSource::Intent,
            assignee_member_id: None,
            labels: Default::default(),
            target_table: None,
            created_at: now,
            updated_at: now,
        };
        store.tasks().create(&task).await.unwrap();
        let mapping = forgesheet_domain::Mapping::new(task.task_id);
        store.mappings().create(&mapping).await.unwrap();

        let event = OutboxEvent::new(
            OutboxEventKind::ForgeCreateIssue(forgesheet_domain::ForgeCreateIssuePayload {
                task_id: task.task_id,
            }),
            5,
        );
        handle_dead(&store, &event, "boom").await.unwrap();

        let updated = store.mappings().get_by_task(task.task_id).await.unwrap().unwrap();
        assert_eq!(updated.sync_status, forgesheet_domain::SyncStatus::Error);

        let dead_events = store.outbox().list_by_status(OutboxStatus::Dead).await.unwrap();
        assert_eq!(dead_events.len(), 1);
        let pending = store.outbox().list_by_status(OutboxStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(matches!(pending[0].kind, OutboxEventKind::NotifyMember(_)));
    }
}
