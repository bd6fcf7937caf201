//! `sync-cli` — the thin external-collaborator frontend. Wires
//! `Config::from_env`, the `forgesheet_infra` adapters, `IntentApi`, the
//! `OutboxDispatcher`, and the two `Reconciler`s into one process.
//! Subcommands mirror the Intent API; `serve` runs the background workers
//! until a shutdown signal. Never implements its own business rules.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use forgesheet_core::identity::IdentityResolver;
use forgesheet_core::store::Store;
use forgesheet_domain::{Config, ForgeIssueRef, SheetRecordRef, SyncError, SyncSource};
use forgesheet_infra::gateway::{ChildProcessTransport, JsonRpcSheetGateway, ReqwestForgeGateway};
use forgesheet_infra::{open_pool, CachingIdentityResolver, OutboxDispatcher, Reconciler, SqliteStore};
use forgesheet_api::intent::{CreateTaskInput, IntentApi, MemberIdentifier, MemberWork, TaskFilter, TaskPatch};
use tracing::{error, info};

use cli::{exit_code_for_error, parse_labels, Cli, Command, ConvertCommand};

struct App {
    config: Config,
    store: Arc<dyn Store>,
    forge: Arc<dyn forgesheet_core::gateway::ForgeGateway>,
    sheet: Arc<dyn forgesheet_core::gateway::SheetGateway>,
    identity: Arc<dyn IdentityResolver>,
}

impl App {
    fn bootstrap() -> Result<Self, SyncError> {
        let config = forgesheet_infra::load()?;

        let pool = open_pool(&config.database.path, config.database.pool_size)
            .map_err(|e| SyncError::Database(e.to_string()))?;
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));

        let forge: Arc<dyn forgesheet_core::gateway::ForgeGateway> = Arc::new(
            ReqwestForgeGateway::new(
                &config.forge.base_url,
                &config.forge.token,
                &config.forge.api_version,
                config.forge.request_timeout,
            )
            .map_err(SyncError::from)?,
        );

        let transport = ChildProcessTransport::spawn(
            &config.sheet.rpc_command,
            &config.sheet.rpc_args,
            config.sheet.request_timeout,
        )
        .map_err(SyncError::from)?;
        let sheet: Arc<dyn forgesheet_core::gateway::SheetGateway> = Arc::new(
            JsonRpcSheetGateway::new(transport, config.sheet.oauth_mode, config.sheet.app_token.clone()),
        );

        let identity: Arc<dyn IdentityResolver> =
            Arc::new(CachingIdentityResolver::new(Arc::clone(&store), Arc::clone(&sheet)));

        Ok(Self { config, store, forge, sheet, identity })
    }

    fn intent(&self) -> IntentApi {
        IntentApi::new(Arc::clone(&self.store))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let app = match App::bootstrap() {
        Ok(app) => app,
        Err(err) => {
            error!(%err, "startup failed");
            return ExitCode::from(exit_code_for_error(&err) as u8);
        }
    };

    match run(&app, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "command failed");
            ExitCode::from(exit_code_for_error(&err) as u8)
        }
    }
}

async fn run(app: &App, command: Command) -> Result<(), SyncError> {
    match command {
        Command::CreateTask { title, body, assignee_email, labels, target_app_token, target_table_id, also_convert } => {
            let target_table = match (target_app_token, target_table_id) {
                (Some(app_token), Some(table_id)) => Some((app_token, table_id)),
                _ => None,
            };
            let task_id = app
                .intent()
                .create_task(CreateTaskInput {
                    title,
                    body,
                    assignee_email,
                    labels: parse_labels(labels),
                    target_table,
                    also_convert,
                })
                .await?;
            println!("{task_id}");
            Ok(())
        }
        Command::UpdateTask { task_id, title, body, status, assignee_member_id, labels } => {
            let status = status.map(|s| s.parse().map_err(|_| SyncError::Validation(format!("invalid status {s}")))).transpose()?;
            app.intent()
                .update_task(
                    task_id,
                    TaskPatch {
                        title,
                        body,
                        status,
                        priority: None,
                        assignee_member_id: assignee_member_id.map(Some),
                        labels: labels.map(parse_labels),
                    },
                )
                .await
        }
        Command::CloseTask { task_id, reason } => app.intent().close_task(task_id, reason).await,
        Command::ListTasks { status, assignee_member_id } => {
            let status = status.map(|s| s.parse().map_err(|_| SyncError::Validation(format!("invalid status {s}")))).transpose()?;
            let tasks = app.intent().list_tasks(TaskFilter { status, assignee_member_id }).await?;
            for task in tasks {
                println!("{}\t{:?}\t{}", task.task_id, task.status, task.title);
            }
            Ok(())
        }
        Command::Convert(ConvertCommand::ForgeToSheet { repo, issue_number, app_token, table_id }) => {
            app.intent()
                .convert_forge_to_sheet(ForgeIssueRef { repo, number: issue_number }, (app_token, table_id))
                .await
        }
        Command::Convert(ConvertCommand::SheetToForge { app_token, table_id, record_id }) => {
            app.intent()
                .convert_sheet_to_forge(SheetRecordRef { app_token, table_id, record_id })
                .await
        }
        Command::MemberWork { email, member_id } => {
            let identifier = match (email, member_id) {
                (Some(email), _) => MemberIdentifier::Email(email),
                (None, Some(id)) => MemberIdentifier::Id(id),
                (None, None) => {
                    return Err(SyncError::Validation("one of --email or --member-id is required".to_string()))
                }
            };
            let MemberWork { member, tasks } = app.intent().get_member_work(identifier).await?;
            println!("{} <{}> — {} task(s)", member.email, member.member_id, tasks.len());
            for task in tasks {
                println!("  {}\t{:?}\t{}", task.task_id, task.status, task.title);
            }
            Ok(())
        }
        Command::Serve => serve(app).await,
    }
}

async fn serve(app: &App) -> Result<(), SyncError> {
    let mut dispatcher = OutboxDispatcher::new(
        Arc::clone(&app.store),
        Arc::clone(&app.forge),
        Arc::clone(&app.sheet),
        Arc::clone(&app.identity),
        app.config.clone(),
    );
    let mut forge_reconciler = Reconciler::new(
        SyncSource::Forge,
        Arc::clone(&app.store),
        Arc::clone(&app.forge),
        Arc::clone(&app.sheet),
        Arc::clone(&app.identity),
        app.config.clone(),
    );
    let mut sheet_reconciler = Reconciler::new(
        SyncSource::Sheet,
        Arc::clone(&app.store),
        Arc::clone(&app.forge),
        Arc::clone(&app.sheet),
        Arc::clone(&app.identity),
        app.config.clone(),
    );

    dispatcher.start();
    forge_reconciler.start();
    sheet_reconciler.start();
    info!("sync-cli serving; press ctrl-c to stop");

    tokio::signal::ctrl_c().await.map_err(|e| SyncError::Internal(e.to_string()))?;
    info!("shutdown signal received, draining");

    sheet_reconciler.stop().await;
    forge_reconciler.stop().await;
    dispatcher.stop().await;

    Ok(())
}

