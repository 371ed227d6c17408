use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use flowrepo_catalog::HttpOperatorCatalog;
use flowrepo_core::{FlowStore, OperatorCatalog, PermissionGateway};
use flowrepo_permissions::HttpPermissionGateway;
use flowrepo_service::{api, bootstrap, telemetry, Reconciler, ServiceConfig, ServiceInfo, VERSION};
use flowrepo_store::{InMemoryFlowStore, JsonFileFlowStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

const SERVICE_NAME: &str = "flowrepo";

struct Collaborators {
    store: Arc<dyn FlowStore>,
    gateway: Arc<dyn PermissionGateway>,
    catalog: Arc<dyn OperatorCatalog>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new(SERVICE_NAME)
        .version(VERSION)
        .about("Access-controlled repository of analytics flows")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON config file applied over the defaults"),
        )
        .subcommand(Command::new("serve").about("Reconcile permissions, then serve HTTP (default)"))
        .subcommand(
            Command::new("reconcile")
                .about("Reconcile flow permission records once and exit")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(Command::new("check-config").about("Print the effective configuration"));

    let matches = cli.get_matches();
    let config = ServiceConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("loading configuration")?;

    match matches.subcommand() {
        Some(("check-config", _)) => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            Ok(())
        }
        Some(("reconcile", args)) => {
            telemetry::init(&config.logger)?;
            let parts = collaborators(&config).await?;
            let report = Reconciler::new(parts.store, parts.gateway)
                .run()
                .await
                .context("reconciliation failed")?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
            Ok(())
        }
        _ => serve(config).await,
    }
}

async fn collaborators(config: &ServiceConfig) -> anyhow::Result<Collaborators> {
    let store: Arc<dyn FlowStore> = match &config.store_path {
        Some(path) => Arc::new(
            JsonFileFlowStore::open(path)
                .await
                .with_context(|| format!("opening flow store {}", path.display()))?,
        ),
        None => {
            tracing::warn!("no store path configured, flows are kept in memory only");
            Arc::new(InMemoryFlowStore::new())
        }
    };

    let gateway = HttpPermissionGateway::new(&config.permissions_v2_url, config.http_timeout)?
        .with_admin_token(config.internal_admin_token.clone());
    let catalog = HttpOperatorCatalog::new(&config.operator_repo_url, config.http_timeout)?;

    Ok(Collaborators {
        store,
        gateway: Arc::new(gateway),
        catalog: Arc::new(catalog),
    })
}

async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    telemetry::init(&config.logger)?;
    let info = ServiceInfo::new(SERVICE_NAME, VERSION);
    tracing::info!(name = info.name(), version = info.version(), "starting");
    tracing::debug!(config = ?config.redacted(), "effective configuration");

    let parts = collaborators(&config).await?;
    let (repository, _) = bootstrap(parts.store, parts.gateway, parts.catalog, info)
        .await
        .context("startup reconciliation failed")?;

    let routes = api::routes(repository, &config.prefix_segments());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%bound, prefix = %config.url_prefix, "listening");
    server.await;
    tracing::info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
