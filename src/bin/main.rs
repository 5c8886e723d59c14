use st_daemon::config::CONFIG;
use st_daemon::data::DataClient;
use st_daemon::gateway::ApiGateway;
use st_daemon::mediator::Mediator;
use st_daemon::players::PlayerRegistry;
use st_daemon::rpc::RpcServer;
use st_daemon::supervisor::{ContainerRegistry, Supervisor};
use st_daemon::universe::Universe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting operations daemon");
    info!("Remote API base url: {}", CONFIG.api_base_url);

    let db = match DataClient::new().await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    let players = match PlayerRegistry::load(&db).await {
        Ok(players) => Arc::new(players),
        Err(e) => {
            error!("Failed to load players: {}", e);
            std::process::exit(1);
        }
    };

    let gateway = Arc::new(ApiGateway::new());
    let universe = Universe::new(&gateway, Some(db.clone()));
    let root_cancel = CancellationToken::new();
    let registry = Arc::new(ContainerRegistry::new(Arc::new(db), root_cancel.clone()));
    let supervisor = Supervisor::new(universe.clone(), players.clone(), registry);
    let mediator = Arc::new(Mediator::new(universe));
    let server = RpcServer::new(supervisor.clone(), mediator, players, root_cancel.clone());

    let socket_path = CONFIG.socket_path.clone();
    let serve_task = {
        let socket_path = socket_path.clone();
        tokio::spawn(async move { server.serve(&socket_path).await })
    };

    wait_for_shutdown_signal().await;
    info!("Shutdown signal received");

    // stop accepting, signal every container, drain within the grace period
    root_cancel.cancel();
    supervisor.shutdown(SHUTDOWN_GRACE).await;
    if let Ok(Err(e)) = serve_task.await {
        error!("RPC frontend exited with error: {}", e);
    }
    let _ = std::fs::remove_file(&socket_path);
    info!("Daemon stopped");
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = sigterm.recv() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("failed to listen for ctrl-c: {}", e);
            }
        }
    }
}
