use hot_calls_poller_lib::{
    cli::parse_args,
    config::Config,
    db::{build_db_pool, run_migrations, PgStore},
    logging::{format_error_report, init_logging},
    poller::{Pipeline, Windows},
    reporter::{notifier, ErrorLog, ErrorReporter},
    scheduler::Scheduler,
    server::{
        monitoring::{register_build_info_metric, PollerMetrics, METRICS_PREFIX},
        setup_server,
    },
    state::AppState,
};
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Gracefully shuts down the application when a SIGTERM or SIGINT signal is received.
async fn handle_shutdown_signals(state: Arc<AppState>) {
    let mut sigterm =
        signal(SignalKind::terminate()).expect("Failed to register SIGTERM signal handler");
    let mut sigint =
        signal(SignalKind::interrupt()).expect("Failed to register SIGINT signal handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down.");
        }
        _ = sigint.recv() => {
            info!("SIGINT received, shutting down.");
        }
    }

    state.shutdown_token.cancel();
}

/// Cancels `token` when the operator enters a line. Reads on a plain thread
/// so a pending read never holds up runtime shutdown.
fn spawn_operator_console(token: CancellationToken) {
    println!("Press the enter key to exit");
    std::thread::spawn(move || {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(read) if read > 0 => {
                info!("Exit requested from the console");
                token.cancel();
            }
            // Detached from a terminal: only signals stop the poller.
            _ => debug!("stdin closed, waiting for a shutdown signal"),
        }
    });
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = Config::from_env().expect("Config incorrectly specified");
    let args = parse_args();
    let mode = if args.once { "once" } else { "scheduled" };
    init_logging("hot_calls_poller", mode, "info");
    debug!("Config loaded");

    let poll_interval = args
        .interval_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(config.poll_interval);

    if args.skip_migrations {
        info!("Skipping migrations");
    } else {
        match run_migrations(&config.db_url).await {
            Ok(applied) => info!(applied, "Migrations up to date"),
            Err(err) => {
                error!("{}", format_error_report(&err));
                std::process::exit(1);
            }
        }
    }

    let pool = build_db_pool(&config.db_url, config.db_pool_size)
        .await
        .expect("Could not initialize DB pool!");

    let state = Arc::new(AppState::new(CancellationToken::new()));
    let metrics = {
        let mut registry = state.registry.write().await;
        register_build_info_metric(&mut registry, METRICS_PREFIX);
        PollerMetrics::register(&mut registry, METRICS_PREFIX)
    };

    let notifier = notifier::from_config(&config.alerts).expect("Alert settings incorrectly specified");
    let reporter = Arc::new(ErrorReporter::new(
        notifier,
        ErrorLog::new(config.error_log_path.clone()),
    ));
    let pipeline = Pipeline::new(Arc::new(PgStore::new(pool)), reporter, Windows::default())
        .with_metrics(metrics);
    let scheduler = Scheduler::new(Arc::new(pipeline), poll_interval);

    if args.once {
        if let Some(report) = scheduler.run_once().await {
            info!(failures = report.failures(), "Single cycle finished");
        }
        return;
    }

    let server_handle = match config.metrics_addr {
        Some(addr) => Some(
            setup_server(state.clone(), addr)
                .await
                .expect("Could not bind metrics server"),
        ),
        None => None,
    };
    let shutdown_handle = tokio::spawn(handle_shutdown_signals(state.clone()));
    spawn_operator_console(state.shutdown_token.clone());

    scheduler.run(state.shutdown_token.clone()).await;

    shutdown_handle.abort();
    if let Some(handle) = server_handle {
        let _ = handle.await;
    }
    info!("Poller stopped");
}
