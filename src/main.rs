use std::sync::Arc;

use dotenvy::dotenv;
use smpp_gateway::config::AppConfig;
use smpp_gateway::master::{self, Master};
use smpp_gateway::provider::LoggingProvider;
use smpp_gateway::worker::{bind_unix_socket, Worker};
use tokio::net::TcpListener;
use tracing::{error, info};

enum Role {
    Master,
    Worker(usize),
}

fn parse_role() -> Role {
    let args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().position(|a| a == "--worker") {
        if let Some(idx) = args.get(pos + 1).and_then(|s| s.parse::<usize>().ok()) {
            return Role::Worker(idx);
        }
    }
    Role::Master
}

fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt().with_env_filter(config.log.level.clone()).init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match parse_role() {
        Role::Master => runtime.block_on(run_master(config)),
        Role::Worker(index) => runtime.block_on(run_worker(config, index)),
    }
}

async fn run_master(config: AppConfig) -> std::io::Result<()> {
    info!("starting master");
    let mut master = Master::new(config);
    master.spawn_workers()?;

    tokio::select! {
        result = master.run() => {
            if let Err(e) = result {
                error!(error = %e, "master accept loop exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    master.terminate();
    Ok(())
}

async fn run_worker(config: AppConfig, index: usize) -> std::io::Result<()> {
    info!(worker = index, "starting worker");

    let accounts = config
        .accounts
        .iter()
        .map(|a| (a.system_id.clone(), a.password.clone()))
        .collect();
    let provider = Arc::new(LoggingProvider::new(config.provider.log_path.clone(), accounts));
    let worker = Arc::new(Worker::new(provider));

    let socket_path = master::resolve_socket_path(
        &config.server.worker_socket_template,
        config.server.port,
        index,
    );
    let listener = bind_unix_socket(&socket_path)?;

    let bus_port = config.server.incoming_messages_queue_base_port + index as u16;
    let bus_listener = TcpListener::bind(("127.0.0.1", bus_port)).await?;
    let subscriber_addrs = master::all_bus_addrs(
        config.server.incoming_messages_queue_base_port,
        config.server.workers_count,
    );

    let mut run = tokio::spawn(worker.clone().run(listener, bus_listener, subscriber_addrs));

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!(worker = index, "received shutdown signal"),
        _ = sigterm.recv() => info!(worker = index, "received termination signal"),
        result = &mut run => return result.expect("worker task panicked"),
    }

    #[cfg(not(unix))]
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!(worker = index, "received shutdown signal"),
        result = &mut run => return result.expect("worker task panicked"),
    }

    worker.request_shutdown();
    run.await.expect("worker task panicked")
}
