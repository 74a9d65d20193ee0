//! Master: accepts the public TCP connections, round-robins each one to
//! a worker subprocess over that worker's local Unix-domain socket, and
//! splices bytes bidirectionally until either side closes. Intentionally
//! stateless with respect to SMPP (it never parses a PDU).
//!
//! Grounded on `examples/original_source/smpp/master.py`'s
//! `MasterServer`: worker subprocess fan-out, round-robin connection
//! affinity, bidirectional byte forwarding.

use std::path::PathBuf;
use std::process::Child;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpStream, UnixStream};
use tracing::{error, info, warn};

use crate::config::AppConfig;

pub struct Master {
    config: AppConfig,
    next_worker: AtomicUsize,
    workers: Vec<Child>,
}

impl Master {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            next_worker: AtomicUsize::new(0),
            workers: Vec::new(),
        }
    }

    pub fn socket_path_for_worker(&self, i: usize) -> PathBuf {
        resolve_socket_path(&self.config.server.worker_socket_template, self.config.server.port, i)
    }

    /// Re-execs the current binary once per configured worker, passing
    /// `--worker <index>` so `main` knows which role to run.
    pub fn spawn_workers(&mut self) -> std::io::Result<()> {
        let exe = std::env::current_exe()?;
        for i in 0..self.config.server.workers_count {
            info!(worker = i, socket = %self.socket_path_for_worker(i).display(), "spawning worker");
            let child = std::process::Command::new(&exe)
                .arg("--worker")
                .arg(i.to_string())
                .spawn()?;
            self.workers.push(child);
        }
        Ok(())
    }

    fn next_worker_index(&self) -> usize {
        let n = self.config.server.workers_count;
        self.next_worker.fetch_add(1, Ordering::Relaxed) % n
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind((self.config.server.host.as_str(), self.config.server.port)).await?;
        info!(host = %self.config.server.host, port = self.config.server.port, "master listening");

        loop {
            let (client, peer) = listener.accept().await?;
            let worker_index = self.next_worker_index();
            let socket_path = self.socket_path_for_worker(worker_index);
            info!(%peer, worker = worker_index, "forwarding connection to worker");
            tokio::spawn(async move {
                if let Err(e) = relay(client, &socket_path).await {
                    warn!(%peer, error = %e, "connection relay ended with an error");
                }
            });
        }
    }

    /// Terminates every worker subprocess: sends SIGTERM first (per
    /// `examples/original_source/smpp/master.py`'s `MasterServer.terminate`,
    /// which calls `Process.terminate()`) so each worker's own shutdown
    /// path runs, then gives it a grace period to exit before falling back
    /// to SIGKILL.
    pub fn terminate(&mut self) {
        const GRACE_PERIOD: Duration = Duration::from_secs(2);
        const POLL_INTERVAL: Duration = Duration::from_millis(50);

        for child in &mut self.workers {
            let pid = child.id();
            let sent = std::process::Command::new("kill")
                .arg("-TERM")
                .arg(pid.to_string())
                .status();
            if let Err(e) = sent {
                error!(pid, error = %e, "failed to send SIGTERM to worker process");
            }
        }

        let deadline = Instant::now() + GRACE_PERIOD;
        for child in &mut self.workers {
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if Instant::now() < deadline => std::thread::sleep(POLL_INTERVAL),
                    Ok(None) => {
                        warn!(pid = child.id(), "worker did not exit after SIGTERM, sending SIGKILL");
                        if let Err(e) = child.kill() {
                            error!(error = %e, "failed to kill worker process");
                        }
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to poll worker process exit status");
                        break;
                    }
                }
            }
        }
    }
}

async fn relay(mut client: TcpStream, socket_path: &std::path::Path) -> std::io::Result<()> {
    let mut worker = UnixStream::connect(socket_path).await?;
    tokio::io::copy_bidirectional(&mut client, &mut worker).await?;
    Ok(())
}

/// Expands a worker socket path template (`{port}`, `{i}`) the same way
/// for the Master (to dial a worker) and for a worker process itself (to
/// bind the socket it names).
pub fn resolve_socket_path(template: &str, port: u16, i: usize) -> PathBuf {
    PathBuf::from(
        template
            .replace("{port}", &port.to_string())
            .replace("{i}", &i.to_string()),
    )
}

/// Every bus publisher address a worker should subscribe to, per
/// spec.md §6: worker `i` publishes on `base + i`; every worker
/// subscribes to all of `[base, base + workers_count)`.
pub fn all_bus_addrs(base_port: u16, workers_count: usize) -> Vec<String> {
    (0..workers_count)
        .map(|i| format!("127.0.0.1:{}", base_port + i as u16))
        .collect()
}
