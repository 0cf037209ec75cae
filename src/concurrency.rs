//! Process launcher.
//!
//! Serving is either a single process, or a supervisor that forks N worker
//! processes which each bind their own listener on the same port. The topology
//! is fixed at launch; a dead worker is not replaced.

use crate::http::listener::Listener;
use crate::http::server::HttpServer;
use anyhow::{Context, bail};
use std::env;
use std::ffi::OsString;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::mpsc;
use std::thread;

/// Set on forked workers to the worker's 1-based index.
pub const WORKER_ID_ENV: &str = "SCAFFOLD_HTTP_WORKER_ID";

pub const DEFAULT_PORT: u16 = 8080;

pub type OnListening = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    pub port: u16,
    pub thread_count: usize,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        LaunchOptions {
            port: DEFAULT_PORT,
            thread_count: cpu_count(),
        }
    }
}

pub fn cpu_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// One process, listener bound in place.
    SingleProcess,
    /// Forks `workers` processes and binds nothing itself.
    Supervisor { workers: usize },
    /// A forked process serving on the shared port.
    Worker,
}

impl Topology {
    pub fn select(thread_count: usize, is_primary: bool) -> Topology {
        if thread_count == 1 {
            Topology::SingleProcess
        } else if is_primary {
            Topology::Supervisor {
                workers: thread_count,
            }
        } else {
            Topology::Worker
        }
    }
}

/// Binds a listener on a port and serves it.
pub trait Transport {
    /// Runs `on_listening` once bound, then serves until the transport stops.
    fn listen(&self, listener: Listener, port: u16, on_listening: OnListening)
    -> anyhow::Result<()>;
}

/// Creates and tracks worker processes.
pub trait Supervisor {
    type Group;

    fn is_primary(&self) -> bool;

    fn fork(&mut self) -> anyhow::Result<()>;

    /// Hands over the forked workers.
    fn into_group(self) -> Self::Group;

    /// Stops every worker forked so far and waits for it to exit.
    fn shutdown(self);
}

/// Launches with the TCP transport and OS processes, logging worker exits.
pub fn listen_http(listener: Listener, options: LaunchOptions) -> anyhow::Result<()> {
    listen_with(
        listener,
        options,
        &TcpTransport::default(),
        ProcessSupervisor::from_env()?,
        log_worker_exits,
        Box::new(quiet_listening),
    )
}

pub fn listen_with<T, S, F>(
    listener: Listener,
    options: LaunchOptions,
    transport: &T,
    mut supervisor: S,
    on_fork: F,
    on_listening: OnListening,
) -> anyhow::Result<()>
where
    T: Transport,
    S: Supervisor,
    F: FnOnce(S::Group) -> anyhow::Result<()>,
{
    if options.thread_count == 0 {
        bail!("thread count must be at least 1");
    }

    match Topology::select(options.thread_count, supervisor.is_primary()) {
        Topology::SingleProcess | Topology::Worker => {
            transport.listen(listener, options.port, on_listening)
        }
        Topology::Supervisor { workers } => {
            for _ in 0..workers {
                if let Err(e) = supervisor.fork() {
                    supervisor.shutdown();
                    return Err(e);
                }
            }
            on_fork(supervisor.into_group())
        }
    }
}

/// Default fork callback: blocks until every worker is gone, logging each death.
pub fn log_worker_exits(group: ProcessGroup) -> anyhow::Result<()> {
    group.on_exit(|exit| {
        tracing::info!(worker = exit.id, status = ?exit.status, "worker {} died", exit.pid);
    });
    Ok(())
}

/// Default listening callback. Emits nothing, in single-process mode and in workers alike.
pub fn quiet_listening() {}

/// Serves each process on its own current-thread runtime.
#[derive(Debug, Clone, Copy)]
pub struct TcpTransport {
    pub host: IpAddr,
}

impl Default for TcpTransport {
    fn default() -> Self {
        TcpTransport {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl Transport for TcpTransport {
    fn listen(
        &self,
        listener: Listener,
        port: u16,
        on_listening: OnListening,
    ) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build runtime")?;

        let addr = SocketAddr::new(self.host, port);
        runtime.block_on(async move {
            let server = HttpServer::bind(addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;
            on_listening();
            server.serve(listener).await.context("server stopped")
        })
    }
}

/// Forks by re-executing the current binary with the same arguments.
pub struct ProcessSupervisor {
    worker_id: Option<usize>,
    program: PathBuf,
    args: Vec<OsString>,
    workers: Vec<(usize, Child)>,
}

impl ProcessSupervisor {
    pub fn from_env() -> anyhow::Result<ProcessSupervisor> {
        Ok(ProcessSupervisor {
            worker_id: worker_id(),
            program: env::current_exe().context("cannot locate current executable")?,
            args: env::args_os().skip(1).collect(),
            workers: Vec::new(),
        })
    }

    pub fn with_command(program: impl Into<PathBuf>, args: Vec<OsString>) -> ProcessSupervisor {
        ProcessSupervisor {
            worker_id: None,
            program: program.into(),
            args,
            workers: Vec::new(),
        }
    }
}

/// This process's worker index, or `None` in the primary.
pub fn worker_id() -> Option<usize> {
    env::var(WORKER_ID_ENV).ok().and_then(|v| v.parse().ok())
}

impl Supervisor for ProcessSupervisor {
    type Group = ProcessGroup;

    fn is_primary(&self) -> bool {
        self.worker_id.is_none()
    }

    fn fork(&mut self) -> anyhow::Result<()> {
        let id = self.workers.len() + 1;
        let child = Command::new(&self.program)
            .args(&self.args)
            .env(WORKER_ID_ENV, id.to_string())
            .spawn()
            .with_context(|| format!("failed to fork worker {}", id))?;

        tracing::info!(worker = id, pid = child.id(), "forked worker");
        self.workers.push((id, child));
        Ok(())
    }

    fn into_group(self) -> ProcessGroup {
        ProcessGroup {
            workers: self.workers,
        }
    }

    fn shutdown(self) {
        for exit in self.into_group().shutdown() {
            tracing::warn!(
                worker = exit.id,
                pid = exit.pid,
                status = ?exit.status,
                "stopped worker after failed launch"
            );
        }
    }
}

#[derive(Debug)]
pub struct WorkerExit {
    pub id: usize,
    pub pid: u32,
    pub status: io::Result<ExitStatus>,
}

/// The forked workers of a supervisor.
pub struct ProcessGroup {
    workers: Vec<(usize, Child)>,
}

impl ProcessGroup {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn pids(&self) -> Vec<u32> {
        self.workers.iter().map(|(_, child)| child.id()).collect()
    }

    /// Kills every worker and reaps it.
    pub fn shutdown(self) -> Vec<WorkerExit> {
        self.workers
            .into_iter()
            .map(|(id, mut child)| {
                let pid = child.id();
                if let Err(e) = child.kill() {
                    tracing::debug!(worker = id, pid, error = %e, "kill failed");
                }
                WorkerExit {
                    id,
                    pid,
                    status: child.wait(),
                }
            })
            .collect()
    }

    /// Blocks until every worker has exited, calling `on_exit` once per worker
    /// in the order they exit.
    pub fn on_exit(self, mut on_exit: impl FnMut(WorkerExit)) {
        let (sender, receiver) = mpsc::channel();

        let waiters: Vec<thread::JoinHandle<()>> = self
            .workers
            .into_iter()
            .map(|(id, mut child)| {
                let sender = sender.clone();
                thread::spawn(move || {
                    let pid = child.id();
                    let status = child.wait();
                    let _ = sender.send(WorkerExit { id, pid, status });
                })
            })
            .collect();
        drop(sender);

        for exit in receiver {
            on_exit(exit);
        }

        for waiter in waiters {
            let _ = waiter.join();
        }
    }
}
