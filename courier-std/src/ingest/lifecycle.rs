//! Actor-style lifecycle controller.
//!
//! A [`Controller`] owns at most one running job of an [`Ingestion`] mode.
//! Start, stop, close and status requests travel over a single-consumer
//! command queue and are handled strictly in order by one task, which is the
//! only place the running job is ever touched.

use courier_core::{BoxError, LifecycleError};
use std::{fmt, future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const COMMAND_CAPACITY: usize = 16;

/// An ingestion mode a [`Controller`] can run.
pub trait Ingestion: Send + Sync + 'static {
    /// Start parameters.
    type Params: Send + 'static;

    /// Mode name used in logs and conflict reports.
    const MODE: &'static str;

    /// How long a stopping job may take before it is aborted.
    fn stop_grace(params: &Self::Params) -> Duration;

    /// Run one job until `cancel` fires.
    ///
    /// `ready` is signalled once the job is fully up. Dropping it without
    /// sending tells waiting callers the job exited before it got there.
    fn run(
        self: Arc<Self>,
        params: Self::Params,
        cancel: CancellationToken,
        ready: oneshot::Sender<()>,
    ) -> impl Future<Output = Result<(), BoxError>> + Send + 'static;

    /// Called by the controller once a job is gone, including jobs that were
    /// aborted after their grace period.
    fn job_ended(&self) {}
}

/// Identity of one job instance. Increases with every accepted start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    /// No job is running.
    Idle,
    /// The given job is running.
    Running(JobId),
    /// The controller was closed and accepts no more commands.
    Closed,
}

impl ControllerStatus {
    /// Whether a job is running.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running(_))
    }
}

enum Command<P> {
    Start {
        params: P,
        accepted: oneshot::Sender<Result<JobId, LifecycleError>>,
        ready: oneshot::Sender<()>,
    },
    Stop {
        accepted: oneshot::Sender<Result<(), LifecycleError>>,
        done: oneshot::Sender<()>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<ControllerStatus>,
    },
}

struct Job {
    id: JobId,
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), BoxError>>,
    grace: Duration,
}

enum Event<P> {
    Command(Option<Command<P>>),
    Exited(Result<Result<(), BoxError>, tokio::task::JoinError>),
}

struct Actor<I: Ingestion> {
    ingestion: Arc<I>,
    root: CancellationToken,
    commands: mpsc::Receiver<Command<I::Params>>,
    running: Option<Job>,
    next_id: u64,
}

impl<I: Ingestion> Actor<I> {
    async fn run(mut self) {
        loop {
            let event = match &mut self.running {
                Some(job) => tokio::select! {
                    command = self.commands.recv() => Event::Command(command),
                    exited = &mut job.handle => Event::Exited(exited),
                },
                None => Event::Command(self.commands.recv().await),
            };

            match event {
                Event::Command(Some(command)) => {
                    if self.handle(command).await {
                        break;
                    }
                }
                // Every handle was dropped without closing.
                Event::Command(None) => {
                    self.stop_job().await;
                    break;
                }
                Event::Exited(exited) => self.job_exited(exited),
            }
        }
        self.root.cancel();
    }

    /// Returns `true` once the controller is closed.
    async fn handle(&mut self, command: Command<I::Params>) -> bool {
        match command {
            Command::Start {
                params,
                accepted,
                ready,
            } => {
                if let Some(job) = &self.running {
                    // The waiting caller sees the rejection, not a dropped `ready`.
                    let _ = accepted.send(Err(LifecycleError::AlreadyStarted));
                    info!(mode = I::MODE, job = %job.id, "start ignored, already running");
                    return false;
                }
                self.next_id += 1;
                let id = JobId(self.next_id);
                let cancel = self.root.child_token();
                let grace = I::stop_grace(&params);
                let future = Arc::clone(&self.ingestion).run(params, cancel.clone(), ready);
                let handle = tokio::spawn(future);
                self.running = Some(Job {
                    id,
                    cancel,
                    handle,
                    grace,
                });
                info!(mode = I::MODE, job = %id, "started");
                let _ = accepted.send(Ok(id));
                false
            }
            Command::Stop { accepted, done } => {
                if self.running.is_none() {
                    let _ = accepted.send(Err(LifecycleError::AlreadyStopped));
                    return false;
                }
                let _ = accepted.send(Ok(()));
                self.stop_job().await;
                let _ = done.send(());
                false
            }
            Command::Close { done } => {
                self.stop_job().await;
                self.commands.close();
                info!(mode = I::MODE, "controller closed");
                let _ = done.send(());
                true
            }
            Command::Status { reply } => {
                let status = match &self.running {
                    Some(job) => ControllerStatus::Running(job.id),
                    None => ControllerStatus::Idle,
                };
                let _ = reply.send(status);
                false
            }
        }
    }

    async fn stop_job(&mut self) {
        let Some(mut job) = self.running.take() else {
            return;
        };
        job.cancel.cancel();
        match tokio::time::timeout(job.grace, &mut job.handle).await {
            Ok(Ok(Ok(()))) => info!(mode = I::MODE, job = %job.id, "stopped"),
            Ok(Ok(Err(err))) => {
                warn!(mode = I::MODE, job = %job.id, error = %err, "job ended with error")
            }
            Ok(Err(err)) => error!(mode = I::MODE, job = %job.id, error = %err, "job panicked"),
            Err(_) => {
                warn!(
                    mode = I::MODE,
                    job = %job.id,
                    grace_ms = job.grace.as_millis() as u64,
                    "job did not stop within grace period, aborting"
                );
                job.handle.abort();
            }
        }
        self.ingestion.job_ended();
    }

    fn job_exited(&mut self, exited: Result<Result<(), BoxError>, tokio::task::JoinError>) {
        let Some(job) = self.running.take() else {
            return;
        };
        match exited {
            Ok(Ok(())) => info!(mode = I::MODE, job = %job.id, "job finished"),
            Ok(Err(err)) => {
                error!(mode = I::MODE, job = %job.id, error = %err, "job failed")
            }
            Err(err) => error!(mode = I::MODE, job = %job.id, error = %err, "job panicked"),
        }
        self.ingestion.job_ended();
    }
}

/// Handle to a lifecycle controller. Cheap to clone.
pub struct Controller<I: Ingestion> {
    commands: mpsc::Sender<Command<I::Params>>,
}

impl<I: Ingestion> Clone for Controller<I> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<I: Ingestion> fmt::Debug for Controller<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("mode", &I::MODE)
            .finish_non_exhaustive()
    }
}

impl<I: Ingestion> Controller<I> {
    /// Spawn the controller task. Must be called inside a runtime.
    pub fn spawn(ingestion: Arc<I>) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let actor = Actor {
            ingestion,
            root: CancellationToken::new(),
            commands: receiver,
            running: None,
            next_id: 0,
        };
        tokio::spawn(actor.run());
        Self { commands }
    }

    /// Start a job.
    ///
    /// With `wait` the call returns once the job signalled it is up, or
    /// [`LifecycleError::ExitedEarly`] if it ended first. Without `wait` it
    /// returns as soon as the start was accepted.
    pub async fn start(&self, params: I::Params, wait: bool) -> Result<JobId, LifecycleError> {
        let (accepted, accepted_rx) = oneshot::channel();
        let (ready, ready_rx) = oneshot::channel();
        self.send(Command::Start {
            params,
            accepted,
            ready,
        })
        .await?;

        let id = accepted_rx.await.map_err(|_| LifecycleError::Closed)??;
        if wait {
            ready_rx.await.map_err(|_| LifecycleError::ExitedEarly)?;
        }
        Ok(id)
    }

    /// Stop the running job.
    ///
    /// With `wait` the call returns once the job terminated and the
    /// controller is idle again.
    pub async fn stop(&self, wait: bool) -> Result<(), LifecycleError> {
        let (accepted, accepted_rx) = oneshot::channel();
        let (done, done_rx) = oneshot::channel();
        self.send(Command::Stop { accepted, done }).await?;

        accepted_rx.await.map_err(|_| LifecycleError::Closed)??;
        if wait {
            done_rx.await.map_err(|_| LifecycleError::Closed)?;
        }
        Ok(())
    }

    /// Stop any running job and retire the controller for good.
    ///
    /// Closing an already closed controller is a no-op.
    pub async fn close(&self) {
        let (done, done_rx) = oneshot::channel();
        if self.commands.send(Command::Close { done }).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Current state.
    pub async fn status(&self) -> ControllerStatus {
        let (reply, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Status { reply }).await.is_err() {
            return ControllerStatus::Closed;
        }
        reply_rx.await.unwrap_or(ControllerStatus::Closed)
    }

    async fn send(&self, command: Command<I::Params>) -> Result<(), LifecycleError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LifecycleError::Closed)
    }
}
