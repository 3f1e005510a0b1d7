//! A single worker generation running as a detached task.
//!
//! The worker owns the receiving end of an event channel and shares nothing
//! with the host except the partition store. Install and activate run inline
//! on the worker loop so they are sequenced; every fetch and control message
//! is handled in its own task.

use std::sync::Arc;
use std::time::Duration;

use offgrid_core::{Error, Generation, ProxyRequest, ProxyResponse};
use tokio::sync::{mpsc, oneshot, watch};

use crate::clients::ClientRegistry;
use crate::control::{self, ControlChannel, ControlEnvelope};
use crate::lifecycle::{self, ActivationReport, InstallReport, LifecycleState};
use crate::release::Manifest;
use crate::strategy::StrategyContext;

const EVENT_BUFFER: usize = 64;

pub(crate) enum WorkerEvent {
    Install { manifest: Manifest, done: oneshot::Sender<Result<InstallReport, Error>> },
    Activate { done: oneshot::Sender<Result<ActivationReport, Error>> },
    Fetch { request: ProxyRequest, respond: oneshot::Sender<FetchDisposition> },
    Control(ControlEnvelope),
}

/// What the worker decided to do with an intercepted request.
#[derive(Debug)]
pub enum FetchDisposition {
    Respond(Result<ProxyResponse, Error>),
    /// Not intercepted; the host should go to the network itself.
    PassThrough,
}

/// Host-side handle to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    events: mpsc::Sender<WorkerEvent>,
    generation: Generation,
    state: Arc<watch::Sender<LifecycleState>>,
    skip_waiting: Arc<watch::Sender<bool>>,
    shutdown: Arc<watch::Sender<bool>>,
    control: ControlChannel,
    ctx: StrategyContext,
}

struct Worker {
    ctx: StrategyContext,
    clients: ClientRegistry,
    state: Arc<watch::Sender<LifecycleState>>,
    skip_waiting: Arc<watch::Sender<bool>>,
    immediate_activation: bool,
}

impl WorkerHandle {
    /// Start a worker for `ctx.generation` in the installing state.
    pub fn spawn(ctx: StrategyContext, clients: ClientRegistry, control_timeout: Duration, immediate_activation: bool) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (state, _) = watch::channel(LifecycleState::Installing);
        let (skip_waiting, _) = watch::channel(false);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let state = Arc::new(state);
        let skip_waiting = Arc::new(skip_waiting);

        let worker = Worker {
            ctx: ctx.clone(),
            clients,
            state: state.clone(),
            skip_waiting: skip_waiting.clone(),
            immediate_activation,
        };
        tokio::spawn(worker.run(events_rx, shutdown_rx));

        tracing::debug!(generation = %ctx.generation, "worker started");
        let control = ControlChannel::new(events_tx.clone(), control_timeout);
        Self {
            events: events_tx,
            generation: ctx.generation.clone(),
            state,
            skip_waiting,
            shutdown: Arc::new(shutdown),
            control,
            ctx,
        }
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn control(&self) -> ControlChannel {
        self.control.clone()
    }

    pub async fn install(&self, manifest: Manifest) -> Result<InstallReport, Error> {
        let (done, rx) = oneshot::channel();
        self.send(WorkerEvent::Install { manifest, done }).await?;
        rx.await.map_err(|_| self.terminated("install"))?
    }

    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let (done, rx) = oneshot::channel();
        self.send(WorkerEvent::Activate { done }).await?;
        rx.await.map_err(|_| self.terminated("activate"))?
    }

    /// Hand an intercepted request to the worker.
    pub async fn dispatch(&self, request: ProxyRequest) -> Result<FetchDisposition, Error> {
        let (respond, rx) = oneshot::channel();
        self.send(WorkerEvent::Fetch { request, respond }).await?;
        rx.await.map_err(|_| self.terminated("fetch"))
    }

    pub fn skip_waiting_requested(&self) -> bool {
        *self.skip_waiting.borrow()
    }

    /// Resolves once skip-waiting has been requested. Returns `false` if the
    /// worker went away first.
    pub async fn wait_skip_waiting(&self) -> bool {
        let mut rx = self.skip_waiting.subscribe();
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            requested = async { rx.wait_for(|requested| *requested).await.is_ok() } => requested,
            () = stopped(&mut shutdown) => false,
        }
    }

    /// Stop the worker loop. Tasks already handling requests run to completion.
    pub fn terminate(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::debug!(generation = %self.generation, "worker terminated");
        }
        self.state.send_replace(LifecycleState::Redundant);
    }

    /// Wait for this worker's pending cache writes.
    pub async fn flush(&self) {
        self.ctx.background.flush().await;
    }

    async fn send(&self, event: WorkerEvent) -> Result<(), Error> {
        self.events.send(event).await.map_err(|_| self.terminated("send"))
    }

    fn terminated(&self, during: &str) -> Error {
        Error::WorkerTerminated(format!("{} stopped during {during}", self.generation))
    }
}

impl Worker {
    async fn run(self, mut events: mpsc::Receiver<WorkerEvent>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                () = stopped(&mut shutdown) => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }

        // Requests queued before shutdown still get an answer.
        events.close();
        while let Some(event) = events.recv().await {
            match event {
                WorkerEvent::Fetch { .. } | WorkerEvent::Control(_) => self.handle(event).await,
                WorkerEvent::Install { .. } | WorkerEvent::Activate { .. } => {}
            }
        }
        tracing::debug!(generation = %self.ctx.generation, "worker loop exited");
    }

    async fn handle(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Install { manifest, done } => {
                let _ = done.send(self.install(&manifest).await);
            }
            WorkerEvent::Activate { done } => {
                let _ = done.send(self.activate().await);
            }
            WorkerEvent::Fetch { request, respond } => {
                let ctx = self.ctx.clone();
                let state = self.state.clone();
                tokio::spawn(async move {
                    let url = request.url.clone();
                    let current = *state.borrow();
                    let handler = tokio::spawn(async move { handle_fetch(&ctx, current, request).await });
                    let disposition = match handler.await {
                        Ok(disposition) => disposition,
                        Err(e) => {
                            tracing::error!(url = %url, error = %e, "fetch handler failed");
                            FetchDisposition::Respond(Err(Error::Network(format!("fetch handler failed: {e}"))))
                        }
                    };
                    let _ = respond.send(disposition);
                });
            }
            WorkerEvent::Control(ControlEnvelope { message, reply }) => {
                let cache = self.ctx.cache.clone();
                let generation = self.ctx.generation.clone();
                let skip_waiting = self.skip_waiting.clone();
                tokio::spawn(async move {
                    let answer = control::dispatch(message, &cache, &generation, &skip_waiting).await;
                    if let (Some(reply), Some(answer)) = (reply, answer) {
                        let _ = reply.send(answer);
                    }
                });
            }
        }
    }

    async fn install(&self, manifest: &Manifest) -> Result<InstallReport, Error> {
        self.state.send_replace(LifecycleState::Installing);
        match lifecycle::install(&self.ctx.cache, self.ctx.fetcher.as_ref(), &self.ctx.generation, manifest).await {
            Ok(report) => {
                self.state.send_replace(LifecycleState::Installed);
                if self.immediate_activation {
                    self.skip_waiting.send_replace(true);
                }
                Ok(report)
            }
            Err(e) => {
                self.state.send_replace(LifecycleState::Redundant);
                Err(e)
            }
        }
    }

    async fn activate(&self) -> Result<ActivationReport, Error> {
        self.state.send_replace(LifecycleState::Activating);
        match lifecycle::activate(&self.ctx.cache, &self.ctx.generation, &self.clients).await {
            Ok(report) => {
                self.state.send_replace(LifecycleState::Activated);
                Ok(report)
            }
            Err(e) => {
                tracing::error!(generation = %self.ctx.generation, error = %e, "activation failed");
                self.state.send_replace(LifecycleState::Redundant);
                Err(e)
            }
        }
    }
}

/// Resolves once shutdown is requested or the handle is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

async fn handle_fetch(ctx: &StrategyContext, state: LifecycleState, request: ProxyRequest) -> FetchDisposition {
    if !ctx.classifier.should_intercept(&request) {
        tracing::debug!(url = %request.url, method = %request.method, "passing through");
        return FetchDisposition::PassThrough;
    }
    if state != LifecycleState::Activated {
        return FetchDisposition::PassThrough;
    }

    let strategy = ctx.classifier.select_strategy(&request);
    tracing::debug!(url = %request.url, strategy = strategy.as_str(), "intercepted");
    FetchDisposition::Respond(ctx.execute(strategy, &request).await)
}
