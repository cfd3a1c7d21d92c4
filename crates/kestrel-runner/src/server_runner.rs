//! Builder and runtime for a kestrel server
//!
//! Wires the behavior registry, NPC directory, hook table and event bus
//! together and hands each connection an explicit [`ServerContext`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use kestrel_events::{
    ConsumerContext, ConsumerFactory, EventConsumer, EventEnvelope, EventType, Request,
    ServerNotice, SystemEvent,
};
use kestrel_scripting_host::{
    BehaviorRegistry, Dialog, DialogError, DialogTarget, HookRegistry, HookResult, Talker,
};
use kestrel_world::config::KestrelConfig;
use kestrel_world::{ConnectionId, EntityId, Position, SeedSource};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::connection::ConnectionRunner;
use crate::event_bus::{EventBus, EventSender};
use crate::npc_directory::NpcDirectory;
use crate::penalty::{DisconnectPenalty, Penalty};
use crate::server_context::ServerContext;

/// Connection id used for server-wide events
pub const SERVER_CONNECTION: ConnectionId = ConnectionId(0);

/// Error during builder configuration
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No tokio runtime available - build the server from inside a runtime")]
    NoRuntime,
    #[error("NPC id {0} registered twice")]
    DuplicateNpc(EntityId),
}

/// Builder for ServerRunner
pub struct ServerRunnerBuilder {
    config: Option<KestrelConfig>,
    consumers: Vec<Box<dyn ConsumerFactory>>,
    npcs: Vec<DialogTarget>,
    hooks: HookRegistry,
    penalty: Option<Arc<dyn Penalty>>,
    shutdown_rx: Option<watch::Receiver<bool>>,
    event_bus_capacity: usize,
}

impl ServerRunnerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            consumers: Vec::new(),
            npcs: Vec::new(),
            hooks: HookRegistry::new(),
            penalty: None,
            shutdown_rx: None,
            event_bus_capacity: 100,
        }
    }

    /// Set application config (optional - loaded from the default location,
    /// or defaults, if not specified)
    pub fn with_config(mut self, config: KestrelConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Add an event consumer
    pub fn with_consumer<C: ConsumerFactory>(mut self, consumer: C) -> Self {
        self.consumers.push(Box::new(consumer));
        self
    }

    /// Make an NPC available for conversations
    pub fn with_npc(mut self, target: DialogTarget) -> Self {
        self.npcs.push(target);
        self
    }

    /// Register a hook fragment for `subject`/`hook`
    pub fn with_hook<F, Fut>(mut self, subject: &str, hook: &str, fragment: F) -> Self
    where
        F: Fn(Dialog) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookResult, DialogError>> + Send + 'static,
    {
        self.hooks.register(subject, hook, fragment);
        self
    }

    /// Replace the penalty policy (default: [`DisconnectPenalty`])
    pub fn with_penalty(mut self, penalty: impl Penalty + 'static) -> Self {
        self.penalty = Some(Arc::new(penalty));
        self
    }

    /// Provide a shutdown receiver
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Set the event bus capacity (default: 100)
    pub fn event_bus_capacity(mut self, capacity: usize) -> Self {
        self.event_bus_capacity = capacity;
        self
    }

    /// Build the ServerRunner. Must be called from inside a tokio runtime;
    /// behavior timers and consumers are spawned on it.
    pub fn build(self) -> Result<ServerRunner, BuildError> {
        let runtime = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let config = match self.config {
            Some(config) => config,
            None => KestrelConfig::load().unwrap_or_else(|e| {
                info!("Using default config ({})", e);
                KestrelConfig::default()
            }),
        };

        let mut npcs = NpcDirectory::new();
        for target in self.npcs {
            npcs.insert(target)
                .map_err(|target| BuildError::DuplicateNpc(target.id))?;
        }

        let seeds = Arc::new(SeedSource::from_config_seed(config.scheduler.seed));
        let behaviors = Arc::new(BehaviorRegistry::new(
            config.scheduler.clone(),
            seeds,
            runtime.clone(),
        ));

        let (event_bus, _) = EventBus::new(self.event_bus_capacity);
        let consumer_ctx = ConsumerContext {
            config: config.clone(),
        };
        let consumer_tasks = self
            .consumers
            .iter()
            .map(|factory| {
                let consumer = factory.create(&consumer_ctx);
                runtime.spawn(run_consumer(event_bus.subscribe(), consumer))
            })
            .collect();

        let (shutdown_tx, shutdown_rx) = match self.shutdown_rx {
            Some(rx) => (None, rx),
            None => {
                let (tx, rx) = watch::channel(false);
                (Some(tx), rx)
            }
        };

        let events = event_bus.create_sender(SERVER_CONNECTION);
        let ctx = Arc::new(ServerContext {
            config,
            behaviors,
            npcs,
            hooks: Arc::new(self.hooks),
            penalty: self.penalty.unwrap_or_else(|| Arc::new(DisconnectPenalty)),
            event_bus,
        });

        Ok(ServerRunner {
            ctx,
            events,
            runtime,
            consumer_tasks,
            shutdown_tx,
            shutdown_rx,
            next_connection: AtomicU32::new(1),
        })
    }
}

impl Default for ServerRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a connection served on its own task
pub struct ConnectionHandle {
    pub connection: ConnectionId,
    pub requests: mpsc::UnboundedSender<Request>,
    pub notices: mpsc::UnboundedReceiver<ServerNotice>,
    pub task: JoinHandle<()>,
}

/// Configured server ready to accept connections
pub struct ServerRunner {
    ctx: Arc<ServerContext>,
    events: EventSender,
    runtime: Handle,
    consumer_tasks: Vec<JoinHandle<()>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    next_connection: AtomicU32,
}

impl ServerRunner {
    /// Create a new builder
    pub fn builder() -> ServerRunnerBuilder {
        ServerRunnerBuilder::new()
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub fn behaviors(&self) -> &Arc<BehaviorRegistry> {
        &self.ctx.behaviors
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.ctx.event_bus.subscribe()
    }

    /// Open a connection driven by the caller
    pub fn connect(
        &self,
        player: EntityId,
        position: Position,
        authority: u8,
    ) -> (ConnectionRunner, mpsc::UnboundedReceiver<ServerNotice>) {
        let connection = ConnectionId(self.next_connection.fetch_add(1, Ordering::SeqCst));
        let talker = Talker::new(player, connection, position).with_authority(authority);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        (
            ConnectionRunner::new(self.ctx.clone(), talker, notice_tx),
            notice_rx,
        )
    }

    /// Open a connection served on its own task until shutdown
    pub fn spawn_connection(
        &self,
        player: EntityId,
        position: Position,
        authority: u8,
    ) -> ConnectionHandle {
        let (runner, notices) = self.connect(player, position, authority);
        let connection = runner.connection();
        let (requests, request_rx) = mpsc::unbounded_channel();
        let task = self
            .runtime
            .spawn(runner.run(request_rx, self.shutdown_rx.clone()));

        ConnectionHandle {
            connection,
            requests,
            notices,
            task,
        }
    }

    /// Stop every behavior, signal connections and wait for consumers
    pub async fn shutdown(self) {
        info!("Shutting down server");
        if let Some(tx) = &self.shutdown_tx {
            let _ = tx.send(true);
        }
        self.ctx.behaviors.shutdown();
        self.events.system(SystemEvent::Shutdown);

        let timeout = Duration::from_secs(1);
        for task in self.consumer_tasks {
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(target: "events", "Event consumer task panicked: {}", e),
                Err(_) => warn!(target: "events", "Event consumer did not finish within timeout"),
            }
        }
    }
}

async fn run_consumer(
    mut event_rx: broadcast::Receiver<EventEnvelope>,
    mut consumer: Box<dyn EventConsumer>,
) {
    loop {
        match event_rx.recv().await {
            Ok(envelope) => {
                let shutdown = matches!(envelope.event, EventType::System(SystemEvent::Shutdown));
                consumer.handle_event(envelope);
                if shutdown {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                error!(target: "events", "Event receiver lagged, {} messages were skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
