mod connection;
pub mod dispatch_guard;
pub mod event_bus;
mod event_consumer;
pub mod logging;
mod npc_directory;
mod penalty;
mod server_context;
mod server_runner;

pub use connection::ConnectionRunner;
pub use dispatch_guard::{AggregateError, contain, guard};
pub use event_bus::{EventBus, EventSender};
pub use event_consumer::{ConsumerContext, ConsumerFactory, EventConsumer, LoggingConsumer};
pub use logging::init_logging;
pub use npc_directory::NpcDirectory;
pub use penalty::{DisconnectPenalty, Penalty, PenaltyAction};
pub use server_context::ServerContext;
pub use server_runner::{
    BuildError, ConnectionHandle, SERVER_CONNECTION, ServerRunner, ServerRunnerBuilder,
};
