//! Coordinator task and its handle.

use std::ops::ControlFlow;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use glucolink_core::{DeviceId, Transition};

use crate::command::{Command, CoordinatorEvent, CoordinatorSnapshot};
use crate::coordinator::{CoordinatorBuilder, DeviceCoordinator};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::factory::DeviceFactory;

/// Cloneable front end to a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    inbox: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    fn send(&self, command: Command) -> CoordinatorResult<()> {
        self.inbox.send(command).map_err(|_| CoordinatorError::Closed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> CoordinatorResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Set the pump identifier. `None` or a malformed value clears it.
    pub async fn set_pump_identifier(&self, raw: Option<&str>) -> CoordinatorResult<Transition> {
        let raw = raw.map(str::to_owned);
        self.request(|reply| Command::SetPumpIdentifier {
            raw,
            reply: Some(reply),
        })
        .await
    }

    /// Set the transmitter identifier. `None` or a malformed value clears it.
    pub async fn set_transmitter_identifier(
        &self,
        raw: Option<&str>,
    ) -> CoordinatorResult<Transition> {
        let raw = raw.map(str::to_owned);
        self.request(|reply| Command::SetTransmitterIdentifier {
            raw,
            reply: Some(reply),
        })
        .await
    }

    pub fn connect_device(&self, device: DeviceId) -> CoordinatorResult<()> {
        self.send(Command::ConnectDevice(device))
    }

    pub fn disconnect_device(&self, device: DeviceId) -> CoordinatorResult<()> {
        self.send(Command::DisconnectDevice(device))
    }

    pub async fn snapshot(&self) -> CoordinatorResult<CoordinatorSnapshot> {
        self.request(Command::Snapshot).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Stop the coordinator; links are released when the task exits.
    pub async fn shutdown(&self) -> CoordinatorResult<()> {
        self.request(Command::Shutdown).await
    }
}

/// Build the coordinator, restore its settings and run it on a new task.
pub fn spawn<F: DeviceFactory>(
    builder: CoordinatorBuilder<F>,
) -> CoordinatorResult<(CoordinatorHandle, JoinHandle<()>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let coordinator = builder.build(&tx)?;
    let handle = CoordinatorHandle {
        inbox: tx,
        events: coordinator.event_sender(),
    };
    let task = tokio::spawn(run(coordinator, rx));
    Ok((handle, task))
}

async fn run<F: DeviceFactory>(
    mut coordinator: DeviceCoordinator<F>,
    mut inbox: mpsc::UnboundedReceiver<Command>,
) {
    info!("Coordinator started");
    while let Some(command) = inbox.recv().await {
        if let ControlFlow::Break(()) = coordinator.handle(command) {
            break;
        }
    }
    info!("Coordinator stopped");
}
