//! Generic two-state link cell.
//!
//! Both hardware links (radio bridge and glucose transmitter) move between
//! `Unconfigured` and `Ready` the same way: an identifier appears and a
//! resource is built and subscribed to, the identifier changes and the live
//! resource is retargeted, the identifier disappears and the resource is
//! unsubscribed and released. [`LinkState::set_identifier`] is the only
//! mutator and reports what it did as a [`Transition`].
//!
//! Subscriptions are tokio tasks forwarding the resource's broadcast channels
//! into the owner's inbox. Every activation gets a fresh generation number so
//! the owner can drop events that were already queued when the link was torn
//! down.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::types::{DeviceId, LinkIdentifier};

/// Lifecycle notification emitted by a link resource.
///
/// The coordinator re-broadcasts these unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkNotification {
    /// A peripheral was discovered
    DeviceDiscovered { device: DeviceId },
    /// A peripheral connected
    DeviceConnected { device: DeviceId },
    /// A peripheral disconnected
    DeviceDisconnected { device: DeviceId },
    /// Free-form status change reported by the resource
    StatusChanged { description: String },
}

/// What a subscription delivers to the owner.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkSignal<E> {
    /// Lifecycle notification
    Notification(LinkNotification),
    /// Domain event (packet or reading)
    Event(E),
}

/// A live hardware resource managed by a [`LinkState`].
pub trait LinkResource: Send + 'static {
    /// Domain events produced by this resource
    type Event: Clone + Send + 'static;

    /// Identifier the resource currently targets.
    fn identifier(&self) -> &LinkIdentifier;

    /// Point the resource at a different device, resetting any state tied to
    /// the previous identifier.
    fn retarget(&mut self, identifier: LinkIdentifier);

    /// Subscribe to lifecycle notifications.
    fn notifications(&self) -> broadcast::Receiver<LinkNotification>;

    /// Subscribe to domain events.
    fn events(&self) -> broadcast::Receiver<Self::Event>;
}

/// Outcome of [`LinkState::set_identifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed
    Unchanged,
    /// A new resource was built and subscribed
    Established { generation: u64 },
    /// The live resource now targets a different identifier
    Retargeted { generation: u64 },
    /// The resource was unsubscribed and released
    TornDown { generation: u64 },
}

/// Forwarding tasks attached to one activation of a link.
#[derive(Debug, Default)]
pub struct Subscriptions {
    tasks: Vec<JoinHandle<()>>,
}

impl Subscriptions {
    /// Abort every forwarding task.
    pub fn cancel(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Number of tasks still attached.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Connects link resources to an owner inbox of command type `C`.
///
/// Only weak senders are held, so link traffic alone never keeps the owner's
/// inbox open.
pub struct LinkBinder<E, C> {
    name: &'static str,
    inbox: mpsc::WeakUnboundedSender<C>,
    wrap: fn(u64, LinkSignal<E>) -> C,
    next_generation: u64,
}

impl<E, C> LinkBinder<E, C>
where
    E: Clone + Send + 'static,
    C: Send + 'static,
{
    /// `wrap` turns a generation-tagged signal into an inbox command.
    pub fn new(
        name: &'static str,
        inbox: &mpsc::UnboundedSender<C>,
        wrap: fn(u64, LinkSignal<E>) -> C,
    ) -> Self {
        Self {
            name,
            inbox: inbox.downgrade(),
            wrap,
            next_generation: 1,
        }
    }

    /// Link name used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn attach<R>(&mut self, resource: &R) -> (u64, Subscriptions)
    where
        R: LinkResource<Event = E>,
    {
        let generation = self.next_generation;
        self.next_generation += 1;
        let wrap = self.wrap;

        let notifications = forward(
            self.name,
            resource.notifications(),
            self.inbox.clone(),
            move |note| wrap(generation, LinkSignal::Notification(note)),
        );
        let events = forward(
            self.name,
            resource.events(),
            self.inbox.clone(),
            move |event| wrap(generation, LinkSignal::Event(event)),
        );

        (
            generation,
            Subscriptions {
                tasks: vec![notifications, events],
            },
        )
    }
}

fn forward<T, C, F>(
    link: &'static str,
    mut receiver: broadcast::Receiver<T>,
    inbox: mpsc::WeakUnboundedSender<C>,
    map: F,
) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
    C: Send + 'static,
    F: Fn(T) -> C + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(item) => {
                    let Some(inbox) = inbox.upgrade() else {
                        break;
                    };
                    if inbox.send(map(item)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(link, skipped, "Link subscription lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// A `Ready` link: the resource plus its subscriptions.
#[derive(Debug)]
pub struct ActiveLink<R> {
    // Declared first so they are released before the resource on drop
    subscriptions: Subscriptions,
    resource: R,
    generation: u64,
}

impl<R> ActiveLink<R> {
    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }
}

/// Two-state link cell.
#[derive(Debug)]
pub enum LinkState<R> {
    /// No identifier, no resource
    Unconfigured,
    /// Resource built and subscribed
    Ready(ActiveLink<R>),
}

impl<R: LinkResource> LinkState<R> {
    /// Apply an identifier change.
    ///
    /// `build` is only called when a new resource is needed. Teardown cancels
    /// the subscriptions before the resource is dropped.
    pub fn set_identifier<C, F>(
        &mut self,
        identifier: Option<LinkIdentifier>,
        binder: &mut LinkBinder<R::Event, C>,
        build: F,
    ) -> Transition
    where
        C: Send + 'static,
        F: FnOnce(LinkIdentifier) -> R,
    {
        match self {
            LinkState::Unconfigured => match identifier {
                None => Transition::Unchanged,
                Some(identifier) => {
                    info!(link = binder.name(), identifier = %identifier, "Link ready");
                    let resource = build(identifier);
                    let (generation, subscriptions) = binder.attach(&resource);
                    *self = LinkState::Ready(ActiveLink {
                        subscriptions,
                        resource,
                        generation,
                    });
                    Transition::Established { generation }
                }
            },
            LinkState::Ready(link) => match identifier {
                Some(identifier) if link.resource.identifier() == &identifier => {
                    debug!(link = binder.name(), identifier = %identifier, "Identifier unchanged");
                    Transition::Unchanged
                }
                Some(identifier) => {
                    info!(
                        link = binder.name(),
                        from = %link.resource.identifier(),
                        to = %identifier,
                        "Retargeting link"
                    );
                    link.resource.retarget(identifier);
                    Transition::Retargeted {
                        generation: link.generation,
                    }
                }
                None => {
                    let generation = link.generation;
                    self.teardown();
                    info!(link = binder.name(), generation, "Link torn down");
                    Transition::TornDown { generation }
                }
            },
        }
    }

    fn teardown(&mut self) {
        if let LinkState::Ready(mut link) = std::mem::replace(self, LinkState::Unconfigured) {
            link.subscriptions.cancel();
            drop(link.resource);
        }
    }
}

impl<R> Default for LinkState<R> {
    fn default() -> Self {
        LinkState::Unconfigured
    }
}

impl<R> LinkState<R> {
    pub fn is_ready(&self) -> bool {
        matches!(self, LinkState::Ready(_))
    }

    pub fn resource(&self) -> Option<&R> {
        match self {
            LinkState::Ready(link) => Some(&link.resource),
            LinkState::Unconfigured => None,
        }
    }

    pub fn resource_mut(&mut self) -> Option<&mut R> {
        match self {
            LinkState::Ready(link) => Some(&mut link.resource),
            LinkState::Unconfigured => None,
        }
    }

    /// Generation of the current activation.
    pub fn generation(&self) -> Option<u64> {
        match self {
            LinkState::Ready(link) => Some(link.generation),
            LinkState::Unconfigured => None,
        }
    }

    /// Whether a signal tagged with `generation` came from the live resource.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == Some(generation)
    }
}
