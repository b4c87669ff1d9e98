use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use futures::{Stream, StreamExt};
use futures::channel::mpsc::{channel, Receiver, Sender};
use futures::future::OptionFuture;
use indexmap::IndexMap;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::types::Config;
use crate::device::constants::SUBSCRIPTION_BUFFER;
use crate::device::endpoint::Endpoint;
use crate::device::machine::{Action, ConnectionMachine, Input};
use crate::device::transport::Connector;
use crate::device::types::{LinkEvent, LinkId, Snapshot};

type SubscriberId = u64;

#[derive(Debug)]
enum Command {
    Input(Input),
    Subscribe { id: SubscriberId, sender: Sender<Snapshot> },
    Unsubscribe { id: SubscriberId },
}

struct ActiveLink {
    link: LinkId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps a single connection to the sensor device alive and publishes what it reports.
///
/// All state lives in one event loop task. The methods on this type only enqueue commands, so
/// they never block and may be called from anywhere inside the tokio runtime.
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    latest: watch::Receiver<Snapshot>,
    next_subscriber: AtomicU64,
    handle: JoinHandle<()>,
    // cancels the event loop when the manager is dropped
    cancel: DropGuard,
}

impl ConnectionManager {
    pub fn new<C: Connector>(config: Config, connector: C) -> Self {
        let machine = ConnectionMachine::new(config.endpoint, config.proximity_threshold);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel::<Command>();
        let (latest_tx, latest_rx) = watch::channel(machine.snapshot());
        let cancel = CancellationToken::new();

        let handle = spawn(run_event_loop(
            machine,
            Arc::new(connector),
            commands_rx,
            latest_tx,
            cancel.clone(),
        ));

        ConnectionManager {
            commands: commands_tx,
            latest: latest_rx,
            next_subscriber: AtomicU64::new(1),
            handle,
            cancel: cancel.drop_guard(),
        }
    }

    fn send(&self, input: Input) {
        if self.commands.send(Command::Input(input)).is_err() {
            warn!("Connection event loop is no longer running");
        }
    }

    pub fn start(&self) {
        self.send(Input::Start);
    }

    pub fn stop(&self) {
        self.send(Input::Stop);
    }

    pub fn set_endpoint(&self, endpoint: Endpoint) {
        self.send(Input::SetEndpoint(endpoint));
    }

    /// Changes the distance below which a reading counts as near. The connection is kept, and a
    /// snapshot is published if the proximity state changes.
    pub fn set_threshold(&self, threshold: f64) {
        self.send(Input::SetThreshold(threshold));
    }

    pub fn latest(&self) -> Snapshot {
        self.latest.borrow().clone()
    }

    /// The returned subscription first yields the current snapshot, and then every change in
    /// the order it happened. A subscriber that falls more than
    /// [`SUBSCRIPTION_BUFFER`] snapshots behind misses the ones published while its buffer is
    /// full; [`ConnectionManager::latest`] always has the most recent one.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel::<Snapshot>(SUBSCRIPTION_BUFFER);

        if self.commands.send(Command::Subscribe { id, sender }).is_err() {
            warn!("Connection event loop is no longer running");
        }

        Subscription {
            id,
            receiver,
            commands: self.commands.clone(),
        }
    }

    /// Stops the event loop (closing any connection) and waits for it to finish.
    pub async fn shutdown(self) {
        let ConnectionManager { handle, cancel, .. } = self;
        drop(cancel);

        if let Err(err) = handle.await {
            warn!("Failed to join connection event loop: {}", err);
        }
    }
}

/// A stream of snapshots from a [`ConnectionManager`]. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    receiver: Receiver<Snapshot>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // the event loop might already be gone, which is fine
        let _ = self.commands.send(Command::Unsubscribe { id: self.id });
    }
}

fn open_link(
    connector: Arc<dyn Connector>,
    link: LinkId,
    endpoint: Endpoint,
    parent: &CancellationToken,
    events: mpsc::UnboundedSender<(LinkId, LinkEvent)>,
) -> ActiveLink {
    let cancel = parent.child_token();
    let task_cancel = cancel.clone();

    let handle = spawn(async move {
        let connected = tokio::select! {
            _ = task_cancel.cancelled() => return,
            result = connector.connect(&endpoint) => result,
        };

        let mut frames = match connected {
            Ok(frames) => frames,
            Err(err) => {
                let _ = events.send((link, LinkEvent::Failed(err)));
                return;
            },
        };

        if events.send((link, LinkEvent::Opened)).is_err() {
            return;
        }

        'readloop: loop {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    break 'readloop;
                },
                frame = frames.next() => {
                    let event = match frame {
                        Some(Ok(frame)) => LinkEvent::Frame(frame),
                        Some(Err(err)) => LinkEvent::Failed(err),
                        None => LinkEvent::Closed,
                    };
                    let finished = !matches!(event, LinkEvent::Frame(_));

                    if events.send((link, event)).is_err() || finished {
                        break 'readloop;
                    }
                },
            }
        }
    });

    ActiveLink { link, cancel, handle }
}

// Waits for the link task to stop, which drops (and thereby closes) its connection.
async fn close_link(active: ActiveLink) {
    active.cancel.cancel();

    if let Err(err) = active.handle.await {
        warn!("Failed to join task of link {}: {}", active.link, err);
    }
    debug!("Link {} closed", active.link);
}

struct Observer {
    sender: Sender<Snapshot>,
    lagging: bool,
}

// Never waits for a subscriber: a full buffer drops the snapshot for that subscriber only, so a
// stalled reader can not hold up the event loop.
fn publish(
    observers: &mut IndexMap<SubscriberId, Observer>,
    latest: &watch::Sender<Snapshot>,
    snapshot: Snapshot,
) {
    latest.send_replace(snapshot.clone());

    let mut gone = Vec::new();
    for (id, observer) in observers.iter_mut() {
        match observer.sender.try_send(snapshot.clone()) {
            Ok(()) => {
                if observer.lagging {
                    debug!("Subscriber {} caught up", id);
                    observer.lagging = false;
                }
            },
            Err(err) if err.is_full() => {
                if !observer.lagging {
                    warn!("Subscriber {} is not keeping up, dropping snapshots", id);
                    observer.lagging = true;
                }
            },
            Err(_) => gone.push(*id),
        }
    }

    for id in gone {
        debug!("Removing subscriber {}", id);
        observers.shift_remove(&id);
    }
}

async fn run_event_loop(
    mut machine: ConnectionMachine,
    connector: Arc<dyn Connector>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    latest: watch::Sender<Snapshot>,
    cancel: CancellationToken,
) {
    let (link_tx, mut link_rx) = mpsc::unbounded_channel::<(LinkId, LinkEvent)>();
    let mut observers: IndexMap<SubscriberId, Observer> = IndexMap::new();
    let mut active: Option<ActiveLink> = None;
    let mut reconnect: Option<Pin<Box<Sleep>>> = None;

    'mainloop: loop {
        let input = tokio::select! {
            _ = cancel.cancelled() => {
                break 'mainloop;
            },
            command = commands.recv() => match command {
                None => break 'mainloop,
                Some(Command::Input(input)) => input,
                Some(Command::Subscribe { id, mut sender }) => {
                    // the buffer of a new subscriber is empty
                    if sender.try_send(machine.snapshot()).is_ok() {
                        observers.insert(id, Observer { sender, lagging: false });
                    }
                    continue 'mainloop;
                },
                Some(Command::Unsubscribe { id }) => {
                    observers.shift_remove(&id);
                    continue 'mainloop;
                },
            },
            Some((link, event)) = link_rx.recv() => Input::Link { link, event },
            Some(()) = OptionFuture::from(reconnect.as_mut()), if reconnect.is_some() => {
                reconnect = None;
                Input::ReconnectDue
            },
        };

        for action in machine.handle(input) {
            match action {
                Action::Open { link, endpoint } => {
                    // a link that ended on its own may still have to be joined
                    if let Some(previous) = active.take() {
                        close_link(previous).await;
                    }
                    active = Some(open_link(connector.clone(), link, endpoint, &cancel, link_tx.clone()));
                },
                Action::Close { link } => {
                    match active.take() {
                        Some(current) if current.link == link => close_link(current).await,
                        other => active = other,
                    }
                },
                Action::ScheduleReconnect { delay } => {
                    info!("Reconnecting in {}", humantime::format_duration(delay));
                    reconnect = Some(Box::pin(sleep(delay)));
                },
                Action::CancelReconnect => {
                    debug!("Cancelling scheduled reconnect");
                    reconnect = None;
                },
                Action::Publish(snapshot) => {
                    publish(&mut observers, &latest, snapshot);
                },
            }
        }
    }

    if let Some(current) = active.take() {
        close_link(current).await;
    }
    info!("Connection event loop stopped");
}
