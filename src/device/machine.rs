use log::{debug, info, warn};
use tokio::time::Duration;

use crate::device::constants::RECONNECT_DELAY;
use crate::device::decode::decode_reading;
use crate::device::endpoint::Endpoint;
use crate::device::types::{ConnectionState, Frame, LinkEvent, LinkId, Reading, Snapshot};
use crate::proximity::{self, ProximityState};

#[derive(Debug)]
pub enum Input {
    Start,
    Stop,
    SetEndpoint(Endpoint),
    SetThreshold(f64),
    Link { link: LinkId, event: LinkEvent },
    ReconnectDue,
}

/// Side effects requested by the state machine, to be carried out in the order they are returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Open { link: LinkId, endpoint: Endpoint },
    Close { link: LinkId },
    ScheduleReconnect { delay: Duration },
    CancelReconnect,
    Publish(Snapshot),
}

/// The connection lifecycle, without any I/O.
///
/// Inputs are applied one at a time by [`ConnectionMachine::handle`], which updates the state and
/// returns the actions needed to make the outside world match it. At most one link is active at
/// any time, and events from any other link are ignored.
#[derive(Debug)]
pub struct ConnectionMachine {
    endpoint: Endpoint,
    threshold: f64,
    started: bool,
    state: ConnectionState,
    reading: Option<Reading>,
    link: Option<LinkId>,
    next_link: u64,
    reconnect_pending: bool,
}

impl ConnectionMachine {
    pub fn new(endpoint: Endpoint, threshold: f64) -> Self {
        ConnectionMachine {
            endpoint,
            threshold,
            started: false,
            state: ConnectionState::Disconnected,
            reading: None,
            link: None,
            next_link: 1,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn active_link(&self) -> Option<LinkId> {
        self.link
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            connection_state: self.state,
            endpoint: self.endpoint.clone(),
            reading: self.reading,
            proximity: self.proximity(),
        }
    }

    fn proximity(&self) -> ProximityState {
        proximity::update(self.reading, self.threshold)
    }

    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        let before = self.snapshot();
        let mut actions = Vec::new();
        // a reading is published even if it equals the previous one
        let mut new_reading = false;

        match input {
            Input::Start => {
                if !self.started {
                    self.started = true;
                    self.open(&mut actions);
                }
            },
            Input::Stop => {
                if self.started {
                    info!("Stopping connection to {}", self.endpoint);
                    self.started = false;
                    self.teardown(&mut actions);
                    self.state = ConnectionState::Disconnected;
                }
            },
            Input::SetEndpoint(endpoint) => {
                if endpoint == self.endpoint {
                    debug!("Endpoint {} is unchanged", endpoint);
                } else {
                    info!("Switching endpoint from {} to {}", self.endpoint, endpoint);
                    self.endpoint = endpoint;

                    if self.started {
                        self.teardown(&mut actions);
                        self.open(&mut actions);
                    }
                }
            },
            Input::SetThreshold(threshold) => {
                // the connection is untouched, only the proximity state is recomputed
                if threshold != self.threshold {
                    info!("Proximity threshold changed from {} to {}", self.threshold, threshold);
                    self.threshold = threshold;
                }
            },
            Input::Link { link, event } => {
                if self.link != Some(link) {
                    debug!("Discarding {:?} from superseded link {}", event, link);
                } else {
                    new_reading = self.on_link_event(link, event, &mut actions);
                }
            },
            Input::ReconnectDue => {
                if self.started && self.reconnect_pending {
                    self.reconnect_pending = false;
                    self.open(&mut actions);
                }
            },
        }

        let after = self.snapshot();
        if new_reading || after != before {
            actions.push(Action::Publish(after));
        }

        actions
    }

    // returns true if a new reading was received
    fn on_link_event(&mut self, link: LinkId, event: LinkEvent, actions: &mut Vec<Action>) -> bool {
        match event {
            LinkEvent::Opened => {
                info!("Connected to {} (link {})", self.endpoint, link);
                self.state = ConnectionState::Connected;
            },
            LinkEvent::Frame(Frame::Text(text)) => {
                match decode_reading(&text) {
                    Ok(reading) => {
                        self.reading = Some(reading);
                        return true;
                    },
                    Err(err) => warn!("Dropping message {:?}: {}", text, err),
                }
            },
            LinkEvent::Frame(Frame::Binary(data)) => {
                warn!("Dropping binary message of {} bytes", data.len());
            },
            LinkEvent::Closed => {
                info!("Connection to {} closed", self.endpoint);
                self.lost(ConnectionState::Disconnected, actions);
            },
            LinkEvent::Failed(err) => {
                warn!("Connection to {} failed: {}", self.endpoint, err);
                self.lost(ConnectionState::Error, actions);
            },
        }

        false
    }

    fn open(&mut self, actions: &mut Vec<Action>) {
        let link = LinkId(self.next_link);
        self.next_link += 1;

        info!("Connecting to {} (link {})", self.endpoint, link);
        self.link = Some(link);
        self.state = ConnectionState::Connecting;
        actions.push(Action::Open { link, endpoint: self.endpoint.clone() });
    }

    fn teardown(&mut self, actions: &mut Vec<Action>) {
        if let Some(link) = self.link.take() {
            actions.push(Action::Close { link });
        }

        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(Action::CancelReconnect);
        }

        self.reading = None;
    }

    fn lost(&mut self, state: ConnectionState, actions: &mut Vec<Action>) {
        self.link = None;
        self.reading = None;
        self.state = state;
        self.reconnect_pending = true;
        actions.push(Action::ScheduleReconnect { delay: Duration::from_millis(RECONNECT_DELAY) });
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use super::*;
    use crate::error::LinkError;
    use crate::proximity::Tier;

    fn endpoint(text: &str) -> Endpoint {
        Endpoint::parse(text).unwrap()
    }

    fn machine() -> ConnectionMachine {
        ConnectionMachine::new(endpoint("ws://192.168.1.70/ws"), 10.0)
    }

    fn link_event(link: LinkId, event: LinkEvent) -> Input {
        Input::Link { link, event }
    }

    fn text(text: &str) -> LinkEvent {
        LinkEvent::Frame(Frame::Text(text.to_string()))
    }

    fn refused() -> LinkEvent {
        LinkEvent::Failed(LinkError::from(io::Error::from(io::ErrorKind::ConnectionRefused)))
    }

    fn published(actions: &[Action]) -> Vec<&Snapshot> {
        actions.iter()
            .filter_map(|action| match action {
                Action::Publish(snapshot) => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    // starts the machine and opens the first link
    fn connected() -> (ConnectionMachine, LinkId) {
        let mut machine = machine();
        machine.handle(Input::Start);
        let link = machine.active_link().unwrap();
        machine.handle(link_event(link, LinkEvent::Opened));
        (machine, link)
    }

    #[test]
    fn idle_until_started() {
        let machine = machine();
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.connection_state, ConnectionState::Disconnected);
        assert_eq!(snapshot.reading, None);
        assert_eq!(snapshot.proximity, ProximityState::UNKNOWN);
        assert_eq!(machine.active_link(), None);
    }

    #[test]
    fn start_opens_a_link() {
        let mut machine = machine();
        let actions = machine.handle(Input::Start);

        assert_eq!(actions[0], Action::Open { link: LinkId(1), endpoint: endpoint("ws://192.168.1.70/ws") });
        assert_eq!(published(&actions)[0].connection_state, ConnectionState::Connecting);
        assert_eq!(actions.len(), 2);

        assert!(machine.handle(Input::Start).is_empty());
    }

    #[test]
    fn reading_from_device() {
        let (mut machine, link) = connected();
        assert_eq!(machine.state(), ConnectionState::Connected);

        let actions = machine.handle(link_event(link, text(r#"{"distance": 3.2}"#)));
        let snapshot = published(&actions)[0];
        assert_eq!(snapshot.reading, Some(Reading { distance: 3.2 }));
        assert_eq!(snapshot.proximity, ProximityState { is_near: true, tier: Tier::Critical });
        assert_eq!(snapshot.connection_state, ConnectionState::Connected);
    }

    #[test]
    fn repeated_reading_is_published_again() {
        let (mut machine, link) = connected();
        machine.handle(link_event(link, text(r#"{"distance": 30}"#)));
        let actions = machine.handle(link_event(link, text(r#"{"distance": 30}"#)));
        assert_eq!(published(&actions).len(), 1);
    }

    #[test]
    fn malformed_messages_keep_prior_reading() {
        let (mut machine, link) = connected();
        machine.handle(link_event(link, text(r#"{"distance": 12}"#)));

        for event in [text("not json"), text(r#"{"distance": "3"}"#), LinkEvent::Frame(Frame::Binary(vec![1, 2]))] {
            assert!(machine.handle(link_event(link, event)).is_empty());
        }

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.reading, Some(Reading { distance: 12.0 }));
        assert_eq!(snapshot.proximity.tier, Tier::Approaching);
        assert_eq!(snapshot.connection_state, ConnectionState::Connected);
    }

    #[test]
    fn remote_close_schedules_one_reconnect() {
        let (mut machine, link) = connected();
        machine.handle(link_event(link, text(r#"{"distance": 4}"#)));

        let actions = machine.handle(link_event(link, LinkEvent::Closed));
        assert_eq!(actions[0], Action::ScheduleReconnect { delay: Duration::from_millis(3000) });
        let snapshot = published(&actions)[0];
        assert_eq!(snapshot.connection_state, ConnectionState::Disconnected);
        assert_eq!(snapshot.reading, None);
        assert_eq!(snapshot.proximity, ProximityState::UNKNOWN);
        assert!(machine.is_reconnect_pending());

        // a late failure of the same link does not schedule a second reconnect
        assert!(machine.handle(link_event(link, refused())).is_empty());

        let actions = machine.handle(Input::ReconnectDue);
        assert_eq!(actions[0], Action::Open { link: LinkId(2), endpoint: endpoint("ws://192.168.1.70/ws") });
        assert_eq!(published(&actions)[0].connection_state, ConnectionState::Connecting);
        assert!(!machine.is_reconnect_pending());
    }

    #[test]
    fn failure_is_tagged_as_error() {
        let mut machine = machine();
        machine.handle(Input::Start);
        let link = machine.active_link().unwrap();

        let actions = machine.handle(link_event(link, refused()));
        assert_eq!(actions[0], Action::ScheduleReconnect { delay: Duration::from_millis(RECONNECT_DELAY) });
        assert_eq!(machine.state(), ConnectionState::Error);
        assert_eq!(machine.active_link(), None);
    }

    #[test]
    fn stop_cancels_pending_reconnect() {
        let (mut machine, link) = connected();
        machine.handle(link_event(link, LinkEvent::Closed));

        let actions = machine.handle(Input::Stop);
        assert_eq!(actions, vec![Action::CancelReconnect]);

        assert!(machine.handle(Input::ReconnectDue).is_empty());
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn stop_closes_active_link() {
        let (mut machine, link) = connected();
        let actions = machine.handle(Input::Stop);

        assert_eq!(actions[0], Action::Close { link });
        assert_eq!(published(&actions)[0].connection_state, ConnectionState::Disconnected);
        assert_eq!(actions.len(), 2);

        // events still in flight from the closed link are ignored
        assert!(machine.handle(link_event(link, text(r#"{"distance": 1}"#))).is_empty());
        assert_eq!(machine.snapshot().reading, None);
    }

    #[test]
    fn stop_without_start_is_a_noop() {
        let mut machine = machine();
        assert!(machine.handle(Input::Stop).is_empty());
        assert!(machine.handle(Input::Stop).is_empty());
    }

    #[test]
    fn restart_after_stop() {
        let (mut machine, _) = connected();
        machine.handle(Input::Stop);

        let actions = machine.handle(Input::Start);
        assert_eq!(actions[0], Action::Open { link: LinkId(2), endpoint: endpoint("ws://192.168.1.70/ws") });
    }

    #[test]
    fn switching_endpoint_replaces_the_link() {
        let (mut machine, first) = connected();
        machine.handle(link_event(first, text(r#"{"distance": 2}"#)));

        let other = endpoint("ws://192.168.1.71:81/ws");
        let actions = machine.handle(Input::SetEndpoint(other.clone()));
        assert_eq!(actions[0], Action::Close { link: first });
        assert_eq!(actions[1], Action::Open { link: LinkId(2), endpoint: other.clone() });
        let snapshot = published(&actions)[0];
        assert_eq!(snapshot.endpoint, other);
        assert_eq!(snapshot.connection_state, ConnectionState::Connecting);
        assert_eq!(snapshot.reading, None);

        // the old link can no longer affect state
        assert!(machine.handle(link_event(first, LinkEvent::Opened)).is_empty());
        assert!(machine.handle(link_event(first, text(r#"{"distance": 1}"#))).is_empty());
        assert!(machine.handle(link_event(first, LinkEvent::Closed)).is_empty());
        assert_eq!(machine.state(), ConnectionState::Connecting);
        assert_eq!(machine.active_link(), Some(LinkId(2)));
    }

    #[test]
    fn same_endpoint_is_idempotent() {
        let (mut machine, _) = connected();
        assert!(machine.handle(Input::SetEndpoint(endpoint("ws://192.168.1.70/ws"))).is_empty());
    }

    #[test]
    fn switching_endpoint_cancels_pending_reconnect() {
        let (mut machine, link) = connected();
        machine.handle(link_event(link, LinkEvent::Closed));

        let actions = machine.handle(Input::SetEndpoint(endpoint("wss://sensor.example/ws")));
        assert_eq!(actions[0], Action::CancelReconnect);
        assert!(matches!(actions[1], Action::Open { link: LinkId(2), .. }));

        // a timer that already fired is ignored
        assert!(machine.handle(Input::ReconnectDue).is_empty());
    }

    #[test]
    fn threshold_change_recomputes_proximity() {
        let (mut machine, link) = connected();
        machine.handle(link_event(link, text(r#"{"distance": 12}"#)));
        assert!(!machine.snapshot().proximity.is_near);

        let actions = machine.handle(Input::SetThreshold(15.0));
        assert_eq!(actions.len(), 1);
        let snapshot = published(&actions)[0];
        assert_eq!(snapshot.proximity, ProximityState { is_near: true, tier: Tier::Approaching });
        assert_eq!(snapshot.reading, Some(Reading { distance: 12.0 }));
        assert_eq!(snapshot.connection_state, ConnectionState::Connected);
        assert_eq!(machine.active_link(), Some(link));

        // still near, nothing observable changed
        assert!(machine.handle(Input::SetThreshold(20.0)).is_empty());
        assert!(machine.handle(Input::SetThreshold(20.0)).is_empty());
    }

    #[test]
    fn threshold_change_without_reading_is_silent() {
        let mut machine = machine();
        assert!(machine.handle(Input::SetThreshold(50.0)).is_empty());

        machine.handle(Input::Start);
        let link = machine.active_link().unwrap();
        machine.handle(link_event(link, LinkEvent::Opened));
        let actions = machine.handle(link_event(link, text(r#"{"distance": 30}"#)));
        assert!(published(&actions)[0].proximity.is_near);
    }

    #[test]
    fn endpoint_change_before_start_is_remembered() {
        let mut machine = machine();
        let other = endpoint("ws://esp32.local/ws");

        let actions = machine.handle(Input::SetEndpoint(other.clone()));
        assert_eq!(actions.len(), 1);
        assert_eq!(published(&actions)[0].endpoint, other);

        let actions = machine.handle(Input::Start);
        assert_eq!(actions[0], Action::Open { link: LinkId(1), endpoint: other });
    }
}
