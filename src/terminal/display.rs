use crate::device::types::{Reading, Snapshot};
use crate::proximity::{NearEdge, Tier};

pub struct TierMessage {
    pub message: &'static str,
    pub detail: &'static str,
}

pub fn tier_message(tier: Tier) -> TierMessage {
    match tier {
        Tier::Unknown => TierMessage {
            message: "Waiting for something to measure...",
            detail: "I'm waiting for something to get closer...",
        },
        Tier::Critical => TierMessage {
            message: "Whoa! Too close for comfort! 😱",
            detail: "Whoa! That's super close! Back up a bit!",
        },
        Tier::Close => TierMessage {
            message: "Hey there, personal space invader! 👋",
            detail: "You're getting pretty close now!",
        },
        Tier::Approaching => TierMessage {
            message: "Getting closer... I can feel it! 🤗",
            detail: "Keep coming closer if you'd like!",
        },
        Tier::Visible => TierMessage {
            message: "I see you over there! Come closer! 👀",
            detail: "You're at a good distance, but you can come closer!",
        },
        Tier::Far => TierMessage {
            message: "Where did everybody go? I'm lonely... 🥺",
            detail: "I can't detect anything nearby. Move something closer!",
        },
    }
}

pub fn format_distance(reading: Option<Reading>) -> String {
    match reading {
        Some(Reading { distance }) => format!("{:.1} cm", distance),
        None => String::from("--"),
    }
}

pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let message = tier_message(snapshot.proximity.tier);

    format!(
        "[{}] {} | {} {}",
        snapshot.connection_state,
        format_distance(snapshot.reading),
        message.message,
        message.detail,
    )
}

pub fn format_edge(edge: NearEdge) -> &'static str {
    match edge {
        NearEdge::Entered => ">>> Something is nearby!",
        NearEdge::Left => "<<< All clear.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::endpoint::Endpoint;
    use crate::device::types::ConnectionState;
    use crate::proximity::update;

    #[test]
    fn formats_distance_with_one_decimal() {
        assert_eq!(format_distance(Some(Reading { distance: 3.24 })), "3.2 cm");
        assert_eq!(format_distance(None), "--");
    }

    #[test]
    fn formats_connected_snapshot() {
        let reading = Some(Reading { distance: 42.0 });
        let snapshot = Snapshot {
            connection_state: ConnectionState::Connected,
            endpoint: Endpoint::parse("ws://192.168.1.70/ws").unwrap(),
            reading,
            proximity: update(reading, 10.0),
        };

        assert_eq!(
            format_snapshot(&snapshot),
            "[Connected] 42.0 cm | I see you over there! Come closer! 👀 You're at a good distance, but you can come closer!",
        );
    }

    #[test]
    fn formats_waiting_snapshot() {
        let snapshot = Snapshot {
            connection_state: ConnectionState::Error,
            endpoint: Endpoint::parse("ws://192.168.1.70/ws").unwrap(),
            reading: None,
            proximity: update(None, 10.0),
        };

        assert!(format_snapshot(&snapshot).starts_with("[Connection error] -- | Waiting for something to measure..."));
    }
}
