//! JSON-lines feed written to stdout for the presentation process.

use chrono::Utc;
use livecheck_core::LiveUpdate;
use livecheck_protocol::{FeedEvent, FeedNotification, FEED_VERSION};
use std::io::{self, Write};

pub fn feed_event(update: &LiveUpdate) -> FeedEvent {
    FeedEvent {
        feed_version: FEED_VERSION,
        recorded_at: Utc::now().to_rfc3339(),
        state: update.snapshot.state,
        detail_one: update.snapshot.detail_one.clone(),
        detail_two: update.snapshot.detail_two.clone(),
        notification: update
            .notification
            .as_ref()
            .map(|notification| FeedNotification {
                first_observation: notification.first_observation,
                message: notification.message.clone(),
            }),
    }
}

/// Writes one event as a single line and flushes, so a line-buffered reader
/// sees it immediately.
pub fn write_event<W: Write>(writer: &mut W, event: &FeedEvent) -> io::Result<()> {
    let line = serde_json::to_string(event).map_err(io::Error::other)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecheck_core::{LiveSnapshot, LiveState, Notification};
    use livecheck_protocol::parse_feed_event;

    #[test]
    fn feed_line_round_trips_through_protocol_parser() {
        let update = LiveUpdate {
            snapshot: LiveSnapshot::new(
                LiveState::IsoLiveSemiPersistent,
                "<li>/media/usb</li>",
                "<li>none</li>",
            ),
            notification: Some(Notification {
                first_observation: true,
                message: "The system's live state is 'iso-live-semi-persistent'.".to_string(),
            }),
        };

        let mut buffer = Vec::new();
        write_event(&mut buffer, &feed_event(&update)).expect("write");
        let text = String::from_utf8(buffer).expect("utf8");
        assert_eq!(text.matches('\n').count(), 1);

        let parsed = parse_feed_event(&text).expect("parse");
        assert_eq!(parsed.state, LiveState::IsoLiveSemiPersistent);
        assert_eq!(parsed.detail_one, "<li>/media/usb</li>");
        assert_eq!(parsed.detail_two, "<li>none</li>");
        assert!(parsed.notification.is_some_and(|n| n.first_observation));
    }

    #[test]
    fn quiet_updates_omit_notification() {
        let update = LiveUpdate {
            snapshot: LiveSnapshot::bare(LiveState::Persistent),
            notification: None,
        };
        let mut buffer = Vec::new();
        write_event(&mut buffer, &feed_event(&update)).expect("write");
        let text = String::from_utf8(buffer).expect("utf8");
        assert!(!text.contains("notification"));
    }

    #[test]
    fn multiline_probe_output_stays_on_one_line() {
        let update = LiveUpdate {
            snapshot: LiveSnapshot::new(LiveState::ErrorLiveMode, "line one\nline two\n", "2"),
            notification: None,
        };
        let mut buffer = Vec::new();
        write_event(&mut buffer, &feed_event(&update)).expect("write");
        let text = String::from_utf8(buffer).expect("utf8");
        assert_eq!(text.lines().count(), 1);
        assert_eq!(
            parse_feed_event(&text).expect("parse").detail_one,
            "line one\nline two\n"
        );
    }
}
