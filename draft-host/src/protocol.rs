// Channel event vocabulary shared by the host and participant clients.
//
// Every frame on the broadcast channel is one JSON-encoded `ChannelEvent`.
// The enum is matched exhaustively on both sides, so adding an event type is
// a compile-time-checked change.

use serde::{Deserialize, Serialize};

use crate::draft::state::{DraftState, ParticipantId};

/// Identifier the transport layer assigns to a connected client.
pub type ClientId = String;

/// The complete wire vocabulary of the draft channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// Sent once by the host when a draft begins. The payload is the full
    /// initial snapshot, ready for the first turn.
    DraftStarted { state: DraftState },
    /// Full snapshot after every completed turn or round transition. When
    /// `target` is set, only the named client should apply it; everyone else
    /// ignores the frame.
    DraftStateUpdated {
        state: DraftState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ClientId>,
    },
    /// A participant's pick request. Only the host acts on it; the host is
    /// the sole arbiter of whether the pick is honored.
    SkillSelected {
        participant_id: ParticipantId,
        skill: String,
    },
    /// Ask the host to re-send the current snapshot to one client, e.g.
    /// after a page reload.
    RequestState { client_id: ClientId },
    /// Terminates every participant mirror, whether or not the draft ran to
    /// completion.
    DraftClosed,
}

/// Encode an event as a JSON text frame.
pub fn encode(event: &ChannelEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

/// Decode a JSON text frame. Unknown or malformed frames are errors; callers
/// log and drop them.
pub fn decode(text: &str) -> serde_json::Result<ChannelEvent> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::state::DraftStatus;

    fn sample_state() -> DraftState {
        let mut state = DraftState::new();
        state.participants = vec!["a".to_string(), "b".to_string()];
        state.round = 1;
        state.status = DraftStatus::Active;
        state.all_draftable_skills = vec!["melee".to_string(), "bluff".to_string()];
        state.available_skills = state.all_draftable_skills.clone();
        state
    }

    #[test]
    fn events_roundtrip() {
        let events = vec![
            ChannelEvent::DraftStarted {
                state: sample_state(),
            },
            ChannelEvent::DraftStateUpdated {
                state: sample_state(),
                target: None,
            },
            ChannelEvent::DraftStateUpdated {
                state: sample_state(),
                target: Some("client-7".to_string()),
            },
            ChannelEvent::SkillSelected {
                participant_id: "a".to_string(),
                skill: "melee".to_string(),
            },
            ChannelEvent::RequestState {
                client_id: "client-7".to_string(),
            },
            ChannelEvent::DraftClosed,
        ];
        for event in events {
            let json = encode(&event).unwrap();
            let back = decode(&json).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn frames_carry_snake_case_event_tags() {
        let json = encode(&ChannelEvent::DraftClosed).unwrap();
        assert_eq!(json, r#"{"event":"draft_closed"}"#);

        let json = encode(&ChannelEvent::SkillSelected {
            participant_id: "a".to_string(),
            skill: "melee".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""event":"skill_selected""#));
    }

    #[test]
    fn untargeted_update_omits_target_field() {
        let json = encode(&ChannelEvent::DraftStateUpdated {
            state: sample_state(),
            target: None,
        })
        .unwrap();
        assert!(!json.contains("target"));
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(decode(r#"{"event":"roll_dice"}"#).is_err());
        assert!(decode("not json at all").is_err());
    }
}
