// Participant-side mirror: a read-only copy of the host's last snapshot.
//
// The mirror never mutates shared state. It filters broadcasts down to the
// ones addressed to it, answers "is it my turn", and builds the two events a
// participant may send. The host remains the sole arbiter of every pick; the
// local turn check only saves a round trip.

use crate::draft::state::{DraftState, DraftStatus, ParticipantId};
use crate::protocol::{ChannelEvent, ClientId};

/// Thin state mirror run on a participant client.
#[derive(Debug, Clone)]
pub struct ParticipantMirror {
    participant_id: ParticipantId,
    client_id: ClientId,
    snapshot: Option<DraftState>,
}

impl ParticipantMirror {
    pub fn new(participant_id: impl Into<ParticipantId>, client_id: impl Into<ClientId>) -> Self {
        ParticipantMirror {
            participant_id: participant_id.into(),
            client_id: client_id.into(),
            snapshot: None,
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// The last accepted snapshot, if any.
    pub fn snapshot(&self) -> Option<&DraftState> {
        self.snapshot.as_ref()
    }

    /// Apply one channel event. Returns `true` when the local snapshot
    /// changed (i.e. a view would re-render).
    pub fn handle_event(&mut self, event: &ChannelEvent) -> bool {
        match event {
            ChannelEvent::DraftStarted { state } => self.accept(state),
            ChannelEvent::DraftStateUpdated { state, target } => {
                if target.as_ref().is_some_and(|t| t != &self.client_id) {
                    return false;
                }
                self.accept(state)
            }
            ChannelEvent::DraftClosed => {
                let had_snapshot = self.snapshot.is_some();
                self.snapshot = None;
                had_snapshot
            }
            // Host-bound traffic from other participants.
            ChannelEvent::SkillSelected { .. } | ChannelEvent::RequestState { .. } => false,
        }
    }

    fn accept(&mut self, state: &DraftState) -> bool {
        if !state.participants.contains(&self.participant_id) {
            return false;
        }
        self.snapshot = Some(state.clone());
        true
    }

    /// Whether the mirror believes it is this participant's turn to pick.
    pub fn is_my_turn(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|state| {
            state.status == DraftStatus::Active
                && state.current_participant() == Some(&self.participant_id)
        })
    }

    /// Build a pick request for `skill`, or `None` when it is not this
    /// participant's turn or the skill is not on offer.
    pub fn select_skill(&self, skill: &str) -> Option<ChannelEvent> {
        if !self.is_my_turn() {
            return None;
        }
        let state = self.snapshot.as_ref()?;
        if !state.available_skills.iter().any(|s| s == skill) {
            return None;
        }
        Some(ChannelEvent::SkillSelected {
            participant_id: self.participant_id.clone(),
            skill: skill.to_string(),
        })
    }

    /// Ask the host for a fresh snapshot (e.g. after a reload).
    pub fn request_state(&self) -> ChannelEvent {
        ChannelEvent::RequestState {
            client_id: self.client_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(participants: &[&str], current: usize) -> DraftState {
        let mut state = DraftState::new();
        state.participants = participants.iter().map(|p| p.to_string()).collect();
        state.round = 1;
        state.current_index = current;
        state.next_index = state.step(current);
        state.status = DraftStatus::Active;
        state.all_draftable_skills = vec!["melee".to_string(), "bluff".to_string()];
        state.available_skills = state.all_draftable_skills.clone();
        state
    }

    #[test]
    fn ignores_drafts_it_is_not_part_of() {
        let mut mirror = ParticipantMirror::new("outsider", "c1");
        let changed = mirror.handle_event(&ChannelEvent::DraftStarted {
            state: snapshot(&["a", "b"], 0),
        });
        assert!(!changed);
        assert!(mirror.snapshot().is_none());
    }

    #[test]
    fn applies_broadcasts_and_targeted_updates_for_itself() {
        let mut mirror = ParticipantMirror::new("a", "c1");
        assert!(mirror.handle_event(&ChannelEvent::DraftStarted {
            state: snapshot(&["a", "b"], 0),
        }));

        // Untargeted update applies.
        assert!(mirror.handle_event(&ChannelEvent::DraftStateUpdated {
            state: snapshot(&["a", "b"], 1),
            target: None,
        }));
        assert_eq!(mirror.snapshot().unwrap().current_index, 1);

        // Update targeted at another client is ignored.
        assert!(!mirror.handle_event(&ChannelEvent::DraftStateUpdated {
            state: snapshot(&["a", "b"], 0),
            target: Some("someone-else".to_string()),
        }));
        assert_eq!(mirror.snapshot().unwrap().current_index, 1);

        // Update targeted at this client applies.
        assert!(mirror.handle_event(&ChannelEvent::DraftStateUpdated {
            state: snapshot(&["a", "b"], 0),
            target: Some("c1".to_string()),
        }));
        assert_eq!(mirror.snapshot().unwrap().current_index, 0);
    }

    #[test]
    fn draft_closed_clears_the_mirror() {
        let mut mirror = ParticipantMirror::new("a", "c1");
        mirror.handle_event(&ChannelEvent::DraftStarted {
            state: snapshot(&["a", "b"], 0),
        });
        assert!(mirror.handle_event(&ChannelEvent::DraftClosed));
        assert!(mirror.snapshot().is_none());
        // Closing twice is a no-op.
        assert!(!mirror.handle_event(&ChannelEvent::DraftClosed));
    }

    #[test]
    fn select_skill_gates_on_turn_and_availability() {
        let mut mirror = ParticipantMirror::new("b", "c2");
        mirror.handle_event(&ChannelEvent::DraftStarted {
            state: snapshot(&["a", "b"], 0),
        });

        // Not b's turn yet.
        assert!(!mirror.is_my_turn());
        assert!(mirror.select_skill("melee").is_none());

        mirror.handle_event(&ChannelEvent::DraftStateUpdated {
            state: snapshot(&["a", "b"], 1),
            target: None,
        });
        assert!(mirror.is_my_turn());
        assert!(mirror.select_skill("juggling").is_none());
        assert_eq!(
            mirror.select_skill("melee"),
            Some(ChannelEvent::SkillSelected {
                participant_id: "b".to_string(),
                skill: "melee".to_string(),
            })
        );
    }

    #[test]
    fn request_state_names_the_client() {
        let mirror = ParticipantMirror::new("a", "c1");
        assert_eq!(
            mirror.request_state(),
            ChannelEvent::RequestState {
                client_id: "c1".to_string(),
            }
        );
    }

    #[test]
    fn participant_events_from_others_are_ignored() {
        let mut mirror = ParticipantMirror::new("a", "c1");
        assert!(!mirror.handle_event(&ChannelEvent::SkillSelected {
            participant_id: "b".to_string(),
            skill: "melee".to_string(),
        }));
        assert!(!mirror.handle_event(&ChannelEvent::RequestState {
            client_id: "c9".to_string(),
        }));
    }
}
