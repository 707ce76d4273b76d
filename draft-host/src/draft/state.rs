// Draft state: turn ring, round bookkeeping, signed skill assignments.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::schema;

/// Identifier of a draft participant (the actor id in the document store).
pub type ParticipantId = String;

/// Lifecycle of a draft session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Pending,
    Active,
    Complete,
}

/// The two halves of a completed pick, written together as one step.
#[derive(Debug, Clone, PartialEq)]
pub struct PairAssignment {
    /// Participant who picked; receives the positive value.
    pub picker: ParticipantId,
    /// Paired participant; receives the negated value.
    pub partner: ParticipantId,
    /// The positive value (equal to the round number).
    pub value: i32,
}

/// The complete state of a skill draft.
///
/// Exclusively owned and mutated by the coordinator; the copies carried by
/// broadcast events are read-only snapshots. Participant order is the turn
/// ring, fixed at draft start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftState {
    /// Participant ids in ring order.
    pub participants: Vec<ParticipantId>,
    /// 1-based allocation round; 0 before the draft starts. The skill value
    /// assigned in round `r` is `r`.
    pub round: u8,
    /// Index of the participant whose turn it is to pick.
    pub current_index: usize,
    /// Index of the participant who receives the paired negative value.
    pub next_index: usize,
    /// Index of the participant who opened the current round. The round is
    /// complete when `current_index` cycles back here.
    pub starter_index: usize,
    /// Indices already used as a round starter. Consulted only by the
    /// randomized starter policy for groups larger than
    /// [`schema::SMALL_GROUP_MAX`].
    pub gone_first: BTreeSet<usize>,
    /// Signed skill values per participant. A skill key, once present in a
    /// participant's map, is never overwritten.
    pub assignments: BTreeMap<ParticipantId, BTreeMap<String, i32>>,
    /// The full draftable catalog, loaded once at draft start.
    pub all_draftable_skills: Vec<String>,
    /// Catalog entries not yet held by the current picker or the paired
    /// participant. Recomputed every turn.
    pub available_skills: Vec<String>,
    pub status: DraftStatus,
}

impl DraftState {
    /// A fresh, pending state with no participants.
    pub fn new() -> Self {
        DraftState {
            participants: Vec::new(),
            round: 0,
            current_index: 0,
            next_index: 0,
            starter_index: 0,
            gone_first: BTreeSet::new(),
            assignments: BTreeMap::new(),
            all_draftable_skills: Vec::new(),
            available_skills: Vec::new(),
            status: DraftStatus::Pending,
        }
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Participant whose turn it is, if the draft has any participants.
    pub fn current_participant(&self) -> Option<&ParticipantId> {
        self.participants.get(self.current_index)
    }

    /// Participant in line for the paired negative value.
    pub fn next_participant(&self) -> Option<&ParticipantId> {
        self.participants.get(self.next_index)
    }

    /// One step around the ring from `index`, in the current round's
    /// direction: odd rounds move backward, even rounds forward. The pairing
    /// partner therefore differs between consecutive rounds.
    pub fn step(&self, index: usize) -> usize {
        let n = self.participants.len();
        if n == 0 {
            return index;
        }
        if self.round % 2 == 0 {
            (index + 1) % n
        } else {
            (index + n - 1) % n
        }
    }

    /// Whether `skill` is already recorded for `participant`.
    pub fn is_assigned(&self, participant: &str, skill: &str) -> bool {
        self.assignments
            .get(participant)
            .is_some_and(|skills| skills.contains_key(skill))
    }

    /// Record the signed pair for the current turn: `+round` to the current
    /// picker, `-round` to the next participant. Both writes happen or
    /// neither does; returns `None` (and records nothing) if either side
    /// already holds the skill.
    pub fn assign_pair(&mut self, skill: &str) -> Option<PairAssignment> {
        let picker = self.current_participant()?.clone();
        let partner = self.next_participant()?.clone();
        if picker == partner {
            warn!("current and next participant coincide; dropping pick of {skill}");
            return None;
        }
        if self.is_assigned(&picker, skill) || self.is_assigned(&partner, skill) {
            warn!("refusing to reassign skill {skill} for {picker}/{partner}");
            return None;
        }
        let value = i32::from(self.round);
        self.assignments
            .entry(picker.clone())
            .or_default()
            .insert(skill.to_string(), value);
        self.assignments
            .entry(partner.clone())
            .or_default()
            .insert(skill.to_string(), -value);
        Some(PairAssignment {
            picker,
            partner,
            value,
        })
    }

    /// Rebuild `available_skills`: catalog entries held by neither the
    /// current picker nor the next participant.
    pub fn recompute_available(&mut self) {
        let current = self.current_participant().cloned();
        let next = self.next_participant().cloned();
        let mut available = Vec::new();
        for skill in &self.all_draftable_skills {
            let held_by_current = current
                .as_deref()
                .is_some_and(|id| self.is_assigned(id, skill));
            let held_by_next = next
                .as_deref()
                .is_some_and(|id| self.is_assigned(id, skill));
            if !held_by_current && !held_by_next {
                available.push(skill.clone());
            }
        }
        self.available_skills = available;
    }
}

impl Default for DraftState {
    fn default() -> Self {
        Self::new()
    }
}
