// Authoritative draft coordinator: the only writer of DraftState.
//
// All state transitions happen synchronously inside a single event-handler
// invocation; the host loop delivers one channel event at a time, so no two
// turn advancements can interleave. Outbound broadcasts accumulate in an
// outbox the host loop drains after each event.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::draft::state::{DraftState, DraftStatus, ParticipantId};
use crate::protocol::ChannelEvent;
use crate::schema::{self, Ability, DRAFT_ROUNDS, FIXED_SKILL, FIXED_SKILL_VALUE, SMALL_GROUP_MAX};
use crate::store::{ActivityLog, DocumentStore, FieldPatch, ParticipantUpdate};

/// Failures of the draft protocol.
///
/// Only [`DraftError::InsufficientParticipants`] aborts an operation the
/// caller initiated. The rest are either tolerated (logged and dropped —
/// stale and duplicate deliveries are expected on an at-least-once channel)
/// or surfaced to the operator without interrupting the draft.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("at least two participants are required to start a draft (got {count})")]
    InsufficientParticipants { count: usize },

    #[error("failed to load the draftable-skill catalog: {0:#}")]
    SchemaLoad(anyhow::Error),

    #[error("pick from {participant_id} out of turn (expected {expected})")]
    OutOfTurnPick {
        participant_id: ParticipantId,
        expected: ParticipantId,
    },

    #[error("skill {skill} is not available this turn")]
    SkillUnavailable { skill: String },

    #[error("no draft is active")]
    DraftNotActive,

    #[error("failed to persist draft results: {0:#}")]
    Persistence(anyhow::Error),
}

/// Runs the allocation protocol on the host client.
///
/// Owns the [`DraftState`] exclusively; participant clients only ever send
/// intent events, never touch the state.
pub struct Coordinator<S, L> {
    state: DraftState,
    store: S,
    log: L,
    /// Display names by participant id, captured at draft start.
    names: HashMap<ParticipantId, String>,
    /// Events awaiting broadcast, in emission order.
    outbox: Vec<ChannelEvent>,
    rng: StdRng,
}

impl<S: DocumentStore, L: ActivityLog> Coordinator<S, L> {
    pub fn new(store: S, log: L) -> Self {
        Self::with_rng(store, log, StdRng::from_os_rng())
    }

    /// Construct with a caller-supplied RNG so starter selection is
    /// reproducible in tests.
    pub fn with_rng(store: S, log: L, rng: StdRng) -> Self {
        Coordinator {
            state: DraftState::new(),
            store,
            log,
            names: HashMap::new(),
            outbox: Vec::new(),
            rng,
        }
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_complete(&self) -> bool {
        self.state.status == DraftStatus::Complete
    }

    /// Drain the pending broadcasts, oldest first.
    pub fn take_outbox(&mut self) -> Vec<ChannelEvent> {
        std::mem::take(&mut self.outbox)
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    /// Handle one event received from the channel. Participant-bound
    /// broadcasts reflected back by the transport are ignored; invalid picks
    /// are dropped with a diagnostic and never answered.
    pub fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::SkillSelected {
                participant_id,
                skill,
            } => {
                if let Err(e) = self.handle_skill_pick(&participant_id, &skill) {
                    warn!("Dropped pick from {participant_id}: {e}");
                }
            }
            ChannelEvent::RequestState { client_id } => {
                self.handle_state_request(&client_id);
            }
            ChannelEvent::DraftStarted { .. }
            | ChannelEvent::DraftStateUpdated { .. }
            | ChannelEvent::DraftClosed => {
                // Host-originated broadcasts; nothing to do on the host side.
            }
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Begin a draft with the given participants.
    ///
    /// Resets all state, seeds every participant with the fixed skill, loads
    /// the draftable catalog, picks the initial round starter, and emits
    /// `DraftStarted` with the snapshot for the first turn. Fails without
    /// mutating anything when fewer than two participants are selected.
    pub fn start_draft(&mut self, participant_ids: Vec<ParticipantId>) -> Result<(), DraftError> {
        if participant_ids.len() < 2 {
            return Err(DraftError::InsufficientParticipants {
                count: participant_ids.len(),
            });
        }

        let mut state = DraftState::new();
        state.participants = participant_ids;
        for id in &state.participants {
            let mut seeded = BTreeMap::new();
            seeded.insert(FIXED_SKILL.to_string(), FIXED_SKILL_VALUE);
            state.assignments.insert(id.clone(), seeded);
        }
        state.all_draftable_skills = match self.store.draftable_skills() {
            Ok(catalog) => catalog,
            Err(e) => {
                let err = DraftError::SchemaLoad(e);
                warn!("{err}; the draft will proceed with an empty skill pool");
                Vec::new()
            }
        };
        self.state = state;

        self.names = match self.store.list_participants() {
            Ok(list) => list.into_iter().map(|p| (p.id, p.name)).collect(),
            Err(e) => {
                warn!("failed to list participant names: {e:#}");
                HashMap::new()
            }
        };

        self.state.status = DraftStatus::Active;
        self.state.round = 1;
        let starter = self.initial_starter();
        self.state.starter_index = starter;
        self.state.current_index = starter;
        self.state.next_index = self.state.step(starter);
        self.state.recompute_available();

        info!(
            "Draft started: {} participants, {} draftable skills",
            self.state.participant_count(),
            self.state.all_draftable_skills.len()
        );
        self.log.append(&format!(
            "Skill draft started with {} participants.",
            self.state.participant_count()
        ));
        self.outbox.push(ChannelEvent::DraftStarted {
            state: self.state.clone(),
        });
        Ok(())
    }

    /// Validate and apply a pick from the channel.
    ///
    /// Out-of-turn picks and picks of unavailable skills are rejected with no
    /// state change and no broadcast; the caller logs and drops them.
    pub fn handle_skill_pick(
        &mut self,
        participant_id: &str,
        skill: &str,
    ) -> Result<(), DraftError> {
        if self.state.status != DraftStatus::Active {
            return Err(DraftError::DraftNotActive);
        }
        let Some(expected) = self.state.current_participant().cloned() else {
            return Err(DraftError::DraftNotActive);
        };
        if participant_id != expected {
            return Err(DraftError::OutOfTurnPick {
                participant_id: participant_id.to_string(),
                expected,
            });
        }
        if !self.state.available_skills.iter().any(|s| s == skill) {
            return Err(DraftError::SkillUnavailable {
                skill: skill.to_string(),
            });
        }
        let Some(pair) = self.state.assign_pair(skill) else {
            // Unreachable while available_skills honors its invariant.
            return Err(DraftError::SkillUnavailable {
                skill: skill.to_string(),
            });
        };

        let label = schema::skill_label(skill);
        self.log.append(&format!(
            "{} chose {label}. The next player receives {label} at {}.",
            self.display_name(&pair.picker),
            -pair.value
        ));

        self.advance_turn();
        Ok(())
    }

    /// Re-send the current snapshot, addressed to one client. Idempotent and
    /// otherwise side-effect-free.
    pub fn handle_state_request(&mut self, client_id: &str) {
        debug!("Re-sending snapshot to client {client_id}");
        self.outbox.push(ChannelEvent::DraftStateUpdated {
            state: self.state.clone(),
            target: Some(client_id.to_string()),
        });
    }

    /// Tear the draft down from the host side. Broadcasts `DraftClosed` so
    /// every mirror closes, regardless of completion state. There is no
    /// pause/resume.
    pub fn close(&mut self) {
        if self.state.status == DraftStatus::Active {
            info!("Draft closed by the host before completion");
        }
        self.outbox.push(ChannelEvent::DraftClosed);
    }

    // ------------------------------------------------------------------
    // Turn and round advancement
    // ------------------------------------------------------------------

    fn advance_turn(&mut self) {
        self.state.current_index = self.state.next_index;
        self.state.next_index = self.state.step(self.state.current_index);

        // The round is complete once the turn cycles back to its starter.
        if self.state.current_index == self.state.starter_index {
            self.state.round += 1;
            if self.state.round > DRAFT_ROUNDS {
                self.finalize_draft();
                return;
            }
            let starter = self.next_round_starter();
            self.state.starter_index = starter;
            self.state.current_index = starter;
            self.state.next_index = self.state.step(starter);
        }

        self.state.recompute_available();
        self.outbox.push(ChannelEvent::DraftStateUpdated {
            state: self.state.clone(),
            target: None,
        });
    }

    fn initial_starter(&mut self) -> usize {
        let n = self.state.participant_count();
        let starter = self.rng.random_range(0..n);
        if n > SMALL_GROUP_MAX {
            self.state.gone_first.insert(starter);
        }
        starter
    }

    /// Starter for the round that just began. Small groups rotate
    /// deterministically from the initial starter so everyone opens a
    /// near-equal share of the five rounds; larger groups draw a random
    /// starter from the indices that have not opened a round yet.
    fn next_round_starter(&mut self) -> usize {
        let n = self.state.participant_count();
        if n <= SMALL_GROUP_MAX {
            return (self.state.starter_index + 1) % n;
        }
        let unused: Vec<usize> = (0..n)
            .filter(|i| !self.state.gone_first.contains(i))
            .collect();
        let starter = if unused.is_empty() {
            // Five rounds cannot exhaust a ring this large; guard anyway.
            self.rng.random_range(0..n)
        } else {
            unused[self.rng.random_range(0..unused.len())]
        };
        self.state.gone_first.insert(starter);
        starter
    }

    // ------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------

    /// Write every signed modifier and the derived ability scores to the
    /// document store in one batch, then close the draft.
    ///
    /// A failed batch write is surfaced to the operator but does not roll
    /// the draft back; the mirrors still receive `DraftClosed`.
    fn finalize_draft(&mut self) {
        self.log
            .append("Applying skill changes to all participants...");
        let updates = finalize_patches(&self.state.assignments);
        if let Err(e) = self.store.apply_batch(&updates) {
            let err = DraftError::Persistence(e);
            error!("{err}");
        }
        self.state.status = DraftStatus::Complete;
        self.outbox.push(ChannelEvent::DraftClosed);
        self.log.append("Skill draft complete.");
        info!("Draft complete after {} rounds", DRAFT_ROUNDS);
    }

    fn display_name<'a>(&'a self, id: &'a ParticipantId) -> &'a str {
        self.names.get(id).map(String::as_str).unwrap_or(id)
    }
}

/// Map final assignments to document-store patches: each signed skill value
/// under its parent ability, plus a derived score per ability equal to the
/// number of that ability's skills with a positive value.
pub fn finalize_patches(
    assignments: &BTreeMap<ParticipantId, BTreeMap<String, i32>>,
) -> Vec<ParticipantUpdate> {
    let mut updates = Vec::with_capacity(assignments.len());
    for (participant_id, skills) in assignments {
        let mut patches = Vec::new();
        let mut positive: BTreeMap<Ability, i64> =
            Ability::ALL.iter().map(|a| (*a, 0)).collect();
        for (skill, value) in skills {
            let Some(def) = schema::skill_def(skill) else {
                warn!("skill {skill} has no ability category; skipping");
                continue;
            };
            patches.push(FieldPatch {
                path: schema::skill_value_path(def),
                value: i64::from(*value),
            });
            if *value > 0 {
                if let Some(count) = positive.get_mut(&def.ability) {
                    *count += 1;
                }
            }
        }
        for ability in Ability::ALL {
            patches.push(FieldPatch {
                path: schema::ability_value_path(ability),
                value: positive[&ability],
            });
        }
        updates.push(ParticipantUpdate {
            participant_id: participant_id.clone(),
            patches,
        });
    }
    updates
}
