//! The per-key Acceptor, Proposer and Learner role state machines that make
//! up a single instance of basic Paxos. A replica (see `replica`) keeps one
//! triple of these per key, materialized lazily on first touch.
use std::collections::{HashMap, HashSet};

use crate::wire::{Accept, Learn, Prepare, Prepared};
use crate::{Pid, Round, Value};

/// Sentinel round meaning "no round yet", carried through from the
/// reference implementation rather than modeled as `Option<Round>`
/// everywhere: comparisons like `round >= promised_round` need to work
/// uniformly whether or not a round has ever been seen.
pub const NO_ROUND: Round = -1;

/// The state an acceptor keeps for one Paxos instance (§3, §4.A).
///
/// Invariant: `voted_round <= promised_round`, and once `voted_round` is set
/// for round r, `promised_round` never again falls below r (rounds only
/// move forward).
#[derive(Debug, Clone)]
pub struct AcceptorState {
    promised_round: Round,
    voted_round: Round,
    voted_value: Option<Value>,
}

impl Default for AcceptorState {
    fn default() -> Self {
        AcceptorState {
            promised_round: NO_ROUND,
            voted_round: NO_ROUND,
            voted_value: None,
        }
    }
}

impl AcceptorState {
    /// `round >= promised_round`, not `>`: a retransmitted Prepare for a
    /// round this acceptor already promised must still succeed (§4.A, §9).
    pub fn on_prepare(&mut self, from: Pid, round: Round) -> Option<Prepared> {
        if round < self.promised_round {
            return None;
        }
        self.promised_round = round;
        Some(Prepared {
            voter: from,
            round,
            voted_round: self.voted_round,
            voted_value: self.voted_value.clone(),
        })
    }

    pub fn on_accept(&mut self, round: Round, proposed_round: Round, value: Value, learners: &[Pid]) -> Vec<Learn> {
        if round < self.promised_round {
            return Vec::new();
        }
        self.voted_round = round;
        self.voted_value = Some(value.clone());
        learners
            .iter()
            .map(|&learner| Learn {
                learner,
                round,
                proposed_round,
                value: value.clone(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn promised_round(&self) -> Round {
        self.promised_round
    }
}

/// Bookkeeping a proposer keeps for one instance while it drives the
/// prepare/accept phases (§3, §4.B). Reset on every fresh `on_propose`;
/// `prepared` is cleared right after a fan-out so that fan-out happens at
/// most once per (key, round).
#[derive(Debug, Clone, Default)]
pub struct ProposerState {
    current_round: Round,
    current_value: Option<Value>,
    prepared: HashMap<Pid, (Round, Option<Value>)>,
}

impl ProposerState {
    pub fn on_propose(&mut self, round: Round, value: Value, acceptors: &[Pid]) -> Vec<Prepare> {
        self.current_round = round;
        self.current_value = Some(value);
        self.prepared.clear();
        acceptors.iter().map(|&acceptor| Prepare { acceptor, round }).collect()
    }

    /// Ignores replies for any round other than the one currently in
    /// flight; a late reply from a superseded round is a normal protocol
    /// no-op (§7), not an error.
    pub fn on_prepared(
        &mut self,
        from: Pid,
        round: Round,
        voted_round: Round,
        voted_value: Option<Value>,
        majority: usize,
    ) -> Vec<Accept> {
        if round != self.current_round {
            return Vec::new();
        }
        self.prepared.insert(from, (voted_round, voted_value));

        if self.prepared.len() < majority {
            return Vec::new();
        }

        let mut highest_round = NO_ROUND;
        for (voted_round, voted_value) in self.prepared.values() {
            if *voted_round > highest_round {
                highest_round = *voted_round;
                self.current_value = voted_value.clone();
            }
        }
        let proposed_round = if highest_round != NO_ROUND { highest_round } else { self.current_round };

        let accepts = self
            .prepared
            .keys()
            .map(|&acceptor| Accept {
                acceptor,
                round: self.current_round,
                proposed_round,
                value: self.current_value.clone().expect("current_value set by on_propose before any Accept fan-out"),
            })
            .collect();

        self.prepared.clear();
        accepts
    }
}

/// Quorum accumulator and chosen-value memory for one instance (§3, §4.C).
#[derive(Debug, Clone, Default)]
pub struct LearnerState {
    accepted: HashMap<Round, HashSet<(Pid, Value)>>,
    chosen_value: Option<Value>,
    chosen_round: Option<Round>,
}

impl LearnerState {
    pub fn chosen_value(&self) -> Option<&Value> {
        self.chosen_value.as_ref()
    }

    pub fn chosen_round(&self) -> Option<Round> {
        self.chosen_round
    }

    /// Idempotent: re-observing the same value for a round already chosen
    /// is a no-op. Safety (§3, §8 invariant 1/3) means a *different* value
    /// for an already-chosen key can never legitimately arrive here; if it
    /// does, the underlying Paxos run has a bug, so we fail loudly rather
    /// than silently overwrite.
    pub fn on_learn(&mut self, from: Pid, round: Round, proposed_round: Round, value: Value, majority: usize) {
        let votes = self.accepted.entry(round).or_default();
        votes.insert((from, value.clone()));

        if votes.len() < majority {
            return;
        }

        match &self.chosen_value {
            Some(existing) => {
                debug_assert_eq!(
                    *existing, value,
                    "safety violation: learner re-chose a different value for the same key"
                );
            }
            None => {
                self.chosen_value = Some(value);
                self.chosen_round = Some(proposed_round);
            }
        }
    }
}

/// The three role states a replica keeps for a single key, materialized
/// lazily via `HashMap::entry(key).or_default()` (§9 "Per-key role
/// instantiation").
#[derive(Debug, Clone, Default)]
pub struct RoleTriple {
    pub proposer: ProposerState,
    pub acceptor: AcceptorState,
    pub learner: LearnerState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptor_accepts_retransmitted_prepare_at_same_round() {
        let mut a = AcceptorState::default();
        assert!(a.on_prepare(1, 5).is_some());
        assert_eq!(a.promised_round(), 5);
        // Same round again (retransmission): must still succeed, per the >= rule.
        assert!(a.on_prepare(1, 5).is_some());
        // Stale round: must be rejected.
        assert!(a.on_prepare(1, 4).is_none());
    }

    #[test]
    fn acceptor_rejects_accept_below_promise() {
        let mut a = AcceptorState::default();
        a.on_prepare(1, 10);
        let learns = a.on_accept(9, 9, "v".to_string(), &[1, 2]);
        assert!(learns.is_empty());
        let learns = a.on_accept(10, 10, "v".to_string(), &[1, 2]);
        assert_eq!(learns.len(), 2);
    }

    #[test]
    fn proposer_adopts_highest_voted_value_on_quorum() {
        let mut p = ProposerState::default();
        p.on_propose(7, "mine".to_string(), &[1, 2, 3]);
        let accepts = p.on_prepared(1, 7, 3, Some("theirs".to_string()), 2);
        assert!(accepts.is_empty());
        let accepts = p.on_prepared(2, 7, NO_ROUND, None, 2);
        assert_eq!(accepts.len(), 2);
        assert!(accepts.iter().all(|a| a.value == "theirs"));
        assert!(accepts.iter().all(|a| a.proposed_round == 3));
    }

    #[test]
    fn proposer_fans_out_at_most_once_per_round() {
        let mut p = ProposerState::default();
        p.on_propose(1, "v".to_string(), &[1, 2]);
        let first = p.on_prepared(1, 1, NO_ROUND, None, 2);
        assert_eq!(first.len(), 0);
        let second = p.on_prepared(2, 1, NO_ROUND, None, 2);
        assert_eq!(second.len(), 2);
        // prepared was cleared: replaying acceptor 2's reply no longer reaches quorum alone.
        let third = p.on_prepared(2, 1, NO_ROUND, None, 2);
        assert!(third.is_empty());
    }

    #[test]
    fn learner_reaches_quorum_and_is_idempotent() {
        let mut l = LearnerState::default();
        l.on_learn(1, 1, 1, "v".to_string(), 2);
        assert!(l.chosen_value().is_none());
        l.on_learn(2, 1, 1, "v".to_string(), 2);
        assert_eq!(l.chosen_value(), Some(&"v".to_string()));
        assert_eq!(l.chosen_round(), Some(1));
        // Re-observing the same value is a no-op, not a panic.
        l.on_learn(3, 1, 1, "v".to_string(), 2);
        assert_eq!(l.chosen_value(), Some(&"v".to_string()));
    }
}
