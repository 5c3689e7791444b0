//! Pure Raft state machine: no IO, no clocks, no randomness. The caller
//! (typically [`super::node::RaftNode`]) owns the timers and feeds their
//! firing in as `on_election_timeout`/`on_heartbeat_timeout` calls, and
//! feeds inbound peer messages in via `handle_message`. Every call returns
//! the `Effect`s the caller must carry out (send a message, apply a
//! committed entry, persist term/vote) — the state machine itself never
//! reaches outside of its own fields.

use super::RaftNodeId;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
    Learner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub term: u64,
    pub index: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    RequestVote { term: u64, candidate_id: RaftNodeId, last_log_index: u64, last_log_term: u64 },
    RequestVoteResponse { term: u64, vote_granted: bool, voter: RaftNodeId },
    AppendEntries {
        term: u64,
        leader_id: RaftNodeId,
        prev_log_index: u64,
        prev_log_term: u64,
        entries: Vec<LogEntry>,
        leader_commit: u64,
    },
    AppendEntriesResponse { term: u64, success: bool, match_index: u64, responder: RaftNodeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send { to: RaftNodeId, message: Message },
    Apply { index: u64, payload: Vec<u8> },
    PersistHardState { term: u64, voted_for: Option<RaftNodeId> },
    BecameLeader,
    SteppedDown,
}

#[derive(Debug, Clone)]
pub struct Membership {
    pub voters: HashSet<RaftNodeId>,
    pub learners: HashSet<RaftNodeId>,
}

impl Membership {
    pub fn new(voters: impl IntoIterator<Item = RaftNodeId>, learners: impl IntoIterator<Item = RaftNodeId>) -> Self {
        Self { voters: voters.into_iter().collect(), learners: learners.into_iter().collect() }
    }

    fn quorum_size(&self) -> usize {
        self.voters.len() / 2 + 1
    }
}

/// One partition's consensus state. `id` is this replica's node id within
/// the group; `self_learner` marks a learner replica, which never
/// participates in elections or is counted toward quorum.
pub struct RaftState {
    pub id: RaftNodeId,
    role: Role,
    current_term: u64,
    voted_for: Option<RaftNodeId>,
    log: Vec<LogEntry>,
    commit_index: u64,
    last_applied: u64,
    membership: Membership,
    max_batch_size: usize,

    // Candidate-only.
    votes_received: HashSet<RaftNodeId>,

    // Leader-only.
    next_index: HashMap<RaftNodeId, u64>,
    match_index: HashMap<RaftNodeId, u64>,
    /// Ticks elapsed since the leader last heard a successful response from
    /// a quorum; reset on every quorum-confirming `AppendEntriesResponse`.
    /// The driver steps the leader down once this exceeds
    /// `expired_time_factor` heartbeat intervals with no quorum contact.
    ticks_since_quorum_contact: u32,
}

impl RaftState {
    pub fn new(id: RaftNodeId, membership: Membership, max_batch_size: usize) -> Self {
        let role = if membership.learners.contains(&id) { Role::Learner } else { Role::Follower };
        Self {
            id,
            role,
            current_term: 0,
            voted_for: None,
            log: Vec::new(),
            commit_index: 0,
            last_applied: 0,
            membership,
            max_batch_size,
            votes_received: HashSet::new(),
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            ticks_since_quorum_contact: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn commit_index(&self) -> u64 {
        self.commit_index
    }

    pub fn last_log_index(&self) -> u64 {
        self.log.last().map(|e| e.index).unwrap_or(0)
    }

    /// Entries with `index >= from_index`, in order. Used by the driver to
    /// know which entries still need persisting to the WAL.
    pub fn entries_from(&self, from_index: u64) -> Vec<LogEntry> {
        self.log.iter().filter(|e| e.index >= from_index).cloned().collect()
    }

    fn last_log_term(&self) -> u64 {
        self.log.last().map(|e| e.term).unwrap_or(0)
    }

    fn entry_term(&self, index: u64) -> Option<u64> {
        if index == 0 {
            return Some(0);
        }
        self.log.iter().find(|e| e.index == index).map(|e| e.term)
    }

    fn peers(&self) -> Vec<RaftNodeId> {
        self.membership
            .voters
            .iter()
            .chain(self.membership.learners.iter())
            .filter(|&&p| p != self.id)
            .copied()
            .collect()
    }

    /// Randomized election timeout firing: followers and candidates become
    /// (or remain) candidates, bump their term, vote for themselves, and
    /// broadcast `RequestVote` to every voter. Learners never do this.
    pub fn on_election_timeout(&mut self) -> Vec<Effect> {
        if self.role == Role::Learner || self.role == Role::Leader {
            return Vec::new();
        }
        self.current_term += 1;
        self.role = Role::Candidate;
        self.voted_for = Some(self.id);
        self.votes_received = HashSet::from([self.id]);

        let mut effects = vec![Effect::PersistHardState { term: self.current_term, voted_for: self.voted_for }];
        for &voter in self.membership.voters.iter().filter(|&&v| v != self.id) {
            effects.push(Effect::Send {
                to: voter,
                message: Message::RequestVote {
                    term: self.current_term,
                    candidate_id: self.id,
                    last_log_index: self.last_log_index(),
                    last_log_term: self.last_log_term(),
                },
            });
        }
        // Single-voter clusters self-elect immediately.
        effects.extend(self.maybe_become_leader());
        effects
    }

    fn maybe_become_leader(&mut self) -> Vec<Effect> {
        if self.role != Role::Candidate {
            return Vec::new();
        }
        if self.votes_received.len() < self.membership.quorum_size() {
            return Vec::new();
        }
        self.role = Role::Leader;
        self.ticks_since_quorum_contact = 0;
        let next = self.last_log_index() + 1;
        self.next_index = self.peers().into_iter().map(|p| (p, next)).collect();
        self.match_index = self.peers().into_iter().map(|p| (p, 0)).collect();
        vec![Effect::BecameLeader]
    }

    /// Leader heartbeat firing: send `AppendEntries` (batched up to
    /// `max_batch_size` entries) to every peer. Also used to push fresh
    /// writes out immediately after `propose`.
    pub fn on_heartbeat_timeout(&mut self) -> Vec<Effect> {
        if self.role != Role::Leader {
            return Vec::new();
        }
        self.peers().into_iter().map(|peer| self.append_entries_effect(peer)).collect()
    }

    fn append_entries_effect(&self, peer: RaftNodeId) -> Effect {
        let next = *self.next_index.get(&peer).unwrap_or(&(self.last_log_index() + 1));
        let prev_log_index = next.saturating_sub(1);
        let prev_log_term = self.entry_term(prev_log_index).unwrap_or(0);
        let entries: Vec<LogEntry> = self
            .log
            .iter()
            .filter(|e| e.index >= next)
            .take(self.max_batch_size)
            .cloned()
            .collect();
        Effect::Send {
            to: peer,
            message: Message::AppendEntries {
                term: self.current_term,
                leader_id: self.id,
                prev_log_index,
                prev_log_term,
                entries,
                leader_commit: self.commit_index,
            },
        }
    }

    /// Leader-only: appends `payload` to the local log at the next index.
    /// Returns the assigned index; replication to peers happens on the
    /// next heartbeat tick.
    pub fn propose(&mut self, payload: Vec<u8>) -> Option<u64> {
        if self.role != Role::Leader {
            return None;
        }
        let index = self.last_log_index() + 1;
        self.log.push(LogEntry { term: self.current_term, index, payload });
        Some(index)
    }

    fn step_down_if_stale(&mut self, term: u64) -> Vec<Effect> {
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
            let was_leader = self.role == Role::Leader;
            if self.role != Role::Learner {
                self.role = Role::Follower;
            }
            self.votes_received.clear();
            let mut effects = vec![Effect::PersistHardState { term: self.current_term, voted_for: None }];
            if was_leader {
                effects.push(Effect::SteppedDown);
            }
            return effects;
        }
        Vec::new()
    }

    /// Called by the driver when the leader has gone `expired_time_factor`
    /// heartbeat intervals without a quorum-confirming response; steps down
    /// to follower so a fresher leader can be elected.
    pub fn force_step_down(&mut self) -> Vec<Effect> {
        if self.role != Role::Leader {
            return Vec::new();
        }
        self.role = Role::Follower;
        self.votes_received.clear();
        vec![Effect::SteppedDown]
    }

    pub fn handle_message(&mut self, message: Message) -> Vec<Effect> {
        match message {
            Message::RequestVote { term, candidate_id, last_log_index, last_log_term } => {
                self.handle_request_vote(term, candidate_id, last_log_index, last_log_term)
            }
            Message::RequestVoteResponse { term, vote_granted, voter } => {
                self.handle_request_vote_response(term, vote_granted, voter)
            }
            Message::AppendEntries { term, leader_id, prev_log_index, prev_log_term, entries, leader_commit } => {
                self.handle_append_entries(term, leader_id, prev_log_index, prev_log_term, entries, leader_commit)
            }
            Message::AppendEntriesResponse { term, success, match_index, responder } => {
                self.handle_append_entries_response(term, success, match_index, responder)
            }
        }
    }

    fn handle_request_vote(
        &mut self,
        term: u64,
        candidate_id: RaftNodeId,
        last_log_index: u64,
        last_log_term: u64,
    ) -> Vec<Effect> {
        let mut effects = self.step_down_if_stale(term);

        let up_to_date = (last_log_term, last_log_index) >= (self.last_log_term(), self.last_log_index());
        let can_vote = self.voted_for.is_none() || self.voted_for == Some(candidate_id);
        let grant = term >= self.current_term && can_vote && up_to_date && self.role != Role::Learner;

        if grant {
            self.voted_for = Some(candidate_id);
            effects.push(Effect::PersistHardState { term: self.current_term, voted_for: self.voted_for });
        }
        effects.push(Effect::Send {
            to: candidate_id,
            message: Message::RequestVoteResponse { term: self.current_term, vote_granted: grant, voter: self.id },
        });
        effects
    }

    fn handle_request_vote_response(&mut self, term: u64, vote_granted: bool, voter: RaftNodeId) -> Vec<Effect> {
        let mut effects = self.step_down_if_stale(term);
        if self.role != Role::Candidate || term != self.current_term || !vote_granted {
            return effects;
        }
        self.votes_received.insert(voter);
        effects.extend(self.maybe_become_leader());
        effects
    }

    fn handle_append_entries(
        &mut self,
        term: u64,
        leader_id: RaftNodeId,
        prev_log_index: u64,
        prev_log_term: u64,
        entries: Vec<LogEntry>,
        leader_commit: u64,
    ) -> Vec<Effect> {
        let mut effects = self.step_down_if_stale(term);

        if term < self.current_term {
            effects.push(Effect::Send {
                to: leader_id,
                message: Message::AppendEntriesResponse {
                    term: self.current_term,
                    success: false,
                    match_index: 0,
                    responder: self.id,
                },
            });
            return effects;
        }
        // A valid leader for our term resets our election clock (handled by
        // the driver observing this call) and keeps us a follower/learner.
        if self.role == Role::Candidate {
            self.role = Role::Follower;
        }

        let log_ok = self.entry_term(prev_log_index) == Some(prev_log_term);
        if !log_ok {
            effects.push(Effect::Send {
                to: leader_id,
                message: Message::AppendEntriesResponse {
                    term: self.current_term,
                    success: false,
                    match_index: 0,
                    responder: self.id,
                },
            });
            return effects;
        }

        self.log.retain(|e| e.index <= prev_log_index);
        for entry in entries {
            self.log.push(entry);
        }
        let new_last = self.last_log_index();
        if leader_commit > self.commit_index {
            self.commit_index = leader_commit.min(new_last);
            effects.extend(self.apply_committed());
        }

        effects.push(Effect::Send {
            to: leader_id,
            message: Message::AppendEntriesResponse {
                term: self.current_term,
                success: true,
                match_index: new_last,
                responder: self.id,
            },
        });
        effects
    }

    fn handle_append_entries_response(
        &mut self,
        term: u64,
        success: bool,
        match_index: u64,
        responder: RaftNodeId,
    ) -> Vec<Effect> {
        let mut effects = self.step_down_if_stale(term);
        if self.role != Role::Leader || term != self.current_term {
            return effects;
        }

        if !success {
            let next = self.next_index.entry(responder).or_insert(1);
            *next = next.saturating_sub(1).max(1);
            return effects;
        }

        self.match_index.insert(responder, match_index);
        self.next_index.insert(responder, match_index + 1);
        self.ticks_since_quorum_contact = 0;

        // Advance commit_index to the highest index replicated to a
        // majority of voters (classic Raft commit rule), but only count
        // entries from the current term toward commitment.
        let quorum = self.membership.quorum_size();
        let mut indices: Vec<u64> = self
            .membership
            .voters
            .iter()
            .map(|v| if *v == self.id { self.last_log_index() } else { *self.match_index.get(v).unwrap_or(&0) })
            .collect();
        indices.sort_unstable();
        let candidate_commit = indices[indices.len().saturating_sub(quorum)];
        if candidate_commit > self.commit_index && self.entry_term(candidate_commit) == Some(self.current_term) {
            self.commit_index = candidate_commit;
            effects.extend(self.apply_committed());
        }
        effects
    }

    fn apply_committed(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        while self.last_applied < self.commit_index {
            self.last_applied += 1;
            if let Some(entry) = self.log.iter().find(|e| e.index == self.last_applied) {
                effects.push(Effect::Apply { index: entry.index, payload: entry.payload.clone() });
            }
        }
        effects
    }

    /// Heartbeat contact tick, called once per heartbeat interval by the
    /// driver regardless of role; used only to drive the leader's own
    /// lost-quorum countdown.
    pub fn note_heartbeat_tick(&mut self) {
        if self.role == Role::Leader {
            self.ticks_since_quorum_contact += 1;
        }
    }

    pub fn ticks_since_quorum_contact(&self) -> u32 {
        self.ticks_since_quorum_contact
    }

    /// One-at-a-time membership change: adds a non-voting learner that
    /// receives `AppendEntries` like any peer but is never counted for
    /// quorum or elections until promoted.
    pub fn add_learner(&mut self, node_id: RaftNodeId) {
        self.membership.learners.insert(node_id);
        self.next_index.entry(node_id).or_insert_with(|| self.last_log_index() + 1);
        self.match_index.entry(node_id).or_insert(0);
    }

    /// Promotes a caught-up learner (`match_index >= commit_index`) to
    /// full voter. Rejects the promotion otherwise so a lagging learner
    /// never briefly halves the effective quorum.
    pub fn promote_learner(&mut self, node_id: RaftNodeId) -> bool {
        if !self.membership.learners.contains(&node_id) {
            return false;
        }
        let caught_up = self.match_index.get(&node_id).copied().unwrap_or(0) >= self.commit_index;
        if !caught_up {
            return false;
        }
        self.membership.learners.remove(&node_id);
        self.membership.voters.insert(node_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: RaftNodeId, voters: &[RaftNodeId]) -> RaftState {
        RaftState::new(id, Membership::new(voters.iter().copied(), []), 300)
    }

    #[test]
    fn single_voter_self_elects_immediately() {
        let mut s = state(1, &[1]);
        let effects = s.on_election_timeout();
        assert_eq!(s.role(), Role::Leader);
        assert!(effects.contains(&Effect::BecameLeader));
    }

    #[test]
    fn candidate_needs_majority_before_becoming_leader() {
        let mut s = state(1, &[1, 2, 3]);
        s.on_election_timeout();
        assert_eq!(s.role(), Role::Candidate);

        let effects = s.handle_message(Message::RequestVoteResponse { term: 1, vote_granted: true, voter: 2 });
        assert_eq!(s.role(), Role::Leader);
        assert!(effects.contains(&Effect::BecameLeader));
    }

    #[test]
    fn stale_term_request_vote_is_rejected() {
        let mut s = state(1, &[1, 2, 3]);
        s.on_election_timeout(); // term 1, candidate
        let effects =
            s.handle_message(Message::RequestVote { term: 0, candidate_id: 2, last_log_index: 0, last_log_term: 0 });
        let granted = effects.iter().any(
            |e| matches!(e, Effect::Send { message: Message::RequestVoteResponse { vote_granted: true, .. }, .. }),
        );
        assert!(!granted);
    }

    #[test]
    fn higher_term_append_entries_converts_leader_to_follower() {
        let mut s = state(1, &[1, 2, 3]);
        s.on_election_timeout();
        s.handle_message(Message::RequestVoteResponse { term: 1, vote_granted: true, voter: 2 });
        assert_eq!(s.role(), Role::Leader);

        let effects = s.handle_message(Message::AppendEntries {
            term: 5,
            leader_id: 3,
            prev_log_index: 0,
            prev_log_term: 0,
            entries: vec![],
            leader_commit: 0,
        });
        assert_eq!(s.role(), Role::Follower);
        assert!(effects.contains(&Effect::SteppedDown));
    }

    #[test]
    fn three_voter_cluster_commits_after_one_replica_acks() {
        let mut leader = state(1, &[1, 2, 3]);
        leader.on_election_timeout();
        leader.handle_message(Message::RequestVoteResponse { term: 1, vote_granted: true, voter: 2 });
        assert_eq!(leader.role(), Role::Leader);

        let index = leader.propose(b"set x=1".to_vec()).unwrap();
        assert_eq!(index, 1);

        let effects = leader.handle_message(Message::AppendEntriesResponse {
            term: 1,
            success: true,
            match_index: 1,
            responder: 2,
        });
        assert!(effects.iter().any(|e| matches!(e, Effect::Apply { index: 1, .. })));
        assert_eq!(leader.commit_index(), 1);
    }

    #[test]
    fn learner_never_becomes_candidate_or_votes() {
        let mut learner = RaftState::new(4, Membership::new([1, 2, 3], [4]), 300);
        let effects = learner.on_election_timeout();
        assert!(effects.is_empty());
        assert_eq!(learner.role(), Role::Learner);
    }

    #[test]
    fn promote_learner_requires_catch_up() {
        let mut leader = state(1, &[1, 2, 3]);
        leader.on_election_timeout();
        leader.handle_message(Message::RequestVoteResponse { term: 1, vote_granted: true, voter: 2 });
        leader.add_learner(4);
        leader.propose(b"a".to_vec());
        leader.handle_message(Message::AppendEntriesResponse { term: 1, success: true, match_index: 1, responder: 2 });

        assert!(!leader.promote_learner(4), "learner has not replicated anything yet");
        leader.handle_message(Message::AppendEntriesResponse { term: 1, success: true, match_index: 1, responder: 4 });
        assert!(leader.promote_learner(4));
    }

    #[test]
    fn forced_step_down_demotes_leader_to_follower() {
        let mut leader = state(1, &[1, 2, 3]);
        leader.on_election_timeout();
        leader.handle_message(Message::RequestVoteResponse { term: 1, vote_granted: true, voter: 2 });
        assert_eq!(leader.role(), Role::Leader);
        let effects = leader.force_step_down();
        assert_eq!(leader.role(), Role::Follower);
        assert!(effects.contains(&Effect::SteppedDown));
    }
}
