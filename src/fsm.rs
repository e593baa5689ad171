//! Scheduler lifecycle state machine (spec.md §4.5), grounded on the
//! original's `scheduler/status.go` for the state list and on spec.md's
//! transition table for the allowed edges and rollback semantics.

use parking_lot::RwLock;

use crate::error::{CrawlError, CrawlResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Uninitialized,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Uninitialized => "Uninitialized",
            State::Initializing => "Initializing",
            State::Initialized => "Initialized",
            State::Starting => "Starting",
            State::Started => "Started",
            State::Stopping => "Stopping",
            State::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A requested transition's resting state, distinct from the transient
/// "busy" state entered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Init,
    Start,
    Stop,
}

impl Transition {
    fn transient(self) -> State {
        match self {
            Transition::Init => State::Initializing,
            Transition::Start => State::Starting,
            Transition::Stop => State::Stopping,
        }
    }

    fn resting(self) -> State {
        match self {
            Transition::Init => State::Initialized,
            Transition::Start => State::Started,
            Transition::Stop => State::Stopped,
        }
    }
}

/// Guards a scheduler's lifecycle state behind a single rw-lock
/// (spec.md §5 "FSM state: one rw-lock"). Committing a transition is a
/// two-step protocol: [`LifecycleFsm::begin`] moves to the transient
/// "busy" state so concurrent callers are rejected, then either
/// [`LifecycleFsm::commit`] (on success) or [`LifecycleFsm::rollback`]
/// (on failure) resolves it (spec.md §4.5 "on method failure the FSM
/// rolls back to the prior state").
pub struct LifecycleFsm {
    state: RwLock<State>,
}

impl LifecycleFsm {
    pub fn new() -> Self {
        LifecycleFsm {
            state: RwLock::new(State::Uninitialized),
        }
    }

    pub fn state(&self) -> State {
        *self.state.read()
    }

    /// Validates and commits the move into the transient state for
    /// `transition`, returning the prior state so a failed caller can
    /// roll back to it. Rejects any edge not in spec.md §4.5's table.
    pub fn begin(&self, transition: Transition) -> CrawlResult<State> {
        let mut state = self.state.write();
        let from = *state;
        let allowed = match (from, transition) {
            (State::Uninitialized, Transition::Init) => true,
            (State::Initialized, Transition::Init) => true,
            (State::Initialized, Transition::Start) => true,
            (State::Stopped, Transition::Init) => true,
            (State::Stopped, Transition::Start) => true,
            (State::Started, Transition::Stop) => true,
            _ => false,
        };
        if !allowed {
            return Err(illegal(from, transition));
        }
        *state = transition.transient();
        Ok(from)
    }

    /// Advances from the transient state into the transition's resting
    /// state.
    pub fn commit(&self, transition: Transition) {
        let mut state = self.state.write();
        *state = transition.resting();
    }

    /// Reverts to `prior`, the state [`LifecycleFsm::begin`] returned.
    pub fn rollback(&self, prior: State) {
        *self.state.write() = prior;
    }
}

impl Default for LifecycleFsm {
    fn default() -> Self {
        LifecycleFsm::new()
    }
}

fn illegal(from: State, transition: Transition) -> CrawlError {
    let to = transition.transient();
    let reason = match (from, transition) {
        (State::Uninitialized, Transition::Start) | (State::Uninitialized, Transition::Stop) => {
            "not initialized"
        }
        (State::Initializing, _) | (State::Starting, _) | (State::Stopping, _) => "busy",
        (State::Initialized, Transition::Stop) => "not started",
        (State::Started, Transition::Init) | (State::Started, Transition::Start) => {
            "already started"
        }
        (State::Stopped, Transition::Stop) => "not started",
        _ => "illegal transition",
    };
    CrawlError::IllegalState {
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_matches_scenario_s3() {
        let fsm = LifecycleFsm::new();

        assert!(fsm.begin(Transition::Start).is_err());

        let prior = fsm.begin(Transition::Init).expect("init allowed");
        fsm.commit(Transition::Init);
        assert_eq!(fsm.state(), State::Initialized);
        let _ = prior;

        fsm.begin(Transition::Start).expect("start allowed");
        fsm.commit(Transition::Start);
        assert_eq!(fsm.state(), State::Started);

        let err = fsm.begin(Transition::Start).unwrap_err();
        assert!(matches!(err, CrawlError::IllegalState { reason, .. } if reason == "already started"));

        fsm.begin(Transition::Stop).expect("stop allowed");
        fsm.commit(Transition::Stop);
        assert_eq!(fsm.state(), State::Stopped);

        let err = fsm.begin(Transition::Stop).unwrap_err();
        assert!(matches!(err, CrawlError::IllegalState { reason, .. } if reason == "not started"));
    }

    #[test]
    fn failed_transition_rolls_back_to_prior_state() {
        let fsm = LifecycleFsm::new();
        let prior = fsm.begin(Transition::Init).expect("init allowed");
        fsm.rollback(prior);
        assert_eq!(fsm.state(), State::Uninitialized);
    }

    #[test]
    fn busy_states_reject_every_transition() {
        let fsm = LifecycleFsm::new();
        fsm.begin(Transition::Init).unwrap();
        // still Initializing: every transition rejected as "busy"
        assert!(fsm.begin(Transition::Init).is_err());
        assert!(fsm.begin(Transition::Start).is_err());
        assert!(fsm.begin(Transition::Stop).is_err());
    }
}
