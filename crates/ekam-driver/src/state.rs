//! [`DriverState`]: the five states an [`crate::ActionDriver`] moves through.

/// PENDING → RUNNING → {DONE, PASSED, FAILED} (§3 "ActionDriver").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// On the scheduler's pending queue; owns nothing yet.
    Pending,
    /// Started; may issue RPC calls and spawn subprocesses.
    Running,
    /// Finished without signalling pass/fail — treated as success.
    Done,
    /// Finished and reported pass (dashboard highlights these specially).
    Passed,
    /// Reported failed, or an uncaught error was converted to a failure.
    Failed,
}

impl DriverState {
    /// Whether this state is one of the three terminal run outcomes.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DriverState::Done | DriverState::Passed | DriverState::Failed)
    }

    /// Whether a success-shaped return procedure applies (§4.2 step 3).
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, DriverState::Done | DriverState::Passed)
    }
}
