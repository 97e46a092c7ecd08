use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::config::ConfigNode;
use crate::error::ConditionError;

/// Tri-state completion value for a condition check.
///
/// `Incomplete` means "not yet determinable" (insufficient data), which
/// is deliberately distinct from `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamState {
    Incomplete,
    Complete,
    Failed,
}

impl fmt::Display for ParamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParamState::Incomplete => "Incomplete",
            ParamState::Complete => "Complete",
            ParamState::Failed => "Failed",
        };
        write!(f, "{}", text)
    }
}

impl FromStr for ParamState {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Incomplete" => Ok(ParamState::Incomplete),
            "Complete" => Ok(ParamState::Complete),
            "Failed" => Ok(ParamState::Failed),
            other => Err(ConditionError::BadState(other.to_string())),
        }
    }
}

/// The three reduction policies for folding many child checks into one
/// parent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Any,
    All,
    None,
}

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    /// Whether the aggregate condition held.
    pub met: bool,
    /// Whether any delegate's cached state changed during the pass.
    /// The owning parameter reports upward when this is set, so
    /// completion propagates without polling every leaf every frame.
    pub changed: bool,
}

enum DelegateKind<T> {
    /// Keep the values the predicate accepts.
    Filter(Box<dyn Fn(&T) -> bool>),
    /// Pass when the candidate count is within `[min, max]`.
    Count { min: usize, max: usize },
}

/// A single named predicate check contributing to a parent's aggregate
/// pass/fail state.
///
/// The cached state starts `Incomplete` and is only transitioned by an
/// aggregation pass; check-only passes never touch it.
pub struct ConditionDelegate<T> {
    title: String,
    kind: DelegateKind<T>,
    trivial: bool,
    state: ParamState,
}

impl<T> ConditionDelegate<T> {
    pub fn new<F>(title: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + 'static,
    {
        ConditionDelegate {
            title: title.into(),
            kind: DelegateKind::Filter(Box::new(predicate)),
            trivial: false,
            state: ParamState::Incomplete,
        }
    }

    /// A delegate counting the number of candidates rather than
    /// filtering them. The title is generated from the bounds.
    pub fn count(min: usize, max: usize) -> Self {
        let mut title = String::from("Count: ");
        if max == 0 {
            title.push_str("None");
        } else if max == usize::MAX {
            title.push_str(&format!("At least {}", min));
        } else if min == 0 {
            title.push_str(&format!("At most {}", max));
        } else if min == max {
            title.push_str(&format!("Exactly {}", min));
        } else {
            title.push_str(&format!("Between {} and {}", min, max));
        }

        ConditionDelegate {
            title,
            kind: DelegateKind::Count { min, max },
            trivial: false,
            state: ParamState::Incomplete,
        }
    }

    /// Mark the delegate trivial: its title is suppressed from
    /// human-readable summaries without removing it from evaluation.
    pub fn trivial(mut self) -> Self {
        self.trivial = true;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_trivial(&self) -> bool {
        self.trivial
    }

    pub fn state(&self) -> ParamState {
        self.state
    }

    fn set_state(&mut self, new_state: ParamState, changed: &mut bool) {
        if self.state != new_state {
            debug!(title = %self.title, state = %new_state, "delegate state transition");
            self.state = new_state;
            *changed = true;
        }
    }

    /// Apply the delegate to a candidate sequence and transition the
    /// cached state based on the incoming/outgoing counts. Returns the
    /// values to hand to the next delegate plus an outright-failure flag.
    fn apply_sequence(
        &mut self,
        values: Vec<T>,
        match_type: MatchType,
        check_only: bool,
        changed: &mut bool,
    ) -> (Vec<T>, bool) {
        match &self.kind {
            DelegateKind::Count { min, max } => {
                let count = values.len();
                let met = count >= *min && count <= *max;
                if !check_only {
                    self.set_state(
                        if met {
                            ParamState::Complete
                        } else {
                            ParamState::Incomplete
                        },
                        changed,
                    );
                }
                (values, !met)
            }
            DelegateKind::Filter(predicate) => {
                // Only checking, no state change allowed
                if check_only {
                    let filtered = values.into_iter().filter(|v| predicate(v)).collect();
                    return (filtered, false);
                }

                // Uncertain - not enough data to pass or fail
                if values.is_empty() && match_type != MatchType::None {
                    self.set_state(ParamState::Incomplete, changed);
                    return (values, false);
                }

                let count = values.len();
                let filtered: Vec<T> = values.into_iter().filter(|v| predicate(v)).collect();

                let passed = if match_type == MatchType::All {
                    filtered.len() == count
                } else {
                    !filtered.is_empty()
                };

                let new_state = match (passed, match_type == MatchType::None) {
                    (true, false) => ParamState::Complete,
                    (true, true) => ParamState::Failed,
                    (false, false) => ParamState::Failed,
                    (false, true) => ParamState::Complete,
                };
                self.set_state(new_state, changed);

                (filtered, false)
            }
        }
    }

    /// Check a single value against the delegate's predicate.
    fn check_single(
        &mut self,
        value: &T,
        check_only: bool,
        changed: &mut bool,
    ) -> Result<bool, ConditionError> {
        match &self.kind {
            DelegateKind::Count { .. } => Err(ConditionError::UnsupportedAggregation {
                title: self.title.clone(),
                mode: "single-value",
            }),
            DelegateKind::Filter(predicate) => {
                let result = predicate(value);
                if !check_only {
                    self.set_state(
                        if result {
                            ParamState::Complete
                        } else {
                            ParamState::Failed
                        },
                        changed,
                    );
                }
                Ok(result)
            }
        }
    }

    /// Persist the delegate's round-trip state. The predicate itself is
    /// reconstructed by the owning parameter on reload.
    pub fn save(&self, node: &mut ConfigNode) {
        node.add_value("title", &self.title);
        node.add_value("state", &self.state.to_string());
    }

    /// Restore a persisted (title, state) pair saved by [`save`].
    ///
    /// [`save`]: ConditionDelegate::save
    pub fn load_state(node: &ConfigNode) -> Result<(String, ParamState), ConditionError> {
        let title = node
            .get_value("title")
            .ok_or_else(|| ConditionError::BadState("missing title".to_string()))?
            .to_string();
        let state = node
            .get_value("state")
            .ok_or_else(|| ConditionError::BadState("missing state".to_string()))?
            .parse()?;
        Ok((title, state))
    }

    /// Overwrite the cached state (used when restoring from a save).
    pub fn restore_state(&mut self, state: ParamState) {
        self.state = state;
    }
}

/// ANY aggregation: each delegate filters the sequence and the filtered
/// subsequence feeds the next delegate; the chain composes as a
/// pipeline. Empty input means "insufficient data", not failure.
pub fn check_any<T: Clone>(
    delegates: &mut [ConditionDelegate<T>],
    values: &[T],
    check_only: bool,
) -> CheckResult {
    let mut changed = false;
    let mut fail = false;
    let mut current = values.to_vec();

    for delegate in delegates.iter_mut() {
        let (next, outright) =
            delegate.apply_sequence(current, MatchType::Any, check_only, &mut changed);
        current = next;
        fail |= outright;
    }

    CheckResult {
        met: !fail && !current.is_empty(),
        changed,
    }
}

/// ALL aggregation: every delegate must keep the full original candidate
/// count. Each delegate sees the original sequence, not the previous
/// delegate's filtered output: a full-coverage check must not have its
/// candidate pool silently shrunk upstream. (Deliberately asymmetric
/// with ANY/NONE.)
pub fn check_all<T: Clone>(
    delegates: &mut [ConditionDelegate<T>],
    values: &[T],
    check_only: bool,
) -> CheckResult {
    let mut changed = false;
    let mut fail = false;
    let mut met = true;
    let count = values.len();

    for delegate in delegates.iter_mut() {
        let (filtered, outright) =
            delegate.apply_sequence(values.to_vec(), MatchType::All, check_only, &mut changed);
        met &= filtered.len() == count;
        fail |= outright;
    }

    CheckResult {
        met: !fail && met,
        changed,
    }
}

/// NONE aggregation: same pipeline as ANY with the pass/fail mapping
/// inverted. Empty input is evaluated like any other ("none of zero"
/// vacuously holds), not short-circuited to Incomplete.
pub fn check_none<T: Clone>(
    delegates: &mut [ConditionDelegate<T>],
    values: &[T],
    check_only: bool,
) -> CheckResult {
    let mut changed = false;
    let mut fail = false;
    let mut current = values.to_vec();

    for delegate in delegates.iter_mut() {
        let (next, outright) =
            delegate.apply_sequence(current, MatchType::None, check_only, &mut changed);
        current = next;
        fail |= outright;
    }

    CheckResult {
        met: !fail && current.is_empty(),
        changed,
    }
}

/// Single-value check: the overall result is the logical AND of every
/// delegate's individual pass/fail.
pub fn check_value<T>(
    delegates: &mut [ConditionDelegate<T>],
    value: &T,
    check_only: bool,
) -> Result<CheckResult, ConditionError> {
    let mut changed = false;
    let mut met = true;

    for delegate in delegates.iter_mut() {
        met &= delegate.check_single(value, check_only, &mut changed)?;
    }

    Ok(CheckResult { met, changed })
}

/// The text of all non-trivial delegates in one string, for printing the
/// full details of a completed parameter.
pub fn delegate_text<T>(delegates: &[ConditionDelegate<T>]) -> String {
    let mut output = String::new();
    for delegate in delegates {
        if delegate.trivial {
            continue;
        }
        if !output.is_empty() {
            output.push_str("; ");
        }
        output.push_str(&delegate.title);
    }
    output
}
