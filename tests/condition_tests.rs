// tests/condition_tests.rs

use charter::condition::{
    check_all, check_any, check_none, check_value, delegate_text, ConditionDelegate, ParamState,
};
use charter::config::ConfigNode;

fn is_even() -> ConditionDelegate<i32> {
    ConditionDelegate::new("Even", |n: &i32| n % 2 == 0)
}

fn is_positive() -> ConditionDelegate<i32> {
    ConditionDelegate::new("Positive", |n: &i32| *n > 0)
}

// ============================================================================
// ANY Aggregation
// ============================================================================

#[test]
fn test_any_passes_when_one_survives() {
    let mut delegates = vec![is_even(), is_positive()];
    let result = check_any(&mut delegates, &[1, 2, 3, 4], false);
    assert!(result.met);
    assert_eq!(delegates[0].state(), ParamState::Complete);
    assert_eq!(delegates[1].state(), ParamState::Complete);
}

#[test]
fn test_any_pipelines_filtered_values_downstream() {
    // first delegate keeps only negatives, so the second sees none
    let mut delegates = vec![
        ConditionDelegate::new("Negative", |n: &i32| *n < 0),
        is_positive(),
    ];
    let result = check_any(&mut delegates, &[1, 2, 3], false);
    assert!(!result.met);
    assert_eq!(delegates[0].state(), ParamState::Failed);
    // downstream delegate saw an empty sequence: insufficient data
    assert_eq!(delegates[1].state(), ParamState::Incomplete);
}

#[test]
fn test_any_empty_input_is_incomplete() {
    let mut delegates = vec![is_even()];
    let result = check_any(&mut delegates, &[], false);
    assert!(!result.met);
    assert_eq!(delegates[0].state(), ParamState::Incomplete);
}

// ============================================================================
// ALL Aggregation
// ============================================================================

#[test]
fn test_all_requires_full_coverage() {
    let mut delegates = vec![is_positive()];
    assert!(check_all(&mut delegates, &[1, 2, 3], false).met);
    assert_eq!(delegates[0].state(), ParamState::Complete);

    // 2 of 3 pass: not full coverage
    let mut delegates = vec![is_even()];
    assert!(!check_all(&mut delegates, &[1, 2, 4], false).met);
    assert_eq!(delegates[0].state(), ParamState::Failed);
}

#[test]
fn test_all_passes_original_sequence_downstream() {
    // under ALL, the count delegate must see all 3 original values even
    // though the filter ahead of it keeps only 2
    let mut delegates = vec![is_even(), ConditionDelegate::count(3, 3)];
    let result = check_all(&mut delegates, &[1, 2, 4], false);
    assert_eq!(delegates[1].state(), ParamState::Complete);
    assert!(!result.met, "filter did not keep full coverage");

    // under ANY, the same chain's count delegate sees the filtered 2
    let mut delegates = vec![is_even(), ConditionDelegate::count(3, 3)];
    check_any(&mut delegates, &[1, 2, 4], false);
    assert_eq!(delegates[1].state(), ParamState::Incomplete);
}

#[test]
fn test_all_empty_input_is_incomplete() {
    let mut delegates = vec![is_even()];
    let result = check_all(&mut delegates, &[], false);
    assert_eq!(delegates[0].state(), ParamState::Incomplete);
    // vacuous coverage does not complete the aggregate
    assert!(result.met, "no values to violate coverage");
}

// ============================================================================
// NONE Aggregation
// ============================================================================

#[test]
fn test_none_of_empty_holds_vacuously() {
    let mut delegates = vec![is_even()];
    let result = check_none(&mut delegates, &[], false);
    assert!(result.met);
}

#[test]
fn test_none_fails_when_any_matches() {
    let mut delegates = vec![is_even()];
    let result = check_none(&mut delegates, &[2], false);
    assert!(!result.met);
    assert_eq!(delegates[0].state(), ParamState::Failed);
}

#[test]
fn test_none_passes_when_nothing_matches() {
    let mut delegates = vec![is_even()];
    let result = check_none(&mut delegates, &[1, 3, 5], false);
    assert!(result.met);
    assert_eq!(delegates[0].state(), ParamState::Complete);
}

// ============================================================================
// Count Delegates
// ============================================================================

#[test]
fn test_count_bounds() {
    let mut delegates = vec![ConditionDelegate::count(2, usize::MAX)];
    assert!(check_any(&mut delegates, &[1, 2], false).met);
    assert!(!check_any(&mut delegates, &[1], false).met);
}

#[test]
fn test_count_titles() {
    assert_eq!(ConditionDelegate::<i32>::count(0, 0).title(), "Count: None");
    assert_eq!(
        ConditionDelegate::<i32>::count(2, usize::MAX).title(),
        "Count: At least 2"
    );
    assert_eq!(
        ConditionDelegate::<i32>::count(0, 5).title(),
        "Count: At most 5"
    );
    assert_eq!(
        ConditionDelegate::<i32>::count(3, 3).title(),
        "Count: Exactly 3"
    );
    assert_eq!(
        ConditionDelegate::<i32>::count(2, 5).title(),
        "Count: Between 2 and 5"
    );
}

#[test]
fn test_count_rejects_single_value_mode() {
    let mut delegates = vec![ConditionDelegate::count(1, 1)];
    assert!(check_value(&mut delegates, &42, false).is_err());
}

// ============================================================================
// Single-Value Checking
// ============================================================================

#[test]
fn test_check_value_ands_all_delegates() {
    let mut delegates = vec![is_even(), is_positive()];
    assert!(check_value(&mut delegates, &4, false).unwrap().met);
    assert!(!check_value(&mut delegates, &-4, false).unwrap().met);
    assert_eq!(delegates[0].state(), ParamState::Complete);
    assert_eq!(delegates[1].state(), ParamState::Failed);
}

// ============================================================================
// Check-Only Mode and Change Tracking
// ============================================================================

#[test]
fn test_check_only_never_mutates_state() {
    let mut delegates = vec![is_even(), ConditionDelegate::count(1, 1)];
    let result = check_any(&mut delegates, &[2], true);
    assert!(result.met);
    assert!(!result.changed);
    assert_eq!(delegates[0].state(), ParamState::Incomplete);
    assert_eq!(delegates[1].state(), ParamState::Incomplete);

    let result = check_value(&mut [is_positive()], &1, true).unwrap();
    assert!(result.met);
    assert!(!result.changed);
}

#[test]
fn test_changed_flag_only_on_transition() {
    let mut delegates = vec![is_even()];
    let first = check_any(&mut delegates, &[2], false);
    assert!(first.changed);
    // same outcome again: no transition
    let second = check_any(&mut delegates, &[2], false);
    assert!(!second.changed);
    // different outcome: transition
    let third = check_any(&mut delegates, &[1], false);
    assert!(third.changed);
}

// ============================================================================
// Titles and Persistence
// ============================================================================

#[test]
fn test_delegate_text_skips_trivial() {
    let delegates = vec![
        is_even(),
        ConditionDelegate::new("Hidden", |_: &i32| true).trivial(),
        is_positive(),
    ];
    assert_eq!(delegate_text(&delegates), "Even; Positive");
}

#[test]
fn test_state_round_trip() {
    let mut delegates = vec![is_even()];
    check_any(&mut delegates, &[2], false);

    let mut node = ConfigNode::new("CONDITION");
    delegates[0].save(&mut node);

    let (title, state) = ConditionDelegate::<i32>::load_state(&node).unwrap();
    assert_eq!(title, "Even");
    assert_eq!(state, ParamState::Complete);

    let mut restored = is_even();
    restored.restore_state(state);
    assert_eq!(restored.state(), ParamState::Complete);
}

#[test]
fn test_bad_state_rejected() {
    let mut node = ConfigNode::new("CONDITION");
    node.add_value("title", "Even");
    node.add_value("state", "Sideways");
    assert!(ConditionDelegate::<i32>::load_state(&node).is_err());
}
