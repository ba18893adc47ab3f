use pretty_assertions::assert_eq;
use proptest::prelude::*;
use scenecast_kernel::state_machine::{allowed_transitions, validate_transition, PipelineStage};
use scenecast_kernel::StateMachineError;

fn any_stage() -> impl Strategy<Value = PipelineStage> {
    prop_oneof![
        Just(PipelineStage::Received),
        Just(PipelineStage::Synthesizing),
        Just(PipelineStage::Staging),
        Just(PipelineStage::Rendering),
        Just(PipelineStage::Resolving),
        Just(PipelineStage::Delivering),
        Just(PipelineStage::Delivered),
        Just(PipelineStage::Failed),
    ]
}

#[test]
fn test_happy_path_is_a_single_chain() {
    let mut stage = PipelineStage::Received;
    let mut path = vec![stage];
    while let Some(next) = allowed_transitions(stage)
        .into_iter()
        .find(|s| *s != PipelineStage::Failed)
    {
        path.push(next);
        stage = next;
    }

    assert_eq!(
        path,
        vec![
            PipelineStage::Received,
            PipelineStage::Synthesizing,
            PipelineStage::Staging,
            PipelineStage::Rendering,
            PipelineStage::Resolving,
            PipelineStage::Delivering,
            PipelineStage::Delivered,
        ]
    );
}

#[test]
fn test_illegal_transition_names_both_stages() {
    assert_eq!(
        validate_transition(PipelineStage::Staging, PipelineStage::Delivered),
        Err(StateMachineError::IllegalTransition {
            from: PipelineStage::Staging,
            to: PipelineStage::Delivered,
        })
    );
}

#[test]
fn test_received_transitions() {
    assert!(validate_transition(PipelineStage::Received, PipelineStage::Synthesizing).is_ok());
    assert!(validate_transition(PipelineStage::Received, PipelineStage::Failed).is_ok());

    // Invalid
    assert!(validate_transition(PipelineStage::Received, PipelineStage::Staging).is_err());
    assert!(validate_transition(PipelineStage::Received, PipelineStage::Delivered).is_err());
}

#[test]
fn test_terminal_stages_have_no_exits() {
    assert!(allowed_transitions(PipelineStage::Delivered).is_empty());
    assert!(allowed_transitions(PipelineStage::Failed).is_empty());
}

#[test]
fn test_no_backward_transitions() {
    assert!(validate_transition(PipelineStage::Rendering, PipelineStage::Staging).is_err());
    assert!(validate_transition(PipelineStage::Resolving, PipelineStage::Rendering).is_err());
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_stage(), to in any_stage()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            prop_assert!(allowed.contains(&to));
        } else {
            prop_assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_every_live_stage_can_fail(from in any_stage()) {
        prop_assert_eq!(
            validate_transition(from, PipelineStage::Failed).is_ok(),
            !from.is_terminal()
        );
    }
}
