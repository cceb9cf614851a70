use super::*;

fn kinds(tracker: &PhaseTracker) -> Vec<(PhaseType, PhaseState, usize)> {
    tracker
        .snapshot()
        .into_iter()
        .map(|info| (info.kind, info.state, info.depth))
        .collect()
}

#[test]
fn test_children_attach_and_detach() {
    let tracker = PhaseTracker::new();
    let root = tracker.root();
    let conjugal = root.child(PhaseType::Conjugal);
    let dialog = conjugal.child(PhaseType::Dialog(LoopDialogType::Hooks));

    assert_eq!(
        kinds(&tracker),
        [
            (PhaseType::Root, PhaseState::RunningChild, 0),
            (PhaseType::Conjugal, PhaseState::RunningChild, 1),
            (
                PhaseType::Dialog(LoopDialogType::Hooks),
                PhaseState::Entered,
                2
            ),
        ]
    );

    dialog.complete();

    assert_eq!(
        kinds(&tracker),
        [
            (PhaseType::Root, PhaseState::RunningChild, 0),
            (PhaseType::Conjugal, PhaseState::Entered, 1),
        ]
    );

    conjugal.complete();
    root.complete();

    assert_eq!(kinds(&tracker), [(PhaseType::Root, PhaseState::Completed, 0)]);
}

#[test]
fn test_dropped_phase_fails() {
    let tracker = PhaseTracker::new();
    let root = tracker.root();

    drop(root.child(PhaseType::Handshake));
    drop(root);

    assert_eq!(tracker.root_state(), Some(PhaseState::Failed));
}

#[tokio::test]
async fn test_run_child_follows_result() {
    let tracker = PhaseTracker::new();
    let root = tracker.root();

    let value = root
        .run_child(PhaseType::Handshake, async { Ok(7) })
        .await;
    assert_eq!(value.ok(), Some(7));

    let failed: Result<(), _> = root
        .run_child(PhaseType::Handshake, async { Err(NetworkError::Closed) })
        .await;
    assert!(failed.is_err());

    root.fail(&NetworkError::Closed);

    assert_eq!(tracker.root_state(), Some(PhaseState::Failed));
    assert_eq!(tracker.snapshot().len(), 1);
}

#[test]
fn test_phase_type_display() {
    assert_eq!(PhaseType::Conjugal.to_string(), "Conjugal");
    assert_eq!(
        PhaseType::Dialog(LoopDialogType::RootContext).to_string(),
        "Dialog(RootContext)"
    );
}
