//! Checks shared by the stack and queue checkers.
//!
//! Element-accounting checks assume element values are distinct.

use std::collections::HashSet;

use crate::counterexample::{Counterexample, StateSnapshot, ThreadAction};
use crate::invariants::history::{Divergence, DivergenceKind, History, Operation};
use crate::invariants::CollectionProperties;
use crate::property::PropertyResult;

/// How many operations before a divergence a counterexample shows.
const COUNTEREXAMPLE_WINDOW: usize = 8;

/// NoLostElements: every inserted element is still held or was removed.
pub(crate) fn check_no_lost_elements<P: CollectionProperties + ?Sized>(
    props: &P,
    seed: Option<u64>,
) -> PropertyResult {
    let inserted = props.inserted_elements();
    let removed = props.removed_elements();
    let contents = props.current_contents();
    let held: HashSet<u64> = contents.iter().copied().collect();

    let mut lost: Vec<u64> = inserted
        .iter()
        .filter(|e| !held.contains(e) && !removed.contains(e))
        .copied()
        .collect();
    if lost.is_empty() {
        return PropertyResult::pass("NoLostElements");
    }
    lost.sort_unstable();

    let mut ce = Counterexample::for_seed(seed)
        .with_description(format!("{} element(s) lost", lost.len()));
    ce.add_state(StateSnapshot {
        step: 1,
        description: format!("contents={:?}", contents),
        variables: vec![
            ("lost".to_string(), format!("{:?}", lost)),
            ("inserted_count".to_string(), inserted.len().to_string()),
            ("removed_count".to_string(), removed.len().to_string()),
        ],
    });

    PropertyResult::fail(
        "NoLostElements",
        format!(
            "Element {} was inserted but is neither held nor removed",
            lost[0]
        ),
        Some(ce),
    )
}

/// NoDuplicates: no element is held twice, or held after being removed.
pub(crate) fn check_no_duplicates<P: CollectionProperties + ?Sized>(props: &P) -> PropertyResult {
    let contents = props.current_contents();
    let removed = props.removed_elements();

    let mut seen = HashSet::new();
    for element in &contents {
        if !seen.insert(*element) {
            return PropertyResult::fail(
                "NoDuplicates",
                format!("Element {} is held more than once", element),
                None,
            );
        }
        if removed.contains(element) {
            return PropertyResult::fail(
                "NoDuplicates",
                format!("Element {} was removed but is still held", element),
                None,
            );
        }
    }

    PropertyResult::pass("NoDuplicates")
}

/// NoPhantomElements: every removed element was inserted.
pub(crate) fn check_no_phantom_elements<P: CollectionProperties + ?Sized>(
    props: &P,
) -> PropertyResult {
    let inserted = props.inserted_elements();
    let mut phantoms: Vec<u64> = props
        .removed_elements()
        .into_iter()
        .filter(|e| !inserted.contains(e))
        .collect();
    phantoms.sort_unstable();

    match phantoms.first() {
        None => PropertyResult::pass("NoPhantomElements"),
        Some(e) => PropertyResult::fail(
            "NoPhantomElements",
            format!("Element {} was removed but never inserted", e),
            None,
        ),
    }
}

/// Order property: the first `WrongElement` or `RemovedFromEmpty` divergence.
pub(crate) fn check_order(
    property: &'static str,
    history: &History,
    divergences: &[Divergence],
    seed: Option<u64>,
) -> PropertyResult {
    let first = divergences.iter().find_map(|d| match d.kind {
        DivergenceKind::WrongElement { returned, expected } => Some((
            d,
            format!(
                "remove returned {} but the sequential reference expected {} (step {})",
                returned, expected, d.step
            ),
        )),
        DivergenceKind::RemovedFromEmpty { returned } => Some((
            d,
            format!(
                "remove returned {} while the sequential reference was empty (step {})",
                returned, d.step
            ),
        )),
        DivergenceKind::SpuriousEmpty { .. } => None,
    });

    let Some((divergence, message)) = first else {
        return PropertyResult::pass(property);
    };

    let ce = history_counterexample(history, divergence, seed, &message);
    PropertyResult::fail(property, message, Some(ce))
}

/// EmptyRemoveConsistency: a removal reports empty only when nothing is held.
pub(crate) fn check_empty_remove_consistency(
    history: &History,
    divergences: &[Divergence],
    seed: Option<u64>,
) -> PropertyResult {
    let first = divergences.iter().find_map(|d| match d.kind {
        DivergenceKind::SpuriousEmpty { held } => Some((d, held)),
        _ => None,
    });

    let Some((divergence, held)) = first else {
        return PropertyResult::pass("EmptyRemoveConsistency");
    };

    let message = format!(
        "remove reported empty while {} element(s) were held (step {})",
        held, divergence.step
    );
    let ce = history_counterexample(history, divergence, seed, &message);
    PropertyResult::fail("EmptyRemoveConsistency", message, Some(ce))
}

fn history_counterexample(
    history: &History,
    divergence: &Divergence,
    seed: Option<u64>,
    message: &str,
) -> Counterexample {
    let mut ce = Counterexample::for_seed(seed).with_description(message);
    let window: &[Operation] = history.window(divergence.index, COUNTEREXAMPLE_WINDOW);
    let last = window.len();

    for (i, op) in window.iter().enumerate() {
        ce.add_action(ThreadAction {
            thread_id: op.thread_id,
            step: i as u64 + 1,
            action: op.describe(),
            success: i + 1 != last,
        });
    }

    ce
}
