//! Exhaustive breadth-first check of a model with a summary report.

use std::fmt;
use std::hash::Hash;

use stateright::{Checker, Expectation, Model};

/// How a property is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Always,
    Eventually,
    Sometimes,
}

impl From<&Expectation> for PropertyKind {
    fn from(expectation: &Expectation) -> Self {
        match expectation {
            Expectation::Always => PropertyKind::Always,
            Expectation::Eventually => PropertyKind::Eventually,
            Expectation::Sometimes => PropertyKind::Sometimes,
        }
    }
}

/// Outcome of one property after the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOutcome {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub holds: bool,
    /// Actions leading to the discovery, when there is one
    pub trace: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelCheckReport {
    pub unique_states: usize,
    /// Whether the whole state space was explored
    pub done: bool,
    pub properties: Vec<PropertyOutcome>,
}

impl ModelCheckReport {
    /// Search finished and every property holds.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.done && self.properties.iter().all(|p| p.holds)
    }

    #[must_use]
    pub fn violations(&self) -> Vec<&PropertyOutcome> {
        self.properties.iter().filter(|p| !p.holds).collect()
    }
}

impl fmt::Display for ModelCheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} unique states{}",
            self.unique_states,
            if self.done { "" } else { " (incomplete)" }
        )?;
        for p in &self.properties {
            let status = if p.holds { "PASS" } else { "FAIL" };
            writeln!(f, "[{}] {:?} {}", status, p.kind, p.name)?;
            if let (false, Some(trace)) = (p.holds, &p.trace) {
                writeln!(f, "    {}", trace)?;
            }
        }
        Ok(())
    }
}

/// Explore every reachable state of `model` with `threads` checker threads.
///
/// An `always` or `eventually` property holds when the checker found no
/// counterexample; a `sometimes` property holds when it found an example.
pub fn check_model<M>(model: M, threads: usize) -> ModelCheckReport
where
    M: Model + Send + Sync + 'static,
    M::State: Hash + Send + Sync + 'static,
    M::Action: fmt::Debug + Send + Sync + 'static,
{
    let expected: Vec<(&'static str, PropertyKind)> = model
        .properties()
        .iter()
        .map(|p| (p.name, PropertyKind::from(&p.expectation)))
        .collect();

    let checker = model.checker().threads(threads.max(1)).spawn_bfs().join();

    let properties = expected
        .into_iter()
        .map(|(name, kind)| {
            let discovery = checker.discovery(name);
            let holds = match kind {
                PropertyKind::Sometimes => discovery.is_some(),
                PropertyKind::Always | PropertyKind::Eventually => discovery.is_none(),
            };
            PropertyOutcome {
                name,
                kind,
                holds,
                trace: discovery.map(|path| format!("{:?}", path.into_actions())),
            }
        })
        .collect();

    ModelCheckReport {
        unique_states: checker.unique_state_count(),
        done: checker.is_done(),
        properties,
    }
}
