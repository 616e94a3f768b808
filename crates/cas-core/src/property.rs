//! Property results and the checker interface.
//!
//! Every invariant check produces a [`PropertyResult`]. A failing result
//! may carry a [`Counterexample`] describing the state that broke it.

use std::fmt;

use crate::counterexample::Counterexample;

/// Outcome of checking a single named property.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Property name (e.g. `NoLostElements`)
    pub property: &'static str,
    /// Whether the property held
    pub passed: bool,
    /// Failure explanation, `None` when the property held
    pub message: Option<String>,
    /// Failure path, when one could be reconstructed
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// A property that held.
    #[must_use]
    pub fn pass(property: &'static str) -> Self {
        Self {
            property,
            passed: true,
            message: None,
            counterexample: None,
        }
    }

    /// A property that was violated.
    #[must_use]
    pub fn fail(
        property: &'static str,
        message: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        Self {
            property,
            passed: false,
            message: Some(message.into()),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            return write!(f, "[PASS] {}", self.property);
        }
        write!(f, "[FAIL] {}", self.property)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(ref ce) = self.counterexample {
            write!(f, "\n{}", ce.render_diagram())?;
        }
        Ok(())
    }
}

/// A set of properties checked together against one subject.
pub trait PropertyChecker {
    /// Check every property, in a stable order.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// Whether every property holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.passed)
    }

    /// Only the failing results.
    fn violations(&self) -> Vec<PropertyResult> {
        self.check_all().into_iter().filter(|r| !r.passed).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<PropertyResult>);

    impl PropertyChecker for Fixed {
        fn check_all(&self) -> Vec<PropertyResult> {
            self.0.clone()
        }
    }

    #[test]
    fn test_all_hold_and_violations() {
        let ok = Fixed(vec![PropertyResult::pass("A"), PropertyResult::pass("B")]);
        assert!(ok.all_hold());
        assert!(ok.violations().is_empty());

        let bad = Fixed(vec![
            PropertyResult::pass("A"),
            PropertyResult::fail("B", "element 7 lost", None),
        ]);
        assert!(!bad.all_hold());
        let violations = bad.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].property, "B");
    }

    #[test]
    fn test_display() {
        let result = PropertyResult::fail("NoDuplicates", "element 3 appears twice", None);
        assert_eq!(result.to_string(), "[FAIL] NoDuplicates: element 3 appears twice");
        assert_eq!(PropertyResult::pass("X").to_string(), "[PASS] X");
    }
}
