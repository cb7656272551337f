use std::fmt;
use std::time::Duration;

/// A captured test failure: the innermost message plus, when the error
/// carried a cause chain, the full chain for richer reporting.
#[derive(Debug, Clone)]
pub struct TestFailure {
    pub message: String,
    pub detail: Option<String>,
}

/// Why a test was skipped instead of run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Excluded,
    NotFocused,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Excluded => "excluded",
            SkipReason::NotFocused => "not focused",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum TestOutcome {
    Passed,
    Failed(TestFailure),
    Skipped(SkipReason),
}

impl TestOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TestOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TestOutcome::Skipped(_))
    }
}

/// The per-test result record delivered through the completed-per-test event
/// and collected into the list `execute` resolves to.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub full_name: String,
    pub outcome: TestOutcome,
    pub output: String,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<TestResult>,
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_skipped()).count()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| !r.outcome.is_failed())
    }
}
