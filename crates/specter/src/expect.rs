//! Value-level assertions.
//!
//! `expect(actual)` wraps a value; matcher methods verify it and fail the
//! current test when the expectation is not satisfied. A failed matcher
//! writes its diagnostic to the running test's output buffer and unwinds
//! with an [`ExpectationError`] payload, which the executor turns into a
//! `Failed` outcome carrying that message.
//!
//! ```
//! use specter::expect::expect;
//!
//! expect(2 + 2).to_equal(4);
//! expect("specter").to_contain("spec");
//! expect(Some(3)).not().to_be_none();
//! ```

use std::fmt::Debug;

use crate::context;
use crate::error::ExpectationError;

pub fn expect<T>(actual: T) -> Expectation<T> {
    Expectation {
        actual,
        negated: false,
    }
}

pub struct Expectation<T> {
    actual: T,
    negated: bool,
}

impl<T> Expectation<T> {
    /// Inverts the following matcher.
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn verify(&self, matched: bool, positive: String, negative: String) {
        let (ok, message) = if self.negated {
            (!matched, negative)
        } else {
            (matched, positive)
        };
        if !ok {
            fail(message);
        }
    }
}

fn fail(message: String) -> ! {
    context::write_line(&message);
    std::panic::panic_any(ExpectationError { message })
}

impl<T: Debug + PartialEq> Expectation<T> {
    pub fn to_equal(self, expected: T) {
        self.verify(
            self.actual == expected,
            format!("expected {:?} to equal {:?}", self.actual, expected),
            format!("expected {:?} not to equal {:?}", self.actual, expected),
        );
    }
}

impl<T: Debug + PartialOrd> Expectation<T> {
    pub fn to_be_greater_than(self, bound: T) {
        self.verify(
            self.actual > bound,
            format!("expected {:?} to be greater than {:?}", self.actual, bound),
            format!(
                "expected {:?} not to be greater than {:?}",
                self.actual, bound
            ),
        );
    }

    pub fn to_be_less_than(self, bound: T) {
        self.verify(
            self.actual < bound,
            format!("expected {:?} to be less than {:?}", self.actual, bound),
            format!("expected {:?} not to be less than {:?}", self.actual, bound),
        );
    }
}

impl Expectation<bool> {
    pub fn to_be_true(self) {
        self.verify(
            self.actual,
            "expected condition to be true".to_string(),
            "expected condition not to be true".to_string(),
        );
    }

    pub fn to_be_false(self) {
        self.verify(
            !self.actual,
            "expected condition to be false".to_string(),
            "expected condition not to be false".to_string(),
        );
    }
}

impl<'a> Expectation<&'a str> {
    pub fn to_contain(self, needle: &str) {
        self.verify(
            self.actual.contains(needle),
            format!("expected {:?} to contain {:?}", self.actual, needle),
            format!("expected {:?} not to contain {:?}", self.actual, needle),
        );
    }
}

impl Expectation<String> {
    pub fn to_contain(self, needle: &str) {
        self.verify(
            self.actual.contains(needle),
            format!("expected {:?} to contain {:?}", self.actual, needle),
            format!("expected {:?} not to contain {:?}", self.actual, needle),
        );
    }
}

impl<T: Debug + PartialEq> Expectation<Vec<T>> {
    pub fn to_contain(self, item: T) {
        self.verify(
            self.actual.contains(&item),
            format!("expected {:?} to contain {:?}", self.actual, item),
            format!("expected {:?} not to contain {:?}", self.actual, item),
        );
    }
}

impl<'a, T: Debug + PartialEq> Expectation<&'a [T]> {
    pub fn to_contain(self, item: &T) {
        self.verify(
            self.actual.contains(item),
            format!("expected {:?} to contain {:?}", self.actual, item),
            format!("expected {:?} not to contain {:?}", self.actual, item),
        );
    }
}

impl<T: Debug> Expectation<Option<T>> {
    pub fn to_be_some(self) {
        self.verify(
            self.actual.is_some(),
            format!("expected {:?} to be Some", self.actual),
            format!("expected {:?} not to be Some", self.actual),
        );
    }

    pub fn to_be_none(self) {
        self.verify(
            self.actual.is_none(),
            format!("expected {:?} to be None", self.actual),
            format!("expected {:?} not to be None", self.actual),
        );
    }
}

impl<T: Debug, E: Debug> Expectation<Result<T, E>> {
    pub fn to_be_ok(self) {
        self.verify(
            self.actual.is_ok(),
            format!("expected {:?} to be Ok", self.actual),
            format!("expected {:?} not to be Ok", self.actual),
        );
    }

    pub fn to_be_err(self) {
        self.verify(
            self.actual.is_err(),
            format!("expected {:?} to be Err", self.actual),
            format!("expected {:?} not to be Err", self.actual),
        );
    }
}

impl Expectation<f64> {
    /// Passes when `actual` is within `tolerance` of `expected`.
    pub fn to_be_close_to(self, expected: f64, tolerance: f64) {
        self.verify(
            (self.actual - expected).abs() <= tolerance,
            format!(
                "expected {} to be within {} of {}",
                self.actual, tolerance, expected
            ),
            format!(
                "expected {} not to be within {} of {}",
                self.actual, tolerance, expected
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn failure_message(check: impl FnOnce()) -> String {
        let payload = catch_unwind(AssertUnwindSafe(check)).unwrap_err();
        payload
            .downcast_ref::<ExpectationError>()
            .expect("matchers fail with a typed payload")
            .message
            .clone()
    }

    #[test]
    fn passing_matchers_do_not_unwind() {
        expect(3).to_equal(3);
        expect(true).to_be_true();
        expect("hello world").to_contain("world");
        expect(vec![1, 2, 3]).to_contain(2);
        expect(Some(1)).to_be_some();
        expect(Ok::<_, ()>(1)).to_be_ok();
        expect(5).to_be_greater_than(4);
        expect(0.1 + 0.2).to_be_close_to(0.3, 1e-9);
    }

    #[test]
    fn failed_equality_names_both_values() {
        let message = failure_message(|| expect(3).to_equal(4));
        assert_eq!(message, "expected 3 to equal 4");
    }

    #[test]
    fn negation_flips_the_verdict_and_the_message() {
        expect(3).not().to_equal(4);
        let message = failure_message(|| expect(3).not().to_equal(3));
        assert_eq!(message, "expected 3 not to equal 3");
    }

    #[test]
    fn option_and_result_matchers_report_the_actual_value() {
        let message = failure_message(|| expect(None::<i32>).to_be_some());
        assert_eq!(message, "expected None to be Some");
        let message = failure_message(|| expect(Err::<i32, _>("boom")).to_be_ok());
        assert_eq!(message, "expected Err(\"boom\") to be Ok");
    }
}
