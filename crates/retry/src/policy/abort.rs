// Abort conditions: predicates that stop retrying regardless of remaining budget
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::guard;

type AbortPredicate<R, E> = Arc<dyn Fn(Option<&R>, Option<&E>) -> bool + Send + Sync>;

/// A predicate over an attempt's `(result, failure)` pair
///
/// Matching is any-match across a policy's conditions. A predicate that
/// panics while being evaluated counts as not matching.
pub struct AbortCondition<R, E> {
    predicate: AbortPredicate<R, E>,
}

impl<R, E> AbortCondition<R, E> {
    /// Condition over both the result and the failure
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(Option<&R>, Option<&E>) -> bool + Send + Sync + 'static,
    {
        Self { predicate: Arc::new(predicate) }
    }

    /// Condition over the result only; not consulted when the attempt failed
    /// with an error
    pub fn on_result<F>(predicate: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        Self::new(move |result, failure| failure.is_none() && result.is_some_and(&predicate))
    }

    /// Condition over the failure only
    pub fn on_failure<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::new(move |_result, failure| failure.is_some_and(&predicate))
    }

    /// Condition matching results equal to `value`
    pub fn result_equals(value: R) -> Self
    where
        R: PartialEq + Send + Sync + 'static,
    {
        Self::on_result(move |result| *result == value)
    }

    /// Evaluate the condition, treating a panic as a non-match
    pub fn matches(&self, result: Option<&R>, failure: Option<&E>) -> bool {
        guard::contained("abort_condition", || (self.predicate)(result, failure)).unwrap_or(false)
    }
}

impl<R, E> AbortCondition<R, E>
where
    E: AsRef<dyn Error + Send + Sync + 'static>,
{
    /// Condition matching failures whose error is a `T`
    ///
    /// Works with boxed errors and `anyhow::Error`, the usual failure types
    /// of operations that can fail in more than one way.
    pub fn on_error_type<T>() -> Self
    where
        T: Error + 'static,
    {
        Self::on_failure(|failure: &E| failure.as_ref().is::<T>())
    }
}

impl<R, E> Clone for AbortCondition<R, E> {
    fn clone(&self) -> Self {
        Self { predicate: Arc::clone(&self.predicate) }
    }
}

impl<R, E> fmt::Debug for AbortCondition<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AbortCondition(<predicate>)")
    }
}
