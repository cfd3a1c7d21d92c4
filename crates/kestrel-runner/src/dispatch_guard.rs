//! Containment of security violations at the request dispatch boundary.
//!
//! Exactly one error kind is contained: [`SecurityViolation`], wherever it
//! sits. Everything else leaves [`contain`] as it came in, except that
//! composite failures lose their security leaves.

use std::fmt;

use kestrel_events::SecurityViolation;

/// Several failures from one dispatch (a batch of requests)
#[derive(Debug)]
pub struct AggregateError(Vec<anyhow::Error>);

impl AggregateError {
    pub fn new(errors: Vec<anyhow::Error>) -> Self {
        Self(errors)
    }

    pub fn errors(&self) -> &[anyhow::Error] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<anyhow::Error> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.0.len())?;
        for (index, error) in self.0.iter().enumerate() {
            write!(f, "; [{index}] {error:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Pull every security violation out of `error`.
///
/// Each violation found is passed to `on_violation` exactly once. Returns
/// `Ok` when nothing else is left, otherwise the remaining failure: the
/// original error untouched, or a new [`AggregateError`] holding only the
/// non-security leaves of a composite.
pub fn contain(
    error: anyhow::Error,
    on_violation: &mut dyn FnMut(&SecurityViolation),
) -> Result<(), anyhow::Error> {
    if let Some(violation) = error.downcast_ref::<SecurityViolation>() {
        on_violation(violation);
        return Ok(());
    }

    let error = match error.downcast::<AggregateError>() {
        Ok(aggregate) => {
            let mut leaves = Vec::new();
            flatten(aggregate, &mut leaves);

            let remaining: Vec<_> = leaves
                .into_iter()
                .filter(|leaf| match find_violation(leaf) {
                    Some(violation) => {
                        on_violation(violation);
                        false
                    }
                    None => true,
                })
                .collect();

            return if remaining.is_empty() {
                Ok(())
            } else {
                Err(AggregateError::new(remaining).into())
            };
        }
        Err(error) => error,
    };

    match find_violation(&error) {
        Some(violation) => {
            on_violation(violation);
            Ok(())
        }
        None => Err(error),
    }
}

/// Run `result` through [`contain`]. `Ok(None)` means a violation was
/// contained.
pub fn guard<T>(
    result: anyhow::Result<T>,
    on_violation: &mut dyn FnMut(&SecurityViolation),
) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) => contain(error, on_violation).map(|()| None),
    }
}

fn flatten(aggregate: AggregateError, leaves: &mut Vec<anyhow::Error>) {
    for error in aggregate.into_errors() {
        match error.downcast::<AggregateError>() {
            Ok(nested) => flatten(nested, leaves),
            Err(leaf) => leaves.push(leaf),
        }
    }
}

fn find_violation(error: &anyhow::Error) -> Option<&SecurityViolation> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SecurityViolation>())
}
