use crate::annotation::Annotation;

/// Outcome of a decode: the typed value, or an annotation explaining the
/// rejection.
pub type DecodeResult<T> = Result<T, Annotation>;

pub fn ok<T, E>(value: T) -> Result<T, E> {
    Ok(value)
}

pub fn err<T, E>(error: E) -> Result<T, E> {
    Err(error)
}

/// Feeds an `Ok` value into `next`; an `Err` is returned as-is and `next`
/// is never called.
pub fn and_then<A, B, E>(
    result: Result<A, E>,
    next: impl FnOnce(A) -> Result<B, E>,
) -> Result<B, E> {
    match result {
        Ok(value) => next(value),
        Err(error) => Err(error),
    }
}
