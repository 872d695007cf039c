use std::fmt;
use std::sync::Arc;

use crate::annotation::{Annotation, annotate};
use crate::error::Error;
use crate::format::format_inline;
use crate::result::{DecodeResult, and_then};
use crate::value::Value;

type DecodeFn<T, F> = dyn Fn(&F) -> DecodeResult<T> + Send + Sync;

/// A reusable, stateless decoder from `F` (untyped [`Value`] by default)
/// to `T`.
///
/// Decoders are persistent: [`transform`](Self::transform),
/// [`describe`](Self::describe) and friends return new decoders wrapping
/// this one, which stays valid and shareable across threads.
pub struct Decoder<T, F: ?Sized = Value> {
    decode_fn: Arc<DecodeFn<T, F>>,
}

impl<T, F: ?Sized> Clone for Decoder<T, F> {
    fn clone(&self) -> Self {
        Self {
            decode_fn: Arc::clone(&self.decode_fn),
        }
    }
}

impl<T, F: ?Sized> fmt::Debug for Decoder<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("output", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Decoder`] from a decoding function.
///
/// The function must be free of side effects, accept any input, and report
/// expected failures as `Err(annotation)` rather than panicking.
pub fn define<T, F, D>(decode_fn: D) -> Decoder<T, F>
where
    F: ?Sized,
    D: Fn(&F) -> DecodeResult<T> + Send + Sync + 'static,
{
    Decoder {
        decode_fn: Arc::new(decode_fn),
    }
}

impl<T: 'static, F: ?Sized + 'static> Decoder<T, F> {
    pub fn decode(&self, input: &F) -> DecodeResult<T> {
        (self.decode_fn)(input)
    }

    /// Decodes `input`, turning a rejection into [`Error::Decoding`] rendered
    /// with [`format_inline`].
    pub fn verify(&self, input: &F) -> Result<T, Error> {
        self.verify_with(input, format_inline)
    }

    pub fn verify_with(
        &self,
        input: &F,
        formatter: impl Fn(&Annotation) -> String,
    ) -> Result<T, Error> {
        match self.decode(input) {
            Ok(value) => Ok(value),
            Err(annotation) => {
                let message = format!("\n{}", formatter(&annotation));
                tracing::debug!(
                    kind = %annotation.kind(),
                    subcount = annotation.subcount(),
                    "verify rejected input"
                );
                Err(Error::Decoding { message })
            }
        }
    }

    /// Runs `transform_fn` on every decoded value. A transform error becomes
    /// a decode failure annotating the value that was being transformed
    /// (see [`Value::from_decoded`]), with the error's message as text.
    pub fn transform<V, E, G>(&self, transform_fn: G) -> Decoder<V, F>
    where
        V: 'static,
        E: fmt::Display,
        G: Fn(&T) -> Result<V, E> + Send + Sync + 'static,
    {
        let decode_fn = Arc::clone(&self.decode_fn);
        define(move |blob: &F| {
            and_then(decode_fn(blob), |value| {
                transform_fn(&value).map_err(|e| {
                    let message = e.to_string();
                    tracing::debug!(reason = %message, "transform rejected decoded value");
                    annotate(&Value::from_decoded(&value), Some(&message))
                })
            })
        })
    }

    /// Infallible [`transform`](Self::transform).
    pub fn map<V, G>(&self, map_fn: G) -> Decoder<V, F>
    where
        V: 'static,
        G: Fn(T) -> V + Send + Sync + 'static,
    {
        let decode_fn = Arc::clone(&self.decode_fn);
        define(move |blob: &F| decode_fn(blob).map(&map_fn))
    }

    /// Replaces the text of the outermost failure annotation with `message`.
    /// Nested annotations are left as they are.
    pub fn describe(&self, message: impl Into<String>) -> Decoder<T, F> {
        let decode_fn = Arc::clone(&self.decode_fn);
        let message: String = message.into();
        define(move |blob: &F| decode_fn(blob).map_err(|ann| ann.with_text(message.as_str())))
    }

    /// Accepts only decoded values satisfying `predicate`; others fail with
    /// `message` attached to the decoded value.
    pub fn refine<P>(&self, predicate: P, message: impl Into<String>) -> Decoder<T, F>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let decode_fn = Arc::clone(&self.decode_fn);
        let message: String = message.into();
        define(move |blob: &F| {
            let value = decode_fn(blob)?;
            if predicate(&value) {
                Ok(value)
            } else {
                tracing::debug!(reason = %message, "predicate rejected decoded value");
                Err(annotate(&Value::from_decoded(&value), Some(&message)))
            }
        })
    }

    /// Decodes with this decoder, then lets the result pick the decoder that
    /// decodes the same input. Useful for tagged unions.
    pub fn dispatch<V, N>(&self, next: N) -> Decoder<V, F>
    where
        V: 'static,
        N: Fn(&T) -> Decoder<V, F> + Send + Sync + 'static,
    {
        let decode_fn = Arc::clone(&self.decode_fn);
        define(move |blob: &F| {
            let base = decode_fn(blob)?;
            next(&base).decode(blob)
        })
    }
}
