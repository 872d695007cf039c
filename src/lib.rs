#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::dbg_macro,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::panic,
    )
)]

pub mod annotation;
pub mod decoder;
pub mod error;
pub mod format;
pub mod result;
pub mod value;

pub use annotation::{
    Annotation, AnnotationKind, ArrayAnnotation, ObjectAnnotation, annotate, annotate_object,
    array, as_annotation, circular_ref, func, merge, object, scalar, unknown, update_text,
};
pub use decoder::{Decoder, define};
pub use error::Error;
pub use format::format_inline;
pub use result::{DecodeResult, and_then, err, ok};
pub use value::{ArrayRef, FunctionRef, HostValue, ObjectRef, Value};
