//! Baseline single-line rendering of annotation trees, used by
//! [`Decoder::verify`](crate::Decoder::verify) when no formatter is supplied.

use std::fmt;

use crate::annotation::Annotation;

/// Lists every annotated node as `<path>: <text> (got <summary>)`, joined by
/// `"; "`. Subtrees without diagnostics are skipped via their subcount.
pub fn format_inline(annotation: &Annotation) -> String {
    let mut entries = Vec::with_capacity(annotation.subcount() + 1);
    let mut path = String::from("$");
    collect(annotation, &mut path, &mut entries);
    if entries.is_empty() {
        return format!("$: got {}", summarize(annotation));
    }
    entries.join("; ")
}

fn has_diagnostics(ann: &Annotation) -> bool {
    ann.text().is_some() || ann.subcount() > 0
}

fn collect(ann: &Annotation, path: &mut String, out: &mut Vec<String>) {
    if let Some(text) = ann.text() {
        out.push(format!("{path}: {text} (got {})", summarize(ann)));
    }
    match ann {
        Annotation::Object(obj) => {
            for (key, field) in obj.fields() {
                if !has_diagnostics(field) {
                    continue;
                }
                let len = path.len();
                push_key(path, key);
                collect(field, path, out);
                path.truncate(len);
            }
        }
        Annotation::Array(arr) => {
            for (index, item) in arr.items().iter().enumerate() {
                if !has_diagnostics(item) {
                    continue;
                }
                let len = path.len();
                path.push_str(&format!("[{index}]"));
                collect(item, path, out);
                path.truncate(len);
            }
        }
        Annotation::Scalar(_)
        | Annotation::Function(_)
        | Annotation::CircularRef(_)
        | Annotation::Unknown(_) => {}
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn push_key(path: &mut String, key: &str) {
    if is_identifier(key) {
        path.push('.');
        path.push_str(key);
    } else {
        path.push('[');
        path.push_str(&serde_json::Value::String(key.to_string()).to_string());
        path.push(']');
    }
}

fn summarize(ann: &Annotation) -> String {
    match ann {
        Annotation::Scalar(a) => a.value().to_string(),
        Annotation::Unknown(a) => a.value().to_string(),
        Annotation::Object(a) if a.fields().is_empty() => "{}".to_string(),
        Annotation::Object(_) => "{...}".to_string(),
        Annotation::Array(a) if a.items().is_empty() => "[]".to_string(),
        Annotation::Array(a) => format!("[...{} items]", a.items().len()),
        Annotation::Function(_) => "<function>".to_string(),
        Annotation::CircularRef(_) => "<circular ref>".to_string(),
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_inline(self))
    }
}
