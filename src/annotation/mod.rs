//! Annotation trees: immutable, partial views of an input value decorated
//! with diagnostic text.
//!
//! Container nodes carry a `subcount`, the number of descendants with text,
//! so a renderer can skip clean subtrees without walking them.

pub mod walk;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::value::Value;

pub use walk::{annotate, annotate_object};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
    strum_macros::VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
pub enum AnnotationKind {
    Object,
    Array,
    Scalar,
    Function,
    CircularRef,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectAnnotation {
    fields: Arc<IndexMap<String, Annotation>>,
    text: Option<String>,
    subcount: usize,
}

impl ObjectAnnotation {
    pub fn fields(&self) -> &IndexMap<String, Annotation> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Annotation> {
        self.fields.get(key)
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn subcount(&self) -> usize {
        self.subcount
    }

    /// See [`merge`].
    pub fn merge<K: Into<String>>(
        &self,
        fields: impl IntoIterator<Item = (K, Annotation)>,
    ) -> ObjectAnnotation {
        merge(self, fields)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayAnnotation {
    items: Arc<[Annotation]>,
    text: Option<String>,
    subcount: usize,
}

impl ArrayAnnotation {
    pub fn items(&self) -> &[Annotation] {
        &self.items
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn subcount(&self) -> usize {
        self.subcount
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarAnnotation {
    value: Value,
    text: Option<String>,
}

impl ScalarAnnotation {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionAnnotation {
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircularRefAnnotation {
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownAnnotation {
    value: Value,
    text: Option<String>,
}

impl UnknownAnnotation {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Object(ObjectAnnotation),
    Array(ArrayAnnotation),
    Scalar(ScalarAnnotation),
    Function(FunctionAnnotation),
    CircularRef(CircularRefAnnotation),
    Unknown(UnknownAnnotation),
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::Object(_) => AnnotationKind::Object,
            Self::Array(_) => AnnotationKind::Array,
            Self::Scalar(_) => AnnotationKind::Scalar,
            Self::Function(_) => AnnotationKind::Function,
            Self::CircularRef(_) => AnnotationKind::CircularRef,
            Self::Unknown(_) => AnnotationKind::Unknown,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Object(a) => a.text.as_deref(),
            Self::Array(a) => a.text.as_deref(),
            Self::Scalar(a) => a.text.as_deref(),
            Self::Function(a) => a.text.as_deref(),
            Self::CircularRef(a) => a.text.as_deref(),
            Self::Unknown(a) => a.text.as_deref(),
        }
    }

    /// Number of descendants carrying text. Always 0 for leaf nodes.
    pub fn subcount(&self) -> usize {
        match self {
            Self::Object(a) => a.subcount,
            Self::Array(a) => a.subcount,
            Self::Scalar(_) | Self::Function(_) | Self::CircularRef(_) | Self::Unknown(_) => 0,
        }
    }

    /// Copy of this node with `text` replaced. Children are shared, not
    /// copied.
    pub fn with_text(&self, text: impl Into<String>) -> Annotation {
        let text = Some(text.into());
        match self {
            Self::Object(a) => Self::Object(ObjectAnnotation {
                text,
                ..a.clone()
            }),
            Self::Array(a) => Self::Array(ArrayAnnotation {
                text,
                ..a.clone()
            }),
            Self::Scalar(a) => Self::Scalar(ScalarAnnotation {
                text,
                ..a.clone()
            }),
            Self::Function(_) => Self::Function(FunctionAnnotation { text }),
            Self::CircularRef(_) => Self::CircularRef(CircularRefAnnotation { text }),
            Self::Unknown(a) => Self::Unknown(UnknownAnnotation {
                text,
                ..a.clone()
            }),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectAnnotation> {
        match self {
            Self::Object(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayAnnotation> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The wrapped raw value, for scalar and unknown nodes.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Scalar(a) => Some(&a.value),
            Self::Unknown(a) => Some(&a.value),
            _ => None,
        }
    }
}

impl From<ObjectAnnotation> for Annotation {
    fn from(a: ObjectAnnotation) -> Self {
        Self::Object(a)
    }
}

impl From<ArrayAnnotation> for Annotation {
    fn from(a: ArrayAnnotation) -> Self {
        Self::Array(a)
    }
}

// Own text plus whatever is nested below.
fn count(ann: &Annotation) -> usize {
    usize::from(ann.text().is_some()) + ann.subcount()
}

fn owned_text(text: Option<&str>) -> Option<String> {
    text.map(str::to_string)
}

fn object_node(fields: IndexMap<String, Annotation>, text: Option<String>) -> ObjectAnnotation {
    let subcount = fields.values().map(count).sum();
    ObjectAnnotation {
        fields: Arc::new(fields),
        text,
        subcount,
    }
}

pub fn object<K: Into<String>>(
    fields: impl IntoIterator<Item = (K, Annotation)>,
    text: Option<&str>,
) -> Annotation {
    let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
    Annotation::Object(object_node(fields, owned_text(text)))
}

pub fn array(items: impl IntoIterator<Item = Annotation>, text: Option<&str>) -> Annotation {
    let items: Arc<[Annotation]> = items.into_iter().collect();
    let subcount = items.iter().map(count).sum();
    Annotation::Array(ArrayAnnotation {
        items,
        text: owned_text(text),
        subcount,
    })
}

pub fn scalar(value: impl Into<Value>, text: Option<&str>) -> Annotation {
    Annotation::Scalar(ScalarAnnotation {
        value: value.into(),
        text: owned_text(text),
    })
}

pub fn func(text: Option<&str>) -> Annotation {
    Annotation::Function(FunctionAnnotation {
        text: owned_text(text),
    })
}

pub fn unknown(value: impl Into<Value>, text: Option<&str>) -> Annotation {
    Annotation::Unknown(UnknownAnnotation {
        value: value.into(),
        text: owned_text(text),
    })
}

pub fn circular_ref(text: Option<&str>) -> Annotation {
    Annotation::CircularRef(CircularRefAnnotation {
        text: owned_text(text),
    })
}

/// Relabels `annotation`. `None` returns it untouched, so existing text is
/// never cleared by composition.
pub fn update_text(annotation: Annotation, text: Option<&str>) -> Annotation {
    match text {
        Some(text) => annotation.with_text(text),
        None => annotation,
    }
}

/// New object annotation with `fields` laid over the existing ones. Keys in
/// `fields` win; the original text is kept.
pub fn merge<K: Into<String>>(
    annotation: &ObjectAnnotation,
    fields: impl IntoIterator<Item = (K, Annotation)>,
) -> ObjectAnnotation {
    let mut merged = annotation.fields.as_ref().clone();
    merged.extend(fields.into_iter().map(|(k, v)| (k.into(), v)));
    object_node(merged, annotation.text.clone())
}

/// The annotation wrapped by `value`, if `value` is one.
pub fn as_annotation(value: &Value) -> Option<&Annotation> {
    match value {
        Value::Annotation(ann) => Some(ann),
        _ => None,
    }
}

impl Serialize for Annotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind().as_ref())?;
        match self {
            Self::Object(a) => map.serialize_entry("fields", a.fields.as_ref())?,
            Self::Array(a) => map.serialize_entry("items", a.items.as_ref())?,
            Self::Scalar(ScalarAnnotation { value, .. })
            | Self::Unknown(UnknownAnnotation { value, .. }) => {
                map.serialize_entry("value", &value.to_json())?;
            }
            Self::Function(_) | Self::CircularRef(_) => {}
        }
        if let Some(text) = self.text() {
            map.serialize_entry("text", text)?;
        }
        if let Self::Object(_) | Self::Array(_) = self {
            map.serialize_entry("subcount", &self.subcount())?;
        }
        map.end()
    }
}
