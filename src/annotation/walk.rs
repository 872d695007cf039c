use std::collections::HashMap;

use crate::annotation::{
    Annotation, ObjectAnnotation, array, circular_ref, func, object_node, scalar, unknown,
    update_text,
};
use crate::value::{ArrayRef, ObjectRef, Value};

/// Containers entered during one pass, keyed by identity. Each entry holds a
/// handle to its container, so no address is freed and reused while the pass
/// runs. Never pruned on the way back up: a container reached twice in the
/// same pass, even via a sibling, is reported as a circular reference.
#[derive(Default)]
struct Seen(HashMap<usize, Value>);

impl Seen {
    fn new() -> Self {
        Self::default()
    }

    fn contains(&self, id: usize) -> bool {
        self.0.contains_key(&id)
    }

    fn enter(&mut self, id: usize, handle: Value) {
        self.0.insert(id, handle);
    }
}

/// Annotates `value` as a whole, attaching `text` to the root node only.
///
/// Scalars and opaque host values become scalar nodes, previously built
/// annotations are relabeled rather than walked, and containers are walked
/// recursively with cycle detection scoped to this call.
pub fn annotate(value: &Value, text: Option<&str>) -> Annotation {
    annotate_value(value, text, &mut Seen::new())
}

/// Like [`annotate`], for a value already known to be an object.
pub fn annotate_object(obj: &ObjectRef, text: Option<&str>) -> ObjectAnnotation {
    annotate_fields(obj, text, &mut Seen::new())
}

fn annotate_value(value: &Value, text: Option<&str>, seen: &mut Seen) -> Annotation {
    match value {
        Value::Null
        | Value::Undefined
        | Value::Bool(_)
        | Value::Number(_)
        | Value::String(_)
        | Value::Symbol(_)
        | Value::Date(_) => scalar(value.clone(), text),
        Value::Host(host) if host.is_opaque_scalar() => scalar(value.clone(), text),
        Value::Annotation(ann) => update_text(ann.as_ref().clone(), text),
        Value::Array(arr) => {
            if seen.contains(arr.id()) {
                tracing::trace!(len = arr.len(), "circular array reference");
                circular_ref(text)
            } else {
                annotate_items(arr, text, seen)
            }
        }
        Value::Object(obj) => {
            if seen.contains(obj.id()) {
                tracing::trace!(len = obj.len(), "circular object reference");
                circular_ref(text)
            } else {
                annotate_fields(obj, text, seen).into()
            }
        }
        Value::Function(_) => func(text),
        Value::Host(_) => unknown(value.clone(), text),
    }
}

fn annotate_items(arr: &ArrayRef, text: Option<&str>, seen: &mut Seen) -> Annotation {
    seen.enter(arr.id(), Value::Array(arr.clone()));
    let items: Vec<Annotation> = arr
        .snapshot()
        .iter()
        .map(|item| annotate_value(item, None, seen))
        .collect();
    array(items, text)
}

fn annotate_fields(obj: &ObjectRef, text: Option<&str>, seen: &mut Seen) -> ObjectAnnotation {
    seen.enter(obj.id(), Value::Object(obj.clone()));
    let fields = obj
        .snapshot()
        .into_iter()
        .map(|(key, field)| {
            let ann = annotate_value(&field, None, seen);
            (key, ann)
        })
        .collect();
    object_node(fields, text.map(str::to_string))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::annotation::{AnnotationKind, object};
    use crate::value::HostValue;

    struct Instant;

    impl HostValue for Instant {
        fn type_name(&self) -> &str {
            "Instant"
        }

        fn is_opaque_scalar(&self) -> bool {
            true
        }
    }

    struct Handle;

    impl HostValue for Handle {
        fn type_name(&self) -> &str {
            "Handle"
        }
    }

    #[test]
    fn non_containers_map_to_their_own_kind() {
        let cases = [
            (Value::Null, AnnotationKind::Scalar),
            (Value::Undefined, AnnotationKind::Scalar),
            (Value::from(true), AnnotationKind::Scalar),
            (Value::from(3.5), AnnotationKind::Scalar),
            (Value::from("s"), AnnotationKind::Scalar),
            (Value::Symbol("tag".into()), AnnotationKind::Scalar),
            (
                Value::from(UNIX_EPOCH + Duration::from_secs(60)),
                AnnotationKind::Scalar,
            ),
            (Value::host(Instant), AnnotationKind::Scalar),
            (Value::host(Handle), AnnotationKind::Unknown),
            (Value::function(|_| Value::Null), AnnotationKind::Function),
        ];
        for (value, kind) in cases {
            let plain = annotate(&value, None);
            assert_eq!(plain.kind(), kind, "kind mismatch for {value}");
            assert_eq!(plain.text(), None);

            let labeled = annotate(&value, Some("nope"));
            assert_eq!(labeled.kind(), kind);
            assert_eq!(labeled.text(), Some("nope"));
        }
    }

    #[test]
    fn scalar_keeps_the_original_value() {
        let value = Value::from("hello");
        assert_eq!(annotate(&value, None).value(), Some(&value));
    }

    #[test]
    fn opaque_host_values_are_not_walked() {
        let instant = Value::host(Instant);
        let ann = annotate(&instant, None);
        assert_eq!(ann.value(), Some(&instant));
        assert_eq!(ann.subcount(), 0);
    }

    #[test]
    fn containers_preserve_order_and_shape() {
        let value = Value::object([
            ("z", Value::from(1)),
            ("a", Value::array([Value::from("x"), Value::Null])),
        ]);
        let ann = annotate(&value, Some("outer"));
        let obj = ann.as_object().unwrap();
        assert_eq!(obj.fields().keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(obj.text(), Some("outer"));
        assert_eq!(obj.subcount(), 0);

        let items = obj.get("a").unwrap().as_array().unwrap().items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value(), Some(&Value::from("x")));
        assert_eq!(items[1].value(), Some(&Value::Null));
    }

    #[test]
    fn self_reference_becomes_circular_ref() {
        let obj = ObjectRef::default();
        obj.insert("name", "loop");
        obj.insert("self", obj.clone());

        let ann = annotate(&Value::from(obj), None);
        let fields = ann.as_object().unwrap();
        assert_eq!(
            fields.get("self").unwrap().kind(),
            AnnotationKind::CircularRef
        );
        assert_eq!(fields.get("name").unwrap().kind(), AnnotationKind::Scalar);
    }

    #[test]
    fn indirect_array_cycle_terminates() {
        let outer = ArrayRef::default();
        let inner = ArrayRef::default();
        inner.push(outer.clone());
        outer.push(inner.clone());
        outer.push(1);

        let ann = annotate(&Value::from(outer), None);
        let items = ann.as_array().unwrap().items();
        let nested = items[0].as_array().unwrap().items();
        assert_eq!(nested[0].kind(), AnnotationKind::CircularRef);
        assert_eq!(items[1].kind(), AnnotationKind::Scalar);
    }

    #[test]
    fn container_seen_twice_in_one_pass_is_circular() {
        let shared = Value::array([Value::from(1)]);
        let value = Value::array([shared.clone(), shared]);
        let ann = annotate(&value, None);
        let items = ann.as_array().unwrap().items();
        assert_eq!(items[0].kind(), AnnotationKind::Array);
        assert_eq!(items[1].kind(), AnnotationKind::CircularRef);
    }

    #[test]
    fn cycle_detection_is_scoped_per_call() {
        let shared = Value::object([("k", Value::from(1))]);
        assert_eq!(annotate(&shared, None).kind(), AnnotationKind::Object);
        assert_eq!(annotate(&shared, None).kind(), AnnotationKind::Object);
    }

    #[test]
    fn existing_annotations_are_relabeled_not_rewalked() {
        let inner = object([("a", scalar(1, Some("bad")))], None);
        let value = Value::array([Value::from(inner.clone()), Value::from(2)]);
        let ann = annotate(&value, None);
        let items = ann.as_array().unwrap().items();
        assert_eq!(items[0], inner);
        assert_eq!(ann.subcount(), 1);

        let relabeled = annotate(&Value::from(inner.clone()), Some("wrapper"));
        assert_eq!(relabeled.text(), Some("wrapper"));
        assert_eq!(relabeled.as_object().unwrap().get("a").unwrap().text(), Some("bad"));

        assert_eq!(annotate(&Value::from(inner.clone()), None), inner);
    }

    #[test]
    fn entered_containers_stay_alive_for_the_whole_pass() {
        let mut seen = Seen::new();
        let dropped = ArrayRef::default();
        let id = dropped.id();
        seen.enter(id, Value::Array(dropped.clone()));
        drop(dropped);

        let fresh: Vec<ArrayRef> = (0..256).map(|_| ArrayRef::default()).collect();
        assert!(fresh.iter().all(|arr| arr.id() != id));
        assert!(fresh.iter().all(|arr| !seen.contains(arr.id())));
        assert!(seen.contains(id));
    }

    #[test]
    fn annotate_object_labels_the_root() {
        let obj = ObjectRef::default();
        obj.insert("id", 5);
        let ann = annotate_object(&obj, Some("Missing keys: \"name\""));
        assert_eq!(ann.text(), Some("Missing keys: \"name\""));
        assert_eq!(ann.fields().len(), 1);
        assert_eq!(ann.subcount(), 0);
    }
}
