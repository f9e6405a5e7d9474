#![forbid(unsafe_code)]

//! Every public composite operation opens a debug span named after itself.

use std::sync::{Arc, Mutex};

use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Metadata, Subscriber};

use fa_columnar::{KeySet, ValueArray, ValueColumn};
use fa_index::{align, left_align, right_align, zero_up};
use fa_interval::{IntervalSet, in1d_intervals, interval_lookup, search_intervals};
use fa_join::{find, lookup};
use fa_types::Scalar;

/// Records the name of every span opened while installed.
#[derive(Clone, Default)]
struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

impl SpanNames {
    fn names(&self) -> Vec<&'static str> {
        self.0.lock().expect("span names").clone()
    }
}

impl Subscriber for SpanNames {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, span: &Attributes<'_>) -> Id {
        let mut names = self.0.lock().expect("span names");
        names.push(span.metadata().name());
        Id::from_u64(names.len() as u64)
    }

    fn record(&self, _: &Id, _: &Record<'_>) {}

    fn record_follows_from(&self, _: &Id, _: &Id) {}

    fn event(&self, _: &Event<'_>) {}

    fn enter(&self, _: &Id) {}

    fn exit(&self, _: &Id) {}
}

fn ints(values: Vec<i64>) -> KeySet {
    KeySet::single(ValueArray::Int64(values))
}

#[test]
fn composite_operations_open_named_spans() {
    let spans = SpanNames::default();
    tracing::subscriber::with_default(spans.clone(), || {
        let keys = ints(vec![10, 20, 30]);
        let values = ValueColumn::Raw(ValueArray::Int64(vec![1, 2, 3]));
        let set = IntervalSet::new(ints(vec![0, 8]), ints(vec![10, 20])).expect("intervals");
        let fill = Scalar::Int64(-1);

        zero_up(&keys).expect("zero_up");
        align(&[&keys]).expect("align");
        right_align(&keys, &keys).expect("right_align");
        left_align(&keys, &keys).expect("left_align");
        find(&keys, &keys).expect("find");
        lookup(&keys, &values, &ints(vec![20]), &fill).expect("lookup");
        search_intervals(&ints(vec![5]), &set, None).expect("search_intervals");
        in1d_intervals(&ints(vec![5]), &set, true).expect("in1d_intervals");
        interval_lookup(
            &set,
            &ValueColumn::Raw(ValueArray::Int64(vec![7, 8])),
            &ints(vec![5]),
            &fill,
            None,
        )
        .expect("interval_lookup");
    });

    let names = spans.names();
    for expected in [
        "zero_up",
        "align",
        "right_align",
        "find",
        "lookup",
        "search_intervals",
        "in1d_intervals",
        "interval_lookup",
    ] {
        assert!(names.contains(&expected), "missing span {expected}: {names:?}");
    }
}
