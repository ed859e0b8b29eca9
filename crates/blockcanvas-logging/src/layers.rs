//! Custom tracing layers
//!
//! [`CollectionContextLayer`] tags spans with the collection of an active
//! [`CollectionContextGuard`]. [`jsonl_layer`] is the JSON lines formatter
//! shared by console and file output.

use tracing::{Subscriber, span};
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Filter};
use tracing_subscriber::registry::{LookupSpan, SpanRef};

use crate::config::JsonlConfig;
use crate::context::{CollectionContextData, CollectionContextGuard};

/// Layer that attaches the current collection context to new spans
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectionContextLayer;

impl CollectionContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct CollectionContextExtension {
    pub data: CollectionContextData,
}

impl<S> Layer<S> for CollectionContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        if let Some(data) = CollectionContextGuard::current() {
            span.extensions_mut()
                .insert(CollectionContextExtension { data });
        }
    }
}

/// Collection recorded on `span`, if any
pub fn span_collection<'a, S>(span: &SpanRef<'a, S>) -> Option<String>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    let extensions = span.extensions();
    extensions
        .get::<CollectionContextExtension>()
        .map(|ext| ext.data.collection.clone())
}

/// JSON lines formatting layer writing to `writer`
pub fn jsonl_layer<S, W, F>(
    writer: W,
    jsonl: &JsonlConfig,
    filter: F,
) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
    F: Filter<S> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_thread_ids(jsonl.include_thread_info)
        .with_thread_names(jsonl.include_thread_info)
        .with_writer(writer)
        .with_filter(filter)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::registry::Registry;

    /// Records the collection of every span as it closes
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl<S> Layer<S> for Recorder
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        fn on_close(&self, id: span::Id, ctx: Context<'_, S>) {
            if let Some(span) = ctx.span(&id) {
                self.seen.lock().push(span_collection(&span));
            }
        }
    }

    #[test]
    fn test_spans_inherit_active_collection() {
        let recorder = Recorder::default();
        let subscriber = Registry::default()
            .with(CollectionContextLayer::new())
            .with(recorder.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info_span!("outside").in_scope(|| {});
            let _guard = CollectionContextGuard::new("arena");
            tracing::info_span!("inside").in_scope(|| {});
        });

        assert_eq!(
            recorder.seen.lock().as_slice(),
            &[None, Some("arena".to_string())]
        );
    }
}
