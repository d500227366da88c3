//! Builds concrete keyboards from declarative row specs

use serde_json::Value;

use crate::metrics::RenderMetrics;
use crate::template::{
    report_gaps, split_head, walk, ContextLookup, InterpolationGap, Interpolator,
};

use super::types::{
    ActionSpec, Button, ButtonAction, ButtonSpec, GeneratorSpec, Keyboard, KeyboardLayout, RowSpec,
};

/// Context for one generated button: the element under its alias, its
/// position under `<alias>_index`, and everything from the outer context
struct ItemScope<'a, C: ?Sized> {
    parent: &'a C,
    alias: &'a str,
    item: &'a Value,
    index_key: &'a str,
    index: Value,
}

impl<C: ContextLookup + ?Sized> ContextLookup for ItemScope<'_, C> {
    fn lookup(&self, path: &str) -> Option<&Value> {
        let (head, rest) = split_head(path);
        if head == self.alias {
            return walk(self.item, rest);
        }
        if path == self.index_key {
            return Some(&self.index);
        }
        self.parent.lookup(path)
    }
}

/// Keyboard plus the label gaps found while building it
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltKeyboard {
    pub keyboard: Option<Keyboard>,
    pub gaps: Vec<InterpolationGap>,
}

#[derive(Debug, Clone, Default)]
pub struct KeyboardBuilder {
    interpolator: Interpolator,
}

impl KeyboardBuilder {
    pub fn new(interpolator: Interpolator) -> Self {
        Self { interpolator }
    }

    /// Build a keyboard; `None` when no row survives
    pub fn build<C: ContextLookup + ?Sized>(
        &self,
        spec: &[RowSpec],
        layout: &KeyboardLayout,
        context: &C,
    ) -> Option<Keyboard> {
        self.build_with_gaps(spec, layout, context).keyboard
    }

    /// Build a keyboard and collect label gaps, reported once per build.
    ///
    /// Rows keep their declared order. A generator whose list is absent,
    /// not a list, or empty contributes no row.
    pub fn build_with_gaps<C: ContextLookup + ?Sized>(
        &self,
        spec: &[RowSpec],
        layout: &KeyboardLayout,
        context: &C,
    ) -> BuiltKeyboard {
        let mut gaps = Vec::new();
        let mut rows = Vec::with_capacity(spec.len());

        for row in spec {
            let buttons = match row {
                RowSpec::Fixed(buttons) => buttons
                    .iter()
                    .map(|b| self.build_button(b, context, &mut gaps))
                    .collect::<Vec<_>>(),
                RowSpec::Generated(gen) => self.expand(gen, context, &mut gaps),
            };

            if !buttons.is_empty() {
                rows.push(buttons);
            }
        }

        let keyboard = (!rows.is_empty()).then(|| Keyboard {
            kind: layout.kind,
            rows,
            resize_keyboard: layout.resize_keyboard,
            one_time_keyboard: layout.one_time_keyboard,
        });

        report_gaps(&gaps, "label");

        BuiltKeyboard { keyboard, gaps }
    }

    fn expand<C: ContextLookup + ?Sized>(
        &self,
        gen: &GeneratorSpec,
        context: &C,
        gaps: &mut Vec<InterpolationGap>,
    ) -> Vec<Button> {
        let items = match context.lookup(&gen.for_each) {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) => {
                tracing::debug!(for_each = %gen.for_each, "Generator list empty, row skipped");
                RenderMetrics::record_row_skipped();
                return Vec::new();
            }
            Some(other) => {
                tracing::warn!(
                    for_each = %gen.for_each,
                    found = json_type(other),
                    "Generator source is not a list, row skipped"
                );
                RenderMetrics::record_row_skipped();
                return Vec::new();
            }
            None => {
                tracing::warn!(
                    for_each = %gen.for_each,
                    "Generator list missing from context, row skipped"
                );
                RenderMetrics::record_row_skipped();
                return Vec::new();
            }
        };

        let index_key = gen.index_key();
        let mut buttons = Vec::with_capacity(items.len() * gen.buttons.len());

        for (index, item) in items.iter().enumerate() {
            let scope = ItemScope {
                parent: context,
                alias: &gen.alias,
                item,
                index_key: &index_key,
                index: Value::from(index),
            };
            for spec in &gen.buttons {
                buttons.push(self.build_button(spec, &scope, gaps));
            }
        }

        buttons
    }

    fn build_button<C: ContextLookup + ?Sized>(
        &self,
        spec: &ButtonSpec,
        context: &C,
        gaps: &mut Vec<InterpolationGap>,
    ) -> Button {
        let text = self.render(&spec.text, context, gaps);
        let action = spec.action().map(|action| match action {
            ActionSpec::Static(token) => ButtonAction::Callback(token.to_string()),
            ActionSpec::Template(template) => {
                ButtonAction::Callback(self.render(template, context, gaps))
            }
            ActionSpec::Url(template) => ButtonAction::Url(self.render(template, context, gaps)),
        });

        Button { text, action }
    }

    fn render<C: ContextLookup + ?Sized>(
        &self,
        template: &str,
        context: &C,
        gaps: &mut Vec<InterpolationGap>,
    ) -> String {
        let out = self.interpolator.interpolate(template, context);
        for gap in out.gaps {
            if !gaps.contains(&gap) {
                gaps.push(gap);
            }
        }
        out.text
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyboardKind;
    use crate::template::RenderContext;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts gap warnings emitted on the current thread
    struct GapWarnings(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for GapWarnings {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            if *meta.level() == tracing::Level::WARN
                && meta.fields().field("placeholder").is_some()
            {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn rows(value: Value) -> Vec<RowSpec> {
        serde_json::from_value(value).unwrap()
    }

    fn ctx(value: Value) -> RenderContext {
        RenderContext::from_value(value).unwrap()
    }

    fn callback(button: &Button) -> &str {
        match &button.action {
            Some(ButtonAction::Callback(data)) => data,
            other => panic!("expected callback, got {:?}", other),
        }
    }

    #[test]
    fn test_fixed_rows_preserve_order() {
        let spec = rows(json!([
            [{ "text": "B", "callback_data": "b" }, { "text": "A", "callback_data": "a" }],
            [{ "text": "B", "callback_data": "b" }]
        ]));

        let keyboard = KeyboardBuilder::default()
            .build(&spec, &KeyboardLayout::default(), &RenderContext::new())
            .unwrap();

        let labels: Vec<Vec<&str>> = keyboard
            .rows
            .iter()
            .map(|row| row.iter().map(|b| b.text.as_str()).collect())
            .collect();
        assert_eq!(labels, vec![vec!["B", "A"], vec!["B"]]);
    }

    #[test]
    fn test_generator_one_button_per_item() {
        let spec = rows(json!([
            { "for_each": "items", "buttons": [{ "text": "{item.name} x{item.qty}", "callback_template": "item:{item.id}" }] }
        ]));
        let context = ctx(json!({
            "items": [
                { "id": 1, "name": "Tea", "qty": 2 },
                { "id": 2, "name": "Cake", "qty": 1 },
                { "id": 3, "name": "Jam", "qty": 5 }
            ]
        }));

        let keyboard = KeyboardBuilder::default()
            .build(&spec, &KeyboardLayout::default(), &context)
            .unwrap();

        assert_eq!(keyboard.rows.len(), 1);
        let row = &keyboard.rows[0];
        assert_eq!(row.len(), 3);
        assert_eq!(row[0].text, "Tea x2");
        assert_eq!(row[1].text, "Cake x1");
        assert_eq!(row[2].text, "Jam x5");
        assert_eq!(callback(&row[0]), "item:1");
        assert_eq!(callback(&row[2]), "item:3");
    }

    #[test]
    fn test_generator_alias_index_and_outer_context() {
        let spec = rows(json!([
            { "for_each": "order.lines", "as": "line", "buttons": [
                { "text": "{line_index}: {line}", "callback_template": "{order_id}:{line_index}" }
            ] }
        ]));
        let context = ctx(json!({ "order_id": "A7", "order": { "lines": ["x", "y"] } }));

        let keyboard = KeyboardBuilder::default()
            .build(&spec, &KeyboardLayout::default(), &context)
            .unwrap();

        let row = &keyboard.rows[0];
        assert_eq!(row[0].text, "0: x");
        assert_eq!(row[1].text, "1: y");
        assert_eq!(callback(&row[1]), "A7:1");
    }

    #[test]
    fn test_missing_or_empty_generator_row_is_skipped() {
        let spec = rows(json!([
            [{ "text": "Back", "callback_data": "back" }],
            { "for_each": "items", "buttons": [{ "text": "{item}", "callback_template": "{item}" }] }
        ]));

        for context in [
            RenderContext::new(),
            ctx(json!({ "items": [] })),
            ctx(json!({ "items": "not a list" })),
        ] {
            let keyboard = KeyboardBuilder::default()
                .build(&spec, &KeyboardLayout::default(), &context)
                .unwrap();
            assert_eq!(keyboard.rows.len(), 1);
            assert_eq!(keyboard.rows[0][0].text, "Back");
        }
    }

    #[test]
    fn test_empty_keyboard_is_none() {
        let builder = KeyboardBuilder::default();
        assert!(builder
            .build(&[], &KeyboardLayout::default(), &RenderContext::new())
            .is_none());

        let spec = rows(json!([
            { "for_each": "items", "buttons": [{ "text": "{item}", "callback_template": "{item}" }] }
        ]));
        assert!(builder
            .build(&spec, &KeyboardLayout::default(), &RenderContext::new())
            .is_none());
    }

    #[test]
    fn test_static_callback_is_not_interpolated() {
        let spec = rows(json!([[{ "text": "Raw", "callback_data": "{not_a_template}" }]]));
        let keyboard = KeyboardBuilder::default()
            .build(&spec, &KeyboardLayout::default(), &RenderContext::new())
            .unwrap();
        assert_eq!(callback(&keyboard.rows[0][0]), "{not_a_template}");
    }

    #[test]
    fn test_url_action_and_label_gaps() {
        let spec = rows(json!([[{ "text": "Open {name}", "url": "https://shop.example/o/{order_id}" }]]));
        let built = KeyboardBuilder::default().build_with_gaps(
            &spec,
            &KeyboardLayout::default(),
            &ctx(json!({ "order_id": 9 })),
        );

        let keyboard = built.keyboard.unwrap();
        assert_eq!(keyboard.rows[0][0].text, "Open {name}");
        assert_eq!(
            keyboard.rows[0][0].action,
            Some(ButtonAction::Url("https://shop.example/o/9".to_string()))
        );
        assert_eq!(built.gaps.len(), 1);
        assert_eq!(built.gaps[0].placeholder, "name");
    }

    #[test]
    fn test_reply_layout_is_carried() {
        let spec = rows(json!([[{ "text": "Yes" }, { "text": "No" }]]));
        let layout = KeyboardLayout {
            kind: KeyboardKind::Reply,
            resize_keyboard: true,
            one_time_keyboard: false,
        };

        let keyboard = KeyboardBuilder::default()
            .build(&spec, &layout, &RenderContext::new())
            .unwrap();
        assert_eq!(keyboard.kind, KeyboardKind::Reply);
        assert!(keyboard.resize_keyboard);
        assert!(keyboard.rows[0][0].action.is_none());
    }

    #[test]
    fn test_label_gaps_reported_once_per_build() {
        let spec = rows(json!([
            { "for_each": "items", "buttons": [{ "text": "{item.name} {item.size}", "callback_template": "pick:{item.id}" }] }
        ]));
        let context = ctx(json!({ "items": [
            { "name": "Tea", "id": 1 },
            { "name": "Cake", "id": 2 },
            { "name": "Juice", "id": 3 }
        ] }));

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(GapWarnings(warnings.clone()));
        let built = tracing::subscriber::with_default(subscriber, || {
            KeyboardBuilder::default().build_with_gaps(&spec, &KeyboardLayout::default(), &context)
        });

        assert_eq!(built.keyboard.unwrap().rows[0].len(), 3);
        assert_eq!(built.gaps.len(), 1);
        assert_eq!(built.gaps[0].placeholder, "item.size");
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }
}
