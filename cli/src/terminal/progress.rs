//! Transfer bars drawn by `tracing-indicatif`, one span per transfer.

use std::sync::{Arc, Mutex};

use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::style::ProgressStyle;

use cmover_core::progress::{ProgressHandle, ProgressReporter};

const SIZED_TEMPLATE: &str =
    "{spinner:.blue} {msg} [{bar:30.green/bright_black}] {bytes}/{total_bytes} ({bytes_per_sec})";
const UNSIZED_TEMPLATE: &str = "{spinner:.blue} {msg} {bytes} ({bytes_per_sec})";

fn style(sized: bool) -> ProgressStyle {
    let template: &str = if sized { SIZED_TEMPLATE } else { UNSIZED_TEMPLATE };
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BarReporter;

impl ProgressReporter for BarReporter {
    fn begin(&self, label: &str, total: Option<u64>) -> Arc<dyn ProgressHandle> {
        let span: Span = info_span!("transfer", indicatif.pb_show = true);
        span.pb_set_style(&style(total.is_some()));
        if let Some(total) = total {
            span.pb_set_length(total);
        }
        span.pb_set_message(label);
        span.pb_start();

        Arc::new(SpanBar {
            span: Mutex::new(Some(span)),
        })
    }
}

/// The bar lives as long as its span; finishing drops the span.
struct SpanBar {
    span: Mutex<Option<Span>>,
}

impl ProgressHandle for SpanBar {
    fn set_position(&self, position: u64) {
        if let Ok(slot) = self.span.lock() {
            if let Some(span) = slot.as_ref() {
                span.pb_set_position(position);
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.span.lock() {
            slot.take();
        }
    }
}
