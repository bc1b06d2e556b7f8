use console::style;

use crate::pipeline::{DeckReport, MetricReport, StopReason};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn report(&self, report: &DeckReport) {
        self.section(&format!(
            "{} · {} ({} metrics)",
            report.merchant,
            report.range,
            report.metrics.len()
        ));
        for metric in &report.metrics {
            self.metric(metric);
        }

        match (&report.deck, &report.deck_error) {
            (Some(deck), _) => {
                self.success(&format!("Presentation {}", deck.presentation_id));
                if let Some(pdf) = &deck.pdf_path {
                    self.info(&format!("PDF: {}", pdf.display()));
                }
            }
            (None, Some(err)) => self.error(&format!("Deck assembly failed: {}", err)),
            (None, None) => self.info("Deck assembly disabled"),
        }
    }

    fn metric(&self, metric: &MetricReport) {
        let record = metric.outcome.finalized();
        let summary = format!(
            "{} · iteration {}/{} · confidence {:.2} · {}",
            metric.title,
            metric.outcome.final_index,
            metric.outcome.iterations(),
            record.decision.confidence,
            record.source
        );

        match (&metric.skipped, metric.outcome.stop_reason) {
            (Some(reason), _) => self.warning(&format!("{} · skipped: {}", summary, reason)),
            (None, StopReason::Accepted) => self.success(&summary),
            (None, StopReason::Exhausted) => {
                self.warning(&format!("{} · judge never accepted", summary))
            }
        }
        if let Some(chart) = &metric.chart {
            println!("    {}", style(chart.path.display()).dim());
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
