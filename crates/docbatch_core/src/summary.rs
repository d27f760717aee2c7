use std::time::Duration;

pub const RULE: &str = "------------------------------------";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    /// Run-level failure with its top-level report.
    Failed(String),
}

/// Totals reported once when a run ends, whatever the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub total_downloaded: usize,
    pub elapsed: Duration,
    pub ignored_items: Vec<String>,
    pub failed_items: Vec<String>,
}

impl RunSummary {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            total_downloaded: 0,
            elapsed: Duration::ZERO,
            ignored_items: Vec::new(),
            failed_items: Vec::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    /// Operator-facing closing lines, in display order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![RULE.to_string()];
        match &self.status {
            RunStatus::Completed => lines.push("Run finished.".to_string()),
            RunStatus::Cancelled => lines.push("Run cancelled by the operator.".to_string()),
            RunStatus::Failed(reason) => lines.push(format!("RUN FAILED: {reason}")),
        }
        if !self.ignored_items.is_empty() {
            lines.push("Ignored items (not starting with 500):".to_string());
            lines.extend(self.ignored_items.iter().map(|item| format!("- {item}")));
        }
        if !self.failed_items.is_empty() {
            lines.push("Items that FAILED:".to_string());
            lines.extend(self.failed_items.iter().map(|item| format!("- {item}")));
        }
        lines.push(RULE.to_string());
        lines.push(format!(
            "Total items downloaded successfully: {}",
            self.total_downloaded
        ));
        lines.push(format!("Elapsed time: {}.", format_elapsed(self.elapsed)));
        lines
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{} minutes and {} seconds", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_split_into_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2 minutes and 5 seconds");
        assert_eq!(format_elapsed(Duration::from_millis(999)), "0 minutes and 0 seconds");
    }

    #[test]
    fn cancelled_summary_lists_failures_and_totals() {
        let summary = RunSummary {
            status: RunStatus::Cancelled,
            total_downloaded: 3,
            elapsed: Duration::from_secs(61),
            ignored_items: vec!["999".into()],
            failed_items: vec!["500123".into()],
        };
        let lines = summary.lines();
        assert!(lines.contains(&"Run cancelled by the operator.".to_string()));
        assert!(lines.contains(&"- 999".to_string()));
        assert!(lines.contains(&"- 500123".to_string()));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Elapsed time: 1 minutes and 1 seconds.")
        );
    }
}
