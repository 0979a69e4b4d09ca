pub mod plurality;

pub use plurality::compute_tally;

/// Display-ready ranking of a session's options.
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    /// Every session option, most votes first; equal counts keep session order.
    pub entries: Vec<TallyEntry>,
    /// Option with a strictly higher count than the runner-up.
    pub winner: Option<String>,
    /// Top two counts are equal (zero included).
    pub is_tie: bool,
    /// Backend-declared total.
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TallyEntry {
    pub option: String,
    pub count: u64,
    /// Share of the total, rounded to one decimal.
    pub percentage: f64,
}

impl Tally {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, option: &str) -> Option<&TallyEntry> {
        self.entries.iter().find(|e| e.option == option)
    }

    pub fn percentages(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.percentage).collect()
    }

    /// Formatted results, winner in bold.
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "This session has no options.".to_string();
        }

        let mut summary = String::new();
        for entry in &self.entries {
            let is_winner = self.winner.as_deref() == Some(entry.option.as_str());
            let line = if is_winner {
                format!("**{}**: {} votes ({:.1}%)", entry.option, entry.count, entry.percentage)
            } else {
                format!("{}: {} votes ({:.1}%)", entry.option, entry.count, entry.percentage)
            };
            summary.push_str(&line);
            summary.push('\n');
        }

        if self.is_tie {
            summary.push_str("\nResult: tie.");
        }
        summary.push_str(&format!("\n{} votes counted.", self.total));
        summary
    }
}
