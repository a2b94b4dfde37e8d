use crate::ingestion::FilerFacts;
use crate::schema::{AverageMethod, AverageValue, NumericFact};
use chrono::NaiveDate;

/// Latest point-in-time balances and 5-point trailing averages.
///
/// The 5-point average (current quarter end plus four priors) mirrors the
/// regulator-style averaging convention: return ratios computed against a
/// single quarter-end balance are noisy, the trailing mean is not.
pub struct BalanceExtractor<'a> {
    facts: &'a FilerFacts,
}

const AVERAGE_POINTS: usize = 5;

impl<'a> BalanceExtractor<'a> {
    pub fn new(facts: &'a FilerFacts) -> Self {
        Self { facts }
    }

    /// Most recent instantaneous fact of a recognized filing type.
    pub fn latest(&self, tag: &str) -> Option<&NumericFact> {
        self.facts
            .deduped_instant_facts(tag)
            .into_iter()
            .next_back()
            .map(|(_, fact)| fact)
    }

    /// Up to five most recent qualifying period-end balances. `as_of`
    /// restricts the window to dates on or before it, aligning the average
    /// with a TTM income period.
    pub fn average(&self, tag: &str, as_of: Option<NaiveDate>) -> Option<AverageValue> {
        let balances = self.facts.deduped_instant_facts(tag);
        let window: Vec<&NumericFact> = balances
            .into_iter()
            .rev()
            .filter(|(date, _)| as_of.map(|limit| *date <= limit).unwrap_or(true))
            .take(AVERAGE_POINTS)
            .map(|(_, fact)| fact)
            .collect();
        if window.is_empty() {
            return None;
        }

        let n = window.len();
        let average = window.iter().map(|f| f.value).sum::<f64>() / n as f64;
        Some(AverageValue {
            ending: window[0].value,
            average,
            method: if n == 1 {
                AverageMethod::SinglePeriod
            } else {
                AverageMethod::NPointAverage(n as u8)
            },
            from: window[n - 1].period_end,
            to: window[0].period_end,
        })
    }
}
