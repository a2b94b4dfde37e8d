use crate::ingestion::FilerFacts;
use crate::schema::{NumericFact, StatementSeries, TtmMethod, TtmValue, ValueFlag};
use crate::utils::quarter_ordinal;
use itertools::Itertools;
use log::debug;

/// Trailing-twelve-month totals over a concept's full fact history for one
/// filer.
///
/// Two strategies, tried in order. Neither succeeding means no TTM value:
/// there is deliberately no annual-only fallback, so a quarterly-cadence
/// total is never silently mixed with a stale annual one.
pub struct TtmCalculator<'a> {
    facts: &'a FilerFacts,
}

impl<'a> TtmCalculator<'a> {
    pub fn new(facts: &'a FilerFacts) -> Self {
        Self { facts }
    }

    pub fn ttm(&self, tag: &str) -> Option<TtmValue> {
        self.direct_sum(tag).or_else(|| self.derived(tag))
    }

    /// Strategy 1: sum of the four most recent quarterly facts, accepted
    /// only when their (year, quarter) ordinals are pairwise consecutive.
    fn direct_sum(&self, tag: &str) -> Option<TtmValue> {
        let quarters = self.facts.deduped_flow_facts(tag, 1);
        if quarters.len() < 4 {
            return None;
        }

        let recent: Vec<(i32, &NumericFact)> = quarters
            .iter()
            .rev()
            .take(4)
            .map(|(&ordinal, &fact)| (ordinal, fact))
            .collect();
        let consecutive = recent
            .windows(2)
            .all(|pair| pair[0].0 - pair[1].0 == 1);
        if !consecutive {
            debug!(
                "Direct TTM rejected for {}: quarters are not consecutive",
                tag
            );
            return None;
        }

        Some(TtmValue {
            total: recent.iter().map(|(_, f)| f.value).sum(),
            method: TtmMethod::DirectSum,
            period_end: recent[0].1.period_end,
            forms: self.forms(recent.iter().map(|(_, f)| *f)),
        })
    }

    /// Strategy 2: find an annual fact whose first three fiscal quarters
    /// have quarterly facts, derive the fourth quarter, then prefer rolling
    /// forward with the following year's first three quarters.
    fn derived(&self, tag: &str) -> Option<TtmValue> {
        let quarters = self.facts.deduped_flow_facts(tag, 1);
        let annuals = self.facts.deduped_flow_facts(tag, 4);

        for (&annual_ordinal, &annual) in annuals.iter().rev() {
            let first_three: Option<Vec<&NumericFact>> = (annual_ordinal - 3..annual_ordinal)
                .map(|ordinal| self.quarter_for_derivation(tag, annual, ordinal, &quarters))
                .collect();
            let Some(first_three) = first_three else {
                continue;
            };

            let q4 = annual.value - first_three.iter().map(|f| f.value).sum::<f64>();

            let following: Option<Vec<&NumericFact>> = (annual_ordinal + 1..=annual_ordinal + 3)
                .map(|ordinal| quarters.get(&ordinal).copied())
                .collect();

            return Some(match following {
                // TTM ending at the following year's third quarter.
                Some(next) => TtmValue {
                    total: q4 + next.iter().map(|f| f.value).sum::<f64>(),
                    method: TtmMethod::Derived,
                    period_end: next.last().map(|f| f.period_end)?,
                    forms: self.forms(next.iter().copied().chain([annual])),
                },
                // TTM ending at fiscal year-end.
                None => TtmValue {
                    total: first_three.iter().map(|f| f.value).sum::<f64>() + q4,
                    method: TtmMethod::Derived,
                    period_end: annual.period_end,
                    forms: self.forms(first_three.iter().copied().chain([annual])),
                },
            });
        }
        None
    }

    /// A first-three quarter for deriving Q4: a figure restated inside the
    /// annual filing wins over the originally filed one.
    fn quarter_for_derivation(
        &self,
        tag: &str,
        annual: &NumericFact,
        ordinal: i32,
        originals: &std::collections::BTreeMap<i32, &'a NumericFact>,
    ) -> Option<&NumericFact> {
        let restated = self
            .facts
            .facts_for(&annual.accession, tag)
            .filter(|f| f.qtrs == 1 && quarter_ordinal(f.period_end) == ordinal)
            .min_by(|a, b| (a.period_end, &a.version).cmp(&(b.period_end, &b.version)));
        restated.or_else(|| originals.get(&ordinal).copied())
    }

    fn forms<'f>(&self, facts: impl Iterator<Item = &'f NumericFact>) -> Vec<String> {
        facts
            .filter_map(|f| self.facts.submission(&f.accession))
            .map(|s| s.form.clone())
            .sorted()
            .dedup()
            .collect()
    }
}

/// The statement-level variant: sums the four most recent quarterly cells of
/// one canonical item, inheriting whatever derivation and restatement logic
/// produced those cells.
pub fn ttm_from_statements(series: &StatementSeries, item_index: usize) -> Option<TtmValue> {
    let usable: Vec<_> = series
        .periods
        .iter()
        .filter_map(|period| {
            let cell = period.cells.get(item_index)?;
            if cell.flag == Some(ValueFlag::DerivationUnavailable) {
                return None;
            }
            cell.value.map(|value| (period, value, cell.flag))
        })
        .take(4)
        .collect();
    if usable.len() < 4 {
        return None;
    }

    let consecutive = usable.windows(2).all(|pair| {
        quarter_ordinal(pair[0].0.period_end) - quarter_ordinal(pair[1].0.period_end) == 1
    });
    if !consecutive {
        return None;
    }

    let derived = usable.iter().any(|(_, _, flag)| flag.is_some());
    Some(TtmValue {
        total: usable.iter().map(|(_, value, _)| value).sum(),
        method: if derived {
            TtmMethod::Derived
        } else {
            TtmMethod::DirectSum
        },
        period_end: usable[0].0.period_end,
        forms: usable
            .iter()
            .map(|(period, _, _)| period.form.clone())
            .sorted()
            .dedup()
            .collect(),
    })
}
