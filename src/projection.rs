use crate::config::EngineConfig;
use crate::equivalence::TagEquivalences;
use crate::ingestion::FilerFacts;
use crate::schema::{
    Cadence, CanonicalItem, NumericFact, PeriodStatement, StatementCell, StatementType, Submission,
    ValueFlag,
};
use crate::utils::{period_label, quarter_ordinal};
use chrono::NaiveDate;

/// Resolves canonical-item values for the periods of one filer.
///
/// Real filings are inconsistent about which metadata accompanies
/// comparative-period facts, so every lookup walks a relaxation ladder:
/// exact (accession + duration + period end + taxonomy version), then
/// without the version, then without the period end, then without duration
/// exactness. Only after the ladder fails for the item's own tag does the
/// equivalence relation supply alternate tags, each walked through the same
/// ladder.
pub struct Projector<'a> {
    facts: &'a FilerFacts,
    equivalences: &'a TagEquivalences,
    config: &'a EngineConfig,
}

impl<'a> Projector<'a> {
    pub fn new(
        facts: &'a FilerFacts,
        equivalences: &'a TagEquivalences,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            facts,
            equivalences,
            config,
        }
    }

    /// Projects one submission onto the canonical shape of a statement
    /// series. Annual submissions projected onto a quarterly series go
    /// through fourth-quarter derivation. Returns `None` for submissions
    /// without a period-end date.
    pub fn project(
        &self,
        sub: &Submission,
        statement: StatementType,
        cadence: Cadence,
        items: &[CanonicalItem],
    ) -> Option<PeriodStatement> {
        let period_end = sub.period_end?;

        let q4 = cadence == Cadence::Quarterly
            && sub.cadence() == Some(Cadence::Annual)
            && !statement.is_point_in_time();

        let cells = items
            .iter()
            .map(|item| {
                if q4 {
                    self.q4_cell(sub, period_end, item)
                } else {
                    let qtrs = target_duration(statement, sub, cadence);
                    self.resolve_cell(&sub.accession, period_end, qtrs, item)
                }
            })
            .collect();

        Some(PeriodStatement {
            label: period_label(sub.fiscal_year, sub.fiscal_period.as_deref(), period_end, cadence),
            form: sub.form.clone(),
            filed: sub.filed,
            period_end,
            accession: sub.accession.clone(),
            cells,
        })
    }

    fn resolve_cell(
        &self,
        accession: &str,
        period_end: NaiveDate,
        qtrs: u8,
        item: &CanonicalItem,
    ) -> StatementCell {
        let value = self.equivalences.resolve_with(&item.tag, |tag| {
            self.lookup_relaxed(accession, tag, &item.version, qtrs, period_end)
        });
        match value {
            Some(v) => StatementCell::plain(v),
            None => StatementCell::empty(),
        }
    }

    /// The relaxation ladder for one (accession, tag) pair.
    fn lookup_relaxed(
        &self,
        accession: &str,
        tag: &str,
        version: &str,
        qtrs: u8,
        period_end: NaiveDate,
    ) -> Option<f64> {
        let mut facts: Vec<&NumericFact> = self.facts.facts_for(accession, tag).collect();
        if facts.is_empty() {
            return None;
        }
        facts.sort_by(|a, b| {
            (a.period_end, a.qtrs, &a.version).cmp(&(b.period_end, b.qtrs, &b.version))
        });

        let exact = facts
            .iter()
            .find(|f| f.qtrs == qtrs && f.period_end == period_end && f.version == version);
        let no_version = facts
            .iter()
            .find(|f| f.qtrs == qtrs && f.period_end == period_end);
        // Comparative prior-period columns are exactly what this step can
        // reach, so it only ever looks backwards from the filing's own
        // period end.
        let no_period_end = facts
            .iter()
            .filter(|f| f.qtrs == qtrs && f.period_end <= period_end)
            .last();
        let no_duration = facts
            .iter()
            .filter(|f| f.period_end == period_end)
            .min_by_key(|f| (i16::from(f.qtrs) - i16::from(qtrs)).abs());

        exact
            .or(no_version)
            .or(no_period_end)
            .or(no_duration)
            .map(|f| f.value)
    }

    /// Fourth-quarter resolution for one item of an annual filing.
    ///
    /// A direct quarterly fact at the filing's own period end always wins:
    /// after an undisclosed accounting-method change, subtraction could be
    /// wrong while the reported figure cannot. Otherwise the value is
    /// derived as annual minus the first three quarters, preferring
    /// quarterly figures restated inside the annual filing itself over the
    /// originally filed ones.
    fn q4_cell(&self, sub: &Submission, period_end: NaiveDate, item: &CanonicalItem) -> StatementCell {
        if let Some(direct) = self.equivalences.resolve_with(&item.tag, |tag| {
            self.direct_quarter(&sub.accession, tag, period_end)
        }) {
            return StatementCell::plain(direct);
        }

        if self.is_share_count(&item.tag) {
            // Period averages are not flows; subtracting them is
            // meaningless. The annual average stands in, flagged.
            let annual = self.equivalences.resolve_with(&item.tag, |tag| {
                self.lookup_relaxed(&sub.accession, tag, &item.version, 4, period_end)
            });
            return match annual {
                Some(v) => StatementCell::flagged(Some(v), ValueFlag::AnnualProxy),
                None => StatementCell::empty(),
            };
        }

        let annual = self.equivalences.resolve_with(&item.tag, |tag| {
            self.lookup_relaxed(&sub.accession, tag, &item.version, 4, period_end)
        });
        let Some(annual) = annual else {
            // Not reported at all for this fiscal year; nothing to derive
            // from.
            return StatementCell::empty();
        };

        let end_ordinal = quarter_ordinal(period_end);
        let mut sum = 0.0;
        let mut used_restated = false;
        for ordinal in end_ordinal - 3..end_ordinal {
            let quarter = self.equivalences.resolve_with(&item.tag, |tag| {
                self.quarter_with_restatement(&sub.accession, tag, ordinal)
            });
            match quarter {
                Some((value, restated)) => {
                    sum += value;
                    used_restated |= restated;
                }
                None => {
                    return StatementCell::flagged(None, ValueFlag::DerivationUnavailable);
                }
            }
        }

        let value = annual - sum;
        if used_restated {
            StatementCell::flagged(Some(value), ValueFlag::Restated)
        } else {
            StatementCell::plain(value)
        }
    }

    /// A quarterly fact dated exactly at the given period end, preferring
    /// the annual filing's own figure, then the most recently filed one.
    fn direct_quarter(&self, accession: &str, tag: &str, period_end: NaiveDate) -> Option<f64> {
        if let Some(own) = self
            .facts
            .facts_for(accession, tag)
            .filter(|f| f.qtrs == 1 && f.period_end == period_end)
            .min_by(|a, b| a.version.cmp(&b.version))
        {
            return Some(own.value);
        }
        self.facts
            .deduped_flow_facts(tag, 1)
            .get(&quarter_ordinal(period_end))
            .filter(|f| f.period_end == period_end)
            .map(|f| f.value)
    }

    /// One of the first three quarters for a Q4 derivation. A figure
    /// restated inside the annual filing (same accession, quarterly
    /// duration, that quarter's period end) beats the originally filed one.
    fn quarter_with_restatement(
        &self,
        annual_accession: &str,
        tag: &str,
        ordinal: i32,
    ) -> Option<(f64, bool)> {
        let restated = self
            .facts
            .facts_for(annual_accession, tag)
            .filter(|f| f.qtrs == 1 && quarter_ordinal(f.period_end) == ordinal)
            .min_by(|a, b| (a.period_end, &a.version).cmp(&(b.period_end, &b.version)));
        if let Some(fact) = restated {
            return Some((fact.value, true));
        }
        self.facts
            .deduped_flow_facts(tag, 1)
            .get(&ordinal)
            .map(|f| (f.value, false))
    }

    fn is_share_count(&self, tag: &str) -> bool {
        if self.config.share_count_tags.contains(tag) {
            return true;
        }
        self.equivalences
            .alternates(tag)
            .iter()
            .any(|t| self.config.share_count_tags.contains(t))
    }
}

fn target_duration(statement: StatementType, sub: &Submission, cadence: Cadence) -> u8 {
    if statement.is_point_in_time() {
        0
    } else if cadence == Cadence::Annual && sub.cadence() == Some(Cadence::Annual) {
        4
    } else {
        1
    }
}
