use crate::canonical::build_canonical;
use crate::config::EngineConfig;
use crate::equivalence::TagEquivalences;
use crate::error::{EngineError, Result};
use crate::ingestion::{load_quarter, FactStore, FilerFacts};
use crate::metrics::{compute_fundamentals, compute_ratios};
use crate::projection::Projector;
use crate::schema::{Cadence, FilerRecord, StatementSeries, Submission};
use chrono::NaiveDate;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The pipeline: quarters stream in sequentially, filers fan out across a
/// bounded worker pool, records come back in CIK order regardless of
/// scheduling.
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the full pipeline over the given quarter directories. A quarter
    /// that cannot be ingested is skipped with a warning; it never fails the
    /// run.
    pub fn run(&self, quarters: &[PathBuf]) -> Result<Vec<FilerRecord>> {
        let mut store = FactStore::new();
        for dir in quarters {
            match load_quarter(dir, &self.config, &mut store) {
                Ok(summary) => info!(
                    "Ingested {}: {} submissions, {} facts, {} presentation rows",
                    dir.display(),
                    summary.submissions,
                    summary.facts,
                    summary.presentation_items
                ),
                Err(e) => warn!("Skipping quarter {}: {}", dir.display(), e),
            }
        }

        let filers = store.into_filers();
        info!("Building records for {} filers", filers.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| EngineError::InvalidConfig(format!("worker pool: {}", e)))?;

        let mut records: Vec<FilerRecord> = pool.install(|| {
            filers
                .par_iter()
                .map(|facts| self.build_filer(facts))
                .collect()
        });
        records.sort_by_key(|r| r.cik);
        Ok(records)
    }

    /// Assembles one filer's record. Sequential within the filer: the
    /// canonical pass learns equivalences first, then projection and the
    /// metric passes resolve against the frozen relation.
    fn build_filer(&self, facts: &FilerFacts) -> FilerRecord {
        let mut equivalences = TagEquivalences::from_pairs(&self.config.curated_equivalences);

        let mut shapes = Vec::new();
        for &statement in &self.config.statement_types {
            for cadence in [Cadence::Quarterly, Cadence::Annual] {
                let items =
                    build_canonical(facts, cadence, statement, &self.config, &mut equivalences);
                shapes.push((statement, cadence, items));
            }
        }

        let projector = Projector::new(facts, &equivalences, &self.config);
        let mut statements = Vec::new();
        for (statement, cadence, items) in shapes {
            if items.is_empty() {
                continue;
            }
            let periods = self
                .period_sources(facts, cadence)
                .into_iter()
                .filter_map(|sub| projector.project(sub, statement, cadence, &items))
                .collect();
            statements.push(StatementSeries {
                statement,
                cadence,
                items,
                periods,
            });
        }

        let fundamentals = compute_fundamentals(facts, &equivalences, &self.config);
        let ratios = compute_ratios(&fundamentals, &self.config);

        FilerRecord {
            cik: facts.cik,
            name: facts.name.clone(),
            sic: facts.sic,
            fundamentals,
            ratios,
            statements,
        }
    }

    /// Submissions contributing periods to a series, most recent first.
    /// The quarterly series also draws on annual filings: they carry the
    /// fourth fiscal quarter, which has no 10-Q of its own.
    fn period_sources<'f>(&self, facts: &'f FilerFacts, cadence: Cadence) -> Vec<&'f Submission> {
        match cadence {
            Cadence::Annual => facts.primary_submissions(Cadence::Annual),
            Cadence::Quarterly => {
                let mut by_period: BTreeMap<NaiveDate, &Submission> = BTreeMap::new();
                for sub in facts.primary_submissions(Cadence::Quarterly) {
                    if let Some(period_end) = sub.period_end {
                        by_period.insert(period_end, sub);
                    }
                }
                for sub in facts.primary_submissions(Cadence::Annual) {
                    if let Some(period_end) = sub.period_end {
                        // A directly filed quarterly report wins over the
                        // annual filing for the same period end.
                        by_period.entry(period_end).or_insert(sub);
                    }
                }
                by_period.into_values().rev().collect()
            }
        }
    }
}
