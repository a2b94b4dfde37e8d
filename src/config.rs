use crate::error::{EngineError, Result};
use crate::schema::StatementType;
use std::collections::{BTreeMap, BTreeSet};

/// Ordered candidate tags per metric input. Each list is evaluated
/// front-to-back by the first-success combinator, with the equivalence
/// relation consulted behind every candidate.
#[derive(Debug, Clone)]
pub struct ConceptGroups {
    pub net_income: Vec<String>,
    pub equity: Vec<String>,
    pub assets: Vec<String>,
    pub net_interest_income: Vec<String>,
    pub noninterest_income: Vec<String>,
    pub noninterest_expense: Vec<String>,
    pub loans: Vec<String>,
    pub deposits: Vec<String>,
    pub eps_diluted: Vec<String>,
    pub shares_outstanding: Vec<String>,
}

impl Default for ConceptGroups {
    fn default() -> Self {
        let tags = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            net_income: tags(&["NetIncomeLoss", "ProfitLoss"]),
            equity: tags(&["StockholdersEquity"]),
            assets: tags(&["Assets"]),
            net_interest_income: tags(&["InterestIncomeExpenseNet"]),
            noninterest_income: tags(&["NoninterestIncome"]),
            noninterest_expense: tags(&["NoninterestExpense", "OperatingExpenses"]),
            loans: tags(&[
                "LoansAndLeasesReceivableNetReportedAmount",
                "NotesReceivableNet",
            ]),
            deposits: tags(&["Deposits"]),
            eps_diluted: tags(&["EarningsPerShareDiluted", "EarningsPerShareBasicAndDiluted"]),
            shares_outstanding: tags(&["CommonStockSharesOutstanding"]),
        }
    }
}

/// Closed plausible range per computed ratio. A result outside its range is
/// nulled and flagged; nothing else in the record is discarded.
#[derive(Debug, Clone, Copy)]
pub struct PlausibilityBounds {
    pub return_on_equity: (f64, f64),
    pub return_on_assets: (f64, f64),
    pub efficiency_ratio: (f64, f64),
    pub equity_to_assets: (f64, f64),
    pub loans_to_deposits: (f64, f64),
    pub book_value_per_share: (f64, f64),
    pub earnings_per_share: (f64, f64),
    pub graham_number: (f64, f64),
}

impl Default for PlausibilityBounds {
    fn default() -> Self {
        Self {
            return_on_equity: (-1.0, 1.0),
            return_on_assets: (-0.25, 0.25),
            efficiency_ratio: (0.0, 2.0),
            equity_to_assets: (0.0, 1.0),
            loans_to_deposits: (0.0, 5.0),
            book_value_per_share: (0.0, 10_000.0),
            earnings_per_share: (-1_000.0, 1_000.0),
            graham_number: (0.0, 10_000.0),
        }
    }
}

/// Immutable configuration passed into the pipeline entry point. Nothing in
/// the engine reads ambient constants; alternate populations, equivalence
/// tables and bounds are all exercised through this value.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SIC codes selecting the filer population.
    pub industry_codes: BTreeSet<u32>,

    /// Statement types to build canonical shapes and period statements for.
    pub statement_types: Vec<StatementType>,

    /// Curated identifier-equivalence pairs: known naming variants for the
    /// same concept across filers and taxonomy revisions.
    pub curated_equivalences: Vec<(String, String)>,

    /// Anchor concepts per statement type used when scoring candidate
    /// reports, plus the scoring constants. The scoring shape is
    /// `items + anchor_bonus * anchors_present - report_penalty * report`.
    pub anchor_tags: BTreeMap<StatementType, Vec<String>>,
    pub anchor_bonus: f64,
    pub report_penalty: f64,

    /// Period-average concepts that must never be derived by subtraction.
    pub share_count_tags: BTreeSet<String>,

    pub concepts: ConceptGroups,
    pub bounds: PlausibilityBounds,

    /// Worker pool size for the per-filer passes. 0 picks the library
    /// default (one worker per logical CPU).
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let pair = |a: &str, b: &str| (a.to_string(), b.to_string());

        let mut anchor_tags = BTreeMap::new();
        anchor_tags.insert(
            StatementType::BalanceSheet,
            vec![
                "Assets".to_string(),
                "LiabilitiesAndStockholdersEquity".to_string(),
                "StockholdersEquity".to_string(),
            ],
        );
        anchor_tags.insert(
            StatementType::IncomeStatement,
            vec![
                "NetIncomeLoss".to_string(),
                "InterestIncomeExpenseNet".to_string(),
            ],
        );

        Self {
            // Commercial banks, savings institutions and their holding
            // companies.
            industry_codes: [6020, 6021, 6022, 6029, 6035, 6036, 6712]
                .into_iter()
                .collect(),
            statement_types: vec![StatementType::BalanceSheet, StatementType::IncomeStatement],
            curated_equivalences: vec![
                pair("NetIncomeLoss", "ProfitLoss"),
                pair(
                    "StockholdersEquity",
                    "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
                ),
                // 2020 credit-loss taxonomy renamed the loan balance tags.
                pair(
                    "LoansAndLeasesReceivableNetReportedAmount",
                    "FinancingReceivableExceptAccruedInterestAfterAllowanceForCreditLoss",
                ),
                pair("LoansAndLeasesReceivableNetReportedAmount", "NotesReceivableNet"),
                pair("Deposits", "DepositsDomestic"),
                pair("EarningsPerShareDiluted", "EarningsPerShareBasicAndDiluted"),
                pair(
                    "WeightedAverageNumberOfDilutedSharesOutstanding",
                    "WeightedAverageNumberOfDilutedSharesOutstandingAdjustment",
                ),
                pair("CommonStockSharesOutstanding", "CommonStockSharesIssued"),
            ],
            anchor_tags,
            anchor_bonus: 10.0,
            report_penalty: 0.1,
            share_count_tags: [
                "WeightedAverageNumberOfDilutedSharesOutstanding",
                "WeightedAverageNumberOfSharesOutstandingBasic",
                "CommonStockSharesOutstanding",
                "CommonStockSharesIssued",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            concepts: ConceptGroups::default(),
            bounds: PlausibilityBounds::default(),
            workers: 0,
        }
    }
}

impl EngineConfig {
    /// Checks internal consistency before a run. Called by the engine
    /// constructor so a bad configuration fails loudly, once.
    pub fn validate(&self) -> Result<()> {
        if self.industry_codes.is_empty() {
            return Err(EngineError::InvalidConfig(
                "industry allow-list is empty; no filer would be ingested".to_string(),
            ));
        }
        if self.statement_types.is_empty() {
            return Err(EngineError::InvalidConfig(
                "no statement types configured".to_string(),
            ));
        }
        if self.anchor_bonus < 0.0 || self.report_penalty < 0.0 {
            return Err(EngineError::InvalidConfig(
                "scoring constants must be non-negative".to_string(),
            ));
        }
        for (a, b) in &self.curated_equivalences {
            if a == b {
                return Err(EngineError::InvalidConfig(format!(
                    "self-referential equivalence pair: {}",
                    a
                )));
            }
        }
        let ranges = [
            ("return_on_equity", self.bounds.return_on_equity),
            ("return_on_assets", self.bounds.return_on_assets),
            ("efficiency_ratio", self.bounds.efficiency_ratio),
            ("equity_to_assets", self.bounds.equity_to_assets),
            ("loans_to_deposits", self.bounds.loans_to_deposits),
            ("book_value_per_share", self.bounds.book_value_per_share),
            ("earnings_per_share", self.bounds.earnings_per_share),
            ("graham_number", self.bounds.graham_number),
        ];
        for (name, (lo, hi)) in ranges {
            if lo >= hi {
                return Err(EngineError::InvalidConfig(format!(
                    "empty plausible range for {}: {}..{}",
                    name, lo, hi
                )));
            }
        }
        Ok(())
    }
}
