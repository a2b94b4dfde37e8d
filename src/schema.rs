use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Statement type codes as they appear in the presentation rows of the
/// SEC Financial Statement Data Sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum StatementType {
    #[schemars(description = "Balance sheet (point-in-time balances, stmt code BS)")]
    BalanceSheet,

    #[schemars(description = "Income statement (flows over a duration, stmt code IS)")]
    IncomeStatement,

    #[schemars(description = "Cash flow statement (stmt code CF)")]
    CashFlow,

    #[schemars(description = "Statement of stockholders' equity (stmt code EQ)")]
    Equity,

    #[schemars(description = "Statement of comprehensive income (stmt code CI)")]
    ComprehensiveIncome,
}

impl StatementType {
    /// Parses the `stmt` code from a presentation row. Codes outside the
    /// primary statements (SI, UN) return `None` and the row is ignored.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "BS" => Some(Self::BalanceSheet),
            "IS" => Some(Self::IncomeStatement),
            "CF" => Some(Self::CashFlow),
            "EQ" => Some(Self::Equity),
            "CI" => Some(Self::ComprehensiveIncome),
            _ => None,
        }
    }

    /// Point-in-time statements resolve instantaneous facts; everything else
    /// resolves duration facts.
    pub fn is_point_in_time(&self) -> bool {
        matches!(self, Self::BalanceSheet)
    }
}

/// Reporting cadence of a filing and of the statement series built from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Cadence {
    Quarterly,
    Annual,
}

/// One filing, as described by a `sub.txt` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub accession: String,
    pub cik: u64,
    pub name: String,
    pub sic: Option<u32>,
    pub form: String,
    pub fiscal_year: Option<i32>,
    /// Fiscal period code: FY, Q1, Q2 or Q3.
    pub fiscal_period: Option<String>,
    pub filed: NaiveDate,
    pub period_end: Option<NaiveDate>,
    /// True when this filing amends a previously filed report.
    pub amends: bool,
}

impl Submission {
    /// Cadence implied by the form type. Forms outside the 10-K/10-Q
    /// families (8-K, S-1, ...) carry no statement cadence.
    pub fn cadence(&self) -> Option<Cadence> {
        if self.form.starts_with("10-K") {
            Some(Cadence::Annual)
        } else if self.form.starts_with("10-Q") {
            Some(Cadence::Quarterly)
        } else {
            None
        }
    }
}

/// One consolidated numeric fact, as described by a `num.txt` row.
///
/// Rows carrying a co-registrant or segment marker are dropped during
/// ingestion, so every fact held here is a consolidated whole-entity value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericFact {
    pub accession: String,
    pub tag: String,
    pub version: String,
    pub period_end: NaiveDate,
    /// Duration in quarters: 0 for instantaneous balances, 1 for a single
    /// quarter, 4 for a full fiscal year.
    pub qtrs: u8,
    pub unit: String,
    pub value: f64,
}

impl NumericFact {
    pub fn is_instant(&self) -> bool {
        self.qtrs == 0
    }
}

/// One statement line of one filing, as described by a `pre.txt` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationItem {
    pub accession: String,
    pub report: u32,
    pub line: u32,
    pub statement: StatementType,
    pub tag: String,
    pub version: String,
    pub label: String,
    pub negating: bool,
    pub parenthetical: bool,
}

/// One stable cross-period statement row for a filer.
///
/// Canonical items are derived, never persisted independently: rebuilding
/// from the same filings always yields the same ordered list.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalItem {
    #[schemars(description = "Concept identifier (XBRL tag) this row resolves through")]
    pub tag: String,

    #[schemars(description = "Taxonomy version of the filing the row was taken from")]
    pub version: String,

    #[schemars(description = "Label as reported in the most recent filing that carried the row")]
    pub label: String,

    #[schemars(description = "Line position inherited from the source presentation")]
    pub line: u32,

    #[schemars(description = "Indentation depth for rendering (0 = flush left)")]
    pub indent: u32,

    #[schemars(
        description = "True when the row only appears in older filings and was merged into the canonical shape at its historical position"
    )]
    pub from_older_filing: bool,
}

/// Provenance flag attached to a resolved statement value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ValueFlag {
    #[schemars(
        description = "A fourth-quarter value could not be derived because one of the first three quarters is missing"
    )]
    DerivationUnavailable,

    #[schemars(
        description = "The value was derived using quarterly figures restated inside a later annual filing"
    )]
    Restated,

    #[schemars(
        description = "A share-count populated from the annual average because no direct quarterly figure exists"
    )]
    AnnualProxy,
}

/// One resolved cell of a period statement. `None` means the filer did not
/// report the row for this period; it is never coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatementCell {
    pub value: Option<f64>,
    pub flag: Option<ValueFlag>,
}

impl StatementCell {
    pub fn empty() -> Self {
        Self { value: None, flag: None }
    }

    pub fn plain(value: f64) -> Self {
        Self { value: Some(value), flag: None }
    }

    pub fn flagged(value: Option<f64>, flag: ValueFlag) -> Self {
        Self { value, flag: Some(flag) }
    }
}

/// One statement type for one period of one filer, with cells aligned to the
/// canonical item list of the owning [`StatementSeries`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PeriodStatement {
    #[schemars(description = "Display label, e.g. \"Q3 2024\" or \"FY 2024\"")]
    pub label: String,

    #[schemars(description = "Form type of the source filing, e.g. 10-Q")]
    pub form: String,

    pub filed: NaiveDate,
    pub period_end: NaiveDate,
    pub accession: String,

    #[schemars(description = "One cell per canonical item, in canonical order")]
    pub cells: Vec<StatementCell>,
}

/// An ordered canonical shape plus every available period for one
/// (statement type, cadence) pair of one filer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatementSeries {
    pub statement: StatementType,
    pub cadence: Cadence,
    pub items: Vec<CanonicalItem>,

    #[schemars(description = "Most recent period first")]
    pub periods: Vec<PeriodStatement>,
}

/// How a trailing-twelve-month total was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum TtmMethod {
    #[schemars(description = "Sum of four consecutive directly reported quarters")]
    DirectSum,

    #[schemars(description = "Annual total minus the first three quarters, then rolled forward")]
    Derived,
}

/// A derived trailing-twelve-month flow aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TtmValue {
    pub total: f64,
    pub method: TtmMethod,

    #[schemars(description = "Period end of the most recent contributing quarter")]
    pub period_end: NaiveDate,

    #[schemars(description = "Form types that contributed quarters, deduplicated")]
    pub forms: Vec<String>,
}

/// How an average balance was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AverageMethod {
    #[schemars(description = "Only one qualifying balance was available")]
    SinglePeriod,

    #[schemars(description = "Mean of the N most recent qualifying period-end balances, N <= 5")]
    NPointAverage(u8),
}

/// A derived balance aggregate: the latest balance and its trailing average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AverageValue {
    pub ending: f64,
    pub average: f64,
    pub method: AverageMethod,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// One computed ratio. An implausible result is nulled with the reason in
/// `flag`; the rest of the filer record is untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Ratio {
    pub value: Option<f64>,
    pub flag: Option<String>,
}

impl Ratio {
    pub fn of(value: Option<f64>) -> Self {
        Self { value, flag: None }
    }
}

/// Latest, TTM and average values for the fixed concept set the ratio layer
/// consumes. `None` throughout means "not reported", never zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Fundamentals {
    pub net_income_ttm: Option<TtmValue>,
    pub net_interest_income_ttm: Option<TtmValue>,
    pub noninterest_income_ttm: Option<TtmValue>,
    pub noninterest_expense_ttm: Option<TtmValue>,
    pub eps_diluted_ttm: Option<TtmValue>,

    pub equity: Option<AverageValue>,
    pub assets: Option<AverageValue>,

    pub loans_latest: Option<f64>,
    pub deposits_latest: Option<f64>,
    pub shares_outstanding_latest: Option<f64>,
}

/// Ratios derived from [`Fundamentals`], each independently flaggable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RatioSet {
    #[schemars(description = "TTM net income over 5-point average equity")]
    pub return_on_equity: Ratio,

    #[schemars(description = "TTM net income over 5-point average assets")]
    pub return_on_assets: Ratio,

    #[schemars(description = "Noninterest expense over net interest income plus noninterest income")]
    pub efficiency_ratio: Ratio,

    pub equity_to_assets: Ratio,
    pub loans_to_deposits: Ratio,
    pub book_value_per_share: Ratio,
    pub earnings_per_share: Ratio,

    #[schemars(
        description = "Intrinsic-value estimate requiring positive per-share earnings and positive per-share net assets"
    )]
    pub graham_number: Ratio,
}

/// The full per-filer output contract. Downstream consumers (screener,
/// static pages) read this record and never touch raw facts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FilerRecord {
    pub cik: u64,
    pub name: String,
    pub sic: Option<u32>,
    pub fundamentals: Fundamentals,
    pub ratios: RatioSet,
    pub statements: Vec<StatementSeries>,
}

impl FilerRecord {
    /// JSON Schema of the output contract, for the rendering layers.
    pub fn contract_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FilerRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::contract_schema())
    }
}
