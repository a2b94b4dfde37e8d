use asreported::{
    persist, run_pipeline, Cadence, EngineConfig, StatementType, TtmMethod, ValueFlag,
};
use std::fs;
use std::path::{Path, PathBuf};

fn write_quarter(dir: &Path, sub: &str, num: &str, pre: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("sub.txt"), sub).unwrap();
    fs::write(dir.join("num.txt"), num).unwrap();
    fs::write(dir.join("pre.txt"), pre).unwrap();
}

const SUB_HEADER: &str = "adsh\tcik\tname\tsic\tform\tperiod\tfy\tfp\tfiled\tprevrpt\n";
const NUM_HEADER: &str = "adsh\ttag\tversion\tddate\tqtrs\tuom\tcoreg\tsegments\tvalue\n";
const PRE_HEADER: &str = "adsh\treport\tline\tstmt\tinpth\ttag\tversion\tplabel\tnegating\n";

struct Quarter {
    sub: String,
    num: String,
    pre: String,
}

impl Quarter {
    fn new() -> Self {
        Self {
            sub: SUB_HEADER.to_string(),
            num: NUM_HEADER.to_string(),
            pre: PRE_HEADER.to_string(),
        }
    }

    fn filing(&mut self, adsh: &str, cik: u64, name: &str, sic: u32, form: &str, period: &str, fy: i32, fp: &str, filed: &str) {
        self.sub.push_str(&format!(
            "{adsh}\t{cik}\t{name}\t{sic}\t{form}\t{period}\t{fy}\t{fp}\t{filed}\t0\n"
        ));
    }

    fn fact(&mut self, adsh: &str, tag: &str, ddate: &str, qtrs: u8, value: f64) {
        self.num.push_str(&format!(
            "{adsh}\t{tag}\tus-gaap/2024\t{ddate}\t{qtrs}\tUSD\t\t\t{value}\n"
        ));
    }

    fn line(&mut self, adsh: &str, report: u32, line: u32, stmt: &str, tag: &str, label: &str) {
        self.pre.push_str(&format!(
            "{adsh}\t{report}\t{line}\t{stmt}\t0\t{tag}\tus-gaap/2024\t{label}\t0\n"
        ));
    }

    fn write(&self, dir: &Path) {
        write_quarter(dir, &self.sub, &self.num, &self.pre);
    }
}

/// One quarterly 10-Q filing of the test bank, with a full income statement
/// and balance sheet.
fn quarterly_filing(q: &mut Quarter, adsh: &str, ddate: &str, fy: i32, fp: &str, filed: &str, ni: f64, eps: f64, equity: f64, assets: f64) {
    q.filing(adsh, 1000, "First Test Bancorp", 6022, "10-Q", ddate, fy, fp, filed);
    q.fact(adsh, "InterestIncomeExpenseNet", ddate, 1, 40.0);
    q.fact(adsh, "NoninterestIncome", ddate, 1, 10.0);
    q.fact(adsh, "NoninterestExpense", ddate, 1, 30.0);
    q.fact(adsh, "NetIncomeLoss", ddate, 1, ni);
    q.fact(adsh, "EarningsPerShareDiluted", ddate, 1, eps);
    q.fact(adsh, "StockholdersEquity", ddate, 0, equity);
    q.fact(adsh, "Assets", ddate, 0, assets);
    for (line, tag, label) in income_lines() {
        q.line(adsh, 2, line, "IS", tag, label);
    }
    q.line(adsh, 1, 1, "BS", "Assets", "Total assets");
    q.line(adsh, 1, 2, "BS", "StockholdersEquity", "Total stockholders' equity");
}

fn income_lines() -> [(u32, &'static str, &'static str); 5] {
    [
        (1, "InterestIncomeExpenseNet", "Net interest income"),
        (2, "NoninterestIncome", "Noninterest income"),
        (3, "NoninterestExpense", "Noninterest expense"),
        (4, "NetIncomeLoss", "Net income"),
        (5, "EarningsPerShareDiluted", "Diluted earnings per share"),
    ]
}

/// Writes fiscal 2024 of the test bank across two quarter directories:
/// the three 10-Qs land in `2024q3`, the 10-K in `2025q1`. The 10-K
/// restates first-quarter net income from 20 to 22 and carries no direct
/// Q4 net income fact, so Q4 must be derived.
fn write_test_bank(root: &Path) -> Vec<PathBuf> {
    let mut early = Quarter::new();
    quarterly_filing(&mut early, "acc-q1", "20240331", 2024, "Q1", "20240505", 20.0, 0.22, 980.0, 9800.0);
    quarterly_filing(&mut early, "acc-q2", "20240630", 2024, "Q2", "20240805", 25.0, 0.25, 1000.0, 10000.0);
    quarterly_filing(&mut early, "acc-q3", "20240930", 2024, "Q3", "20241105", 30.0, 0.30, 1020.0, 10200.0);
    // A manufacturer in the same files: outside the bank allow-list.
    early.filing("acc-mfg", 2000, "Widget Works", 3714, "10-Q", "20240930", 2024, "Q3", "20241105");
    early.fact("acc-mfg", "Assets", "20240930", 0, 55_000.0);

    let mut late = Quarter::new();
    late.filing("acc-fy", 1000, "First Test Bancorp", 6022, "10-K", "20241231", 2024, "FY", "20250301");
    late.fact("acc-fy", "InterestIncomeExpenseNet", "20241231", 4, 160.0);
    late.fact("acc-fy", "NoninterestIncome", "20241231", 4, 40.0);
    late.fact("acc-fy", "NoninterestExpense", "20241231", 4, 120.0);
    late.fact("acc-fy", "NetIncomeLoss", "20241231", 4, 100.0);
    late.fact("acc-fy", "EarningsPerShareDiluted", "20241231", 4, 1.00);
    // Restated first quarter inside the annual filing.
    late.fact("acc-fy", "NetIncomeLoss", "20240331", 1, 22.0);
    late.fact("acc-fy", "StockholdersEquity", "20241231", 0, 1040.0);
    late.fact("acc-fy", "Assets", "20241231", 0, 10_400.0);
    late.fact("acc-fy", "Deposits", "20241231", 0, 8000.0);
    late.fact("acc-fy", "LoansAndLeasesReceivableNetReportedAmount", "20241231", 0, 7000.0);
    late.fact("acc-fy", "CommonStockSharesOutstanding", "20241231", 0, 100.0);
    for (line, tag, label) in income_lines() {
        late.line("acc-fy", 2, line, "IS", tag, label);
    }
    late.line("acc-fy", 1, 1, "BS", "Assets", "Total assets");
    late.line("acc-fy", 1, 2, "BS", "StockholdersEquity", "Total stockholders' equity");

    let q3_dir = root.join("2024q3");
    let q1_dir = root.join("2025q1");
    early.write(&q3_dir);
    late.write(&q1_dir);
    vec![q3_dir, q1_dir]
}

#[test]
fn test_full_reconstruction_of_a_fiscal_year() {
    let root = tempfile::tempdir().unwrap();
    let quarters = write_test_bank(root.path());

    let records = run_pipeline(EngineConfig::default(), &quarters).unwrap();

    // The manufacturer is filtered out by the industry allow-list.
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.cik, 1000);
    assert_eq!(record.name, "First Test Bancorp");
    assert_eq!(record.sic, Some(6022));

    // TTM net income: derived, using the restated Q1, summing back to the
    // annual total exactly.
    let ni = record.fundamentals.net_income_ttm.as_ref().unwrap();
    assert_eq!(ni.total, 100.0);
    assert_eq!(ni.method, TtmMethod::Derived);

    // Quarterly income series: Q4 first, sourced from the 10-K, derived as
    // 100 - (22 + 25 + 30) with the restatement flag.
    let income = record
        .statements
        .iter()
        .find(|s| s.statement == StatementType::IncomeStatement && s.cadence == Cadence::Quarterly)
        .expect("quarterly income series");
    assert_eq!(income.periods.len(), 4);
    let q4 = &income.periods[0];
    assert_eq!(q4.label, "Q4 2024");
    assert_eq!(q4.form, "10-K");
    let ni_index = income.items.iter().position(|i| i.tag == "NetIncomeLoss").unwrap();
    assert_eq!(q4.cells[ni_index].value, Some(23.0));
    assert_eq!(q4.cells[ni_index].flag, Some(ValueFlag::Restated));

    // The balance sheet series resolves the filing's own column, not the
    // comparative one.
    let balance = record
        .statements
        .iter()
        .find(|s| s.statement == StatementType::BalanceSheet && s.cadence == Cadence::Quarterly)
        .expect("quarterly balance sheet series");
    let assets_index = balance.items.iter().position(|i| i.tag == "Assets").unwrap();
    assert_eq!(balance.periods[0].cells[assets_index].value, Some(10_400.0));

    // Ratios from the 4-point averages: ROE = 100 / 1010, ROA = 100 / 10100,
    // efficiency = 120 / 200.
    let roe = record.ratios.return_on_equity.value.unwrap();
    assert!((roe - 100.0 / 1010.0).abs() < 1e-12);
    let roa = record.ratios.return_on_assets.value.unwrap();
    assert!((roa - 100.0 / 10_100.0).abs() < 1e-12);
    assert_eq!(record.ratios.efficiency_ratio.value, Some(0.6));
    assert_eq!(record.ratios.loans_to_deposits.value, Some(0.875));
    assert_eq!(record.ratios.book_value_per_share.value, Some(10.4));
    assert_eq!(record.ratios.earnings_per_share.value, Some(1.0));

    let graham = record.ratios.graham_number.value.unwrap();
    assert!((graham - (22.5f64 * 1.0 * 10.4).sqrt()).abs() < 1e-12);
}

#[test]
fn test_identical_inputs_produce_byte_identical_output() {
    let root = tempfile::tempdir().unwrap();
    let quarters = write_test_bank(root.path());

    let first = run_pipeline(EngineConfig::default(), &quarters).unwrap();
    let second = run_pipeline(EngineConfig::default(), &quarters).unwrap();

    let a = serde_json::to_string_pretty(&first).unwrap();
    let b = serde_json::to_string_pretty(&second).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_missing_quarter_is_skipped_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    let mut quarters = write_test_bank(root.path());
    quarters.push(root.path().join("2025q2"));

    let with_gap = run_pipeline(EngineConfig::default(), &quarters).unwrap();
    let without = run_pipeline(EngineConfig::default(), &quarters[..2].to_vec()).unwrap();

    assert_eq!(
        serde_json::to_string(&with_gap).unwrap(),
        serde_json::to_string(&without).unwrap()
    );
}

#[test]
fn test_records_and_contract_persisted() {
    let root = tempfile::tempdir().unwrap();
    let quarters = write_test_bank(root.path());
    let records = run_pipeline(EngineConfig::default(), &quarters).unwrap();

    let out = root.path().join("out");
    persist::write_records(&records, &out).unwrap();
    persist::write_contract_schema(&out).unwrap();

    assert!(out.join("0000001000.json").exists());
    assert!(out.join("filer-record.schema.json").exists());

    let raw = fs::read_to_string(out.join("0000001000.json")).unwrap();
    let back: asreported::FilerRecord = serde_json::from_str(&raw).unwrap();
    assert_eq!(back.name, "First Test Bancorp");
}

#[test]
fn test_alternate_population_through_config() {
    let root = tempfile::tempdir().unwrap();
    let quarters = write_test_bank(root.path());

    // Point the allow-list at the manufacturer instead of the banks.
    let mut config = EngineConfig::default();
    config.industry_codes = [3714].into_iter().collect();

    let records = run_pipeline(config, &quarters).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cik, 2000);
    assert_eq!(records[0].name, "Widget Works");
}
