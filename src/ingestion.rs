use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::schema::{Cadence, NumericFact, PresentationItem, StatementType, Submission};
use crate::utils::{parse_fsds_date, quarter_ordinal};
use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Unique key of a numeric fact. Rows sharing the key are duplicates and the
/// last one read wins, matching the data sets' own row-ordering convention.
type FactKey = (String, String, String, NaiveDate, u8);

/// Raw `sub.txt` row. Only the columns the engine consumes are declared;
/// the readers ignore the rest of the header set.
#[derive(Debug, Deserialize)]
struct RawSubmission {
    adsh: String,
    cik: u64,
    name: String,
    #[serde(default)]
    sic: String,
    form: String,
    #[serde(default)]
    period: String,
    #[serde(default)]
    fy: String,
    #[serde(default)]
    fp: String,
    filed: String,
    #[serde(default)]
    prevrpt: String,
}

/// Raw `num.txt` row.
#[derive(Debug, Deserialize)]
struct RawNumeric {
    adsh: String,
    tag: String,
    version: String,
    #[serde(default)]
    ddate: String,
    #[serde(default)]
    qtrs: String,
    #[serde(default)]
    uom: String,
    #[serde(default)]
    coreg: String,
    #[serde(default)]
    segments: String,
    #[serde(default)]
    value: String,
}

/// Raw `pre.txt` row.
#[derive(Debug, Deserialize)]
struct RawPresentation {
    adsh: String,
    report: u32,
    line: u32,
    stmt: String,
    #[serde(default)]
    inpth: String,
    tag: String,
    version: String,
    #[serde(default)]
    plabel: String,
    #[serde(default)]
    negating: String,
}

fn flag_set(raw: &str) -> bool {
    raw.trim() == "1"
}

/// Per-quarter ingestion counts, for the run log.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuarterSummary {
    pub submissions: usize,
    pub facts: usize,
    pub presentation_items: usize,
}

#[derive(Debug, Default)]
struct FilerAccumulator {
    submissions: BTreeMap<String, Submission>,
    facts: BTreeMap<FactKey, NumericFact>,
    items: Vec<PresentationItem>,
}

/// Accumulates the filtered contents of every ingested quarter, keyed by
/// filer. Frozen into per-filer [`FilerFacts`] once all quarters are read.
#[derive(Debug, Default)]
pub struct FactStore {
    filers: BTreeMap<u64, FilerAccumulator>,
    accession_owner: BTreeMap<String, u64>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_submission(&mut self, sub: Submission) {
        self.accession_owner.insert(sub.accession.clone(), sub.cik);
        self.filers
            .entry(sub.cik)
            .or_default()
            .submissions
            .insert(sub.accession.clone(), sub);
    }

    fn add_fact(&mut self, fact: NumericFact) {
        if let Some(&cik) = self.accession_owner.get(&fact.accession) {
            let key = (
                fact.accession.clone(),
                fact.tag.clone(),
                fact.version.clone(),
                fact.period_end,
                fact.qtrs,
            );
            self.filers
                .entry(cik)
                .or_default()
                .facts
                .insert(key, fact);
        }
    }

    fn add_presentation(&mut self, item: PresentationItem) {
        if let Some(&cik) = self.accession_owner.get(&item.accession) {
            self.filers.entry(cik).or_default().items.push(item);
        }
    }

    /// Freezes the store into one indexed [`FilerFacts`] per filer, ordered
    /// by CIK.
    pub fn into_filers(self) -> Vec<FilerFacts> {
        self.filers
            .into_iter()
            .map(|(cik, acc)| FilerFacts::build(cik, acc))
            .collect()
    }
}

/// Everything ingested for one filer, indexed for the per-filer passes.
#[derive(Debug)]
pub struct FilerFacts {
    pub cik: u64,
    pub name: String,
    pub sic: Option<u32>,
    /// Ordered by filed date, oldest first.
    pub submissions: Vec<Submission>,
    facts: Vec<NumericFact>,
    by_accession_tag: BTreeMap<(String, String), Vec<usize>>,
    by_tag: BTreeMap<String, Vec<usize>>,
    presentations: BTreeMap<String, Vec<PresentationItem>>,
    filed_dates: BTreeMap<String, NaiveDate>,
}

impl FilerFacts {
    fn build(cik: u64, acc: FilerAccumulator) -> Self {
        let mut submissions: Vec<Submission> = acc.submissions.into_values().collect();
        submissions.sort_by(|a, b| (a.filed, &a.accession).cmp(&(b.filed, &b.accession)));

        let (name, sic) = submissions
            .last()
            .map(|s| (s.name.clone(), s.sic))
            .unwrap_or_default();

        let filed_dates = submissions
            .iter()
            .map(|s| (s.accession.clone(), s.filed))
            .collect();

        let facts: Vec<NumericFact> = acc.facts.into_values().collect();
        let mut by_accession_tag: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
        let mut by_tag: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, fact) in facts.iter().enumerate() {
            by_accession_tag
                .entry((fact.accession.clone(), fact.tag.clone()))
                .or_default()
                .push(idx);
            by_tag.entry(fact.tag.clone()).or_default().push(idx);
        }

        let mut presentations: BTreeMap<String, Vec<PresentationItem>> = BTreeMap::new();
        for item in acc.items {
            presentations
                .entry(item.accession.clone())
                .or_default()
                .push(item);
        }
        for items in presentations.values_mut() {
            items.sort_by_key(|i| (i.statement, i.report, i.line));
        }

        Self {
            cik,
            name,
            sic,
            submissions,
            facts,
            by_accession_tag,
            by_tag,
            presentations,
            filed_dates,
        }
    }

    pub fn submission(&self, accession: &str) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.accession == accession)
    }

    pub fn filed_date(&self, accession: &str) -> Option<NaiveDate> {
        self.filed_dates.get(accession).copied()
    }

    pub fn presentation(&self, accession: &str) -> &[PresentationItem] {
        self.presentations
            .get(accession)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn facts_for(&self, accession: &str, tag: &str) -> impl Iterator<Item = &NumericFact> {
        self.by_accession_tag
            .get(&(accession.to_string(), tag.to_string()))
            .into_iter()
            .flatten()
            .map(move |&idx| &self.facts[idx])
    }

    pub fn facts_for_tag(&self, tag: &str) -> impl Iterator<Item = &NumericFact> {
        self.by_tag
            .get(tag)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.facts[idx])
    }

    /// True when the fact comes from a filing with a statement cadence
    /// (the 10-K/10-Q families).
    fn recognized(&self, fact: &NumericFact) -> bool {
        self.submission(&fact.accession)
            .map(|s| s.cadence().is_some())
            .unwrap_or(false)
    }

    fn prefer_latest<'a>(&self, a: &'a NumericFact, b: &'a NumericFact) -> &'a NumericFact {
        let key = |f: &NumericFact| (self.filed_date(&f.accession), f.accession.clone());
        if key(b) > key(a) {
            b
        } else {
            a
        }
    }

    /// Flow facts of the given duration, deduplicated per period-end quarter
    /// ordinal, preferring the most recently filed source.
    pub fn deduped_flow_facts(&self, tag: &str, qtrs: u8) -> BTreeMap<i32, &NumericFact> {
        let mut out: BTreeMap<i32, &NumericFact> = BTreeMap::new();
        for fact in self.facts_for_tag(tag) {
            if fact.qtrs != qtrs || !self.recognized(fact) {
                continue;
            }
            let ordinal = quarter_ordinal(fact.period_end);
            out.entry(ordinal)
                .and_modify(|held| *held = self.prefer_latest(*held, fact))
                .or_insert(fact);
        }
        out
    }

    /// Instantaneous facts deduplicated per period-end date, preferring the
    /// most recently filed source.
    pub fn deduped_instant_facts(&self, tag: &str) -> BTreeMap<NaiveDate, &NumericFact> {
        let mut out: BTreeMap<NaiveDate, &NumericFact> = BTreeMap::new();
        for fact in self.facts_for_tag(tag) {
            if !fact.is_instant() || !self.recognized(fact) {
                continue;
            }
            out.entry(fact.period_end)
                .and_modify(|held| *held = self.prefer_latest(*held, fact))
                .or_insert(fact);
        }
        out
    }

    /// One submission per period end for the cadence, most recent period
    /// first; amendments displace the original through the filed-date
    /// preference.
    pub fn primary_submissions(&self, cadence: Cadence) -> Vec<&Submission> {
        let mut by_period: BTreeMap<NaiveDate, &Submission> = BTreeMap::new();
        for sub in &self.submissions {
            if sub.cadence() != Some(cadence) {
                continue;
            }
            let Some(period_end) = sub.period_end else {
                continue;
            };
            by_period
                .entry(period_end)
                .and_modify(|held| {
                    if (sub.filed, &sub.accession) > (held.filed, &held.accession) {
                        *held = sub;
                    }
                })
                .or_insert(sub);
        }
        by_period.into_values().rev().collect()
    }
}

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader)
}

/// A file whose header row lacks the columns the engine depends on is
/// malformed as a whole, not row by row.
fn require_columns<R: Read>(
    reader: &mut csv::Reader<R>,
    file: &str,
    required: &[&str],
) -> Result<()> {
    let headers = reader.headers()?;
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(EngineError::MalformedInput {
                file: file.to_string(),
                details: format!("missing column '{}'", column),
            });
        }
    }
    Ok(())
}

fn read_submissions<R: Read>(
    reader: R,
    config: &EngineConfig,
    store: &mut FactStore,
) -> Result<usize> {
    let mut reader = tsv_reader(reader);
    require_columns(&mut reader, "sub.txt", &["adsh", "cik", "form", "filed"])?;
    let mut count = 0;
    for row in reader.deserialize::<RawSubmission>() {
        let raw = match row {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Skipping malformed submission row: {}", e);
                continue;
            }
        };
        let sic = raw.sic.trim().parse::<u32>().ok();
        if !sic.is_some_and(|code| config.industry_codes.contains(&code)) {
            continue;
        }
        let Some(filed) = parse_fsds_date(&raw.filed) else {
            debug!("Submission {} has no parsable filed date", raw.adsh);
            continue;
        };
        let sub = Submission {
            accession: raw.adsh,
            cik: raw.cik,
            name: raw.name,
            sic,
            form: raw.form.trim().to_string(),
            fiscal_year: raw.fy.trim().parse::<i32>().ok(),
            fiscal_period: match raw.fp.trim() {
                "" => None,
                fp => Some(fp.to_string()),
            },
            filed,
            period_end: parse_fsds_date(&raw.period),
            amends: flag_set(&raw.prevrpt),
        };
        // Only the 10-K/10-Q families carry statements the engine can use.
        if sub.cadence().is_none() {
            continue;
        }
        store.add_submission(sub);
        count += 1;
    }
    Ok(count)
}

fn read_facts<R: Read>(reader: R, store: &mut FactStore) -> Result<usize> {
    let mut reader = tsv_reader(reader);
    require_columns(&mut reader, "num.txt", &["adsh", "tag", "version", "ddate", "qtrs"])?;
    let mut count = 0;
    for row in reader.deserialize::<RawNumeric>() {
        let raw = match row {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Skipping malformed numeric row: {}", e);
                continue;
            }
        };
        // Consolidated whole-entity values only.
        if !raw.coreg.trim().is_empty() || !raw.segments.trim().is_empty() {
            continue;
        }
        let Some(period_end) = parse_fsds_date(&raw.ddate) else {
            continue;
        };
        let Ok(qtrs) = raw.qtrs.trim().parse::<u8>() else {
            continue;
        };
        // Footnote-only rows have no value.
        let Ok(value) = raw.value.trim().parse::<f64>() else {
            continue;
        };
        store.add_fact(NumericFact {
            accession: raw.adsh,
            tag: raw.tag,
            version: raw.version,
            period_end,
            qtrs,
            unit: raw.uom,
            value,
        });
        count += 1;
    }
    Ok(count)
}

fn read_presentations<R: Read>(reader: R, store: &mut FactStore) -> Result<usize> {
    let mut reader = tsv_reader(reader);
    require_columns(&mut reader, "pre.txt", &["adsh", "report", "line", "stmt", "tag"])?;
    let mut count = 0;
    for row in reader.deserialize::<RawPresentation>() {
        let raw = match row {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Skipping malformed presentation row: {}", e);
                continue;
            }
        };
        let Some(statement) = StatementType::from_code(raw.stmt.trim()) else {
            continue;
        };
        store.add_presentation(PresentationItem {
            accession: raw.adsh,
            report: raw.report,
            line: raw.line,
            statement,
            tag: raw.tag,
            version: raw.version,
            label: raw.plabel.trim().to_string(),
            negating: flag_set(&raw.negating),
            parenthetical: flag_set(&raw.inpth),
        });
        count += 1;
    }
    Ok(count)
}

/// Ingests one quarter directory (`sub.txt`, `num.txt`, `pre.txt`) into the
/// store. The three files are streamed row by row, never loaded wholesale.
pub fn load_quarter(
    dir: &Path,
    config: &EngineConfig,
    store: &mut FactStore,
) -> Result<QuarterSummary> {
    let mut summary = QuarterSummary::default();
    for name in ["sub.txt", "num.txt", "pre.txt"] {
        let path = dir.join(name);
        if !path.exists() {
            return Err(EngineError::MissingInput(path));
        }
    }

    summary.submissions = read_submissions(File::open(dir.join("sub.txt"))?, config, store)?;
    summary.facts = read_facts(File::open(dir.join("num.txt"))?, store)?;
    summary.presentation_items = read_presentations(File::open(dir.join("pre.txt"))?, store)?;
    Ok(summary)
}

/// Test-support builder that assembles in-memory quarter files and pushes
/// them through the real readers, so every unit test exercises the same
/// parsing and filtering path as production ingestion.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct QuarterFixture {
    sub: String,
    num: String,
    pre: String,
}

#[cfg(test)]
impl QuarterFixture {
    pub(crate) fn new() -> Self {
        Self {
            sub: "adsh\tcik\tname\tsic\tform\tperiod\tfy\tfp\tfiled\tprevrpt\n".to_string(),
            num: "adsh\ttag\tversion\tddate\tqtrs\tuom\tcoreg\tsegments\tvalue\n".to_string(),
            pre: "adsh\treport\tline\tstmt\tinpth\ttag\tversion\tplabel\tnegating\n".to_string(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn submission(
        &mut self,
        adsh: &str,
        cik: u64,
        sic: u32,
        form: &str,
        period: &str,
        fy: i32,
        fp: &str,
        filed: &str,
    ) {
        self.sub.push_str(&format!(
            "{}\t{}\tTest Bancorp\t{}\t{}\t{}\t{}\t{}\t{}\t0\n",
            adsh, cik, sic, form, period, fy, fp, filed
        ));
    }

    pub(crate) fn fact(&mut self, adsh: &str, tag: &str, ddate: &str, qtrs: u8, value: f64) {
        self.fact_with_version(adsh, tag, "us-gaap/2024", ddate, qtrs, value);
    }

    pub(crate) fn fact_with_version(
        &mut self,
        adsh: &str,
        tag: &str,
        version: &str,
        ddate: &str,
        qtrs: u8,
        value: f64,
    ) {
        self.num.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\tUSD\t\t\t{}\n",
            adsh, tag, version, ddate, qtrs, value
        ));
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn presentation(
        &mut self,
        adsh: &str,
        report: u32,
        line: u32,
        stmt: &str,
        tag: &str,
        label: &str,
        parenthetical: bool,
    ) {
        self.pre.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\tus-gaap/2024\t{}\t0\n",
            adsh,
            report,
            line,
            stmt,
            if parenthetical { 1 } else { 0 },
            tag,
            label
        ));
    }

    pub(crate) fn load_into(&self, store: &mut FactStore) {
        let config = EngineConfig::default();
        read_submissions(std::io::Cursor::new(self.sub.as_bytes()), &config, store).unwrap();
        read_facts(std::io::Cursor::new(self.num.as_bytes()), store).unwrap();
        read_presentations(std::io::Cursor::new(self.pre.as_bytes()), store).unwrap();
    }

    /// One pre-built filer, for tests that only need a single bank.
    pub(crate) fn into_filer(self) -> FilerFacts {
        let mut store = FactStore::new();
        self.load_into(&mut store);
        store.into_filers().remove(0)
    }
}
