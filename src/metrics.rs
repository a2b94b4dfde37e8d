use crate::average::BalanceExtractor;
use crate::config::EngineConfig;
use crate::equivalence::TagEquivalences;
use crate::ingestion::FilerFacts;
use crate::schema::{Fundamentals, Ratio, RatioSet};
use crate::ttm::TtmCalculator;
use crate::utils::first_success;
use log::debug;

/// Multiplier in the Graham-style intrinsic value estimate
/// (15x earnings times 1.5x book value).
const GRAHAM_MULTIPLIER: f64 = 22.5;

/// Assembles the fixed concept set the ratio layer consumes. Every concept
/// group is an ordered candidate list evaluated by the first-success
/// combinator, with the equivalence relation consulted behind each
/// candidate.
pub fn compute_fundamentals(
    facts: &FilerFacts,
    equivalences: &TagEquivalences,
    config: &EngineConfig,
) -> Fundamentals {
    let ttm = TtmCalculator::new(facts);
    let balances = BalanceExtractor::new(facts);
    let concepts = &config.concepts;

    let ttm_of = |group: &[String]| {
        first_success(group, |tag| equivalences.resolve_with(tag, |t| ttm.ttm(t)))
    };
    let latest_of = |group: &[String]| {
        first_success(group, |tag| {
            equivalences.resolve_with(tag, |t| balances.latest(t).map(|f| f.value))
        })
    };

    let net_income_ttm = ttm_of(&concepts.net_income);
    // Align the averaging window with the income period so the return
    // ratios divide like periods.
    let as_of = net_income_ttm.as_ref().map(|t| t.period_end);
    let average_of = |group: &[String]| {
        first_success(group, |tag| {
            equivalences.resolve_with(tag, |t| balances.average(t, as_of))
        })
    };

    Fundamentals {
        net_income_ttm,
        net_interest_income_ttm: ttm_of(&concepts.net_interest_income),
        noninterest_income_ttm: ttm_of(&concepts.noninterest_income),
        noninterest_expense_ttm: ttm_of(&concepts.noninterest_expense),
        eps_diluted_ttm: ttm_of(&concepts.eps_diluted),
        equity: average_of(&concepts.equity),
        assets: average_of(&concepts.assets),
        loans_latest: latest_of(&concepts.loans),
        deposits_latest: latest_of(&concepts.deposits),
        shares_outstanding_latest: latest_of(&concepts.shares_outstanding),
    }
}

/// Ratios from the fundamentals, then the plausibility pass. Pure function
/// of its inputs.
pub fn compute_ratios(fundamentals: &Fundamentals, config: &EngineConfig) -> RatioSet {
    let f = fundamentals;
    let net_income = f.net_income_ttm.as_ref().map(|t| t.total);
    let nii = f.net_interest_income_ttm.as_ref().map(|t| t.total);
    let noninterest_income = f.noninterest_income_ttm.as_ref().map(|t| t.total);
    let noninterest_expense = f.noninterest_expense_ttm.as_ref().map(|t| t.total);
    let avg_equity = f.equity.as_ref().map(|a| a.average);
    let avg_assets = f.assets.as_ref().map(|a| a.average);
    let equity_ending = f.equity.as_ref().map(|a| a.ending);
    let assets_ending = f.assets.as_ref().map(|a| a.ending);

    let revenue = match (nii, noninterest_income) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    };

    let eps = f.eps_diluted_ttm.as_ref().map(|t| t.total);
    let bvps = div(equity_ending, f.shares_outstanding_latest);

    let graham = match (eps, bvps) {
        // Undefined without positive per-share earnings and positive
        // per-share net assets.
        (Some(e), Some(b)) if e > 0.0 && b > 0.0 => Some((GRAHAM_MULTIPLIER * e * b).sqrt()),
        _ => None,
    };

    let mut ratios = RatioSet {
        return_on_equity: Ratio::of(div(net_income, avg_equity)),
        return_on_assets: Ratio::of(div(net_income, avg_assets)),
        efficiency_ratio: Ratio::of(div(noninterest_expense, revenue)),
        equity_to_assets: Ratio::of(div(equity_ending, assets_ending)),
        loans_to_deposits: Ratio::of(div(f.loans_latest, f.deposits_latest)),
        book_value_per_share: Ratio::of(bvps),
        earnings_per_share: Ratio::of(eps),
        graham_number: Ratio::of(graham),
    };
    contain(&mut ratios, config);
    ratios
}

fn div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Nulls and flags any ratio outside its plausible range. The rest of the
/// record is left untouched: one absurd ratio must not discard a filer.
fn contain(ratios: &mut RatioSet, config: &EngineConfig) {
    let bounds = &config.bounds;
    let checks: [(&str, &mut Ratio, (f64, f64)); 8] = [
        ("return_on_equity", &mut ratios.return_on_equity, bounds.return_on_equity),
        ("return_on_assets", &mut ratios.return_on_assets, bounds.return_on_assets),
        ("efficiency_ratio", &mut ratios.efficiency_ratio, bounds.efficiency_ratio),
        ("equity_to_assets", &mut ratios.equity_to_assets, bounds.equity_to_assets),
        ("loans_to_deposits", &mut ratios.loans_to_deposits, bounds.loans_to_deposits),
        ("book_value_per_share", &mut ratios.book_value_per_share, bounds.book_value_per_share),
        ("earnings_per_share", &mut ratios.earnings_per_share, bounds.earnings_per_share),
        ("graham_number", &mut ratios.graham_number, bounds.graham_number),
    ];

    for (name, ratio, (lo, hi)) in checks {
        let Some(value) = ratio.value else {
            continue;
        };
        if !value.is_finite() || value < lo || value > hi {
            debug!(
                "Containing implausible {}: {} outside {}..{}",
                name, value, lo, hi
            );
            ratio.flag = Some(format!(
                "{} of {:.4} outside plausible range {}..{}",
                name, value, lo, hi
            ));
            ratio.value = None;
        }
    }
}
