use crate::config::EngineConfig;
use crate::schema::{PresentationItem, StatementType};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Selects one primary report per statement type from a filing's
/// presentation rows.
///
/// A filing often contains several reports per statement type (the main
/// statement, condensed variants, schedules tagged with the same code).
/// Each candidate is scored as `items + anchor_bonus * anchors_present -
/// report_penalty * report_number`; the highest score wins and ties favor
/// the lowest report number. Parenthetical rows are dropped before scoring.
///
/// A statement type with no candidate simply has no entry in the result:
/// that filing contributes nothing for the type.
pub fn primary_statements(
    items: &[PresentationItem],
    config: &EngineConfig,
) -> BTreeMap<StatementType, Vec<PresentationItem>> {
    let grouped = items
        .iter()
        .filter(|i| !i.parenthetical)
        .into_group_map_by(|i| (i.statement, i.report));

    let mut best: BTreeMap<StatementType, (f64, Vec<&PresentationItem>)> = BTreeMap::new();
    for ((statement, report), group) in grouped
        .into_iter()
        .sorted_by_key(|((statement, report), _)| (*statement, *report))
    {
        let anchors = config
            .anchor_tags
            .get(&statement)
            .map(|tags| {
                tags.iter()
                    .filter(|anchor| group.iter().any(|i| i.tag == **anchor))
                    .count()
            })
            .unwrap_or(0);

        let score = group.len() as f64 + config.anchor_bonus * anchors as f64
            - config.report_penalty * f64::from(report);

        // Reports iterate in ascending order, so a strict comparison keeps
        // the lowest report number on ties.
        match best.get(&statement) {
            Some((held, _)) if score <= *held => {}
            _ => {
                best.insert(statement, (score, group));
            }
        }
    }

    best.into_iter()
        .map(|(statement, (_, group))| {
            let ordered = group
                .into_iter()
                .sorted_by_key(|i| i.line)
                .cloned()
                .collect();
            (statement, ordered)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(report: u32, line: u32, statement: StatementType, tag: &str) -> PresentationItem {
        PresentationItem {
            accession: "acc-1".to_string(),
            report,
            line,
            statement,
            tag: tag.to_string(),
            version: "us-gaap/2024".to_string(),
            label: tag.to_string(),
            negating: false,
            parenthetical: false,
        }
    }

    #[test]
    fn test_anchored_report_beats_longer_unanchored_one() {
        let config = EngineConfig::default();
        let mut items = vec![
            // Report 1: a long schedule without the balance sheet anchors.
            item(1, 1, StatementType::BalanceSheet, "CashAndDueFromBanks"),
            item(1, 2, StatementType::BalanceSheet, "InterestBearingDepositsInBanks"),
            item(1, 3, StatementType::BalanceSheet, "MarketableSecurities"),
            item(1, 4, StatementType::BalanceSheet, "PremisesAndEquipmentNet"),
            item(1, 5, StatementType::BalanceSheet, "AccruedInterestReceivable"),
        ];
        items.push(item(2, 1, StatementType::BalanceSheet, "Assets"));
        items.push(item(2, 2, StatementType::BalanceSheet, "LiabilitiesAndStockholdersEquity"));

        let primary = primary_statements(&items, &config);
        let bs = &primary[&StatementType::BalanceSheet];
        assert_eq!(bs.len(), 2);
        assert_eq!(bs[0].tag, "Assets");
    }

    #[test]
    fn test_tie_favors_lowest_report_number() {
        let mut config = EngineConfig::default();
        config.report_penalty = 0.0;
        let items = vec![
            item(3, 1, StatementType::IncomeStatement, "InterestAndDividendIncomeOperating"),
            item(5, 1, StatementType::IncomeStatement, "InterestExpense"),
        ];

        let primary = primary_statements(&items, &config);
        assert_eq!(primary[&StatementType::IncomeStatement][0].report, 3);
    }

    #[test]
    fn test_report_penalty_breaks_equal_item_counts() {
        let config = EngineConfig::default();
        let items = vec![
            item(2, 1, StatementType::IncomeStatement, "InterestExpense"),
            item(7, 1, StatementType::IncomeStatement, "InterestAndDividendIncomeOperating"),
        ];

        let primary = primary_statements(&items, &config);
        assert_eq!(primary[&StatementType::IncomeStatement][0].report, 2);
    }

    #[test]
    fn test_parenthetical_rows_dropped_before_scoring() {
        let config = EngineConfig::default();
        let mut par = item(1, 1, StatementType::BalanceSheet, "CommonStockParOrStatedValuePerShare");
        par.parenthetical = true;
        let items = vec![par, item(2, 1, StatementType::BalanceSheet, "Assets")];

        let primary = primary_statements(&items, &config);
        let bs = &primary[&StatementType::BalanceSheet];
        assert_eq!(bs.len(), 1);
        assert_eq!(bs[0].tag, "Assets");
    }

    #[test]
    fn test_missing_statement_type_is_not_an_error() {
        let config = EngineConfig::default();
        let items = vec![item(1, 1, StatementType::BalanceSheet, "Assets")];

        let primary = primary_statements(&items, &config);
        assert!(primary.contains_key(&StatementType::BalanceSheet));
        assert!(!primary.contains_key(&StatementType::IncomeStatement));
    }

    #[test]
    fn test_items_ordered_by_line() {
        let config = EngineConfig::default();
        let items = vec![
            item(1, 3, StatementType::BalanceSheet, "StockholdersEquity"),
            item(1, 1, StatementType::BalanceSheet, "Assets"),
            item(1, 2, StatementType::BalanceSheet, "Liabilities"),
        ];

        let primary = primary_statements(&items, &config);
        let lines: Vec<u32> = primary[&StatementType::BalanceSheet]
            .iter()
            .map(|i| i.line)
            .collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }
}
