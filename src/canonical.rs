use crate::config::EngineConfig;
use crate::equivalence::TagEquivalences;
use crate::ingestion::FilerFacts;
use crate::presentation::primary_statements;
use crate::schema::{Cadence, CanonicalItem, PresentationItem, StatementType};
use crate::utils::normalize_label;
use log::debug;

/// Merges a filer's presentation structures across filings into one ordered,
/// deduplicated shape for a (statement type, cadence) pair.
///
/// The order is seeded from the most recent filing that reports the
/// statement. Items only present in older filings are inserted at their own
/// historical line position and flagged, so a row a company stopped
/// reporting still appears near where it used to sit. An older item sharing
/// label and position with an existing row under a different tag is not
/// duplicated; the two tags are registered as a learned equivalence
/// instead, feeding every later value lookup.
///
/// Invariant on the result: no two canonical items share a tag or an
/// equivalence-linked tag.
pub fn build_canonical(
    facts: &FilerFacts,
    cadence: Cadence,
    statement: StatementType,
    config: &EngineConfig,
    equivalences: &mut TagEquivalences,
) -> Vec<CanonicalItem> {
    let submissions = facts.primary_submissions(cadence);

    let mut canonical: Vec<CanonicalItem> = Vec::new();
    for sub in submissions {
        let mut primary = primary_statements(facts.presentation(&sub.accession), config);
        let Some(items) = primary.remove(&statement) else {
            continue;
        };

        if canonical.is_empty() {
            canonical = seed(&items, equivalences);
            continue;
        }
        merge_older(&mut canonical, &items, equivalences);
    }

    canonical.sort_by_key(|item| item.line);
    canonical
}

fn seed(items: &[PresentationItem], equivalences: &TagEquivalences) -> Vec<CanonicalItem> {
    let mut out: Vec<CanonicalItem> = Vec::new();
    for item in items {
        if out
            .iter()
            .any(|held| equivalences.are_linked(&held.tag, &item.tag))
        {
            continue;
        }
        out.push(to_canonical(item, false));
    }
    out
}

fn merge_older(
    canonical: &mut Vec<CanonicalItem>,
    items: &[PresentationItem],
    equivalences: &mut TagEquivalences,
) {
    for item in items {
        let represented = canonical
            .iter()
            .any(|held| equivalences.are_linked(&held.tag, &item.tag));
        if represented {
            continue;
        }

        // Same labeled line at the same position under a different tag:
        // the filer renamed the concept between filings.
        let renamed = canonical.iter().find(|held| {
            held.line == item.line && normalize_label(&held.label) == normalize_label(&item.label)
        });
        if let Some(held) = renamed {
            debug!(
                "Learned tag equivalence {} <-> {} from label '{}'",
                held.tag, item.tag, item.label
            );
            let held_tag = held.tag.clone();
            equivalences.link(&held_tag, &item.tag);
            continue;
        }

        canonical.push(to_canonical(item, true));
    }
}

fn to_canonical(item: &PresentationItem, from_older_filing: bool) -> CanonicalItem {
    CanonicalItem {
        tag: item.tag.clone(),
        version: item.version.clone(),
        label: item.label.clone(),
        line: item.line,
        indent: 0,
        from_older_filing,
    }
}
