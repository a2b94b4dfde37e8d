use std::collections::{BTreeMap, BTreeSet};

/// Bidirectional relation of interchangeable concept identifiers.
///
/// Two sources feed the relation: a curated table of known naming variants,
/// and links learned while merging canonical statements (an older filing
/// reporting the same labeled line under a different tag). The adjacency is
/// fully built before any value resolution starts; resolution itself is a
/// pure lookup and never mutates the structure.
#[derive(Debug, Clone, Default)]
pub struct TagEquivalences {
    adjacency: BTreeMap<String, Vec<String>>,
}

impl TagEquivalences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut eq = Self::new();
        for (a, b) in pairs {
            eq.link(a, b);
        }
        eq
    }

    /// Links two identifiers in both directions. Self-links and duplicates
    /// are ignored.
    pub fn link(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }
        for (from, to) in [(a, b), (b, a)] {
            let edges = self.adjacency.entry(from.to_string()).or_default();
            if !edges.iter().any(|e| e == to) {
                edges.push(to.to_string());
            }
        }
    }

    /// Identifiers directly linked to `tag`, in insertion order.
    pub fn linked(&self, tag: &str) -> &[String] {
        self.adjacency.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every identifier reachable from `tag` through the relation, excluding
    /// `tag` itself, in deterministic breadth-first order.
    pub fn alternates(&self, tag: &str) -> Vec<String> {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        visited.insert(tag);
        let mut queue: Vec<&str> = vec![tag];
        let mut out = Vec::new();
        let mut head = 0;
        while head < queue.len() {
            let current = queue[head];
            head += 1;
            for next in self.linked(current) {
                if visited.insert(next) {
                    queue.push(next);
                    out.push(next.clone());
                }
            }
        }
        out
    }

    /// Tries `tag` directly, then every reachable alternate in breadth-first
    /// order, stopping at the first lookup success. The visited set inside
    /// [`Self::alternates`] makes cycles harmless.
    pub fn resolve_with<T, F>(&self, tag: &str, mut lookup: F) -> Option<T>
    where
        F: FnMut(&str) -> Option<T>,
    {
        if let Some(found) = lookup(tag) {
            return Some(found);
        }
        for alternate in self.alternates(tag) {
            if let Some(found) = lookup(&alternate) {
                return Some(found);
            }
        }
        None
    }

    /// True when `a` and `b` name the same concept under the relation.
    pub fn are_linked(&self, a: &str, b: &str) -> bool {
        a == b || self.alternates(a).iter().any(|t| t == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TagEquivalences {
        let mut eq = TagEquivalences::new();
        eq.link("NetIncomeLoss", "ProfitLoss");
        eq.link("ProfitLoss", "NetIncomeLossAllocatedToGeneralPartners");
        eq
    }

    #[test]
    fn test_links_are_symmetric() {
        let eq = table();
        assert!(eq.are_linked("NetIncomeLoss", "ProfitLoss"));
        assert!(eq.are_linked("ProfitLoss", "NetIncomeLoss"));
        // Transitive through the shared neighbor.
        assert!(eq.are_linked("NetIncomeLoss", "NetIncomeLossAllocatedToGeneralPartners"));
    }

    #[test]
    fn test_resolution_succeeds_from_either_side() {
        let eq = table();
        let facts = |tag: &str| (tag == "ProfitLoss").then_some(42.0);

        assert_eq!(eq.resolve_with("NetIncomeLoss", facts), Some(42.0));
        assert_eq!(eq.resolve_with("ProfitLoss", facts), Some(42.0));
    }

    #[test]
    fn test_direct_hit_wins_over_alternates() {
        let eq = table();
        let lookup = |tag: &str| match tag {
            "NetIncomeLoss" => Some(1.0),
            "ProfitLoss" => Some(2.0),
            _ => None,
        };
        assert_eq!(eq.resolve_with("NetIncomeLoss", lookup), Some(1.0));
    }

    #[test]
    fn test_cycles_terminate() {
        let mut eq = TagEquivalences::new();
        eq.link("A", "B");
        eq.link("B", "C");
        eq.link("C", "A");

        assert_eq!(eq.alternates("A"), vec!["B".to_string(), "C".to_string()]);
        let miss: Option<f64> = eq.resolve_with("A", |_| None);
        assert_eq!(miss, None);
    }

    #[test]
    fn test_self_link_ignored() {
        let mut eq = TagEquivalences::new();
        eq.link("Assets", "Assets");
        assert!(eq.alternates("Assets").is_empty());
    }

    #[test]
    fn test_duplicate_links_kept_once() {
        let mut eq = TagEquivalences::new();
        eq.link("A", "B");
        eq.link("B", "A");
        eq.link("A", "B");
        assert_eq!(eq.linked("A"), ["B".to_string()]);
        assert_eq!(eq.linked("B"), ["A".to_string()]);
    }
}
