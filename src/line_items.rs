use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identity of a funding line item across budget cycles.
///
/// Labels are scraped from PDF text runs, so one label can arrive as several
/// fragments with irregular spacing. The key collapses whitespace and trims; it
/// does not touch case or punctuation, so labels that differ only there stay
/// distinct and are reported by [`find_near_duplicates`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LineItemKey(String);

impl LineItemKey {
    /// Returns `None` for a label with no visible text.
    pub fn normalize(label: &str) -> Option<Self> {
        let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            None
        } else {
            Some(Self(collapsed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased alphanumerics only. Two keys with the same fingerprint are
    /// near-duplicates.
    pub fn fingerprint(&self) -> String {
        self.0
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }
}

impl fmt::Display for LineItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for LineItemKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Pairs of distinct keys that share a fingerprint, e.g. `"Design"` and
/// `"DESIGN."`. Each pair is `(canonical, variant)` where the canonical key is the
/// smallest of its group; output order is deterministic.
pub fn find_near_duplicates<'a, I>(keys: I) -> Vec<(LineItemKey, LineItemKey)>
where
    I: IntoIterator<Item = &'a LineItemKey>,
{
    let mut groups: BTreeMap<String, BTreeSet<&LineItemKey>> = BTreeMap::new();
    for key in keys {
        groups.entry(key.fingerprint()).or_default().insert(key);
    }

    let mut pairs = Vec::new();
    for group in groups.values() {
        let mut iter = group.iter();
        if let Some(canonical) = iter.next() {
            for variant in iter {
                pairs.push(((*canonical).clone(), (*variant).clone()));
            }
        }
    }
    pairs
}
