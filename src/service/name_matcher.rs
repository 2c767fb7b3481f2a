//! Ties Flowace display names to employees.

use std::collections::HashMap;

use crate::model::employee::EmployeeRef;
use crate::model::flowace::MatchMethod;

const HONORIFICS: &[&str] = &["mr", "mrs", "ms", "dr"];
const MIN_SUBSTRING_LEN: usize = 4;

/// Lowercase words separated by single spaces, honorifics removed.
pub fn normalize_name(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .flat_map(|c| {
            let keep = if c.is_alphanumeric() { c } else { ' ' };
            keep.to_lowercase()
        })
        .collect();
    spaced
        .split_whitespace()
        .filter(|w| !HONORIFICS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn compact(normalized: &str) -> String {
    normalized.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameMatch {
    pub employee_id: u64,
    pub method: MatchMethod,
}

struct Candidate {
    id: u64,
    normalized: String,
    compact: String,
    first: String,
}

const FUZZY_STEPS: [MatchMethod; 4] = [
    MatchMethod::Exact,
    MatchMethod::Compact,
    MatchMethod::Substring,
    MatchMethod::FirstName,
];

fn fits(method: MatchMethod, c: &Candidate, name: &str, squashed: &str) -> bool {
    match method {
        MatchMethod::Exact => c.normalized == name,
        MatchMethod::Compact => c.compact == squashed,
        MatchMethod::Substring => {
            squashed.len() >= MIN_SUBSTRING_LEN
                && c.compact.len() >= MIN_SUBSTRING_LEN
                && (c.normalized.contains(name) || name.contains(c.normalized.as_str()))
        }
        MatchMethod::FirstName => name.split(' ').next() == Some(c.first.as_str()),
        MatchMethod::Alias | MatchMethod::Manual => false,
    }
}

enum Lookup {
    Found(u64),
    Ambiguous,
    Missing,
}

fn unique<I: Iterator<Item = u64>>(mut ids: I) -> Lookup {
    match ids.next() {
        None => Lookup::Missing,
        Some(first) => {
            if ids.any(|id| id != first) {
                Lookup::Ambiguous
            } else {
                Lookup::Found(first)
            }
        }
    }
}

pub struct NameMatcher {
    candidates: Vec<Candidate>,
    aliases: HashMap<String, u64>,
}

impl NameMatcher {
    /// `aliases` are `(display name, employee code)` pairs; codes that no
    /// employee carries are dropped.
    pub fn new(employees: &[EmployeeRef], aliases: &[(String, String)]) -> Self {
        let by_code: HashMap<String, u64> = employees
            .iter()
            .map(|e| (e.employee_code.trim().to_uppercase(), e.id))
            .collect();

        let aliases = aliases
            .iter()
            .filter_map(|(alias, code)| {
                let id = by_code.get(&code.trim().to_uppercase())?;
                let key = normalize_name(alias);
                (!key.is_empty()).then_some((key, *id))
            })
            .collect();

        let candidates = employees
            .iter()
            .filter_map(|e| {
                let normalized = normalize_name(&e.name);
                if normalized.is_empty() {
                    return None;
                }
                Some(Candidate {
                    id: e.id,
                    compact: compact(&normalized),
                    first: normalized.split(' ').next().unwrap_or_default().to_string(),
                    normalized,
                })
            })
            .collect();

        Self { candidates, aliases }
    }

    /// Tries alias, exact, compact, substring then first name. An ambiguous
    /// step ends the search without a match.
    pub fn match_name(&self, raw: &str) -> Option<NameMatch> {
        let name = normalize_name(raw);
        if name.is_empty() {
            return None;
        }
        if let Some(&employee_id) = self.aliases.get(&name) {
            return Some(NameMatch {
                employee_id,
                method: MatchMethod::Alias,
            });
        }

        let squashed = compact(&name);
        for method in FUZZY_STEPS {
            let ids = self
                .candidates
                .iter()
                .filter(|c| fits(method, c, &name, &squashed))
                .map(|c| c.id);
            match unique(ids) {
                Lookup::Found(employee_id) => return Some(NameMatch { employee_id, method }),
                Lookup::Ambiguous => {
                    tracing::debug!(name = %raw, method = %method, "Ambiguous flowace name");
                    return None;
                }
                Lookup::Missing => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emp(id: u64, code: &str, name: &str) -> EmployeeRef {
        EmployeeRef {
            id,
            employee_code: code.to_string(),
            name: name.to_string(),
        }
    }

    fn matcher() -> NameMatcher {
        let employees = vec![
            emp(1, "EMP001", "Asha Rao"),
            emp(2, "EMP002", "Ravi Kumar"),
            emp(3, "EMP003", "Ravi Shankar"),
            emp(4, "EMP004", "Meera Nair"),
            emp(5, "EMP005", "Dr. John O'Neil"),
        ];
        let aliases = vec![
            ("RK".to_string(), "emp002".to_string()),
            ("Ghost".to_string(), "EMP999".to_string()),
        ];
        NameMatcher::new(&employees, &aliases)
    }

    fn found(m: &NameMatcher, name: &str) -> Option<(u64, MatchMethod)> {
        m.match_name(name).map(|r| (r.employee_id, r.method))
    }

    #[test]
    fn normalisation() {
        assert_eq!(normalize_name("  Mr. ASHA   rao "), "asha rao");
        assert_eq!(normalize_name("O'Neil, John"), "o neil john");
        assert_eq!(normalize_name("Dr."), "");
        assert_eq!(normalize_name("ÉLISE Müller"), "élise müller");
    }

    #[test]
    fn non_ascii_names_match_regardless_of_case() {
        let m = NameMatcher::new(&[emp(9, "EMP009", "Élise Müller")], &[]);
        assert_eq!(found(&m, "ÉLISE MÜLLER"), Some((9, MatchMethod::Exact)));
        assert_eq!(found(&m, "élisemüller"), Some((9, MatchMethod::Compact)));
    }

    #[test]
    fn alias_wins_first() {
        let m = matcher();
        assert_eq!(found(&m, "rk"), Some((2, MatchMethod::Alias)));
        assert_eq!(found(&m, "Ghost"), None);
    }

    #[test]
    fn exact_and_compact() {
        let m = matcher();
        assert_eq!(found(&m, "asha  RAO"), Some((1, MatchMethod::Exact)));
        assert_eq!(found(&m, "AshaRao"), Some((1, MatchMethod::Compact)));
        assert_eq!(found(&m, "John O Neil"), Some((5, MatchMethod::Exact)));
    }

    #[test]
    fn substring_either_way() {
        let m = matcher();
        assert_eq!(found(&m, "Meera"), Some((4, MatchMethod::Substring)));
        assert_eq!(found(&m, "Meera Nair (Ops)"), Some((4, MatchMethod::Substring)));
        assert_eq!(found(&m, "kumar"), Some((2, MatchMethod::Substring)));
    }

    #[test]
    fn ambiguity_is_unmatched() {
        let m = matcher();
        // both Ravis contain "ravi" and share the first name
        assert_eq!(found(&m, "Ravi"), None);
        assert_eq!(found(&m, "Ravi Verma"), None);
    }

    #[test]
    fn first_name_fallback() {
        let m = matcher();
        assert_eq!(found(&m, "Asha Menon"), Some((1, MatchMethod::FirstName)));
        assert_eq!(found(&m, "Unknown Person"), None);
        assert_eq!(found(&m, "   "), None);
    }
}
