use crate::config::MatcherConfig;
use crate::models::AnswerCheck;

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Levenshtein distance over chars; insert, delete and substitute cost 1.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rows of the DP matrix are enough
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (curr[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Typed-answer comparison that forgives small typos.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Edits allowed against `canonical` (already normalized).
    pub fn tolerance(&self, canonical: &str) -> usize {
        let len = canonical.chars().count() as f64;
        let scaled = (len * self.config.tolerance_ratio).floor() as usize;
        scaled.max(self.config.min_tolerance)
    }

    pub fn check(&self, given: &str, canonical: &str) -> AnswerCheck {
        let given = normalize(given);
        let canonical = normalize(canonical);
        let tolerance = self.tolerance(&canonical);

        if given == canonical {
            return AnswerCheck {
                is_match: true,
                distance: 0,
                tolerance,
            };
        }

        let distance = levenshtein(&given, &canonical);
        AnswerCheck {
            is_match: distance <= tolerance,
            distance,
            tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod levenshtein_tests {
        use super::*;

        #[test]
        fn identical() {
            assert_eq!(levenshtein("ligase", "ligase"), 0);
        }

        #[test]
        fn empty_sides() {
            assert_eq!(levenshtein("", "abc"), 3);
            assert_eq!(levenshtein("abc", ""), 3);
            assert_eq!(levenshtein("", ""), 0);
        }

        #[test]
        fn single_edits() {
            assert_eq!(levenshtein("plasmid", "plasmd"), 1); // deletion
            assert_eq!(levenshtein("plasmid", "plasmids"), 1); // insertion
            assert_eq!(levenshtein("plasmid", "plasnid"), 1); // substitution
        }

        #[test]
        fn transposition_costs_two() {
            assert_eq!(levenshtein("codon", "cdoon"), 2);
        }

        #[test]
        fn symmetric() {
            for (a, b) in [("kitten", "sitting"), ("gel", "agarose"), ("", "dna")] {
                assert_eq!(levenshtein(a, b), levenshtein(b, a));
            }
        }

        #[test]
        fn counts_chars_not_bytes() {
            assert_eq!(levenshtein("naïve", "naive"), 1);
            assert_eq!(levenshtein("β-lactam", "b-lactam"), 1);
        }
    }

    mod check_tests {
        use super::*;

        #[test]
        fn exact_after_normalization() {
            let m = Matcher::default();
            let check = m.check("  Restriction ", "restriction");
            assert!(check.is_match);
            assert_eq!(check.distance, 0);
        }

        #[test]
        fn restriction_boundary() {
            let m = Matcher::default();
            assert_eq!(m.tolerance("restriction"), 2);

            let two = m.check("restrictoin", "restriction");
            assert_eq!(two.distance, 2);
            assert!(two.is_match);

            let three = m.check("restricshun", "restriction");
            assert_eq!(three.distance, 3);
            assert!(!three.is_match);
        }

        #[test]
        fn long_terms_scale_tolerance() {
            let m = Matcher::default();
            // 25 chars -> floor(5.0) = 5
            assert_eq!(m.tolerance("polymerase chain reaction"), 5);
            assert!(m.check("polymerse chain reacton", "polymerase chain reaction").is_match);
        }

        #[test]
        fn short_terms_use_minimum() {
            let m = Matcher::default();
            assert_eq!(m.tolerance("dna"), 2);
            assert!(m.check("rna", "dna").is_match);
            assert!(!m.check("protein", "dna").is_match);
        }

        #[test]
        fn custom_config() {
            let m = Matcher::new(MatcherConfig {
                min_tolerance: 0,
                tolerance_ratio: 0.0,
            });
            assert!(m.check("CRISPR", "crispr").is_match);
            assert!(!m.check("crispr ", "crisp").is_match);
        }
    }
}
