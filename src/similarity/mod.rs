//! Duplicate detection across candidates
//!
//! Pairwise similarity is a weighted sum of five factors. Pairs strictly above
//! the threshold become edges; connected components of the edge graph are
//! duplicate groups, so A~B and B~C puts all three in one group even if A and
//! C are not directly similar.

pub mod factors;

use crate::triage::CandidateRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Above this many candidates only pairs sharing a primary language are compared
pub const DEFAULT_BUCKET_THRESHOLD: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Name,
    Languages,
    Dependencies,
    Structure,
    Tags,
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Factor::Name => "name",
            Factor::Languages => "languages",
            Factor::Dependencies => "dependencies",
            Factor::Structure => "structure",
            Factor::Tags => "tags",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub name: f64,
    pub languages: f64,
    pub dependencies: f64,
    pub structure: f64,
    pub tags: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            name: 0.30,
            languages: 0.25,
            dependencies: 0.20,
            structure: 0.15,
            tags: 0.10,
        }
    }
}

impl SimilarityWeights {
    fn as_pairs(&self) -> [(Factor, f64); 5] {
        [
            (Factor::Name, self.name),
            (Factor::Languages, self.languages),
            (Factor::Dependencies, self.dependencies),
            (Factor::Structure, self.structure),
            (Factor::Tags, self.tags),
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        for (factor, weight) in self.as_pairs() {
            if !(0.0..=1.0).contains(&weight) {
                return Err(format!("{} weight {} outside 0-1", factor, weight));
            }
        }
        let sum: f64 = self.as_pairs().iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("weights sum to {}, expected 1.0", sum));
        }
        Ok(())
    }
}

/// Per-factor scores for one pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorScores {
    pub name: f64,
    pub languages: f64,
    pub dependencies: f64,
    pub structure: f64,
    pub tags: f64,
}

impl FactorScores {
    fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Name => self.name,
            Factor::Languages => self.languages,
            Factor::Dependencies => self.dependencies,
            Factor::Structure => self.structure,
            Factor::Tags => self.tags,
        }
    }
}

/// Similar pair; `a < b` by id so the edge is the same whichever way it was found
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateEdge {
    pub a: String,
    pub b: String,
    pub similarity: f64,
    /// Factors that individually scored above the threshold
    pub matched: Vec<Factor>,
}

/// Connected component of duplicate edges with its surviving member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub representative: String,
    /// All member ids, representative included, sorted
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    weights: SimilarityWeights,
    threshold: f64,
    bucket_threshold: usize,
}

impl SimilarityEngine {
    pub fn new(weights: SimilarityWeights, threshold: f64) -> Self {
        Self {
            weights,
            threshold,
            bucket_threshold: DEFAULT_BUCKET_THRESHOLD,
        }
    }

    pub fn with_bucket_threshold(mut self, bucket_threshold: usize) -> Self {
        self.bucket_threshold = bucket_threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn factor_scores(&self, a: &CandidateRecord, b: &CandidateRecord) -> FactorScores {
        FactorScores {
            name: factors::name_similarity(&a.name, &b.name),
            languages: factors::jaccard(&a.languages, &b.languages),
            dependencies: factors::jaccard(&a.dependencies, &b.dependencies),
            structure: a.flags.match_fraction(&b.flags),
            tags: factors::jaccard(&a.tags, &b.tags),
        }
    }

    /// Weighted similarity in [0, 1]; symmetric in its arguments
    pub fn similarity(&self, a: &CandidateRecord, b: &CandidateRecord) -> f64 {
        let scores = self.factor_scores(a, b);
        self.combine(&scores)
    }

    fn combine(&self, scores: &FactorScores) -> f64 {
        self.weights
            .as_pairs()
            .iter()
            .map(|(factor, weight)| weight * scores.get(*factor))
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    /// Index pairs worth comparing
    fn comparison_pairs(&self, candidates: &[CandidateRecord]) -> Vec<(usize, usize)> {
        let n = candidates.len();
        if n <= self.bucket_threshold {
            return (0..n)
                .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
                .collect();
        }

        let mut buckets: BTreeMap<Option<&str>, Vec<usize>> = BTreeMap::new();
        for (idx, c) in candidates.iter().enumerate() {
            buckets
                .entry(c.primary_language.as_deref())
                .or_default()
                .push(idx);
        }
        debug!(
            candidates = n,
            buckets = buckets.len(),
            "Restricting similarity comparisons to primary-language buckets"
        );

        let mut pairs = Vec::new();
        for members in buckets.values() {
            for (pos, &i) in members.iter().enumerate() {
                for &j in &members[pos + 1..] {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Edges for every compared pair strictly above the threshold
    pub fn edges(&self, candidates: &[CandidateRecord]) -> Vec<DuplicateEdge> {
        self.indexed_edges(candidates)
            .into_iter()
            .map(|(_, _, edge)| edge)
            .collect()
    }

    fn indexed_edges(&self, candidates: &[CandidateRecord]) -> Vec<(usize, usize, DuplicateEdge)> {
        let mut edges = Vec::new();
        for (i, j) in self.comparison_pairs(candidates) {
            let (a, b) = (&candidates[i], &candidates[j]);
            let scores = self.factor_scores(a, b);
            let similarity = self.combine(&scores);
            if similarity <= self.threshold {
                continue;
            }

            let matched = self
                .weights
                .as_pairs()
                .iter()
                .map(|(factor, _)| *factor)
                .filter(|factor| scores.get(*factor) > self.threshold)
                .collect();
            let (a_id, b_id) = if a.id <= b.id {
                (a.id.clone(), b.id.clone())
            } else {
                (b.id.clone(), a.id.clone())
            };
            edges.push((
                i,
                j,
                DuplicateEdge {
                    a: a_id,
                    b: b_id,
                    similarity,
                    matched,
                },
            ));
        }
        edges
    }

    /// Connected components (by index) with more than one member.
    ///
    /// Components are ordered by their smallest index; members ascend.
    pub fn components(&self, candidates: &[CandidateRecord]) -> (Vec<Vec<usize>>, Vec<DuplicateEdge>) {
        let indexed = self.indexed_edges(candidates);
        let mut sets = DisjointSet::new(candidates.len());
        for (i, j, _) in &indexed {
            sets.union(*i, *j);
        }

        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for idx in 0..candidates.len() {
            by_root.entry(sets.find(idx)).or_default().push(idx);
        }

        let mut groups: Vec<Vec<usize>> = by_root.into_values().filter(|m| m.len() > 1).collect();
        groups.sort_by_key(|m| m[0]);

        let edges = indexed.into_iter().map(|(_, _, e)| e).collect();
        (groups, edges)
    }
}

/// Union-find with path halving; the smaller index becomes the root
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[child] = root;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::{Dependency, StructuralFlags};

    fn engine() -> SimilarityEngine {
        SimilarityEngine::new(SimilarityWeights::default(), 0.8)
    }

    fn candidate(id: &str, name: &str, lang: &str) -> CandidateRecord {
        CandidateRecord::new(id, name, format!("fp-{}", id))
            .with_languages([lang])
            .with_dependencies([Dependency::new("cargo", "serde")])
            .with_flags(StructuralFlags::all())
            .with_tags(["parser"])
    }

    #[test]
    fn test_default_weights_valid() {
        assert!(SimilarityWeights::default().validate().is_ok());

        let bad = SimilarityWeights {
            name: 0.9,
            ..SimilarityWeights::default()
        };
        assert!(bad.validate().unwrap_err().contains("sum"));
    }

    #[test]
    fn test_identical_candidates_score_one() {
        let a = candidate("a", "json-parser", "rust");
        let b = candidate("b", "JsonParser-v2", "rust");
        assert!((engine().similarity(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = candidate("a", "json-parser", "rust")
            .with_tags(["cli"])
            .with_dependencies([Dependency::new("cargo", "nom")]);
        let b = candidate("b", "yaml-parser", "python");
        let e = engine();
        assert_eq!(e.similarity(&a, &b), e.similarity(&b, &a));
    }

    #[test]
    fn test_unrelated_candidates_score_low() {
        let a = candidate("a", "json-parser", "rust");
        let b = CandidateRecord::new("b", "photo-gallery", "fp-b").with_languages(["php"]);
        assert!(engine().similarity(&a, &b) < 0.3);
    }

    #[test]
    fn test_edges_only_above_threshold() {
        let candidates = vec![
            candidate("a", "json-parser", "rust"),
            candidate("b", "json_parser", "rust"),
            CandidateRecord::new("c", "photo-gallery", "fp-c").with_languages(["php"]),
        ];
        let edges = engine().edges(&candidates);
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].a.as_str(), edges[0].b.as_str()), ("a", "b"));
        assert!(edges[0].matched.contains(&Factor::Name));
    }

    #[test]
    fn test_similarity_equal_to_threshold_is_not_an_edge() {
        let name_only = |threshold| {
            SimilarityEngine::new(
                SimilarityWeights {
                    name: 1.0,
                    languages: 0.0,
                    dependencies: 0.0,
                    structure: 0.0,
                    tags: 0.0,
                },
                threshold,
            )
        };
        let candidates = vec![
            candidate("a", "json-parser", "rust"),
            candidate("b", "json-parser", "go"),
        ];
        assert_eq!(name_only(1.0).similarity(&candidates[0], &candidates[1]), 1.0);

        assert!(name_only(1.0).edges(&candidates).is_empty());
        let (groups, _) = name_only(1.0).components(&candidates);
        assert!(groups.is_empty());

        let edges = name_only(0.99).edges(&candidates);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].matched, vec![Factor::Name]);
    }

    #[test]
    fn test_transitive_grouping() {
        let name_only = SimilarityEngine::new(
            SimilarityWeights {
                name: 1.0,
                languages: 0.0,
                dependencies: 0.0,
                structure: 0.0,
                tags: 0.0,
            },
            0.8,
        );
        let candidates = vec![
            candidate("a", "stream-kit", "rust"),
            candidate("b", "stream-kits", "rust"),
            candidate("c", "streamkitsxy", "rust"),
            candidate("d", "photo-gallery", "rust"),
        ];

        // a~b and b~c, but a and c are not directly similar
        assert!(name_only.similarity(&candidates[0], &candidates[2]) < 0.8);
        let (groups, edges) = name_only.components(&candidates);
        assert_eq!(edges.len(), 2);
        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_bucketing_skips_cross_language_pairs() {
        let candidates = vec![
            candidate("a", "json-parser", "rust"),
            candidate("b", "json-parser", "go"),
            candidate("c", "json-parser", "rust"),
        ];
        let bucketed = engine().with_bucket_threshold(2);
        let (groups, edges) = bucketed.components(&candidates);

        assert!(edges.iter().all(|e| e.b != "b" && e.a != "b"));
        assert_eq!(groups, vec![vec![0, 2]]);
    }
}
