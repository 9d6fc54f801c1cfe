//! Decide between auto-selecting the top match and returning candidates

use serde::Serialize;

use super::ranker::RankedSkill;

/// One entry of an ambiguous response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub name: String,
    pub score: f32,
    pub description: String,
}

impl From<&RankedSkill> for Candidate {
    fn from(ranked: &RankedSkill) -> Self {
        Self {
            name: ranked.name.clone(),
            score: ranked.score,
            description: ranked.description.clone(),
        }
    }
}

/// Response shape chosen for a ranked list.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Nothing matched
    Empty,
    Single(RankedSkill),
    Ambiguous {
        candidates: Vec<Candidate>,
        hint: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbiguityDetector {
    /// Minimum score gap between the top two results for auto-selection
    pub delta: f32,
    pub max_candidates: usize,
}

impl Default for AmbiguityDetector {
    fn default() -> Self {
        Self {
            delta: 0.08,
            max_candidates: 5,
        }
    }
}

impl AmbiguityDetector {
    #[must_use]
    pub const fn new(delta: f32, max_candidates: usize) -> Self {
        Self {
            delta,
            max_candidates,
        }
    }

    /// Whether the top two results are too close to pick one.
    #[must_use]
    pub fn is_ambiguous(&self, ranked: &[RankedSkill]) -> bool {
        match ranked {
            [top, second, ..] => top.score - second.score < self.delta,
            _ => false,
        }
    }

    /// Pick the response shape for `ranked` (best first).
    #[must_use]
    pub fn select(&self, ranked: &[RankedSkill], auto_select: bool) -> Selection {
        let Some(top) = ranked.first() else {
            return Selection::Empty;
        };
        if auto_select || !self.is_ambiguous(ranked) {
            return Selection::Single(top.clone());
        }

        let mut candidates = vec![Candidate::from(top)];
        candidates.extend(
            ranked
                .iter()
                .skip(1)
                .filter(|r| (top.score - r.score).abs() < self.delta)
                .map(Candidate::from),
        );
        candidates.truncate(self.max_candidates.max(1));
        let hint = hint_for(&candidates);
        Selection::Ambiguous { candidates, hint }
    }
}

fn hint_for(candidates: &[Candidate]) -> String {
    let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
    format!(
        "Multiple skills match with similar scores; resolve by name with `read <name>`: {}",
        names.join(", ")
    )
}
