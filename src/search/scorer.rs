//! Score fusion.
//!
//! The final score is the backend's base similarity plus independently bounded
//! boosts. Base scores keep each backend's native range, so scores are only
//! comparable within one generation.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::catalog::{Category, Color, Item};
use crate::config::ScoringConfig;

/// A candidate with its fused score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    /// Catalog position, the tie-break key.
    pub position: usize,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// `tag_weight` per distinct query token found in the item tags, at most `tag_cap` of them.
    pub fn tag_boost(&self, query_tokens: &BTreeSet<String>, item: &Item) -> f32 {
        let overlap = query_tokens
            .iter()
            .filter(|token| item.tags.contains(*token))
            .count();
        self.config.tag_weight * overlap.min(self.config.tag_cap) as f32
    }

    /// Rewards using more of the stated budget. Only meaningful for items that
    /// already passed the price filter.
    pub fn price_boost(&self, item: &Item, max_price: Option<f64>) -> f32 {
        match max_price {
            Some(max) if max > 0.0 => self.config.price_weight * (item.price / max) as f32,
            _ => 0.0,
        }
    }

    /// Exact color match, otherwise a weak prior for neutral items.
    pub fn color_boost(&self, item_color: Color, query_color: Color) -> f32 {
        if query_color.is_specific() && item_color == query_color {
            self.config.color_match
        } else if item_color.is_neutral() {
            self.config.neutral_prior
        } else {
            0.0
        }
    }

    /// Boost per category derived from the nearest neighbours by base score.
    ///
    /// `neighbours` must be `(category, base score, catalog position)` for every
    /// candidate. The top `category_prior_neighbours` by base score vote; each
    /// category gets `count / category_prior_neighbours * category_prior_weight`
    /// and the most frequent one an extra `category_leader_bonus`. Ties for the
    /// lead go to the category whose first neighbour ranks highest.
    pub fn category_prior(
        &self,
        neighbours: &[(Option<Category>, f32, usize)],
    ) -> HashMap<Category, f32> {
        let top_m = self.config.category_prior_neighbours;
        let mut order: Vec<&(Option<Category>, f32, usize)> = neighbours.iter().collect();
        order.sort_by(|a, b| rank_order(a.1, a.2, b.1, b.2));

        // (category, votes) in order of first appearance
        let mut votes: Vec<(Category, usize)> = Vec::new();
        for (category, _, _) in order.into_iter().take(top_m) {
            let Some(category) = category else {
                continue;
            };
            match votes.iter_mut().find(|(c, _)| c == category) {
                Some(entry) => entry.1 += 1,
                None => votes.push((*category, 1)),
            }
        }

        let leader = votes
            .iter()
            .fold(None::<(Category, usize)>, |best, &(category, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((category, count)),
            })
            .map(|(category, _)| category);

        votes
            .into_iter()
            .map(|(category, count)| {
                let mut boost = count as f32 / top_m as f32 * self.config.category_prior_weight;
                if Some(category) == leader {
                    boost += self.config.category_leader_bonus;
                }
                (category, boost)
            })
            .collect()
    }

    /// Sort by score descending, ties by catalog position, and keep `top_k`.
    pub fn rank(&self, mut scored: Vec<Scored>, top_k: usize) -> Vec<Scored> {
        scored.sort_by(|a, b| rank_order(a.score, a.position, b.score, b.position));
        scored.truncate(top_k);
        scored
    }
}

fn rank_order(a_score: f32, a_position: usize, b_score: f32, b_position: usize) -> Ordering {
    b_score
        .total_cmp(&a_score)
        .then_with(|| a_position.cmp(&b_position))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> Scorer {
        Scorer::new(ScoringConfig::default())
    }

    fn item(tags: &[&str], price: f64) -> Item {
        Item {
            id: "i".to_string(),
            title: String::new(),
            category: None,
            color: None,
            price,
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            image: None,
        }
    }

    fn tokens(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tag_boost_is_capped() {
        let s = scorer();
        let it = item(&["running", "winter", "trail"], 10.0);
        assert!((s.tag_boost(&tokens(&["running"]), &it) - 0.12).abs() < 1e-6);
        assert!(
            (s.tag_boost(&tokens(&["running", "winter", "trail"]), &it) - 0.24).abs() < 1e-6
        );
        assert_eq!(s.tag_boost(&tokens(&["leather"]), &it), 0.0);
    }

    #[test]
    fn test_price_boost() {
        let s = scorer();
        assert!((s.price_boost(&item(&[], 30.0), Some(60.0)) - 0.05).abs() < 1e-6);
        assert_eq!(s.price_boost(&item(&[], 30.0), None), 0.0);
        assert_eq!(s.price_boost(&item(&[], 0.0), Some(0.0)), 0.0);
    }

    #[test]
    fn test_color_boost() {
        let s = scorer();
        assert_eq!(s.color_boost(Color::Blue, Color::Blue), 0.12);
        assert_eq!(s.color_boost(Color::Black, Color::Blue), 0.02);
        assert_eq!(s.color_boost(Color::Black, Color::Black), 0.12);
        assert_eq!(s.color_boost(Color::Red, Color::Blue), 0.0);
        assert_eq!(s.color_boost(Color::Assorted, Color::Assorted), 0.0);
    }

    #[test]
    fn test_category_prior() {
        let s = scorer();
        let neighbours = vec![
            (Some(Category::Bags), 0.9, 0),
            (Some(Category::Shoes), 0.8, 1),
            (Some(Category::Shoes), 0.7, 2),
            (None, 0.6, 3),
        ];
        let prior = s.category_prior(&neighbours);
        assert!((prior[&Category::Shoes] - (2.0 / 40.0 * 0.15 + 0.05)).abs() < 1e-6);
        assert!((prior[&Category::Bags] - (1.0 / 40.0 * 0.15)).abs() < 1e-6);
    }

    #[test]
    fn test_category_prior_tie_goes_to_highest_ranked() {
        let s = scorer();
        let neighbours = vec![
            (Some(Category::Caps), 0.5, 0),
            (Some(Category::Bags), 0.9, 1),
        ];
        let prior = s.category_prior(&neighbours);
        assert!(prior[&Category::Bags] > prior[&Category::Caps]);
    }

    #[test]
    fn test_rank_breaks_ties_by_position() {
        let s = scorer();
        let scored = vec![
            Scored { position: 3, score: 0.5 },
            Scored { position: 1, score: 0.5 },
            Scored { position: 2, score: 0.9 },
        ];
        let ranked = s.rank(scored, 2);
        let positions: Vec<usize> = ranked.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![2, 1]);
    }
}
