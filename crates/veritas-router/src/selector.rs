//! Adaptive Selector - epsilon-greedy choice of which judges to invoke
//!
//! Exploit ranks judges by tracked quality for the current difficulty bucket,
//! inverse cost and a bucket bonus. With probability epsilon the lowest
//! ranked chosen judge is swapped for the least-called unchosen one so that
//! statistics stay fresh. Epsilon decays multiplicatively toward a floor.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use veritas_core::{
    Budget, ConsensusError, Difficulty, DifficultyBucket, JudgeId, JudgeProfile, PerformanceStat,
};

/// Quality assumed for a judge with no history at all
const UNSEEN_QUALITY: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Initial exploration probability
    pub epsilon: f64,
    /// Multiplicative decay applied after each selection
    pub epsilon_decay: f64,
    /// Exploration never drops below this
    pub min_epsilon: f64,
    pub quality_weight: f64,
    pub cost_weight: f64,
    pub bucket_weight: f64,
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.15,
            epsilon_decay: 0.995,
            min_epsilon: 0.02,
            quality_weight: 0.5,
            cost_weight: 0.3,
            bucket_weight: 0.2,
            seed: None,
        }
    }
}

/// Judges chosen for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Judges to invoke, best ranked first
    pub judges: Vec<JudgeProfile>,
    /// Unchosen eligible judges, cheapest first, for a shortfall retry
    pub reserve: Vec<JudgeProfile>,
    /// Count the difficulty asked for before budget limits
    pub target: usize,
    pub budget_constrained: bool,
    /// Judge swapped in by exploration
    pub explored: Option<JudgeId>,
    /// Epsilon in effect for this selection
    pub epsilon: f64,
    pub degradations: Vec<ConsensusError>,
}

#[derive(Debug)]
struct SelectorState {
    rng: StdRng,
    epsilon: f64,
    selections: u64,
}

#[derive(Debug)]
pub struct AdaptiveSelector {
    config: SelectorConfig,
    state: Mutex<SelectorState>,
}

impl AdaptiveSelector {
    pub fn new(config: SelectorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            state: Mutex::new(SelectorState {
                rng,
                epsilon: config.epsilon,
                selections: 0,
            }),
            config,
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Current exploration probability
    pub fn epsilon(&self) -> f64 {
        self.state.lock().epsilon
    }

    pub fn selections(&self) -> u64 {
        self.state.lock().selections
    }

    /// How many judges a difficulty asks for, before budget and `min_models`
    pub fn target_count(difficulty: &Difficulty, enabled: usize) -> usize {
        match difficulty.bucket {
            DifficultyBucket::Low => 2,
            DifficultyBucket::Medium if difficulty.score >= 0.5 => 4,
            DifficultyBucket::Medium => 3,
            DifficultyBucket::High => enabled,
        }
    }

    pub fn select(
        &self,
        profiles: &[JudgeProfile],
        stats: &HashMap<JudgeId, PerformanceStat>,
        difficulty: &Difficulty,
        budget: &Budget,
    ) -> Result<Selection, ConsensusError> {
        let enabled: Vec<&JudgeProfile> = profiles.iter().filter(|p| p.enabled).collect();
        if enabled.is_empty() {
            return Err(ConsensusError::NoAvailableJudges);
        }

        let target = Self::target_count(difficulty, enabled.len())
            .max(budget.min_models)
            .min(enabled.len());

        // Latency ceiling applies per judge, calls run side by side
        let eligible: Vec<&JudgeProfile> = match budget.max_latency() {
            Some(max) => enabled
                .iter()
                .copied()
                .filter(|p| p.latency_class.nominal() <= max)
                .collect(),
            None => enabled.clone(),
        };

        let mut ranked = self.rank(&eligible, stats, difficulty.bucket);

        let mut state = self.state.lock();
        let epsilon = state.epsilon;
        state.epsilon = (epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
        state.selections += 1;

        let mut explored = None;
        let chosen_len = target.min(ranked.len());
        if chosen_len > 0 && ranked.len() > chosen_len && state.rng.random::<f64>() < epsilon {
            let calls = |p: &JudgeProfile| stats.get(&p.id).map(|s| s.calls).unwrap_or(0);
            let fewest = ranked[chosen_len..].iter().map(|p| calls(*p)).min().unwrap_or(0);
            let pool: Vec<usize> = (chosen_len..ranked.len())
                .filter(|&i| calls(ranked[i]) == fewest)
                .collect();
            let pick = pool[state.rng.random_range(0..pool.len())];
            ranked.swap(chosen_len - 1, pick);
            explored = Some(ranked[chosen_len - 1].id.clone());
        }
        drop(state);

        let (mut judges, mut rest) = {
            let (head, tail) = ranked.split_at(chosen_len);
            (head.to_vec(), tail.to_vec())
        };

        // Budget: keep affordable chosen judges, backfill by rank
        let mut limited = eligible.len() < enabled.len();
        let mut spent = 0.0;
        let mut kept = Vec::new();
        for judge in judges.drain(..) {
            if budget.affords(spent, judge.cost_estimate) {
                spent += judge.cost_estimate;
                kept.push(judge);
            } else {
                limited = true;
                rest.push(judge);
            }
        }
        let mut i = 0;
        while kept.len() < target && i < rest.len() {
            if budget.affords(spent, rest[i].cost_estimate) {
                spent += rest[i].cost_estimate;
                kept.push(rest.remove(i));
            } else {
                limited = true;
                i += 1;
            }
        }

        let mut budget_constrained = false;
        let mut degradations = Vec::new();
        if kept.len() < budget.min_models && !limited {
            // Too few judges enabled; the orchestrator flags low confidence
            tracing::debug!(
                enabled = enabled.len(),
                required = budget.min_models,
                "Fewer judges enabled than the minimum count"
            );
        } else if kept.len() < budget.min_models {
            // Cheapest judges that fit, as many as the budget allows
            let mut by_cost: Vec<&JudgeProfile> = eligible.clone();
            sort_by_cost(&mut by_cost);
            let mut cheapest = Vec::new();
            let mut cheapest_spent = 0.0;
            for judge in by_cost {
                if cheapest.len() == budget.min_models {
                    break;
                }
                if budget.affords(cheapest_spent, judge.cost_estimate) {
                    cheapest_spent += judge.cost_estimate;
                    cheapest.push(judge);
                }
            }
            if cheapest.len() > kept.len() {
                kept = cheapest;
            }
            budget_constrained = true;
            degradations.push(ConsensusError::BudgetInsufficient {
                affordable: kept.len(),
                required: budget.min_models,
            });
            tracing::warn!(
                affordable = kept.len(),
                required = budget.min_models,
                "Budget cannot afford the minimum judge count"
            );
        } else if kept.len() < target {
            budget_constrained = limited;
        }

        if let Some(id) = &explored {
            if !kept.iter().any(|p| &p.id == id) {
                explored = None;
            }
        }

        let mut reserve: Vec<&JudgeProfile> = eligible
            .iter()
            .copied()
            .filter(|p| !kept.iter().any(|k| k.id == p.id))
            .collect();
        sort_by_cost(&mut reserve);

        metrics::gauge!("veritas_selector_epsilon").set(epsilon);
        tracing::debug!(
            target,
            selected = kept.len(),
            epsilon,
            explored = ?explored,
            budget_constrained,
            "Selected judges"
        );

        Ok(Selection {
            judges: kept.into_iter().cloned().collect(),
            reserve: reserve.into_iter().cloned().collect(),
            target,
            budget_constrained,
            explored,
            epsilon,
            degradations,
        })
    }

    /// Eligible judges best first; ties broken by id
    fn rank<'a>(
        &self,
        eligible: &[&'a JudgeProfile],
        stats: &HashMap<JudgeId, PerformanceStat>,
        bucket: DifficultyBucket,
    ) -> Vec<&'a JudgeProfile> {
        let max_cost = eligible.iter().map(|p| p.cost_estimate).fold(0.0, f64::max);
        let min_cost = eligible
            .iter()
            .map(|p| p.cost_estimate)
            .fold(f64::INFINITY, f64::min);

        let mut scored: Vec<(f64, &'a JudgeProfile)> = eligible
            .iter()
            .map(|&p| {
                let (quality, bonus) = match stats.get(&p.id) {
                    Some(stat) => {
                        let bucket_quality = stat.quality_for(bucket);
                        (bucket_quality, 0.5 + 0.5 * (bucket_quality - stat.overall_quality()))
                    }
                    None => (UNSEEN_QUALITY, 0.5),
                };
                let inverse_cost = if max_cost > min_cost {
                    (max_cost - p.cost_estimate) / (max_cost - min_cost)
                } else {
                    1.0
                };
                let score = self.config.quality_weight * quality
                    + self.config.cost_weight * inverse_cost
                    + self.config.bucket_weight * bonus.clamp(0.0, 1.0);
                (score, p)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.into_iter().map(|(_, p)| p).collect()
    }
}

fn sort_by_cost(profiles: &mut [&JudgeProfile]) {
    profiles.sort_by(|a, b| {
        a.cost_estimate
            .total_cmp(&b.cost_estimate)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use veritas_core::{JudgeResult, LatencyClass};

    fn profiles() -> Vec<JudgeProfile> {
        vec![
            JudgeProfile::new("a", "a").with_cost(0.010),
            JudgeProfile::new("b", "b").with_cost(0.002),
            JudgeProfile::new("c", "c").with_cost(0.020).with_latency_class(LatencyClass::Slow),
            JudgeProfile::new("d", "d").with_cost(0.001).with_latency_class(LatencyClass::Fast),
            JudgeProfile::new("e", "e").with_cost(0.005),
        ]
    }

    fn greedy() -> AdaptiveSelector {
        AdaptiveSelector::new(SelectorConfig {
            epsilon: 0.0,
            min_epsilon: 0.0,
            seed: Some(7),
            ..Default::default()
        })
    }

    fn ids(profiles: &[JudgeProfile]) -> Vec<&str> {
        profiles.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_no_enabled_judges() {
        let selector = greedy();
        let disabled: Vec<_> = profiles().into_iter().map(|p| p.disabled()).collect();
        let err = selector
            .select(&disabled, &HashMap::new(), &Difficulty::from_score(0.1), &Budget::default())
            .unwrap_err();
        assert_eq!(err, ConsensusError::NoAvailableJudges);
        assert!(selector
            .select(&[], &HashMap::new(), &Difficulty::from_score(0.1), &Budget::default())
            .is_err());
    }

    #[test]
    fn test_count_scales_with_difficulty() {
        let selector = greedy();
        let stats = HashMap::new();
        let budget = Budget::default();
        let count = |score: f64| {
            selector
                .select(&profiles(), &stats, &Difficulty::from_score(score), &budget)
                .unwrap()
                .judges
                .len()
        };
        assert_eq!(count(0.1), 2);
        assert_eq!(count(0.4), 3);
        assert_eq!(count(0.6), 4);
        assert_eq!(count(0.9), 5);
    }

    #[test]
    fn test_min_models_raises_count() {
        let selector = greedy();
        let selection = selector
            .select(
                &profiles(),
                &HashMap::new(),
                &Difficulty::from_score(0.1),
                &Budget::default().with_min_models(3),
            )
            .unwrap();
        assert_eq!(selection.judges.len(), 3);
    }

    #[test]
    fn test_unseen_judges_prefer_cheap() {
        let selector = greedy();
        let selection = selector
            .select(&profiles(), &HashMap::new(), &Difficulty::from_score(0.1), &Budget::default())
            .unwrap();
        assert_eq!(ids(&selection.judges), vec!["d", "b"]);
        assert_eq!(ids(&selection.reserve), vec!["e", "a", "c"]);
        assert!(!selection.budget_constrained);
    }

    #[test]
    fn test_quality_outweighs_small_cost_gap() {
        let selector = greedy();
        let mut stats = HashMap::new();
        let mut good = PerformanceStat::new(JudgeId::new("a"));
        for _ in 0..5 {
            good.observe(
                &JudgeResult::success(JudgeId::new("a"), 0.9, 0.95, 100, 0.01),
                DifficultyBucket::Low,
                0.1,
            );
        }
        stats.insert(JudgeId::new("a"), good);
        let selection = selector
            .select(&profiles(), &stats, &Difficulty::from_score(0.1), &Budget::default())
            .unwrap();
        assert_eq!(selection.judges[0].id.as_str(), "a");
    }

    #[test]
    fn test_budget_constrained_picks_cheapest() {
        let selector = greedy();
        let selection = selector
            .select(
                &profiles(),
                &HashMap::new(),
                &Difficulty::from_score(0.9),
                &Budget::default().with_max_cost(0.0015).with_min_models(2),
            )
            .unwrap();
        assert!(selection.budget_constrained);
        assert_eq!(ids(&selection.judges), vec!["d"]);
        assert_eq!(
            selection.degradations,
            vec![ConsensusError::BudgetInsufficient {
                affordable: 1,
                required: 2
            }]
        );
    }

    #[test]
    fn test_budget_limits_high_difficulty() {
        let selector = greedy();
        let selection = selector
            .select(
                &profiles(),
                &HashMap::new(),
                &Difficulty::from_score(0.9),
                &Budget::default().with_max_cost(0.02),
            )
            .unwrap();
        let total: f64 = selection.judges.iter().map(|p| p.cost_estimate).sum();
        assert!(total <= 0.02 + 1e-9);
        assert!(selection.judges.len() >= 2);
        assert!(selection.budget_constrained);
        assert!(selection.degradations.is_empty());
    }

    #[test]
    fn test_too_few_judges_is_not_a_budget_problem() {
        let selector = greedy();
        let two = &profiles()[..2];
        for budget in [
            Budget::default().with_min_models(3),
            Budget::default().with_min_models(3).with_max_cost(1.0),
        ] {
            let selection = selector
                .select(two, &HashMap::new(), &Difficulty::from_score(0.1), &budget)
                .unwrap();
            assert_eq!(selection.judges.len(), 2);
            assert!(!selection.budget_constrained);
            assert!(selection.degradations.is_empty());
        }
    }

    #[test]
    fn test_shortage_with_tight_budget_is_flagged() {
        let selector = greedy();
        let selection = selector
            .select(
                &profiles()[..2],
                &HashMap::new(),
                &Difficulty::from_score(0.1),
                &Budget::default().with_min_models(3).with_max_cost(0.003),
            )
            .unwrap();
        assert_eq!(ids(&selection.judges), vec!["b"]);
        assert!(selection.budget_constrained);
        assert_eq!(
            selection.degradations,
            vec![ConsensusError::BudgetInsufficient {
                affordable: 1,
                required: 3
            }]
        );
    }

    #[test]
    fn test_latency_ceiling_excludes_slow_judges() {
        let selector = greedy();
        let selection = selector
            .select(
                &profiles(),
                &HashMap::new(),
                &Difficulty::from_score(0.9),
                &Budget::default().with_max_latency(Duration::from_secs(2)),
            )
            .unwrap();
        assert!(!selection.judges.iter().any(|p| p.id.as_str() == "c"));
        assert_eq!(selection.judges.len(), 4);
    }

    #[test]
    fn test_epsilon_decays_to_floor() {
        let selector = AdaptiveSelector::new(SelectorConfig {
            epsilon: 0.5,
            epsilon_decay: 0.5,
            min_epsilon: 0.1,
            seed: Some(1),
            ..Default::default()
        });
        for _ in 0..10 {
            selector
                .select(&profiles(), &HashMap::new(), &Difficulty::from_score(0.1), &Budget::default())
                .unwrap();
        }
        assert!((selector.epsilon() - 0.1).abs() < 1e-12);
        assert_eq!(selector.selections(), 10);
    }

    #[test]
    fn test_exploration_swaps_in_least_called() {
        let selector = AdaptiveSelector::new(SelectorConfig {
            epsilon: 1.0,
            epsilon_decay: 1.0,
            min_epsilon: 1.0,
            seed: Some(42),
            ..Default::default()
        });
        let mut stats = HashMap::new();
        for id in ["a", "b", "c", "d"] {
            let mut stat = PerformanceStat::new(JudgeId::new(id));
            stat.observe(
                &JudgeResult::success(JudgeId::new(id), 0.5, 0.5, 10, 0.0),
                DifficultyBucket::Low,
                0.1,
            );
            stats.insert(JudgeId::new(id), stat);
        }
        let selection = selector
            .select(&profiles(), &stats, &Difficulty::from_score(0.1), &Budget::default())
            .unwrap();
        // "e" is the only judge never called
        assert_eq!(selection.explored, Some(JudgeId::new("e")));
        assert!(selection.judges.iter().any(|p| p.id.as_str() == "e"));
        assert_eq!(selection.judges.len(), 2);
    }

    #[test]
    fn test_seeded_selectors_agree() {
        let config = SelectorConfig {
            epsilon: 0.5,
            seed: Some(99),
            ..Default::default()
        };
        let a = AdaptiveSelector::new(config.clone());
        let b = AdaptiveSelector::new(config);
        for _ in 0..20 {
            let d = Difficulty::from_score(0.1);
            let sa = a.select(&profiles(), &HashMap::new(), &d, &Budget::default()).unwrap();
            let sb = b.select(&profiles(), &HashMap::new(), &d, &Budget::default()).unwrap();
            assert_eq!(sa, sb);
        }
    }
}
