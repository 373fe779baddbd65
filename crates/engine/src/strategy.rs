//! Allocation strategies — pure functions over a counter snapshot.
//!
//! Every strategy returns a code present in the snapshot and takes its
//! randomness from the injected rng, so callers can pin seeds in tests.
//! Exact rate ties break with a fair coin flip against the running
//! incumbent, applied at each encounter; a tie before any incumbent exists
//! adopts the candidate outright.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use splitflow_core::types::VariantCounts;
use splitflow_core::{SplitflowError, SplitflowResult};
use splitflow_stats::posterior_draw;
use tracing::warn;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    EpsilonGreedy,
    #[default]
    Thompson,
    Ucb1,
    Uniform,
}

impl Strategy {
    /// Maps request identifiers to a strategy. Unknown names fall back to
    /// Thompson, the documented default for this service.
    pub fn resolve(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "egreedy" | "e_greedy" | "epsilon_greedy" => Self::EpsilonGreedy,
            "thompson" | "thompson_sampling" => Self::Thompson,
            "ucb" | "ucb1" => Self::Ucb1,
            "uniform" | "random" => Self::Uniform,
            other => {
                warn!(strategy = other, "Unknown strategy, falling back to thompson");
                Self::Thompson
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EpsilonGreedy => "epsilon_greedy",
            Self::Thompson => "thompson",
            Self::Ucb1 => "ucb1",
            Self::Uniform => "uniform",
        }
    }
}

/// Picks one variant code from the snapshot.
///
/// `epsilon` is only consulted by [`Strategy::EpsilonGreedy`] and must lie
/// in [0, 1]. A single-variant snapshot returns that variant immediately;
/// an empty snapshot is rejected.
pub fn select_variant<R: Rng + ?Sized>(
    strategy: Strategy,
    snapshot: &BTreeMap<String, VariantCounts>,
    epsilon: f64,
    rng: &mut R,
) -> SplitflowResult<String> {
    if strategy == Strategy::EpsilonGreedy && !(0.0..=1.0).contains(&epsilon) {
        return Err(SplitflowError::InvalidParameter(format!(
            "epsilon must lie in [0, 1], got {epsilon}"
        )));
    }
    if snapshot.is_empty() {
        return Err(empty_set_error());
    }
    if snapshot.len() == 1 {
        if let Some(code) = snapshot.keys().next() {
            return Ok(code.clone());
        }
    }

    match strategy {
        Strategy::EpsilonGreedy => epsilon_greedy(snapshot, epsilon, rng),
        Strategy::Thompson => thompson(snapshot, rng),
        Strategy::Ucb1 => ucb1(snapshot, rng),
        Strategy::Uniform => Ok(uniform(snapshot, rng)),
    }
}

/// Explore uniformly with probability epsilon, otherwise take the highest
/// observed conversion rate.
fn epsilon_greedy<R: Rng + ?Sized>(
    snapshot: &BTreeMap<String, VariantCounts>,
    epsilon: f64,
    rng: &mut R,
) -> SplitflowResult<String> {
    if rng.gen::<f64>() < epsilon {
        return Ok(uniform(snapshot, rng));
    }

    let mut best_rate = 0.0f64;
    let mut selected: Option<&String> = None;
    for (code, counts) in snapshot {
        let rate = counts.conversion_rate();
        if rate > best_rate {
            best_rate = rate;
            selected = Some(code);
        } else if rate == best_rate {
            let keep_incumbent = selected.is_some() && rng.gen_bool(0.5);
            if !keep_incumbent {
                selected = Some(code);
            }
        }
    }
    selected.cloned().ok_or_else(empty_set_error)
}

/// One posterior draw per variant; the highest sample wins. The strict
/// comparison keeps the first maximum on a (measure-zero) exact tie.
fn thompson<R: Rng + ?Sized>(
    snapshot: &BTreeMap<String, VariantCounts>,
    rng: &mut R,
) -> SplitflowResult<String> {
    let mut best_sample = 0.0f64;
    let mut selected: Option<&String> = None;
    for (code, counts) in snapshot {
        let sample = posterior_draw(counts, rng)?;
        if sample > best_sample {
            best_sample = sample;
            selected = Some(code);
        }
    }
    selected.cloned().ok_or_else(empty_set_error)
}

/// Observed rate plus the UCB1 exploration bonus sqrt(2 ln(total) / n).
/// The floors keep raw all-zero snapshots defined; seeded counters never
/// reach them.
fn ucb1<R: Rng + ?Sized>(
    snapshot: &BTreeMap<String, VariantCounts>,
    rng: &mut R,
) -> SplitflowResult<String> {
    let total_impressions: u64 = snapshot.values().map(|c| c.impressions).sum();
    let log_total = (total_impressions.max(1) as f64).ln();

    let mut best_score = 0.0f64;
    let mut selected: Option<&String> = None;
    for (code, counts) in snapshot {
        let bonus = (2.0 * log_total / counts.impressions.max(1) as f64).sqrt();
        let score = counts.conversion_rate() + bonus;
        if score > best_score {
            best_score = score;
            selected = Some(code);
        } else if score == best_score {
            let keep_incumbent = selected.is_some() && rng.gen_bool(0.5);
            if !keep_incumbent {
                selected = Some(code);
            }
        }
    }
    selected.cloned().ok_or_else(empty_set_error)
}

/// Baseline: uniform random pick. Callers guarantee a non-empty snapshot.
fn uniform<R: Rng + ?Sized>(snapshot: &BTreeMap<String, VariantCounts>, rng: &mut R) -> String {
    let codes: Vec<&String> = snapshot.keys().collect();
    let idx = rng.gen_range(0..codes.len());
    codes[idx].clone()
}

fn empty_set_error() -> SplitflowError {
    SplitflowError::InvalidParameter("cannot allocate from an empty variant set".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use splitflow_stats::probability_greater;

    fn snapshot(entries: &[(&str, u64, u64)]) -> BTreeMap<String, VariantCounts> {
        entries
            .iter()
            .map(|(code, impressions, conversions)| {
                (
                    code.to_string(),
                    VariantCounts {
                        impressions: *impressions,
                        conversions: *conversions,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_single_variant_short_circuits_every_strategy() {
        let mut rng = StdRng::seed_from_u64(1);
        let snap = snapshot(&[("only", 1, 1)]);
        for strategy in [
            Strategy::EpsilonGreedy,
            Strategy::Thompson,
            Strategy::Ucb1,
            Strategy::Uniform,
        ] {
            let code = select_variant(strategy, &snap, 0.1, &mut rng).unwrap();
            assert_eq!(code, "only");
        }
    }

    #[test]
    fn test_empty_snapshot_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let snap = BTreeMap::new();
        assert!(matches!(
            select_variant(Strategy::Thompson, &snap, 0.1, &mut rng),
            Err(SplitflowError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_epsilon_out_of_range_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let snap = snapshot(&[("A", 1, 1), ("B", 1, 1)]);
        for bad in [-0.1, 1.1, f64::NAN] {
            assert!(matches!(
                select_variant(Strategy::EpsilonGreedy, &snap, bad, &mut rng),
                Err(SplitflowError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_epsilon_one_explores_uniformly() {
        let mut rng = StdRng::seed_from_u64(7);
        // rates wildly uneven on purpose; epsilon = 1.0 must ignore them
        let snap = snapshot(&[("A", 100, 90), ("B", 100, 10), ("C", 100, 1)]);

        let draws = 10_000u32;
        let mut hits: BTreeMap<String, u32> = BTreeMap::new();
        for _ in 0..draws {
            let code = select_variant(Strategy::EpsilonGreedy, &snap, 1.0, &mut rng).unwrap();
            *hits.entry(code).or_insert(0) += 1;
        }

        for (code, count) in &hits {
            let freq = *count as f64 / draws as f64;
            assert!(
                (freq - 1.0 / 3.0).abs() < 0.03,
                "variant {} drew {} of traffic",
                code,
                freq
            );
        }
    }

    #[test]
    fn test_epsilon_zero_exploits_best_rate() {
        let mut rng = StdRng::seed_from_u64(5);
        let snap = snapshot(&[("A", 50, 10), ("B", 50, 30)]);
        for _ in 0..100 {
            let code = select_variant(Strategy::EpsilonGreedy, &snap, 0.0, &mut rng).unwrap();
            assert_eq!(code, "B");
        }
    }

    #[test]
    fn test_epsilon_greedy_all_zero_rates_still_selects() {
        let mut rng = StdRng::seed_from_u64(9);
        // raw counters with zero conversions put every rate at exactly 0.0,
        // the boundary where the scan starts
        let snap = snapshot(&[("A", 10, 0), ("B", 10, 0), ("C", 10, 0)]);
        for _ in 0..200 {
            let code = select_variant(Strategy::EpsilonGreedy, &snap, 0.0, &mut rng).unwrap();
            assert!(snap.contains_key(&code), "selected unknown code {}", code);
        }
    }

    #[test]
    fn test_epsilon_greedy_tie_break_reaches_both() {
        let mut rng = StdRng::seed_from_u64(3);
        let snap = snapshot(&[("A", 100, 50), ("B", 100, 50)]);
        let mut hits: BTreeMap<String, u32> = BTreeMap::new();
        for _ in 0..2_000 {
            let code = select_variant(Strategy::EpsilonGreedy, &snap, 0.0, &mut rng).unwrap();
            *hits.entry(code).or_insert(0) += 1;
        }
        assert!(hits["A"] > 0 && hits["B"] > 0, "tie-break never alternated: {:?}", hits);
    }

    #[test]
    fn test_thompson_prefers_stronger_posterior() {
        let mut rng = StdRng::seed_from_u64(21);
        let snap = snapshot(&[("A", 1_000, 900), ("B", 1_000, 100)]);
        let mut a_wins = 0u32;
        for _ in 0..1_000 {
            if select_variant(Strategy::Thompson, &snap, 0.1, &mut rng).unwrap() == "A" {
                a_wins += 1;
            }
        }
        assert!(a_wins > 950, "A won only {} of 1000", a_wins);
    }

    #[test]
    fn test_thompson_frequency_tracks_closed_form() {
        let mut rng = StdRng::seed_from_u64(1000);
        // A at 5/10, B at 20/35: posteriors Beta(5,5) and Beta(20,15)
        let snap = snapshot(&[("A", 10, 5), ("B", 35, 20)]);

        let draws = 20_000u32;
        let mut b_wins = 0u32;
        for _ in 0..draws {
            if select_variant(Strategy::Thompson, &snap, 0.1, &mut rng).unwrap() == "B" {
                b_wins += 1;
            }
        }
        let freq = b_wins as f64 / draws as f64;
        let closed = probability_greater(20, 15, 5, 5).unwrap();
        assert!(
            (freq - closed).abs() < 0.03,
            "thompson freq {} vs closed-form {}",
            freq,
            closed
        );
    }

    #[test]
    fn test_ucb1_defined_at_minimum_traffic() {
        let mut rng = StdRng::seed_from_u64(2);
        // freshly seeded pair: total impressions = 2, the smallest a stored
        // two-variant campaign can have
        let snap = snapshot(&[("A", 1, 1), ("B", 1, 1)]);
        for _ in 0..50 {
            let code = select_variant(Strategy::Ucb1, &snap, 0.1, &mut rng).unwrap();
            assert!(snap.contains_key(&code));
        }
    }

    #[test]
    fn test_ucb1_prefers_underexplored_on_equal_rates() {
        let mut rng = StdRng::seed_from_u64(4);
        let snap = snapshot(&[("A", 1_000, 500), ("B", 10, 5)]);
        for _ in 0..100 {
            let code = select_variant(Strategy::Ucb1, &snap, 0.1, &mut rng).unwrap();
            assert_eq!(code, "B");
        }
    }

    #[test]
    fn test_uniform_reaches_every_variant() {
        let mut rng = StdRng::seed_from_u64(6);
        let snap = snapshot(&[("A", 1, 1), ("B", 1, 1), ("C", 1, 1)]);
        let mut hits: BTreeMap<String, u32> = BTreeMap::new();
        for _ in 0..1_000 {
            let code = select_variant(Strategy::Uniform, &snap, 0.1, &mut rng).unwrap();
            *hits.entry(code).or_insert(0) += 1;
        }
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_resolve_aliases_and_fallback() {
        assert_eq!(Strategy::resolve("thompson"), Strategy::Thompson);
        assert_eq!(Strategy::resolve("Thompson_Sampling"), Strategy::Thompson);
        assert_eq!(Strategy::resolve("egreedy"), Strategy::EpsilonGreedy);
        assert_eq!(Strategy::resolve("e_greedy"), Strategy::EpsilonGreedy);
        assert_eq!(Strategy::resolve("epsilon_greedy"), Strategy::EpsilonGreedy);
        assert_eq!(Strategy::resolve("UCB1"), Strategy::Ucb1);
        assert_eq!(Strategy::resolve("ucb"), Strategy::Ucb1);
        assert_eq!(Strategy::resolve("uniform"), Strategy::Uniform);
        assert_eq!(Strategy::resolve("random"), Strategy::Uniform);

        // unknown identifiers fail closed to the default
        assert_eq!(Strategy::resolve("bandit-9000"), Strategy::Thompson);
        assert_eq!(Strategy::default(), Strategy::Thompson);
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&Strategy::EpsilonGreedy).unwrap();
        assert_eq!(json, "\"epsilon_greedy\"");
        let parsed: Strategy = serde_json::from_str("\"ucb1\"").unwrap();
        assert_eq!(parsed, Strategy::Ucb1);
    }
}
