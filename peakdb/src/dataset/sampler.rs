//! Window-start sampling policies.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::coord::Pair;

/// How window start positions are laid out over the selected chromosomes.
/// Exactly one policy is chosen at dataset construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Positions {
    /// Evenly spaced starts, `stride` apart, on every chromosome. Fully
    /// deterministic and exhaustive.
    Strided { stride: u64 },
    /// `count` starts drawn randomly: first a chromosome, with probability
    /// proportional to its size, then a start uniform over the chromosome.
    /// Coverage is uniform per base pair in expectation, not uniform per
    /// chromosome; counts are only reproducible under an externally seeded
    /// generator.
    Random { count: usize },
}

impl Positions {
    /// Compute the window starts for every candidate pair. Chromosomes that
    /// cannot hold a single window (`size <= window`) are silently dropped,
    /// as are chromosomes the random policy assigns zero draws.
    pub(crate) fn sample(&self, candidates: Vec<Pair>, window: u64) -> (Vec<Pair>, Vec<Vec<u64>>) {
        let candidates: Vec<Pair> = candidates
            .into_iter()
            .filter(|pair| pair.chrom.size > window)
            .collect();

        match *self {
            Positions::Strided { stride } => {
                let positions = candidates
                    .iter()
                    .map(|pair| {
                        (0..=pair.chrom.size - window)
                            .step_by(stride as usize)
                            .collect()
                    })
                    .collect();
                (candidates, positions)
            }
            Positions::Random { count } => {
                if candidates.is_empty() {
                    return (Vec::new(), Vec::new());
                }

                let mut rng = rand::thread_rng();
                let weights: Vec<u64> = candidates.iter().map(|pair| pair.chrom.size).collect();
                let chromosome = WeightedIndex::new(&weights)
                    .expect("chromosome sizes are positive");

                let mut counts = vec![0usize; candidates.len()];
                for _ in 0..count {
                    counts[chromosome.sample(&mut rng)] += 1;
                }

                let mut pairs = Vec::new();
                let mut positions = Vec::new();
                for (pair, draws) in candidates.into_iter().zip(counts) {
                    if draws == 0 {
                        continue;
                    }
                    let upper = pair.chrom.size - window;
                    let starts = (0..draws).map(|_| rng.gen_range(0, upper)).collect();
                    pairs.push(pair);
                    positions.push(starts);
                }
                (pairs, positions)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chrom::Chrom;

    fn pairs(sizes: &[u64]) -> Vec<Pair> {
        let mut offset = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let pair = Pair {
                    assembly: "assembly1".to_string(),
                    chromosome_id: i as i64 + 1,
                    chrom: Chrom {
                        name: format!("chr{}", i + 1),
                        size,
                        offset,
                    },
                };
                offset += size;
                pair
            })
            .collect()
    }

    #[test]
    fn test_strided_starts() {
        let policy = Positions::Strided { stride: 10 };
        let (kept, positions) = policy.sample(pairs(&[40, 40]), 10);
        assert_eq!(kept.len(), 2);
        assert_eq!(positions[0], vec![0, 10, 20, 30]);
        assert_eq!(positions[1], vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_strided_is_deterministic() {
        let policy = Positions::Strided { stride: 7 };
        let first = policy.sample(pairs(&[100, 250, 33]), 20);
        let second = policy.sample(pairs(&[100, 250, 33]), 20);
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn test_short_chromosomes_are_dropped() {
        // size == window is still too short to hold one window
        for policy in [
            Positions::Strided { stride: 5 },
            Positions::Random { count: 10 },
        ] {
            let (kept, positions) = policy.sample(pairs(&[10, 50, 9]), 10);
            assert_eq!(kept.len(), 1);
            assert_eq!(kept[0].chrom.name, "chr2");
            assert_eq!(positions.len(), 1);
        }
    }

    #[test]
    fn test_random_counts_are_proportional_to_size() {
        let policy = Positions::Random { count: 100_000 };
        let (kept, positions) = policy.sample(pairs(&[300, 300, 300, 300]), 10);
        assert_eq!(kept.len(), 4);
        for starts in &positions {
            let fraction = starts.len() as f64 / 100_000.0;
            assert!((0.24..=0.26).contains(&fraction), "fraction {}", fraction);
        }
    }

    #[test]
    fn test_random_starts_leave_room_for_the_window() {
        let policy = Positions::Random { count: 5_000 };
        let (_, positions) = policy.sample(pairs(&[50]), 10);
        assert!(positions[0].iter().all(|&start| start < 40));
    }

    #[test]
    fn test_random_drops_pairs_with_zero_draws() {
        let policy = Positions::Random { count: 1 };
        let (kept, positions) = policy.sample(pairs(&[100, 100, 100]), 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(positions.iter().map(Vec::len).sum::<usize>(), 1);
    }
}
