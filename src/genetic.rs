use std::time::Instant;

use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use tracing::debug;

use crate::config::PackingConfig;
use crate::placer::{Nest, PieceInstance, Placer};
use crate::types::{SearchStats, StopReason};

/// Subtracted from the utilization once per unplaced instance. Larger than
/// any utilization, so every complete layout outranks every partial one.
pub const UNPLACED_PENALTY: f64 = 2.0;

const PERFECT_FIT: f64 = 1.0 - 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Chromosome {
    /// Instance indices in placement order.
    pub order: Vec<usize>,
    /// Preferred rotation index, by instance index (not by position).
    pub rotations: Vec<usize>,
    pub fitness: f64,
}

impl Chromosome {
    fn unevaluated(order: Vec<usize>, rotations: Vec<usize>) -> Self {
        Self {
            order,
            rotations,
            fitness: f64::NEG_INFINITY,
        }
    }

    /// Ordered crossover on the permutation; each rotation comes from
    /// either parent with equal odds.
    pub fn order_crossover<R: Rng + ?Sized>(&self, other: &Self, rng: &mut R) -> Self {
        let n = self.order.len();
        let rotations = self
            .rotations
            .iter()
            .zip(&other.rotations)
            .map(|(&a, &b)| if rng.random_bool(0.5) { a } else { b })
            .collect();
        if n < 2 {
            return Self::unevaluated(self.order.clone(), rotations);
        }

        let (mut lo, mut hi) = (rng.random_range(0..n), rng.random_range(0..n));
        if lo > hi {
            std::mem::swap(&mut lo, &mut hi);
        }

        let mut order = vec![usize::MAX; n];
        let mut used = vec![false; n];
        for i in lo..=hi {
            order[i] = self.order[i];
            used[self.order[i]] = true;
        }

        let mut donor = other
            .order
            .iter()
            .cycle()
            .skip((hi + 1) % n)
            .take(n)
            .filter(|&&g| !used[g]);
        for step in 1..n {
            let slot = (hi + step) % n;
            if order[slot] == usize::MAX
                && let Some(&gene) = donor.next()
            {
                order[slot] = gene;
            }
        }

        Self::unevaluated(order, rotations)
    }

    pub fn swap_mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let n = self.order.len();
        if n < 2 {
            return;
        }
        let i = rng.random_range(0..n);
        let j = rng.random_range(0..n);
        self.order.swap(i, j);
    }

    /// Switches one instance to a different allowed rotation.
    pub fn rotation_mutate<R: Rng + ?Sized>(&mut self, rotation_counts: &[usize], rng: &mut R) {
        if self.rotations.is_empty() {
            return;
        }
        let gene = rng.random_range(0..self.rotations.len());
        let count = rotation_counts[gene];
        if count < 2 {
            return;
        }
        let offset = rng.random_range(1..count);
        self.rotations[gene] = (self.rotations[gene] + offset) % count;
    }
}

pub struct SearchOutcome {
    pub best: Chromosome,
    pub nest: Nest,
    pub stats: SearchStats,
}

pub struct GeneticSearch<'p, 'a> {
    placer: &'p Placer<'a>,
    config: &'p PackingConfig,
    instances: Vec<PieceInstance>,
    // allowed rotation count per instance
    rotation_counts: Vec<usize>,
}

impl<'p, 'a> GeneticSearch<'p, 'a> {
    pub fn new(placer: &'p Placer<'a>, config: &'p PackingConfig) -> Self {
        let instances = placer.instances();
        let rotation_counts = instances
            .iter()
            .map(|i| placer.rotation_count(i.piece))
            .collect();
        Self {
            placer,
            config,
            instances,
            rotation_counts,
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Largest pieces first, each in its first allowed rotation.
    pub fn seed_chromosome(&self) -> Chromosome {
        let pieces = self.placer.pieces();
        let mut order: Vec<usize> = (0..self.instances.len()).collect();
        order.sort_by(|&a, &b| {
            let area = |i: usize| pieces[self.instances[i].piece].area();
            area(b).total_cmp(&area(a))
        });
        Chromosome::unevaluated(order, vec![0; self.instances.len()])
    }

    pub fn random_chromosome<R: Rng + ?Sized>(&self, rng: &mut R) -> Chromosome {
        let mut order: Vec<usize> = (0..self.instances.len()).collect();
        order.shuffle(rng);
        let rotations = self
            .rotation_counts
            .iter()
            .map(|&count| rng.random_range(0..count))
            .collect();
        Chromosome::unevaluated(order, rotations)
    }

    /// Places the chromosome and returns the resulting nest.
    pub fn decode(&self, chromosome: &Chromosome) -> Nest {
        let order: Vec<PieceInstance> = chromosome.order.iter().map(|&g| self.instances[g]).collect();
        let rotations: Vec<usize> = chromosome.order.iter().map(|&g| chromosome.rotations[g]).collect();
        self.placer.place(&order, &rotations)
    }

    pub fn fitness(&self, nest: &Nest) -> f64 {
        nest.utilization(self.placer.sheet()) - UNPLACED_PENALTY * nest.unplaced.len() as f64
    }

    fn evaluate(&self, population: &mut [Chromosome]) {
        population.par_iter_mut().for_each(|c| {
            c.fitness = self.fitness(&self.decode(c));
        });
    }

    fn tournament<'c, R: Rng + ?Sized>(&self, population: &'c [Chromosome], rng: &mut R) -> &'c Chromosome {
        let mut winner = rng.random_range(0..population.len());
        for _ in 1..self.config.tournament_size {
            let challenger = rng.random_range(0..population.len());
            if population[challenger].fitness > population[winner].fitness {
                winner = challenger;
            }
        }
        &population[winner]
    }

    fn stop_reason(&self, generation: usize, stagnation: usize, best: f64, start: Instant) -> Option<StopReason> {
        if best >= PERFECT_FIT {
            Some(StopReason::PerfectFit)
        } else if generation >= self.config.max_generations {
            Some(StopReason::GenerationLimit)
        } else if self.config.stagnation_limit > 0 && stagnation >= self.config.stagnation_limit {
            Some(StopReason::Plateau)
        } else if start.elapsed() >= self.config.time_limit() {
            Some(StopReason::TimeLimit)
        } else {
            None
        }
    }

    /// Evolves the population until a stop condition holds and returns the
    /// best chromosome seen. Stop conditions are checked between
    /// generations only.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> SearchOutcome {
        let start = Instant::now();
        let size = self.config.population_size;

        let mut population = Vec::with_capacity(size);
        population.push(self.seed_chromosome());
        while population.len() < size {
            population.push(self.random_chromosome(rng));
        }
        self.evaluate(&mut population);
        population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let mut evaluations = population.len();
        let mut best = population[0].clone();
        let mut best_generation = 0;
        let mut history = vec![best.fitness];
        let mut stagnation = 0;
        let mut generation = 0;

        let stop_reason = loop {
            if let Some(reason) = self.stop_reason(generation, stagnation, best.fitness, start) {
                break reason;
            }
            generation += 1;

            let elites = self.config.elite_count.min(population.len());
            let mut next: Vec<Chromosome> = population[..elites].to_vec();
            let mut children = Vec::with_capacity(size - elites);
            while children.len() < size - elites {
                let first = self.tournament(&population, rng);
                let second = self.tournament(&population, rng);
                let mut child = if rng.random_bool(self.config.crossover_rate) {
                    first.order_crossover(second, rng)
                } else {
                    Chromosome::unevaluated(first.order.clone(), first.rotations.clone())
                };
                if rng.random_bool(self.config.mutation_rate) {
                    child.swap_mutate(rng);
                }
                if rng.random_bool(self.config.mutation_rate) {
                    child.rotation_mutate(&self.rotation_counts, rng);
                }
                children.push(child);
            }

            self.evaluate(&mut children);
            evaluations += children.len();
            next.extend(children);
            next.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
            population = next;

            if population[0].fitness > best.fitness {
                best = population[0].clone();
                best_generation = generation;
                stagnation = 0;
            } else {
                stagnation += 1;
            }
            history.push(best.fitness);

            debug!(
                generation,
                best = best.fitness,
                worst = population[population.len() - 1].fitness,
                stagnation,
                "generation evaluated"
            );
        };

        let nest = self.decode(&best);
        SearchOutcome {
            best,
            nest,
            stats: SearchStats {
                generations: generation,
                evaluations,
                best_generation,
                elapsed: start.elapsed(),
                stop_reason,
                history,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{FabricSheet, PatternPiece};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::time::Duration;

    fn is_permutation(order: &[usize]) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted.iter().enumerate().all(|(i, &g)| i == g)
    }

    fn mixed_pieces() -> Vec<PatternPiece> {
        vec![
            PatternPiece::rectangle("front", 30.0, 40.0).unwrap().with_quantity(2).unwrap(),
            PatternPiece::rectangle("sleeve", 15.0, 35.0).unwrap().with_quantity(2).unwrap(),
            PatternPiece::rectangle("cuff", 10.0, 10.0).unwrap().with_quantity(3).unwrap(),
        ]
    }

    #[test]
    fn test_order_crossover_yields_permutation() {
        let mut rng = SmallRng::seed_from_u64(11);
        let a = Chromosome::unevaluated((0..9).collect(), vec![0; 9]);
        let b = Chromosome::unevaluated((0..9).rev().collect(), vec![1; 9]);
        for _ in 0..100 {
            let child = a.order_crossover(&b, &mut rng);
            assert!(is_permutation(&child.order), "{:?}", child.order);
            assert!(child.rotations.iter().all(|&r| r <= 1));
            assert_eq!(child.fitness, f64::NEG_INFINITY);
        }
    }

    #[test]
    fn test_mutations_keep_chromosome_valid() {
        let mut rng = SmallRng::seed_from_u64(5);
        let counts = [4, 1, 2, 4];
        let mut c = Chromosome::unevaluated(vec![3, 1, 0, 2], vec![0, 0, 1, 3]);
        for _ in 0..100 {
            c.swap_mutate(&mut rng);
            c.rotation_mutate(&counts, &mut rng);
            assert!(is_permutation(&c.order));
            assert!(c.rotations.iter().zip(&counts).all(|(&r, &n)| r < n));
        }
        // a piece with one rotation never changes
        assert_eq!(c.rotations[1], 0);
    }

    #[test]
    fn test_seed_chromosome_is_area_descending() {
        let sheet = FabricSheet::new(100.0, 100.0).unwrap();
        let pieces = vec![
            PatternPiece::rectangle("small", 10.0, 10.0).unwrap(),
            PatternPiece::rectangle("large", 30.0, 30.0).unwrap().with_quantity(2).unwrap(),
        ];
        let placer = Placer::new(sheet, &pieces);
        let config = PackingConfig::default();
        let search = GeneticSearch::new(&placer, &config);
        assert_eq!(search.instance_count(), 3);
        assert_eq!(search.seed_chromosome().order, vec![1, 2, 0]);
    }

    #[test]
    fn test_exact_tiling_stops_on_perfect_fit() {
        let sheet = FabricSheet::new(100.0, 100.0).unwrap();
        let pieces = vec![PatternPiece::rectangle("q", 50.0, 50.0).unwrap().with_quantity(4).unwrap()];
        let placer = Placer::new(sheet, &pieces);
        let config = PackingConfig::default().with_population_size(8);
        let outcome = GeneticSearch::new(&placer, &config).run(&mut SmallRng::seed_from_u64(1));
        assert_eq!(outcome.stats.stop_reason, StopReason::PerfectFit);
        assert_eq!(outcome.stats.generations, 0);
        assert!(outcome.nest.is_complete());
        assert_eq!(outcome.nest.utilization(&sheet), 1.0);
    }

    #[test]
    fn test_infeasible_piece_still_returns_best() {
        let sheet = FabricSheet::new(50.0, 50.0).unwrap();
        let pieces = vec![
            PatternPiece::rectangle("huge", 80.0, 80.0).unwrap(),
            PatternPiece::rectangle("small", 10.0, 10.0).unwrap(),
        ];
        let placer = Placer::new(sheet, &pieces);
        let config = PackingConfig::default()
            .with_population_size(6)
            .with_max_generations(5);
        let outcome = GeneticSearch::new(&placer, &config).run(&mut SmallRng::seed_from_u64(3));
        assert_eq!(outcome.nest.unplaced.len(), 1);
        assert_eq!(outcome.nest.placed.len(), 1);
        assert!(outcome.best.fitness < 0.0);
        assert_eq!(outcome.stats.stop_reason, StopReason::GenerationLimit);
        assert_eq!(outcome.stats.generations, 5);
        assert_eq!(outcome.stats.history.len(), 6);
    }

    #[test]
    fn test_plateau_stops_search() {
        // one small piece: every layout has the same utilization
        let sheet = FabricSheet::new(100.0, 100.0).unwrap();
        let pieces = vec![PatternPiece::rectangle("patch", 10.0, 10.0).unwrap()];
        let placer = Placer::new(sheet, &pieces);
        let config = PackingConfig::default()
            .with_population_size(6)
            .with_stagnation_limit(2);
        let outcome = GeneticSearch::new(&placer, &config).run(&mut SmallRng::seed_from_u64(4));
        assert_eq!(outcome.stats.stop_reason, StopReason::Plateau);
        assert_eq!(outcome.stats.generations, 2);
        assert_eq!(outcome.stats.best_generation, 0);
        assert!(outcome.nest.is_complete());
    }

    #[test]
    fn test_zero_time_limit_keeps_initial_population() {
        let sheet = FabricSheet::new(80.0, 60.0).unwrap();
        let pieces = mixed_pieces();
        let placer = Placer::new(sheet, &pieces);
        let config = PackingConfig::default()
            .with_population_size(6)
            .with_time_limit(Duration::ZERO);
        let outcome = GeneticSearch::new(&placer, &config).run(&mut SmallRng::seed_from_u64(8));
        assert_eq!(outcome.stats.stop_reason, StopReason::TimeLimit);
        assert_eq!(outcome.stats.generations, 0);
        assert_eq!(outcome.stats.evaluations, 6);
        assert_eq!(outcome.stats.history.len(), 1);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let sheet = FabricSheet::new(80.0, 60.0).unwrap();
        let pieces = mixed_pieces();
        let placer = Placer::new(sheet, &pieces);
        let config = PackingConfig::default()
            .with_population_size(10)
            .with_max_generations(8);
        let search = GeneticSearch::new(&placer, &config);
        let a = search.run(&mut SmallRng::seed_from_u64(42));
        let b = search.run(&mut SmallRng::seed_from_u64(42));
        assert_eq!(a.best, b.best);
        assert_eq!(a.stats.history, b.stats.history);
        assert_eq!(a.stats.evaluations, b.stats.evaluations);
    }

    #[test]
    fn test_larger_budget_never_worse() {
        let sheet = FabricSheet::new(80.0, 60.0).unwrap();
        let pieces = mixed_pieces();
        let placer = Placer::new(sheet, &pieces);
        let short = PackingConfig::default()
            .with_population_size(10)
            .with_max_generations(4)
            .with_stagnation_limit(0);
        let long = short.clone().with_max_generations(12);

        let a = GeneticSearch::new(&placer, &short).run(&mut SmallRng::seed_from_u64(9));
        let b = GeneticSearch::new(&placer, &long).run(&mut SmallRng::seed_from_u64(9));
        assert!(b.best.fitness >= a.best.fitness);
        assert_eq!(&b.stats.history[..a.stats.history.len()], &a.stats.history[..]);
        for w in b.stats.history.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }
}
