use super::mdp::Mdp;
use crate::environments::StepOutcome;
use crate::error::{check_action, check_state, Result};
use gymnasium::*;
use std::collections::{BTreeMap, HashMap};

/// Rewards the model stores in place of the raw environment signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardShaping {
    pub goal_reward: Continous,
    pub hole_penalty: Continous,
    pub move_reward: Continous,
}

impl Default for RewardShaping {
    fn default() -> Self {
        Self {
            goal_reward: 1.,
            hole_penalty: -1.,
            move_reward: 0.,
        }
    }
}

/// How a single environment step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Move,
    Goal,
    /// Terminated without the goal reward: the agent fell into a hole.
    Hole,
}

impl StepKind {
    pub fn classify(step: &StepOutcome) -> Self {
        if !step.terminated {
            StepKind::Move
        } else if step.reward > 0. {
            StepKind::Goal
        } else {
            StepKind::Hole
        }
    }
}

/// Transition counts and rewards estimated from sampled interaction.
#[derive(Debug, Clone)]
pub struct EmpiricalModel {
    n_s: usize,
    n_a: usize,
    counts: HashMap<(Discrete, Discrete), BTreeMap<Discrete, u32>>,
    rewards: HashMap<(Discrete, Discrete, Discrete), Continous>,
    terminal_rewards: BTreeMap<Discrete, Continous>,
}

impl EmpiricalModel {
    pub fn new(n_s: usize, n_a: usize) -> Self {
        Self {
            n_s,
            n_a,
            counts: HashMap::new(),
            rewards: HashMap::new(),
            terminal_rewards: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, s: Discrete, a: Discrete, s1: Discrete, r: Continous) -> Result<()> {
        check_state(s, self.n_s)?;
        check_action(a, self.n_a)?;
        check_state(s1, self.n_s)?;

        *self.counts.entry((s, a)).or_default().entry(s1).or_insert(0) += 1;
        self.rewards.insert((s, a, s1), r);

        Ok(())
    }

    /// Makes `s` absorbing with the given reward, replacing any earlier one.
    pub fn mark_terminal(&mut self, s: Discrete, reward: Continous) -> Result<()> {
        check_state(s, self.n_s)?;

        if let Some(prev) = self.terminal_rewards.insert(s, reward) {
            if prev != reward {
                tracing::debug!(s, prev, reward, "terminal reward overwritten");
            }
        }

        Ok(())
    }

    /// Records one environment step from `s` under `a`.
    pub fn observe(
        &mut self,
        s: Discrete,
        a: Discrete,
        step: &StepOutcome,
        shaping: &RewardShaping,
    ) -> Result<StepKind> {
        let kind = StepKind::classify(step);
        match kind {
            StepKind::Move => self.record(s, a, step.next_state, step.reward + shaping.move_reward)?,
            StepKind::Goal => {
                self.record(s, a, step.next_state, shaping.move_reward)?;
                self.mark_terminal(step.next_state, shaping.goal_reward)?;
            }
            StepKind::Hole => {
                self.record(s, a, step.next_state, shaping.move_reward)?;
                self.mark_terminal(step.next_state, shaping.hole_penalty)?;
            }
        }

        Ok(kind)
    }

    pub fn counts(&self, s: Discrete, a: Discrete) -> Option<&BTreeMap<Discrete, u32>> {
        self.counts.get(&(s, a))
    }

    pub fn total_count(&self, s: Discrete, a: Discrete) -> u32 {
        self.counts(s, a).map_or(0, |c| c.values().sum())
    }

    /// Empirical `p(s' | s, a)`, or `None` for a pair that was never sampled.
    pub fn probabilities(&self, s: Discrete, a: Discrete) -> Option<Vec<(Discrete, Continous)>> {
        let counts = self.counts(s, a)?;
        let total = counts.values().sum::<u32>() as Continous;

        Some(
            counts
                .iter()
                .map(|(&s1, &c)| (s1, c as Continous / total))
                .collect(),
        )
    }

    pub fn reward(&self, s: Discrete, a: Discrete, s1: Discrete) -> Option<Continous> {
        self.rewards.get(&(s, a, s1)).copied()
    }

    pub fn terminal_reward(&self, s: Discrete) -> Option<Continous> {
        self.terminal_rewards.get(&s).copied()
    }

    pub fn is_observed(&self, s: Discrete, a: Discrete) -> bool {
        self.counts.contains_key(&(s, a))
    }

    /// Number of (state, action) pairs with at least one sample.
    pub fn coverage(&self) -> usize {
        self.counts.len()
    }

    /// Largest gap between the empirical and the true `p(s' | s, a)` over observed pairs.
    pub fn max_probability_error(&self, truth: &Transitions) -> Continous {
        let mut max_err: Continous = 0.;
        for (&(s, a), counts) in &self.counts {
            let mut expected = BTreeMap::<Discrete, Continous>::new();
            for t in truth.get(&(s, a)).into_iter().flatten() {
                *expected.entry(t.next_state).or_default() += t.probability;
            }

            let total = counts.values().sum::<u32>() as Continous;
            let observed = counts.iter().map(|(&s1, &c)| (s1, c as Continous / total));
            for (s1, p) in observed {
                let q = expected.remove(&s1).unwrap_or_default();
                max_err = max_err.max((p - q).abs());
            }
            for q in expected.into_values() {
                max_err = max_err.max(q);
            }
        }

        max_err
    }
}

impl Mdp for EmpiricalModel {
    fn n_s(&self) -> usize {
        self.n_s
    }

    fn n_a(&self) -> usize {
        self.n_a
    }

    fn transitions(&self, s: Discrete, a: Discrete) -> Option<Vec<Transition>> {
        let ps = self.probabilities(s, a)?;

        Some(
            ps.into_iter()
                .map(|(next_state, probability)| Transition {
                    next_state,
                    probability,
                    reward: self.reward(s, a, next_state).unwrap_or_default(),
                    done: self.terminal_rewards.contains_key(&next_state),
                })
                .collect(),
        )
    }

    fn terminal_value(&self, s: Discrete) -> Option<Continous> {
        self.terminal_reward(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertor::*;
    use float_eq::*;

    fn step(next_state: Discrete, reward: Continous, terminated: bool) -> StepOutcome {
        StepOutcome {
            next_state,
            reward,
            terminated,
            truncated: false,
        }
    }

    #[test]
    fn unobserved_pair_has_no_probabilities() {
        let m = EmpiricalModel::new(16, 4);

        assert_that!(m.probabilities(0, 0)).is_none();
        assert_that!(m.transitions(0, 0)).is_none();
        assert_eq!(m.total_count(0, 0), 0);
        assert!(!m.is_observed(0, 0));
    }

    #[test]
    fn record_counts_visits() {
        let mut m = EmpiricalModel::new(16, 4);
        m.record(0, 2, 1, 0.).unwrap();
        m.record(0, 2, 1, 0.).unwrap();
        m.record(0, 2, 4, 0.5).unwrap();

        assert_eq!(m.counts(0, 2).unwrap(), &BTreeMap::from([(1, 2), (4, 1)]));
        assert_eq!(m.total_count(0, 2), 3);
        assert_that!(m.reward(0, 2, 4)).is_equal_to(Some(0.5));
        assert_eq!(m.coverage(), 1);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let mut m = EmpiricalModel::new(16, 4);
        for (s1, n) in [(0, 3), (1, 5), (4, 7)] {
            for _ in 0..n {
                m.record(0, 1, s1, 0.).unwrap();
            }
        }

        let ps = m.probabilities(0, 1).unwrap();
        assert_float_eq!(ps.iter().map(|p| p.1).sum::<f64>(), 1., abs <= 1e-12);
        assert_float_eq!(ps[1].1, 5. / 15., abs <= 1e-12);
    }

    #[test]
    fn hole_overwrites_the_state_reward() {
        let mut m = EmpiricalModel::new(16, 4);
        let shaping = RewardShaping::default();
        m.mark_terminal(5, 3.).unwrap();

        let kind = m.observe(1, 1, &step(5, 0., true), &shaping).unwrap();

        assert_eq!(kind, StepKind::Hole);
        assert_that!(m.terminal_reward(5)).is_equal_to(Some(-1.));
        assert_that!(m.reward(1, 1, 5)).is_equal_to(Some(0.));
    }

    #[test]
    fn goal_is_marked_terminal() {
        let mut m = EmpiricalModel::new(16, 4);
        let shaping = RewardShaping {
            goal_reward: 10.,
            hole_penalty: -5.,
            move_reward: -0.1,
        };

        assert_eq!(
            m.observe(14, 2, &step(15, 1., true), &shaping).unwrap(),
            StepKind::Goal
        );
        assert_eq!(
            m.observe(13, 2, &step(14, 0., false), &shaping).unwrap(),
            StepKind::Move
        );
        assert_that!(m.terminal_reward(15)).is_equal_to(Some(10.));
        assert_that!(m.terminal_reward(14)).is_none();
        assert_that!(m.reward(13, 2, 14)).is_equal_to(Some(-0.1));
        assert!(m.transitions(14, 2).unwrap()[0].done);
    }

    #[test]
    fn out_of_range_observation_is_rejected() {
        let mut m = EmpiricalModel::new(16, 4);

        assert!(m.record(0, 0, 16, 0.).is_err());
        assert!(m.record(0, 4, 1, 0.).is_err());
        assert!(m
            .observe(0, 0, &step(-3, 0., false), &RewardShaping::default())
            .is_err());
        assert_eq!(m.coverage(), 0);
    }

    #[test]
    fn probability_error_against_truth() {
        let mut m = EmpiricalModel::new(2, 1);
        m.record(0, 0, 0, 0.).unwrap();
        m.record(0, 0, 1, 0.).unwrap();
        m.record(0, 0, 1, 0.).unwrap();
        m.record(0, 0, 1, 0.).unwrap();
        let truth = Transitions::from([(
            (0, 0),
            vec![
                Transition {
                    next_state: 0,
                    probability: 0.5,
                    reward: 0.,
                    done: false,
                },
                Transition {
                    next_state: 1,
                    probability: 0.5,
                    reward: 0.,
                    done: false,
                },
            ],
        )]);

        assert_float_eq!(m.max_probability_error(&truth), 0.25, abs <= 1e-12);
    }
}
