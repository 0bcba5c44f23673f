use super::{grid::GridTopology, DiscreteEnv, StepOutcome};
use crate::error::{AgentError, Result};
use crate::mdps::action::Action;
use gymnasium::*;
use rand::prelude::*;

pub const MAP_4X4: [&str; 4] = ["SFFF", "FHFH", "FFFH", "HFFG"];

/// In-process FrozenLake with the observable behaviour of Gymnasium's `FrozenLake-v1`.
///
/// Refer: https://gymnasium.farama.org/environments/toy_text/frozen_lake/
#[derive(Debug, Clone)]
pub struct FrozenLake {
    cells: Vec<u8>,
    topology: GridTopology,
    start: Discrete,
    is_slippery: bool,
    max_episode_steps: Option<usize>,
    rng: StdRng,
    s: Discrete,
    elapsed: usize,
}

impl FrozenLake {
    pub fn new<S: AsRef<str>>(
        desc: &[S],
        is_slippery: bool,
        max_episode_steps: Option<usize>,
    ) -> Result<Self> {
        let n_rows = desc.len();
        let n_cols = desc.first().map_or(0, |r| r.as_ref().len());
        if n_rows == 0 || n_cols == 0 {
            return Err(AgentError::InvalidConfig("map is empty".into()));
        }
        if desc.iter().any(|r| r.as_ref().len() != n_cols) {
            return Err(AgentError::InvalidConfig("map rows differ in length".into()));
        }

        let cells = desc
            .iter()
            .flat_map(|r| r.as_ref().bytes())
            .collect::<Vec<_>>();
        if let Some(c) = cells.iter().find(|c| !b"SFHG".contains(c)) {
            return Err(AgentError::InvalidConfig(format!(
                "unknown map cell '{}'",
                *c as char
            )));
        }
        let start = match cells.iter().filter(|&&c| c == b'S').count() {
            1 => cells.iter().position(|&c| c == b'S').unwrap_or_default() as Discrete,
            n => {
                return Err(AgentError::InvalidConfig(format!(
                    "map needs exactly one start cell, found {n}"
                )))
            }
        };

        Ok(Self {
            cells,
            topology: GridTopology::new(n_rows, n_cols),
            start,
            is_slippery,
            max_episode_steps,
            rng: StdRng::from_entropy(),
            s: start,
            elapsed: 0,
        })
    }

    /// The default 4x4 lake.
    pub fn standard(is_slippery: bool) -> Self {
        Self {
            cells: MAP_4X4.concat().into_bytes(),
            topology: GridTopology::default(),
            start: 0,
            is_slippery,
            max_episode_steps: Some(100),
            rng: StdRng::from_entropy(),
            s: 0,
            elapsed: 0,
        }
    }

    pub fn topology(&self) -> GridTopology {
        self.topology
    }

    pub fn cell(&self, s: Discrete) -> char {
        self.cells[s as usize] as char
    }

    pub fn is_terminal(&self, s: Discrete) -> bool {
        matches!(self.cells[s as usize], b'H' | b'G')
    }

    /// Moves actually attempted for an intended action, all equally likely.
    fn outcomes(&self, a: Action) -> Vec<Action> {
        if self.is_slippery {
            let [p, q] = a.perpendicular();
            vec![p, a, q]
        } else {
            vec![a]
        }
    }

    fn landing(&self, s: Discrete, a: Action) -> (Discrete, Continous, bool) {
        let s1 = self.topology.destination(s, a);
        let reward = if self.cells[s1 as usize] == b'G' { 1. } else { 0. };

        (s1, reward, self.is_terminal(s1))
    }
}

impl DiscreteEnv for FrozenLake {
    fn n_s(&self) -> usize {
        self.cells.len()
    }

    fn n_a(&self) -> usize {
        Action::ALL.len()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Discrete> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.s = self.start;
        self.elapsed = 0;

        Ok(self.s)
    }

    fn step(&mut self, action: Action) -> Result<StepOutcome> {
        let moves = self.outcomes(action);
        let a = *moves.choose(&mut self.rng).unwrap_or(&action);
        let (s1, reward, terminated) = self.landing(self.s, a);

        self.s = s1;
        self.elapsed += 1;
        let truncated = self.max_episode_steps.is_some_and(|m| self.elapsed >= m);

        Ok(StepOutcome {
            next_state: s1,
            reward,
            terminated,
            truncated,
        })
    }

    fn legal_actions(&self, s: Discrete) -> Vec<Action> {
        self.topology.legal_actions(s)
    }

    fn ground_truth(&self) -> Option<Transitions> {
        let mut transitions = Transitions::new();
        for s in 0..self.n_s() as Discrete {
            for a in Action::ALL {
                let ts = if self.is_terminal(s) {
                    vec![Transition {
                        next_state: s,
                        probability: 1.,
                        reward: 0.,
                        done: true,
                    }]
                } else {
                    let moves = self.outcomes(a);
                    let p = 1. / moves.len() as Continous;
                    moves
                        .into_iter()
                        .map(|b| {
                            let (next_state, reward, done) = self.landing(s, b);
                            Transition {
                                next_state,
                                probability: p,
                                reward,
                                done,
                            }
                        })
                        .collect()
                };
                transitions.insert((s, a.code()), ts);
            }
        }

        Some(transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use rstest::*;

    #[test]
    fn deterministic_walk_to_goal() {
        let env = &mut FrozenLake::standard(false);
        assert_eq!(env.reset(Some(2718)).unwrap(), 0);

        let path = [
            Action::Down,
            Action::Down,
            Action::Right,
            Action::Down,
            Action::Right,
        ];
        for a in path {
            let si = env.step(a).unwrap();
            assert!(!si.terminated);
            assert_float_eq!(si.reward, 0., abs <= 0.);
        }

        let si = env.step(Action::Right).unwrap();
        assert_eq!(si.next_state, 15);
        assert!(si.terminated);
        assert_float_eq!(si.reward, 1., rmax <= 1e-16);
    }

    #[test]
    fn falling_into_a_hole_terminates_without_reward() {
        let env = &mut FrozenLake::standard(false);
        env.reset(None).unwrap();
        env.step(Action::Right).unwrap();

        let si = env.step(Action::Down).unwrap();
        assert_eq!(si.next_state, 5);
        assert!(si.terminated);
        assert_float_eq!(si.reward, 0., abs <= 0.);
    }

    #[test]
    fn episode_is_truncated_after_step_limit() {
        let env = &mut FrozenLake::new(&MAP_4X4, false, Some(3)).unwrap();
        env.reset(None).unwrap();

        assert!(!env.step(Action::Left).unwrap().truncated);
        assert!(!env.step(Action::Left).unwrap().truncated);
        let si = env.step(Action::Left).unwrap();
        assert!(si.truncated);
        assert!(!si.terminated);
        assert_eq!(si.next_state, 0);
    }

    #[test]
    fn slippery_moves_stay_within_intended_and_perpendicular() {
        let env = &mut FrozenLake::standard(true);
        env.reset(Some(42)).unwrap();
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            env.reset(None).unwrap();
            seen.insert(env.step(Action::Right).unwrap().next_state);
        }

        assert_eq!(seen, [0, 1, 4].into_iter().collect());
    }

    #[test]
    fn ground_truth_probabilities_sum_to_one() {
        let env = FrozenLake::standard(true);
        let ts = env.ground_truth().unwrap();

        assert_eq!(ts.len(), 64);
        for t in ts.values() {
            assert_float_eq!(t.iter().map(|t| t.probability).sum::<f64>(), 1., abs <= 1e-12);
        }
        assert!(ts[&(5, 0)].iter().all(|t| t.done && t.next_state == 5));
    }

    #[rstest]
    #[case(&["SFF", "FF"])]
    #[case(&["SFX", "FFG"])]
    #[case(&["FFF", "FFG"])]
    #[case(&["SSF", "FFG"])]
    fn malformed_maps_are_rejected(#[case] desc: &[&str]) {
        assert!(FrozenLake::new(desc, false, None).is_err());
    }

    #[test]
    fn custom_map_start_cell() {
        let env = &mut FrozenLake::new(&["GGGH", "GSGH", "GGGF", "FFFG"], false, Some(1)).unwrap();

        assert_eq!(env.reset(Some(2718)).unwrap(), 5);
        let si = env.step(Action::Down).unwrap();
        assert_eq!(si.next_state, 9);
        assert!(si.terminated);
        assert!(si.truncated);
        assert_eq!(env.cell(9), 'G');
    }
}
