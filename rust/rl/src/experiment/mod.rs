pub mod evaluation;

use crate::algos::model_free::q_learning::QTable;
use crate::config::{Algorithm, Config};
use crate::environments::{grid::GridTopology, DiscreteEnv};
use crate::error::{AgentError, Result};
use crate::mdps::{
    action::Action,
    empirical::{EmpiricalModel, StepKind},
    solvers::{
        policy::{GreedyPolicy, PolicyMode},
        value_iteration::ValueIteration,
        MdpSolver,
    },
};
use evaluation::{evaluate, Evaluation};
use gymnasium::{Continous, Discrete, Transitions};
use rand::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Solving,
    Evaluating,
    Stopped,
}

/// What the agent learns from the random steps.
#[derive(Debug, Clone)]
enum Learner {
    Model(EmpiricalModel),
    QLearning(QTable),
}

#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub solved: bool,
    pub iterations: usize,
    pub success_rate: f64,
    pub best_success_rate: f64,
    pub values: Vec<Continous>,
    pub policy: GreedyPolicy,
    /// Action values, for the Q-learning algorithm only.
    pub q_table: Option<QTable>,
}

/// Alternates random data collection, solving and evaluation until the
/// evaluated success rate clears the configured threshold.
pub struct Experiment<E: DiscreteEnv> {
    cfg: Config,
    env: E,
    eval_env: E,
    topology: GridTopology,
    truth: Option<Transitions>,
    learner: Learner,
    rng: StdRng,
    s: Discrete,
    phase: Phase,
    iteration: usize,
    values: Vec<Continous>,
    policy: GreedyPolicy,
    last: Evaluation,
    best_success_rate: f64,
    solved: bool,
}

impl<E: DiscreteEnv> Experiment<E> {
    /// `env` is sampled at random; `eval_env` only ever runs the greedy policy.
    pub fn new(cfg: Config, mut env: E, mut eval_env: E, topology: GridTopology) -> Result<Self> {
        cfg.validate()?;
        for e in [&env, &eval_env] {
            if e.n_s() != topology.n_s() || e.n_a() != Action::ALL.len() {
                return Err(AgentError::EnvironmentProtocolViolation(format!(
                    "environment has {} states and {} actions, expected a {}x{} grid with {} moves",
                    e.n_s(),
                    e.n_a(),
                    topology.n_rows,
                    topology.n_cols,
                    Action::ALL.len()
                )));
            }
        }

        let n_s = topology.n_s();
        let n_a = Action::ALL.len();
        let learner = match cfg.algorithm {
            Algorithm::ValueIteration => Learner::Model(EmpiricalModel::new(n_s, n_a)),
            Algorithm::QLearning => Learner::QLearning(QTable::new(n_s, n_a, cfg.alpha, cfg.gamma)),
        };
        let s = env.reset(Some(cfg.seed))?;
        eval_env.reset(Some(cfg.seed.wrapping_add(1)))?;
        let truth = env.ground_truth();

        Ok(Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            cfg,
            env,
            eval_env,
            topology,
            truth,
            learner,
            s,
            phase: Phase::Collecting,
            iteration: 0,
            values: vec![0.; n_s],
            policy: GreedyPolicy::empty(n_s),
            last: Evaluation::default(),
            best_success_rate: 0.,
            solved: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn model(&self) -> Option<&EmpiricalModel> {
        match &self.learner {
            Learner::Model(m) => Some(m),
            Learner::QLearning(_) => None,
        }
    }

    pub fn values(&self) -> &[Continous] {
        &self.values
    }

    pub fn policy(&self) -> &GreedyPolicy {
        &self.policy
    }

    pub fn last_evaluation(&self) -> Evaluation {
        self.last
    }

    /// Runs the current phase and moves to the next one.
    pub fn advance(&mut self) -> Result<Phase> {
        self.phase = match self.phase {
            Phase::Collecting => {
                self.iteration += 1;
                self.collect(self.cfg.batch_size)?;
                Phase::Solving
            }
            Phase::Solving => {
                self.solve();
                Phase::Evaluating
            }
            Phase::Evaluating => {
                let rate = self.evaluate()?;
                if rate > self.cfg.success_threshold {
                    tracing::info!(iterations = self.iteration, "solved in {} iterations", self.iteration);
                    self.solved = true;
                    Phase::Stopped
                } else if self.iteration >= self.cfg.max_iterations {
                    tracing::warn!(
                        iterations = self.iteration,
                        best = self.best_success_rate,
                        "iteration limit reached without solving"
                    );
                    Phase::Stopped
                } else {
                    Phase::Collecting
                }
            }
            Phase::Stopped => Phase::Stopped,
        };

        Ok(self.phase)
    }

    pub fn run(&mut self) -> Result<ExperimentReport> {
        while self.advance()? != Phase::Stopped {}

        Ok(self.report())
    }

    pub fn report(&self) -> ExperimentReport {
        ExperimentReport {
            solved: self.solved,
            iterations: self.iteration,
            success_rate: self.last.success_rate(),
            best_success_rate: self.best_success_rate,
            values: self.values.clone(),
            policy: self.policy.clone(),
            q_table: match &self.learner {
                Learner::QLearning(q) => Some(q.clone()),
                Learner::Model(_) => None,
            },
        }
    }

    /// Takes `count` uniformly random steps and learns from each of them.
    pub fn collect(&mut self, count: usize) -> Result<()> {
        let shaping = self.cfg.shaping();
        for _ in 0..count {
            let a = Action::ALL[self.rng.gen_range(0..Action::ALL.len())];
            let step = self.env.step(a)?;

            match &mut self.learner {
                Learner::Model(model) => {
                    model.observe(self.s, a.code(), &step, &shaping)?;
                }
                Learner::QLearning(q) => {
                    let r = match StepKind::classify(&step) {
                        StepKind::Goal => shaping.goal_reward,
                        StepKind::Hole => shaping.hole_penalty,
                        StepKind::Move => step.reward + shaping.move_reward,
                    };
                    q.value_update(self.s, a.code(), r, step.next_state, step.terminated)?;
                }
            }

            self.s = if step.is_done() {
                self.env.reset(None)?
            } else {
                step.next_state
            };
        }

        Ok(())
    }

    /// Rebuilds the value table and the greedy policy from what was learnt so far.
    pub fn solve(&mut self) {
        match &self.learner {
            Learner::Model(model) => {
                let mut vi = ValueIteration::new(model, self.cfg.gamma);
                let (converged, sweeps) = vi.exec(self.cfg.theta, Some(self.cfg.sweep_count));
                self.policy = match self.cfg.policy_mode {
                    PolicyMode::Topology => GreedyPolicy::from_topology(vi.values(), &self.topology),
                    PolicyMode::Model => GreedyPolicy::from_solver(&vi, self.topology.n_s()),
                };
                self.values = vi.into_values();

                let error = self.truth.as_ref().map(|t| model.max_probability_error(t));
                tracing::debug!(
                    iteration = self.iteration,
                    coverage = model.coverage(),
                    sweeps,
                    converged,
                    ?error,
                    "model solved"
                );
            }
            Learner::QLearning(q) => {
                self.values = q.state_values();
                self.policy = q.greedy_policy();
            }
        }
    }

    /// Plays the greedy policy and returns its success rate.
    pub fn evaluate(&mut self) -> Result<f64> {
        self.last = evaluate(
            &self.policy,
            &mut self.eval_env,
            self.cfg.eval_episodes,
            self.cfg.max_episode_steps,
        )?;
        let rate = self.last.success_rate();
        tracing::debug!(
            iteration = self.iteration,
            rate,
            fallbacks = self.last.fallbacks,
            "policy evaluated"
        );

        if rate > self.best_success_rate {
            tracing::info!(
                "best success rate updated {:.3} -> {:.3}",
                self.best_success_rate,
                rate
            );
            self.best_success_rate = rate;
        }

        Ok(rate)
    }
}
