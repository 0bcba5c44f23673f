use crate::environments::DiscreteEnv;
use crate::error::Result;
use crate::mdps::{empirical::StepKind, solvers::policy::Policy};

/// Outcome of running a policy for a number of episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    pub episodes: usize,
    pub successes: usize,
    /// Steps where the policy had no action and a legal move was used instead.
    pub fallbacks: usize,
}

impl Evaluation {
    pub fn success_rate(&self) -> f64 {
        if self.episodes == 0 {
            0.
        } else {
            self.successes as f64 / self.episodes as f64
        }
    }
}

/// Plays `episodes` episodes from the start state following `policy`.
///
/// An episode succeeds only if it ends on the goal. Episodes end on
/// termination, truncation, or after `max_steps` steps.
pub fn evaluate<P, E>(policy: &P, env: &mut E, episodes: usize, max_steps: usize) -> Result<Evaluation>
where
    P: Policy + ?Sized,
    E: DiscreteEnv + ?Sized,
{
    let mut eval = Evaluation {
        episodes,
        ..Default::default()
    };

    for _ in 0..episodes {
        let mut s = env.reset(None)?;
        for _ in 0..max_steps {
            let action = match policy.policy(s) {
                Some(a) => a,
                None => {
                    eval.fallbacks += 1;
                    let Some(&a) = env.legal_actions(s).first() else {
                        tracing::warn!(s, "no legal action, abandoning episode");
                        break;
                    };
                    tracing::debug!(s, action = %a, "no policy action, falling back");
                    a
                }
            };

            let step = env.step(action)?;
            if step.terminated {
                if StepKind::classify(&step) == StepKind::Goal {
                    eval.successes += 1;
                }
                break;
            }
            if step.truncated {
                break;
            }
            s = step.next_state;
        }
    }

    Ok(eval)
}
