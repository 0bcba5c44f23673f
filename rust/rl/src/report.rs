use crate::algos::model_free::q_learning::QTable;
use crate::environments::grid::GridTopology;
use crate::experiment::ExperimentReport;
use crate::mdps::{action::Action, solvers::policy::GreedyPolicy};
use gymnasium::{Continous, Discrete};
use itertools::Itertools;
use std::fmt;

/// State values laid out on the grid, two decimals per cell.
pub struct ValueGrid<'a> {
    pub values: &'a [Continous],
    pub topology: GridTopology,
}

impl fmt::Display for ValueGrid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.values.iter().chunks(self.topology.n_cols) {
            writeln!(f, "{}", row.map(|v| format!("{v:>6.2}")).join(" | "))?;
        }

        Ok(())
    }
}

/// Policy actions laid out on the grid; `-` where there is none.
pub struct PolicyGrid<'a> {
    pub policy: &'a GreedyPolicy,
    pub topology: GridTopology,
}

impl fmt::Display for PolicyGrid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.policy.actions().iter().chunks(self.topology.n_cols) {
            let line = row
                .map(|a| match a {
                    Some(a) => format!("{a:<5}"),
                    None => format!("{:<5}", "-"),
                })
                .join(" | ");
            writeln!(f, "{}", line.trim_end())?;
        }

        Ok(())
    }
}

/// Action values, one row per state and one column per action.
pub struct QGrid<'a> {
    pub q: &'a QTable,
}

impl fmt::Display for QGrid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = Action::ALL.iter().map(|a| format!("{a:>6}")).join(" | ");
        writeln!(f, "{:>5}{header}", "")?;
        for s in 0..self.q.n_s() as Discrete {
            let row = (0..self.q.n_a() as Discrete)
                .map(|a| format!("{:>6.2}", self.q.q(s, a)))
                .join(" | ");
            writeln!(f, "{s:>3}: {row}")?;
        }

        Ok(())
    }
}

pub fn summary(report: &ExperimentReport) -> String {
    if report.solved {
        format!(
            "solved in {} iterations, success rate {:.2}",
            report.iterations, report.success_rate
        )
    } else {
        format!(
            "not solved after {} iterations, best success rate {:.2}",
            report.iterations, report.best_success_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_rounded_into_rows() {
        let values = [0.59049, 0.6561, 0.729, 0.6561, 0.6561, 0., 0.81, 0., 0.729, 0.81, 0.9, 0., 0., 0.9, 1., 0.];
        let text = ValueGrid {
            values: &values,
            topology: GridTopology::default(),
        }
        .to_string();

        assert_eq!(
            text,
            "  0.59 |   0.66 |   0.73 |   0.66\n  \
             0.66 |   0.00 |   0.81 |   0.00\n  \
             0.73 |   0.81 |   0.90 |   0.00\n  \
             0.00 |   0.90 |   1.00 |   0.00\n"
        );
    }

    #[test]
    fn negative_values_keep_their_sign() {
        let text = ValueGrid {
            values: &[-1., 0.25],
            topology: GridTopology::new(1, 2),
        }
        .to_string();

        assert_eq!(text, " -1.00 |   0.25\n");
    }

    #[test]
    fn missing_actions_print_as_dashes() {
        let pi = GreedyPolicy::new(vec![Some(Action::Down), None, Some(Action::Right), Some(Action::Up)]);
        let text = PolicyGrid {
            policy: &pi,
            topology: GridTopology::new(2, 2),
        }
        .to_string();

        assert_eq!(text, format!("{:<5} | -\n{:<5} | {}\n", Action::Down, Action::Right, Action::Up));
    }

    #[test]
    fn q_table_prints_every_action_value() {
        let mut q = QTable::new(2, 4, 0.5, 0.9);
        q.value_update(1, 2, 1., 0, true).unwrap();
        q.value_update(0, 0, -1., 1, true).unwrap();

        assert_eq!(
            QGrid { q: &q }.to_string(),
            "       left |   down |  right |     up\n  \
             0:  -0.50 |   0.00 |   0.00 |   0.00\n  \
             1:   0.00 |   0.00 |   0.50 |   0.00\n"
        );
    }

    #[test]
    fn summary_mentions_the_outcome() {
        let mut report = ExperimentReport {
            solved: true,
            iterations: 7,
            success_rate: 0.85,
            best_success_rate: 0.85,
            values: vec![],
            policy: GreedyPolicy::empty(0),
            q_table: None,
        };
        assert_eq!(summary(&report), "solved in 7 iterations, success rate 0.85");

        report.solved = false;
        report.best_success_rate = 0.4;
        assert_eq!(
            summary(&report),
            "not solved after 7 iterations, best success rate 0.40"
        );
    }
}
