use crate::mdps::action::Action;
use gymnasium::Discrete;

/// Static adjacency of a row-major grid of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridTopology {
    pub n_rows: usize,
    pub n_cols: usize,
}

impl Default for GridTopology {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl GridTopology {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self { n_rows, n_cols }
    }

    /// Square grid holding `n_s` cells, if `n_s` is a perfect square.
    pub fn square(n_s: usize) -> Option<Self> {
        let side = (n_s as f64).sqrt().round() as usize;
        (side * side == n_s && side > 0).then(|| Self::new(side, side))
    }

    pub fn n_s(&self) -> usize {
        self.n_rows * self.n_cols
    }

    pub fn row_col(&self, s: Discrete) -> (usize, usize) {
        let s = s as usize;
        (s / self.n_cols, s % self.n_cols)
    }

    pub fn state(&self, row: usize, col: usize) -> Discrete {
        (row * self.n_cols + col) as Discrete
    }

    /// Cell reached by `a` from `s`, or `None` when the move leaves the grid.
    pub fn neighbour(&self, s: Discrete, a: Action) -> Option<Discrete> {
        let (row, col) = self.row_col(s);
        let (dr, dc) = a.delta();
        let row = row.checked_add_signed(dr).filter(|&r| r < self.n_rows)?;
        let col = col.checked_add_signed(dc).filter(|&c| c < self.n_cols)?;

        Some(self.state(row, col))
    }

    /// Deterministic destination: moves into the edge leave the agent in place.
    pub fn destination(&self, s: Discrete, a: Action) -> Discrete {
        self.neighbour(s, a).unwrap_or(s)
    }

    /// Actions that do not move off the grid, in action-code order.
    pub fn legal_actions(&self, s: Discrete) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|&a| self.neighbour(s, a).is_some())
            .collect()
    }
}
