//! Row selections over a layer.

/// A sorted set of row indices into a layer of `universe` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    indices: Vec<usize>,
    universe: usize,
}

impl Selection {
    /// Builds a selection, dropping out-of-range and duplicate indices.
    #[must_use]
    pub fn new(mut indices: Vec<usize>, universe: usize) -> Self {
        indices.retain(|&i| i < universe);
        indices.sort_unstable();
        indices.dedup();
        Self { indices, universe }
    }

    /// Every row selected.
    #[must_use]
    pub fn all(universe: usize) -> Self {
        Self {
            indices: (0..universe).collect(),
            universe,
        }
    }

    /// The complement of this selection within the same layer.
    #[must_use]
    pub fn invert(&self) -> Self {
        let mut selected = self.indices.iter().peekable();
        let mut indices = Vec::with_capacity(self.universe - self.indices.len());
        for i in 0..self.universe {
            if selected.peek() == Some(&&i) {
                selected.next();
            } else {
                indices.push(i);
            }
        }
        Self {
            indices,
            universe: self.universe,
        }
    }

    /// Selected row indices, ascending.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of selected rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Row count of the layer this selection refers to.
    #[must_use]
    pub const fn universe(&self) -> usize {
        self.universe
    }

    /// Whether row `index` is selected.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }
}
