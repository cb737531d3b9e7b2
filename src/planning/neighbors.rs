use crate::planning::state::RealVectorState;
use crate::util::ordered_float::OrderedFloat;
use kiddo::float::{distance::SquaredEuclidean, kdtree::Axis, kdtree::KdTree};
use num_traits::Float;

/// A nearest neighbor structure over states, each tagged with a `usize` item.
///
/// The planner maintains two of these (one for free samples, one for tree
/// vertices) and moves states between them as the tree grows and shrinks, so
/// implementations must support removal as well as insertion.
pub trait NearestNeighbors<F: Float, const N: usize> {
    /// Constructs an empty structure.
    fn new() -> Self;

    /// Adds a state with its item tag.
    fn add(&mut self, state: RealVectorState<F, N>, item: usize);

    /// Removes a previously added state/item pair. Returns true if it was
    /// present.
    fn remove(&mut self, state: &RealVectorState<F, N>, item: usize) -> bool;

    /// The number of stored states.
    fn size(&self) -> usize;

    /// Removes every stored state.
    fn clear(&mut self);

    /// Gets the items of the k nearest neighbors to the given state.
    fn nearest_k(&self, state: &RealVectorState<F, N>, k: usize) -> Vec<usize>;

    /// Gets the items of all states within the given radius of the state.
    fn within_radius(&self, state: &RealVectorState<F, N>, radius: F) -> Vec<usize>;

    /// Gets the items within the given radius, nearest first.
    fn within_radius_sorted(&self, state: &RealVectorState<F, N>, radius: F) -> Vec<usize>;

    /// Gets the item of the single nearest neighbor, if any.
    fn nearest_one(&self, state: &RealVectorState<F, N>) -> Option<usize> {
        self.nearest_k(state, 1).first().copied()
    }
}

/// A linear-scan implementation. Useful for small problems and as a reference
/// in tests.
pub struct LinearNearestNeighbors<F: Float, const N: usize> {
    states: Vec<(RealVectorState<F, N>, usize)>,
}

impl<F: Float, const N: usize> NearestNeighbors<F, N> for LinearNearestNeighbors<F, N> {
    fn new() -> Self {
        Self { states: Vec::new() }
    }

    fn add(&mut self, state: RealVectorState<F, N>, item: usize) {
        self.states.push((state, item));
    }

    fn remove(&mut self, _state: &RealVectorState<F, N>, item: usize) -> bool {
        match self.states.iter().position(|&(_, i)| i == item) {
            Some(index) => {
                self.states.swap_remove(index);
                true
            }
            None => false,
        }
    }

    fn size(&self) -> usize {
        self.states.len()
    }

    fn clear(&mut self) {
        self.states.clear();
    }

    fn nearest_k(&self, state: &RealVectorState<F, N>, k: usize) -> Vec<usize> {
        let mut candidates: Vec<(F, usize)> = self
            .states
            .iter()
            .map(|(s, i)| (state.euclidean_distance_squared(s), *i))
            .collect();
        candidates.sort_by_key(|&(d, _)| OrderedFloat::from(d));
        candidates.into_iter().take(k).map(|(_, i)| i).collect()
    }

    fn within_radius(&self, state: &RealVectorState<F, N>, radius: F) -> Vec<usize> {
        self.states
            .iter()
            .filter(|(s, _)| state.euclidean_distance_squared(s) <= radius * radius)
            .map(|(_, i)| *i)
            .collect()
    }

    fn within_radius_sorted(&self, state: &RealVectorState<F, N>, radius: F) -> Vec<usize> {
        let mut candidates: Vec<(F, usize)> = self
            .states
            .iter()
            .filter(|(s, _)| state.euclidean_distance_squared(s) <= radius * radius)
            .map(|(s, i)| (state.euclidean_distance_squared(s), *i))
            .collect();
        candidates.sort_by_key(|&(d, _)| OrderedFloat::from(d));
        candidates.into_iter().map(|(_, i)| i).collect()
    }
}

/// A k-d tree implementation backed by `kiddo`.
pub struct KdTreeNearestNeighbors<F: Float + Axis, const N: usize> {
    kdtree: KdTree<F, usize, N, 32, u32>,
}

impl<F: Float + Axis, const N: usize> NearestNeighbors<F, N> for KdTreeNearestNeighbors<F, N> {
    fn new() -> Self {
        Self {
            kdtree: KdTree::new(),
        }
    }

    fn add(&mut self, state: RealVectorState<F, N>, item: usize) {
        self.kdtree.add(state.values(), item);
    }

    fn remove(&mut self, state: &RealVectorState<F, N>, item: usize) -> bool {
        self.kdtree.remove(state.values(), item) > 0
    }

    fn size(&self) -> usize {
        self.kdtree.size()
    }

    fn clear(&mut self) {
        self.kdtree = KdTree::new();
    }

    fn nearest_k(&self, state: &RealVectorState<F, N>, k: usize) -> Vec<usize> {
        self.kdtree
            .nearest_n::<SquaredEuclidean>(state.values(), k)
            .iter()
            .map(|n| n.item)
            .collect()
    }

    fn within_radius(&self, state: &RealVectorState<F, N>, radius: F) -> Vec<usize> {
        self.kdtree
            .within_unsorted::<SquaredEuclidean>(state.values(), radius * radius)
            .iter()
            .map(|n| n.item)
            .collect()
    }

    fn within_radius_sorted(&self, state: &RealVectorState<F, N>, radius: F) -> Vec<usize> {
        self.kdtree
            .within::<SquaredEuclidean>(state.values(), radius * radius)
            .iter()
            .map(|n| n.item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate<NN: NearestNeighbors<f64, 2>>() -> NN {
        let mut nn = NN::new();
        nn.add(RealVectorState::new([0.0, 0.0]), 0);
        nn.add(RealVectorState::new([1.0, 0.0]), 1);
        nn.add(RealVectorState::new([0.0, 2.0]), 2);
        nn.add(RealVectorState::new([3.0, 3.0]), 3);
        nn
    }

    fn check_queries<NN: NearestNeighbors<f64, 2>>(nn: &NN) {
        let query = RealVectorState::new([0.1, 0.1]);
        assert_eq!(nn.nearest_one(&query), Some(0));
        assert_eq!(nn.nearest_k(&query, 2), vec![0, 1]);

        let mut within = nn.within_radius(&query, 1.5);
        within.sort_unstable();
        assert_eq!(within, vec![0, 1]);

        assert_eq!(nn.within_radius_sorted(&query, 2.5), vec![0, 1, 2]);
    }

    #[test]
    fn linear_queries() {
        let nn: LinearNearestNeighbors<f64, 2> = populate();
        check_queries(&nn);
    }

    #[test]
    fn kdtree_queries() {
        let nn: KdTreeNearestNeighbors<f64, 2> = populate();
        check_queries(&nn);
    }

    #[test]
    fn removal_is_mirrored_between_implementations() {
        let mut linear: LinearNearestNeighbors<f64, 2> = populate();
        let mut kdtree: KdTreeNearestNeighbors<f64, 2> = populate();
        let state = RealVectorState::new([1.0, 0.0]);

        assert!(linear.remove(&state, 1));
        assert!(kdtree.remove(&state, 1));
        assert!(!linear.remove(&state, 1));
        assert!(!kdtree.remove(&state, 1));

        assert_eq!(linear.size(), 3);
        assert_eq!(kdtree.size(), 3);

        let query = RealVectorState::new([0.9, 0.0]);
        assert_eq!(linear.nearest_one(&query), Some(0));
        assert_eq!(kdtree.nearest_one(&query), Some(0));
    }
}
