//! 输入、输出及扩展弧关系的稀疏化邻接矩阵封装.
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};

type SmallRow<T> = SmallVec<[T; 4]>;

/// A |P|×|T| table stored row-per-place.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Incidence<T> {
    rows: IndexVec<PlaceId, SmallRow<T>>,
    cols: usize,
}

impl<T> Incidence<T>
where
    T: Clone,
{
    pub fn new(places: usize, transitions: usize, default: T) -> Self {
        let mut rows = IndexVec::new();
        for _ in 0..places {
            rows.push(SmallRow::from_elem(default.clone(), transitions));
        }
        Self {
            rows,
            cols: transitions,
        }
    }

    pub fn from_rows(rows: IndexVec<PlaceId, SmallRow<T>>) -> Self {
        let cols = rows.iter().map(|row| row.len()).next().unwrap_or_default();
        debug_assert!(rows.iter().all(|row| row.len() == cols));
        Self { rows, cols }
    }

    pub fn places(&self) -> usize {
        self.rows.len()
    }

    pub fn transitions(&self) -> usize {
        self.cols
    }

    pub fn get(&self, place: PlaceId, transition: TransitionId) -> &T {
        &self.rows[place][transition.index()]
    }

    pub fn get_mut(&mut self, place: PlaceId, transition: TransitionId) -> &mut T {
        &mut self.rows[place][transition.index()]
    }

    pub fn set(&mut self, place: PlaceId, transition: TransitionId, value: T) {
        self.rows[place][transition.index()] = value;
    }

    pub fn rows(&self) -> &IndexVec<PlaceId, SmallRow<T>> {
        &self.rows
    }

    pub fn any<F>(&self, mut pred: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.rows.iter().any(|row| row.iter().any(&mut pred))
    }
}

impl Incidence<u64> {
    pub fn accumulate(&mut self, place: PlaceId, transition: TransitionId, weight: u64) {
        let entry = self.get_mut(place, transition);
        *entry += weight;
    }

    /// Entry-wise `self - other` widened into signed space.
    pub fn difference(&self, other: &Self) -> Incidence<i64> {
        assert_eq!(self.places(), other.places());
        assert_eq!(self.transitions(), other.transitions());
        let mut rows = IndexVec::new();
        for (left, right) in self.rows.iter().zip(other.rows.iter()) {
            rows.push(
                left.iter()
                    .zip(right.iter())
                    .map(|(l, r)| *l as i64 - *r as i64)
                    .collect::<SmallRow<_>>(),
            );
        }
        Incidence {
            rows,
            cols: self.cols,
        }
    }
}

impl<T> fmt::Debug for Incidence<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incidence")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

/// Boolean place/transition relation used for inhibitor and reset arcs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidenceBool {
    rows: IndexVec<PlaceId, SmallRow<bool>>,
    cols: usize,
}

impl IncidenceBool {
    pub fn new(places: usize, transitions: usize) -> Self {
        let mut rows = IndexVec::new();
        for _ in 0..places {
            rows.push(SmallRow::from_elem(false, transitions));
        }
        Self {
            rows,
            cols: transitions,
        }
    }

    pub fn places(&self) -> usize {
        self.rows.len()
    }

    pub fn transitions(&self) -> usize {
        self.cols
    }

    pub fn get(&self, place: PlaceId, transition: TransitionId) -> bool {
        self.rows[place][transition.index()]
    }

    pub fn set(&mut self, place: PlaceId, transition: TransitionId, value: bool) {
        self.rows[place][transition.index()] = value;
    }

    pub fn rows(&self) -> &IndexVec<PlaceId, SmallRow<bool>> {
        &self.rows
    }

    pub fn any_set(&self) -> bool {
        self.rows.iter().any(|row| row.iter().any(|set| *set))
    }
}

impl fmt::Debug for IncidenceBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncidenceBool")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}
