//! Uniform-cell spatial index, rebuilt from scratch on every iteration.

use super::pool::{Pool, PoolKey, Recycle};
use std::collections::BTreeMap;

/// Cell coordinates are wide enough that `floor(x / cell_size)` only saturates for coordinates
/// far outside any drawing; neighbour offsets are applied with `checked_add`.
pub(crate) type CellCoord = (i64, i64);

/// The 8-neighbourhood offsets, in the order neighbours are visited.
const NEIGHBOURS: [CellCoord; 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Clone, Default)]
pub(crate) struct Cell {
    pub(crate) coord: CellCoord,
    pub(crate) nodes: Vec<usize>,
}

impl Recycle for Cell {
    fn recycle(&mut self) {
        self.nodes.clear();
    }
}

/// Cells keyed by `(i, j)` and traversed in lexicographic order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Grid {
    index: BTreeMap<CellCoord, PoolKey>,
    pool: Pool<Cell>,
}

impl Grid {
    pub(crate) fn cell_of(x: f64, y: f64, cell_size: f64) -> CellCoord {
        (
            (x / cell_size).floor() as i64,
            (y / cell_size).floor() as i64,
        )
    }

    pub(crate) fn add(&mut self, i: i64, j: i64, node: usize) {
        let pool = &mut self.pool;
        let key = *self.index.entry((i, j)).or_insert_with(|| pool.acquire());
        if let Some(cell) = self.pool.get_mut(key) {
            cell.coord = (i, j);
            cell.nodes.push(node);
        }
    }

    /// `None` when no node landed in `(i, j)` since the last [`Grid::clear`].
    pub(crate) fn find(&self, i: i64, j: i64) -> Option<&Cell> {
        self.index.get(&(i, j)).and_then(|&k| self.pool.get(k))
    }

    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.pool.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Cells in ascending `(i, j)` order.
    pub(crate) fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.index.values().filter_map(|&k| self.pool.get(k))
    }

    /// The existing cells around `coord`, skipping offsets that would leave the `i64` range.
    pub(crate) fn neighbours(&self, coord: CellCoord) -> impl Iterator<Item = &Cell> {
        let (i, j) = coord;
        NEIGHBOURS.iter().filter_map(move |&(di, dj)| {
            self.find(i.checked_add(di)?, j.checked_add(dj)?)
        })
    }

    /// Calls `visit` once per cell, in ascending `(i, j)` order. The visitor gets the grid back so
    /// it can look up neighbouring cells.
    pub(crate) fn for_each_cell<F>(&self, mut visit: F)
    where
        F: FnMut(&Cell, &Grid),
    {
        for cell in self.cells() {
            visit(cell, self);
        }
    }

    pub(crate) fn pooled_cells(&self) -> usize {
        self.pool.capacity()
    }
}
