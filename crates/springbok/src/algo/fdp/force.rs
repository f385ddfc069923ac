//! Per-iteration forces and integration over a dense working copy of the model.

use super::Params;
use super::grid::Grid;
use super::rng::XorShift64Star;
use crate::graph::Size;

#[derive(Debug, Clone, Default)]
pub(crate) struct Body {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) dx: f64,
    pub(crate) dy: f64,
    pub(crate) pinned: bool,
    pub(crate) size: Option<Size>,
    /// Indices into `Simulation::springs` of the edges leaving this body.
    pub(crate) out_springs: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Spring {
    pub(crate) tail: usize,
    pub(crate) head: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StepStats {
    pub(crate) repulsions: u64,
    pub(crate) jitters: u64,
    pub(crate) cells: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Simulation {
    pub(crate) bodies: Vec<Body>,
    pub(crate) springs: Vec<Spring>,
}

/// Temperature of iteration `i`: decays linearly from `t0` toward zero.
pub(crate) fn temperature(params: &Params, i: usize) -> f64 {
    let n = params.num_iters as f64;
    params.t0 * (n - i as f64) / n
}

/// Squared length of the average valid size of `p` and `q`; `0.0` if neither has a size.
pub(crate) fn local_k2(p: &Body, q: &Body) -> f64 {
    let mut w = 0.0;
    let mut h = 0.0;
    let mut count = 0.0;
    for s in [p.size, q.size].into_iter().flatten() {
        w += s.width;
        h += s.height;
        count += 1.0;
    }
    if count == 0.0 {
        return 0.0;
    }
    w /= count;
    h /= count;
    w * w + h * h
}

impl Simulation {
    /// One cooling step at temperature `temp`. A non-positive temperature leaves everything
    /// untouched.
    pub(crate) fn step(
        &mut self,
        grid: &mut Grid,
        params: &Params,
        temp: f64,
        rng: &mut XorShift64Star,
    ) -> StepStats {
        let mut stats = StepStats::default();
        if temp <= 0.0 {
            return stats;
        }

        for b in &mut self.bodies {
            b.dx = 0.0;
            b.dy = 0.0;
        }

        if params.use_grid {
            grid.clear();
            for (idx, b) in self.bodies.iter().enumerate() {
                let (i, j) = Grid::cell_of(b.x, b.y, params.cell_size);
                grid.add(i, j, idx);
            }
            stats.cells = grid.len();

            for s in 0..self.springs.len() {
                self.attract(s, params);
            }
            self.repulse_grid(grid, params, rng, &mut stats);
        } else {
            for p in 0..self.bodies.len() {
                for q in (p + 1)..self.bodies.len() {
                    self.apply_rep(p, q, params, rng, &mut stats);
                }
                for k in 0..self.bodies[p].out_springs.len() {
                    let s = self.bodies[p].out_springs[k];
                    self.attract(s, params);
                }
            }
        }

        self.integrate(temp);
        stats
    }

    fn repulse_grid(
        &mut self,
        grid: &Grid,
        params: &Params,
        rng: &mut XorShift64Star,
        stats: &mut StepStats,
    ) {
        grid.for_each_cell(|cell, grid| {
            for &p in &cell.nodes {
                for &q in &cell.nodes {
                    if p != q {
                        self.apply_rep(p, q, params, rng, stats);
                    }
                }
            }

            for neighbour in grid.neighbours(cell.coord) {
                for &p in &cell.nodes {
                    for &q in &neighbour.nodes {
                        let dx = self.bodies[q].x - self.bodies[p].x;
                        let dy = self.bodies[q].y - self.bodies[p].y;
                        let d2 = dx * dx + dy * dy;
                        if d2 < params.radius2 {
                            self.do_rep(p, q, dx, dy, d2, params, rng, stats);
                        }
                    }
                }
            }
        });
    }

    fn apply_rep(
        &mut self,
        p: usize,
        q: usize,
        params: &Params,
        rng: &mut XorShift64Star,
        stats: &mut StepStats,
    ) {
        let dx = self.bodies[q].x - self.bodies[p].x;
        let dy = self.bodies[q].y - self.bodies[p].y;
        self.do_rep(p, q, dx, dy, dx * dx + dy * dy, params, rng, stats);
    }

    /// Pushes `q` away from `p` with a force falling off as `1/d²`.
    #[allow(clippy::too_many_arguments)]
    fn do_rep(
        &mut self,
        p: usize,
        q: usize,
        mut dx: f64,
        mut dy: f64,
        mut d2: f64,
        params: &Params,
        rng: &mut XorShift64Star,
        stats: &mut StepStats,
    ) {
        while d2 == 0.0 {
            dx = rng.next_jitter();
            dy = rng.next_jitter();
            d2 = dx * dx + dy * dy;
            stats.jitters += 1;
        }
        let force = params.rep_factor * local_k2(&self.bodies[p], &self.bodies[q]) / d2;
        self.bodies[q].dx += dx * force;
        self.bodies[q].dy += dy * force;
        self.bodies[p].dx -= dx * force;
        self.bodies[p].dy -= dy * force;
        stats.repulsions += 1;
    }

    /// Spring along `springs[s]`, growing linearly with the distance between its ends.
    fn attract(&mut self, s: usize, params: &Params) {
        let Spring { tail, head } = self.springs[s];
        let dx = self.bodies[head].x - self.bodies[tail].x;
        let dy = self.bodies[head].y - self.bodies[tail].y;
        let dist = (dx * dx + dy * dy).sqrt();
        let mut local_k = local_k2(&self.bodies[tail], &self.bodies[head]).sqrt();
        if local_k == 0.0 {
            local_k = params.k;
        }
        let force = params.att_factor * dist / local_k;
        self.bodies[head].dx -= dx * force;
        self.bodies[head].dy -= dy * force;
        self.bodies[tail].dx += dx * force;
        self.bodies[tail].dy += dy * force;
    }

    /// Moves every unpinned body by its displacement, clamped to length `temp`.
    pub(crate) fn integrate(&mut self, temp: f64) {
        let temp2 = temp * temp;
        for b in self.bodies.iter_mut().filter(|b| !b.pinned) {
            let len2 = b.dx * b.dx + b.dy * b.dy;
            if len2 < temp2 {
                b.x += b.dx;
                b.y += b.dy;
            } else {
                let scale = temp / len2.sqrt();
                b.x += b.dx * scale;
                b.y += b.dy * scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Body, Simulation, Spring, local_k2, temperature};
    use crate::algo::fdp::Params;
    use crate::algo::fdp::grid::Grid;
    use crate::algo::fdp::rng::XorShift64Star;
    use crate::graph::Size;

    fn body(x: f64, y: f64, size: Option<Size>) -> Body {
        Body {
            x,
            y,
            size,
            ..Default::default()
        }
    }

    fn square(side: f64) -> Option<Size> {
        Some(Size::new(side, side))
    }

    fn params(k: f64, cell_size: f64) -> Params {
        Params {
            k,
            k2: k * k,
            t0: 10.0,
            cell_size,
            radius2: cell_size * cell_size,
            rep_factor: 1.0,
            att_factor: 1.0,
            num_iters: 40,
            use_grid: true,
        }
    }

    fn positions(sim: &Simulation) -> Vec<(f64, f64)> {
        sim.bodies.iter().map(|b| (b.x, b.y)).collect()
    }

    fn assert_near(actual: &[(f64, f64)], expected: &[(f64, f64)]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a.0 - e.0).abs() < 1e-9 && (a.1 - e.1).abs() < 1e-9,
                "got {actual:?}, expected {expected:?}"
            );
        }
    }

    #[test]
    fn temperature_decays_linearly_without_reaching_zero() {
        let p = params(10.0, 30.0);
        assert_eq!(temperature(&p, 0), 10.0);
        assert_eq!(temperature(&p, 20), 5.0);
        assert_eq!(temperature(&p, 39), 0.25);
    }

    #[test]
    fn local_k2_averages_valid_sizes_only() {
        let a = body(0.0, 0.0, Some(Size::new(10.0, 20.0)));
        let b = body(0.0, 0.0, Some(Size::new(30.0, 40.0)));
        let none = body(0.0, 0.0, None);
        assert_eq!(local_k2(&a, &b), 20.0 * 20.0 + 30.0 * 30.0);
        assert_eq!(local_k2(&a, &none), 10.0 * 10.0 + 20.0 * 20.0);
        assert_eq!(local_k2(&none, &none), 0.0);
    }

    #[test]
    fn non_positive_temperature_is_a_no_op() {
        let mut sim = Simulation {
            bodies: vec![body(0.0, 0.0, square(10.0)), body(1.0, 0.0, square(10.0))],
            springs: vec![Spring { tail: 0, head: 1 }],
        };
        let before = positions(&sim);
        let mut grid = Grid::default();
        let mut rng = XorShift64Star::new(1);
        for temp in [0.0, -3.0] {
            let stats = sim.step(&mut grid, &params(10.0, 30.0), temp, &mut rng);
            assert_eq!(stats.repulsions, 0);
        }
        assert_eq!(positions(&sim), before);
        assert!(grid.is_empty(), "the grid is not rebuilt for skipped iterations");
    }

    #[test]
    fn step_length_is_clamped_to_the_temperature() {
        let mut sim = Simulation {
            bodies: vec![body(2.0, -1.0, None)],
            springs: Vec::new(),
        };
        sim.bodies[0].dx = 3.0e9;
        sim.bodies[0].dy = -4.0e9;
        sim.integrate(2.5);

        let b = &sim.bodies[0];
        let (mx, my) = (b.x - 2.0, b.y + 1.0);
        let len = (mx * mx + my * my).sqrt();
        assert!((len - 2.5).abs() < 1e-12, "step length {len}");
        assert!((mx / len - 0.6).abs() < 1e-12);
        assert!((my / len + 0.8).abs() < 1e-12);
    }

    #[test]
    fn small_displacements_are_applied_exactly() {
        let mut sim = Simulation {
            bodies: vec![body(1.0, 1.0, None)],
            springs: Vec::new(),
        };
        sim.bodies[0].dx = 0.5;
        sim.bodies[0].dy = -0.25;
        sim.integrate(1.0);
        assert_eq!(positions(&sim), vec![(1.5, 0.75)]);
    }

    #[test]
    fn pinned_bodies_push_but_do_not_move() {
        let mut sim = Simulation {
            bodies: vec![body(0.0, 0.0, square(10.0)), body(5.0, 0.0, square(10.0))],
            springs: Vec::new(),
        };
        sim.bodies[0].pinned = true;
        let mut grid = Grid::default();
        let mut rng = XorShift64Star::new(1);
        sim.step(&mut grid, &params(10.0, 30.0), 4.0, &mut rng);

        assert_eq!((sim.bodies[0].x, sim.bodies[0].y), (0.0, 0.0));
        assert!(sim.bodies[0].dx < 0.0, "pinned body still receives force");
        assert!(
            (sim.bodies[1].x - 9.0).abs() < 1e-12,
            "free body moves a full temperature step"
        );
    }

    #[test]
    fn far_cells_do_not_repel_but_same_cell_always_does() {
        let p = params(10.0, 10.0);
        let mut grid = Grid::default();
        let mut rng = XorShift64Star::new(1);

        // Cells (0, 0) and (2, 0): not neighbours.
        let mut far = Simulation {
            bodies: vec![body(1.0, 1.0, square(10.0)), body(21.0, 1.0, square(10.0))],
            springs: Vec::new(),
        };
        let stats = far.step(&mut grid, &p, 5.0, &mut rng);
        assert_eq!(stats.repulsions, 0);
        assert_eq!(positions(&far), vec![(1.0, 1.0), (21.0, 1.0)]);

        // Opposite corners of one cell: farther apart than adjacent-cell pairs that get filtered.
        let mut same = Simulation {
            bodies: vec![body(0.0, 0.0, square(10.0)), body(9.9, 9.9, square(10.0))],
            springs: Vec::new(),
        };
        let stats = same.step(&mut grid, &p, 5.0, &mut rng);
        assert_eq!(stats.cells, 1);
        assert_eq!(stats.repulsions, 2, "each ordered pair is visited once");
        assert!(same.bodies[0].x < 0.0 && same.bodies[1].x > 9.9);
    }

    #[test]
    fn neighbour_cells_are_filtered_by_the_radius() {
        let p = params(10.0, 10.0);
        let mut grid = Grid::default();
        let mut rng = XorShift64Star::new(1);

        // Adjacent cells on one row, 14.9 apart: beyond the radius of 10.
        let mut sim = Simulation {
            bodies: vec![body(0.1, 0.0, square(10.0)), body(15.0, 0.0, square(10.0))],
            springs: Vec::new(),
        };
        assert_eq!(sim.step(&mut grid, &p, 5.0, &mut rng).repulsions, 0);

        // Adjacent cells, 2 apart: repelled from both sides of the cell boundary.
        let mut sim = Simulation {
            bodies: vec![body(9.0, 0.0, square(10.0)), body(11.0, 0.0, square(10.0))],
            springs: Vec::new(),
        };
        assert_eq!(sim.step(&mut grid, &p, 5.0, &mut rng).repulsions, 2);
        assert!(sim.bodies[0].x < 9.0 && sim.bodies[1].x > 11.0);
    }

    #[test]
    fn coincident_bodies_are_separated_by_jitter() {
        let mut sim = Simulation {
            bodies: vec![body(3.0, 3.0, square(10.0)), body(3.0, 3.0, square(10.0))],
            springs: Vec::new(),
        };
        let mut grid = Grid::default();
        let mut rng = XorShift64Star::new(1);
        let stats = sim.step(&mut grid, &params(10.0, 30.0), 5.0, &mut rng);
        assert!(stats.jitters >= 2);
        let [a, b] = [&sim.bodies[0], &sim.bodies[1]];
        assert!(a.x != b.x || a.y != b.y);
        assert!(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite());
    }

    #[test]
    fn spring_pulls_ends_together() {
        let mut sim = Simulation {
            bodies: vec![body(0.0, 0.0, square(10.0)), body(100.0, 0.0, square(10.0))],
            springs: vec![Spring { tail: 0, head: 1 }],
        };
        sim.bodies[0].out_springs.push(0);
        let mut grid = Grid::default();
        let mut rng = XorShift64Star::new(1);
        let mut p = params(10.0, 30.0);
        sim.step(&mut grid, &p, 5.0, &mut rng);
        assert_near(&positions(&sim), &[(5.0, 0.0), (95.0, 0.0)]);

        p.use_grid = false;
        sim.step(&mut grid, &p, 5.0, &mut rng);
        assert_near(&positions(&sim), &[(10.0, 0.0), (90.0, 0.0)]);
    }

    #[test]
    fn all_pairs_mode_has_no_cutoff() {
        let mut p = params(10.0, 10.0);
        p.use_grid = false;
        let mut sim = Simulation {
            bodies: vec![
                body(0.0, 0.0, square(10.0)),
                body(1000.0, 0.0, square(10.0)),
                body(0.0, 1000.0, square(10.0)),
            ],
            springs: Vec::new(),
        };
        let mut grid = Grid::default();
        let mut rng = XorShift64Star::new(1);
        let stats = sim.step(&mut grid, &p, 5.0, &mut rng);
        assert_eq!(stats.repulsions, 3);
        assert!(sim.bodies[0].x < 0.0 && sim.bodies[0].y < 0.0);
    }

    #[test]
    fn spring_between_unsized_bodies_uses_the_global_k() {
        let mut sim = Simulation {
            bodies: vec![body(0.0, 0.0, None), body(30.0, 0.0, None)],
            springs: vec![Spring { tail: 0, head: 1 }],
        };
        sim.attract(0, &params(10.0, 30.0));

        // dist 30 over k 10: force 3, applied along (30, 0).
        assert_eq!((sim.bodies[0].dx, sim.bodies[0].dy), (90.0, 0.0));
        assert_eq!((sim.bodies[1].dx, sim.bodies[1].dy), (-90.0, 0.0));
    }

    #[test]
    fn distant_bodies_stay_in_their_own_cells() {
        let mut sim = Simulation {
            bodies: vec![
                body(0.0, 0.0, square(10.0)),
                body(1e12, 0.0, square(10.0)),
                body(1e12 + 5.0, 0.0, square(10.0)),
                body(1e300, -1e300, square(10.0)),
            ],
            springs: Vec::new(),
        };
        let mut grid = Grid::default();
        let mut rng = XorShift64Star::new(1);
        let stats = sim.step(&mut grid, &params(10.0, 30.0), 5.0, &mut rng);

        assert_eq!(stats.cells, 4);
        assert_eq!(stats.repulsions, 2, "only the pair sharing a cell interacts");
        assert_eq!((sim.bodies[0].x, sim.bodies[0].y), (0.0, 0.0));
        assert!(sim.bodies[1].x < 1e12 && sim.bodies[2].x > 1e12 + 5.0);
        assert!(sim.bodies.iter().all(|b| b.x.is_finite() && b.y.is_finite()));
    }
}
