use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const GRID_SIZE: usize = 10;

// Fixed fleet: one carrier, one battleship, two cruisers, one destroyer.
pub const FLEET: [usize; 5] = [5, 4, 3, 3, 2];
pub const FLEET_CELLS: usize = 17;

// Single cell-state domain used everywhere (persisted form is the lowercase string)
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Empty,
    Ship,
    Hit,
    Miss,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

// Errors reported by grid operations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridError {
    OutOfBounds,
    Overlap,
    AlreadyTargeted,
    BadFleet,
}

// Result of a single shot: the new cell state and whether any ship cell remains
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shot {
    pub cell: Cell,
    pub all_sunk: bool,
}

// One player's 10x10 board
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Grid(pub [[Cell; GRID_SIZE]; GRID_SIZE]);

impl Default for Grid {
    fn default() -> Self {
        Grid::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Grid([[Cell::Empty; GRID_SIZE]; GRID_SIZE])
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.0[row][col]
    }

    // Footprint of a ship: `length` cells extending right (horizontal) or down (vertical)
    fn footprint(
        row: usize,
        col: usize,
        length: usize,
        orientation: Orientation,
    ) -> impl Iterator<Item = (usize, usize)> {
        (0..length).map(move |k| match orientation {
            Orientation::Horizontal => (row, col + k),
            Orientation::Vertical => (row + k, col),
        })
    }

    /// True iff every footprint cell is in bounds and currently empty.
    pub fn can_place(
        &self,
        row: usize,
        col: usize,
        length: usize,
        orientation: Orientation,
    ) -> bool {
        Self::footprint(row, col, length, orientation)
            .all(|(r, c)| r < GRID_SIZE && c < GRID_SIZE && self.0[r][c] == Cell::Empty)
    }

    /// Place a ship, all-or-nothing. Nothing is written unless the whole
    /// footprint is legal.
    pub fn place(
        &mut self,
        row: usize,
        col: usize,
        length: usize,
        orientation: Orientation,
    ) -> Result<(), GridError> {
        let in_bounds = match orientation {
            Orientation::Horizontal => row < GRID_SIZE && col + length <= GRID_SIZE,
            Orientation::Vertical => row + length <= GRID_SIZE && col < GRID_SIZE,
        };
        if !in_bounds {
            return Err(GridError::OutOfBounds);
        }
        if !self.can_place(row, col, length, orientation) {
            return Err(GridError::Overlap);
        }
        for (r, c) in Self::footprint(row, col, length, orientation) {
            self.0[r][c] = Cell::Ship;
        }
        Ok(())
    }

    /// Resolve a shot. Re-targeting a hit/miss cell is an error and leaves
    /// the grid untouched.
    pub fn fire(&mut self, row: usize, col: usize) -> Result<Shot, GridError> {
        if row >= GRID_SIZE || col >= GRID_SIZE {
            return Err(GridError::OutOfBounds);
        }
        let cell = match self.0[row][col] {
            Cell::Hit | Cell::Miss => return Err(GridError::AlreadyTargeted),
            Cell::Ship => Cell::Hit,
            Cell::Empty => Cell::Miss,
        };
        self.0[row][col] = cell;
        Ok(Shot {
            cell,
            all_sunk: self.all_sunk(),
        })
    }

    /// True when no ship cell remains.
    pub fn all_sunk(&self) -> bool {
        self.0
            .iter()
            .all(|row| row.iter().all(|&c| c != Cell::Ship))
    }

    /// True once any cell has been targeted. Used to lock ship placement
    /// after the shooting phase has started.
    pub fn under_attack(&self) -> bool {
        self.0
            .iter()
            .any(|row| row.iter().any(|&c| c == Cell::Hit || c == Cell::Miss))
    }

    /// Validate a submitted placement grid: only empty/ship cells, and the
    /// ship cells must be exactly coverable by straight runs with the
    /// fixed fleet's lengths. Touching ships are legal, so every layout
    /// `place` accepts passes; a bare cell count is not enough, and shapes
    /// no arrangement of the fleet can form are rejected.
    pub fn validate_fleet(&self) -> Result<(), GridError> {
        for row in self.0.iter() {
            if row.iter().any(|&c| c == Cell::Hit || c == Cell::Miss) {
                return Err(GridError::BadFleet);
            }
        }

        let ship_cells = self
            .0
            .iter()
            .flatten()
            .filter(|&&c| c == Cell::Ship)
            .count();
        if ship_cells != FLEET_CELLS {
            return Err(GridError::BadFleet);
        }

        let mut covered = [[false; GRID_SIZE]; GRID_SIZE];
        let mut remaining = FLEET.to_vec();
        if self.cover_ships(&mut covered, &mut remaining) {
            Ok(())
        } else {
            Err(GridError::BadFleet)
        }
    }

    // Backtracking exact cover of the ship cells. The first uncovered ship
    // cell in scan order must be the top or left end of some remaining
    // ship, so only runs starting there need to be tried, in both
    // orientations.
    fn cover_ships(
        &self,
        covered: &mut [[bool; GRID_SIZE]; GRID_SIZE],
        remaining: &mut Vec<usize>,
    ) -> bool {
        let first = (0..GRID_SIZE)
            .flat_map(|r| (0..GRID_SIZE).map(move |c| (r, c)))
            .find(|&(r, c)| self.0[r][c] == Cell::Ship && !covered[r][c]);
        let (row, col) = match first {
            Some(cell) => cell,
            None => return remaining.is_empty(),
        };

        let mut tried: Vec<usize> = Vec::new();
        for i in 0..remaining.len() {
            let length = remaining[i];
            if tried.contains(&length) {
                continue;
            }
            tried.push(length);
            for orientation in [Orientation::Horizontal, Orientation::Vertical] {
                let run: Vec<(usize, usize)> =
                    Self::footprint(row, col, length, orientation).collect();
                let fits = run.iter().all(|&(r, c)| {
                    r < GRID_SIZE && c < GRID_SIZE && self.0[r][c] == Cell::Ship && !covered[r][c]
                });
                if !fits {
                    continue;
                }
                for &(r, c) in &run {
                    covered[r][c] = true;
                }
                remaining.remove(i);
                if self.cover_ships(covered, remaining) {
                    return true;
                }
                remaining.insert(i, length);
                for &(r, c) in &run {
                    covered[r][c] = false;
                }
            }
        }
        false
    }

    /// Place the whole fleet at random legal positions. Used for the AI
    /// opponent's board in solo games.
    pub fn random_fleet<R: Rng + ?Sized>(rng: &mut R) -> Grid {
        let mut grid = Grid::new();
        for &length in FLEET.iter() {
            loop {
                let orientation = if rng.gen_bool(0.5) {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };
                let row = rng.gen_range(0..GRID_SIZE);
                let col = rng.gen_range(0..GRID_SIZE);
                if grid.place(row, col, length, orientation).is_ok() {
                    break;
                }
            }
        }
        grid
    }

    /// Pick a uniformly random cell that has not been targeted yet.
    pub fn random_untargeted<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(usize, usize)> {
        let open: Vec<(usize, usize)> = (0..GRID_SIZE)
            .flat_map(|r| (0..GRID_SIZE).map(move |c| (r, c)))
            .filter(|&(r, c)| matches!(self.0[r][c], Cell::Empty | Cell::Ship))
            .collect();
        open.choose(rng).copied()
    }
}
