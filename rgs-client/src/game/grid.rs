//! Cluster Grid
//!
//! 5 rows x 6 columns of symbols plus a parallel grid of spot multipliers.
//!
//! ## Tumble step
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  find_clusters   BFS, 4-connected, wild joins any regular   │
//! │  upgrade         x1 -> x2 on first win, then doubles (1024) │
//! │  remove          winning cells emptied, wilds reported      │
//! │  explode         each removed wild: 3x3 area x64 (1024)     │
//! │  gravity         columns compact downward                   │
//! │  fill            empties refilled top-left to bottom-right  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeSet, VecDeque};

use crate::core::money::PayoutMultiplier;
use crate::core::rng::ProvablyFairRng;
use crate::game::events::{CellChange, FillCell, Movement, Position};
use crate::game::symbols::{cluster_pay, draw_symbol, Symbol, MIN_CLUSTER_SIZE};

/// Grid rows.
pub const GRID_ROWS: usize = 5;

/// Grid columns.
pub const GRID_COLS: usize = 6;

/// Spot multiplier before any win.
pub const INITIAL_MULTIPLIER: u32 = 1;

/// Spot multiplier after the first win on a cell.
pub const SPOT_BASE_MULTIPLIER: u32 = 2;

/// Spot multiplier cap.
pub const MAX_SPOT_MULTIPLIER: u32 = 1024;

/// Factor applied by a wild explosion.
pub const WILD_EXPLOSION_FACTOR: u32 = 64;

/// Spot multipliers, row-major.
pub type MultiplierGrid = [[u32; GRID_COLS]; GRID_ROWS];

/// All spots at `value`.
pub fn uniform_multipliers(value: u32) -> MultiplierGrid {
    [[value; GRID_COLS]; GRID_ROWS]
}

const NEIGHBOURS_4: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

const NEIGHBOURS_8: [(isize, isize); 8] = [
    (-1, 0), (1, 0), (0, -1), (0, 1),
    (-1, -1), (-1, 1), (1, -1), (1, 1),
];

/// A paying cluster found on the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    /// Index within the round.
    pub id: u32,
    /// Representative symbol (first non-wild, else wild).
    pub symbol: Symbol,
    /// Cells, in BFS order.
    pub positions: Vec<Position>,
    /// Paytable entry.
    pub base_pay: PayoutMultiplier,
    /// Highest spot multiplier over the cluster.
    pub multiplier: u32,
}

impl Cluster {
    /// `base_pay * multiplier`.
    pub fn pay(&self) -> PayoutMultiplier {
        self.base_pay.scaled(self.multiplier as u64)
    }
}

/// Explosion produced by one removed wild.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Explosion {
    /// Wild cell.
    pub wild_position: Position,
    /// Changed cells (the wild first, then neighbours).
    pub cells: Vec<CellChange>,
}

impl Explosion {
    /// Largest resulting multiplier.
    pub fn max_new_multiplier(&self) -> u32 {
        self.cells.iter().map(|c| c.new_multiplier).max().unwrap_or(WILD_EXPLOSION_FACTOR)
    }
}

/// Working grid for one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    symbols: [[Option<Symbol>; GRID_COLS]; GRID_ROWS],
    multipliers: MultiplierGrid,
}

impl Grid {
    /// Grid from explicit rows with fresh multipliers.
    pub fn from_rows(rows: [[Symbol; GRID_COLS]; GRID_ROWS]) -> Self {
        Self {
            symbols: rows.map(|row| row.map(Some)),
            multipliers: uniform_multipliers(INITIAL_MULTIPLIER),
        }
    }

    /// Draw a full grid row by row.
    pub fn generate(rng: &mut ProvablyFairRng, cumulative: &[u64]) -> Self {
        let mut symbols = [[None; GRID_COLS]; GRID_ROWS];
        for row in symbols.iter_mut() {
            for cell in row.iter_mut() {
                *cell = Some(draw_symbol(rng, cumulative));
            }
        }
        Self { symbols, multipliers: uniform_multipliers(INITIAL_MULTIPLIER) }
    }

    /// Replace the spot multipliers.
    pub fn set_multipliers(&mut self, multipliers: MultiplierGrid) {
        self.multipliers = multipliers;
    }

    /// Current spot multipliers.
    pub fn multipliers(&self) -> &MultiplierGrid {
        &self.multipliers
    }

    /// Symbol at a cell.
    pub fn symbol(&self, (row, col): Position) -> Option<Symbol> {
        self.symbols.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Overwrite a cell.
    pub fn set_symbol(&mut self, (row, col): Position, symbol: Symbol) {
        if row < GRID_ROWS && col < GRID_COLS {
            self.symbols[row][col] = Some(symbol);
        }
    }

    /// Symbol rows; empty cells are skipped.
    pub fn symbol_rows(&self) -> Vec<Vec<Symbol>> {
        self.symbols
            .iter()
            .map(|row| row.iter().flatten().copied().collect())
            .collect()
    }

    /// Scatter cells, row-major.
    pub fn scatter_positions(&self) -> Vec<Position> {
        all_positions()
            .filter(|&pos| self.symbol(pos) == Some(Symbol::Scatter))
            .collect()
    }

    // =========================================================================
    // CLUSTERS
    // =========================================================================

    /// Find every paying cluster.
    ///
    /// Cells already claimed by a cluster never start another one, but a
    /// wild can still join a later cluster through BFS.
    pub fn find_clusters(&self) -> Vec<Cluster> {
        let mut claimed: BTreeSet<Position> = BTreeSet::new();
        let mut clusters = Vec::new();

        for start in all_positions() {
            if claimed.contains(&start) {
                continue;
            }
            let Some(symbol) = self.symbol(start) else {
                continue;
            };
            if symbol == Symbol::Scatter {
                claimed.insert(start);
                continue;
            }

            let positions = self.bfs(start, symbol, &mut claimed);
            if positions.len() >= MIN_CLUSTER_SIZE {
                let symbol = positions
                    .iter()
                    .filter_map(|&p| self.symbol(p))
                    .find(|s| *s != Symbol::Wild)
                    .unwrap_or(Symbol::Wild);
                let multiplier = positions
                    .iter()
                    .map(|&(r, c)| self.multipliers[r][c])
                    .max()
                    .unwrap_or(INITIAL_MULTIPLIER);
                clusters.push(Cluster {
                    id: clusters.len() as u32,
                    symbol,
                    base_pay: cluster_pay(symbol, positions.len()),
                    positions,
                    multiplier,
                });
            }
        }
        clusters
    }

    fn bfs(&self, start: Position, start_symbol: Symbol, claimed: &mut BTreeSet<Position>) -> Vec<Position> {
        let mut found = Vec::new();
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut target = start_symbol;

        while let Some(pos) = queue.pop_front() {
            let Some(cell) = self.symbol(pos) else {
                continue;
            };
            if !symbols_match(cell, target) {
                continue;
            }
            found.push(pos);
            claimed.insert(pos);
            if target == Symbol::Wild && cell != Symbol::Wild {
                target = cell;
            }

            for next in neighbours(pos, &NEIGHBOURS_4) {
                if seen.contains(&next) {
                    continue;
                }
                if let Some(neighbour) = self.symbol(next) {
                    if symbols_match(neighbour, target) {
                        seen.insert(next);
                        queue.push_back(next);
                    }
                }
            }
        }
        found
    }

    // =========================================================================
    // MULTIPLIERS
    // =========================================================================

    /// Upgrade the spot under every winning cell. Cells listed twice upgrade
    /// twice. Returns `(cell, new value)` for each change.
    pub fn upgrade_multipliers(&mut self, positions: &[Position]) -> Vec<(Position, u32)> {
        let mut upgrades = Vec::new();
        for &(row, col) in positions {
            let current = self.multipliers[row][col];
            let next = if current == INITIAL_MULTIPLIER {
                SPOT_BASE_MULTIPLIER
            } else {
                current.saturating_mul(2).min(MAX_SPOT_MULTIPLIER)
            };
            if next != current {
                self.multipliers[row][col] = next;
                upgrades.push(((row, col), next));
            }
        }
        upgrades
    }

    /// Empty the given cells. Returns the cells that held a wild.
    pub fn remove(&mut self, positions: &[Position]) -> Vec<Position> {
        let mut wilds = Vec::new();
        for &(row, col) in positions {
            if self.symbols[row][col] == Some(Symbol::Wild) {
                wilds.push((row, col));
            }
            self.symbols[row][col] = None;
        }
        wilds
    }

    /// Multiply the 3x3 area around each removed wild.
    pub fn explode_wilds(&mut self, wilds: &[Position]) -> Vec<Explosion> {
        wilds
            .iter()
            .map(|&wild| {
                let area = std::iter::once(wild).chain(neighbours(wild, &NEIGHBOURS_8));
                let cells = area
                    .map(|(row, col)| {
                        let old = self.multipliers[row][col];
                        let new = old.saturating_mul(WILD_EXPLOSION_FACTOR).min(MAX_SPOT_MULTIPLIER);
                        self.multipliers[row][col] = new;
                        CellChange { position: (row, col), old_multiplier: old, new_multiplier: new }
                    })
                    .collect();
                Explosion { wild_position: wild, cells }
            })
            .collect()
    }

    // =========================================================================
    // TUMBLE
    // =========================================================================

    /// Compact every column downward.
    pub fn apply_gravity(&mut self) -> Vec<Movement> {
        let mut movements = Vec::new();
        for col in 0..GRID_COLS {
            let mut write = GRID_ROWS;
            for row in (0..GRID_ROWS).rev() {
                let Some(symbol) = self.symbols[row][col] else {
                    continue;
                };
                write -= 1;
                if write != row {
                    self.symbols[write][col] = Some(symbol);
                    self.symbols[row][col] = None;
                    movements.push(Movement { from: (row, col), to: (write, col), symbol });
                }
            }
        }
        movements
    }

    /// Empty cells, row-major.
    pub fn empty_positions(&self) -> Vec<Position> {
        all_positions().filter(|&pos| self.symbol(pos).is_none()).collect()
    }

    /// Refill every empty cell.
    pub fn fill(&mut self, rng: &mut ProvablyFairRng, cumulative: &[u64]) -> Vec<FillCell> {
        self.empty_positions()
            .into_iter()
            .map(|(row, col)| {
                let symbol = draw_symbol(rng, cumulative);
                self.symbols[row][col] = Some(symbol);
                FillCell { position: (row, col), symbol }
            })
            .collect()
    }
}

fn symbols_match(a: Symbol, b: Symbol) -> bool {
    if a == b {
        return true;
    }
    if a == Symbol::Scatter || b == Symbol::Scatter {
        return false;
    }
    a == Symbol::Wild || b == Symbol::Wild
}

/// Every cell, row-major.
pub fn all_positions() -> impl Iterator<Item = Position> {
    (0..GRID_ROWS).flat_map(|row| (0..GRID_COLS).map(move |col| (row, col)))
}

fn neighbours((row, col): Position, offsets: &'static [(isize, isize)]) -> impl Iterator<Item = Position> {
    offsets.iter().filter_map(move |&(dr, dc)| {
        let r = row.checked_add_signed(dr)?;
        let c = col.checked_add_signed(dc)?;
        (r < GRID_ROWS && c < GRID_COLS).then_some((r, c))
    })
}

// =============================================================================
// TESTS
// =============================================================================
