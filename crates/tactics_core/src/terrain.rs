//! Terrain grid.
//!
//! The combat core only asks two things of the map: can a unit stand here,
//! and can light pass through here. [`Terrain`] is that seam; [`TileMap`] is
//! the grid the simulation owns.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::GridPos;

/// Queries the combat core makes about the map.
pub trait Terrain {
    /// Whether the position lies on the map.
    fn in_bounds(&self, pos: GridPos) -> bool;

    /// Whether terrain lets a unit stand on the cell. Ignores units.
    fn is_passable(&self, pos: GridPos) -> bool;

    /// Whether terrain lets sight through the cell. Used only for visibility.
    fn is_transparent(&self, pos: GridPos) -> bool;
}

/// Cell types of the tactical map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Open ground.
    #[default]
    Floor,
    /// Solid wall. Blocks movement, fire and sight.
    Wall,
    /// Window or force field. Blocks movement and fire but not sight.
    Glass,
    /// Corpse left where a unit died. Passable.
    Remains,
}

impl CellType {
    /// Returns true if units and projectiles can pass.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        matches!(self, Self::Floor | Self::Remains)
    }

    /// Returns true if sight passes.
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        !matches!(self, Self::Wall)
    }

    /// Map glyph for the cell.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Floor => '.',
            Self::Wall => '#',
            Self::Glass => '=',
            Self::Remains => '%',
        }
    }

    /// Parse a map glyph.
    #[must_use]
    pub const fn from_glyph(c: char) -> Option<Self> {
        match c {
            '.' => Some(Self::Floor),
            '#' => Some(Self::Wall),
            '=' => Some(Self::Glass),
            '%' => Some(Self::Remains),
            _ => None,
        }
    }
}

/// Rectangular grid of cells in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileMap {
    width: u32,
    height: u32,
    cells: Vec<CellType>,
}

impl TileMap {
    /// Create a map with every cell open.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "TileMap width must be positive");
        assert!(height > 0, "TileMap height must be positive");

        Self {
            width,
            height,
            cells: vec![CellType::Floor; (width as usize) * (height as usize)],
        }
    }

    /// Build a map from glyph rows (`.` floor, `#` wall, `=` glass, `%` remains).
    ///
    /// Letters and other symbols are read as floor so scenario files can mark
    /// spawn points inline.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().chars().count());
        if width == 0 || height == 0 {
            return Err(GameError::InvalidState("map has no cells".into()));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(GameError::InvalidState(format!(
                    "map row {y} has {} cells, expected {width}",
                    row.chars().count()
                )));
            }
            cells.extend(row.chars().map(|c| CellType::from_glyph(c).unwrap_or(CellType::Floor)));
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            cells,
        })
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, pos: GridPos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.y as usize) * (self.width as usize) + (pos.x as usize))
        } else {
            None
        }
    }

    /// Get cell type at a position. `None` if out of bounds.
    #[must_use]
    pub fn get(&self, pos: GridPos) -> Option<CellType> {
        self.index(pos).map(|i| self.cells[i])
    }

    /// Set cell type at a position. Returns `false` if out of bounds.
    pub fn set(&mut self, pos: GridPos, cell: CellType) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    /// Row strings for display and snapshots.
    #[must_use]
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|c| c.glyph()).collect())
            .collect()
    }
}

impl Terrain for TileMap {
    fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn is_passable(&self, pos: GridPos) -> bool {
        self.get(pos).is_some_and(CellType::is_passable)
    }

    fn is_transparent(&self, pos: GridPos) -> bool {
        self.get(pos).is_some_and(CellType::is_transparent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tilemap_creation() {
        let map = TileMap::new(10, 8);
        assert_eq!(map.width(), 10);
        assert_eq!(map.height(), 8);
        assert!(map.is_passable(GridPos::new(9, 7)));
        assert!(!map.is_passable(GridPos::new(10, 7)));
        assert!(!map.is_passable(GridPos::new(-1, 0)));
    }

    #[test]
    fn test_from_rows() {
        let map = TileMap::from_rows(&["#####", "#.=.#", "#####"]).unwrap();
        assert_eq!(map.width(), 5);
        assert_eq!(map.get(GridPos::new(2, 1)), Some(CellType::Glass));
        assert!(!map.is_passable(GridPos::new(2, 1)));
        assert!(map.is_transparent(GridPos::new(2, 1)));
        assert!(!map.is_transparent(GridPos::new(0, 0)));
        assert_eq!(map.rows()[1], "#.=.#");
    }

    #[test]
    fn test_from_rows_rejects_ragged_map() {
        assert!(TileMap::from_rows(&["...", ".."]).is_err());
        assert!(TileMap::from_rows::<&str>(&[]).is_err());
    }

    #[test]
    fn test_spawn_letters_read_as_floor() {
        let map = TileMap::from_rows(&["P.E"]).unwrap();
        assert!(map.is_passable(GridPos::new(0, 0)));
        assert!(map.is_passable(GridPos::new(2, 0)));
    }

    #[test]
    fn test_remains_are_passable() {
        let mut map = TileMap::new(3, 3);
        assert!(map.set(GridPos::new(1, 1), CellType::Remains));
        assert!(map.is_passable(GridPos::new(1, 1)));
        assert!(!map.set(GridPos::new(5, 5), CellType::Wall));
    }
}
