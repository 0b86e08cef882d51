//! Shadow Atlas Packing
//!
//! Splits a square atlas into a power-of-two grid of equally sized tiles
//! and maps tile indices to viewport rectangles. Tiles are laid out row
//! by row, so tile `i` of a `split`-wide grid sits at column
//! `i % split`, row `i / split`.

use serde::{Deserialize, Serialize};
use umbra_math::Vec2;

/// Pixel rectangle inside an atlas
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Placement of one tile: grid offset (in tiles) and pixel rectangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileViewport {
    /// Column and row of the tile within the grid
    pub offset: Vec2,
    /// Pixel rectangle to rasterize into
    pub rect: TileRect,
}

/// Grid width for `tile_count` tiles: 1, 2 or 4
///
/// Counts above 16 cannot occur, the reservation ledger caps them.
pub fn choose_split(tile_count: usize) -> u32 {
    debug_assert!(tile_count <= 16, "tile count {} exceeds atlas grid", tile_count);
    match tile_count {
        0..=1 => 1,
        2..=4 => 2,
        _ => 4,
    }
}

/// Tile side length for an atlas split `split` ways
pub fn tile_size(atlas_dimension: u32, split: u32) -> u32 {
    atlas_dimension / split
}

/// Grid offset and pixel rectangle for tile `index`
pub fn viewport_for(index: usize, split: u32, tile_size: u32) -> TileViewport {
    let split = split as usize;
    let column = (index % split) as u32;
    let row = (index / split) as u32;

    TileViewport {
        offset: Vec2::new(column as f32, row as f32),
        rect: TileRect {
            x: column * tile_size,
            y: row * tile_size,
            width: tile_size,
            height: tile_size,
        },
    }
}

/// Tile layout of one atlas for the current frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasLayout {
    /// Atlas side length in texels
    pub dimension: u32,
    /// Tiles per row and column
    pub split: u32,
    /// Tile side length in texels
    pub tile_size: u32,
}

impl AtlasLayout {
    /// Lay out `tile_count` tiles in an atlas of `dimension` texels
    pub fn new(dimension: u32, tile_count: usize) -> Self {
        let split = choose_split(tile_count);
        Self {
            dimension,
            split,
            tile_size: tile_size(dimension, split),
        }
    }

    /// Fraction of the atlas covered by one tile along each axis
    pub fn tile_scale(&self) -> f32 {
        1.0 / self.split as f32
    }

    /// Number of tiles the grid can hold
    pub fn capacity(&self) -> usize {
        (self.split * self.split) as usize
    }

    pub fn viewport(&self, index: usize) -> TileViewport {
        debug_assert!(
            index < self.capacity(),
            "tile {} outside {}x{} grid",
            index,
            self.split,
            self.split
        );
        viewport_for(index, self.split, self.tile_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_split_tiers() {
        for count in 0..=1 {
            assert_eq!(choose_split(count), 1);
        }
        for count in 2..=4 {
            assert_eq!(choose_split(count), 2);
        }
        for count in 5..=16 {
            assert_eq!(choose_split(count), 4);
        }
    }

    #[test]
    fn test_tile_size() {
        assert_eq!(tile_size(1024, 2), 512);
        assert_eq!(tile_size(2048, 4), 512);
        assert_eq!(tile_size(1, 1), 1);
    }

    #[test]
    fn test_viewport_for() {
        let viewport = viewport_for(3, 2, 512);
        assert_eq!(viewport.offset, Vec2::new(1.0, 1.0));
        assert_eq!(
            viewport.rect,
            TileRect { x: 512, y: 512, width: 512, height: 512 }
        );

        let viewport = viewport_for(6, 4, 256);
        assert_eq!(viewport.offset, Vec2::new(2.0, 1.0));
        assert_eq!(viewport.rect.x, 512);
        assert_eq!(viewport.rect.y, 256);
    }

    #[test]
    fn test_layout_tiles_do_not_overlap() {
        let layout = AtlasLayout::new(1024, 13);
        assert_eq!(layout.split, 4);
        assert_eq!(layout.tile_size, 256);
        assert_eq!(layout.tile_scale(), 0.25);

        let rects: Vec<_> = (0..layout.capacity()).map(|i| layout.viewport(i).rect).collect();
        for (i, a) in rects.iter().enumerate() {
            assert!(a.x + a.width <= 1024 && a.y + a.height <= 1024);
            for b in &rects[i + 1..] {
                let disjoint = a.x + a.width <= b.x
                    || b.x + b.width <= a.x
                    || a.y + a.height <= b.y
                    || b.y + b.height <= a.y;
                assert!(disjoint);
            }
        }
    }
}
