/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A deliberately minimal stand-in for the out-of-scope paint-pixel
//! kernels (spec.md §1). Canvas history and the preview layer both need
//! *some* way to turn a [`Dab`] into tile pixels so the rest of the engine
//! (batching, diffing, compositing) has real data to operate on; the
//! actual brush math belongs to an external collaborator and is not
//! modeled here beyond "paint a flat disc".

use paint_traits::{Dab, TILE_SIZE};

use crate::canvas_state::TileContent;
use crate::renderer::{Tile15, FULL_OPACITY_15};

/// Stamps a solid, fully-opaque disc of `color` for one dab into `tiles`,
/// creating any tile it touches that does not already exist.
pub fn stamp_dab(tiles: &mut TileContent, dab: &Dab, color: (u16, u16, u16)) {
    let radius = (dab.size.diameter() as f32) / 2.0;
    let min_x = (dab.x - radius).floor() as i64;
    let max_x = (dab.x + radius).ceil() as i64;
    let min_y = (dab.y - radius).floor() as i64;
    let max_y = (dab.y + radius).ceil() as i64;
    let tile_size = i64::from(TILE_SIZE);

    let min_tx = min_x.div_euclid(tile_size);
    let max_tx = max_x.div_euclid(tile_size);
    let min_ty = min_y.div_euclid(tile_size);
    let max_ty = max_y.div_euclid(tile_size);

    for ty in min_ty..=max_ty {
        for tx in min_tx..=max_tx {
            let Ok(tx) = u32::try_from(tx) else { continue };
            let Ok(ty) = u32::try_from(ty) else { continue };
            let tile = tile_mut(tiles, tx, ty);
            for local_y in 0..TILE_SIZE as i64 {
                for local_x in 0..TILE_SIZE as i64 {
                    let px = f64::from(tx) * f64::from(TILE_SIZE) + local_x as f64;
                    let py = f64::from(ty) * f64::from(TILE_SIZE) + local_y as f64;
                    let dx = px - f64::from(dab.x);
                    let dy = py - f64::from(dab.y);
                    if dx * dx + dy * dy <= f64::from(radius * radius) {
                        let i = (local_y as usize) * (TILE_SIZE as usize) + local_x as usize;
                        let o = i * 4;
                        tile.0[o] = color.0;
                        tile.0[o + 1] = color.1;
                        tile.0[o + 2] = color.2;
                        tile.0[o + 3] = FULL_OPACITY_15;
                    }
                }
            }
        }
    }
}

fn tile_mut(tiles: &mut TileContent, tx: u32, ty: u32) -> &mut Tile15 {
    tiles.entry((tx, ty)).or_insert_with(Tile15::transparent)
}
