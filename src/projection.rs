//! Spherical-Mercator tile projection.
//!
//! Pure coordinate math for the standard slippy-map tiling scheme: a
//! (latitude, longitude, zoom) triple maps to a tile address, and a
//! geographic bounding box enumerates to the rectangular grid of tile
//! addresses covering it across a zoom range. No I/O, no state.

use std::f64::consts::PI;

/// Kilometers per degree of latitude (and of longitude at the equator).
const KM_PER_DEGREE: f64 = 111.0;

/// Address of one map tile at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    /// The `z/x/y` string key used by the tile cache.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Project a point to its tile coordinates at the given zoom.
///
/// Latitude is not validated: the Mercator projection is only defined up
/// to roughly ±85.05°, and input outside that range yields undefined (but
/// non-panicking, saturating) coordinates. Callers keep latitudes in
/// range.
pub fn tile_for_point(lat: f64, lng: f64, zoom: u8) -> (u32, u32) {
    let n = 2f64.powi(zoom as i32);
    let x = ((lng + 180.0) / 360.0 * n).floor();
    let lat_rad = lat.to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();
    // Float-to-int casts saturate, so out-of-range input cannot panic.
    (x as u32, y as u32)
}

/// Enumerate every tile address covering the bounding box, for each zoom
/// level in the inclusive range.
///
/// Output order is deterministic: zoom-major, then x-ascending, then
/// y-ascending. Each zoom level is an independent addressable layer, so
/// the same (x, y) pair recurring across zooms is expected.
pub fn tiles_for_area(
    north: f64,
    south: f64,
    east: f64,
    west: f64,
    min_zoom: u8,
    max_zoom: u8,
) -> Vec<TileAddress> {
    let mut tiles = Vec::new();

    for z in min_zoom..=max_zoom {
        let (x_min, y_min) = tile_for_point(north, west, z);
        let (x_max, y_max) = tile_for_point(south, east, z);

        for x in x_min..=x_max {
            for y in y_min..=y_max {
                tiles.push(TileAddress { z, x, y });
            }
        }
    }

    tiles
}

/// Bounding box around a center point with the given radius.
///
/// The latitude delta is `radius / 111` (kilometers per degree); the
/// longitude delta is widened by `cos(lat)` to correct for meridian
/// convergence.
pub fn bounds_around_point(lat: f64, lng: f64, radius_km: f64) -> GeoBounds {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let lng_delta = radius_km / (KM_PER_DEGREE * lat.to_radians().cos());

    GeoBounds {
        north: lat + lat_delta,
        south: lat - lat_delta,
        east: lng + lng_delta,
        west: lng - lng_delta,
    }
}
