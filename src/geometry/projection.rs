use std::f64::consts::PI;

/// WebMercator constants
const R_MAJOR: f64 = 6378137.0;
const MAX_LAT: f64 = 85.05112877980659;
/// Half the width of the Web Mercator world, in metres.
pub const WORLD_HALF: f64 = 20037508.342789244;
pub const TILE_SIZE: f64 = 256.0;

/// lon/lat degrees → Web Mercator metres, latitude clamped to the valid band
pub fn lon_lat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT) * PI / 180.0;
    let x = lon * R_MAJOR * PI / 180.0;
    let y = R_MAJOR * ((PI / 4.0 + lat_rad / 2.0).tan().ln());
    (x, y)
}

/// Web Mercator metres → lon/lat degrees
pub fn mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = x / (R_MAJOR * PI / 180.0);
    let lat_rad = 2.0 * ((y / R_MAJOR).exp().atan()) - PI / 2.0;
    (lon, lat_rad * 180.0 / PI)
}

/// Metres per pixel at zoom 0.
pub fn base_resolution() -> f64 {
    2.0 * WORLD_HALF / TILE_SIZE
}

/// Fractional zoom level at which one pixel covers `resolution` metres.
pub fn zoom_for_resolution(resolution: f64) -> f64 {
    (base_resolution() / resolution).log2()
}

/// Bounds of XYZ tile (z, x, y) in Web Mercator.
/// https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames
pub fn tile_bounds(z: u8, x: u32, y: u32) -> (f64, f64, f64, f64) {
    let res = base_resolution() / 2f64.powi(z as i32);
    let minx = x as f64 * TILE_SIZE * res - WORLD_HALF;
    let maxx = (x as f64 + 1.0) * TILE_SIZE * res - WORLD_HALF;
    let maxy = WORLD_HALF - y as f64 * TILE_SIZE * res;
    let miny = WORLD_HALF - (y as f64 + 1.0) * TILE_SIZE * res;
    (minx, miny, maxx, maxy)
}

/// Union of the tiles at zoom `z` touching the given Web Mercator bbox.
///
/// Rows are always clamped to the world. Columns are clamped only when
/// `wrap_x` is off; otherwise a bbox crossing the antimeridian keeps the
/// columns of the neighbouring world copy.
pub fn covering_tile_bounds(
    z: u8,
    bbox: (f64, f64, f64, f64),
    wrap_x: bool,
) -> (f64, f64, f64, f64) {
    let n = 2u32.pow(z as u32);
    let span = 2.0 * WORLD_HALF / n as f64;
    let last = (n - 1) as f64;
    let col = |x: f64| {
        let c = ((x + WORLD_HALF) / span).floor();
        if wrap_x { c } else { c.clamp(0.0, last) }
    };
    let row = |y: f64| ((WORLD_HALF - y) / span).floor().clamp(0.0, last) as u32;

    let (minx, miny, maxx, maxy) = bbox;
    let (_, _, _, tmaxy) = tile_bounds(z, 0, row(maxy));
    let (_, tminy, _, _) = tile_bounds(z, 0, row(miny));
    (
        col(minx) * span - WORLD_HALF,
        tminy,
        (col(maxx) + 1.0) * span - WORLD_HALF,
        tmaxy,
    )
}
