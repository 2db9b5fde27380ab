//! Pure coordinate and projection helpers.
//!
//! Web Mercator tile math shared by the viewport controller and the
//! renderer, plus small decoding utilities used by style handling. Functions
//! here are pure and hold no state.

/// Mean earth circumference at the equator in meters (WGS84).
const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

/// Fractional tile-space X coordinate for a longitude at a zoom level.
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> f64 {
    let n = 2_f64.powi(zoom as i32);
    (lon + 180.0) / 360.0 * n
}

/// Fractional tile-space Y coordinate for a latitude at a zoom level.
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let n = 2_f64.powi(zoom as i32);
    let lat_rad = lat.to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * n
}

/// Integer tile column/row containing a lat/lon position.
pub fn lat_lon_to_tile(lat: f64, lon: f64, zoom: u8) -> (u32, u32) {
    let max = (1u32 << zoom) - 1;
    let x = lon_to_tile_x(lon, zoom).floor().clamp(0.0, max as f64) as u32;
    let y = lat_to_tile_y(lat, zoom).floor().clamp(0.0, max as f64) as u32;
    (x, y)
}

/// Longitude of a fractional tile-space X coordinate.
pub fn tile_x_to_lon(x: f64, zoom: u8) -> f64 {
    let n = 2_f64.powi(zoom as i32);
    x / n * 360.0 - 180.0
}

/// Latitude of a fractional tile-space Y coordinate.
pub fn tile_y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = 2_f64.powi(zoom as i32);
    let lat_rad = ((1.0 - 2.0 * y / n) * std::f64::consts::PI).sinh().atan();
    lat_rad.to_degrees()
}

/// Ground resolution in meters per pixel at a latitude, assuming 256-pixel
/// tiles.
pub fn meters_per_pixel(zoom: u8, lat: f64) -> f64 {
    EARTH_CIRCUMFERENCE_M * lat.to_radians().cos() / 2_f64.powi(zoom as i32 + 8)
}

/// Wrap a longitude into the [-180, 180) range.
pub fn wrap_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Decode a `#rrggbb` or `#rgb` hex color into an RGB triple.
///
/// The leading `#` is optional. Returns `None` for malformed input.
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
            Some((r * 17, g * 17, b * 17))
        }
        _ => None,
    }
}
