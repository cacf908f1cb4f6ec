//! Z-factor lookup for gravimetric volume conversion
//!
//! The Z-factor converts the mass (mg) of dispensed distilled water into a
//! volume (µL) at a given ambient temperature, at standard atmospheric
//! pressure. Values are tabulated every 0.5 °C between 15.0 °C and 30.0 °C.

/// Lowest tabulated temperature (°C)
pub const MIN_TEMPERATURE_C: f64 = 15.0;

/// Highest tabulated temperature (°C)
pub const MAX_TEMPERATURE_C: f64 = 30.0;

/// Temperature grid step (°C)
pub const TEMPERATURE_STEP_C: f64 = 0.5;

/// Temperature used when a lookup misses the table
pub const FALLBACK_TEMPERATURE_C: f64 = 20.0;

/// Z-factor at the fallback temperature
pub const FALLBACK_Z_FACTOR: f64 = 1.0029;

/// Decimal places used when a Z-factor is shown on a certificate
pub const Z_FACTOR_DISPLAY_PLACES: u32 = 4;

/// (temperature °C, Z-factor µL/mg) at 1013 hPa
pub const Z_FACTOR_TABLE: [(f64, f64); 31] = [
    (15.0, 1.0020),
    (15.5, 1.0020),
    (16.0, 1.0021),
    (16.5, 1.0022),
    (17.0, 1.0023),
    (17.5, 1.0024),
    (18.0, 1.0025),
    (18.5, 1.0026),
    (19.0, 1.0027),
    (19.5, 1.0028),
    (20.0, 1.0029),
    (20.5, 1.0030),
    (21.0, 1.0031),
    (21.5, 1.0032),
    (22.0, 1.0033),
    (22.5, 1.0034),
    (23.0, 1.0035),
    (23.5, 1.0036),
    (24.0, 1.0038),
    (24.5, 1.0039),
    (25.0, 1.0040),
    (25.5, 1.0041),
    (26.0, 1.0043),
    (26.5, 1.0044),
    (27.0, 1.0045),
    (27.5, 1.0047),
    (28.0, 1.0048),
    (28.5, 1.0050),
    (29.0, 1.0051),
    (29.5, 1.0052),
    (30.0, 1.0054),
];

/// Snap a temperature to the 0.5 °C grid and clamp it to the table range
///
/// NaN stays NaN; the lookup treats it as a miss.
pub fn snap_temperature(temperature_celsius: f64) -> f64 {
    let snapped = (temperature_celsius / TEMPERATURE_STEP_C).round() * TEMPERATURE_STEP_C;
    snapped.clamp(MIN_TEMPERATURE_C, MAX_TEMPERATURE_C)
}

/// Resolve the Z-factor for an ambient temperature
///
/// The temperature is snapped to the nearest 0.5 °C and clamped to
/// [15.0, 30.0] before lookup. Any miss falls back to the 20.0 °C entry.
///
/// # Examples
///
/// ```
/// use calcert_common::zfactor::resolve_z_factor;
///
/// assert_eq!(resolve_z_factor(20.0), 1.0029);
/// assert_eq!(resolve_z_factor(26.1), 1.0043);
/// assert_eq!(resolve_z_factor(40.0), 1.0054);
/// ```
pub fn resolve_z_factor(temperature_celsius: f64) -> f64 {
    let snapped = snap_temperature(temperature_celsius);

    // Grid values are exact multiples of 0.5, so equality is safe here
    Z_FACTOR_TABLE
        .iter()
        .find(|(t, _)| *t == snapped)
        .map(|(_, z)| *z)
        .unwrap_or(FALLBACK_Z_FACTOR)
}

/// Round a Z-factor for display (4 decimal places)
pub fn display_z_factor(z_factor: f64) -> f64 {
    crate::statistics::round_to(z_factor, Z_FACTOR_DISPLAY_PLACES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_temperature() {
        assert_eq!(resolve_z_factor(20.0), 1.0029);
        assert_eq!(resolve_z_factor(FALLBACK_TEMPERATURE_C), FALLBACK_Z_FACTOR);
    }

    #[test]
    fn test_every_grid_point_matches_table() {
        for (temperature, z) in Z_FACTOR_TABLE.iter() {
            assert_eq!(
                resolve_z_factor(*temperature),
                *z,
                "Z-factor mismatch at {} °C",
                temperature
            );
        }
    }

    #[test]
    fn test_table_is_monotonic_and_evenly_spaced() {
        for pair in Z_FACTOR_TABLE.windows(2) {
            assert_eq!(pair[1].0 - pair[0].0, TEMPERATURE_STEP_C);
            assert!(pair[1].1 >= pair[0].1, "table decreases at {} °C", pair[1].0);
        }
        assert_eq!(Z_FACTOR_TABLE[0].0, MIN_TEMPERATURE_C);
        assert_eq!(Z_FACTOR_TABLE[30].0, MAX_TEMPERATURE_C);
    }

    #[test]
    fn test_snaps_to_nearest_half_degree() {
        assert_eq!(snap_temperature(22.2), 22.0);
        assert_eq!(snap_temperature(22.3), 22.5);
        assert_eq!(snap_temperature(22.74), 22.5);
        assert_eq!(resolve_z_factor(22.3), 1.0034);
    }

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(resolve_z_factor(-5.0), 1.0020);
        assert_eq!(resolve_z_factor(14.6), 1.0020);
        assert_eq!(resolve_z_factor(31.0), 1.0054);
    }

    #[test]
    fn test_nan_falls_back_to_reference() {
        assert_eq!(resolve_z_factor(f64::NAN), FALLBACK_Z_FACTOR);
    }

    #[test]
    fn test_display_rounding() {
        assert_eq!(display_z_factor(1.00432), 1.0043);
        assert_eq!(display_z_factor(1.0029), 1.0029);
    }
}
