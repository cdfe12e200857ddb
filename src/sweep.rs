/// Milliseconds for one full indicator revolution at speed multiplier 1.0.
pub const BASE_PERIOD_MS: f64 = 1800.0;

/// Milliseconds for one full revolution at the given speed multiplier.
pub fn period_ms(speed_multiplier: f64) -> f64 {
    BASE_PERIOD_MS / speed_multiplier
}

/// Indicator position in degrees after `elapsed_ms` of rotation.
///
/// Pure sampling function: the caller owns the stage-entry timestamp and
/// polls this on every frame. Always returns a value in `[0, 360)`.
pub fn angle_at(elapsed_ms: f64, speed_multiplier: f64) -> f64 {
    let turns = elapsed_ms / period_ms(speed_multiplier);
    turns.fract() * 360.0
}

/// True once a full revolution has elapsed without the stage being resolved.
pub fn timed_out(elapsed_ms: f64, speed_multiplier: f64) -> bool {
    elapsed_ms >= period_ms(speed_multiplier)
}

/// Normalize an angle into `[0, 360)`.
pub fn normalize_deg(angle_deg: f64) -> f64 {
    angle_deg.rem_euclid(360.0)
}

/// Membership in the half-open arc `[start, start + width)`, wrapping at 360.
pub fn arc_contains(angle_deg: f64, start_deg: f64, width_deg: f64) -> bool {
    (angle_deg - start_deg).rem_euclid(360.0) < width_deg
}
