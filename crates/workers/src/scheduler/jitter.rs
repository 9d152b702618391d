use std::time::Duration;

/// Stretches `base` by a random amount in `[0, base * fraction)` so jobs on
/// several replicas drift apart instead of firing together.
pub fn apply_jitter(base: Duration, fraction: f64) -> Duration {
    if fraction <= 0.0 {
        return base;
    }
    let extra = base.as_secs_f64() * fraction.min(1.0) * unit_random();
    base + Duration::from_secs_f64(extra)
}

/// Uniform in `[0, 1)` from the 53 high random bits of a v4 uuid.
fn unit_random() -> f64 {
    let bits = (uuid::Uuid::new_v4().as_u128() >> 75) as u64;
    bits as f64 / (1u64 << 53) as f64
}
