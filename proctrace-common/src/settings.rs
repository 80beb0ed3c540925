/// Key into the probe's `SETTINGS` map holding the minimum process lifetime,
/// in nanoseconds, below which exit records are suppressed. Zero disables the
/// filter.
pub const SETTING_MIN_DURATION_NS: u32 = 0;
