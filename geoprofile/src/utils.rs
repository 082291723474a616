//! Small numeric and text helpers shared by the column builder, the recode engine and the
//! comparative enhancer.

/// Round `value` to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// `num / denom` rounded to `precision` places. A zero denominator yields 0 for every numerator.
pub fn ratio(num: f64, denom: f64, precision: u32) -> f64 {
    if denom == 0.0 {
        return 0.0;
    }
    round_to(num / denom, precision)
}

/// `num` as a percentage of `denom`, rounded to 2 places. Denominators that are zero or negative
/// yield 0.
pub fn percent(num: f64, denom: f64) -> f64 {
    if denom <= 0.0 {
        return 0.0;
    }
    round_to(num / denom * 100.0, 2)
}

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turn a stored column name into a display name: `total_users` -> `Total users`.
pub fn humanize(name: &str) -> String {
    capitalize(&name.replace('_', " "))
}
