/// Formats a count with an SI suffix: `950`, `12.3K`, `4.51B`.
pub fn human_count(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    let units = ["", "K", "M", "B", "T"];
    let sign = if n < 0.0 { "-" } else { "" };
    let mut v = n.abs();
    let mut u = 0;
    // Promote on the rounded value so 999_999 prints as 1.00M, not 1000K.
    while u < units.len() - 1 && round_to(v, precision(v, u)) >= 1000.0 {
        v /= 1000.0;
        u += 1;
    }
    if u == 0 {
        return format!("{sign}{}", v.round());
    }
    let digits = precision(v, u);
    format!("{sign}{v:.digits$}{}", units[u])
}

fn precision(v: f64, unit: usize) -> usize {
    if unit == 0 || v >= 100.0 {
        0
    } else if v >= 10.0 {
        1
    } else {
        2
    }
}

fn round_to(v: f64, digits: usize) -> f64 {
    let f = 10f64.powi(digits as i32);
    (v * f).round() / f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes() {
        assert_eq!(human_count(0.0), "0");
        assert_eq!(human_count(950.4), "950");
        assert_eq!(human_count(12_345.0), "12.3K");
        assert_eq!(human_count(4_510_000_000.0), "4.51B");
        assert_eq!(human_count(-2_000_000.0), "-2.00M");
        assert_eq!(human_count(7.2e15), "7200T");
    }

    #[test]
    fn rounding_up_promotes_the_unit() {
        assert_eq!(human_count(999_999.0), "1.00M");
        assert_eq!(human_count(999.6), "1.00K");
        assert_eq!(human_count(999_499.0), "999K");
        assert_eq!(human_count(-999_999_999.0), "-1.00B");
    }
}
