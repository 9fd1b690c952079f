//! Display formatting for exposure values
//!
//! These helpers produce the short labels used on chart axes and in the text
//! report, e.g. `"50 mm"`, `"1/250s"` or `"f/2.8"`.

/// Format a number without decimals when it is whole, otherwise with one
/// decimal place and any trailing `.0` left by rounding removed.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{:.0}", value);
    }

    let rounded = format!("{:.1}", value);
    rounded.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Label for a single exact focal length, e.g. `"50 mm"` or `"24.5 mm"`
pub fn format_focal_label(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0} mm", value)
    } else {
        format!("{:.1} mm", value)
    }
}

/// Format an exposure time in seconds the way cameras display it
pub fn format_shutter_speed(seconds: f64) -> String {
    if seconds <= 0.0 {
        return format!("{}s", format_value(seconds));
    }

    if seconds >= 1.0 {
        return if seconds.fract() == 0.0 {
            format!("{:.0}s", seconds)
        } else {
            format!("{:.1}s", seconds)
        };
    }

    let denominator = 1.0 / seconds;
    if (denominator - denominator.round()).abs() < 0.01 {
        format!("1/{:.0}s", denominator.round())
    } else {
        format!("{:.5}s", seconds)
    }
}

/// Format an f-number, e.g. `"f/2.8"`
pub fn format_aperture(f_number: f64) -> String {
    format!("f/{}", format_value(f_number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(50.0), "50");
        assert_eq!(format_value(10.5), "10.5");
        assert_eq!(format_value(10.04), "10");
        assert_eq!(format_value(10.96), "11");
        assert_eq!(format_value(100.0), "100");
        assert_eq!(format_value(-4.0), "-4");
    }

    #[test]
    fn test_format_focal_label() {
        assert_eq!(format_focal_label(50.0), "50 mm");
        assert_eq!(format_focal_label(24.5), "24.5 mm");
        assert_eq!(format_focal_label(10.04), "10.0 mm");
    }

    #[test]
    fn test_format_shutter_speed() {
        assert_eq!(format_shutter_speed(2.0), "2s");
        assert_eq!(format_shutter_speed(1.5), "1.5s");
        assert_eq!(format_shutter_speed(0.004), "1/250s");
        assert_eq!(format_shutter_speed(1.0 / 320.0), "1/320s");
        assert_eq!(format_shutter_speed(0.3), "0.30000s");
        assert_eq!(format_shutter_speed(0.0), "0s");
    }

    #[test]
    fn test_format_aperture() {
        assert_eq!(format_aperture(2.8), "f/2.8");
        assert_eq!(format_aperture(4.0), "f/4");
    }
}
