/// Format a solve time with millisecond resolution, e.g. `8.123` or `1:12.345`.
pub fn format_solve_ms(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    if minutes > 0 {
        format!("{}:{:02}.{:03}", minutes, seconds, millis)
    } else {
        format!("{}.{:03}", seconds, millis)
    }
}

/// Format the inspection readout: remaining time counts down in tenths,
/// overrun counts back up with a `+` prefix.
pub fn format_inspection(remaining_ms: u64, overrun_ms: u64) -> String {
    if overrun_ms > 0 {
        format!("+{:.1}", overrun_ms as f64 / 1_000.0)
    } else {
        format!("{:.1}", remaining_ms as f64 / 1_000.0)
    }
}

/// Format an optional aggregate time in hundredths, the usual resolution
/// for averages; `-` when the backend has no value.
pub fn format_stat_ms(ms: Option<u64>) -> String {
    match ms {
        Some(ms) => {
            let minutes = ms / 60_000;
            if minutes > 0 {
                format!(
                    "{}:{:02}.{:02}",
                    minutes,
                    (ms % 60_000) / 1_000,
                    (ms % 1_000) / 10
                )
            } else {
                format!("{}.{:02}", ms / 1_000, (ms % 1_000) / 10)
            }
        }
        None => "-".to_string(),
    }
}
