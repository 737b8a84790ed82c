//! ISO-8601 durations (`P3D`, `PT1H30M`, `P1DT0.5S`).
//!
//! Cleanup delays travel as text: in table parameters, in config files and in
//! the serialized store. Only the day/time designators are supported; calendar
//! units (years, months, weeks) have no fixed length and are rejected.

use chrono::Duration;

/// Parses an ISO-8601 duration of the form `P[nD][T[nH][nM][n[.f]S]]`.
///
/// Designators are case-insensitive and must appear in order, each at most
/// once. Returns `None` for anything else, including signs, empty values and
/// a bare `P` or `PT`.
pub fn parse_iso8601_duration(value: &str) -> Option<Duration> {
    let value = value.trim().to_ascii_uppercase();
    let rest = value.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let (date_part, time_part) = match rest.split_once('T') {
        Some((_, "")) => return None,
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut total = Duration::zero();

    for (number, unit) in components(date_part)? {
        match unit {
            'D' => total = total.checked_add(&Duration::try_days(whole(number)?)?)?,
            _ => return None,
        }
    }

    if let Some(time_part) = time_part {
        // H, M, S in that order, each at most once.
        let mut last_rank = 0;
        for (number, unit) in components(time_part)? {
            let rank = match unit {
                'H' => 1,
                'M' => 2,
                'S' => 3,
                _ => return None,
            };
            if rank <= last_rank {
                return None;
            }
            last_rank = rank;

            let part = match unit {
                'H' => Duration::try_hours(whole(number)?)?,
                'M' => Duration::try_minutes(whole(number)?)?,
                _ => seconds(number)?,
            };
            total = total.checked_add(&part)?;
        }
    }

    Some(total)
}

/// Renders a duration in the form accepted by [`parse_iso8601_duration`].
///
/// Negative durations are rendered as their absolute value with a leading
/// `-`, which the parser deliberately does not accept back.
pub fn format_iso8601_duration(duration: Duration) -> String {
    if duration < Duration::zero() {
        return format!("-{}", format_iso8601_duration(-duration));
    }
    if duration.is_zero() {
        return "PT0S".to_string();
    }

    let days = duration.num_days();
    let rem = duration - Duration::days(days);
    let hours = rem.num_hours();
    let rem = rem - Duration::hours(hours);
    let minutes = rem.num_minutes();
    let rem = rem - Duration::minutes(minutes);
    let secs = rem.num_seconds();
    let nanos = (rem - Duration::seconds(secs)).subsec_nanos();

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || secs > 0 || nanos > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if nanos > 0 {
            let fraction = format!("{nanos:09}");
            out.push_str(&format!("{secs}.{}S", fraction.trim_end_matches('0')));
        } else if secs > 0 {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

/// Splits `12D` / `1H30M` style text into `(number, designator)` pairs.
fn components(part: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (idx, ch) in part.char_indices() {
        if ch.is_ascii_digit() || ch == '.' {
            continue;
        }
        if idx == start {
            return None;
        }
        out.push((&part[start..idx], ch));
        start = idx + ch.len_utf8();
    }
    if start != part.len() {
        return None;
    }
    Some(out)
}

fn whole(number: &str) -> Option<i64> {
    if number.contains('.') {
        return None;
    }
    number.parse().ok()
}

fn seconds(number: &str) -> Option<Duration> {
    let (secs, fraction) = match number.split_once('.') {
        Some((secs, fraction)) => (secs, fraction),
        None => (number, ""),
    };
    if secs.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if number.contains('.') && fraction.is_empty() {
        return None;
    }

    let whole_secs = Duration::try_seconds(whole(secs)?)?;
    let nanos = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse::<i64>().ok()?
    };
    whole_secs.checked_add(&Duration::nanoseconds(nanos))
}
