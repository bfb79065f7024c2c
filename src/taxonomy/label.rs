const PATH_SEPARATOR: &str = " - ";

/// Text before the first `" - "` of a classification path.
pub fn top_segment(path: &str) -> &str {
    path.split(PATH_SEPARATOR).next().unwrap_or(path)
}

/// Single display label for a classification path.
///
/// `"Volt-related"` and `"Volt-related - DominantVoltPeaks"` both show the
/// top-level segment, while `"Volt-related - DominantVoltPeaks-Strong"` shows
/// `"DominantVoltPeaks"`, the parent half of the second segment.
pub fn display_label(path: &str) -> String {
    let raw = path.trim();
    if raw.is_empty() {
        return String::new();
    }

    let parts = raw.split(PATH_SEPARATOR).map(str::trim).collect::<Vec<_>>();
    let top = match parts.first() {
        Some(first) if !first.is_empty() => *first,
        _ => raw,
    };

    let Some(child) = parts.get(1) else {
        return top.to_owned();
    };

    let sub = child.split('-').map(str::trim).collect::<Vec<_>>();
    if sub.len() >= 2 {
        sub[0].to_owned()
    } else {
        top.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_is_returned_unchanged() {
        assert_eq!(display_label("Volt-related"), "Volt-related");
        assert_eq!(display_label("  Temp-related  "), "Temp-related");
    }

    #[test]
    fn two_segments_without_sub_path_show_top_level() {
        assert_eq!(
            display_label("Volt-related - DominantVoltPeaks"),
            "Volt-related"
        );
    }

    #[test]
    fn two_segments_with_sub_path_show_parent_of_second() {
        assert_eq!(
            display_label("Volt-related - DominantVoltPeaks-StrongDominantPeaks"),
            "DominantVoltPeaks"
        );
    }

    #[test]
    fn blank_input_gives_empty_label() {
        assert_eq!(display_label(""), "");
        assert_eq!(display_label("   "), "");
    }

    #[test]
    fn only_the_second_segment_is_inspected() {
        assert_eq!(display_label("A - B - C-D"), "A");
    }

    #[test]
    fn top_segment_stops_at_first_separator() {
        assert_eq!(top_segment("Temp-related - X - Y"), "Temp-related");
        assert_eq!(top_segment("Temp-related"), "Temp-related");
        assert_eq!(top_segment(""), "");
    }
}
