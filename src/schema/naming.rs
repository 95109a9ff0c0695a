//! Field and type name normalization

/// Convert a camelCase identifier to snake_case.
///
/// An underscore goes in front of an uppercase letter that follows a
/// lowercase letter or digit, and in front of the last capital of an
/// acronym when a lowercase letter follows it (`ERSAssist` -> `ers_assist`).
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_ascii_lowercase());
            let after_word = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            let ends_acronym = next_is_lower && prev != '_';
            if after_word || ends_acronym {
                out.push('_');
            }
        }
        out.push(ch.to_ascii_lowercase());
    }

    out
}

/// Normalize a wire field name: `m_sector1TimeInMS` -> `sector1_time_in_ms`.
pub fn normalize_field_name(wire_name: &str) -> String {
    let snake = camel_to_snake(wire_name);
    match snake.strip_prefix("m_") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => snake,
    }
}

/// Convert snake_case to CamelCase: `car_motion_data` -> `CarMotionData`.
///
/// Each word is title-cased, so a letter following a digit is capitalized
/// too (`sector1time` -> `Sector1Time`).
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for word in name.split('_') {
        let mut prev_alpha = false;
        for ch in word.chars() {
            if prev_alpha {
                out.push(ch.to_ascii_lowercase());
            } else {
                out.push(ch.to_ascii_uppercase());
            }
            prev_alpha = ch.is_ascii_alphabetic();
        }
    }
    out
}
