//! Display names and artifact file stems

/// Capitalise the first letter of every alphabetic run, lower-case the rest
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(c);
            previous_is_letter = false;
        }
    }
    result
}

/// Human name of a results directory such as `simple_calendar_12`.
///
/// Drops everything from the last `_`, turns the remaining `_` into spaces
/// and title-cases the result ("Simple Calendar").
pub fn app_display_name(directory: &str) -> String {
    let stem = directory
        .rfind('_')
        .map_or(directory, |index| &directory[..index]);
    title_case(&stem.replace('_', " "))
}

/// File stem for downloaded artifacts: `<lower-case name>_<versionCode>`
pub fn artifact_stem(name: &str, version_code: Option<i64>) -> String {
    let version = version_code.map_or_else(|| "unknown".to_string(), |v| v.to_string());
    format!("{}_{}", name.to_lowercase().replace(' ', "_"), version)
}
