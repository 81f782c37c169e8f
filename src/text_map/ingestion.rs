/// Cleans freshly extracted text before it reaches the display pipeline.
///
/// Runs of horizontal whitespace (tabs included) become a single space,
/// every line is trimmed, and any run of blank lines shrinks to one blank
/// line so paragraph breaks survive as exactly two line breaks. Leading and
/// trailing blank lines are dropped. Applying it twice changes nothing.
pub fn normalize(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut paragraph_break = false;

    for line in raw.lines() {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            paragraph_break = !cleaned.is_empty();
            continue;
        }

        if !cleaned.is_empty() {
            cleaned.push('\n');
            if paragraph_break {
                cleaned.push('\n');
            }
        }
        paragraph_break = false;
        cleaned.push_str(&words.join(" "));
    }

    cleaned
}
