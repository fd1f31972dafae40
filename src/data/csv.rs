//! Minimal delimited-text helpers shared by the loader and the exporters.
//!
//! Fields may be wrapped in double quotes; a doubled quote inside a quoted field
//! is a literal quote. Records never span lines.

/// Split one CSV line into fields.
///
/// Returns `None` when a quoted field is left unterminated.
pub fn split_line(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}

/// Quote a field when it contains a delimiter, quote, or line break.
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Join fields into one CSV line (without the trailing newline).
pub fn join_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|field| escape_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_fields_with_commas_and_quotes() {
        let fields = split_line(r#"a,"Bank transfer, (automatic)","say ""hi""",,z"#).unwrap();
        assert_eq!(
            fields,
            vec!["a", "Bank transfer, (automatic)", r#"say "hi""#, "", "z"]
        );
    }

    #[test]
    fn rejects_unterminated_quote() {
        assert!(split_line(r#"a,"open"#).is_none());
    }

    #[test]
    fn escaped_line_splits_back_to_the_same_fields() {
        let fields = ["plain", "with,comma", "with \"quote\""];
        let line = join_fields(fields);
        assert_eq!(split_line(&line).unwrap(), fields);
    }
}
