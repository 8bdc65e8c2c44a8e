#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// `?`
    Positional,
    /// `#{name}`
    Named(String),
}

/// Splits SQL into text and placeholder segments.
///
/// Quoted text (`'...'`, `"..."`, `` `...` ``) is copied verbatim, so a `?` or
/// `#{` inside a literal is never bound. Doubled quotes inside a literal
/// toggle the state twice and need no special handling.
pub fn parse_statement(sql: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut quote: Option<char> = None;
    let mut pos = 0;

    while pos < sql.len() {
        let remaining = &sql[pos..];
        let Some(c) = remaining.chars().next() else {
            break;
        };

        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            append_text(&mut segments, &remaining[..c.len_utf8()]);
            pos += c.len_utf8();
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                append_text(&mut segments, &remaining[..1]);
                pos += 1;
            }
            '?' => {
                segments.push(Segment::Positional);
                pos += 1;
            }
            '#' if remaining.starts_with("#{") => match remaining.find('}') {
                Some(end) if !remaining[2..end].trim().is_empty() => {
                    segments.push(Segment::Named(remaining[2..end].trim().to_string()));
                    pos += end + 1;
                }
                _ => {
                    append_text(&mut segments, "#");
                    pos += 1;
                }
            },
            _ => {
                let next_stop = remaining
                    .find(['\'', '"', '`', '?', '#'])
                    .unwrap_or(remaining.len());
                let len = next_stop.max(c.len_utf8());
                append_text(&mut segments, &remaining[..len]);
                pos += len;
            }
        }
    }

    segments
}

/// Splits a script on `;` terminators.
///
/// Semicolons inside quotes or `--` line comments do not end a statement.
/// Blank statements are skipped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    let mut start = 0;
    let mut chars = script.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if in_comment {
            in_comment = c != '\n';
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '-' if chars.peek().is_some_and(|&(_, next)| next == '-') => in_comment = true,
            ';' => {
                push_statement(&mut statements, &script[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_statement(&mut statements, &script[start..]);
    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        statements.push(text.to_string());
    }
}

fn append_text(segments: &mut Vec<Segment>, text: &str) {
    if let Some(Segment::Text(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_string()));
    }
}
