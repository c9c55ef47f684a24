//! Translation of `%s` placeholders into Postgres `$n` parameters.
//!
//! Outside quotes, `%s` becomes the next `$n` and `%%` folds to `%`. Inside single-quoted
//! literals only `%%` folds, so `LIKE %s || '%%'` reaches the server as `LIKE $1 || '%'` and a
//! `%s` written inside a literal is kept as text. Double-quoted identifiers and dollar-quoted
//! bodies pass through untouched. `$` inside an identifier (`a$b`) does not open a dollar quote,
//! and `E'...'` literals honour backslash escapes.

/// Rewrite `%s` placeholders to `$1, $2, ...`.
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    scan(sql, |piece| match piece {
        Piece::Text(text) | Piece::Numbered(text) => out.push_str(text),
        Piece::Placeholder => {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        }
        Piece::Percent => out.push('%'),
    });
    out
}

/// Count the `%s` placeholders that [`number_placeholders`] would rewrite.
pub fn count_placeholders(sql: &str) -> usize {
    let mut n = 0usize;
    scan(sql, |piece| {
        if matches!(piece, Piece::Placeholder) {
            n += 1;
        }
    });
    n
}

/// Whether `sql` already uses native `$n` parameters outside quoted text.
pub fn has_numbered_params(sql: &str) -> bool {
    let mut found = false;
    scan(sql, |piece| {
        if matches!(piece, Piece::Numbered(_)) {
            found = true;
        }
    });
    found
}

enum Piece<'a> {
    Text(&'a str),
    /// A native `$n` parameter, kept verbatim.
    Numbered(&'a str),
    Placeholder,
    Percent,
}

fn scan<'a>(sql: &'a str, mut emit: impl FnMut(Piece<'a>)) {
    let bytes = sql.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let escapes = opens_escape_string(bytes, i);
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' if escapes => i += 2,
                        b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
                        b'\'' => break,
                        b'%' if bytes.get(i + 1) == Some(&b'%') => {
                            emit(Piece::Text(&sql[start..i]));
                            emit(Piece::Percent);
                            i += 2;
                            start = i;
                        }
                        _ => i += 1,
                    }
                }
                i += 1;
            }
            b'"' => i = skip_identifier(bytes, i),
            b'$' if i > 0 && is_identifier_byte(bytes[i - 1]) => i += 1,
            b'$' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                let digits = bytes[i + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
                emit(Piece::Text(&sql[start..i]));
                emit(Piece::Numbered(&sql[i..i + 1 + digits]));
                i += 1 + digits;
                start = i;
            }
            b'$' => i = skip_dollar_quoted(sql, i),
            b'%' if i + 1 < bytes.len() && matches!(bytes[i + 1], b's' | b'%') => {
                emit(Piece::Text(&sql[start..i]));
                emit(if bytes[i + 1] == b's' {
                    Piece::Placeholder
                } else {
                    Piece::Percent
                });
                i += 2;
                start = i;
            }
            _ => i += 1,
        }
    }
    emit(Piece::Text(&sql[start..]));
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// `E'...'` (or `e'...'`) where the `E` is not the tail of a longer identifier.
fn opens_escape_string(bytes: &[u8], quote: usize) -> bool {
    quote > 0
        && matches!(bytes[quote - 1], b'e' | b'E')
        && (quote < 2 || !is_identifier_byte(bytes[quote - 2]))
}

/// Index just past the closing `"`; doubled quotes are escapes.
fn skip_identifier(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Skip a `$tag$ ... $tag$` body. A `$` that does not open a tag only advances by one byte.
fn skip_dollar_quoted(sql: &str, open: usize) -> usize {
    let rest = &sql[open + 1..];
    let tag_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if rest.as_bytes().get(tag_len) != Some(&b'$') {
        return open + 1;
    }
    let delimiter = &sql[open..open + tag_len + 2];
    let body_start = open + delimiter.len();
    match sql[body_start..].find(delimiter) {
        Some(pos) => body_start + pos + delimiter.len(),
        None => sql.len(),
    }
}
