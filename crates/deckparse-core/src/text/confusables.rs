//! Correction of characters OCR commonly confuses with letters.
//!
//! Only applied to OCR output. Tokens are maximal runs of alphanumerics and `|`;
//! a token is rewritten only when letters outnumber digits, so figures such as
//! `2020` or `$10M` are never touched.

/// Replace `0` with `O` and `|` with `I` inside word-like tokens.
///
/// A lone `|` surrounded by whitespace becomes `I` as well.
pub fn correct_confusables(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut token = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '|' {
            token.push(ch);
        } else {
            flush_token(&mut token, &mut out);
            out.push(ch);
        }
    }
    flush_token(&mut token, &mut out);

    out
}

fn flush_token(token: &mut String, out: &mut String) {
    if token.is_empty() {
        return;
    }

    let letters = token.chars().filter(|c| c.is_alphabetic()).count();
    let digits = token.chars().filter(|c| c.is_numeric()).count();

    if token == "|" {
        out.push('I');
    } else if letters > digits {
        for ch in token.chars() {
            out.push(match ch {
                '0' => 'O',
                '|' => 'I',
                other => other,
            });
        }
    } else {
        out.push_str(token);
    }

    token.clear();
}
