// Scalar lexer: splits the body of one tuple into fields and classifies each one.
// Quotes are only toggled, never unescaped: `\'` stays two characters in the output.

use super::ScalarValue;

/// What the lexer does with the byte it was just fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexStep {
    /// Byte belongs to the current field.
    Push,
    /// Unquoted comma: the current field ends here.
    Split,
}

/// Quote/escape state while walking a tuple body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LexState {
    in_string: bool,
    escape: bool,
}

impl LexState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_string(&self) -> bool {
        self.in_string
    }

    pub fn escaped(&self) -> bool {
        self.escape
    }

    pub fn step(&mut self, byte: u8) -> LexStep {
        if self.escape {
            self.escape = false;
            return LexStep::Push;
        }
        match byte {
            b'\\' => {
                self.escape = true;
                LexStep::Push
            }
            b'\'' => {
                self.in_string = !self.in_string;
                LexStep::Push
            }
            b',' if !self.in_string => LexStep::Split,
            _ => LexStep::Push,
        }
    }
}

/// Lex one tuple body (text between the tuple's outer parentheses).
///
/// Always yields at least one value: an empty body is one empty Text field.
pub fn lex(tuple: &str) -> Vec<ScalarValue> {
    let mut values = Vec::new();
    lex_into(tuple, &mut values);
    values
}

/// Like [`lex`], appending to an existing buffer so callers can reuse it per tuple.
pub fn lex_into(tuple: &str, values: &mut Vec<ScalarValue>) {
    let mut state = LexState::new();
    let mut start = 0;
    for (i, &b) in tuple.as_bytes().iter().enumerate() {
        if state.step(b) == LexStep::Split {
            values.push(classify(&tuple[start..i]));
            start = i + 1;
        }
    }
    values.push(classify(&tuple[start..]));
}

/// Classify one raw field: `NULL` in any case is Null, a quoted field loses
/// exactly one quote on each side, anything else is kept as trimmed text.
pub fn classify(raw: &str) -> ScalarValue {
    let field = raw.trim();
    if field.eq_ignore_ascii_case("NULL") {
        return ScalarValue::Null;
    }
    if field.starts_with('\'') && field.ends_with('\'') {
        // A lone `'` both starts and ends with a quote.
        let inner = if field.len() >= 2 {
            &field[1..field.len() - 1]
        } else {
            ""
        };
        return ScalarValue::Text(inner.to_string());
    }
    ScalarValue::Text(field.to_string())
}
