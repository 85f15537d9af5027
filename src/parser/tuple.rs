// Tuple splitter: walks the payload after `VALUES` and yields the body of every
// top-level `( ... )` group. Field values may contain commas and parentheses,
// so splitting on `),(` is not an option; only a quote-aware depth count works.

/// What the splitter does with the byte it was just fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleEvent {
    /// Between tuples: byte is ignored.
    Skip,
    /// Opening delimiter of a new tuple (not part of its body).
    Open,
    /// Byte belongs to the current tuple body.
    Content,
    /// Closing delimiter: the current tuple body is complete.
    Close,
}

/// Quote, escape and parenthesis depth while walking a VALUES payload.
///
/// Depth 0 is between tuples, depth 1 is inside a tuple, anything deeper is a
/// parenthesis that belongs to a field's literal text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TupleState {
    in_string: bool,
    escape: bool,
    depth: u32,
}

impl TupleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn in_string(&self) -> bool {
        self.in_string
    }

    pub fn escaped(&self) -> bool {
        self.escape
    }

    pub fn step(&mut self, byte: u8) -> TupleEvent {
        if self.depth == 0 {
            if byte == b'(' {
                self.depth = 1;
                return TupleEvent::Open;
            }
            return TupleEvent::Skip;
        }
        if self.escape {
            self.escape = false;
            return TupleEvent::Content;
        }
        match byte {
            b'\\' => {
                self.escape = true;
                TupleEvent::Content
            }
            b'\'' => {
                self.in_string = !self.in_string;
                TupleEvent::Content
            }
            _ if self.in_string => TupleEvent::Content,
            b'(' => {
                self.depth += 1;
                TupleEvent::Content
            }
            b')' => {
                self.depth -= 1;
                if self.depth == 0 {
                    TupleEvent::Close
                } else {
                    TupleEvent::Content
                }
            }
            _ => TupleEvent::Content,
        }
    }
}

/// Lazy, single-pass iterator over tuple bodies of one payload.
///
/// Bodies borrow from the payload. A tuple still open when the payload ends is
/// discarded and [`Tuples::is_truncated`] reports it.
#[derive(Debug)]
pub struct Tuples<'a> {
    payload: &'a str,
    pos: usize,
    start: usize,
    state: TupleState,
    truncated: bool,
}

pub fn split_tuples(payload: &str) -> Tuples<'_> {
    Tuples {
        payload,
        pos: 0,
        start: 0,
        state: TupleState::new(),
        truncated: false,
    }
}

impl<'a> Tuples<'a> {
    /// True once the scan hit the end of the payload inside an unclosed tuple.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    // Inter-tuple separators.
    fn skip_separators(&mut self) {
        let bytes = self.payload.as_bytes();
        while self.pos < bytes.len() && matches!(bytes[self.pos], b',' | b' ' | b'\t' | b'\r' | b'\n')
        {
            self.pos += 1;
        }
    }
}

impl<'a> Iterator for Tuples<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.payload.as_bytes();
        while self.pos < bytes.len() {
            let i = self.pos;
            self.pos += 1;
            match self.state.step(bytes[i]) {
                TupleEvent::Open => self.start = self.pos,
                TupleEvent::Close => {
                    let body = &self.payload[self.start..i];
                    self.skip_separators();
                    return Some(body);
                }
                TupleEvent::Skip | TupleEvent::Content => {}
            }
        }
        if self.state.depth() > 0 {
            self.truncated = true;
            self.state = TupleState::new();
        }
        None
    }
}

impl std::iter::FusedIterator for Tuples<'_> {}
