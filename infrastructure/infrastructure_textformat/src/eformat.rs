//! Parses the same printable surface syntax [`display`](crate::display)
//! emits — atoms, integers, floats, strings, tuples, lists and maps — plus
//! `~a ~s ~i ~l ~u ~f ~w` placeholders substituted from `args` in order.
//! Grounded on `eformat`'s documented letters in the original connection
//! library: `~a` atom, `~s` string, `~i` integer, `~l` long integer, `~u`
//! unsigned long, `~f` double, `~w` an arbitrary already-built term. The
//! `"Module:Function(Args)"` form there is exposed here as [`parse_mfa`],
//! with `Args` parsed as a comma-separated term list.

use entities_atom::AtomTable;
use entities_term::Term;

/// One substitution value supplied to [`eformat`].
#[derive(Debug, Clone)]
pub enum Arg {
    Atom(String),
    Str(String),
    Int(i64),
    Long(i64),
    Unsigned(u64),
    Float(f64),
    Term(Term),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A syntax error at a given 1-based line/column, with a human-readable
    /// reason (unexpected character, dangling placeholder, unterminated
    /// quote, and so on).
    Parse { line: usize, col: usize, reason: String },
    /// An atom placeholder's text couldn't be interned (too long, table full).
    InternFailed,
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Parse { line, col, reason } => write!(f, "{line}:{col}: {reason}"),
            FormatError::InternFailed => write!(f, "could not intern atom text"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Parse a single term from `fmt`, substituting each `~x` placeholder with
/// the next unconsumed entry of `args` in order.
pub fn eformat(fmt: &str, args: &[Arg], atoms: &AtomTable) -> Result<Term, FormatError> {
    let mut parser = Parser::new(fmt, args);
    parser.skip_ws();
    let term = parser.parse_term(atoms)?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(parser.error("unexpected trailing input after term"));
    }
    Ok(term)
}

/// Parse the `"Module:Function(Args)"` convenience form into its three
/// parts: the module atom, the function atom, and the argument list built
/// by parsing `Args` as a comma-separated term list (placeholders allowed).
pub fn parse_mfa(
    spec: &str,
    args: &[Arg],
    atoms: &AtomTable,
) -> Result<(entities_atom::Atom, entities_atom::Atom, Term), FormatError> {
    let colon = spec.find(':').ok_or_else(|| parse_error_at(1, 1, "expected 'Module:Function(Args)'"))?;
    let module = &spec[..colon];
    let rest = &spec[colon + 1..];
    let open = rest
        .find('(')
        .ok_or_else(|| parse_error_at(1, colon + 2, "expected '(' after function name"))?;
    let close = rest
        .rfind(')')
        .ok_or_else(|| parse_error_at(1, colon + 2, "expected closing ')'"))?;
    if close < open {
        return Err(parse_error_at(1, colon + 2, "mismatched parentheses"));
    }
    let function = &rest[..open];
    let inner = &rest[open + 1..close];

    let module_atom = atoms.intern(module.as_bytes()).map_err(|_| FormatError::InternFailed)?;
    let function_atom = atoms.intern(function.as_bytes()).map_err(|_| FormatError::InternFailed)?;
    let arg_list = if inner.trim().is_empty() {
        Term::Nil
    } else {
        let mut parser = Parser::new(inner, args);
        let elements = parser.parse_comma_separated(atoms)?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(parser.error("unexpected trailing input in argument list"));
        }
        Term::List { elements, tail: None }
    };
    Ok((module_atom, function_atom, arg_list))
}

fn parse_error_at(line: usize, col: usize, reason: &str) -> FormatError {
    FormatError::Parse { line, col, reason: reason.to_string() }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    next_arg: std::slice::Iter<'a, Arg>,
}

impl<'a> Parser<'a> {
    fn new(input: &str, args: &'a [Arg]) -> Self {
        Parser { chars: input.chars().collect(), pos: 0, line: 1, col: 1, next_arg: args.iter() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn error(&self, reason: impl Into<String>) -> FormatError {
        FormatError::Parse { line: self.line, col: self.col, reason: reason.into() }
    }

    fn expect(&mut self, expected: char) -> Result<(), FormatError> {
        match self.advance() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    /// Parse one term: a literal term constructor or a `~x` placeholder.
    fn parse_term(&mut self, atoms: &AtomTable) -> Result<Term, FormatError> {
        self.skip_ws();
        match self.peek() {
            Some('~') => self.parse_placeholder(atoms),
            Some('{') => self.parse_tuple(atoms),
            Some('[') => self.parse_list(atoms),
            Some('#') => self.parse_map(atoms),
            Some('\'') => self.parse_quoted_atom(atoms),
            Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_lowercase() => self.parse_bare_atom(atoms),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input, expected a term")),
        }
    }

    fn parse_placeholder(&mut self, atoms: &AtomTable) -> Result<Term, FormatError> {
        self.advance(); // '~'
        let letter = self.advance().ok_or_else(|| self.error("dangling '~' at end of input"))?;
        if !matches!(letter, 'a' | 's' | 'i' | 'l' | 'u' | 'f' | 'w') {
            return Err(self.error(format!("unknown format placeholder '~{letter}'")));
        }
        let arg = self.next_arg.next().ok_or_else(|| self.error("no argument left for placeholder"))?;
        placeholder_term(letter, arg, atoms).map_err(|e| match e {
            FormatError::InternFailed => FormatError::InternFailed,
            other => other,
        })
    }

    fn parse_tuple(&mut self, atoms: &AtomTable) -> Result<Term, FormatError> {
        self.expect('{')?;
        self.skip_ws();
        let elements = if self.peek() == Some('}') { Vec::new() } else { self.parse_comma_separated(atoms)? };
        self.skip_ws();
        self.expect('}')?;
        Ok(Term::Tuple(elements))
    }

    fn parse_list(&mut self, atoms: &AtomTable) -> Result<Term, FormatError> {
        self.expect('[')?;
        self.skip_ws();
        if self.peek() == Some(']') {
            self.advance();
            return Ok(Term::Nil);
        }
        let mut elements = vec![self.parse_term(atoms)?];
        self.skip_ws();
        let mut tail = None;
        loop {
            match self.peek() {
                Some(',') => {
                    self.advance();
                    self.skip_ws();
                    elements.push(self.parse_term(atoms)?);
                    self.skip_ws();
                }
                Some('|') => {
                    self.advance();
                    self.skip_ws();
                    tail = Some(Box::new(self.parse_term(atoms)?));
                    self.skip_ws();
                    break;
                }
                _ => break,
            }
        }
        self.expect(']')?;
        Ok(Term::List { elements, tail })
    }

    fn parse_map(&mut self, atoms: &AtomTable) -> Result<Term, FormatError> {
        self.expect('#')?;
        self.expect('{')?;
        self.skip_ws();
        let mut pairs = Vec::new();
        if self.peek() != Some('}') {
            loop {
                let key = self.parse_term(atoms)?;
                self.skip_ws();
                self.expect('=')?;
                self.expect('>')?;
                self.skip_ws();
                let value = self.parse_term(atoms)?;
                pairs.push((key, value));
                self.skip_ws();
                match self.peek() {
                    Some(',') => {
                        self.advance();
                        self.skip_ws();
                    }
                    _ => break,
                }
            }
        }
        self.expect('}')?;
        Ok(Term::Map(pairs))
    }

    fn parse_comma_separated(&mut self, atoms: &AtomTable) -> Result<Vec<Term>, FormatError> {
        let mut elements = vec![self.parse_term(atoms)?];
        self.skip_ws();
        while self.peek() == Some(',') {
            self.advance();
            self.skip_ws();
            elements.push(self.parse_term(atoms)?);
            self.skip_ws();
        }
        Ok(elements)
    }

    fn parse_bare_atom(&mut self, atoms: &AtomTable) -> Result<Term, FormatError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '@') {
            self.advance();
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        let atom = atoms.intern(name.as_bytes()).map_err(|_| FormatError::InternFailed)?;
        Ok(Term::Atom(atom))
    }

    fn parse_quoted_atom(&mut self, atoms: &AtomTable) -> Result<Term, FormatError> {
        let text = self.parse_quoted('\'')?;
        let atom = atoms.intern(text.as_bytes()).map_err(|_| FormatError::InternFailed)?;
        Ok(Term::Atom(atom))
    }

    fn parse_string(&mut self) -> Result<Term, FormatError> {
        let text = self.parse_quoted('"')?;
        Ok(Term::String(text.into_bytes()))
    }

    /// Consume a `quote`-delimited literal, unescaping `\\`, `\quote`,
    /// `\n`, `\t` and `\xHH`.
    fn parse_quoted(&mut self, quote: char) -> Result<String, FormatError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated quoted literal")),
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('\\') => out.push('\\'),
                    Some('x') => {
                        let hi = self.advance().ok_or_else(|| self.error("incomplete \\x escape"))?;
                        let lo = self.advance().ok_or_else(|| self.error("incomplete \\x escape"))?;
                        let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                            .map_err(|_| self.error("invalid \\x escape"))?;
                        out.push(byte as char);
                    }
                    Some(c) if c == quote => out.push(c),
                    Some(c) => return Err(self.error(format!("unknown escape '\\{c}'"))),
                    None => return Err(self.error("unterminated quoted literal")),
                },
                Some(c) => out.push(c),
            }
        }
        Ok(out)
    }

    fn parse_number(&mut self) -> Result<Term, FormatError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            text.parse::<f64>().map(Term::Float).map_err(|_| self.error(format!("invalid float '{text}'")))
        } else {
            text.parse::<i64>().map(Term::Small).map_err(|_| self.error(format!("integer '{text}' out of range")))
        }
    }
}

fn placeholder_term(letter: char, arg: &Arg, atoms: &AtomTable) -> Result<Term, FormatError> {
    match (letter, arg) {
        ('a', Arg::Atom(name)) => Ok(Term::Atom(atoms.intern(name.as_bytes()).map_err(|_| FormatError::InternFailed)?)),
        ('s', Arg::Str(s)) => Ok(Term::String(s.as_bytes().to_vec())),
        ('i', Arg::Int(n)) => Ok(Term::Small(*n)),
        ('l', Arg::Long(n)) => Ok(Term::Small(*n)),
        ('u', Arg::Unsigned(n)) => Ok(Term::Small(*n as i64)),
        ('f', Arg::Float(f)) => Ok(Term::Float(*f)),
        ('w', Arg::Term(t)) => Ok(t.clone()),
        (_, _) => Err(FormatError::Parse { line: 0, col: 0, reason: "placeholder argument kind mismatch".into() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_atom_parses_as_an_atom() {
        let table = AtomTable::new();
        let term = eformat("hello", &[], &table).unwrap();
        assert_eq!(term, Term::Atom(table.intern(b"hello").unwrap()));
    }

    #[test]
    fn quoted_atom_parses_as_an_atom() {
        let table = AtomTable::new();
        let term = eformat("'Hello World'", &[], &table).unwrap();
        assert_eq!(term, Term::Atom(table.intern(b"Hello World").unwrap()));
    }

    #[test]
    fn string_literal_parses() {
        let table = AtomTable::new();
        let term = eformat("\"hi\"", &[], &table).unwrap();
        assert_eq!(term, Term::String(b"hi".to_vec()));
    }

    #[test]
    fn integer_and_float_literals() {
        let table = AtomTable::new();
        assert_eq!(eformat("42", &[], &table).unwrap(), Term::Small(42));
        assert_eq!(eformat("-7", &[], &table).unwrap(), Term::Small(-7));
        assert_eq!(eformat("3.5", &[], &table).unwrap(), Term::Float(3.5));
    }

    #[test]
    fn atom_placeholder_interns_and_substitutes() {
        let table = AtomTable::new();
        let term = eformat("~a", &[Arg::Atom("ok".into())], &table).unwrap();
        assert_eq!(term, Term::Atom(table.ok()));
    }

    #[test]
    fn tuple_with_placeholder_matches_the_ok_hello_scenario() {
        let table = AtomTable::new();
        let term = eformat("{ok, ~a}", &[Arg::Atom("hello".into())], &table).unwrap();
        let ok = table.ok();
        let hello = table.intern(b"hello").unwrap();
        assert_eq!(term, Term::Tuple(vec![Term::Atom(ok), Term::Atom(hello)]));
    }

    #[test]
    fn list_with_tail_and_placeholders() {
        let table = AtomTable::new();
        let term = eformat("[1,~i|~w]", &[Arg::Int(2), Arg::Term(Term::Small(3))], &table).unwrap();
        assert_eq!(
            term,
            Term::List { elements: vec![Term::Small(1), Term::Small(2)], tail: Some(Box::new(Term::Small(3))) }
        );
    }

    #[test]
    fn map_with_arrow_syntax() {
        let table = AtomTable::new();
        let term = eformat("#{a=>1}", &[], &table).unwrap();
        let a = table.intern(b"a").unwrap();
        assert_eq!(term, Term::Map(vec![(Term::Atom(a), Term::Small(1))]));
    }

    #[test]
    fn round_trips_through_display_for_a_nested_term() {
        use crate::display::format_term;
        use entities_term::DisplayOpts;

        let table = AtomTable::new();
        let ok = table.ok();
        let term = Term::Tuple(vec![Term::Atom(ok), Term::proper_list(vec![Term::Small(1), Term::Small(2)])]);
        let text = format_term(&term, &table, DisplayOpts::default());
        assert_eq!(eformat(&text, &[], &table).unwrap(), term);
    }

    #[test]
    fn missing_argument_is_a_parse_error() {
        let table = AtomTable::new();
        assert_eq!(
            eformat("~i", &[], &table),
            Err(FormatError::Parse { line: 1, col: 3, reason: "no argument left for placeholder".into() })
        );
    }

    #[test]
    fn unknown_placeholder_is_a_parse_error() {
        let table = AtomTable::new();
        match eformat("~z", &[Arg::Int(1)], &table) {
            Err(FormatError::Parse { reason, .. }) => assert!(reason.contains('z')),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn dangling_tilde_is_a_parse_error() {
        let table = AtomTable::new();
        assert!(matches!(eformat("abc~", &[], &table), Err(FormatError::Parse { .. })));
    }

    #[test]
    fn unterminated_string_reports_line_and_column() {
        let table = AtomTable::new();
        match eformat("\"abc", &[], &table) {
            Err(FormatError::Parse { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn parses_module_function_args() {
        let table = AtomTable::new();
        let (module, function, args) = parse_mfa("rpc:call(~i)", &[Arg::Int(5)], &table).unwrap();
        assert_eq!(module, table.intern(b"rpc").unwrap());
        assert_eq!(function, table.intern(b"call").unwrap());
        assert_eq!(args, Term::List { elements: vec![Term::Small(5)], tail: None });
    }

    #[test]
    fn parses_mfa_with_multiple_args_as_a_list() {
        let table = AtomTable::new();
        let (_, _, args) = parse_mfa("rpc:call(~i,~a)", &[Arg::Int(1), Arg::Atom("x".into())], &table).unwrap();
        let x = table.intern(b"x").unwrap();
        assert_eq!(args, Term::List { elements: vec![Term::Small(1), Term::Atom(x)], tail: None });
    }

    #[test]
    fn parses_mfa_with_no_args() {
        let table = AtomTable::new();
        let (_, _, args) = parse_mfa("erlang:self()", &[], &table).unwrap();
        assert_eq!(args, Term::Nil);
    }

    #[test]
    fn malformed_mfa_is_a_parse_error() {
        let table = AtomTable::new();
        assert!(matches!(parse_mfa("not an mfa", &[], &table), Err(FormatError::Parse { .. })));
    }
}
