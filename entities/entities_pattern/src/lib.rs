//! Entities Layer: Pattern Matching
//!
//! A `Pattern` is a `Term` shape with named variable holes (`Pattern::Var`)
//! embedded anywhere a `Term` could appear. `Bindings` records what each
//! variable has been bound to; `Pattern::match_term` walks a pattern and a
//! ground `Term` together, extending `Bindings` on every fresh variable and
//! failing the whole match if a variable is seen twice with inconsistent
//! values.
//!
//! Matching is transactional: a nested mismatch (say, tuple element 3 of 4)
//! rolls back every binding the match made before it, so a caller never
//! observes a `Bindings` half-updated by a failed match.

use entities_term::{Bitstring, Pid, Port, Reference, Term};
use std::collections::HashMap;

/// A pattern: either a concrete value to match exactly, or a named
/// variable, or a composite with patterns nested inside.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Matches exactly this term (recursing structurally, so a `Term::Tuple`
    /// here still requires an exact tuple, not just pattern-driven recursion
    /// through `Pattern::Tuple`).
    Term(Term),
    /// A named hole. The same name appearing twice in one pattern must bind
    /// to equal terms both times.
    Var(String),
    Tuple(Vec<Pattern>),
    List {
        elements: Vec<Pattern>,
        tail: Option<Box<Pattern>>,
    },
    Map(Vec<(Pattern, Pattern)>),
}

impl Pattern {
    pub fn var(name: impl Into<String>) -> Pattern {
        Pattern::Var(name.into())
    }

    /// Match this pattern against `term`, extending `bindings` on success.
    /// On failure, `bindings` is left exactly as it was before the call.
    pub fn match_term(&self, term: &Term, bindings: &mut Bindings) -> bool {
        let checkpoint = bindings.checkpoint();
        if self.match_term_inner(term, bindings) {
            bindings.commit(checkpoint);
            true
        } else {
            bindings.rollback(checkpoint);
            false
        }
    }

    fn match_term_inner(&self, term: &Term, bindings: &mut Bindings) -> bool {
        match self {
            Pattern::Term(expected) => expected == term,
            Pattern::Var(name) => bindings.bind(name, term.clone()),
            Pattern::Tuple(patterns) => match term {
                Term::Tuple(terms) if terms.len() == patterns.len() => patterns
                    .iter()
                    .zip(terms)
                    .all(|(p, t)| p.match_term_inner(t, bindings)),
                _ => false,
            },
            Pattern::List { elements, tail } => {
                match_list(elements, tail.as_deref(), term, bindings)
            }
            Pattern::Map(pairs) => match term {
                Term::Map(entries) => match_map(pairs, entries, bindings),
                _ => false,
            },
        }
    }

    /// Produce a ground `Term` by replacing every `Pattern::Var` with its
    /// binding. Returns `None` if any variable referenced is unbound.
    pub fn subst(&self, bindings: &Bindings) -> Option<Term> {
        match self {
            Pattern::Term(term) => Some(term.clone()),
            Pattern::Var(name) => bindings.get(name).cloned(),
            Pattern::Tuple(patterns) => {
                let terms: Option<Vec<Term>> = patterns.iter().map(|p| p.subst(bindings)).collect();
                Some(Term::Tuple(terms?))
            }
            Pattern::List { elements, tail } => {
                let terms: Option<Vec<Term>> = elements.iter().map(|p| p.subst(bindings)).collect();
                let terms = terms?;
                match tail {
                    None => Some(Term::proper_list(terms)),
                    Some(t) => Some(Term::improper_list(terms, t.subst(bindings)?)),
                }
            }
            Pattern::Map(pairs) => {
                let mut entries = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    entries.push((k.subst(bindings)?, v.subst(bindings)?));
                }
                Some(Term::Map(entries))
            }
        }
    }

    /// `true` if `name` occurs anywhere in this pattern's variable holes.
    /// Used to reject a binding that would make a variable's own value
    /// refer back to itself (occurs-check), which would otherwise turn
    /// `subst` into an infinite expansion.
    pub fn occurs(&self, name: &str) -> bool {
        match self {
            Pattern::Term(_) => false,
            Pattern::Var(v) => v == name,
            Pattern::Tuple(patterns) => patterns.iter().any(|p| p.occurs(name)),
            Pattern::List { elements, tail } => {
                elements.iter().any(|p| p.occurs(name))
                    || tail.as_deref().is_some_and(|t| t.occurs(name))
            }
            Pattern::Map(pairs) => pairs.iter().any(|(k, v)| k.occurs(name) || v.occurs(name)),
        }
    }
}

fn match_list(
    elements: &[Pattern],
    tail: Option<&Pattern>,
    term: &Term,
    bindings: &mut Bindings,
) -> bool {
    let (term_elements, term_tail): (Vec<&Term>, Option<&Term>) = match term {
        Term::Nil => (Vec::new(), None),
        Term::List {
            elements: te,
            tail: tt,
        } => (te.iter().collect(), tt.as_deref()),
        Term::String(bytes) => {
            // STRING_EXT is a list of small integers; materialize it lazily
            // as owned terms so the match can proceed uniformly.
            return match_string_as_list(elements, tail, bytes, bindings);
        }
        _ => return false,
    };

    if elements.len() != term_elements.len() {
        return false;
    }
    for (p, t) in elements.iter().zip(term_elements.iter()) {
        if !p.match_term_inner(t, bindings) {
            return false;
        }
    }
    match (tail, term_tail) {
        (None, None) => true,
        (Some(p), Some(t)) => p.match_term_inner(t, bindings),
        (None, Some(t)) => {
            // A proper-list pattern only matches a proper-list term.
            matches!(t, Term::Nil)
        }
        (Some(p), None) => p.match_term_inner(&Term::Nil, bindings),
    }
}

fn match_string_as_list(
    elements: &[Pattern],
    tail: Option<&Pattern>,
    bytes: &[u8],
    bindings: &mut Bindings,
) -> bool {
    if elements.len() != bytes.len() {
        return false;
    }
    for (p, &b) in elements.iter().zip(bytes.iter()) {
        if !p.match_term_inner(&Term::Small(b as i64), bindings) {
            return false;
        }
    }
    match tail {
        None => true,
        Some(p) => p.match_term_inner(&Term::Nil, bindings),
    }
}

fn match_map(pairs: &[(Pattern, Pattern)], entries: &[(Term, Term)], bindings: &mut Bindings) -> bool {
    // Every pattern key must be present in the ground map; the ground map
    // may carry extra keys the pattern doesn't mention.
    //
    // Map patterns in this crate require key patterns to already be ground
    // (a var key would be ambiguous to match positionally); keys are looked
    // up by equality against the term's entries rather than zipped in order.
    for (key_pattern, value_pattern) in pairs {
        let Pattern::Term(key) = key_pattern else {
            return false;
        };
        let Some((_, value)) = entries.iter().find(|(k, _)| k == key) else {
            return false;
        };
        if !value_pattern.match_term_inner(value, bindings) {
            return false;
        }
    }
    true
}

/// Bound values for a set of named pattern variables, with savepoint
/// support so `Pattern::match_term` can roll back a failed nested match.
#[derive(Debug, Default, Clone)]
pub struct Bindings {
    values: HashMap<String, Term>,
    log: Vec<String>,
}

/// Opaque savepoint returned by `Bindings::checkpoint`.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint(usize);

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.values.get(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Bind `name` to `value`. A fresh name always succeeds; a name bound
    /// before in this transaction (or any enclosing one) must see an equal
    /// value, matching Erlang's single-assignment variable semantics.
    fn bind(&mut self, name: &str, value: Term) -> bool {
        if let Some(existing) = self.values.get(name) {
            return *existing == value;
        }
        self.values.insert(name.to_string(), value);
        self.log.push(name.to_string());
        true
    }

    /// Mark the current point for a possible rollback.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.log.len())
    }

    /// Discard a checkpoint after a successful match; bindings made since
    /// it stay in place.
    pub fn commit(&mut self, _checkpoint: Checkpoint) {}

    /// Undo every binding made since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.log.len() > checkpoint.0 {
            let name = self.log.pop().expect("log longer than checkpoint");
            self.values.remove(&name);
        }
    }
}

/// A constant pattern helper for terms that have no meaningful sub-pattern
/// shape (pids, ports, refs, binaries): matches only an exactly equal term.
pub fn exact(term: Term) -> Pattern {
    Pattern::Term(term)
}

pub fn pid_pattern(pid: Pid) -> Pattern {
    exact(Term::Pid(pid))
}

pub fn port_pattern(port: Port) -> Pattern {
    exact(Term::Port(port))
}

pub fn ref_pattern(reference: Reference) -> Pattern {
    exact(Term::Ref(reference))
}

pub fn binary_pattern(bitstring: Bitstring) -> Pattern {
    exact(Term::Binary(bitstring))
}
