use crate::error::{GrammarError, Result};
use crate::expand::Expansion;
use crate::rule::Rule;
use crate::variant::{Locate, Piece, Variant};
use ahash::AHashMap as HashMap;
use slotmap::{DefaultKey, SecondaryMap, SlotMap};
use std::collections::hash_map::Entry;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Default guard for [`Grammar::expression`].
pub const DEFAULT_MAX_LENGTH: u64 = 100_000;

/// A named rule stored in the grammar arena.
#[derive(Debug)]
pub(crate) struct Production {
    pub name: String,
    pub rule: Rule,
}

/// Visit state of a nonterminal during the length pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// A validated grammar of variant `V` with a designated start symbol.
///
/// Construction checks the whole grammar and computes the expansion length of
/// every nonterminal; afterwards the grammar is read-only, so it can be shared
/// freely between threads.
pub struct Grammar<V> {
    /// Storage for all rules
    productions: SlotMap<DefaultKey, Production>,

    /// Maps nonterminal names to their productions
    index: HashMap<String, DefaultKey>,

    /// Memoized `|exp(A)|` for every nonterminal
    lengths: SecondaryMap<DefaultKey, u64>,

    start: DefaultKey,

    _variant: PhantomData<fn() -> V>,
}

impl<V: Variant> Grammar<V> {
    /// Builds and validates a grammar.
    ///
    /// Fails if the start symbol is undefined, a rule kind is not allowed in
    /// `V`, a rule references an undefined nonterminal, the rules form a
    /// cycle, or a rule's numeric parameters are invalid (empty terminal,
    /// run-length count below 2, iteration bounds outside `1 <= k1 <= k2`).
    /// If a name appears more than once, its last rule wins.
    pub fn new<I, S>(rules: I, start: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Rule)>,
        S: Into<String>,
    {
        let start = start.into();
        let mut productions: SlotMap<DefaultKey, Production> = SlotMap::new();
        let mut index: HashMap<String, DefaultKey> = HashMap::default();

        for (name, rule) in rules {
            match index.entry(name.into()) {
                Entry::Occupied(e) => productions[*e.get()].rule = rule,
                Entry::Vacant(e) => {
                    let key = productions.insert(Production {
                        name: e.key().clone(),
                        rule,
                    });
                    e.insert(key);
                }
            }
        }

        match Self::validate(&productions, &index, &start) {
            Ok((start, lengths)) => {
                let grammar = Self {
                    productions,
                    index,
                    lengths,
                    start,
                    _variant: PhantomData,
                };
                debug!(
                    variant = V::NAME,
                    rules = grammar.rule_count(),
                    size = grammar.size(),
                    length = grammar.length(),
                    "validated grammar"
                );
                Ok(grammar)
            }
            Err(err) => {
                debug!(variant = V::NAME, error = %err, "rejected grammar");
                Err(err)
            }
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks structure, then computes every length.
    ///
    /// Returns the start key and the populated length memo.
    fn validate(
        productions: &SlotMap<DefaultKey, Production>,
        index: &HashMap<String, DefaultKey>,
        start: &str,
    ) -> Result<(DefaultKey, SecondaryMap<DefaultKey, u64>)> {
        let start_key = *index
            .get(start)
            .ok_or_else(|| GrammarError::MissingStart(start.to_string()))?;

        for production in productions.values() {
            if !V::permits(production.rule.kind()) {
                return Err(GrammarError::DisallowedRule {
                    symbol: production.name.clone(),
                    kind: production.rule.kind(),
                    variant: V::NAME,
                });
            }
            for reference in V::referenced_nonterminals(&production.rule) {
                if !index.contains_key(reference) {
                    return Err(GrammarError::UndefinedNonterminal {
                        symbol: production.name.clone(),
                        missing: reference.to_string(),
                    });
                }
            }
        }

        let lengths = Self::compute_lengths(productions, index)?;
        Ok((start_key, lengths))
    }

    /// Depth-first length pass over all nonterminals with an explicit stack.
    ///
    /// A nonterminal is marked in progress until all of its references are
    /// done; reaching an in-progress nonterminal again means the grammar has a
    /// cycle. Each length is computed exactly once.
    fn compute_lengths(
        productions: &SlotMap<DefaultKey, Production>,
        index: &HashMap<String, DefaultKey>,
    ) -> Result<SecondaryMap<DefaultKey, u64>> {
        let mut lengths: SecondaryMap<DefaultKey, u64> = SecondaryMap::new();
        let mut marks: SecondaryMap<DefaultKey, Mark> = SecondaryMap::new();

        // (key, references already resolved)
        let mut stack: Vec<(DefaultKey, bool)> = Vec::new();

        for root in productions.keys() {
            if marks.contains_key(root) {
                continue;
            }
            stack.push((root, false));

            while let Some((key, resolved)) = stack.pop() {
                let production = &productions[key];

                if resolved {
                    let length = V::rule_length(&production.name, &production.rule, &|name: &str| {
                        lengths[index[name]]
                    })?;
                    lengths.insert(key, length);
                    marks.insert(key, Mark::Done);
                    continue;
                }

                match marks.get(key) {
                    Some(Mark::Done) => continue,
                    Some(Mark::InProgress) => {
                        return Err(GrammarError::Cycle(production.name.clone()))
                    }
                    None => {}
                }

                marks.insert(key, Mark::InProgress);
                stack.push((key, true));

                for reference in V::referenced_nonterminals(&production.rule) {
                    let child = index[reference];
                    match marks.get(child) {
                        Some(Mark::Done) => {}
                        Some(Mark::InProgress) => {
                            return Err(GrammarError::Cycle(reference.to_string()))
                        }
                        None => stack.push((child, false)),
                    }
                }
            }
        }

        Ok(lengths)
    }

    // ========================================================================
    // Grammar-wide queries
    // ========================================================================

    /// Name of the start symbol.
    pub fn start(&self) -> &str {
        &self.productions[self.start].name
    }

    /// The rule defining `name`, if any.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.index.get(name).map(|&key| &self.productions[key].rule)
    }

    /// All defined nonterminals, in no particular order.
    pub fn nonterminals(&self) -> impl Iterator<Item = &str> + '_ {
        self.productions.values().map(|p| p.name.as_str())
    }

    /// Number of rules in the grammar.
    pub fn rule_count(&self) -> usize {
        self.productions.len()
    }

    /// Grammar size: the sum of each rule's description cost.
    ///
    /// Independent of expansion lengths.
    pub fn size(&self) -> u64 {
        self.productions
            .values()
            .map(|p| V::rule_size(&p.rule))
            .sum()
    }

    /// A view of nonterminal `name` for per-symbol queries.
    pub fn symbol(&self, name: &str) -> Result<SymbolView<'_, V>> {
        let key = *self
            .index
            .get(name)
            .ok_or_else(|| GrammarError::UnknownSymbol(name.to_string()))?;
        Ok(SymbolView { grammar: self, key })
    }

    /// A view of the start symbol.
    pub fn root(&self) -> SymbolView<'_, V> {
        SymbolView {
            grammar: self,
            key: self.start,
        }
    }

    // ========================================================================
    // Start-symbol shorthands
    // ========================================================================

    /// `|exp(start)|`.
    pub fn length(&self) -> u64 {
        self.root().length()
    }

    /// Expands the start symbol, refusing expansions longer than
    /// [`DEFAULT_MAX_LENGTH`].
    pub fn expression(&self) -> Result<String> {
        self.root().expression()
    }

    /// Expands the start symbol; `None` disables the length guard.
    pub fn expression_bounded(&self, max_length: Option<u64>) -> Result<String> {
        self.root().expression_bounded(max_length)
    }

    /// Streams the characters of the start symbol's expansion.
    pub fn chars(&self) -> Expansion<'_, V> {
        self.root().chars()
    }

    /// Character at `index` of the start symbol's expansion.
    pub fn char_at(&self, index: u64) -> Result<char> {
        self.root().char_at(index)
    }

    /// End-exclusive range `start..end` of the start symbol's expansion.
    pub fn substring(&self, start: u64, end: u64) -> Result<String> {
        self.root().substring(start, end)
    }

    /// Inclusive range `start..=end` of the start symbol's expansion.
    pub fn substring_inclusive(&self, start: u64, end: u64) -> Result<String> {
        self.root().substring_inclusive(start, end)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// Rule of a nonterminal known to exist.
    #[inline]
    pub(crate) fn resolve(&self, name: &str) -> &Rule {
        &self.productions[self.index[name]].rule
    }

    #[inline]
    pub(crate) fn length_by_name(&self, name: &str) -> u64 {
        self.lengths[self.index[name]]
    }
}

impl<V> fmt::Debug for Grammar<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("start", &self.productions[self.start].name)
            .field("rules", &self.productions.len())
            .finish()
    }
}

/// A nonterminal of a validated grammar.
///
/// Obtained from [`Grammar::symbol`] or [`Grammar::root`].
pub struct SymbolView<'g, V> {
    grammar: &'g Grammar<V>,
    key: DefaultKey,
}

impl<V> Clone for SymbolView<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for SymbolView<'_, V> {}

impl<V> fmt::Debug for SymbolView<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolView")
            .field("name", &self.grammar.productions[self.key].name)
            .field("length", &self.grammar.lengths[self.key])
            .finish()
    }
}

impl<'g, V: Variant> SymbolView<'g, V> {
    pub fn name(&self) -> &'g str {
        &self.grammar.productions[self.key].name
    }

    pub fn rule(&self) -> &'g Rule {
        &self.grammar.productions[self.key].rule
    }

    pub(crate) fn grammar(&self) -> &'g Grammar<V> {
        self.grammar
    }

    /// Length of this symbol's expansion, read from the memo.
    pub fn length(&self) -> u64 {
        self.grammar.lengths[self.key]
    }

    /// Expands this symbol, refusing expansions longer than
    /// [`DEFAULT_MAX_LENGTH`].
    pub fn expression(&self) -> Result<String> {
        self.expression_bounded(Some(DEFAULT_MAX_LENGTH))
    }

    /// Expands this symbol to an explicit string.
    ///
    /// The length is checked against `max_length` before anything is
    /// materialized; `None` disables the check.
    pub fn expression_bounded(&self, max_length: Option<u64>) -> Result<String> {
        let length = self.length();
        if let Some(max_length) = max_length {
            if length > max_length {
                trace!(symbol = self.name(), length, max_length, "refusing expansion");
                return Err(GrammarError::ExpansionTooLarge { length, max_length });
            }
        }
        Ok(self.chars().collect())
    }

    /// Streams the characters of this symbol's expansion.
    pub fn chars(&self) -> Expansion<'g, V> {
        Expansion::new(self.grammar, self.name())
    }

    /// Returns the character at 0-based `index` without expanding.
    pub fn char_at(&self, index: u64) -> Result<char> {
        let length = self.length();
        if index >= length {
            return Err(GrammarError::IndexOutOfRange { index, length });
        }

        let lengths = |name: &str| self.grammar.length_by_name(name);
        let mut production = &self.grammar.productions[self.key];
        let mut index = index;
        loop {
            match V::rule_char_at(&production.name, &production.rule, index, &lengths)? {
                Locate::Char(c) => return Ok(c),
                Locate::Descend { symbol, index: next } => {
                    production = &self.grammar.productions[self.grammar.index[symbol]];
                    index = next;
                }
            }
        }
    }

    /// Returns the end-exclusive range `start..end` of the expansion.
    ///
    /// Only the rules covering the range are visited.
    pub fn substring(&self, start: u64, end: u64) -> Result<String> {
        let length = self.length();
        if start > end || end > length {
            return Err(GrammarError::RangeOutOfBounds { start, end, length });
        }

        let mut out = String::new();
        if start == end {
            return Ok(out);
        }

        let lengths = |name: &str| self.grammar.length_by_name(name);
        let mut work = vec![Piece::Slice {
            symbol: self.name(),
            start,
            end,
        }];
        let mut pieces = Vec::new();

        while let Some(piece) = work.pop() {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Slice { start, end, .. } if start == end => {}
                Piece::Slice { symbol, start, end } => {
                    let rule = self.grammar.resolve(symbol);
                    V::rule_substring(symbol, rule, start, end, &lengths, &mut pieces)?;
                    // Reversed so the leftmost piece is popped first
                    work.extend(pieces.drain(..).rev());
                }
            }
        }

        Ok(out)
    }

    /// Returns the inclusive range `start..=end` of the expansion.
    pub fn substring_inclusive(&self, start: u64, end: u64) -> Result<String> {
        let length = self.length();
        if end >= length {
            return Err(GrammarError::RangeOutOfBounds { start, end, length });
        }
        self.substring(start, end + 1)
    }
}
