use crate::error::{GrammarError, Result};
use crate::rule::{Rule, RuleKind};

/// Resolves the memoized expansion length of a nonterminal.
pub type Lengths<'a> = &'a dyn Fn(&str) -> u64;

/// Lazily produced pieces of a rule's expansion, in output order.
pub type Segments<'r> = Box<dyn Iterator<Item = Segment<'r>> + 'r>;

/// One step of an expansion: a literal, or a nonterminal repeated some times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'r> {
    Literal(&'r str),
    Repeat { symbol: &'r str, times: u64 },
}

/// Result of one `char_at` descent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locate<'r> {
    /// The character was found inside this rule.
    Char(char),
    /// Continue at `index` inside `symbol`.
    Descend { symbol: &'r str, index: u64 },
}

/// One part of a substring request, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'r> {
    /// Text that is already resolved.
    Literal(&'r str),
    /// The end-exclusive range `start..end` of `symbol`'s expansion.
    Slice { symbol: &'r str, start: u64, end: u64 },
}

/// The rule semantics of one grammar family.
///
/// The [`Grammar`](crate::Grammar) engine owns storage, validation, the length
/// memo and the descent loops; a variant decides which rule kinds it accepts
/// and what each rule contributes in a single step. Hooks are only called for
/// rules whose kind passed [`Variant::permits`].
pub trait Variant {
    /// Display name used in error messages, e.g. `"SLP"`.
    const NAME: &'static str;

    fn permits(kind: RuleKind) -> bool;

    fn referenced_nonterminals(rule: &Rule) -> Vec<&str> {
        rule.references().collect()
    }

    /// Contribution of a rule to the grammar size.
    fn rule_size(rule: &Rule) -> u64;

    /// `|exp(A)|` for the rule of `symbol`, given the lengths of everything it
    /// references.
    fn rule_length(symbol: &str, rule: &Rule, lengths: Lengths<'_>) -> Result<u64>;

    fn rule_expand(rule: &Rule) -> Segments<'_>;

    /// Locates `index` (already known to be in range) inside the rule.
    fn rule_char_at<'r>(
        symbol: &str,
        rule: &'r Rule,
        index: u64,
        lengths: Lengths<'_>,
    ) -> Result<Locate<'r>>;

    /// Splits the non-empty range `start..end` of the rule into pieces.
    fn rule_substring<'r>(
        symbol: &str,
        rule: &'r Rule,
        start: u64,
        end: u64,
        lengths: Lengths<'_>,
        out: &mut Vec<Piece<'r>>,
    ) -> Result<()>;
}

pub(crate) fn disallowed<V: Variant>(symbol: &str, rule: &Rule) -> GrammarError {
    GrammarError::DisallowedRule {
        symbol: symbol.to_string(),
        kind: rule.kind(),
        variant: V::NAME,
    }
}

// ============================================================================
// Terminal rules
// ============================================================================

pub(crate) fn terminal_length(symbol: &str, literal: &str) -> Result<u64> {
    if literal.is_empty() {
        return Err(GrammarError::EmptyTerminal(symbol.to_string()));
    }
    Ok(char_count(literal))
}

pub(crate) fn terminal_char_at(literal: &str, index: u64) -> Result<Locate<'_>> {
    let found = if literal.is_ascii() {
        usize::try_from(index)
            .ok()
            .and_then(|i| literal.as_bytes().get(i))
            .map(|&b| char::from(b))
    } else {
        usize::try_from(index)
            .ok()
            .and_then(|i| literal.chars().nth(i))
    };

    found
        .map(Locate::Char)
        .ok_or_else(|| GrammarError::IndexOutOfRange {
            index,
            length: char_count(literal),
        })
}

pub(crate) fn terminal_substring<'r>(
    literal: &'r str,
    start: u64,
    end: u64,
    out: &mut Vec<Piece<'r>>,
) -> Result<()> {
    let length = char_count(literal);
    if start > end || end > length {
        return Err(GrammarError::RangeOutOfBounds { start, end, length });
    }
    out.push(Piece::Literal(char_slice(literal, start, end)));
    Ok(())
}

// ============================================================================
// Binary rules
// ============================================================================

pub(crate) fn binary_length(
    symbol: &str,
    left: &str,
    right: &str,
    lengths: Lengths<'_>,
) -> Result<u64> {
    lengths(left)
        .checked_add(lengths(right))
        .ok_or_else(|| GrammarError::LengthOverflow(symbol.to_string()))
}

pub(crate) fn binary_char_at<'r>(
    left: &'r str,
    right: &'r str,
    index: u64,
    lengths: Lengths<'_>,
) -> Result<Locate<'r>> {
    let left_len = lengths(left);
    let length = left_len.saturating_add(lengths(right));
    if index >= length {
        return Err(GrammarError::IndexOutOfRange { index, length });
    }

    if index < left_len {
        Ok(Locate::Descend {
            symbol: left,
            index,
        })
    } else {
        Ok(Locate::Descend {
            symbol: right,
            index: index - left_len,
        })
    }
}

pub(crate) fn binary_substring<'r>(
    left: &'r str,
    right: &'r str,
    start: u64,
    end: u64,
    lengths: Lengths<'_>,
    out: &mut Vec<Piece<'r>>,
) -> Result<()> {
    let left_len = lengths(left);
    let length = left_len.saturating_add(lengths(right));
    if start > end || end > length {
        return Err(GrammarError::RangeOutOfBounds { start, end, length });
    }

    if end <= left_len {
        out.push(Piece::Slice {
            symbol: left,
            start,
            end,
        });
    } else if start >= left_len {
        out.push(Piece::Slice {
            symbol: right,
            start: start - left_len,
            end: end - left_len,
        });
    } else {
        // Range straddles the boundary
        out.push(Piece::Slice {
            symbol: left,
            start,
            end: left_len,
        });
        out.push(Piece::Slice {
            symbol: right,
            start: 0,
            end: end - left_len,
        });
    }
    Ok(())
}

pub(crate) fn binary_segments<'r>(left: &'r str, right: &'r str) -> Segments<'r> {
    Box::new(
        [
            Segment::Repeat {
                symbol: left,
                times: 1,
            },
            Segment::Repeat {
                symbol: right,
                times: 1,
            },
        ]
        .into_iter(),
    )
}

pub(crate) fn terminal_segments(literal: &str) -> Segments<'_> {
    Box::new(std::iter::once(Segment::Literal(literal)))
}

// ============================================================================
// Repetition helpers (run-length and iteration blocks)
// ============================================================================

/// Locates `index` inside `base` repeated `count` times.
///
/// Only the offset within one copy matters, so the descent continues at
/// `index % base_len` regardless of how long the run is.
pub fn char_in_repetition(base: &str, count: u64, index: u64, base_len: u64) -> Result<Locate<'_>> {
    let length = base_len.saturating_mul(count);
    if index >= length {
        return Err(GrammarError::IndexOutOfRange { index, length });
    }
    Ok(Locate::Descend {
        symbol: base,
        index: index % base_len,
    })
}

/// Splits `start..end` of `base` repeated `count` times into per-copy slices.
///
/// Copies `start / base_len` through `(end - 1) / base_len` are visited; the
/// first and last may be partial.
pub fn substring_in_repetition<'r>(
    base: &'r str,
    count: u64,
    start: u64,
    end: u64,
    base_len: u64,
    out: &mut Vec<Piece<'r>>,
) -> Result<()> {
    let length = base_len.saturating_mul(count);
    if start > end || end > length {
        return Err(GrammarError::RangeOutOfBounds { start, end, length });
    }
    if start == end {
        return Ok(());
    }

    let first_rep = start / base_len;
    let last_rep = (end - 1) / base_len;
    for rep in first_rep..=last_rep {
        let local_start = if rep == first_rep { start % base_len } else { 0 };
        let local_end = if rep == last_rep {
            (end - 1) % base_len + 1
        } else {
            base_len
        };
        out.push(Piece::Slice {
            symbol: base,
            start: local_start,
            end: local_end,
        });
    }
    Ok(())
}

// ============================================================================
// Helper methods
// ============================================================================

#[inline]
pub(crate) fn char_count(text: &str) -> u64 {
    if text.is_ascii() {
        text.len() as u64
    } else {
        text.chars().count() as u64
    }
}

/// Slices `text` by character offsets. Offsets must be within bounds.
fn char_slice(text: &str, start: u64, end: u64) -> &str {
    if text.is_ascii() {
        return &text[start as usize..end as usize];
    }
    let byte_offset = |chars: u64| {
        text.char_indices()
            .nth(chars as usize)
            .map_or(text.len(), |(offset, _)| offset)
    };
    &text[byte_offset(start)..byte_offset(end)]
}
