use crate::grammar::Grammar;
use crate::variant::{Segment, Segments, Variant};
use std::iter::FusedIterator;
use std::str::Chars;

/// Iterator over the characters of a nonterminal's expansion.
///
/// Walks the grammar with an explicit stack, so memory use is bounded by the
/// grammar depth rather than by the expansion length.
pub struct Expansion<'g, V> {
    grammar: &'g Grammar<V>,
    /// Characters of the terminal currently being emitted
    literal: Option<Chars<'g>>,
    /// One frame per rule being expanded
    stack: Vec<Frame<'g>>,
}

/// Stack entry for tracking position inside a rule's expansion.
struct Frame<'g> {
    segments: Segments<'g>,
    /// Symbol being repeated and how many copies are still to be emitted
    pending: Option<(&'g str, u64)>,
}

impl<'g, V: Variant> Expansion<'g, V> {
    pub(crate) fn new(grammar: &'g Grammar<V>, symbol: &'g str) -> Self {
        let mut iter = Self {
            grammar,
            literal: None,
            stack: Vec::new(),
        };
        // An empty expansion may still have many empty rows to walk
        if grammar.length_by_name(symbol) > 0 {
            iter.descend(symbol);
        }
        iter
    }

    fn descend(&mut self, symbol: &'g str) {
        self.stack.push(Frame {
            segments: V::rule_expand(self.grammar.resolve(symbol)),
            pending: None,
        });
    }
}

impl<V: Variant> Iterator for Expansion<'_, V> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        loop {
            if let Some(chars) = &mut self.literal {
                if let Some(c) = chars.next() {
                    return Some(c);
                }
                self.literal = None;
            }

            let frame = self.stack.last_mut()?;

            if let Some((symbol, remaining)) = frame.pending {
                if remaining > 0 {
                    frame.pending = Some((symbol, remaining - 1));
                    self.descend(symbol);
                    continue;
                }
                frame.pending = None;
            }

            match frame.segments.next() {
                Some(Segment::Literal(text)) => self.literal = Some(text.chars()),
                Some(Segment::Repeat { symbol, times }) => {
                    // Copies of an empty expansion contribute nothing
                    if self.grammar.length_by_name(symbol) > 0 {
                        frame.pending = Some((symbol, times));
                    }
                }
                None => {
                    // End of rule, return to the parent
                    self.stack.pop();
                }
            }
        }
    }
}

impl<V: Variant> FusedIterator for Expansion<'_, V> {}

#[cfg(test)]
mod tests {
    use crate::rule::Rule;
    use crate::{IslpGrammar, RlslpGrammar, SlpGrammar};

    #[test]
    fn test_chars_single_terminal() {
        let slp = SlpGrammar::new([("S", Rule::terminal("xyz"))], "S").unwrap();
        let collected: Vec<char> = slp.chars().collect();
        assert_eq!(collected, vec!['x', 'y', 'z']);
    }

    #[test]
    fn test_chars_nested_runs() {
        let rlslp = RlslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("B", Rule::terminal("b")),
                ("AAA", Rule::run_length("A", 3)),
                ("AB", Rule::binary("AAA", "B")),
                ("S", Rule::run_length("AB", 2)),
            ],
            "S",
        )
        .unwrap();
        let collected: String = rlslp.chars().collect();
        assert_eq!(collected, "aaabaaab");
    }

    #[test]
    fn test_chars_is_lazy() {
        // 2^40 characters, only the first few are pulled
        let mut rules = vec![("X0".to_string(), Rule::terminal("ab"))];
        for level in 1..=39 {
            rules.push((
                format!("X{level}"),
                Rule::run_length(format!("X{}", level - 1), 2),
            ));
        }
        let rlslp = RlslpGrammar::new(rules, "X39").unwrap();
        let prefix: String = rlslp.chars().take(5).collect();
        assert_eq!(prefix, "ababa");
    }

    #[test]
    fn test_chars_iteration_order() {
        let islp = IslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("B", Rule::terminal("b")),
                ("S", Rule::iteration(2, 3, [("B", 0), ("A", 1)])),
            ],
            "S",
        )
        .unwrap();
        let collected: String = islp.chars().collect();
        assert_eq!(collected, "baabaaa");
    }

    #[test]
    fn test_chars_of_empty_iteration_root() {
        let islp = IslpGrammar::new(
            [
                ("E", Rule::iteration(1, 1, Vec::<(String, u32)>::new())),
                ("Z", Rule::iteration(1, u64::MAX, [("E", 0)])),
            ],
            "Z",
        )
        .unwrap();
        assert_eq!(islp.length(), 0);
        assert_eq!(islp.chars().next(), None);
        assert_eq!(islp.expression().unwrap(), "");
        assert_eq!(islp.symbol("E").unwrap().expression().unwrap(), "");
    }

    #[test]
    fn test_chars_of_inner_symbol() {
        let slp = SlpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("B", Rule::terminal("b")),
                ("C", Rule::binary("A", "B")),
                ("S", Rule::binary("C", "C")),
            ],
            "S",
        )
        .unwrap();
        let collected: String = slp.symbol("C").unwrap().chars().collect();
        assert_eq!(collected, "ab");

        let mut iter = slp.chars();
        assert_eq!(iter.by_ref().count(), 4);
        assert_eq!(iter.next(), None);
    }
}
