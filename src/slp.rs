use crate::error::Result;
use crate::grammar::{Grammar, SymbolView};
use crate::rule::{Rule, RuleKind};
use crate::variant::{self, disallowed, Lengths, Locate, Piece, Segments, Variant};

/// Straight-Line Program: a grammar of terminal and binary rules that
/// generates exactly one string.
///
/// Lengths follow directly from the rules:
/// - `A -> a`: `|exp(A)| = |a|`
/// - `A -> B C`: `|exp(A)| = |exp(B)| + |exp(C)|`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slp;

pub type SlpGrammar = Grammar<Slp>;

impl Variant for Slp {
    const NAME: &'static str = "SLP";

    fn permits(kind: RuleKind) -> bool {
        matches!(kind, RuleKind::Terminal | RuleKind::Binary)
    }

    fn rule_size(rule: &Rule) -> u64 {
        match rule {
            Rule::Terminal(_) => 1,
            Rule::Binary { .. } => 2,
            // Disallowed kinds are rejected before any size is taken
            Rule::RunLength { .. } | Rule::Iteration { .. } => 0,
        }
    }

    fn rule_length(symbol: &str, rule: &Rule, lengths: Lengths<'_>) -> Result<u64> {
        match rule {
            Rule::Terminal(literal) => variant::terminal_length(symbol, literal),
            Rule::Binary { left, right } => variant::binary_length(symbol, left, right, lengths),
            Rule::RunLength { .. } | Rule::Iteration { .. } => Err(disallowed::<Self>(symbol, rule)),
        }
    }

    fn rule_expand(rule: &Rule) -> Segments<'_> {
        match rule {
            Rule::Terminal(literal) => variant::terminal_segments(literal),
            Rule::Binary { left, right } => variant::binary_segments(left, right),
            Rule::RunLength { .. } | Rule::Iteration { .. } => Box::new(std::iter::empty()),
        }
    }

    fn rule_char_at<'r>(
        symbol: &str,
        rule: &'r Rule,
        index: u64,
        lengths: Lengths<'_>,
    ) -> Result<Locate<'r>> {
        match rule {
            Rule::Terminal(literal) => variant::terminal_char_at(literal, index),
            Rule::Binary { left, right } => variant::binary_char_at(left, right, index, lengths),
            Rule::RunLength { .. } | Rule::Iteration { .. } => Err(disallowed::<Self>(symbol, rule)),
        }
    }

    fn rule_substring<'r>(
        symbol: &str,
        rule: &'r Rule,
        start: u64,
        end: u64,
        lengths: Lengths<'_>,
        out: &mut Vec<Piece<'r>>,
    ) -> Result<()> {
        match rule {
            Rule::Terminal(literal) => variant::terminal_substring(literal, start, end, out),
            Rule::Binary { left, right } => {
                variant::binary_substring(left, right, start, end, lengths, out)
            }
            Rule::RunLength { .. } | Rule::Iteration { .. } => Err(disallowed::<Self>(symbol, rule)),
        }
    }
}

impl Grammar<Slp> {
    /// Renders the derivation tree of the start symbol, e.g. `((a b) (a b))`.
    pub fn expression_nested(&self) -> String {
        self.root().expression_nested()
    }
}

impl SymbolView<'_, Slp> {
    /// Renders the derivation tree below this symbol.
    ///
    /// Single-character terminals print bare, longer terminals are quoted and
    /// binary rules print as `(left right)`.
    pub fn expression_nested(&self) -> String {
        let mut out = String::new();
        write_nested(self.grammar(), self.name(), &mut out);
        out
    }
}

/// Pending output of the nested rendering, popped in order.
enum Task<'g> {
    Open(&'g str),
    Space,
    Close,
}

fn write_nested(grammar: &Grammar<Slp>, symbol: &str, out: &mut String) {
    let mut stack = vec![Task::Open(symbol)];
    while let Some(task) = stack.pop() {
        match task {
            Task::Space => out.push(' '),
            Task::Close => out.push(')'),
            Task::Open(symbol) => match grammar.resolve(symbol) {
                Rule::Terminal(literal) => {
                    if literal.chars().nth(1).is_none() {
                        out.push_str(literal);
                    } else {
                        out.push('"');
                        out.push_str(literal);
                        out.push('"');
                    }
                }
                Rule::Binary { left, right } => {
                    out.push('(');
                    stack.extend([Task::Close, Task::Open(right), Task::Space, Task::Open(left)]);
                }
                // Never stored in a validated SLP
                Rule::RunLength { .. } | Rule::Iteration { .. } => {}
            },
        }
    }
}
