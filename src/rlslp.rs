use crate::error::{GrammarError, Result};
use crate::grammar::Grammar;
use crate::rule::{Rule, RuleKind};
use crate::slp::Slp;
use crate::variant::{self, disallowed, Lengths, Locate, Piece, Segment, Segments, Variant};

/// Run-Length Straight-Line Program: an SLP extended with run-length rules
/// `A -> B^t`, where `|exp(A)| = t * |exp(B)|`.
///
/// Random access into a run never looks at more than one copy of the base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rlslp;

pub type RlslpGrammar = Grammar<Rlslp>;

impl Variant for Rlslp {
    const NAME: &'static str = "RLSLP";

    fn permits(kind: RuleKind) -> bool {
        matches!(
            kind,
            RuleKind::Terminal | RuleKind::Binary | RuleKind::RunLength
        )
    }

    fn rule_size(rule: &Rule) -> u64 {
        match rule {
            Rule::RunLength { .. } => 2,
            _ => Slp::rule_size(rule),
        }
    }

    fn rule_length(symbol: &str, rule: &Rule, lengths: Lengths<'_>) -> Result<u64> {
        match rule {
            Rule::RunLength { base, count } => {
                if *count < 2 {
                    return Err(GrammarError::RunLengthCount {
                        symbol: symbol.to_string(),
                        count: *count,
                    });
                }
                lengths(base)
                    .checked_mul(*count)
                    .ok_or_else(|| GrammarError::LengthOverflow(symbol.to_string()))
            }
            Rule::Iteration { .. } => Err(disallowed::<Self>(symbol, rule)),
            Rule::Terminal(_) | Rule::Binary { .. } => Slp::rule_length(symbol, rule, lengths),
        }
    }

    fn rule_expand(rule: &Rule) -> Segments<'_> {
        match rule {
            Rule::RunLength { base, count } => Box::new(std::iter::once(Segment::Repeat {
                symbol: base,
                times: *count,
            })),
            _ => Slp::rule_expand(rule),
        }
    }

    fn rule_char_at<'r>(
        symbol: &str,
        rule: &'r Rule,
        index: u64,
        lengths: Lengths<'_>,
    ) -> Result<Locate<'r>> {
        match rule {
            Rule::RunLength { base, count } => {
                variant::char_in_repetition(base, *count, index, lengths(base))
            }
            Rule::Iteration { .. } => Err(disallowed::<Self>(symbol, rule)),
            Rule::Terminal(_) | Rule::Binary { .. } => {
                Slp::rule_char_at(symbol, rule, index, lengths)
            }
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
            Rule::RunLength { base, count } => {
                variant::substring_in_repetition(base, *count, start, end, lengths(base), out)
            }
            Rule::Iteration { .. } => Err(disallowed::<Self>(symbol, rule)),
            Rule::Terminal(_) | Rule::Binary { .. } => {
                Slp::rule_substring(symbol, rule, start, end, lengths, out)
            }
        }
    }
}
