use crate::error::{GrammarError, Result};
use crate::grammar::Grammar;
use crate::rule::{IterationComponent, Rule, RuleKind};
use crate::slp::Slp;
use crate::variant::{self, disallowed, Lengths, Locate, Piece, Segment, Segments, Variant};

/// Iterated Straight-Line Program: an SLP extended with iteration rules
/// `A -> prod_{i=k1}^{k2} B_1^{i^{c_1}} ... B_t^{i^{c_t}}`.
///
/// `|exp(A)| = sum_{i=k1}^{k2} sum_{r=1}^{t} |exp(B_r)| * i^{c_r}`.
///
/// Random access walks the blocks `(i, r)` of an iteration in expansion
/// order and continues inside the matching `B_r` modulo its length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Islp;

pub type IslpGrammar = Grammar<Islp>;

impl Variant for Islp {
    const NAME: &'static str = "ISLP";

    fn permits(kind: RuleKind) -> bool {
        matches!(
            kind,
            RuleKind::Terminal | RuleKind::Binary | RuleKind::Iteration
        )
    }

    fn rule_size(rule: &Rule) -> u64 {
        match rule {
            Rule::Iteration { components, .. } => 2 * components.len() as u64 + 2,
            _ => Slp::rule_size(rule),
        }
    }

    fn rule_length(symbol: &str, rule: &Rule, lengths: Lengths<'_>) -> Result<u64> {
        match rule {
            Rule::Iteration { k1, k2, components } => {
                iteration_length(symbol, *k1, *k2, components, lengths)
            }
            Rule::RunLength { .. } => Err(disallowed::<Self>(symbol, rule)),
            Rule::Terminal(_) | Rule::Binary { .. } => Slp::rule_length(symbol, rule, lengths),
        }
    }

    fn rule_expand(rule: &Rule) -> Segments<'_> {
        match rule {
            Rule::Iteration { k1, k2, components } => {
                // Block counts were proven to fit while computing lengths
                Box::new((*k1..=*k2).flat_map(move |i| {
                    components.iter().map(move |component| Segment::Repeat {
                        symbol: &component.symbol,
                        times: i.saturating_pow(component.exponent),
                    })
                }))
            }
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
            Rule::Iteration { k1, k2, components } => {
                let (row, row_start) = find_row(*k1, *k2, components, lengths, index);
                let mut offset = index - row_start;
                for block in blocks(row, *k2, components, lengths) {
                    if offset < block.len {
                        return variant::char_in_repetition(
                            block.symbol,
                            block.times,
                            offset,
                            block.base_len,
                        );
                    }
                    offset -= block.len;
                }
                Err(GrammarError::IndexOutOfRange {
                    index,
                    length: lengths(symbol),
                })
            }
            Rule::RunLength { .. } => Err(disallowed::<Self>(symbol, rule)),
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
            Rule::Iteration { k1, k2, components } => {
                let length = lengths(symbol);
                if start > end || end > length {
                    return Err(GrammarError::RangeOutOfBounds { start, end, length });
                }

                if start == end {
                    return Ok(());
                }
                let (row, mut block_start) = find_row(*k1, *k2, components, lengths, start);
                for block in blocks(row, *k2, components, lengths) {
                    if block_start >= end {
                        break;
                    }
                    let block_end = block_start + block.len;
                    if block_end > start {
                        variant::substring_in_repetition(
                            block.symbol,
                            block.times,
                            start.saturating_sub(block_start),
                            end.min(block_end) - block_start,
                            block.base_len,
                            out,
                        )?;
                    }
                    block_start = block_end;
                }
                Ok(())
            }
            Rule::RunLength { .. } => Err(disallowed::<Self>(symbol, rule)),
            Rule::Terminal(_) | Rule::Binary { .. } => {
                Slp::rule_substring(symbol, rule, start, end, lengths, out)
            }
        }
    }
}

fn check_bounds(symbol: &str, k1: u64, k2: u64) -> Result<()> {
    if k1 < 1 || k2 < 1 || k1 > k2 {
        return Err(GrammarError::IterationBounds {
            symbol: symbol.to_string(),
            k1,
            k2,
        });
    }
    Ok(())
}

fn iteration_length(
    symbol: &str,
    k1: u64,
    k2: u64,
    components: &[IterationComponent],
    lengths: Lengths<'_>,
) -> Result<u64> {
    check_bounds(symbol, k1, k2)?;
    let overflow = || GrammarError::LengthOverflow(symbol.to_string());

    let mut total = 0u64;
    for component in components {
        let base_len = lengths(&component.symbol);
        if base_len == 0 {
            continue;
        }
        let repetitions = power_sum(k1, k2, component.exponent).ok_or_else(overflow)?;
        total = base_len
            .checked_mul(repetitions)
            .and_then(|block| total.checked_add(block))
            .ok_or_else(overflow)?;
    }
    Ok(total)
}

/// `sum_{i=k1}^{k2} i^exponent`, or `None` on overflow.
fn power_sum(k1: u64, k2: u64, exponent: u32) -> Option<u64> {
    if exponent == 0 {
        return Some(k2 - k1 + 1);
    }
    // The last term alone must fit
    k2.checked_pow(exponent)?;

    // Faulhaber's formulas; none of them overflow u128 once k2^exponent fits u64
    let prefix = |n: u64| -> u128 {
        let n = u128::from(n);
        match exponent {
            1 => n * (n + 1) / 2,
            2 => n * (n + 1) * (2 * n + 1) / 6,
            _ => (n * (n + 1) / 2).pow(2),
        }
    };
    match exponent {
        1..=3 => u64::try_from(prefix(k2) - prefix(k1 - 1)).ok(),
        // k2 < 2^16 here
        _ => (k1..=k2).try_fold(0u64, |acc, i| acc.checked_add(i.checked_pow(exponent)?)),
    }
}

/// Total length of rows `k1..row`, i.e. the offset at which `row` starts.
fn rows_before(k1: u64, row: u64, components: &[IterationComponent], lengths: Lengths<'_>) -> u64 {
    if row <= k1 {
        return 0;
    }
    components.iter().fold(0u64, |acc, component| {
        let base_len = lengths(&component.symbol);
        let repetitions = power_sum(k1, row - 1, component.exponent).unwrap_or(u64::MAX);
        acc.saturating_add(base_len.saturating_mul(repetitions))
    })
}

/// Binary search for the row `i` whose blocks cover `index`.
///
/// Returns the row and the offset at which it starts.
fn find_row(
    k1: u64,
    k2: u64,
    components: &[IterationComponent],
    lengths: Lengths<'_>,
    index: u64,
) -> (u64, u64) {
    let (mut lo, mut hi) = (k1, k2);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if rows_before(k1, mid + 1, components, lengths) > index {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    (lo, rows_before(k1, lo, components, lengths))
}

/// One block `B_r^{i^{c_r}}` of an expanded iteration rule.
struct Block<'r> {
    symbol: &'r str,
    times: u64,
    base_len: u64,
    len: u64,
}

/// Non-empty blocks of an iteration rule in expansion order, from row
/// `first` onwards.
fn blocks<'r, 'a>(
    first: u64,
    k2: u64,
    components: &'r [IterationComponent],
    lengths: Lengths<'a>,
) -> impl Iterator<Item = Block<'r>> + 'a
where
    'r: 'a,
{
    (first..=k2).flat_map(move |i| {
        components.iter().filter_map(move |component| {
            let base_len = lengths(&component.symbol);
            if base_len == 0 {
                return None;
            }
            let times = i.saturating_pow(component.exponent);
            Some(Block {
                symbol: &component.symbol,
                times,
                base_len,
                len: base_len.saturating_mul(times),
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a_pow_i_b() -> IslpGrammar {
        IslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("B", Rule::terminal("b")),
                ("S", Rule::iteration(1, 4, [("A", 1), ("B", 0)])),
            ],
            "S",
        )
        .unwrap()
    }

    #[test]
    fn test_string_family() {
        let islp = a_pow_i_b();
        assert_eq!(islp.length(), 14);
        assert_eq!(islp.expression().unwrap(), "abaabaaabaaaab");
        assert_eq!(islp.size(), 8);
    }

    #[test]
    fn test_char_at_and_substring() {
        let islp = a_pow_i_b();
        assert_eq!(islp.char_at(1), Ok('b'));
        assert_eq!(islp.char_at(13), Ok('b'));
        assert_eq!(islp.char_at(12), Ok('a'));
        assert_eq!(islp.substring(2, 9).unwrap(), "aabaaab");
        assert_eq!(islp.substring(0, 14).unwrap(), "abaabaaabaaaab");
        assert!(matches!(
            islp.char_at(14),
            Err(GrammarError::IndexOutOfRange {
                index: 14,
                length: 14
            })
        ));
    }

    #[test]
    fn test_rule_size() {
        let islp = IslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("B", Rule::terminal("b")),
                ("S", Rule::iteration(1, 3, [("A", 1), ("B", 0)])),
            ],
            "S",
        )
        .unwrap();
        assert_eq!(islp.size(), 1 + 1 + 6);
        assert_eq!(islp.substring(0, 1).unwrap(), "a");
        assert_eq!(islp.substring(2, 3).unwrap(), "a");
        assert_eq!(islp.substring(0, 9).unwrap(), "abaabaaab");
    }

    #[test]
    fn test_binary_only_islp() {
        let islp = IslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("B", Rule::terminal("b")),
                ("C", Rule::binary("A", "B")),
                ("S", Rule::binary("C", "A")),
            ],
            "S",
        )
        .unwrap();
        assert_eq!(islp.length(), 3);
        assert_eq!(islp.size(), 1 + 1 + 2 + 2);
        assert_eq!(islp.expression().unwrap(), "aba");
        assert_eq!(islp.char_at(2), Ok('a'));
        assert_eq!(islp.substring(1, 3).unwrap(), "ba");
    }

    #[test]
    fn test_bounds_rejected() {
        let err = IslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("S", Rule::iteration(0, 1, [("A", 0)])),
            ],
            "S",
        )
        .unwrap_err();
        assert_eq!(
            err,
            GrammarError::IterationBounds {
                symbol: "S".into(),
                k1: 0,
                k2: 1
            }
        );

        assert!(IslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("S", Rule::iteration(3, 2, [("A", 1)])),
            ],
            "S",
        )
        .is_err());
    }

    #[test]
    fn test_squares() {
        // prod_{i=2}^{3} (ab)^{i^2} c
        let islp = IslpGrammar::new(
            [
                ("AB", Rule::terminal("ab")),
                ("C", Rule::terminal("c")),
                ("S", Rule::iteration(2, 3, [("AB", 2), ("C", 0)])),
            ],
            "S",
        )
        .unwrap();
        let expected = format!("{}c{}c", "ab".repeat(4), "ab".repeat(9));
        assert_eq!(islp.length(), expected.len() as u64);
        assert_eq!(islp.expression().unwrap(), expected);
        assert_eq!(islp.substring(7, 12).unwrap(), &expected[7..12]);
        assert_eq!(islp.char_at(8), Ok('c'));
    }

    #[test]
    fn test_empty_iteration() {
        let islp = IslpGrammar::new(
            [
                ("E", Rule::iteration(1, 5, Vec::<(String, u32)>::new())),
                ("A", Rule::terminal("a")),
                ("S", Rule::iteration(1, 2, [("E", 3), ("A", 0)])),
            ],
            "S",
        )
        .unwrap();
        assert_eq!(islp.symbol("E").unwrap().length(), 0);
        assert_eq!(islp.expression().unwrap(), "aa");
        assert_eq!(islp.char_at(1), Ok('a'));
        assert_eq!(islp.size(), 2 + 1 + 6);
    }

    #[test]
    fn test_power_overflow() {
        let err = IslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("S", Rule::iteration(1, 1 << 20, [("A", 4)])),
            ],
            "S",
        )
        .unwrap_err();
        assert_eq!(err, GrammarError::LengthOverflow("S".into()));
    }

    #[test]
    fn test_power_sum() {
        assert_eq!(power_sum(1, 4, 0), Some(4));
        assert_eq!(power_sum(1, 4, 1), Some(10));
        assert_eq!(power_sum(2, 3, 2), Some(13));
        assert_eq!(power_sum(1, 10, 3), Some(3025));
        assert_eq!(power_sum(3, 5, 4), Some(81 + 256 + 625));
        assert_eq!(power_sum(u64::MAX - 1, u64::MAX, 1), None);
        assert_eq!(power_sum(1, 1 << 32, 2), None);
    }

    #[test]
    fn test_long_iteration_access() {
        // prod_{i=1}^{2^30} a^i b, so row i starts at i(i-1)/2 + (i-1)
        let islp = IslpGrammar::new(
            [
                ("A", Rule::terminal("a")),
                ("B", Rule::terminal("b")),
                ("S", Rule::iteration(1, 1 << 30, [("A", 1), ("B", 0)])),
            ],
            "S",
        )
        .unwrap();
        let n: u64 = 1 << 30;
        assert_eq!(islp.length(), n * (n + 1) / 2 + n);
        assert_eq!(islp.char_at(islp.length() - 1), Ok('b'));
        assert_eq!(islp.char_at(islp.length() - 2), Ok('a'));

        let row = 1_000_000u64;
        let row_start = row * (row - 1) / 2 + (row - 1);
        assert_eq!(
            islp.substring(row_start - 2, row_start + 3).unwrap(),
            "abaaa"
        );
    }
}
