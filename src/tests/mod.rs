
use crate::rule::Rule;

/// A rule to add on top of the grammar built so far.
///
/// Child references are taken modulo the number of rules that already exist,
/// so every generated grammar is acyclic and fully defined.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Binary(usize, usize),
    Run(usize, u64),
    Iter(u64, u64, Vec<(usize, u32)>),
}

/// Which rule kinds a generated grammar may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Slp,
    Rlslp,
    Islp,
}

/// Expansions above this size are replaced by a fresh terminal so that every
/// generated grammar can still be checked against its explicit string.
pub(crate) const EXPANSION_LIMIT: usize = 4_000;

/// Builds rules bottom-up together with the expected expansion of each one.
///
/// Names are `T{i}` for terminals and `N{i}` for the rules built from `ops`;
/// the last name is the natural start symbol.
pub(crate) fn build(
    literals: &[String],
    ops: &[Op],
    family: Family,
) -> (Vec<(String, Rule)>, Vec<String>) {
    let mut names: Vec<String> = Vec::new();
    let mut rules: Vec<(String, Rule)> = Vec::new();
    let mut expansions: Vec<String> = Vec::new();

    for (i, literal) in literals.iter().enumerate() {
        let name = format!("T{i}");
        names.push(name.clone());
        rules.push((name, Rule::terminal(literal.clone())));
        expansions.push(literal.clone());
    }

    for (i, op) in ops.iter().enumerate() {
        let n = names.len();
        let op = match (family, op) {
            (Family::Slp, Op::Run(a, count)) => Op::Binary(*a, *count as usize),
            (Family::Slp, Op::Iter(k1, _, _)) | (Family::Rlslp, Op::Iter(k1, _, _)) => {
                Op::Binary(i, *k1 as usize)
            }
            (Family::Islp, Op::Run(a, count)) => Op::Iter(1, *count, vec![(*a, 0)]),
            _ => op.clone(),
        };

        let (rule, expansion) = match &op {
            Op::Binary(a, b) => {
                let (a, b) = (a % n, b % n);
                (
                    Rule::binary(names[a].clone(), names[b].clone()),
                    format!("{}{}", expansions[a], expansions[b]),
                )
            }
            Op::Run(a, count) => {
                let a = a % n;
                (
                    Rule::run_length(names[a].clone(), *count),
                    expansions[a].repeat(*count as usize),
                )
            }
            Op::Iter(k1, k2, components) => {
                let components: Vec<(usize, u32)> =
                    components.iter().map(|&(c, e)| (c % n, e)).collect();
                let mut expansion = String::new();
                for k in *k1..=*k2 {
                    for &(c, e) in &components {
                        expansion.push_str(&expansions[c].repeat(k.pow(e) as usize));
                    }
                }
                (
                    Rule::iteration(
                        *k1,
                        *k2,
                        components.iter().map(|&(c, e)| (names[c].clone(), e)),
                    ),
                    expansion,
                )
            }
        };

        let name = format!("N{i}");
        names.push(name.clone());
        if expansion.chars().count() > EXPANSION_LIMIT {
            rules.push((name, Rule::terminal("z")));
            expansions.push("z".to_string());
        } else {
            rules.push((name, rule));
            expansions.push(expansion);
        }
    }

    (rules, expansions)
}
