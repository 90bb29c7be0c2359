use std::fmt;

/// A single production of a grammar.
///
/// Which variants a grammar accepts depends on its [`Variant`](crate::Variant):
/// SLPs take terminals and binary rules, RLSLPs add run-length rules and
/// ISLPs add iteration rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rule {
    /// `A -> a`: a non-empty literal. The only way characters enter a grammar.
    Terminal(String),

    /// `A -> B C`: concatenation of the expansions of `left` and `right`.
    Binary { left: String, right: String },

    /// `A -> B^t`: the expansion of `base` repeated `count` times.
    ///
    /// Theory usually assumes `t >= 3`; `t >= 2` is accepted so small
    /// examples stay expressible.
    RunLength { base: String, count: u64 },

    /// `A -> prod_{i=k1}^{k2} B_1^{i^{c_1}} ... B_t^{i^{c_t}}`.
    Iteration {
        k1: u64,
        k2: u64,
        components: Vec<IterationComponent>,
    },
}

/// One block `B_r^{i^{c_r}}` of an iteration rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IterationComponent {
    /// The repeated nonterminal `B_r`.
    pub symbol: String,
    /// The exponent `c_r`; block `i` repeats `symbol` `i^c_r` times.
    pub exponent: u32,
}

impl IterationComponent {
    pub fn new(symbol: impl Into<String>, exponent: u32) -> Self {
        Self {
            symbol: symbol.into(),
            exponent,
        }
    }
}

/// The shape of a [`Rule`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Terminal,
    Binary,
    RunLength,
    Iteration,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleKind::Terminal => "terminal",
            RuleKind::Binary => "binary",
            RuleKind::RunLength => "run-length",
            RuleKind::Iteration => "iteration",
        };
        f.write_str(name)
    }
}

impl Rule {
    pub fn terminal(literal: impl Into<String>) -> Self {
        Rule::Terminal(literal.into())
    }

    pub fn binary(left: impl Into<String>, right: impl Into<String>) -> Self {
        Rule::Binary {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn run_length(base: impl Into<String>, count: u64) -> Self {
        Rule::RunLength {
            base: base.into(),
            count,
        }
    }

    /// Builds an iteration rule from `(symbol, exponent)` pairs.
    pub fn iteration<I, S>(k1: u64, k2: u64, components: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Rule::Iteration {
            k1,
            k2,
            components: components
                .into_iter()
                .map(|(symbol, exponent)| IterationComponent::new(symbol, exponent))
                .collect(),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::Terminal(_) => RuleKind::Terminal,
            Rule::Binary { .. } => RuleKind::Binary,
            Rule::RunLength { .. } => RuleKind::RunLength,
            Rule::Iteration { .. } => RuleKind::Iteration,
        }
    }

    /// Nonterminals this rule refers to, in declaration order.
    ///
    /// A symbol used twice (e.g. `A -> B B`) is yielded twice.
    pub fn references(&self) -> impl Iterator<Item = &str> + '_ {
        let direct: [Option<&str>; 2] = match self {
            Rule::Terminal(_) | Rule::Iteration { .. } => [None, None],
            Rule::Binary { left, right } => [Some(left.as_str()), Some(right.as_str())],
            Rule::RunLength { base, .. } => [Some(base.as_str()), None],
        };
        let components: &[IterationComponent] = match self {
            Rule::Iteration { components, .. } => components,
            _ => &[],
        };
        direct
            .into_iter()
            .flatten()
            .chain(components.iter().map(|c| c.symbol.as_str()))
    }
}
