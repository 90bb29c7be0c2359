use crate::rule::RuleKind;
use thiserror::Error;

/// Broad classification of a [`GrammarError`].
///
/// Lets callers tell malformed grammars apart from bad queries without
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The grammar itself is ill-formed.
    Validation,
    /// An index or range fell outside the expansion.
    IndexRange,
    /// A full expansion was refused by the length guard.
    ExpansionTooLarge,
    /// A query named a symbol the grammar does not define.
    Lookup,
}

/// Errors raised while building or querying a grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("start symbol '{0}' is not defined in rules")]
    MissingStart(String),

    #[error("invalid rule type for {symbol}: {kind} rules are not allowed in an {variant}")]
    DisallowedRule {
        symbol: String,
        kind: RuleKind,
        variant: &'static str,
    },

    #[error("undefined nonterminal '{missing}' referenced by {symbol}")]
    UndefinedNonterminal { symbol: String, missing: String },

    #[error("grammar contains a cycle through '{0}'")]
    Cycle(String),

    #[error("terminal string of {0} must be non-empty")]
    EmptyTerminal(String),

    #[error("run-length count of {symbol} must be >= 2, got {count}")]
    RunLengthCount { symbol: String, count: u64 },

    #[error("iteration bounds of {symbol} must satisfy 1 <= k1 <= k2, got k1={k1}, k2={k2}")]
    IterationBounds { symbol: String, k1: u64, k2: u64 },

    #[error("expansion length of {0} does not fit in 64 bits")]
    LengthOverflow(String),

    #[error("index {index} out of range for expansion of length {length}")]
    IndexOutOfRange { index: u64, length: u64 },

    #[error("range {start}..{end} out of bounds for expansion of length {length}")]
    RangeOutOfBounds { start: u64, end: u64, length: u64 },

    #[error("expansion length {length} exceeds max_length={max_length}")]
    ExpansionTooLarge { length: u64, max_length: u64 },

    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),
}

impl GrammarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GrammarError::MissingStart(_)
            | GrammarError::DisallowedRule { .. }
            | GrammarError::UndefinedNonterminal { .. }
            | GrammarError::Cycle(_)
            | GrammarError::EmptyTerminal(_)
            | GrammarError::RunLengthCount { .. }
            | GrammarError::IterationBounds { .. }
            | GrammarError::LengthOverflow(_) => ErrorKind::Validation,
            GrammarError::IndexOutOfRange { .. } | GrammarError::RangeOutOfBounds { .. } => {
                ErrorKind::IndexRange
            }
            GrammarError::ExpansionTooLarge { .. } => ErrorKind::ExpansionTooLarge,
            GrammarError::UnknownSymbol(_) => ErrorKind::Lookup,
        }
    }

    /// Returns true for errors describing an ill-formed grammar.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

pub type Result<T, E = GrammarError> = std::result::Result<T, E>;
