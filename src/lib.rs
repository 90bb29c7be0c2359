//! # SLP-rs - Grammar-Compressed Strings
//!
//! Straight-Line Programs (SLPs) and two extensions, Run-Length SLPs and
//! Iterated SLPs, with validation, length computation, expansion and random
//! access that does not materialize the string.
//!
//! A grammar maps nonterminal names to [`Rule`]s and has a start symbol. Each
//! family accepts a different set of rule kinds:
//!
//! | Grammar          | Terminal | Binary | Run-length | Iteration |
//! |------------------|----------|--------|------------|-----------|
//! | [`SlpGrammar`]   | yes      | yes    |            |           |
//! | [`RlslpGrammar`] | yes      | yes    | yes        |           |
//! | [`IslpGrammar`]  | yes      | yes    |            | yes       |
//!
//! ## Example
//!
//! ```
//! use slp_rs::{Rule, RlslpGrammar};
//!
//! let rlslp = RlslpGrammar::new(
//!     [("A", Rule::terminal("ab")), ("S", Rule::run_length("A", 5))],
//!     "S",
//! )?;
//!
//! assert_eq!(rlslp.length(), 10);
//! assert_eq!(rlslp.expression()?, "ababababab");
//! assert_eq!(rlslp.char_at(6)?, 'a');
//! assert_eq!(rlslp.substring(2, 8)?, "ababab");
//! # Ok::<(), slp_rs::GrammarError>(())
//! ```
//!
//! ## Performance
//!
//! - Lengths of all nonterminals are computed once, at construction
//! - `char_at` and `substring` cost O(depth) steps plus the output size
//!   (iteration rules add a walk over their blocks)
//! - Length and access passes use explicit stacks, so deep grammars do not
//!   exhaust the call stack

mod error;
mod expand;
mod grammar;
mod islp;
mod rlslp;
mod rule;
mod slp;
mod variant;

#[cfg(test)]
mod tests;

pub use error::{ErrorKind, GrammarError, Result};
pub use expand::Expansion;
pub use grammar::{Grammar, SymbolView, DEFAULT_MAX_LENGTH};
pub use islp::{Islp, IslpGrammar};
pub use rlslp::{Rlslp, RlslpGrammar};
pub use rule::{IterationComponent, Rule, RuleKind};
pub use slp::{Slp, SlpGrammar};
pub use variant::{
    char_in_repetition, substring_in_repetition, Lengths, Locate, Piece, Segment, Segments,
    Variant,
};
