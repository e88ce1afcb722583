//! Relation and sort modifier handling.
//!
//! CQL annotates relations and sort indexes with modifiers such as
//! `/respectCase` or `/sort.descending`. Modifiers resolve into one typed
//! configuration per term; `@`-prefixed modifiers are application-defined
//! and pass through to the caller untouched.

use crate::ast::{CqlModifier, CqlSortIndex, CqlTermNode};
use crate::error::{QueryError, QueryResult};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CqlSort {
    /// Ascending order (the default).
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

/// Case handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CqlCase {
    /// Case-insensitive matching (the default).
    #[default]
    IgnoreCase,
    /// Case-sensitive matching.
    RespectCase,
}

/// Accent handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CqlAccents {
    /// Accent-insensitive matching (the default).
    #[default]
    IgnoreAccents,
    /// Accent-sensitive matching.
    RespectAccents,
}

/// How the term value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CqlTermFormat {
    /// The term is a string (the default).
    #[default]
    String,
    /// The term is a number and compares numerically.
    Number,
}

/// Whether wildcard characters in the term are active.
///
/// Only masked terms are supported today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CqlMasking {
    /// `*` and `?` act as wildcards (the default and only value).
    #[default]
    Masked,
}

/// The resolved modifier configuration of one term or sort index.
///
/// Defaults are ascending, ignoreCase, ignoreAccents, string and masked.
/// When the same category appears several times the last one wins.
#[derive(Debug, Clone, Default)]
pub struct CqlModifiers {
    /// Sort direction.
    pub sort: CqlSort,
    /// Case handling.
    pub case: CqlCase,
    /// Accent handling.
    pub accents: CqlAccents,
    /// Term value interpretation.
    pub term_format: CqlTermFormat,
    /// Wildcard masking.
    pub masking: CqlMasking,
    /// Unrecognized `@`-prefixed modifiers, in query order, unvalidated.
    pub relation_modifiers: Vec<CqlModifier>,
}

impl CqlModifiers {
    /// Resolves the relation modifiers of a term node.
    pub fn from_term(node: &CqlTermNode) -> QueryResult<Self> {
        let mut modifiers = CqlModifiers::default();
        modifiers.read_modifiers(&node.relation.modifiers)?;
        Ok(modifiers)
    }

    /// Resolves the modifiers of a sort index.
    pub fn from_sort_index(sort_index: &CqlSortIndex) -> QueryResult<Self> {
        let mut modifiers = CqlModifiers::default();
        modifiers.read_modifiers(&sort_index.modifiers)?;
        Ok(modifiers)
    }

    /// Reads the modifier list and overwrites the matching category for
    /// each entry, so repeats are last-wins in a single pass.
    ///
    /// Names are matched case-insensitively. `@`-prefixed entries are
    /// collected without validation; any other unknown name is an error.
    pub fn read_modifiers(&mut self, modifiers: &[CqlModifier]) -> QueryResult<()> {
        for modifier in modifiers {
            if modifier.name.starts_with('@') {
                self.relation_modifiers.push(modifier.clone());
                continue;
            }
            match modifier.name.to_lowercase().as_str() {
                "ignorecase" => self.case = CqlCase::IgnoreCase,
                "respectcase" => self.case = CqlCase::RespectCase,
                "ignoreaccents" => self.accents = CqlAccents::IgnoreAccents,
                "respectaccents" => self.accents = CqlAccents::RespectAccents,
                "string" => self.term_format = CqlTermFormat::String,
                "number" => self.term_format = CqlTermFormat::Number,
                "sort.ascending" => self.sort = CqlSort::Ascending,
                "sort.descending" => self.sort = CqlSort::Descending,
                "masked" => self.masking = CqlMasking::Masked,
                _ => {
                    return Err(QueryError::UnsupportedModifier {
                        name: modifier.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
