//! Shorthand variable resolution.
//!
//! Receiver configurations may abbreviate common expression fragments as
//! `%name` variables, kept in a lookup table shipped with the deployment.
//! Variables are substituted textually before parsing; a fragment may itself
//! contain further variables, so resolution iterates up to a fixed depth.

use crate::error::RuleError;
use std::collections::HashMap;

const MAX_RESOLUTION_PASSES: usize = 10;

/// Lookup table mapping shorthand names to expression fragments.
#[derive(Debug, Clone, Default)]
pub struct ShorthandTable {
    entries: HashMap<String, String>,
}

impl ShorthandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, expression: impl Into<String>) {
        self.entries.insert(name.into(), expression.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every `%name` occurrence in [`input`] to its expression
    /// fragment. Unknown variables and non-terminating (cyclic) definitions
    /// are errors, not silent passthroughs.
    pub fn resolve(&self, input: &str) -> Result<String, RuleError> {
        let mut current = input.to_string();
        for _ in 0..MAX_RESOLUTION_PASSES {
            if !current.contains('%') {
                return Ok(current);
            }
            current = self.resolve_once(&current)?;
        }
        // Still unresolved after the pass budget: a definition loops.
        let name = first_variable(&current).unwrap_or_default();
        Err(RuleError::ShorthandCycle(name))
    }

    fn resolve_once(&self, input: &str) -> Result<String, RuleError> {
        let mut out = String::with_capacity(input.len());
        let mut chars = input.char_indices().peekable();
        while let Some((_, ch)) = chars.next() {
            if ch != '%' {
                out.push(ch);
                continue;
            }
            let mut name = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                return Err(RuleError::parse("dangling '%' in expression"));
            }
            match self.entries.get(&name) {
                Some(fragment) => out.push_str(fragment),
                None => return Err(RuleError::UnknownShorthand(name)),
            }
        }
        Ok(out)
    }
}

fn first_variable(input: &str) -> Option<String> {
    let idx = input.find('%')?;
    let name: String = input[idx + 1..]
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    Some(name)
}
