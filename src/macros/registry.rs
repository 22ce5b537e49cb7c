//! Macro registry: a prefix trie keyed by the characters of macro names.
//!
//! # Lookup
//!
//! The automaton walks the trie one character at a time with [`Registry::step`]. Each step
//! answers one of three things: the path died ([`Step::Fail`]), the path continues
//! ([`Step::Partial`]), or a bound name was completed ([`Step::Terminal`]).
//!
//! A bound node may also have children when a longer name extends it. The binding wins:
//! the shorter name is expanded as soon as it completes, so the longer one is unreachable.
//! [`Registry::define`] logs a warning when it registers such a shadowed name.
//!
//! # Lifecycle
//!
//! One registry lives for a whole session and is shared by every chunk processed in it.
//! Entries are only added; redefining a name replaces the binding at its terminal node and
//! leaves the structure beneath it untouched.
//!
//! | Method    | Overwrites | Notes                                   |
//! |-----------|------------|-----------------------------------------|
//! | define    | Yes        | Returns the previous binding, if any    |
//! | step      | N/A        | One character of an in-progress match   |
//! | lookup    | N/A        | Whole-name lookup, ignores shadowing    |
//! | entries   | N/A        | Names in lexical order, for listings    |

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::macros::types::{MacroDefinition, MacroKind};
use crate::{err_msg, MacroError};

/// A trie node: optional binding plus the names that extend it.
#[derive(Debug, Clone, Default)]
pub struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    binding: Option<MacroDefinition>,
}

impl TrieNode {
    pub fn binding(&self) -> Option<&MacroDefinition> {
        self.binding.as_ref()
    }

    pub fn is_extendable(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Result of advancing a match by one character.
#[derive(Debug, Clone, Copy)]
pub enum Step<'r> {
    /// No registered name continues with this character.
    Fail,
    /// Still matching; the node reached so far.
    Partial(&'r TrieNode),
    /// A bound name was completed.
    Terminal(&'r MacroDefinition),
}

/// The session-wide macro table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    root: TrieNode,
    len: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Advances from `node` (the root for a fresh match) by `c`.
    pub fn step<'r>(&'r self, node: &'r TrieNode, c: char) -> Step<'r> {
        let Some(next) = node.children.get(&c) else {
            return Step::Fail;
        };
        match &next.binding {
            Some(definition) => Step::Terminal(definition),
            None if next.is_extendable() => Step::Partial(next),
            None => Step::Fail,
        }
    }

    /// Binds `name` to `definition`, creating intermediate nodes as needed.
    ///
    /// Returns the binding this replaced, if the name was already defined.
    pub fn define(
        &mut self,
        name: &str,
        definition: MacroDefinition,
    ) -> Result<Option<MacroDefinition>, MacroError> {
        if name.is_empty() {
            return Err(err_msg!(Definition, "macro name must not be empty"));
        }
        if let Some(prefix) = self.bound_prefix(name) {
            warn!(
                macro_name = name,
                prefix = prefix.as_str(),
                "macro is shadowed by a shorter macro and will never expand"
            );
        }
        let kind = definition.kind();
        let mut node = &mut self.root;
        for c in name.chars() {
            node = node.children.entry(c).or_default();
        }
        let previous = node.binding.replace(definition);
        if previous.is_none() {
            self.len += 1;
        }
        debug!(macro_name = name, kind = kind.as_str(), redefined = previous.is_some(), "macro defined");
        Ok(previous)
    }

    /// Looks up a whole name, regardless of shorter bound prefixes.
    pub fn lookup(&self, name: &str) -> Option<&MacroDefinition> {
        let mut node = &self.root;
        for c in name.chars() {
            node = node.children.get(&c)?;
        }
        node.binding.as_ref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// All bound names with their kinds, in lexical order.
    pub fn entries(&self) -> Vec<(String, MacroKind)> {
        let mut out = Vec::with_capacity(self.len);
        let mut prefix = String::new();
        collect_entries(&self.root, &mut prefix, &mut out);
        out
    }

    /// The shortest proper prefix of `name` that is already bound.
    fn bound_prefix(&self, name: &str) -> Option<String> {
        let mut node = &self.root;
        let mut prefix = String::new();
        let mut chars = name.chars().peekable();
        while let Some(c) = chars.next() {
            node = node.children.get(&c)?;
            prefix.push(c);
            if node.binding.is_some() && chars.peek().is_some() {
                return Some(prefix);
            }
        }
        None
    }
}

fn collect_entries(node: &TrieNode, prefix: &mut String, out: &mut Vec<(String, MacroKind)>) {
    if let Some(binding) = &node.binding {
        out.push((prefix.clone(), binding.kind()));
    }
    for (c, child) in &node.children {
        prefix.push(*c);
        collect_entries(child, prefix, out);
        prefix.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CallableId;

    fn simple(text: &str) -> MacroDefinition {
        MacroDefinition::Simple(text.to_string())
    }

    /// Walks `input` from the root and reports the final step.
    fn walk<'r>(reg: &'r Registry, input: &str) -> Step<'r> {
        let mut node = reg.root();
        let mut last = Step::Fail;
        for c in input.chars() {
            last = reg.step(node, c);
            match last {
                Step::Partial(next) => node = next,
                _ => return last,
            }
        }
        last
    }

    #[test]
    fn partial_then_terminal_then_fail() {
        let mut reg = Registry::new();
        reg.define("AB", simple("x")).unwrap();
        reg.define("AC", simple("y")).unwrap();
        assert!(matches!(walk(&reg, "A"), Step::Partial(_)));
        assert!(matches!(walk(&reg, "AB"), Step::Terminal(MacroDefinition::Simple(s)) if s == "x"));
        assert!(matches!(walk(&reg, "AD"), Step::Fail));
        assert!(matches!(walk(&reg, "Z"), Step::Fail));
    }

    #[test]
    fn redefinition_replaces_only_the_binding() {
        let mut reg = Registry::new();
        reg.define("PI", simple("3")).unwrap();
        reg.define("PIE", simple("pie")).unwrap();
        let old = reg.define("PI", simple("3.14")).unwrap();
        assert_eq!(old, Some(simple("3")));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.lookup("PI"), Some(&simple("3.14")));
        assert_eq!(reg.lookup("PIE"), Some(&simple("pie")));
    }

    #[test]
    fn bound_name_wins_over_longer_extension() {
        let mut reg = Registry::new();
        reg.define("A", simple("1")).unwrap();
        reg.define("AB", simple("2")).unwrap();
        assert!(matches!(walk(&reg, "AB"), Step::Terminal(MacroDefinition::Simple(s)) if s == "1"));
        assert!(reg.root().children[&'A'].is_extendable());
    }

    #[test]
    fn reader_membership_is_part_of_the_binding() {
        let mut reg = Registry::new();
        reg.define("R", MacroDefinition::reader(CallableId(0))).unwrap();
        reg.define("F", MacroDefinition::function(CallableId(1))).unwrap();
        assert!(reg.lookup("R").unwrap().is_reader());
        assert!(!reg.lookup("F").unwrap().is_reader());
        assert_eq!(
            reg.entries(),
            vec![
                ("F".to_string(), MacroKind::Function),
                ("R".to_string(), MacroKind::Reader)
            ]
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut reg = Registry::new();
        assert!(reg.define("", simple("x")).is_err());
        assert!(reg.is_empty());
    }
}
