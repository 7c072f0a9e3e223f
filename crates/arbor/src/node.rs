// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The radix trie behind [`DomainSet`](crate::DomainSet).
//!
//! Domains are stored by their labels in reverse order, so `a.example.org`
//! occupies the path `org` → `example` → `a`. A node with no children is a
//! terminal: everything at or below its path is considered present. Inserting
//! a domain prunes any children of its final node, which is how a later
//! insert of `example.org` supersedes an earlier `a.example.org`.

use std::fmt;

/// An immutable, fully built trie. Built off-line and published whole; never
/// mutated after construction.
pub(crate) struct Trie {
    root: Node,
}

impl Trie {
    /// Builds a trie from the given domains.
    ///
    /// Input is sorted by descending label count before insertion so that
    /// higher-level (shorter) domains insert last and prune the deeper
    /// branches they cover. Empty entries are ignored.
    pub(crate) fn build<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut domains: Vec<S> = domains.into_iter().filter(|d| !d.as_ref().is_empty()).collect();
        domains.sort_by_key(|d| std::cmp::Reverse(d.as_ref().split('.').count()));

        let mut trie = Self { root: Node::new("") };
        for domain in &domains {
            trie.add(domain.as_ref());
        }
        trie.root.sort();
        trie
    }

    fn add(&mut self, domain: &str) {
        let mut node = &mut self.root;
        let mut labels = domain.split('.').rev().peekable();
        while let Some(label) = labels.next() {
            let idx = match node.children.iter().position(|c| c.label == label) {
                Some(idx) => idx,
                None => {
                    node.children.push(Node::new(label));
                    node.children.len() - 1
                }
            };
            let child = &mut node.children[idx];
            if labels.peek().is_none() {
                // This node now covers everything beneath it.
                child.children.clear();
                return;
            }
            node = child;
        }
    }

    pub(crate) fn matches(&self, domain: &str) -> bool {
        self.matches_on(domain).is_some()
    }

    /// Returns the stored ancestor that `domain` matched on, if any.
    pub(crate) fn matches_on(&self, domain: &str) -> Option<String> {
        if domain.is_empty() {
            return None;
        }
        let labels: Vec<&str> = domain.split('.').collect();
        self.match_remain(&labels).map(|remain| labels[remain..].join("."))
    }

    /// Walks the reversed labels until a terminal node; returns the index of
    /// the first label still part of the match.
    fn match_remain(&self, labels: &[&str]) -> Option<usize> {
        let mut node = &self.root;
        let mut i = labels.len();
        while i > 0 {
            i -= 1;
            let child = node.get_child(labels[i])?;
            if child.children.is_empty() {
                return Some(i);
            }
            node = child;
        }
        // Labels ran out above a terminal node: no match.
        None
    }

    fn visit_terminals(&self, f: &mut impl FnMut(&[&str])) {
        let mut path = Vec::new();
        self.root.visit_terminals(&mut path, f);
    }
}

impl fmt::Display for Trie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut err = Ok(());
        self.visit_terminals(&mut |reversed| {
            if err.is_ok() {
                let mut labels: Vec<&str> = reversed.to_vec();
                labels.reverse();
                err = writeln!(f, "{}", labels.join("."));
            }
        });
        err
    }
}

struct Node {
    label: String,
    /// Kept sorted by label once the trie is built, for binary search.
    children: Vec<Node>,
}

impl Node {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            children: Vec::new(),
        }
    }

    fn get_child(&self, label: &str) -> Option<&Node> {
        self.children
            .binary_search_by(|c| c.label.as_str().cmp(label))
            .ok()
            .map(|idx| &self.children[idx])
    }

    fn sort(&mut self) {
        self.children.sort_by(|a, b| a.label.cmp(&b.label));
        for child in &mut self.children {
            child.sort();
        }
    }

    fn visit_terminals<'a>(&'a self, path: &mut Vec<&'a str>, f: &mut impl FnMut(&[&str])) {
        for child in &self.children {
            path.push(&child.label);
            if child.children.is_empty() {
                f(path);
            } else {
                child.visit_terminals(path, f);
            }
            path.pop();
        }
    }
}
