//! Explicit configuration objects for the rewrite passes.
//!
//! Remapping is configured by predicate/expansion pairs handed in by the
//! caller, never looked up from ambient globals: the passes may run over
//! many classes concurrently, so everything here is `Send + Sync` and
//! treated as a pure function of its inputs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::class_model::{HandleKind, HandleRef};
use crate::member_ref::MemberRef;

/// A predicate over symbols paired with the expansion that yields the
/// candidate the symbol resolves to in each environment.
///
/// The expansion is only consulted for symbols the predicate matches, and
/// must return one candidate per environment, in environment order.
pub struct SymbolMap<K: ?Sized> {
    matches: Box<dyn Fn(&K) -> bool + Send + Sync>,
    expand: Box<dyn Fn(&K) -> Vec<String> + Send + Sync>,
}

impl<K: ?Sized> SymbolMap<K> {
    pub fn new(
        matches: impl Fn(&K) -> bool + Send + Sync + 'static,
        expand: impl Fn(&K) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        SymbolMap {
            matches: Box::new(matches),
            expand: Box::new(expand),
        }
    }

    /// A map that matches nothing.
    pub fn none() -> Self {
        SymbolMap {
            matches: Box::new(|_| false),
            expand: Box::new(|_| Vec::new()),
        }
    }

    pub fn matches(&self, symbol: &K) -> bool {
        (self.matches)(symbol)
    }

    pub fn expand(&self, symbol: &K) -> Vec<String> {
        (self.expand)(symbol)
    }
}

impl SymbolMap<str> {
    /// Builds a class-name map from an explicit table of
    /// `internal name -> per-environment candidates`.
    pub fn from_class_table(table: HashMap<String, Vec<String>>) -> Self {
        let table = Arc::new(table);
        let lookup = Arc::clone(&table);
        SymbolMap {
            matches: Box::new(move |name: &str| table.contains_key(name)),
            expand: Box::new(move |name: &str| lookup.get(name).cloned().unwrap_or_default()),
        }
    }
}

impl SymbolMap<MemberRef> {
    /// Builds a member-name map from an explicit table keyed by the full
    /// symbolic reference, not just the member name.
    pub fn from_member_table(table: HashMap<MemberRef, Vec<String>>) -> Self {
        let table = Arc::new(table);
        let lookup = Arc::clone(&table);
        SymbolMap {
            matches: Box::new(move |member: &MemberRef| table.contains_key(member)),
            expand: Box::new(move |member: &MemberRef| {
                lookup.get(member).cloned().unwrap_or_default()
            }),
        }
    }
}

/// Handles to the three runtime hooks a dispatch site carries: the
/// class-name remapper, the member-name remapper and the environment
/// selector. The host materializes these when it executes the site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapHandles {
    pub class_remapper: HandleRef,
    pub member_remapper: HandleRef,
    pub environment: HandleRef,
}

impl BootstrapHandles {
    /// Handles naming three static hook methods on one holder class, with
    /// the descriptors the bootstrap methods expect.
    pub fn on_holder(holder: &str) -> Self {
        BootstrapHandles {
            class_remapper: HandleRef {
                kind: HandleKind::Invokestatic,
                owner: holder.to_string(),
                name: "classRemapper".to_string(),
                descriptor: "()Llatebind/runtime/ClassNameRemapper;".to_string(),
            },
            member_remapper: HandleRef {
                kind: HandleKind::Invokestatic,
                owner: holder.to_string(),
                name: "memberRemapper".to_string(),
                descriptor: "()Llatebind/runtime/MemberNameRemapper;".to_string(),
            },
            environment: HandleRef {
                kind: HandleKind::Invokestatic,
                owner: holder.to_string(),
                name: "environment".to_string(),
                descriptor: "()I".to_string(),
            },
        }
    }
}

/// Everything the two rewrite passes need for one class: which symbols are
/// environment-dependent, how they expand, and which hook handles to embed
/// into emitted dispatch sites.
pub struct RewriteConfig {
    pub classes: SymbolMap<str>,
    pub fields: SymbolMap<MemberRef>,
    pub methods: SymbolMap<MemberRef>,
    pub handles: BootstrapHandles,
}

impl RewriteConfig {
    /// A configuration that remaps nothing; useful as a starting point.
    pub fn empty(handles: BootstrapHandles) -> Self {
        RewriteConfig {
            classes: SymbolMap::none(),
            fields: SymbolMap::none(),
            methods: SymbolMap::none(),
            handles,
        }
    }
}
