//! Rewrites compiled JVM method bodies so that references to types, fields
//! and methods whose existence or shape depends on the runtime environment
//! are resolved lazily, at first use, through invokedynamic dispatch sites.
//!
//! A single rewritten artifact can then run against several distinct
//! environments (different dependency versions, different naming schemes
//! for the same logical symbols): each dispatch site carries one candidate
//! binding per environment, and the bootstrap resolver picks among them
//! with an externally supplied environment index, applies the caller's
//! remapping hooks, and binds the result permanently into the site.
//!
//! Rewriting is two passes over a [`ClassNode`]:
//!
//! 1. the [erasure pass](erase::erase_class) weakens every field and method
//!    declaration that mentions an environment-dependent type to the
//!    universal top type, recording which members changed;
//! 2. the [injection pass](inject::inject_class) walks the instruction
//!    streams and replaces environment-dependent references with dispatch
//!    sites, leaving everything else untouched.
//!
//! ```
//! use latebind::class_model::{ClassAccessFlags, ClassNode};
//! use latebind::config::{BootstrapHandles, RewriteConfig, SymbolMap};
//!
//! let mut class = ClassNode {
//!     access: ClassAccessFlags::PUBLIC,
//!     name: "com/example/Caller".to_string(),
//!     super_name: "java/lang/Object".to_string(),
//!     interfaces: vec![],
//!     fields: vec![],
//!     methods: vec![],
//! };
//! let mut config = RewriteConfig::empty(BootstrapHandles::on_holder("com/example/Hooks"));
//! config.classes = SymbolMap::from_class_table(
//!     [("com/example/Foo".to_string(),
//!       vec!["v1/Foo".to_string(), "v2/Foo".to_string()])].into(),
//! );
//! let erased = latebind::rewrite_class(&mut class, &config).unwrap();
//! assert!(erased.is_empty());
//! ```

pub mod class_model;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod dump;
pub mod erase;
pub mod error;
pub mod inject;
pub mod member_ref;
pub mod resolve;

pub use class_model::ClassNode;
pub use config::{BootstrapHandles, RewriteConfig, SymbolMap};
pub use erase::ErasedMembers;
pub use error::{ResolveError, RewriteError};
pub use member_ref::MemberRef;

/// Runs both rewrite passes over one class, in order.
///
/// Classes are independent: distinct classes may be rewritten concurrently
/// against a shared configuration, since the configuration's predicates and
/// expansions are reentrant.
pub fn rewrite_class(
    class: &mut ClassNode,
    config: &RewriteConfig,
) -> Result<ErasedMembers, RewriteError> {
    let erased = erase::erase_class(class, &config.classes)?;
    inject::inject_class(class, config, &erased)?;
    Ok(erased)
}
