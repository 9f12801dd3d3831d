//! The erasure pass: first of the two rewrite passes over a class.
//!
//! Every field and method declaration whose descriptor mentions a type the
//! predicate matches has that reference replaced by the universal top type,
//! and the member's original symbolic reference is recorded so the
//! injection pass can treat its accesses as plain erased-type accesses
//! rather than multi-environment dispatch. Erasure is descriptor-local: it
//! never inspects instruction bodies.

use std::collections::HashSet;

use tracing::debug;

use crate::class_model::ClassNode;
use crate::config::SymbolMap;
use crate::descriptor;
use crate::error::RewriteError;
use crate::member_ref::MemberRef;

/// The members of one class whose declared descriptor was weakened by the
/// erasure pass. Built once per class, consumed read-only by the injection
/// pass over the same class, then discarded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErasedMembers {
    pub fields: HashSet<MemberRef>,
    pub methods: HashSet<MemberRef>,
}

impl ErasedMembers {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.methods.is_empty()
    }
}

/// Erases environment-dependent type references from every field and method
/// declaration of `class`, recording which members changed.
///
/// Fails without touching the class if the predicate matches the declared
/// superclass or any declared interface (the hierarchy cannot be rewritten
/// after compilation), or if any descriptor is malformed.
pub fn erase_class(
    class: &mut ClassNode,
    classes: &SymbolMap<str>,
) -> Result<ErasedMembers, RewriteError> {
    if classes.matches(&class.super_name) {
        return Err(RewriteError::HierarchyChange {
            position: "superclass",
            internal_name: class.super_name.clone(),
        });
    }
    for interface in &class.interfaces {
        if classes.matches(interface) {
            return Err(RewriteError::HierarchyChange {
                position: "interface",
                internal_name: interface.clone(),
            });
        }
    }

    // Compute every replacement before committing any, so a malformed
    // descriptor cannot leave the class half-erased.
    let matches = |name: &str| classes.matches(name);
    let field_descs = class
        .fields
        .iter()
        .map(|f| descriptor::erase_descriptor(&f.descriptor, matches))
        .collect::<Result<Vec<_>, _>>()?;
    let method_descs = class
        .methods
        .iter()
        .map(|m| descriptor::erase_descriptor(&m.descriptor, matches))
        .collect::<Result<Vec<_>, _>>()?;

    let mut erased = ErasedMembers::default();
    for (field, new_desc) in class.fields.iter_mut().zip(field_descs) {
        if new_desc != field.descriptor {
            debug!(owner = %class.name, field = %field.name, "erased field declaration");
            erased
                .fields
                .insert(MemberRef::new(&class.name, &field.name, &field.descriptor));
            field.descriptor = new_desc;
        }
    }
    for (method, new_desc) in class.methods.iter_mut().zip(method_descs) {
        if new_desc != method.descriptor {
            debug!(owner = %class.name, method = %method.name, "erased method declaration");
            erased
                .methods
                .insert(MemberRef::new(&class.name, &method.name, &method.descriptor));
            method.descriptor = new_desc;
        }
    }
    Ok(erased)
}
