//! The reference-injection pass: second of the two rewrite passes.
//!
//! Walks every instruction that can carry a symbolic or type reference and
//! decides, instruction by instruction, whether to leave it untouched,
//! rewrite it in place with an erased descriptor, or replace it with an
//! invokedynamic dispatch site carrying the per-environment candidate set.
//! The emitted site's own static descriptor is always the erased form, so
//! the surrounding stream stays internally type-consistent.

use tracing::debug;

use crate::class_model::{
    ClassNode, Const, Frame, Insn, InvokeDynamicInsn, LocalVariable, MethodNode, SimpleOp, TypeOp,
    VerificationType,
};
use crate::config::RewriteConfig;
use crate::descriptor;
use crate::dispatch::{self, MemberOp, MemberSite, TypeDispatchOp, TypeSite};
use crate::erase::ErasedMembers;
use crate::error::RewriteError;
use crate::member_ref::MemberRef;

/// Rewrites every method body of `class` against the candidate expansions
/// in `config`, treating accesses to members in `erased` as plain
/// erased-type accesses. The class is only modified if the whole pass
/// succeeds.
pub fn inject_class(
    class: &mut ClassNode,
    config: &RewriteConfig,
    erased: &ErasedMembers,
) -> Result<(), RewriteError> {
    let mut rewritten = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        rewritten.push(rewrite_method(method, config, erased)?);
    }
    for (method, (instructions, local_variables)) in class.methods.iter_mut().zip(rewritten) {
        method.instructions = instructions;
        method.local_variables = local_variables;
    }
    Ok(())
}

fn rewrite_method(
    method: &MethodNode,
    config: &RewriteConfig,
    erased: &ErasedMembers,
) -> Result<(Vec<Insn>, Vec<LocalVariable>), RewriteError> {
    let mut rewriter = MethodRewriter {
        config,
        erased,
        out: Vec::with_capacity(method.instructions.len()),
        pending_allocation: None,
    };
    for insn in &method.instructions {
        rewriter.instruction(insn)?;
    }
    if let Some(allocated) = rewriter.pending_allocation.take() {
        // The stream ended while still waiting for the duplicate.
        return Err(RewriteError::UnsupportedAllocationPattern {
            internal_name: allocated,
        });
    }

    // Debug metadata is erased, never expanded: it carries no dispatch.
    let class_matches = |name: &str| config.classes.matches(name);
    let local_variables = method
        .local_variables
        .iter()
        .map(|lv| {
            Ok(LocalVariable {
                name: lv.name.clone(),
                descriptor: descriptor::erase_descriptor(&lv.descriptor, class_matches)?,
                index: lv.index,
            })
        })
        .collect::<Result<Vec<_>, RewriteError>>()?;

    Ok((rewriter.out, local_variables))
}

struct MethodRewriter<'a> {
    config: &'a RewriteConfig,
    erased: &'a ErasedMembers,
    out: Vec<Insn>,
    /// Set when a remappable allocation was dropped; the duplicate that
    /// conventionally follows it must be dropped too, exactly once.
    /// Labels and frames may come in between.
    pending_allocation: Option<String>,
}

impl MethodRewriter<'_> {
    fn instruction(&mut self, insn: &Insn) -> Result<(), RewriteError> {
        if let Some(allocated) = self.pending_allocation.take() {
            match insn {
                Insn::Simple(SimpleOp::Dup) => return Ok(()),
                // Labels and frames may sit between the allocation and its
                // duplicate; they do not disarm the suppression.
                Insn::Label(_) | Insn::Frame(_) => {
                    self.pending_allocation = Some(allocated);
                }
                // The duplicate never comes, so the dropped allocation
                // cannot be folded into an initializer dispatch.
                _ => {
                    return Err(RewriteError::UnsupportedAllocationPattern {
                        internal_name: allocated,
                    })
                }
            }
        }
        match insn {
            Insn::Field { op, member } => self.member_access(MemberOp::from(*op), member, insn),
            Insn::Method { op, member } => self.member_access(MemberOp::from(*op), member, insn),
            Insn::TypeRef { op, internal_name } => self.type_insn(*op, internal_name, insn),
            Insn::MultiNewArray {
                descriptor,
                dimensions,
            } => self.multi_new_array(descriptor, *dimensions, insn),
            Insn::Ldc(Const::Class(internal_name)) => {
                if self.matches_masked(internal_name) {
                    self.type_site(
                        TypeDispatchOp::ClassConstant,
                        "constant",
                        "()Ljava/lang/Class;".to_string(),
                        internal_name,
                    )
                } else {
                    self.out.push(insn.clone());
                    Ok(())
                }
            }
            Insn::Frame(frame) => {
                let frame = Frame {
                    locals: self.erase_slots(&frame.locals),
                    stack: self.erase_slots(&frame.stack),
                };
                self.out.push(Insn::Frame(frame));
                Ok(())
            }
            other => {
                self.out.push(other.clone());
                Ok(())
            }
        }
    }

    fn matches_masked(&self, internal_name: &str) -> bool {
        self.config
            .classes
            .matches(descriptor::mask_array(internal_name))
    }

    // -----------------------------------------------------------------------
    // Field accesses and method calls
    // -----------------------------------------------------------------------

    fn member_access(
        &mut self,
        op: MemberOp,
        member: &MemberRef,
        original: &Insn,
    ) -> Result<(), RewriteError> {
        let class_matches = |name: &str| self.config.classes.matches(name);
        let erased_desc = descriptor::erase_descriptor(&member.descriptor, class_matches)?;
        let is_method = member.is_method();

        let record = if is_method {
            &self.erased.methods
        } else {
            &self.erased.fields
        };
        if record.contains(member) {
            // The declaration was weakened in the erasure pass; accessing it
            // through the erased shape needs no dispatch.
            self.out
                .push(with_descriptor(original, member, erased_desc));
            return Ok(());
        }

        let owners = if self.config.classes.matches(&member.owner) {
            Some(self.config.classes.expand(&member.owner))
        } else {
            None
        };
        let member_map = if is_method {
            &self.config.methods
        } else {
            &self.config.fields
        };
        let names = if member_map.matches(member) {
            Some(member_map.expand(member))
        } else {
            None
        };
        let descriptors = descriptor::expand_descriptor(&member.descriptor, &self.config.classes)?;

        let count = owners
            .as_ref()
            .map(Vec::len)
            .or_else(|| names.as_ref().map(Vec::len))
            .or_else(|| descriptors.as_ref().map(Vec::len));
        let Some(count) = count else {
            // No remapping applies anywhere in this reference.
            self.out.push(original.clone());
            return Ok(());
        };
        if count == 0 {
            return Err(RewriteError::EmptyExpansion {
                symbol: member.to_string(),
            });
        }
        for candidates in [&owners, &names, &descriptors].into_iter().flatten() {
            if candidates.len() != count {
                return Err(RewriteError::CandidateLengthMismatch {
                    symbol: member.to_string(),
                    expected: count,
                    found: candidates.len(),
                });
            }
        }

        // Unexpanded dimensions are filled by repetition so the payload
        // always has a uniform shape.
        let owners = owners.unwrap_or_else(|| vec![member.owner.clone(); count]);
        let names = names.unwrap_or_else(|| vec![member.name.clone(); count]);
        let descriptors = descriptors.unwrap_or_else(|| vec![member.descriptor.clone(); count]);

        let (invoked_name, site_descriptor) = if is_method && member.is_constructor() {
            // The allocation and its duplicate are gone; the dispatch itself
            // allocates and initializes, so it returns the new value rather
            // than void.
            if !self.config.classes.matches(&member.owner) {
                return Err(RewriteError::UnsupportedConstructorDispatch {
                    owner: member.owner.clone(),
                    descriptor: member.descriptor.clone(),
                });
            }
            let returns_value = format!(
                "{}{}",
                &erased_desc[..erased_desc.len() - 1],
                descriptor::erased_reference_descriptor(&member.owner)
            );
            ("construct".to_string(), returns_value)
        } else {
            (member.name.clone(), erased_desc)
        };

        let handles = &self.config.handles;
        let site = MemberSite {
            op,
            class_remapper: handles.class_remapper.clone(),
            name_remapper: handles.member_remapper.clone(),
            environment: handles.environment.clone(),
            owners,
            names,
            descriptors,
        };
        debug!(member = %member, environments = count, "emitting member dispatch site");
        self.out.push(Insn::InvokeDynamic(InvokeDynamicInsn {
            name: invoked_name,
            descriptor: site_descriptor,
            bootstrap: dispatch::member_bootstrap(),
            args: site.encode(),
        }));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Type instructions
    // -----------------------------------------------------------------------

    fn type_insn(
        &mut self,
        op: TypeOp,
        internal_name: &str,
        original: &Insn,
    ) -> Result<(), RewriteError> {
        if !self.matches_masked(internal_name) {
            self.out.push(original.clone());
            return Ok(());
        }
        match op {
            TypeOp::New => {
                // The construction pattern collapses into the initializer's
                // dispatch site; drop the allocation and the duplicate that
                // follows it.
                self.pending_allocation = Some(internal_name.to_string());
                Ok(())
            }
            TypeOp::Anewarray => {
                let dimensions = descriptor::array_dimensions(internal_name);
                let site_descriptor =
                    format!("(I){}Ljava/lang/Object;", "[".repeat(dimensions + 1));
                self.type_site(
                    TypeDispatchOp::Anewarray,
                    "newArray",
                    site_descriptor,
                    internal_name,
                )
            }
            TypeOp::Checkcast => {
                let site_descriptor = format!(
                    "(Ljava/lang/Object;){}",
                    descriptor::erased_reference_descriptor(internal_name)
                );
                self.type_site(
                    TypeDispatchOp::Checkcast,
                    "checkCast",
                    site_descriptor,
                    internal_name,
                )
            }
            TypeOp::Instanceof => self.type_site(
                TypeDispatchOp::Instanceof,
                "isInstance",
                "(Ljava/lang/Object;)Z".to_string(),
                internal_name,
            ),
        }
    }

    fn multi_new_array(
        &mut self,
        array_descriptor: &str,
        dimensions: u8,
        original: &Insn,
    ) -> Result<(), RewriteError> {
        if !self.matches_masked(array_descriptor) {
            self.out.push(original.clone());
            return Ok(());
        }
        let class_matches = |name: &str| self.config.classes.matches(name);
        let site_descriptor = format!(
            "({}){}",
            "I".repeat(dimensions as usize),
            descriptor::erase_descriptor(array_descriptor, class_matches)?
        );
        self.type_site(
            TypeDispatchOp::Multianewarray,
            "multiNewArray",
            site_descriptor,
            array_descriptor,
        )
    }

    /// Emits a type dispatch site whose candidates are the expansion of the
    /// array-masked name, each re-wrapped to the original array depth.
    fn type_site(
        &mut self,
        op: TypeDispatchOp,
        invoked_name: &str,
        site_descriptor: String,
        internal_name: &str,
    ) -> Result<(), RewriteError> {
        let masked = descriptor::mask_array(internal_name);
        let candidates = self.config.classes.expand(masked);
        if candidates.is_empty() {
            return Err(RewriteError::EmptyExpansion {
                symbol: masked.to_string(),
            });
        }
        let internal_names = candidates
            .iter()
            .map(|candidate| descriptor::unmask_array(internal_name, candidate))
            .collect::<Vec<_>>();

        let handles = &self.config.handles;
        let site = TypeSite {
            op,
            class_remapper: handles.class_remapper.clone(),
            environment: handles.environment.clone(),
            internal_names,
        };
        debug!(internal_name, environments = candidates.len(), "emitting type dispatch site");
        self.out.push(Insn::InvokeDynamic(InvokeDynamicInsn {
            name: invoked_name.to_string(),
            descriptor: site_descriptor,
            bootstrap: dispatch::type_bootstrap(),
            args: site.encode(),
        }));
        Ok(())
    }

    fn erase_slots(&self, slots: &[VerificationType]) -> Vec<VerificationType> {
        slots
            .iter()
            .map(|slot| match slot {
                VerificationType::Object(name) if self.matches_masked(name) => {
                    VerificationType::Object(descriptor::erase_reference(name))
                }
                other => other.clone(),
            })
            .collect()
    }
}

fn with_descriptor(original: &Insn, member: &MemberRef, erased_desc: String) -> Insn {
    let member = MemberRef {
        owner: member.owner.clone(),
        name: member.name.clone(),
        descriptor: erased_desc,
    };
    match original {
        Insn::Field { op, .. } => Insn::Field { op: *op, member },
        Insn::Method { op, .. } => Insn::Method { op: *op, member },
        _ => unreachable!("member access is a field or method instruction"),
    }
}
