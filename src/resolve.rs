//! The runtime side of a dispatch site: selecting the candidate for the
//! current environment, applying the remapping hooks, resolving the real
//! target through the host's reflective surface, and binding the result
//! permanently into the call site.
//!
//! Resolution runs at most once per site, on first execution. It is a pure
//! function of the environment index and the remapper outputs, so racing
//! first calls may duplicate the work but can never produce two observable
//! bindings: the call-site cell is single-assignment. There is no fallback
//! environment and no retry; a resolution failure is a configuration bug
//! and surfaces at the call site as a fatal error.

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::descriptor;
use crate::dispatch::{MemberOp, MemberSite, TypeDispatchOp, TypeSite};
use crate::error::ResolveError;
use crate::member_ref::MemberRef;

/// The three runtime hooks a dispatch site's handles stand for. The host
/// materializes the payload handles into these callables; they are treated
/// as pure and may be shared across sites and threads.
pub struct RuntimeHooks {
    pub remap_class: Box<dyn Fn(&str) -> String + Send + Sync>,
    pub remap_member: Box<dyn Fn(&MemberRef) -> String + Send + Sync>,
    pub environment: Box<dyn Fn() -> usize + Send + Sync>,
}

impl RuntimeHooks {
    /// Hooks that remap nothing and always select environment `index`.
    pub fn fixed_environment(index: usize) -> Self {
        RuntimeHooks {
            remap_class: Box::new(str::to_string),
            remap_member: Box::new(|member: &MemberRef| member.name.clone()),
            environment: Box::new(move || index),
        }
    }
}

/// The host's reflective surface: everything the resolver needs to turn a
/// remapped symbolic reference into an executable handle within the calling
/// context's visibility scope.
pub trait RuntimeLookup {
    type Class;
    type Handle;

    fn find_class(&self, internal_name: &str) -> Result<Self::Class, ResolveError>;

    fn find_virtual(
        &self,
        class: &Self::Class,
        name: &str,
        descriptor: &str,
    ) -> Result<Self::Handle, ResolveError>;
    fn find_special(
        &self,
        class: &Self::Class,
        name: &str,
        descriptor: &str,
    ) -> Result<Self::Handle, ResolveError>;
    fn find_static(
        &self,
        class: &Self::Class,
        name: &str,
        descriptor: &str,
    ) -> Result<Self::Handle, ResolveError>;
    /// Allocation plus initialization, exposed as a value-returning call.
    fn find_constructor(
        &self,
        class: &Self::Class,
        descriptor: &str,
    ) -> Result<Self::Handle, ResolveError>;

    fn find_getter(
        &self,
        class: &Self::Class,
        name: &str,
        descriptor: &str,
    ) -> Result<Self::Handle, ResolveError>;
    fn find_setter(
        &self,
        class: &Self::Class,
        name: &str,
        descriptor: &str,
    ) -> Result<Self::Handle, ResolveError>;
    fn find_static_getter(
        &self,
        class: &Self::Class,
        name: &str,
        descriptor: &str,
    ) -> Result<Self::Handle, ResolveError>;
    fn find_static_setter(
        &self,
        class: &Self::Class,
        name: &str,
        descriptor: &str,
    ) -> Result<Self::Handle, ResolveError>;

    /// A zero-argument accessor yielding the class value itself.
    fn class_constant(&self, class: &Self::Class) -> Result<Self::Handle, ResolveError>;
    /// An identity-typed coercion to `class`.
    fn identity_cast(&self, class: &Self::Class) -> Result<Self::Handle, ResolveError>;
    /// A boolean membership test against `class`.
    fn is_instance(&self, class: &Self::Class) -> Result<Self::Handle, ResolveError>;
    /// Single-dimension array allocation with `class` elements.
    fn new_array(&self, class: &Self::Class) -> Result<Self::Handle, ResolveError>;
    /// Multi-dimension array allocation, one length per dimension.
    fn multi_new_array(&self, class: &Self::Class) -> Result<Self::Handle, ResolveError>;

    /// Adapts a resolved handle to the static shape the dispatch site was
    /// emitted with. The default keeps the handle as-is.
    fn adapt(
        &self,
        handle: Self::Handle,
        site_descriptor: &str,
    ) -> Result<Self::Handle, ResolveError> {
        let _ = site_descriptor;
        Ok(handle)
    }
}

/// Resolves a member dispatch site to an executable handle, adapted to the
/// site's static descriptor.
pub fn resolve_member<L: RuntimeLookup>(
    site: &MemberSite,
    hooks: &RuntimeHooks,
    lookup: &L,
    site_descriptor: &str,
) -> Result<L::Handle, ResolveError> {
    let count = site.environment_count();
    let env = (hooks.environment)();
    if env >= count {
        return Err(ResolveError::EnvironmentOutOfRange { index: env, count });
    }
    let owner = &site.owners[env];
    let name = &site.names[env];
    let desc = &site.descriptors[env];

    let mapped_owner = (hooks.remap_class)(owner);
    // The member remapper sees the original triple for this environment,
    // before any class remapping.
    let mapped_name = (hooks.remap_member)(&MemberRef::new(owner, name, desc));
    let mapped_desc = descriptor::map_references(desc, |n| (hooks.remap_class)(n)).map_err(
        |_| ResolveError::MalformedDescriptor {
            descriptor: desc.clone(),
        },
    )?;
    debug!(owner = %mapped_owner, name = %mapped_name, "resolving member dispatch");

    let class = lookup.find_class(&mapped_owner)?;
    let handle = match site.op {
        MemberOp::Invokevirtual | MemberOp::Invokeinterface => {
            lookup.find_virtual(&class, &mapped_name, &mapped_desc)?
        }
        MemberOp::Invokespecial => {
            if mapped_name == "<init>" {
                lookup.find_constructor(&class, &mapped_desc)?
            } else {
                lookup.find_special(&class, &mapped_name, &mapped_desc)?
            }
        }
        MemberOp::Invokestatic => lookup.find_static(&class, &mapped_name, &mapped_desc)?,
        MemberOp::Getstatic => lookup.find_static_getter(&class, &mapped_name, &mapped_desc)?,
        MemberOp::Putstatic => lookup.find_static_setter(&class, &mapped_name, &mapped_desc)?,
        MemberOp::Getfield => lookup.find_getter(&class, &mapped_name, &mapped_desc)?,
        MemberOp::Putfield => lookup.find_setter(&class, &mapped_name, &mapped_desc)?,
    };
    lookup.adapt(handle, site_descriptor)
}

/// Resolves a type dispatch site to an executable handle, adapted to the
/// site's static descriptor.
pub fn resolve_type<L: RuntimeLookup>(
    site: &TypeSite,
    hooks: &RuntimeHooks,
    lookup: &L,
    site_descriptor: &str,
) -> Result<L::Handle, ResolveError> {
    let count = site.environment_count();
    let env = (hooks.environment)();
    if env >= count {
        return Err(ResolveError::EnvironmentOutOfRange { index: env, count });
    }
    let internal_name = &site.internal_names[env];
    let masked = descriptor::mask_array(internal_name);
    let mapped = descriptor::unmask_array(internal_name, &(hooks.remap_class)(masked));
    debug!(internal_name = %mapped, "resolving type dispatch");

    let class = lookup.find_class(&mapped)?;
    let handle = match site.op {
        TypeDispatchOp::ClassConstant => lookup.class_constant(&class)?,
        TypeDispatchOp::Checkcast => lookup.identity_cast(&class)?,
        TypeDispatchOp::Instanceof => lookup.is_instance(&class)?,
        TypeDispatchOp::Anewarray => lookup.new_array(&class)?,
        TypeDispatchOp::Multianewarray => lookup.multi_new_array(&class)?,
    };
    lookup.adapt(handle, site_descriptor)
}

/// One dispatch site's permanent binding: a single-assignment cell with
/// resolve-then-cache semantics. The first resolution to complete is the
/// one every caller observes; afterwards the site behaves as a fixed,
/// direct call.
pub struct CallSite<H> {
    bound: OnceCell<H>,
}

impl<H> CallSite<H> {
    pub fn new() -> Self {
        CallSite {
            bound: OnceCell::new(),
        }
    }

    /// The bound handle, if the site has been resolved.
    pub fn bound(&self) -> Option<&H> {
        self.bound.get()
    }

    /// Returns the bound handle, resolving it on first use. A failed
    /// resolution leaves the site unresolved; per the error contract the
    /// caller treats that as fatal rather than retrying with different
    /// inputs.
    pub fn resolve_with(
        &self,
        resolve: impl FnOnce() -> Result<H, ResolveError>,
    ) -> Result<&H, ResolveError> {
        self.bound.get_or_try_init(resolve)
    }
}

impl<H> Default for CallSite<H> {
    fn default() -> Self {
        CallSite::new()
    }
}
