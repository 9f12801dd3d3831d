use std::fmt;

/// The (owner, name, descriptor) triple identifying a field or a method.
///
/// Method references are distinguished from field references by their
/// descriptor: method descriptors start with a parameter list marker `(`,
/// field descriptors do not. Equality is structural over all three parts,
/// so a `MemberRef` works both as a lookup key into remapping tables and as
/// a payload element of dispatch sites.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        MemberRef {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// True if this reference identifies a method rather than a field.
    pub fn is_method(&self) -> bool {
        self.descriptor.starts_with('(')
    }

    /// True if this reference identifies an instance initializer.
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.owner, self.name, self.descriptor)
    }
}
