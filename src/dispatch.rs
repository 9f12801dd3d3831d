//! The dynamic dispatch instruction payload: operation kinds, the
//! well-known bootstrap method handles, and the bit-exact encoding shared
//! by the injection pass (encoder) and the bootstrap resolver (decoder).
//!
//! Member payload layout:
//! `[opcode, classRemapper, nameRemapper, envSelector, owners[0..n), names[0..n), descriptors[0..n)]`
//!
//! Type payload layout:
//! `[opcode, classRemapper, envSelector, internalNames[0..n)]`

use crate::class_model::{BsmArg, FieldOp, HandleKind, HandleRef, MethodOp};
use crate::error::ResolveError;

pub const MEMBER_OPCODE: usize = 0;
pub const MEMBER_CLASS_REMAPPER: usize = 1;
pub const MEMBER_NAME_REMAPPER: usize = 2;
pub const MEMBER_ENVIRONMENT: usize = 3;
pub const MEMBER_FIXED_ARGS: usize = 4;

pub const TYPE_OPCODE: usize = 0;
pub const TYPE_CLASS_REMAPPER: usize = 1;
pub const TYPE_ENVIRONMENT: usize = 2;
pub const TYPE_FIXED_ARGS: usize = 3;

/// The operation a member dispatch site stands in for. The replaced
/// opcode's byte value is the wire encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemberOp {
    Invokevirtual,
    Invokespecial,
    Invokestatic,
    Invokeinterface,
    Getstatic,
    Putstatic,
    Getfield,
    Putfield,
}

impl MemberOp {
    pub fn opcode(self) -> u8 {
        match self {
            MemberOp::Getstatic => 0xb2,
            MemberOp::Putstatic => 0xb3,
            MemberOp::Getfield => 0xb4,
            MemberOp::Putfield => 0xb5,
            MemberOp::Invokevirtual => 0xb6,
            MemberOp::Invokespecial => 0xb7,
            MemberOp::Invokestatic => 0xb8,
            MemberOp::Invokeinterface => 0xb9,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode {
            0xb2 => MemberOp::Getstatic,
            0xb3 => MemberOp::Putstatic,
            0xb4 => MemberOp::Getfield,
            0xb5 => MemberOp::Putfield,
            0xb6 => MemberOp::Invokevirtual,
            0xb7 => MemberOp::Invokespecial,
            0xb8 => MemberOp::Invokestatic,
            0xb9 => MemberOp::Invokeinterface,
            _ => return None,
        })
    }
}

impl From<FieldOp> for MemberOp {
    fn from(op: FieldOp) -> Self {
        match op {
            FieldOp::Getstatic => MemberOp::Getstatic,
            FieldOp::Putstatic => MemberOp::Putstatic,
            FieldOp::Getfield => MemberOp::Getfield,
            FieldOp::Putfield => MemberOp::Putfield,
        }
    }
}

impl From<MethodOp> for MemberOp {
    fn from(op: MethodOp) -> Self {
        match op {
            MethodOp::Invokevirtual => MemberOp::Invokevirtual,
            MethodOp::Invokespecial => MemberOp::Invokespecial,
            MethodOp::Invokestatic => MemberOp::Invokestatic,
            MethodOp::Invokeinterface => MemberOp::Invokeinterface,
        }
    }
}

/// The operation a type dispatch site stands in for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeDispatchOp {
    /// A class-literal load; the dispatch is a zero-argument accessor
    /// yielding the class value.
    ClassConstant,
    /// An identity-typed coercion.
    Checkcast,
    /// A boolean membership test.
    Instanceof,
    /// Single-dimension reference array allocation, one length argument.
    Anewarray,
    /// Multi-dimension array allocation, one length argument per dimension.
    Multianewarray,
}

impl TypeDispatchOp {
    pub fn opcode(self) -> u8 {
        match self {
            TypeDispatchOp::ClassConstant => 0x12,
            TypeDispatchOp::Checkcast => 0xc0,
            TypeDispatchOp::Instanceof => 0xc1,
            TypeDispatchOp::Anewarray => 0xbd,
            TypeDispatchOp::Multianewarray => 0xc5,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode {
            0x12 => TypeDispatchOp::ClassConstant,
            0xc0 => TypeDispatchOp::Checkcast,
            0xc1 => TypeDispatchOp::Instanceof,
            0xbd => TypeDispatchOp::Anewarray,
            0xc5 => TypeDispatchOp::Multianewarray,
            _ => return None,
        })
    }
}

const LOOKUP_NAME_TYPE: &str =
    "Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;";

/// The bootstrap method member dispatch sites point at.
pub fn member_bootstrap() -> HandleRef {
    HandleRef {
        kind: HandleKind::Invokestatic,
        owner: "latebind/runtime/Bootstrap".to_string(),
        name: "memberDispatch".to_string(),
        descriptor: format!(
            "({LOOKUP_NAME_TYPE}ILjava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodHandle;[Ljava/lang/String;)Ljava/lang/invoke/CallSite;"
        ),
    }
}

/// The bootstrap method type dispatch sites point at.
pub fn type_bootstrap() -> HandleRef {
    HandleRef {
        kind: HandleKind::Invokestatic,
        owner: "latebind/runtime/Bootstrap".to_string(),
        name: "typeDispatch".to_string(),
        descriptor: format!(
            "({LOOKUP_NAME_TYPE}ILjava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodHandle;[Ljava/lang/String;)Ljava/lang/invoke/CallSite;"
        ),
    }
}

/// A decoded member dispatch site: the replaced operation, the three hook
/// handles, and the candidate set as three parallel sequences of equal
/// length, one entry per environment.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberSite {
    pub op: MemberOp,
    pub class_remapper: HandleRef,
    pub name_remapper: HandleRef,
    pub environment: HandleRef,
    pub owners: Vec<String>,
    pub names: Vec<String>,
    pub descriptors: Vec<String>,
}

impl MemberSite {
    /// Number of environments this site can select among.
    pub fn environment_count(&self) -> usize {
        self.owners.len()
    }

    pub fn encode(&self) -> Vec<BsmArg> {
        let mut args = Vec::with_capacity(MEMBER_FIXED_ARGS + 3 * self.owners.len());
        args.push(BsmArg::Int(self.op.opcode() as i32));
        args.push(BsmArg::Handle(self.class_remapper.clone()));
        args.push(BsmArg::Handle(self.name_remapper.clone()));
        args.push(BsmArg::Handle(self.environment.clone()));
        args.extend(self.owners.iter().cloned().map(BsmArg::Str));
        args.extend(self.names.iter().cloned().map(BsmArg::Str));
        args.extend(self.descriptors.iter().cloned().map(BsmArg::Str));
        args
    }

    pub fn decode(args: &[BsmArg]) -> Result<Self, ResolveError> {
        if args.len() <= MEMBER_FIXED_ARGS {
            return Err(malformed("member payload too short"));
        }
        let tail = args.len() - MEMBER_FIXED_ARGS;
        if tail % 3 != 0 {
            return Err(malformed("candidate arrays are not of equal length"));
        }
        let count = tail / 3;
        let opcode = int_at(args, MEMBER_OPCODE)?;
        let op = MemberOp::from_opcode(opcode as u8)
            .ok_or_else(|| malformed("unknown member opcode"))?;
        let strings = |offset: usize| -> Result<Vec<String>, ResolveError> {
            (0..count)
                .map(|i| string_at(args, MEMBER_FIXED_ARGS + offset * count + i))
                .collect()
        };
        Ok(MemberSite {
            op,
            class_remapper: handle_at(args, MEMBER_CLASS_REMAPPER)?,
            name_remapper: handle_at(args, MEMBER_NAME_REMAPPER)?,
            environment: handle_at(args, MEMBER_ENVIRONMENT)?,
            owners: strings(0)?,
            names: strings(1)?,
            descriptors: strings(2)?,
        })
    }
}

/// A decoded type dispatch site: the replaced operation, two hook handles,
/// and one candidate internal name per environment, each already re-wrapped
/// to the original array depth.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeSite {
    pub op: TypeDispatchOp,
    pub class_remapper: HandleRef,
    pub environment: HandleRef,
    pub internal_names: Vec<String>,
}

impl TypeSite {
    pub fn environment_count(&self) -> usize {
        self.internal_names.len()
    }

    pub fn encode(&self) -> Vec<BsmArg> {
        let mut args = Vec::with_capacity(TYPE_FIXED_ARGS + self.internal_names.len());
        args.push(BsmArg::Int(self.op.opcode() as i32));
        args.push(BsmArg::Handle(self.class_remapper.clone()));
        args.push(BsmArg::Handle(self.environment.clone()));
        args.extend(self.internal_names.iter().cloned().map(BsmArg::Str));
        args
    }

    pub fn decode(args: &[BsmArg]) -> Result<Self, ResolveError> {
        if args.len() <= TYPE_FIXED_ARGS {
            return Err(malformed("type payload too short"));
        }
        let opcode = int_at(args, TYPE_OPCODE)?;
        let op = TypeDispatchOp::from_opcode(opcode as u8)
            .ok_or_else(|| malformed("unknown type opcode"))?;
        Ok(TypeSite {
            op,
            class_remapper: handle_at(args, TYPE_CLASS_REMAPPER)?,
            environment: handle_at(args, TYPE_ENVIRONMENT)?,
            internal_names: (TYPE_FIXED_ARGS..args.len())
                .map(|i| string_at(args, i))
                .collect::<Result<_, _>>()?,
        })
    }
}

fn malformed(reason: &str) -> ResolveError {
    ResolveError::MalformedPayload {
        reason: reason.to_string(),
    }
}

fn int_at(args: &[BsmArg], index: usize) -> Result<i32, ResolveError> {
    match args.get(index) {
        Some(BsmArg::Int(value)) => Ok(*value),
        _ => Err(malformed("expected integer argument")),
    }
}

fn string_at(args: &[BsmArg], index: usize) -> Result<String, ResolveError> {
    match args.get(index) {
        Some(BsmArg::Str(value)) => Ok(value.clone()),
        _ => Err(malformed("expected string argument")),
    }
}

fn handle_at(args: &[BsmArg], index: usize) -> Result<HandleRef, ResolveError> {
    match args.get(index) {
        Some(BsmArg::Handle(handle)) => Ok(handle.clone()),
        _ => Err(malformed("expected handle argument")),
    }
}
