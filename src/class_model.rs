//! The structured class and instruction-stream model the rewrite passes
//! operate on.
//!
//! Symbolic references are held as resolved strings rather than constant
//! pool indices; re-encoding the stream into classfile bytes is the host
//! loader's concern. Instruction kinds that can carry a symbolic or type
//! reference are modelled individually so the passes can match on them
//! exhaustively; everything else travels through untouched.

use bitflags::bitflags;

use crate::member_ref::MemberRef;

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

/// A class declaration plus its members and their instruction streams.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassNode {
    pub access: ClassAccessFlags,
    pub name: String,
    pub super_name: String,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldNode {
    pub access: FieldAccessFlags,
    pub name: String,
    pub descriptor: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodNode {
    pub access: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub instructions: Vec<Insn>,
    /// Debug metadata; carries no runtime dispatch.
    pub local_variables: Vec<LocalVariable>,
}

impl MethodNode {
    pub fn new(
        access: MethodAccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        MethodNode {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
            instructions: Vec::new(),
            local_variables: Vec::new(),
        }
    }
}

/// A local variable debug entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalVariable {
    pub name: String,
    pub descriptor: String,
    pub index: u16,
}

/// A branch target within one method's instruction stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// One instruction of a method body.
#[derive(Clone, Debug, PartialEq)]
pub enum Insn {
    Simple(SimpleOp),
    IntPush(i32),
    Ldc(Const),
    Var { op: VarOp, index: u16 },
    Iinc { index: u16, delta: i16 },
    Jump { op: JumpOp, target: Label },
    Label(Label),
    Field { op: FieldOp, member: MemberRef },
    Method { op: MethodOp, member: MemberRef },
    TypeRef { op: TypeOp, internal_name: String },
    MultiNewArray { descriptor: String, dimensions: u8 },
    InvokeDynamic(InvokeDynamicInsn),
    /// Verification metadata interleaved into the stream.
    Frame(Frame),
}

/// Opcodes with no operands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimpleOp {
    Nop,
    Aconstnull,
    Dup,
    Dupx1,
    Dup2,
    Pop,
    Pop2,
    Swap,
    Iadd,
    Isub,
    Aaload,
    Aastore,
    Iaload,
    Iastore,
    Arraylength,
    Athrow,
    Monitorenter,
    Monitorexit,
    Return,
    Areturn,
    Ireturn,
    Lreturn,
    Freturn,
    Dreturn,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarOp {
    Aload,
    Astore,
    Iload,
    Istore,
    Lload,
    Lstore,
    Fload,
    Fstore,
    Dload,
    Dstore,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpOp {
    Goto,
    Ifeq,
    Ifne,
    Ifnull,
    Ifnonnull,
    IfIcmpeq,
    IfIcmpne,
    IfAcmpeq,
    IfAcmpne,
}

/// Field access opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldOp {
    Getstatic,
    Putstatic,
    Getfield,
    Putfield,
}

/// Method invocation opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MethodOp {
    Invokevirtual,
    Invokespecial,
    Invokestatic,
    Invokeinterface,
}

/// Single-type instructions: allocation, single-dimension reference array
/// allocation, cast and type test.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeOp {
    New,
    Anewarray,
    Checkcast,
    Instanceof,
}

/// Loadable constants.
#[derive(Clone, Debug, PartialEq)]
pub enum Const {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// A class literal; internal name, possibly in array-descriptor form.
    Class(String),
}

/// An invokedynamic instruction: invoked name and static descriptor, the
/// bootstrap method handle, and its static arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct InvokeDynamicInsn {
    pub name: String,
    pub descriptor: String,
    pub bootstrap: HandleRef,
    pub args: Vec<BsmArg>,
}

/// A static bootstrap-method argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BsmArg {
    Int(i32),
    Str(String),
    Handle(HandleRef),
}

/// A method-handle reference: the handle kind tag plus the symbolic
/// reference of its target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandleRef {
    pub kind: HandleKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// The dispatch semantics of a method-handle reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Getfield,
    Getstatic,
    Putfield,
    Putstatic,
    Invokevirtual,
    Invokestatic,
    Invokespecial,
    NewInvokespecial,
    Invokeinterface,
}

/// A verification frame: the types of locals and operand stack entries at
/// one point in the stream.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

/// Verification type of one local or stack slot.
#[derive(Clone, Debug, PartialEq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    Object(String),
    Uninitialized(Label),
}
