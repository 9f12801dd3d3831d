use std::sync::Arc;

use latebind::class_model::{
    ClassAccessFlags, ClassNode, Const, Frame, Insn, Label, LocalVariable, MethodAccessFlags,
    MethodNode, SimpleOp, TypeOp, VarOp, VerificationType,
};
use latebind::config::{BootstrapHandles, RewriteConfig, SymbolMap};
use latebind::dispatch::{MemberOp, MemberSite, TypeDispatchOp, TypeSite};
use latebind::erase::ErasedMembers;
use latebind::inject::inject_class;
use latebind::{rewrite_class, MemberRef, RewriteError};
use latebind::class_model::{FieldOp, MethodOp};

fn widget_config() -> RewriteConfig {
    let mut config = RewriteConfig::empty(BootstrapHandles::on_holder("com/test/Hooks"));
    config.classes = SymbolMap::from_class_table(
        [(
            "com/dep/Widget".to_string(),
            vec!["v1/Widget".to_string(), "v2/Widget".to_string()],
        )]
        .into(),
    );
    config
}

fn caller(instructions: Vec<Insn>) -> ClassNode {
    ClassNode {
        access: ClassAccessFlags::PUBLIC,
        name: "com/test/Caller".to_string(),
        super_name: "java/lang/Object".to_string(),
        interfaces: vec![],
        fields: vec![],
        methods: vec![MethodNode {
            access: MethodAccessFlags::PUBLIC,
            name: "run".to_string(),
            descriptor: "()V".to_string(),
            instructions,
            local_variables: vec![],
        }],
    }
}

fn body(class: &ClassNode) -> &[Insn] {
    &class.methods[0].instructions
}

fn decode_member(insn: &Insn) -> MemberSite {
    match insn {
        Insn::InvokeDynamic(indy) => MemberSite::decode(&indy.args).unwrap(),
        other => panic!("expected invokedynamic, got {other:?}"),
    }
}

fn decode_type(insn: &Insn) -> TypeSite {
    match insn {
        Insn::InvokeDynamic(indy) => TypeSite::decode(&indy.args).unwrap(),
        other => panic!("expected invokedynamic, got {other:?}"),
    }
}

fn indy(insn: &Insn) -> (&str, &str) {
    match insn {
        Insn::InvokeDynamic(i) => (i.name.as_str(), i.descriptor.as_str()),
        other => panic!("expected invokedynamic, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Member accesses
// ---------------------------------------------------------------------------

#[test]
fn unremapped_call_is_left_byte_for_byte() {
    let instructions = vec![
        Insn::Var { op: VarOp::Aload, index: 0 },
        Insn::Method {
            op: MethodOp::Invokevirtual,
            member: MemberRef::new("java/lang/Object", "toString", "()Ljava/lang/String;"),
        },
        Insn::Simple(SimpleOp::Pop),
        Insn::Simple(SimpleOp::Return),
    ];
    let mut class = caller(instructions.clone());
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();
    assert_eq!(body(&class), &instructions[..]);
}

#[test]
fn field_with_expandable_type_becomes_member_dispatch() {
    let mut class = caller(vec![
        Insn::Field {
            op: FieldOp::Getstatic,
            member: MemberRef::new("com/app/Holder", "VALUE", "Lcom/dep/Widget;"),
        },
        Insn::Simple(SimpleOp::Pop),
    ]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    let (name, descriptor) = indy(&body(&class)[0]);
    assert_eq!(name, "VALUE");
    // The site's own shape is the erased descriptor.
    assert_eq!(descriptor, "Ljava/lang/Object;");

    let site = decode_member(&body(&class)[0]);
    assert_eq!(site.op, MemberOp::Getstatic);
    // Candidate shape is uniform: unexpanded dimensions repeat the original.
    assert_eq!(site.owners, vec!["com/app/Holder", "com/app/Holder"]);
    assert_eq!(site.names, vec!["VALUE", "VALUE"]);
    assert_eq!(site.descriptors, vec!["Lv1/Widget;", "Lv2/Widget;"]);
    assert_eq!(body(&class)[1], Insn::Simple(SimpleOp::Pop));
}

#[test]
fn call_on_expandable_owner_expands_owners_only() {
    let mut class = caller(vec![Insn::Method {
        op: MethodOp::Invokestatic,
        member: MemberRef::new("com/dep/Widget", "create", "()V"),
    }]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    let site = decode_member(&body(&class)[0]);
    assert_eq!(site.op, MemberOp::Invokestatic);
    assert_eq!(site.owners, vec!["v1/Widget", "v2/Widget"]);
    assert_eq!(site.names, vec!["create", "create"]);
    assert_eq!(site.descriptors, vec!["()V", "()V"]);
}

#[test]
fn renamed_method_expands_names() {
    let mut config = widget_config();
    let member = MemberRef::new("com/app/Service", "fetch", "()I");
    config.methods = SymbolMap::from_member_table(
        [(member.clone(), vec!["fetchV1".to_string(), "fetchV2".to_string()])].into(),
    );
    let mut class = caller(vec![Insn::Method {
        op: MethodOp::Invokevirtual,
        member,
    }]);
    inject_class(&mut class, &config, &ErasedMembers::default()).unwrap();

    let site = decode_member(&body(&class)[0]);
    assert_eq!(site.names, vec!["fetchV1", "fetchV2"]);
    assert_eq!(site.owners, vec!["com/app/Service", "com/app/Service"]);
    let (name, descriptor) = indy(&body(&class)[0]);
    assert_eq!(name, "fetch");
    assert_eq!(descriptor, "()I");
}

#[test]
fn erased_member_access_is_rewritten_in_place() {
    let member = MemberRef::new("com/test/Caller", "widget", "Lcom/dep/Widget;");
    let mut erased = ErasedMembers::default();
    erased.fields.insert(member.clone());

    let mut class = caller(vec![
        Insn::Var { op: VarOp::Aload, index: 0 },
        Insn::Field { op: FieldOp::Getfield, member },
        Insn::Simple(SimpleOp::Pop),
    ]);
    inject_class(&mut class, &widget_config(), &erased).unwrap();

    assert_eq!(
        body(&class)[1],
        Insn::Field {
            op: FieldOp::Getfield,
            member: MemberRef::new("com/test/Caller", "widget", "Ljava/lang/Object;"),
        }
    );
}

#[test]
fn mismatched_candidate_lengths_are_fatal() {
    let mut config = widget_config();
    let member = MemberRef::new("com/dep/Widget", "fetch", "()V");
    config.methods = SymbolMap::from_member_table(
        [(member.clone(), vec!["a".to_string(), "b".to_string(), "c".to_string()])].into(),
    );
    let mut class = caller(vec![Insn::Method {
        op: MethodOp::Invokevirtual,
        member,
    }]);
    let err = inject_class(&mut class, &config, &ErasedMembers::default()).unwrap_err();
    assert!(matches!(err, RewriteError::CandidateLengthMismatch { .. }));
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

#[test]
fn construction_collapses_into_one_dispatch() {
    let mut class = caller(vec![
        Insn::TypeRef {
            op: TypeOp::New,
            internal_name: "com/dep/Widget".to_string(),
        },
        Insn::Simple(SimpleOp::Dup),
        Insn::IntPush(7),
        Insn::Method {
            op: MethodOp::Invokespecial,
            member: MemberRef::new("com/dep/Widget", "<init>", "(I)V"),
        },
        Insn::Simple(SimpleOp::Pop),
    ]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    // Allocation and duplicate are gone; the dispatch returns the value.
    assert_eq!(body(&class)[0], Insn::IntPush(7));
    let (name, descriptor) = indy(&body(&class)[1]);
    assert_eq!(name, "construct");
    assert_eq!(descriptor, "(I)Ljava/lang/Object;");
    assert_eq!(body(&class)[2], Insn::Simple(SimpleOp::Pop));
    assert_eq!(body(&class).len(), 3);

    let site = decode_member(&body(&class)[1]);
    assert_eq!(site.op, MemberOp::Invokespecial);
    assert_eq!(site.owners, vec!["v1/Widget", "v2/Widget"]);
    assert_eq!(site.names, vec!["<init>", "<init>"]);
}

#[test]
fn construction_collapses_across_labels_and_frames() {
    // Compilers put labels and frames between the allocation and its
    // duplicate at try-block and branch boundaries; the suppression must
    // reach across them.
    let mut class = caller(vec![
        Insn::TypeRef {
            op: TypeOp::New,
            internal_name: "com/dep/Widget".to_string(),
        },
        Insn::Label(Label(1)),
        Insn::Frame(Frame {
            locals: vec![VerificationType::Object("com/test/Caller".to_string())],
            stack: vec![],
        }),
        Insn::Simple(SimpleOp::Dup),
        Insn::IntPush(7),
        Insn::Method {
            op: MethodOp::Invokespecial,
            member: MemberRef::new("com/dep/Widget", "<init>", "(I)V"),
        },
        Insn::Simple(SimpleOp::Pop),
    ]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    assert!(!body(&class).contains(&Insn::Simple(SimpleOp::Dup)));
    assert_eq!(body(&class)[0], Insn::Label(Label(1)));
    assert!(matches!(body(&class)[1], Insn::Frame(_)));
    assert_eq!(body(&class)[2], Insn::IntPush(7));
    let (name, _) = indy(&body(&class)[3]);
    assert_eq!(name, "construct");
    assert_eq!(body(&class)[4], Insn::Simple(SimpleOp::Pop));
}

#[test]
fn allocation_without_its_duplicate_is_rejected() {
    let mut class = caller(vec![
        Insn::TypeRef {
            op: TypeOp::New,
            internal_name: "com/dep/Widget".to_string(),
        },
        Insn::Var { op: VarOp::Astore, index: 1 },
    ]);
    let err = inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap_err();
    assert_eq!(
        err,
        RewriteError::UnsupportedAllocationPattern {
            internal_name: "com/dep/Widget".to_string(),
        }
    );

    // Same when the stream simply ends after the allocation.
    let mut class = caller(vec![Insn::TypeRef {
        op: TypeOp::New,
        internal_name: "com/dep/Widget".to_string(),
    }]);
    let err = inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap_err();
    assert!(matches!(err, RewriteError::UnsupportedAllocationPattern { .. }));
}

#[test]
fn unremapped_construction_keeps_allocation_and_dup() {
    let instructions = vec![
        Insn::TypeRef {
            op: TypeOp::New,
            internal_name: "java/lang/StringBuilder".to_string(),
        },
        Insn::Simple(SimpleOp::Dup),
        Insn::Method {
            op: MethodOp::Invokespecial,
            member: MemberRef::new("java/lang/StringBuilder", "<init>", "()V"),
        },
        Insn::Simple(SimpleOp::Pop),
    ];
    let mut class = caller(instructions.clone());
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();
    assert_eq!(body(&class), &instructions[..]);
}

#[test]
fn constructor_dispatch_without_expandable_owner_is_rejected() {
    // The descriptor expands but the owner does not, so the allocation
    // cannot be collapsed into the dispatch.
    let mut class = caller(vec![
        Insn::TypeRef {
            op: TypeOp::New,
            internal_name: "com/app/Wrapper".to_string(),
        },
        Insn::Simple(SimpleOp::Dup),
        Insn::Method {
            op: MethodOp::Invokespecial,
            member: MemberRef::new("com/app/Wrapper", "<init>", "(Lcom/dep/Widget;)V"),
        },
    ]);
    let err = inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap_err();
    assert!(matches!(
        err,
        RewriteError::UnsupportedConstructorDispatch { .. }
    ));
}

// ---------------------------------------------------------------------------
// Type instructions
// ---------------------------------------------------------------------------

#[test]
fn checkcast_becomes_identity_coercion_dispatch() {
    let mut class = caller(vec![Insn::TypeRef {
        op: TypeOp::Checkcast,
        internal_name: "com/dep/Widget".to_string(),
    }]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    let (name, descriptor) = indy(&body(&class)[0]);
    assert_eq!(name, "checkCast");
    assert_eq!(descriptor, "(Ljava/lang/Object;)Ljava/lang/Object;");
    let site = decode_type(&body(&class)[0]);
    assert_eq!(site.op, TypeDispatchOp::Checkcast);
    assert_eq!(site.internal_names, vec!["v1/Widget", "v2/Widget"]);
}

#[test]
fn array_checkcast_rewraps_candidates_to_original_depth() {
    let mut class = caller(vec![Insn::TypeRef {
        op: TypeOp::Checkcast,
        internal_name: "[[Lcom/dep/Widget;".to_string(),
    }]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    let (_, descriptor) = indy(&body(&class)[0]);
    assert_eq!(descriptor, "(Ljava/lang/Object;)[[Ljava/lang/Object;");
    let site = decode_type(&body(&class)[0]);
    assert_eq!(site.internal_names, vec!["[[Lv1/Widget;", "[[Lv2/Widget;"]);
}

#[test]
fn instanceof_becomes_membership_test_dispatch() {
    let mut class = caller(vec![Insn::TypeRef {
        op: TypeOp::Instanceof,
        internal_name: "com/dep/Widget".to_string(),
    }]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    let (name, descriptor) = indy(&body(&class)[0]);
    assert_eq!(name, "isInstance");
    assert_eq!(descriptor, "(Ljava/lang/Object;)Z");
    assert_eq!(decode_type(&body(&class)[0]).op, TypeDispatchOp::Instanceof);
}

#[test]
fn anewarray_becomes_allocation_dispatch() {
    let mut class = caller(vec![
        Insn::IntPush(3),
        Insn::TypeRef {
            op: TypeOp::Anewarray,
            internal_name: "com/dep/Widget".to_string(),
        },
    ]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    let (name, descriptor) = indy(&body(&class)[1]);
    assert_eq!(name, "newArray");
    assert_eq!(descriptor, "(I)[Ljava/lang/Object;");
    assert_eq!(decode_type(&body(&class)[1]).op, TypeDispatchOp::Anewarray);
}

#[test]
fn multianewarray_becomes_multi_allocation_dispatch() {
    let mut class = caller(vec![
        Insn::IntPush(2),
        Insn::IntPush(3),
        Insn::MultiNewArray {
            descriptor: "[[Lcom/dep/Widget;".to_string(),
            dimensions: 2,
        },
    ]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    let (name, descriptor) = indy(&body(&class)[2]);
    assert_eq!(name, "multiNewArray");
    assert_eq!(descriptor, "(II)[[Ljava/lang/Object;");
    let site = decode_type(&body(&class)[2]);
    assert_eq!(site.op, TypeDispatchOp::Multianewarray);
    assert_eq!(site.internal_names, vec!["[[Lv1/Widget;", "[[Lv2/Widget;"]);
}

#[test]
fn class_literal_becomes_constant_dispatch() {
    let mut class = caller(vec![Insn::Ldc(Const::Class("com/dep/Widget".to_string()))]);
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    let (name, descriptor) = indy(&body(&class)[0]);
    assert_eq!(name, "constant");
    assert_eq!(descriptor, "()Ljava/lang/Class;");
    assert_eq!(decode_type(&body(&class)[0]).op, TypeDispatchOp::ClassConstant);
}

#[test]
fn unmatched_type_instructions_pass_through() {
    let instructions = vec![
        Insn::TypeRef {
            op: TypeOp::Checkcast,
            internal_name: "java/lang/String".to_string(),
        },
        Insn::Ldc(Const::Class("java/lang/String".to_string())),
        Insn::MultiNewArray {
            descriptor: "[[Ljava/lang/String;".to_string(),
            dimensions: 2,
        },
    ];
    let mut class = caller(instructions.clone());
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();
    assert_eq!(body(&class), &instructions[..]);
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[test]
fn frames_and_local_variables_are_erased_not_expanded() {
    let mut class = caller(vec![Insn::Frame(Frame {
        locals: vec![
            VerificationType::Object("com/test/Caller".to_string()),
            VerificationType::Object("[Lcom/dep/Widget;".to_string()),
            VerificationType::Integer,
        ],
        stack: vec![VerificationType::Object("com/dep/Widget".to_string())],
    })]);
    class.methods[0].local_variables.push(LocalVariable {
        name: "widget".to_string(),
        descriptor: "Lcom/dep/Widget;".to_string(),
        index: 1,
    });
    inject_class(&mut class, &widget_config(), &ErasedMembers::default()).unwrap();

    assert_eq!(
        body(&class)[0],
        Insn::Frame(Frame {
            locals: vec![
                VerificationType::Object("com/test/Caller".to_string()),
                VerificationType::Object("[Ljava/lang/Object;".to_string()),
                VerificationType::Integer,
            ],
            stack: vec![VerificationType::Object("java/lang/Object".to_string())],
        })
    );
    assert_eq!(
        class.methods[0].local_variables[0].descriptor,
        "Ljava/lang/Object;"
    );
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn classes_rewrite_concurrently_against_shared_config() {
    let config = Arc::new(widget_config());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let config = Arc::clone(&config);
            std::thread::spawn(move || {
                let mut class = caller(vec![Insn::Field {
                    op: FieldOp::Getstatic,
                    member: MemberRef::new(
                        &format!("com/app/Holder{i}"),
                        "VALUE",
                        "Lcom/dep/Widget;",
                    ),
                }]);
                rewrite_class(&mut class, &config).unwrap();
                decode_member(&body(&class)[0]).descriptors
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), vec!["Lv1/Widget;", "Lv2/Widget;"]);
    }
}
