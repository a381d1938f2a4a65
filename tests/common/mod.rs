//! テストで使用する共通の定義テーブル
//!
//! ```text
//! class  Demo.Calc        { int Add(int) }
//! class  Demo.Util        { static T Get<T>(T) }
//! class  Demo.Box`1<T>    { T value; T Get(); U Map<U>(U[], T*) }
//! class  Demo.Pair`2<A,B>
//! struct Demo.Point       { int Length() }
//! class  Demo.IsVolatile
//! ```

#![allow(dead_code)]

use ilmono::metadata::{
    CallingConvention, ExceptionHandler, HandlerKind, Instruction, Metadata, MethodAttributes,
    MethodBody, MethodDefId, MethodSig, Operand, TypeDefId, TypeFlags,
};
use ilmono::signature::{CorLibType, SigRef, TypeRef, TypeSig};

pub struct Fixture {
    pub md: Metadata,
    pub calc: TypeDefId,
    pub util: TypeDefId,
    pub boxed: TypeDefId,
    pub pair: TypeDefId,
    pub point: TypeDefId,
    pub volatile: TypeDefId,
    pub add: MethodDefId,
    pub get: MethodDefId,
    pub box_get: MethodDefId,
    pub box_map: MethodDefId,
    pub length: MethodDefId,
}

pub fn int32() -> SigRef {
    TypeSig::corlib(CorLibType::Int32)
}

pub fn string() -> SigRef {
    TypeSig::corlib(CorLibType::String)
}

pub fn byte() -> SigRef {
    TypeSig::corlib(CorLibType::Byte)
}

pub const PUBLIC_STATIC: MethodAttributes =
    MethodAttributes::PUBLIC.with(MethodAttributes::STATIC);

impl Fixture {
    pub fn new() -> Self {
        let mut md = Metadata::new();
        let class = TypeFlags::default();

        let calc = md.add_type("Demo", "Calc", 0, class).unwrap();
        let util = md.add_type("Demo", "Util", 0, class).unwrap();
        let boxed = md.add_type("Demo", "Box`1", 1, class).unwrap();
        let pair = md.add_type("Demo", "Pair`2", 2, class).unwrap();
        let point = md
            .add_type(
                "Demo",
                "Point",
                0,
                TypeFlags {
                    corlib: false,
                    value_type: true,
                },
            )
            .unwrap();
        let volatile = md.add_type("Demo", "IsVolatile", 0, class).unwrap();

        let add = md.add_method(
            calc,
            "Add",
            MethodSig::new(CallingConvention::HAS_THIS, int32(), vec![int32()]),
            MethodAttributes::PUBLIC,
            Some(MethodBody {
                locals: vec![int32()],
                handlers: vec![ExceptionHandler {
                    kind: HandlerKind::Finally,
                    try_start: 0,
                    try_end: 4,
                    handler_start: 4,
                    handler_end: 6,
                    filter_start: None,
                    catch_type: None,
                }],
                instructions: vec![
                    Instruction {
                        offset: 0,
                        opcode: "ldarg.1".to_string(),
                        operand: Operand::None,
                    },
                    Instruction {
                        offset: 1,
                        opcode: "ret".to_string(),
                        operand: Operand::None,
                    },
                ],
            }),
        );

        let get_id = md.next_method_id();
        let t = TypeSig::mvar(0, get_id);
        let get = md.add_method(
            util,
            "Get",
            MethodSig::new(CallingConvention::DEFAULT, t.clone(), vec![t]).generic(1),
            PUBLIC_STATIC,
            None,
        );

        let box_t = TypeSig::var(0, md.type_def(boxed).type_ref());
        md.add_field(boxed, "value", box_t.clone(), false);
        let box_get = md.add_method(
            boxed,
            "Get",
            MethodSig::new(CallingConvention::HAS_THIS, box_t.clone(), vec![]),
            MethodAttributes::PUBLIC,
            Some(MethodBody {
                locals: vec![box_t.clone(), TypeSig::sz_array(box_t.clone())],
                ..MethodBody::default()
            }),
        );

        let map_id = md.next_method_id();
        let u = TypeSig::mvar(0, map_id);
        let box_map = md.add_method(
            boxed,
            "Map",
            MethodSig::new(
                CallingConvention::HAS_THIS,
                u.clone(),
                vec![TypeSig::sz_array(u), TypeSig::ptr(box_t)],
            )
            .generic(1),
            MethodAttributes::PUBLIC.with(MethodAttributes::VIRTUAL),
            None,
        );

        let length = md.add_method(
            point,
            "Length",
            MethodSig::new(CallingConvention::HAS_THIS, int32(), vec![]),
            MethodAttributes::PUBLIC,
            None,
        );

        Self {
            md,
            calc,
            util,
            boxed,
            pair,
            point,
            volatile,
            add,
            get,
            box_get,
            box_map,
            length,
        }
    }

    pub fn type_ref(&self, id: TypeDefId) -> TypeRef {
        self.md.type_def(id).type_ref()
    }

    /// `!n` owned by `Demo.Box`1`
    pub fn box_var(&self, number: u32) -> SigRef {
        TypeSig::var(number, self.type_ref(self.boxed))
    }

    /// `!n` owned by `Demo.Pair`2`
    pub fn pair_var(&self, number: u32) -> SigRef {
        TypeSig::var(number, self.type_ref(self.pair))
    }

    pub fn box_of(&self, arg: SigRef) -> SigRef {
        TypeSig::generic_inst(self.md.type_def(self.boxed).sig(), vec![arg])
    }
}
