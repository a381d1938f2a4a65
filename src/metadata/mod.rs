//! メタデータモジュール
//!
//! 読み込み済みのメタデータ（型定義・メソッド定義・フィールド定義）を保持する。
//! 定義は `TypeDefId` / `MethodDefId` で参照され、シグネチャ側からは同一性の
//! 比較にのみ使われる。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, MonoResult};
use crate::signature::{method_name_key, SigRef, TypeRef, TypeSig};

pub mod snapshot;

/// 型定義のID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDefId(pub u32);

/// メソッド定義のID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodDefId(pub u32);

/// 呼び出し規約
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallingConvention(u8);

impl CallingConvention {
    pub const DEFAULT: Self = Self(0x00);
    pub const VAR_ARG: Self = Self(0x05);
    pub const GENERIC: Self = Self(0x10);
    pub const HAS_THIS: Self = Self(0x20);
    pub const EXPLICIT_THIS: Self = Self(0x40);

    const KIND_MASK: u8 = 0x0F;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn has_this(self) -> bool {
        self.0 & Self::HAS_THIS.0 != 0
    }

    pub fn is_generic(self) -> bool {
        self.0 & Self::GENERIC.0 != 0
    }

    pub fn is_var_arg(self) -> bool {
        self.0 & Self::KIND_MASK == Self::VAR_ARG.0
    }
}

/// メソッド属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodAttributes(u16);

impl MethodAttributes {
    pub const PRIVATE: Self = Self(0x0001);
    pub const PUBLIC: Self = Self(0x0006);
    pub const STATIC: Self = Self(0x0010);
    pub const FINAL: Self = Self(0x0020);
    pub const VIRTUAL: Self = Self(0x0040);
    pub const HIDE_BY_SIG: Self = Self(0x0080);
    pub const NEW_SLOT: Self = Self(0x0100);
    pub const ABSTRACT: Self = Self(0x0400);
    pub const SPECIAL_NAME: Self = Self(0x0800);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_static(self) -> bool {
        self.0 & Self::STATIC.0 != 0
    }

    pub fn is_virtual(self) -> bool {
        self.0 & Self::VIRTUAL.0 != 0
    }
}

/// メソッドシグネチャ
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub call_conv: CallingConvention,
    pub gen_param_count: u32,
    pub ret_type: SigRef,
    pub params: Vec<SigRef>,
    /// 可変長引数の場合、センチネル以降の引数
    pub params_after_sentinel: Option<Vec<SigRef>>,
}

impl MethodSig {
    pub fn new(call_conv: CallingConvention, ret_type: SigRef, params: Vec<SigRef>) -> Self {
        Self {
            call_conv,
            gen_param_count: 0,
            ret_type,
            params,
            params_after_sentinel: None,
        }
    }

    pub fn generic(mut self, gen_param_count: u32) -> Self {
        self.gen_param_count = gen_param_count;
        self.call_conv = self.call_conv.with(CallingConvention::GENERIC);
        self
    }

    pub fn has_this(&self) -> bool {
        self.call_conv.has_this()
    }
}

/// 例外ハンドラの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Catch,
    Filter,
    Finally,
    Fault,
}

/// 例外処理領域
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    pub kind: HandlerKind,
    pub try_start: u32,
    pub try_end: u32,
    pub handler_start: u32,
    pub handler_end: u32,
    pub filter_start: Option<u32>,
    pub catch_type: Option<SigRef>,
}

/// 命令のオペランド
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    #[default]
    None,
    Int(i64),
    Float(f64),
    String(String),
    Branch(u32),
    Switch(Vec<u32>),
    Token(String),
}

/// 命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: String,
    #[serde(default)]
    pub operand: Operand,
}

/// メソッド本体
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodBody {
    pub locals: Vec<SigRef>,
    pub handlers: Vec<ExceptionHandler>,
    pub instructions: Vec<Instruction>,
}

/// 型定義のフラグ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFlags {
    /// 基本ランタイムライブラリで定義されているか
    pub corlib: bool,
    pub value_type: bool,
}

/// 型定義
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: TypeDefId,
    pub namespace: String,
    pub name: String,
    pub flags: TypeFlags,
    pub gen_param_count: u32,
    pub methods: Vec<MethodDefId>,
    pub fields: Vec<FieldDef>,
}

impl TypeDef {
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.id, &self.namespace, &self.name, self.flags.corlib)
    }

    /// この型を指すシグネチャ（ジェネリック引数は付かない）
    pub fn sig(&self) -> SigRef {
        if self.flags.value_type {
            TypeSig::value_type(self.type_ref())
        } else {
            TypeSig::class(self.type_ref())
        }
    }
}

/// フィールド定義
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: SigRef,
    pub is_static: bool,
}

/// メソッド定義
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub id: MethodDefId,
    pub declaring_type: TypeDefId,
    pub name: String,
    pub sig: MethodSig,
    pub attributes: MethodAttributes,
    pub body: Option<MethodBody>,
}

impl MethodDef {
    pub fn is_static(&self) -> bool {
        self.attributes.is_static()
    }

    pub fn has_this(&self) -> bool {
        self.sig.has_this()
    }

    /// ジェネリック引数の個数のみを含む宣言形式のキー
    ///
    /// 同じジェネリックメソッドのすべての具体化で共通になる。
    pub fn signature_key(&self) -> MonoResult<String> {
        method_name_key(
            &self.name,
            self.sig.gen_param_count as usize,
            &self.sig.ret_type,
            &self.sig.params,
            self.sig.call_conv,
        )
    }
}

/// 定義テーブル
#[derive(Debug, Default)]
pub struct Metadata {
    types: Vec<TypeDef>,
    methods: Vec<MethodDef>,
    type_names: HashMap<String, TypeDefId>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// 型定義を追加。同じ完全修飾名の型が既にあればエラー
    pub fn add_type(
        &mut self,
        namespace: &str,
        name: &str,
        gen_param_count: u32,
        flags: TypeFlags,
    ) -> MonoResult<TypeDefId> {
        let id = TypeDefId(self.types.len() as u32);
        let def = TypeDef {
            id,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags,
            gen_param_count,
            methods: Vec::new(),
            fields: Vec::new(),
        };
        let full_name = def.full_name();
        if self.type_names.contains_key(&full_name) {
            return Err(MetadataError::DuplicateType { name: full_name }.into());
        }
        self.type_names.insert(full_name, id);
        self.types.push(def);
        Ok(id)
    }

    /// 次に追加されるメソッドのID
    ///
    /// メソッドジェネリック引数を含むシグネチャを組み立てるために使う。
    pub fn next_method_id(&self) -> MethodDefId {
        MethodDefId(self.methods.len() as u32)
    }

    /// メソッド定義を追加
    pub fn add_method(
        &mut self,
        declaring_type: TypeDefId,
        name: &str,
        sig: MethodSig,
        attributes: MethodAttributes,
        body: Option<MethodBody>,
    ) -> MethodDefId {
        let id = self.next_method_id();
        self.methods.push(MethodDef {
            id,
            declaring_type,
            name: name.to_string(),
            sig,
            attributes,
            body,
        });
        self.types[declaring_type.0 as usize].methods.push(id);
        id
    }

    /// フィールド定義を追加
    pub fn add_field(&mut self, ty: TypeDefId, name: &str, field_type: SigRef, is_static: bool) {
        self.types[ty.0 as usize].fields.push(FieldDef {
            name: name.to_string(),
            field_type,
            is_static,
        });
    }

    pub fn type_def(&self, id: TypeDefId) -> &TypeDef {
        &self.types[id.0 as usize]
    }

    pub fn method_def(&self, id: MethodDefId) -> &MethodDef {
        &self.methods[id.0 as usize]
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    /// 完全修飾名から型を検索
    pub fn find_type(&self, full_name: &str) -> Option<TypeDefId> {
        self.type_names.get(full_name).copied()
    }

    pub fn expect_type(&self, full_name: &str) -> MonoResult<TypeDefId> {
        self.find_type(full_name).ok_or_else(|| {
            MetadataError::UnknownType {
                name: full_name.to_string(),
            }
            .into()
        })
    }

    /// 名前からメソッドを検索。オーバーロードがある場合はエラー
    pub fn find_method(&self, ty: TypeDefId, name: &str) -> MonoResult<MethodDefId> {
        let def = self.type_def(ty);
        let mut found = def
            .methods
            .iter()
            .copied()
            .filter(|id| self.method_def(*id).name == name);
        match (found.next(), found.next()) {
            (Some(id), None) => Ok(id),
            (Some(_), Some(_)) => Err(MetadataError::AmbiguousMethod {
                ty: def.full_name(),
                method: name.to_string(),
            }
            .into()),
            (None, _) => Err(MetadataError::UnknownMethod {
                ty: def.full_name(),
                method: name.to_string(),
            }
            .into()),
        }
    }

    /// 名前からフィールドのインデックスを検索
    pub fn find_field(&self, ty: TypeDefId, name: &str) -> MonoResult<usize> {
        let def = self.type_def(ty);
        def.fields
            .iter()
            .position(|field| field.name == name)
            .ok_or_else(|| {
                MetadataError::UnknownField {
                    ty: def.full_name(),
                    field: name.to_string(),
                }
                .into()
            })
    }
}
