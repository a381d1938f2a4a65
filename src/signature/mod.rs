//! 型シグネチャモジュール
//!
//! メタデータから読み込まれた型シグネチャを閉じた列挙型として表現する。
//! 各ノードは高々1つの子（`next`）を持ち、`GenericInst` のみが引数リストを持つ。
//! ノードは `Arc` で共有され、置換処理で変更のない部分木は参照ごと再利用される。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metadata::{MethodDefId, TypeDefId};

mod mangling;
mod replacer;
mod substitution;

pub use mangling::*;
pub use replacer::*;
pub use substitution::*;

/// 共有されるシグネチャノードへの参照
pub type SigRef = Arc<TypeSig>;

/// シグネチャ要素の種類（ECMA-335の要素型に対応）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    CorLib,
    Class,
    ValueType,
    Ptr,
    ByRef,
    Pinned,
    SzArray,
    Array,
    CModReqd,
    CModOpt,
    GenericInst,
    Var,
    MVar,
    FnPtr,
    Sentinel,
    ValueArray,
    Module,
    Internal,
}

/// 基本ランタイムライブラリが提供する組み込み型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorLibType {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    TypedReference,
    IntPtr,
    UIntPtr,
    Object,
}

impl CorLibType {
    /// 短縮名（名前空間なし）
    pub fn name(self) -> &'static str {
        match self {
            CorLibType::Void => "Void",
            CorLibType::Boolean => "Boolean",
            CorLibType::Char => "Char",
            CorLibType::SByte => "SByte",
            CorLibType::Byte => "Byte",
            CorLibType::Int16 => "Int16",
            CorLibType::UInt16 => "UInt16",
            CorLibType::Int32 => "Int32",
            CorLibType::UInt32 => "UInt32",
            CorLibType::Int64 => "Int64",
            CorLibType::UInt64 => "UInt64",
            CorLibType::Single => "Single",
            CorLibType::Double => "Double",
            CorLibType::String => "String",
            CorLibType::TypedReference => "TypedReference",
            CorLibType::IntPtr => "IntPtr",
            CorLibType::UIntPtr => "UIntPtr",
            CorLibType::Object => "Object",
        }
    }

    pub fn full_name(self) -> String {
        format!("System.{}", self.name())
    }
}

/// 型定義への軽量な参照
///
/// `def` は同一性の比較にのみ使用され、定義グラフを辿るためには使わない。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub def: TypeDefId,
    /// 名前空間を含まない型名
    pub name: Arc<str>,
    /// 名前空間を含む完全修飾名
    pub full_name: Arc<str>,
    /// 基本ランタイムライブラリ由来かどうか
    pub corlib: bool,
}

impl TypeRef {
    pub fn new(def: TypeDefId, namespace: &str, name: &str, corlib: bool) -> Self {
        let full_name = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", namespace, name)
        };
        Self {
            def,
            name: Arc::from(name),
            full_name: Arc::from(full_name),
            corlib,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// 多次元配列シグネチャ
///
/// `sizes` と `lower_bounds` は次元ごとに独立して省略できる。
/// 次元数より短いリストは、末尾の次元の情報が不明であることを表す。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArraySig {
    pub element: SigRef,
    pub rank: u32,
    pub sizes: Vec<u32>,
    pub lower_bounds: Vec<i32>,
}

impl ArraySig {
    pub fn size(&self, dim: usize) -> Option<u32> {
        self.sizes.get(dim).copied()
    }

    pub fn lower_bound(&self, dim: usize) -> Option<i32> {
        self.lower_bounds.get(dim).copied()
    }
}

/// ジェネリック型のインスタンスシグネチャ
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericInstSig {
    /// 未束縛のジェネリック型（`Class` または `ValueType`）
    pub generic_type: SigRef,
    pub args: Vec<SigRef>,
}

/// 型シグネチャノード
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// 組み込み型
    CorLib(CorLibType),
    /// 参照型
    Class(TypeRef),
    /// 値型
    ValueType(TypeRef),
    Ptr(SigRef),
    ByRef(SigRef),
    Pinned(SigRef),
    /// 1次元・下限0の配列
    SzArray(SigRef),
    Array(ArraySig),
    CModReqd { modifier: TypeRef, next: SigRef },
    CModOpt { modifier: TypeRef, next: SigRef },
    GenericInst(GenericInstSig),
    /// 型レベルのジェネリック引数
    Var { number: u32, owner: TypeRef },
    /// メソッドレベルのジェネリック引数
    MVar { number: u32, owner: MethodDefId },
    /// 読み込みはできるが、このエンジンでは扱わない要素型
    Unsupported(ElementType),
}

impl TypeSig {
    pub fn element_type(&self) -> ElementType {
        match self {
            TypeSig::CorLib(_) => ElementType::CorLib,
            TypeSig::Class(_) => ElementType::Class,
            TypeSig::ValueType(_) => ElementType::ValueType,
            TypeSig::Ptr(_) => ElementType::Ptr,
            TypeSig::ByRef(_) => ElementType::ByRef,
            TypeSig::Pinned(_) => ElementType::Pinned,
            TypeSig::SzArray(_) => ElementType::SzArray,
            TypeSig::Array(_) => ElementType::Array,
            TypeSig::CModReqd { .. } => ElementType::CModReqd,
            TypeSig::CModOpt { .. } => ElementType::CModOpt,
            TypeSig::GenericInst(_) => ElementType::GenericInst,
            TypeSig::Var { .. } => ElementType::Var,
            TypeSig::MVar { .. } => ElementType::MVar,
            TypeSig::Unsupported(element) => *element,
        }
    }

    /// 単一の子ノード
    pub fn next(&self) -> Option<&SigRef> {
        match self {
            TypeSig::Ptr(next)
            | TypeSig::ByRef(next)
            | TypeSig::Pinned(next)
            | TypeSig::SzArray(next)
            | TypeSig::CModReqd { next, .. }
            | TypeSig::CModOpt { next, .. } => Some(next),
            TypeSig::Array(array) => Some(&array.element),
            _ => None,
        }
    }

    /// 型定義に対応するシグネチャならそのID
    pub fn type_def(&self) -> Option<TypeDefId> {
        match self {
            TypeSig::Class(ty) | TypeSig::ValueType(ty) => Some(ty.def),
            TypeSig::GenericInst(inst) => inst.generic_type.type_def(),
            _ => None,
        }
    }

    pub fn is_value_type(&self) -> bool {
        match self {
            TypeSig::ValueType(_) => true,
            TypeSig::GenericInst(inst) => inst.generic_type.is_value_type(),
            TypeSig::CorLib(ty) => !matches!(
                ty,
                CorLibType::String | CorLibType::Object | CorLibType::Void
            ),
            _ => false,
        }
    }

    pub fn is_generic_param(&self) -> bool {
        matches!(self, TypeSig::Var { .. } | TypeSig::MVar { .. })
    }

    pub fn corlib(ty: CorLibType) -> SigRef {
        Arc::new(TypeSig::CorLib(ty))
    }

    pub fn class(ty: TypeRef) -> SigRef {
        Arc::new(TypeSig::Class(ty))
    }

    pub fn value_type(ty: TypeRef) -> SigRef {
        Arc::new(TypeSig::ValueType(ty))
    }

    pub fn ptr(next: SigRef) -> SigRef {
        Arc::new(TypeSig::Ptr(next))
    }

    pub fn by_ref(next: SigRef) -> SigRef {
        Arc::new(TypeSig::ByRef(next))
    }

    pub fn pinned(next: SigRef) -> SigRef {
        Arc::new(TypeSig::Pinned(next))
    }

    pub fn sz_array(next: SigRef) -> SigRef {
        Arc::new(TypeSig::SzArray(next))
    }

    pub fn array(element: SigRef, rank: u32, sizes: Vec<u32>, lower_bounds: Vec<i32>) -> SigRef {
        Arc::new(TypeSig::Array(ArraySig {
            element,
            rank,
            sizes,
            lower_bounds,
        }))
    }

    pub fn mod_reqd(modifier: TypeRef, next: SigRef) -> SigRef {
        Arc::new(TypeSig::CModReqd { modifier, next })
    }

    pub fn mod_opt(modifier: TypeRef, next: SigRef) -> SigRef {
        Arc::new(TypeSig::CModOpt { modifier, next })
    }

    pub fn generic_inst(generic_type: SigRef, args: Vec<SigRef>) -> SigRef {
        Arc::new(TypeSig::GenericInst(GenericInstSig { generic_type, args }))
    }

    pub fn var(number: u32, owner: TypeRef) -> SigRef {
        Arc::new(TypeSig::Var { number, owner })
    }

    pub fn mvar(number: u32, owner: MethodDefId) -> SigRef {
        Arc::new(TypeSig::MVar { number, owner })
    }
}
