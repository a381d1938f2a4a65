//! ジェネリック引数の置換戦略

use crate::error::{MonoResult, SignatureError};
use crate::metadata::{MethodDefId, TypeDefId};

use super::{SigRef, TypeSig};

/// ジェネリック引数の置換コンテキスト
#[derive(Debug, Clone, Copy)]
pub enum GenericReplacer<'a> {
    /// 具体化された型とメソッドに束縛されたコンテキスト
    Bound {
        type_def: TypeDefId,
        type_args: &'a [SigRef],
        method_def: MethodDefId,
        method_args: &'a [SigRef],
    },
    /// 型定義と型引数のみを持つコンテキスト。メソッドジェネリック引数は解決できない
    TypeDef {
        type_def: TypeDefId,
        type_args: &'a [SigRef],
    },
}

impl<'a> GenericReplacer<'a> {
    pub fn bound(
        type_def: TypeDefId,
        type_args: &'a [SigRef],
        method_def: MethodDefId,
        method_args: &'a [SigRef],
    ) -> Self {
        GenericReplacer::Bound {
            type_def,
            type_args,
            method_def,
            method_args,
        }
    }

    pub fn type_def(type_def: TypeDefId, type_args: &'a [SigRef]) -> Self {
        GenericReplacer::TypeDef {
            type_def,
            type_args,
        }
    }
}

/// ジェネリック引数ノードの置換先を求める
///
/// スコープが一致しない場合は `None` を返し、呼び出し側は同じ番号と所有者を持つ
/// 新しいノードを作る。ジェネリック引数以外のノードに対しては常に `None`。
pub fn lookup_replacement(
    replacer: &GenericReplacer<'_>,
    sig: &TypeSig,
) -> MonoResult<Option<SigRef>> {
    match (replacer, sig) {
        (
            GenericReplacer::Bound {
                type_def,
                type_args,
                ..
            }
            | GenericReplacer::TypeDef {
                type_def,
                type_args,
            },
            TypeSig::Var { number, owner },
        ) => {
            if owner.def != *type_def {
                return Ok(None);
            }
            pick(type_args, *number, "!").map(Some)
        }
        (
            GenericReplacer::Bound {
                method_def,
                method_args,
                ..
            },
            TypeSig::MVar { number, owner },
        ) => {
            if owner != method_def {
                return Ok(None);
            }
            pick(method_args, *number, "!!").map(Some)
        }
        _ => Ok(None),
    }
}

fn pick(args: &[SigRef], number: u32, prefix: &str) -> MonoResult<SigRef> {
    args.get(number as usize).cloned().ok_or_else(|| {
        SignatureError::GenericArgOutOfRange {
            param: format!("{}{}", prefix, number),
            count: args.len(),
        }
        .into()
    })
}
