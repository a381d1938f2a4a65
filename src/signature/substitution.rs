//! ジェネリック引数の置換処理

use std::sync::Arc;

use crate::error::{MonoResult, SignatureError};

use super::{lookup_replacement, ArraySig, GenericInstSig, GenericReplacer, SigRef, TypeSig};

/// シグネチャ内のジェネリック引数を置換
///
/// 置換コンテキストがない場合や、シグネチャにジェネリック引数が含まれない場合は
/// 入力と同じ参照をそのまま返す。
pub fn substitute(sig: &SigRef, replacer: Option<&GenericReplacer<'_>>) -> MonoResult<SigRef> {
    match replacer {
        Some(replacer) if needs_substitution(sig) => substitute_impl(sig, replacer),
        _ => Ok(Arc::clone(sig)),
    }
}

/// シグネチャリストの各要素を置換
pub fn substitute_list(
    sigs: Option<&[SigRef]>,
    replacer: Option<&GenericReplacer<'_>>,
) -> MonoResult<Option<Vec<SigRef>>> {
    sigs.map(|sigs| {
        sigs.iter()
            .map(|sig| substitute(sig, replacer))
            .collect::<MonoResult<Vec<_>>>()
    })
    .transpose()
}

fn substitute_impl(sig: &SigRef, replacer: &GenericReplacer<'_>) -> MonoResult<SigRef> {
    let rebuilt = match sig.as_ref() {
        TypeSig::CorLib(_) | TypeSig::Class(_) | TypeSig::ValueType(_) => return Ok(Arc::clone(sig)),

        TypeSig::Ptr(next) => TypeSig::Ptr(substitute_impl(next, replacer)?),
        TypeSig::ByRef(next) => TypeSig::ByRef(substitute_impl(next, replacer)?),
        TypeSig::Pinned(next) => TypeSig::Pinned(substitute_impl(next, replacer)?),
        TypeSig::SzArray(next) => TypeSig::SzArray(substitute_impl(next, replacer)?),

        TypeSig::Array(array) => TypeSig::Array(ArraySig {
            element: substitute_impl(&array.element, replacer)?,
            rank: array.rank,
            sizes: array.sizes.clone(),
            lower_bounds: array.lower_bounds.clone(),
        }),
        TypeSig::CModReqd { modifier, next } => TypeSig::CModReqd {
            modifier: modifier.clone(),
            next: substitute_impl(next, replacer)?,
        },
        TypeSig::CModOpt { modifier, next } => TypeSig::CModOpt {
            modifier: modifier.clone(),
            next: substitute_impl(next, replacer)?,
        },
        TypeSig::GenericInst(inst) => TypeSig::GenericInst(GenericInstSig {
            generic_type: Arc::clone(&inst.generic_type),
            args: inst
                .args
                .iter()
                .map(|arg| substitute_impl(arg, replacer))
                .collect::<MonoResult<_>>()?,
        }),

        TypeSig::Var { number, owner } => match lookup_replacement(replacer, sig)? {
            Some(replaced) => return Ok(replaced),
            None => TypeSig::Var {
                number: *number,
                owner: owner.clone(),
            },
        },
        TypeSig::MVar { number, owner } => match lookup_replacement(replacer, sig)? {
            Some(replaced) => return Ok(replaced),
            None => TypeSig::MVar {
                number: *number,
                owner: *owner,
            },
        },

        TypeSig::Unsupported(element) => {
            return Err(SignatureError::UnsupportedElement { element: *element }.into())
        }
    };
    Ok(Arc::new(rebuilt))
}

/// 置換が必要なジェネリック引数を含むかどうか
pub fn needs_substitution(sig: &TypeSig) -> bool {
    let mut current = Some(sig);
    while let Some(sig) = current {
        match sig {
            TypeSig::Var { .. } | TypeSig::MVar { .. } => return true,
            TypeSig::GenericInst(inst) => {
                if inst.args.iter().any(|arg| needs_substitution(arg)) {
                    return true;
                }
            }
            _ => {}
        }
        current = sig.next().map(|next| next.as_ref());
    }
    false
}

/// 型引数として完全に具体的かどうか
///
/// 型引数リストにのみ使用する。メソッドジェネリック引数が現れた場合は
/// コンテキストの構築ミスとしてエラーになる。
pub fn is_fully_concrete(sig: &TypeSig) -> MonoResult<bool> {
    let mut current = Some(sig);
    while let Some(sig) = current {
        match sig {
            TypeSig::Var { .. } => return Ok(false),
            TypeSig::MVar { number, .. } => {
                return Err(SignatureError::MethodVarInTypeArgs { number: *number }.into())
            }
            TypeSig::GenericInst(inst) => {
                for arg in &inst.args {
                    if !is_fully_concrete(arg)? {
                        return Ok(false);
                    }
                }
            }
            _ => {}
        }
        current = sig.next().map(|next| next.as_ref());
    }
    Ok(true)
}

/// リスト版。リストがない場合は具体的とみなす
pub fn is_fully_concrete_list(sigs: Option<&[SigRef]>) -> MonoResult<bool> {
    let Some(sigs) = sigs else {
        return Ok(true);
    };
    for sig in sigs {
        if !is_fully_concrete(sig)? {
            return Ok(false);
        }
    }
    Ok(true)
}
