//! 名前マングリング処理
//!
//! 型・メソッド・フィールドの名前とシグネチャから、インスタンスを一意に識別する
//! 決定的な文字列キーを生成する。キーの書式は他のフェーズがテーブルの索引として
//! 使用するため、1バイトでも変えてはならない。
//!
//! - 型: `Name<Args>`
//! - メソッド: `Name|Ret<GenCount>(Params)|CC` または `Name|Ret<GenArgs>(Params)|CC`
//! - フィールド: `Name|Type`

use crate::error::{MonoResult, SignatureError};
use crate::metadata::CallingConvention;

use super::{SigRef, TypeRef, TypeSig};

/// エスケープせずにキーへ含めてよい文字
fn is_plain_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '`' | '.' | ':' | '/')
}

/// 識別子をエスケープ
///
/// 安全な文字以外は UTF-16 のコード単位ごとに `\uXXXX` へ変換する。
pub fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        if is_plain_char(ch) {
            escaped.push(ch);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in ch.encode_utf16(&mut units) {
            escaped.push_str(&format!("\\u{:04X}", unit));
        }
    }
    escaped
}

/// 型定義を参照するシグネチャの名前。基本ライブラリの型は短縮名になる
fn class_sig_name(ty: &TypeRef) -> &str {
    if ty.corlib {
        &*ty.name
    } else {
        &*ty.full_name
    }
}

/// シグネチャを文字列として書き出す
///
/// `print_owner` が真の場合、型ジェネリック引数に所有する型の名前を付ける。
pub fn write_sig(out: &mut String, sig: &TypeSig, print_owner: bool) -> MonoResult<()> {
    match sig {
        TypeSig::CorLib(ty) => out.push_str(ty.name()),
        TypeSig::Class(ty) | TypeSig::ValueType(ty) => out.push_str(class_sig_name(ty)),

        TypeSig::Ptr(next) => {
            write_sig(out, next, print_owner)?;
            out.push('*');
        }
        TypeSig::ByRef(next) => {
            write_sig(out, next, print_owner)?;
            out.push('&');
        }
        // pinned は印を付けずに要素型のみを書く
        TypeSig::Pinned(next) => write_sig(out, next, print_owner)?,
        TypeSig::SzArray(next) => {
            write_sig(out, next, print_owner)?;
            out.push_str("[]");
        }

        TypeSig::Array(array) => {
            write_sig(out, &array.element, print_owner)?;
            out.push('[');
            match array.rank {
                0 => return Err(SignatureError::ZeroRankArray.into()),
                1 => out.push('*'),
                rank => {
                    for dim in 0..rank as usize {
                        if dim != 0 {
                            out.push(',');
                        }
                        if let Some(lower) = array.lower_bound(dim) {
                            out.push_str(&format!("{}..", lower));
                            match array.size(dim) {
                                Some(size) => {
                                    out.push_str(&(i64::from(lower) + i64::from(size) - 1).to_string());
                                }
                                None => out.push('.'),
                            }
                        }
                    }
                }
            }
            out.push(']');
        }

        TypeSig::CModReqd { modifier, next } => {
            write_sig(out, next, print_owner)?;
            out.push_str(&format!(" modreq({})", modifier.full_name));
        }
        TypeSig::CModOpt { modifier, next } => {
            write_sig(out, next, print_owner)?;
            out.push_str(&format!(" modopt({})", modifier.full_name));
        }

        TypeSig::GenericInst(inst) => {
            write_sig(out, &inst.generic_type, print_owner)?;
            out.push('<');
            write_sig_list(out, &inst.args, print_owner)?;
            out.push('>');
        }

        TypeSig::Var { number, owner } => {
            out.push('!');
            if print_owner {
                out.push_str(&format!("({})", owner.full_name));
            }
            out.push_str(&number.to_string());
        }
        TypeSig::MVar { number, .. } => {
            out.push_str(&format!("!!{}", number));
        }

        TypeSig::Unsupported(element) => {
            return Err(SignatureError::UnsupportedElement { element: *element }.into())
        }
    }
    Ok(())
}

/// シグネチャリストをカンマ区切りで書き出す
pub fn write_sig_list(out: &mut String, sigs: &[SigRef], print_owner: bool) -> MonoResult<()> {
    for (i, sig) in sigs.iter().enumerate() {
        if i != 0 {
            out.push(',');
        }
        write_sig(out, sig, print_owner)?;
    }
    Ok(())
}

/// シグネチャを文字列に変換
pub fn sig_name(sig: &TypeSig, print_owner: bool) -> MonoResult<String> {
    let mut out = String::new();
    write_sig(&mut out, sig, print_owner)?;
    Ok(out)
}

/// 型のキー: `Name<Args>`
pub fn type_name_key(name: &str, gen_args: &[SigRef]) -> MonoResult<String> {
    let mut key = escape_name(name);
    if !gen_args.is_empty() {
        key.push('<');
        write_sig_list(&mut key, gen_args, true)?;
        key.push('>');
    }
    Ok(key)
}

/// 宣言形式のメソッドキー: `Name|Ret<GenCount>(Params)|CC`
pub fn method_name_key(
    name: &str,
    gen_count: usize,
    ret_type: &TypeSig,
    param_types: &[SigRef],
    call_conv: CallingConvention,
) -> MonoResult<String> {
    let mut key = escape_name(name);
    key.push('|');
    write_sig(&mut key, ret_type, false)?;
    if gen_count > 0 {
        key.push_str(&format!("<{}>", gen_count));
    }
    write_params_and_call_conv(&mut key, param_types, call_conv)?;
    Ok(key)
}

/// ジェネリック引数付きのメソッドキー: `Name|Ret<GenArgs>(Params)|CC`
pub fn method_name_key_with_gen(
    name: &str,
    gen_args: &[SigRef],
    ret_type: &TypeSig,
    param_types: &[SigRef],
    call_conv: CallingConvention,
) -> MonoResult<String> {
    let mut key = escape_name(name);
    key.push('|');
    write_sig(&mut key, ret_type, false)?;
    if !gen_args.is_empty() {
        key.push('<');
        write_sig_list(&mut key, gen_args, false)?;
        key.push('>');
    }
    write_params_and_call_conv(&mut key, param_types, call_conv)?;
    Ok(key)
}

fn write_params_and_call_conv(
    key: &mut String,
    param_types: &[SigRef],
    call_conv: CallingConvention,
) -> MonoResult<()> {
    key.push('(');
    write_sig_list(key, param_types, false)?;
    key.push(')');
    key.push_str(&format!("|{:X}", call_conv.bits()));
    Ok(())
}

/// フィールドのキー: `Name|Type`
pub fn field_name_key(name: &str, field_type: &TypeSig) -> MonoResult<String> {
    let mut key = escape_name(name);
    key.push('|');
    write_sig(&mut key, field_type, false)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Add" ; "letters")]
    #[test_case("op_Implicit" ; "underscore")]
    #[test_case("List`1" ; "backtick")]
    #[test_case("System.Collections.Generic" ; "dots")]
    #[test_case("Outer/Inner" ; "nested separator")]
    #[test_case("IFoo::Bar" ; "colons")]
    fn test_plain_names_escape_to_themselves(name: &str) {
        assert_eq!(escape_name(name), name);
    }

    #[test_case("a b", "a\\u0020b" ; "space")]
    #[test_case("<Get>b__0", "\\u003CGet\\u003Eb__0" ; "compiler generated")]
    #[test_case("\t", "\\u0009" ; "control character")]
    #[test_case("é", "\\u00E9" ; "latin")]
    #[test_case("\\u0041", "\\u005Cu0041" ; "backslash is escaped too")]
    #[test_case("𝔸", "\\uD835\\uDD38" ; "supplementary plane")]
    fn test_unsafe_characters_are_escaped(name: &str, expected: &str) {
        assert_eq!(escape_name(name), expected);
    }

    #[test]
    fn test_distinct_characters_never_share_an_escape() {
        let escapes: std::collections::HashSet<String> = (0u32..0x800)
            .filter_map(char::from_u32)
            .filter(|ch| !is_plain_char(*ch))
            .map(|ch| escape_name(&ch.to_string()))
            .collect();
        let expected = (0u32..0x800)
            .filter_map(char::from_u32)
            .filter(|ch| !is_plain_char(*ch))
            .count();
        assert_eq!(escapes.len(), expected);
        assert!(escapes.iter().all(|e| e.len() == 6));
    }
}
