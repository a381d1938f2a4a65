//! シグネチャの文字列化と名前キーのテスト

mod common;

use std::sync::Arc;

use common::*;
use ilmono::error::{MonoError, SignatureError};
use ilmono::metadata::CallingConvention;
use ilmono::signature::{
    field_name_key, method_name_key, method_name_key_with_gen, sig_name, type_name_key,
    CorLibType, ElementType, SigRef, TypeSig,
};
use pretty_assertions::assert_eq;
use test_case::test_case;

fn render(sig: &SigRef) -> String {
    sig_name(sig, false).unwrap()
}

#[test]
fn test_corlib_and_user_types() {
    let fx = Fixture::new();

    assert_eq!(render(&int32()), "Int32");
    assert_eq!(render(&fx.md.type_def(fx.calc).sig()), "Demo.Calc");
    assert_eq!(render(&fx.md.type_def(fx.point).sig()), "Demo.Point");
}

#[test]
fn test_wrapper_suffixes() {
    let fx = Fixture::new();

    assert_eq!(render(&TypeSig::ptr(int32())), "Int32*");
    assert_eq!(render(&TypeSig::by_ref(TypeSig::ptr(byte()))), "Byte*&");
    assert_eq!(render(&TypeSig::sz_array(TypeSig::sz_array(string()))), "String[][]");
    assert_eq!(
        render(&TypeSig::sz_array(fx.box_of(TypeSig::ptr(int32())))),
        "Demo.Box`1<Int32*>[]"
    );
}

#[test_case(1, vec![], vec![], "Byte[*]" ; "single dimension")]
#[test_case(2, vec![], vec![0, 0], "Byte[0...,0...]" ; "unknown sizes")]
#[test_case(2, vec![3, 4], vec![0, 1], "Byte[0..2,1..4]" ; "known sizes")]
#[test_case(3, vec![5], vec![-2], "Byte[-2..2,,]" ; "partial bounds")]
#[test_case(2, vec![], vec![], "Byte[,]" ; "no bounds")]
fn test_array_rendering(rank: u32, sizes: Vec<u32>, lower_bounds: Vec<i32>, expected: &str) {
    let sig = TypeSig::array(byte(), rank, sizes, lower_bounds);
    assert_eq!(render(&sig), expected);
}

#[test]
fn test_array_upper_bound_does_not_overflow() {
    let sig = TypeSig::array(byte(), 2, vec![u32::MAX], vec![i32::MAX]);
    let expected = format!("Byte[{}..{},]", i32::MAX, i64::from(i32::MAX) + i64::from(u32::MAX) - 1);
    assert_eq!(render(&sig), expected);
}

#[test]
fn test_zero_rank_array_is_rejected() {
    let sig = TypeSig::array(byte(), 0, vec![], vec![]);
    assert_eq!(
        sig_name(&sig, false).unwrap_err(),
        MonoError::Signature(SignatureError::ZeroRankArray)
    );
}

#[test]
fn test_modifiers_follow_element() {
    let fx = Fixture::new();
    let volatile = fx.type_ref(fx.volatile);

    assert_eq!(
        render(&TypeSig::mod_reqd(volatile.clone(), int32())),
        "Int32 modreq(Demo.IsVolatile)"
    );
    assert_eq!(
        render(&TypeSig::ptr(TypeSig::mod_opt(volatile, byte()))),
        "Byte modopt(Demo.IsVolatile)*"
    );
}

#[test]
fn test_pinned_renders_like_its_element() {
    let pinned = TypeSig::pinned(TypeSig::by_ref(int32()));
    assert_eq!(render(&pinned), render(&TypeSig::by_ref(int32())));
}

#[test]
fn test_generic_params() {
    let fx = Fixture::new();

    assert_eq!(render(&fx.box_var(0)), "!0");
    assert_eq!(sig_name(&fx.box_var(0), true).unwrap(), "!(Demo.Box`1)0");
    assert_eq!(render(&TypeSig::mvar(1, fx.get)), "!!1");
    assert_eq!(sig_name(&TypeSig::mvar(1, fx.get), true).unwrap(), "!!1");
}

#[test]
fn test_type_key() {
    let fx = Fixture::new();

    assert_eq!(type_name_key("Demo.Calc", &[]).unwrap(), "Demo.Calc");
    assert_eq!(
        type_name_key("Demo.Pair`2", &[int32(), fx.box_of(string())]).unwrap(),
        "Demo.Pair`2<Int32,Demo.Box`1<String>>"
    );
    // 型のキーでは型ジェネリック引数の所有者を区別する
    assert_eq!(
        type_name_key("Demo.Box`1", &[fx.pair_var(0)]).unwrap(),
        "Demo.Box`1<!(Demo.Pair`2)0>"
    );
    assert_ne!(
        type_name_key("Demo.Box`1", &[fx.pair_var(0)]).unwrap(),
        type_name_key("Demo.Box`1", &[fx.box_var(0)]).unwrap()
    );
}

#[test]
fn test_type_key_escapes_name_only() {
    assert_eq!(
        type_name_key("<>c__DisplayClass", &[int32()]).unwrap(),
        "\\u003C\\u003Ec__DisplayClass<Int32>"
    );
}

#[test]
fn test_method_key_with_generic_count() {
    let fx = Fixture::new();
    let t = TypeSig::mvar(0, fx.get);
    let cc = CallingConvention::GENERIC;

    assert_eq!(
        method_name_key("Get", 1, &t, &[t.clone()], cc).unwrap(),
        "Get|!!0<1>(!!0)|10"
    );
    assert_eq!(
        method_name_key("Add", 0, &int32(), &[int32(), int32()], CallingConvention::HAS_THIS)
            .unwrap(),
        "Add|Int32(Int32,Int32)|20"
    );
}

#[test]
fn test_method_key_with_generic_args() {
    let fx = Fixture::new();
    let cc = CallingConvention::HAS_THIS.with(CallingConvention::GENERIC);

    assert_eq!(
        method_name_key_with_gen(
            "Map",
            &[string(), fx.box_of(int32())],
            &string(),
            &[TypeSig::sz_array(string())],
            cc
        )
        .unwrap(),
        "Map|String<String,Demo.Box`1<Int32>>(String[])|30"
    );
    assert_eq!(
        method_name_key_with_gen(
            "Run",
            &[],
            &TypeSig::corlib(CorLibType::Void),
            &[],
            CallingConvention::DEFAULT
        )
        .unwrap(),
        "Run|Void()|0"
    );
}

#[test]
fn test_method_key_omits_type_var_owner() {
    let fx = Fixture::new();
    let key = method_name_key("Get", 0, &fx.box_var(0), &[], CallingConvention::HAS_THIS).unwrap();
    assert_eq!(key, "Get|!0()|20");
}

#[test]
fn test_field_key() {
    let fx = Fixture::new();

    assert_eq!(field_name_key("value", &int32()).unwrap(), "value|Int32");
    assert_eq!(
        field_name_key("<Items>k__BackingField", &TypeSig::sz_array(fx.box_of(string()))).unwrap(),
        "\\u003CItems\\u003Ek__BackingField|Demo.Box`1<String>[]"
    );
}

#[test]
fn test_rendering_is_deterministic() {
    let fx = Fixture::new();
    let sig = TypeSig::mod_reqd(
        fx.type_ref(fx.volatile),
        TypeSig::array(fx.box_of(fx.pair_var(1)), 2, vec![2], vec![0, 0]),
    );

    let first = sig_name(&sig, true).unwrap();
    let copy: SigRef = Arc::new(sig.as_ref().clone());
    let second = sig_name(&copy, true).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "Demo.Box`1<!(Demo.Pair`2)1>[0..1,0...] modreq(Demo.IsVolatile)");
}

#[test]
fn test_unsupported_element_cannot_be_rendered() {
    let sig: SigRef = Arc::new(TypeSig::Unsupported(ElementType::Sentinel));
    assert!(matches!(
        sig_name(&TypeSig::ptr(sig), false),
        Err(MonoError::Signature(SignatureError::UnsupportedElement { .. }))
    ));
}
