//! メタデータスナップショットの読み込み
//!
//! メタデータリーダーが出力した解析済みの定義をJSONから読み込み、
//! `Metadata` と具体化要求のリストを構築する。
//!
//! ```json
//! {
//!   "types": [
//!     { "namespace": "Demo", "name": "Box`1", "generic_params": 1,
//!       "fields": [ { "name": "value", "type": { "var": { "number": 0 } } } ],
//!       "methods": [
//!         { "name": "Get", "calling_convention": 32, "attributes": 134,
//!           "generic_params": 1, "ret": { "mvar": 0 }, "params": [ { "mvar": 0 } ] }
//!       ] }
//!   ],
//!   "instantiations": [
//!     { "type": "Demo.Box`1", "type_args": [ { "primitive": "Int32" } ],
//!       "method": "Get", "method_args": [ { "primitive": "String" } ] }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{
    CallingConvention, ExceptionHandler, HandlerKind, Instruction, Metadata, MethodAttributes,
    MethodBody, MethodDefId, MethodSig, TypeDefId, TypeFlags,
};
use crate::error::{MetadataError, MonoResult};
use crate::signature::{CorLibType, ElementType, SigRef, TypeSig};

/// JSON上のシグネチャ表現
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigDesc {
    Primitive(CorLibType),
    /// 定義済みの型。値型かどうかは型定義のフラグに従う
    Type(String),
    Ptr(Box<SigDesc>),
    ByRef(Box<SigDesc>),
    Pinned(Box<SigDesc>),
    SzArray(Box<SigDesc>),
    Array {
        element: Box<SigDesc>,
        rank: u32,
        #[serde(default)]
        sizes: Vec<u32>,
        #[serde(default)]
        lower_bounds: Vec<i32>,
    },
    ModReqd {
        modifier: String,
        next: Box<SigDesc>,
    },
    ModOpt {
        modifier: String,
        next: Box<SigDesc>,
    },
    GenericInst {
        generic_type: String,
        args: Vec<SigDesc>,
    },
    /// 所有者を省略した場合は、囲んでいる型の引数とみなす
    Var {
        number: u32,
        #[serde(default)]
        owner: Option<String>,
    },
    /// 囲んでいるメソッドの引数
    Mvar(u32),
    Unsupported(ElementType),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: SigDesc,
    #[serde(default)]
    pub is_static: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandlerDesc {
    pub kind: HandlerKind,
    pub try_start: u32,
    pub try_end: u32,
    pub handler_start: u32,
    pub handler_end: u32,
    #[serde(default)]
    pub filter_start: Option<u32>,
    #[serde(default)]
    pub catch_type: Option<SigDesc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BodyDesc {
    #[serde(default)]
    pub locals: Vec<SigDesc>,
    #[serde(default)]
    pub handlers: Vec<HandlerDesc>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodDesc {
    pub name: String,
    #[serde(default)]
    pub calling_convention: u8,
    #[serde(default)]
    pub attributes: u16,
    #[serde(default)]
    pub generic_params: u32,
    pub ret: SigDesc,
    #[serde(default)]
    pub params: Vec<SigDesc>,
    #[serde(default)]
    pub params_after_sentinel: Option<Vec<SigDesc>>,
    #[serde(default)]
    pub body: Option<BodyDesc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeDesc {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub corlib: bool,
    #[serde(default)]
    pub value_type: bool,
    #[serde(default)]
    pub generic_params: u32,
    #[serde(default)]
    pub fields: Vec<FieldDesc>,
    #[serde(default)]
    pub methods: Vec<MethodDesc>,
}

/// 具体化の要求。`method` と `field` を省略した場合は型のみを具体化する
#[derive(Debug, Clone, Deserialize)]
pub struct RequestDesc {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub type_args: Vec<SigDesc>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub method_args: Vec<SigDesc>,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub types: Vec<TypeDesc>,
    #[serde(default)]
    pub instantiations: Vec<RequestDesc>,
}

/// 解決済みの具体化要求
#[derive(Debug, Clone)]
pub struct Request {
    pub ty: TypeDefId,
    pub type_args: Vec<SigRef>,
    pub target: RequestTarget,
}

#[derive(Debug, Clone)]
pub enum RequestTarget {
    Type,
    Method { def: MethodDefId, args: Vec<SigRef> },
    Field { index: usize },
}

/// 読み込み結果
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub metadata: Metadata,
    pub requests: Vec<Request>,
}

/// シグネチャを解決する際のスコープ
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    ty: Option<TypeDefId>,
    method: Option<MethodDefId>,
}

/// JSON文字列からスナップショットを解析
pub fn parse_snapshot(text: &str) -> MonoResult<Snapshot> {
    Ok(serde_json::from_str(text)?)
}

/// ファイルからスナップショットを読み込み、定義テーブルを構築
pub fn load_snapshot(path: &Path) -> MonoResult<LoadedSnapshot> {
    let text = fs::read_to_string(path)?;
    parse_snapshot(&text)?.build()
}

impl Snapshot {
    /// 定義テーブルと具体化要求を構築
    pub fn build(&self) -> MonoResult<LoadedSnapshot> {
        let mut metadata = Metadata::new();

        // 型を先にすべて登録し、相互参照できるようにする
        let ids = self
            .types
            .iter()
            .map(|ty| {
                metadata.add_type(
                    &ty.namespace,
                    &ty.name,
                    ty.generic_params,
                    TypeFlags {
                        corlib: ty.corlib,
                        value_type: ty.value_type,
                    },
                )
            })
            .collect::<MonoResult<Vec<TypeDefId>>>()?;

        for (desc, &ty) in self.types.iter().zip(&ids) {
            let type_scope = Scope {
                ty: Some(ty),
                method: None,
            };
            for field in &desc.fields {
                let field_type = resolve_sig(&metadata, &field.field_type, type_scope)?;
                metadata.add_field(ty, &field.name, field_type, field.is_static);
            }
            for method in &desc.methods {
                let scope = Scope {
                    ty: Some(ty),
                    method: Some(metadata.next_method_id()),
                };
                let (sig, body) = resolve_method(&metadata, method, scope)?;
                metadata.add_method(
                    ty,
                    &method.name,
                    sig,
                    MethodAttributes::from_bits(method.attributes),
                    body,
                );
            }
        }

        let requests = self
            .instantiations
            .iter()
            .map(|request| resolve_request(&metadata, request))
            .collect::<MonoResult<Vec<_>>>()?;

        log::debug!(
            "スナップショットを読み込みました: 型{}個, 要求{}個",
            metadata.types().len(),
            requests.len()
        );
        Ok(LoadedSnapshot { metadata, requests })
    }
}

fn resolve_method(
    metadata: &Metadata,
    desc: &MethodDesc,
    scope: Scope,
) -> MonoResult<(MethodSig, Option<MethodBody>)> {
    let mut sig = MethodSig::new(
        CallingConvention::from_bits(desc.calling_convention),
        resolve_sig(metadata, &desc.ret, scope)?,
        resolve_sig_list(metadata, &desc.params, scope)?,
    );
    if desc.generic_params > 0 {
        sig = sig.generic(desc.generic_params);
    }
    sig.params_after_sentinel = desc
        .params_after_sentinel
        .as_ref()
        .map(|params| resolve_sig_list(metadata, params, scope))
        .transpose()?;

    let body = match &desc.body {
        Some(body) => Some(MethodBody {
            locals: resolve_sig_list(metadata, &body.locals, scope)?,
            handlers: body
                .handlers
                .iter()
                .map(|handler| resolve_handler(metadata, handler, scope))
                .collect::<MonoResult<Vec<_>>>()?,
            instructions: body.instructions.clone(),
        }),
        None => None,
    };
    Ok((sig, body))
}

fn resolve_handler(
    metadata: &Metadata,
    desc: &HandlerDesc,
    scope: Scope,
) -> MonoResult<ExceptionHandler> {
    Ok(ExceptionHandler {
        kind: desc.kind,
        try_start: desc.try_start,
        try_end: desc.try_end,
        handler_start: desc.handler_start,
        handler_end: desc.handler_end,
        filter_start: desc.filter_start,
        catch_type: desc
            .catch_type
            .as_ref()
            .map(|ty| resolve_sig(metadata, ty, scope))
            .transpose()?,
    })
}

fn resolve_request(metadata: &Metadata, desc: &RequestDesc) -> MonoResult<Request> {
    let ty = metadata.expect_type(&desc.type_name)?;
    let scope = Scope::default();
    let type_args = resolve_sig_list(metadata, &desc.type_args, scope)?;
    let target = match (&desc.method, &desc.field) {
        (Some(method), _) => RequestTarget::Method {
            def: metadata.find_method(ty, method)?,
            args: resolve_sig_list(metadata, &desc.method_args, scope)?,
        },
        (None, Some(field)) => RequestTarget::Field {
            index: metadata.find_field(ty, field)?,
        },
        (None, None) => RequestTarget::Type,
    };
    Ok(Request {
        ty,
        type_args,
        target,
    })
}

fn resolve_sig_list(metadata: &Metadata, descs: &[SigDesc], scope: Scope) -> MonoResult<Vec<SigRef>> {
    descs
        .iter()
        .map(|desc| resolve_sig(metadata, desc, scope))
        .collect()
}

fn resolve_sig(metadata: &Metadata, desc: &SigDesc, scope: Scope) -> MonoResult<SigRef> {
    let sig = match desc {
        SigDesc::Primitive(ty) => TypeSig::corlib(*ty),
        SigDesc::Type(name) => metadata.type_def(metadata.expect_type(name)?).sig(),
        SigDesc::Ptr(next) => TypeSig::ptr(resolve_sig(metadata, next, scope)?),
        SigDesc::ByRef(next) => TypeSig::by_ref(resolve_sig(metadata, next, scope)?),
        SigDesc::Pinned(next) => TypeSig::pinned(resolve_sig(metadata, next, scope)?),
        SigDesc::SzArray(next) => TypeSig::sz_array(resolve_sig(metadata, next, scope)?),
        SigDesc::Array {
            element,
            rank,
            sizes,
            lower_bounds,
        } => TypeSig::array(
            resolve_sig(metadata, element, scope)?,
            *rank,
            sizes.clone(),
            lower_bounds.clone(),
        ),
        SigDesc::ModReqd { modifier, next } => TypeSig::mod_reqd(
            metadata.type_def(metadata.expect_type(modifier)?).type_ref(),
            resolve_sig(metadata, next, scope)?,
        ),
        SigDesc::ModOpt { modifier, next } => TypeSig::mod_opt(
            metadata.type_def(metadata.expect_type(modifier)?).type_ref(),
            resolve_sig(metadata, next, scope)?,
        ),
        SigDesc::GenericInst { generic_type, args } => TypeSig::generic_inst(
            metadata.type_def(metadata.expect_type(generic_type)?).sig(),
            resolve_sig_list(metadata, args, scope)?,
        ),
        SigDesc::Var { number, owner } => {
            let owner = match (owner, scope.ty) {
                (Some(name), _) => metadata.expect_type(name)?,
                (None, Some(ty)) => ty,
                (None, None) => {
                    return Err(MetadataError::TypeVarWithoutOwner { number: *number }.into())
                }
            };
            TypeSig::var(*number, metadata.type_def(owner).type_ref())
        }
        SigDesc::Mvar(number) => match scope.method {
            Some(method) => TypeSig::mvar(*number, method),
            None => return Err(MetadataError::MethodVarOutsideMethod { number: *number }.into()),
        },
        SigDesc::Unsupported(element) => std::sync::Arc::new(TypeSig::Unsupported(*element)),
    };
    Ok(sig)
}
