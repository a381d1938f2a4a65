//! 具体化されたメソッドのレコード

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexSet;

use super::{MethodInstId, TypeInst};
use crate::error::{InstantiationError, MonoResult};
use crate::metadata::{
    ExceptionHandler, Instruction, MethodAttributes, MethodDef, MethodDefId, MethodSig,
};
use crate::signature::{method_name_key_with_gen, substitute, substitute_list, GenericReplacer, SigRef, TypeSig};

/// 具体化された型に属するメソッドのインスタンス
///
/// 生成直後に `concretize` で一度だけ具体化され、その後はオーバーライド集合と
/// 処理フラグ以外は変更されない。
#[derive(Debug)]
pub struct MethodInst {
    /// 所属する型
    decl_type: Arc<TypeInst>,
    def: MethodDefId,
    /// メソッド名
    def_name: String,
    /// 宣言されたシグネチャ
    def_sig: MethodSig,
    def_attr: MethodAttributes,
    /// 宣言された例外処理領域
    def_handlers: Option<Vec<ExceptionHandler>>,
    /// 宣言された命令列
    def_inst_list: Option<Vec<Instruction>>,
    /// 宣言されたローカル変数の型
    def_local_types: Option<Vec<SigRef>>,
    /// メソッド自身のジェネリック引数
    gen_args: Vec<SigRef>,

    /// 宣言形式のキー
    name_key: OnceLock<String>,

    /// インスタンスメソッドの場合のthisの型
    this_type: Option<SigRef>,
    return_type: Option<SigRef>,
    param_types: Option<Vec<SigRef>>,
    params_after_sentinel: Option<Vec<SigRef>>,
    local_types: Option<Vec<SigRef>>,
    concretized: bool,

    /// 仮想呼び出しに束縛された実装メソッド
    override_impls: Option<IndexSet<MethodInstId>>,

    /// 処理済みかどうか
    pub is_processed: bool,
    /// 処理をスキップするかどうか
    pub is_skip_processing: bool,
}

impl MethodInst {
    pub fn new(decl_type: Arc<TypeInst>, def: &MethodDef, gen_args: Vec<SigRef>) -> MonoResult<Self> {
        if def.declaring_type != decl_type.def() {
            return Err(InstantiationError::DeclaringTypeMismatch {
                method: def.name.clone(),
                ty: decl_type.name().to_string(),
            }
            .into());
        }
        if def.has_this() == def.is_static() {
            return Err(InstantiationError::ReceiverMismatch {
                method: def.name.clone(),
            }
            .into());
        }
        if gen_args.len() != def.sig.gen_param_count as usize {
            return Err(InstantiationError::GenericArgCountMismatch {
                name: def.name.clone(),
                expected: def.sig.gen_param_count as usize,
                found: gen_args.len(),
            }
            .into());
        }

        let (def_handlers, def_local_types, def_inst_list) = match &def.body {
            Some(body) => (
                non_empty(&body.handlers),
                non_empty(&body.locals),
                non_empty(&body.instructions),
            ),
            None => (None, None, None),
        };

        Ok(Self {
            decl_type,
            def: def.id,
            def_name: def.name.clone(),
            def_sig: def.sig.clone(),
            def_attr: def.attributes,
            def_handlers,
            def_inst_list,
            def_local_types,
            gen_args,
            name_key: OnceLock::new(),
            this_type: None,
            return_type: None,
            param_types: None,
            params_after_sentinel: None,
            local_types: None,
            concretized: false,
            override_impls: None,
            is_processed: false,
            is_skip_processing: false,
        })
    }

    /// 所属する型と自身のジェネリック引数で、シグネチャとローカル変数の型を置換
    pub fn concretize(&mut self) -> MonoResult<()> {
        if self.concretized {
            return Err(InstantiationError::AlreadyConcretized {
                method: self.def_name.clone(),
            }
            .into());
        }

        let replacer = GenericReplacer::bound(
            self.decl_type.def(),
            self.decl_type.gen_args(),
            self.def,
            &self.gen_args,
        );
        let replacer = Some(&replacer);

        let return_type = substitute(&self.def_sig.ret_type, replacer)?;
        let param_types = substitute_list(Some(&self.def_sig.params), replacer)?;
        let params_after_sentinel =
            substitute_list(self.def_sig.params_after_sentinel.as_deref(), replacer)?;
        let local_types = substitute_list(self.def_local_types.as_deref(), replacer)?;

        self.this_type = self.has_this().then(|| {
            let sig = self.decl_type.sig();
            if self.decl_type.is_value_type() {
                TypeSig::by_ref(sig)
            } else {
                sig
            }
        });
        self.return_type = Some(return_type);
        self.param_types = param_types;
        self.params_after_sentinel = params_after_sentinel;
        self.local_types = local_types;
        self.concretized = true;

        log::trace!("メソッドを具体化しました: {}", self);
        Ok(())
    }

    /// 宣言形式のキー: `Name|Ret<GenArgs>(DefParams)|CC|Attr`
    ///
    /// 置換前のシグネチャから一度だけ計算され、以降は同じ値を返す。
    pub fn declared_key(&self) -> MonoResult<&str> {
        if let Some(key) = self.name_key.get() {
            return Ok(key);
        }
        let key = self.key_for(&self.def_sig.ret_type, &self.def_sig.params)?;
        Ok(self.name_key.get_or_init(|| key))
    }

    /// 具体化後のキー: `Name|Ret<GenArgs>(Params)|CC|Attr`
    pub fn concretized_key(&self) -> MonoResult<String> {
        match (&self.return_type, &self.param_types) {
            (Some(return_type), Some(param_types)) => self.key_for(return_type, param_types),
            _ => Err(InstantiationError::NotConcretized {
                method: self.def_name.clone(),
            }
            .into()),
        }
    }

    fn key_for(&self, ret_type: &TypeSig, param_types: &[SigRef]) -> MonoResult<String> {
        let mut key = method_name_key_with_gen(
            &self.def_name,
            &self.gen_args,
            ret_type,
            param_types,
            self.def_sig.call_conv,
        )?;
        key.push_str(&format!("|{:X}", self.def_attr.bits()));
        Ok(key)
    }

    /// オーバーライド実装を追加。既に登録済みなら何もしない
    pub fn add_override_impl(&mut self, impl_id: MethodInstId) -> bool {
        self.override_impls
            .get_or_insert_with(IndexSet::new)
            .insert(impl_id)
    }

    pub fn override_impls(&self) -> impl Iterator<Item = MethodInstId> + '_ {
        self.override_impls.iter().flatten().copied()
    }

    pub fn has_override_impls(&self) -> bool {
        self.override_impls.as_ref().is_some_and(|impls| !impls.is_empty())
    }

    pub fn decl_type(&self) -> &Arc<TypeInst> {
        &self.decl_type
    }

    pub fn def(&self) -> MethodDefId {
        self.def
    }

    pub fn name(&self) -> &str {
        &self.def_name
    }

    pub fn def_sig(&self) -> &MethodSig {
        &self.def_sig
    }

    pub fn attributes(&self) -> MethodAttributes {
        self.def_attr
    }

    pub fn gen_args(&self) -> &[SigRef] {
        &self.gen_args
    }

    pub fn handlers(&self) -> Option<&[ExceptionHandler]> {
        self.def_handlers.as_deref()
    }

    pub fn instructions(&self) -> Option<&[Instruction]> {
        self.def_inst_list.as_deref()
    }

    pub fn def_local_types(&self) -> Option<&[SigRef]> {
        self.def_local_types.as_deref()
    }

    pub fn this_type(&self) -> Option<&SigRef> {
        self.this_type.as_ref()
    }

    pub fn return_type(&self) -> Option<&SigRef> {
        self.return_type.as_ref()
    }

    pub fn param_types(&self) -> Option<&[SigRef]> {
        self.param_types.as_deref()
    }

    pub fn params_after_sentinel(&self) -> Option<&[SigRef]> {
        self.params_after_sentinel.as_deref()
    }

    pub fn local_types(&self) -> Option<&[SigRef]> {
        self.local_types.as_deref()
    }

    pub fn is_concretized(&self) -> bool {
        self.concretized
    }

    pub fn has_this(&self) -> bool {
        self.def_sig.has_this()
    }

    pub fn is_virtual(&self) -> bool {
        self.def_attr.is_virtual()
    }
}

fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    (!items.is_empty()).then(|| items.to_vec())
}

impl fmt::Display for MethodInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.decl_type, self.def_name)?;
        if !self.gen_args.is_empty() {
            write!(f, "<{}>", self.gen_args.len())?;
        }
        Ok(())
    }
}
