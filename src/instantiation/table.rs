//! インスタンス化テーブル
//!
//! 具体化されたレコードをキーで重複排除して保持する。同一性の判定は
//! シグネチャの構造ではなく、常にキーの一致で行う。

use std::sync::Arc;

use indexmap::IndexMap;

use super::{FieldInst, FieldInstId, MethodInst, MethodInstId, TypeInst, TypeInstId};
use crate::error::{MetadataError, MonoResult};
use crate::metadata::{Metadata, MethodDefId, TypeDefId};
use crate::signature::{needs_substitution, SigRef};

#[derive(Debug, Default)]
pub struct InstantiationTable {
    /// 型のキー -> 型インスタンス
    types: IndexMap<String, Arc<TypeInst>>,
    /// (所属する型, 具体化後のキー) -> メソッドインスタンス
    methods: IndexMap<(TypeInstId, String), MethodInst>,
    /// (所属する型, フィールドのキー) -> フィールドインスタンス
    fields: IndexMap<(TypeInstId, String), FieldInst>,
}

impl InstantiationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 型インスタンスを取得または追加
    ///
    /// 型引数に未解決の型ジェネリック引数が残っている場合はまだ具体化できないため
    /// `None` を返す。
    pub fn resolve_type(
        &mut self,
        metadata: &Metadata,
        def: TypeDefId,
        gen_args: Vec<SigRef>,
    ) -> MonoResult<Option<TypeInstId>> {
        let inst = TypeInst::new(metadata.type_def(def), gen_args)?;
        if !inst.is_fully_concrete()? {
            log::debug!("型引数が具体的でないためスキップしました: {}", inst.name());
            return Ok(None);
        }

        let key = inst.name_key()?.to_string();
        if let Some(index) = self.types.get_index_of(&key) {
            return Ok(Some(TypeInstId(index)));
        }
        log::debug!("型インスタンスを追加しました: {}", key);
        let (index, _) = self.types.insert_full(key, Arc::new(inst));
        Ok(Some(TypeInstId(index)))
    }

    /// メソッドインスタンスを取得または追加
    ///
    /// レコードは生成直後に具体化され、具体化後のキーでテーブルに登録される。
    /// メソッドのジェネリック引数に型・メソッドいずれかのジェネリック引数が
    /// 残っている場合は、型の場合と同様に `None` を返す。
    pub fn resolve_method(
        &mut self,
        metadata: &Metadata,
        ty: TypeInstId,
        def: MethodDefId,
        gen_args: Vec<SigRef>,
    ) -> MonoResult<Option<MethodInstId>> {
        let decl_type = Arc::clone(self.type_inst(ty));
        let method_def = metadata.method_def(def);
        if gen_args.iter().any(|arg| needs_substitution(arg)) {
            log::debug!(
                "メソッド引数が具体的でないためスキップしました: {}::{}",
                decl_type,
                method_def.name
            );
            return Ok(None);
        }

        let mut inst = MethodInst::new(decl_type, method_def, gen_args)?;
        inst.concretize()?;

        let key = (ty, inst.concretized_key()?);
        if let Some(index) = self.methods.get_index_of(&key) {
            return Ok(Some(MethodInstId(index)));
        }
        let declared_key = inst.declared_key()?;
        log::debug!("メソッドインスタンスを追加しました: {} ({})", declared_key, key.1);
        let (index, _) = self.methods.insert_full(key, inst);
        Ok(Some(MethodInstId(index)))
    }

    /// フィールドインスタンスを取得または追加
    pub fn resolve_field(
        &mut self,
        metadata: &Metadata,
        ty: TypeInstId,
        index: usize,
    ) -> MonoResult<FieldInstId> {
        let decl_type = Arc::clone(self.type_inst(ty));
        let type_def = metadata.type_def(decl_type.def());
        let def = type_def
            .fields
            .get(index)
            .ok_or_else(|| MetadataError::UnknownField {
                ty: type_def.full_name(),
                field: format!("#{}", index),
            })?;
        let inst = FieldInst::new(decl_type, def)?;

        let key = (ty, inst.name_key().to_string());
        if let Some(index) = self.fields.get_index_of(&key) {
            return Ok(FieldInstId(index));
        }
        let (index, _) = self.fields.insert_full(key, inst);
        Ok(FieldInstId(index))
    }

    /// 仮想呼び出しの実装を登録
    pub fn add_override_impl(&mut self, target: MethodInstId, impl_id: MethodInstId) -> bool {
        self.method_mut(target).add_override_impl(impl_id)
    }

    /// 未処理かつスキップ指定されていないメソッド
    pub fn pending_methods(&self) -> Vec<MethodInstId> {
        self.methods
            .values()
            .enumerate()
            .filter(|(_, inst)| !inst.is_processed && !inst.is_skip_processing)
            .map(|(index, _)| MethodInstId(index))
            .collect()
    }

    pub fn type_inst(&self, id: TypeInstId) -> &Arc<TypeInst> {
        &self.types[id.0]
    }

    pub fn method(&self, id: MethodInstId) -> &MethodInst {
        &self.methods[id.0]
    }

    pub fn method_mut(&mut self, id: MethodInstId) -> &mut MethodInst {
        &mut self.methods[id.0]
    }

    pub fn field(&self, id: FieldInstId) -> &FieldInst {
        &self.fields[id.0]
    }

    pub fn types(&self) -> impl Iterator<Item = (TypeInstId, &Arc<TypeInst>)> {
        self.types
            .values()
            .enumerate()
            .map(|(index, inst)| (TypeInstId(index), inst))
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodInstId, &MethodInst)> {
        self.methods
            .values()
            .enumerate()
            .map(|(index, inst)| (MethodInstId(index), inst))
    }

    pub fn fields(&self) -> impl Iterator<Item = (FieldInstId, &FieldInst)> {
        self.fields
            .values()
            .enumerate()
            .map(|(index, inst)| (FieldInstId(index), inst))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}
