//! 具体化されたフィールド

use std::sync::Arc;

use super::TypeInst;
use crate::error::MonoResult;
use crate::metadata::FieldDef;
use crate::signature::{field_name_key, substitute, SigRef};

#[derive(Debug)]
pub struct FieldInst {
    decl_type: Arc<TypeInst>,
    name: String,
    field_type: SigRef,
    is_static: bool,
    name_key: String,
}

impl FieldInst {
    /// 所属する型の型引数でフィールドの型を置換し、キーを計算する
    pub fn new(decl_type: Arc<TypeInst>, def: &FieldDef) -> MonoResult<Self> {
        let field_type = substitute(&def.field_type, Some(&decl_type.replacer()))?;
        let name_key = field_name_key(&def.name, &field_type)?;
        Ok(Self {
            decl_type,
            name: def.name.clone(),
            field_type,
            is_static: def.is_static,
            name_key,
        })
    }

    pub fn decl_type(&self) -> &Arc<TypeInst> {
        &self.decl_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &SigRef {
        &self.field_type
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn name_key(&self) -> &str {
        &self.name_key
    }
}
