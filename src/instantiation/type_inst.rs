//! 具体化された型

use std::fmt;
use std::sync::OnceLock;

use crate::error::{InstantiationError, MonoResult};
use crate::metadata::{TypeDef, TypeDefId};
use crate::signature::{is_fully_concrete_list, type_name_key, GenericReplacer, SigRef, TypeSig};

/// 型定義と型引数の組
#[derive(Debug)]
pub struct TypeInst {
    def: TypeDefId,
    name: String,
    /// 型引数を付けない型定義のシグネチャ
    def_sig: SigRef,
    gen_args: Vec<SigRef>,
    name_key: OnceLock<String>,
}

impl TypeInst {
    pub fn new(def: &TypeDef, gen_args: Vec<SigRef>) -> MonoResult<Self> {
        if gen_args.len() != def.gen_param_count as usize {
            return Err(InstantiationError::GenericArgCountMismatch {
                name: def.full_name(),
                expected: def.gen_param_count as usize,
                found: gen_args.len(),
            }
            .into());
        }
        Ok(Self {
            def: def.id,
            name: def.full_name(),
            def_sig: def.sig(),
            gen_args,
            name_key: OnceLock::new(),
        })
    }

    pub fn def(&self) -> TypeDefId {
        self.def
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gen_args(&self) -> &[SigRef] {
        &self.gen_args
    }

    pub fn is_value_type(&self) -> bool {
        self.def_sig.is_value_type()
    }

    /// 型引数に未解決の型ジェネリック引数が含まれないかどうか
    pub fn is_fully_concrete(&self) -> MonoResult<bool> {
        is_fully_concrete_list(Some(&self.gen_args))
    }

    /// この型インスタンスを指すシグネチャ
    pub fn sig(&self) -> SigRef {
        if self.gen_args.is_empty() {
            self.def_sig.clone()
        } else {
            TypeSig::generic_inst(self.def_sig.clone(), self.gen_args.clone())
        }
    }

    /// 型定義と型引数のみの置換コンテキスト
    pub fn replacer(&self) -> GenericReplacer<'_> {
        GenericReplacer::type_def(self.def, &self.gen_args)
    }

    /// 型のキー（初回のみ計算）
    pub fn name_key(&self) -> MonoResult<&str> {
        if let Some(key) = self.name_key.get() {
            return Ok(key);
        }
        let key = type_name_key(&self.name, &self.gen_args)?;
        Ok(self.name_key.get_or_init(|| key))
    }
}

/// 型定義名と型引数の個数。キーの計算状態には依存しない
impl fmt::Display for TypeInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.gen_args.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}<{}>", self.name, self.gen_args.len())
        }
    }
}
