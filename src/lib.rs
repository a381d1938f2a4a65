//! ilmono Library
//!
//! CILからネイティブコードへの変換器のうち、ジェネリックシグネチャの置換と
//! インスタンスを識別する正規キーの生成を担うライブラリ。

pub mod error;
pub mod instantiation;
pub mod metadata;
pub mod signature;

// Re-export commonly used types
pub use error::{MonoError, MonoResult};
pub use instantiation::{InstantiationTable, MethodInst, TypeInst};
pub use metadata::Metadata;
pub use signature::{GenericReplacer, SigRef, TypeSig};
