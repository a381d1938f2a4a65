//! インスタンス化モジュール
//!
//! 具体化された型・メソッド・フィールドのレコードと、それらをキーで重複排除する
//! インスタンス化テーブルを提供する。

mod field_inst;
mod method_inst;
mod table;
mod type_inst;

pub use field_inst::FieldInst;
pub use method_inst::MethodInst;
pub use table::InstantiationTable;
pub use type_inst::TypeInst;

/// テーブル内の型インスタンスのID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeInstId(pub usize);

/// テーブル内のメソッドインスタンスのID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodInstId(pub usize);

/// テーブル内のフィールドインスタンスのID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldInstId(pub usize);
