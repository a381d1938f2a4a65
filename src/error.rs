//! 統一的なエラーハンドリングモジュール
//!
//! このモジュールは、シグネチャ置換・キー生成・インスタンス化の全体で使用される
//! 統一的なエラー型を提供します。ここで定義されるエラーはすべて致命的なもので、
//! 呼び出し元で回復されることはなく、コンパイル単位の処理を中断させます。

use crate::signature::ElementType;
use thiserror::Error;

/// ilmonoの統一エラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonoError {
    /// シグネチャの置換・描画エラー
    #[error("シグネチャエラー: {0}")]
    Signature(#[from] SignatureError),

    /// インスタンス化レコードのエラー
    #[error("インスタンス化エラー: {0}")]
    Instantiation(#[from] InstantiationError),

    /// メタデータ読み込みエラー
    #[error("メタデータエラー: {0}")]
    Metadata(#[from] MetadataError),

    /// ファイルI/Oエラー
    #[error("ファイル操作エラー: {0}")]
    Io(String),

    /// その他のエラー
    #[error("{0}")]
    Other(String),
}

/// シグネチャ処理エラーの詳細
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignatureError {
    #[error("未対応の要素型: {element:?}")]
    UnsupportedElement { element: ElementType },

    #[error("ランク0の配列シグネチャは不正です")]
    ZeroRankArray,

    #[error("型引数リストにメソッドジェネリック引数 !!{number} が含まれています")]
    MethodVarInTypeArgs { number: u32 },

    #[error("ジェネリック引数 {param} が範囲外です: 引数は{count}個しかありません")]
    GenericArgOutOfRange { param: String, count: usize },
}

/// インスタンス化レコードのエラーの詳細
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstantiationError {
    #[error("メソッド {method} のHasThisフラグとstatic属性が一致しません")]
    ReceiverMismatch { method: String },

    #[error("メソッド {method} は型 {ty} に属していません")]
    DeclaringTypeMismatch { method: String, ty: String },

    #[error("{name} のジェネリック引数の数が一致しません: {expected}個を期待しましたが、{found}個が見つかりました")]
    GenericArgCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("メソッド {method} はまだ具体化されていません")]
    NotConcretized { method: String },

    #[error("メソッド {method} は既に具体化されています")]
    AlreadyConcretized { method: String },
}

/// メタデータ読み込みエラーの詳細
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("未定義の型: {name}")]
    UnknownType { name: String },

    #[error("型 {name} が重複して定義されています")]
    DuplicateType { name: String },

    #[error("メソッド {method} が型 {ty} に見つかりません")]
    UnknownMethod { ty: String, method: String },

    #[error("メソッド {method} は型 {ty} に複数定義されています")]
    AmbiguousMethod { ty: String, method: String },

    #[error("フィールド {field} が型 {ty} に見つかりません")]
    UnknownField { ty: String, field: String },

    #[error("型ジェネリック引数 !{number} の所有者が指定されていません")]
    TypeVarWithoutOwner { number: u32 },

    #[error("メソッド外でメソッドジェネリック引数 !!{number} が使われています")]
    MethodVarOutsideMethod { number: u32 },

    #[error("スナップショットの構文エラー ({line}:{column}): {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },
}

/// Result型のエイリアス
pub type MonoResult<T> = Result<T, MonoError>;

impl From<std::io::Error> for MonoError {
    fn from(e: std::io::Error) -> Self {
        MonoError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for MonoError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            return MonoError::Io(e.to_string());
        }
        MonoError::Metadata(MetadataError::Syntax {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        })
    }
}
