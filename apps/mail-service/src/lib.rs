//! # Mail Service ライブラリ
//!
//! 複数のトランスポートを使い分けるメール送信のユースケースを公開する。
//! 統合テスト用に内部モジュールへのアクセスを提供する。

pub mod config;
pub mod context;
pub mod error;
pub mod usecase;

pub use context::MailContext;
pub use error::DispatchError;
