//! # Mailroute ドメイン層
//!
//! 複数の送信トランスポートを切り替えてメールを送るためのドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **値オブジェクト**: メッセージ・トランスポート設定は生成後に変更しない
//! - **送信前検証**: 入力メッセージは `validator` で検証し、不正な値でトランスポートに触れない
//! - **ライブラリ非依存**: 送信プロトコル（lettre 等）の型はドメイン層に持ち込まない
//!
//! ## モジュール構成
//!
//! - [`message`] - 呼び出し元が組み立てる入力メッセージ（シンプル / リッチ）
//! - [`outbound`] - トランスポートに渡す送信用メッセージとそのビルダー
//! - [`transport`] - テンプレート名・トランスポート設定・送信エラー
//! - [`clock`] - 送信日時の既定値に使う時刻プロバイダ
//! - [`error`] - ドメイン層エラー

pub mod clock;
pub mod error;
pub mod message;
pub mod outbound;
pub mod transport;

pub use error::DomainError;
