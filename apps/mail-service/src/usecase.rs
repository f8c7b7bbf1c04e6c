//! # ユースケース層
//!
//! テンプレートの選択とメール送信を実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: レジストリ・ワーカープール・時刻は外部から注入する
//! - **明示的なコンテキスト**: 選択中のトランスポートは [`MailContext`](crate::context::MailContext)
//!   で受け渡す
//!
//! ## モジュール構成
//!
//! - `selector`: マーカーに従ったトランスポートの選択
//! - `dispatch`: 検証・構築・ワーカープールでの送信

pub mod dispatch;
pub mod selector;

pub use dispatch::MailDispatcher;
pub use selector::{TemplateMarker, TemplateSelector};
