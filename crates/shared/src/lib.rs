//! # Mailroute 共有ユーティリティ
//!
//! 各クレートから共通で使うログ関連のユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - 他のすべてのクレート（domain を除く）から依存される
//! - ビジネスロジックを含まない純粋なユーティリティのみを配置
//! - トレーシング初期化は `observability` feature の有効時のみ公開する

pub mod event_log;
pub mod observability;
