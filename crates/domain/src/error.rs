//! # ドメイン層エラー定義
//!
//! メッセージの検証失敗など、送信処理に入る前に検出できる異常を表現する。
//!
//! ## 設計方針
//!
//! - **thiserror 活用**: `#[error(...)]` マクロでエラーメッセージを自動生成
//! - **送信前に確定**: このエラーを返した場合、トランスポートには一切触れていない

use thiserror::Error;
use validator::ValidationErrors;

/// ドメイン層で発生するエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 入力メッセージが制約に違反している場合に使用する。
    ///
    /// # 例
    ///
    /// - 宛先メールアドレスの形式不正
    /// - 件名・本文の未入力
    /// - ファイル名のないアップロードファイル
    #[error("バリデーションエラー: {0}")]
    Validation(String),
}

impl DomainError {
    /// `validator` の検証結果をドメインエラーに変換する
    ///
    /// フィールド名順に `field: message` を `, ` で連結する。
    /// メッセージ未設定の制約はエラーコードを使用する。
    pub fn from_validation(errors: ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter()
                    .map(|e| {
                        let reason = e.message.as_deref().unwrap_or(e.code.as_ref());
                        format!("{field}: {reason}")
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        details.sort();

        Self::Validation(details.join(", "))
    }
}
