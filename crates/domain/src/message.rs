//! # 入力メッセージ
//!
//! 呼び出し元が組み立てて送信パイプラインに渡すメッセージを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`SimpleMessage`] | シンプルメール | プレーンテキスト本文のみ |
//! | [`RichMessage`] | リッチメール | HTML 本文と添付ファイル（ファイルパス指定） |
//! | [`UploadedFile`] | アップロードファイル | 呼び出し元から受け取ったバイナリ添付 |
//!
//! ## 設計方針
//!
//! - **宣言的バリデーション**: `validator` の derive で制約を宣言し、送信前に一括検証する
//! - **送信前に失敗**: 検証に失敗したメッセージはトランスポートに一切触れない

use std::{
    borrow::Cow,
    path::Path,
    sync::LazyLock,
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::DomainError;

/// 宛先メールアドレスの形式
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_\-\.])+@([A-Za-z0-9_\-\.])+\.([A-Za-z]{2,4})$")
        .expect("宛先メールアドレスの正規表現が不正です")
});

/// 空白のみの文字列を拒否する
fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::Borrowed("必須項目です"));
        return Err(error);
    }
    Ok(())
}

/// シンプルメール
///
/// プレーンテキスト本文のみを持つ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SimpleMessage {
    /// 宛先メールアドレス
    #[validate(
        custom(function = "validate_not_blank"),
        regex(path = *EMAIL_PATTERN, message = "宛先メールアドレスの形式が不正です")
    )]
    pub to:        String,
    /// CC（任意）
    #[serde(default)]
    pub cc:        Vec<String>,
    /// 送信日時（未指定の場合は送信時点の時刻）
    #[serde(default)]
    pub sent_date: Option<DateTime<Utc>>,
    /// 件名
    #[validate(custom(function = "validate_not_blank"))]
    pub subject:   String,
    /// 本文（プレーンテキスト）
    #[validate(custom(function = "validate_not_blank"))]
    pub text:      String,
}

impl SimpleMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to:        to.into(),
            cc:        Vec::new(),
            sent_date: None,
            subject:   subject.into(),
            text:      text.into(),
        }
    }

    pub fn with_cc(mut self, cc: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cc = cc.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sent_date(mut self, sent_date: DateTime<Utc>) -> Self {
        self.sent_date = Some(sent_date);
        self
    }

    /// 送信前検証を行う
    ///
    /// # エラー
    ///
    /// 制約違反がある場合は `DomainError::Validation` を返す。
    pub fn validate_message(&self) -> Result<(), DomainError> {
        self.validate().map_err(DomainError::from_validation)
    }
}

/// リッチメール
///
/// HTML 本文を持ち、ファイルパスで指定したファイルを添付できる。
/// アップロードファイルは [`UploadedFile`] として別途渡す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RichMessage {
    /// 宛先メールアドレス
    #[validate(
        custom(function = "validate_not_blank"),
        regex(path = *EMAIL_PATTERN, message = "宛先メールアドレスの形式が不正です")
    )]
    pub to:        String,
    /// CC（任意）
    #[serde(default)]
    pub cc:        Vec<String>,
    /// 送信日時（未指定の場合は送信時点の時刻）
    #[serde(default)]
    pub sent_date: Option<DateTime<Utc>>,
    /// 件名
    #[validate(custom(function = "validate_not_blank"))]
    pub subject:   String,
    /// 本文（HTML 可）
    #[validate(custom(function = "validate_not_blank"))]
    pub text:      String,
    /// 添付ファイルのパス（任意）
    #[serde(default)]
    pub filepath:  Option<String>,
}

impl RichMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to:        to.into(),
            cc:        Vec::new(),
            sent_date: None,
            subject:   subject.into(),
            text:      text.into(),
            filepath:  None,
        }
    }

    pub fn with_cc(mut self, cc: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cc = cc.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sent_date(mut self, sent_date: DateTime<Utc>) -> Self {
        self.sent_date = Some(sent_date);
        self
    }

    pub fn with_filepath(mut self, filepath: impl Into<String>) -> Self {
        self.filepath = Some(filepath.into());
        self
    }

    /// 添付ファイルのパスを返す（空白のみのパスは未指定として扱う）
    pub fn attachment_path(&self) -> Option<&Path> {
        self.filepath
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(Path::new)
    }

    /// 送信前検証を行う
    ///
    /// # エラー
    ///
    /// 制約違反がある場合は `DomainError::Validation` を返す。
    pub fn validate_message(&self) -> Result<(), DomainError> {
        self.validate().map_err(DomainError::from_validation)
    }
}

/// アップロードファイル
///
/// 呼び出し元が受け取ったバイナリをそのまま添付するためのコンテナ。
/// 空のファイルは添付しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// 元のファイル名（拡張子を含む）
    pub filename:     Option<String>,
    /// 宣言された Content-Type
    pub content_type: Option<String>,
    /// ファイル内容
    pub content:      Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename:     Some(filename.into()),
            content_type: None,
            content:      content.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// 内容が空かどうか
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// 添付前検証を行う
    ///
    /// 空でないファイルにはファイル名が必須。
    ///
    /// # エラー
    ///
    /// ファイル名がない場合は `DomainError::Validation` を返す。
    pub fn validate_upload(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Ok(());
        }
        match self.filename.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => Err(DomainError::Validation(
                "添付ファイル名（拡張子を含む）は必須です".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn valid_simple() -> SimpleMessage {
        SimpleMessage::new("user@example.com", "件名", "本文")
    }

    #[rstest]
    #[case("user@example.com")]
    #[case("first.last@mail.example.jp")]
    #[case("a_b-c@sub-domain.co")]
    fn test_正しい宛先は検証を通過する(#[case] to: &str) {
        let message = SimpleMessage { to: to.to_string(), ..valid_simple() };
        assert!(message.validate_message().is_ok());
    }

    #[rstest]
    #[case("", "空文字列")]
    #[case("not-an-email", "@記号なし")]
    #[case("user@example", "トップレベルドメインなし")]
    #[case("user@example.technology", "トップレベルドメインが長すぎる")]
    #[case("user name@example.com", "空白を含む")]
    fn test_不正な宛先を拒否する(#[case] to: &str, #[case] _reason: &str) {
        let message = SimpleMessage { to: to.to_string(), ..valid_simple() };
        assert!(matches!(
            message.validate_message(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_宛先エラーのメッセージにフィールド名が含まれる() {
        let message = SimpleMessage { to: "not-an-email".to_string(), ..valid_simple() };
        let DomainError::Validation(detail) = message.validate_message().unwrap_err();
        assert_eq!(detail, "to: 宛先メールアドレスの形式が不正です");
    }

    #[rstest]
    #[case("", "本文")]
    #[case("   ", "本文")]
    #[case("件名", "")]
    #[case("件名", "\n\t")]
    fn test_件名と本文は空白のみを拒否する(#[case] subject: &str, #[case] text: &str) {
        let message = SimpleMessage::new("user@example.com", subject, text);
        assert!(message.validate_message().is_err());
    }

    #[test]
    fn test_ccは検証対象外() {
        let message = valid_simple().with_cc(["anything"]);
        assert!(message.validate_message().is_ok());
    }

    #[test]
    fn test_リッチメールも宛先を検証する() {
        let message = RichMessage::new("not-an-email", "件名", "<p>本文</p>");
        assert!(message.validate_message().is_err());

        let message = RichMessage::new("user@example.com", "件名", "<p>本文</p>");
        assert!(message.validate_message().is_ok());
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), None)]
    #[case(Some("  "), None)]
    #[case(Some("/tmp/b.png"), Some("/tmp/b.png"))]
    fn test_attachment_pathは空白のパスを無視する(
        #[case] filepath: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let mut message = RichMessage::new("user@example.com", "件名", "本文");
        message.filepath = filepath.map(str::to_string);

        assert_eq!(message.attachment_path(), expected.map(Path::new));
    }

    #[test]
    fn test_空でないアップロードファイルはファイル名が必須() {
        let named = UploadedFile::new("a.png", vec![1_u8, 2, 3]);
        assert!(named.validate_upload().is_ok());

        let unnamed = UploadedFile { filename: None, ..named.clone() };
        assert!(unnamed.validate_upload().is_err());

        let blank = UploadedFile { filename: Some(" ".to_string()), ..named };
        assert!(blank.validate_upload().is_err());
    }

    #[test]
    fn test_空のアップロードファイルはファイル名なしでも通過する() {
        let empty = UploadedFile {
            filename:     None,
            content_type: None,
            content:      Bytes::new(),
        };
        assert!(empty.is_empty());
        assert!(empty.validate_upload().is_ok());
    }

    #[test]
    fn test_送信日時はデシリアライズ時に省略できる() {
        let message: SimpleMessage = serde_json::from_str(
            r#"{"to":"user@example.com","subject":"件名","text":"本文"}"#,
        )
        .unwrap();

        assert_eq!(message.sent_date, None);
        assert!(message.cc.is_empty());
    }
}
