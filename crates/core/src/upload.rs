//! Client-side validation for outgoing messages and file uploads.
//!
//! Everything here runs before a network call is made.

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Largest accepted attachment or assignment file (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum length of a chat message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 5_000;

/// MIME types accepted for chat attachments and assignment submissions.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/zip",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "text/plain",
];

/* --------------------------------------------------------------------------
File picked by the user
-------------------------------------------------------------------------- */

/// A file selected for upload. Borrowed, never consumed, by upload calls
/// so a failed attempt can be retried without re-selecting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/* --------------------------------------------------------------------------
Validation functions
-------------------------------------------------------------------------- */

/// Validate name, type, and size of a file before uploading it.
pub fn validate_upload(file: &UploadFile) -> Result<(), CoreError> {
    if file.name.trim().is_empty() {
        return Err(CoreError::Validation("File name must not be empty".into()));
    }

    if !ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str()) {
        return Err(CoreError::Validation(format!(
            "Unsupported file type '{}'. Must be one of: {}",
            file.mime_type,
            ALLOWED_MIME_TYPES.join(", ")
        )));
    }

    if file.size() == 0 {
        return Err(CoreError::Validation(format!(
            "File '{}' is empty",
            file.name
        )));
    }

    if file.size() > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "File '{}' is {} bytes; the limit is {MAX_UPLOAD_BYTES}",
            file.name,
            file.size()
        )));
    }

    Ok(())
}

/// Validate chat text, returning it trimmed.
pub fn validate_message_text(text: &str) -> Result<&str, CoreError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Message must not be empty".into()));
    }
    let length = trimmed.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Message is {length} characters; the limit is {MAX_MESSAGE_LENGTH}"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn pdf(size: usize) -> UploadFile {
        UploadFile::new("report.pdf", "application/pdf", vec![0u8; size])
    }

    #[test]
    fn accepts_small_pdf() {
        assert!(validate_upload(&pdf(1024)).is_ok());
    }

    #[test]
    fn rejects_unknown_mime_type() {
        let file = UploadFile::new("run.exe", "application/x-msdownload", vec![1]);
        assert_matches!(validate_upload(&file), Err(CoreError::Validation(msg)) if msg.contains("Unsupported"));
    }

    #[test]
    fn rejects_oversized_file() {
        let file = pdf(MAX_UPLOAD_BYTES as usize + 1);
        assert_matches!(validate_upload(&file), Err(CoreError::Validation(msg)) if msg.contains("limit"));
    }

    #[test]
    fn accepts_file_at_exact_limit() {
        assert!(validate_upload(&pdf(MAX_UPLOAD_BYTES as usize)).is_ok());
    }

    #[test]
    fn rejects_empty_file_and_blank_name() {
        assert!(validate_upload(&pdf(0)).is_err());
        let unnamed = UploadFile::new("  ", "image/png", vec![1]);
        assert!(validate_upload(&unnamed).is_err());
    }

    #[test]
    fn message_text_is_trimmed() {
        assert_eq!(validate_message_text("  hello \n"), Ok("hello"));
    }

    #[test]
    fn blank_message_is_rejected() {
        assert_matches!(validate_message_text("   "), Err(CoreError::Validation(_)));
    }

    #[test]
    fn overlong_message_is_rejected() {
        let text = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(validate_message_text(&text).is_err());
        assert!(validate_message_text(&"x".repeat(MAX_MESSAGE_LENGTH)).is_ok());
    }
}
