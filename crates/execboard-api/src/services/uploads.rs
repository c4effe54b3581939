//! Resume upload validation.
//!
//! A file is accepted only when its extension, declared MIME type and leading
//! bytes all agree. Validation runs before anything is written to storage.

use crate::error::ApiError;

/// Maximum resume size in bytes.
pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Accepted resume formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    Pdf,
    Doc,
    Docx,
}

impl ResumeFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Doc => "DOC",
            Self::Docx => "DOCX",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Doc => "application/msword",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }
    }

    fn magic(&self) -> &'static [u8] {
        match self {
            Self::Pdf => PDF_MAGIC,
            Self::Doc => OLE2_MAGIC,
            Self::Docx => ZIP_MAGIC,
        }
    }

    fn accepts_mime(&self, mime: &str) -> bool {
        let mime = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        mime == self.content_type()
            || (*self == Self::Pdf && mime == "application/x-pdf")
    }
}

/// Validate an uploaded resume and return its format.
pub fn validate_resume(
    file_name: &str,
    declared_mime: Option<&str>,
    data: &[u8],
) -> Result<ResumeFormat, ApiError> {
    let format = file_name
        .rsplit_once('.')
        .and_then(|(_, ext)| ResumeFormat::from_extension(ext))
        .ok_or_else(|| ApiError::field("file", "Only PDF, DOC and DOCX files are accepted"))?;

    if data.is_empty() {
        return Err(ApiError::field("file", "File is empty"));
    }
    if data.len() > MAX_RESUME_BYTES {
        return Err(ApiError::field("file", "File exceeds the 5 MB limit"));
    }

    if let Some(mime) = declared_mime.filter(|m| !m.trim().is_empty()) {
        if !format.accepts_mime(mime) {
            return Err(ApiError::field(
                "file",
                format!("Declared content type does not match .{} file", format.extension()),
            ));
        }
    }

    if !data.starts_with(format.magic()) {
        return Err(ApiError::field(
            "file",
            format!("Invalid file content for {}", format.label()),
        ));
    }

    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: ApiError) -> String {
        err.to_string()
    }

    #[test]
    fn test_accepts_matching_pdf() {
        let data = b"%PDF-1.7\n...";
        assert_eq!(
            validate_resume("cv.PDF", Some("application/pdf"), data).unwrap(),
            ResumeFormat::Pdf
        );
    }

    #[test]
    fn test_pdf_with_wrong_magic() {
        let err = validate_resume("cv.pdf", Some("application/pdf"), b"MZ\x90\x00").unwrap_err();
        assert_eq!(message(err), "Invalid file content for PDF");
    }

    #[test]
    fn test_docx_must_be_zip() {
        let ok = validate_resume("cv.docx", None, b"PK\x03\x04rest").unwrap();
        assert_eq!(ok, ResumeFormat::Docx);
        let err = validate_resume("cv.docx", None, b"%PDF-1.4").unwrap_err();
        assert_eq!(message(err), "Invalid file content for DOCX");
    }

    #[test]
    fn test_doc_is_ole2() {
        let mut data = OLE2_MAGIC.to_vec();
        data.extend_from_slice(b"body");
        assert_eq!(
            validate_resume("cv.doc", Some("application/msword"), &data).unwrap(),
            ResumeFormat::Doc
        );
        let err = validate_resume("cv.doc", None, b"PK\x03\x04").unwrap_err();
        assert_eq!(message(err), "Invalid file content for DOC");
    }

    #[test]
    fn test_rejects_other_extensions_and_mime_mismatch() {
        assert!(validate_resume("cv.exe", None, b"MZ").is_err());
        assert!(validate_resume("noextension", None, b"%PDF-").is_err());
        let err = validate_resume("cv.pdf", Some("image/png"), b"%PDF-1.4").unwrap_err();
        assert!(message(err).contains("does not match"));
    }

    #[test]
    fn test_size_limits() {
        assert!(validate_resume("cv.pdf", None, b"").is_err());
        let mut big = PDF_MAGIC.to_vec();
        big.resize(MAX_RESUME_BYTES + 1, b'x');
        assert!(validate_resume("cv.pdf", None, &big).is_err());
    }
}
