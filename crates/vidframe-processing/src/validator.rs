use std::path::Path;
use vidframe_core::AppError;
use vidframe_storage::keys::base_name;

/// Upload validation errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Synchronous admission checks for uploaded videos. Nothing here touches
/// storage, so a rejection has no side effects.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl UploadValidator {
    pub fn new(max_file_size: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Reduce a client supplied name to its base name. Names that reduce to
    /// nothing (or to `.`/`..`) are rejected.
    pub fn sanitize_filename(&self, filename: &str) -> Result<String, ValidationError> {
        let name = base_name(filename.trim()).trim();
        if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        Ok(name.to_string())
    }

    /// Extension check, case-insensitive
    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(())
    }

    /// Validate an upload and return the sanitized filename to store it under
    pub fn validate(&self, filename: &str, size: usize) -> Result<String, ValidationError> {
        self.validate_file_size(size)?;
        let name = self.sanitize_filename(filename)?;
        self.validate_extension(&name)?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> UploadValidator {
        UploadValidator::new(
            500 * 1024 * 1024,
            vec!["mp4", "avi", "mov", "mkv", "webm"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }

    #[test]
    fn accepts_allowed_extension_any_case() {
        assert_eq!(validator().validate("clip.mp4", 1024).unwrap(), "clip.mp4");
        assert_eq!(validator().validate("CLIP.MOV", 1024).unwrap(), "CLIP.MOV");
    }

    #[test]
    fn rejects_disallowed_extension() {
        let err = validator().validate("notes.txt", 1024).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExtension { ref extension, .. } if extension == "txt"));
        assert!(validator().validate("noextension", 1024).is_err());
    }

    #[test]
    fn size_limits() {
        let v = validator();
        assert_eq!(v.validate("clip.mp4", 0), Err(ValidationError::EmptyFile));
        assert!(v.validate("clip.mp4", 500 * 1024 * 1024).is_ok());
        assert!(matches!(
            v.validate("clip.mp4", 500 * 1024 * 1024 + 1),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn filename_reduced_to_base_name() {
        let v = validator();
        assert_eq!(v.validate("../../etc/clip.mp4", 10).unwrap(), "clip.mp4");
        assert_eq!(v.validate("C:\\Users\\me\\clip.webm", 10).unwrap(), "clip.webm");
        assert!(matches!(
            v.validate("videos/", 10),
            Err(ValidationError::InvalidFilename(_))
        ));
        assert!(v.validate("..", 10).is_err());
    }

    #[test]
    fn extensions_normalized_from_config() {
        let v = UploadValidator::new(10, vec![" .MP4 ".to_string(), String::new()]);
        assert!(v.validate("a.mp4", 1).is_ok());
        assert!(v.validate("a.mkv", 1).is_err());
    }

    #[test]
    fn app_error_mapping() {
        let too_large: AppError = ValidationError::FileTooLarge { size: 2, max: 1 }.into();
        assert!(matches!(too_large, AppError::InvalidInput(_)));
        let empty: AppError = ValidationError::EmptyFile.into();
        assert!(matches!(empty, AppError::InvalidInput(_)));
    }
}
