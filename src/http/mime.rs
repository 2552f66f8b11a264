//! MIME type resolution by file extension.

use std::path::Path;

/// Content type for `path`, `application/octet-stream` when unknown.
pub fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
