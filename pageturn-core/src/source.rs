//! Document source resolution
//!
//! Turns raw inputs into [`Document`] descriptors. Identity never depends on
//! the requested page: `https://host/a.pdf#page=3` and `https://host/a.pdf`
//! resolve to the same [`DocumentId`].

use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::document::{Document, DocumentId, Locator};
use crate::error::ViewerError;

const ACCEPTED_SCHEMES: [&str; 4] = ["http", "https", "blob", "file"];
const PDF_SIGNATURE: &[u8] = b"%PDF-";
/// Engines tolerate leading garbage before the header; so do we.
const SIGNATURE_SEARCH_WINDOW: usize = 1024;

/// Raw input handed to the viewer.
#[derive(Clone)]
pub enum DocumentSource {
    /// Remote locator, optionally carrying a `#page=N` fragment.
    Locator(String),
    /// Local byte blob with the file name it came from.
    Bytes { file_name: String, data: Vec<u8> },
}

impl DocumentSource {
    /// Short human-readable form for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Locator(url) => url.clone(),
            Self::Bytes { file_name, data } => format!("{file_name} ({} bytes)", data.len()),
        }
    }
}

impl std::fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Build the descriptor for `source`, which sits at `index` in its batch.
pub fn resolve<H>(source: DocumentSource, index: usize) -> Result<Document<H>, ViewerError> {
    match source {
        DocumentSource::Locator(raw) => {
            let trimmed = raw.trim();
            let base = strip_fragment(trimmed);
            validate_locator(base).map_err(|reason| ViewerError::source_invalid(trimmed, reason))?;

            let initial_page = page_from_fragment(trimmed);
            if let Some(page) = initial_page {
                debug!(page, locator = base, "page requested through fragment");
            }

            Ok(Document::new(
                DocumentId::new(base),
                Locator::Remote(base.to_string()),
                display_name_for(trimmed, index),
                initial_page,
            ))
        }
        DocumentSource::Bytes { file_name, data } => {
            let window = &data[..data.len().min(SIGNATURE_SEARCH_WINDOW)];
            if !window.windows(PDF_SIGNATURE.len()).any(|w| w == PDF_SIGNATURE) {
                return Err(ViewerError::source_invalid(
                    file_name,
                    "content is not a PDF document",
                ));
            }

            let id = DocumentId::new(format!("bytes:{:x}", md5::compute(&data)));
            let display_name = match strip_pdf_extension(file_name.trim()) {
                "" => fallback_name(index),
                name => name.to_string(),
            };

            Ok(Document::new(
                id,
                Locator::Bytes {
                    file_name,
                    data: Rc::from(data),
                },
                display_name,
                None,
            ))
        }
    }
}

/// Locator without its `#fragment`.
pub fn strip_fragment(locator: &str) -> &str {
    locator.split('#').next().unwrap_or(locator)
}

/// Page number requested through a `#page=N` fragment, if any.
pub fn page_from_fragment(locator: &str) -> Option<u32> {
    static PAGE: OnceLock<Regex> = OnceLock::new();
    let fragment = locator.split_once('#')?.1;
    let re = PAGE.get_or_init(|| Regex::new(r"(?i)(?:^|[&;])page=(\d+)").expect("static regex"));
    re.captures(fragment)?.get(1)?.as_str().parse().ok()
}

/// `locator` with its fragment replaced by `#page=<page>`.
pub fn with_page_fragment(locator: &str, page: u32) -> String {
    format!("{}#page={page}", strip_fragment(locator))
}

/// Decoded last path segment without a `.pdf` extension, or `Document N`.
pub fn display_name_for(locator: &str, index: usize) -> String {
    last_path_segment(strip_fragment(locator))
        .and_then(|segment| {
            let decoded = urlencoding::decode(segment).ok()?;
            let name = strip_pdf_extension(decoded.trim()).to_string();
            (!name.is_empty()).then_some(name)
        })
        .unwrap_or_else(|| fallback_name(index))
}

/// Split a navigation value carrying several locators separated by `,` or `|`.
pub fn parse_locator_list(raw: &str) -> Vec<String> {
    raw.split([',', '|'])
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .collect()
}

fn fallback_name(index: usize) -> String {
    format!("Document {}", index + 1)
}

fn strip_pdf_extension(name: &str) -> &str {
    let len = name.len();
    if len >= 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".pdf") {
        &name[..len - 4]
    } else {
        name
    }
}

fn split_scheme(locator: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = locator.split_once(':')?;
    let valid = !scheme.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

fn validate_locator(base: &str) -> Result<(), String> {
    if base.is_empty() {
        return Err("locator is empty".into());
    }
    let (scheme, rest) = split_scheme(base).ok_or("locator has no scheme")?;
    let scheme = scheme.to_ascii_lowercase();
    if !ACCEPTED_SCHEMES.contains(&scheme.as_str()) {
        return Err(format!("unsupported scheme `{scheme}`"));
    }

    match scheme.as_str() {
        "blob" if rest.trim().is_empty() => Err("blob locator has no target".into()),
        "blob" => Ok(()),
        "file" => match rest.strip_prefix("//") {
            Some(path) if !path.trim_matches('/').is_empty() => Ok(()),
            _ => Err("file locator has no path".into()),
        },
        _ => {
            let authority = rest
                .strip_prefix("//")
                .ok_or("locator is missing `//`")?
                .split(['/', '?'])
                .next()
                .unwrap_or("");
            if authority.is_empty() {
                Err("locator has no host".into())
            } else {
                Ok(())
            }
        }
    }
}

fn last_path_segment(locator: &str) -> Option<&str> {
    let (scheme, rest) = split_scheme(locator)?;
    if scheme.eq_ignore_ascii_case("blob") {
        return last_path_segment(rest);
    }
    let after_authority = match rest.strip_prefix("//") {
        Some(stripped) => &stripped[stripped.find('/')?..],
        None => rest,
    };
    let path = after_authority.split('?').next().unwrap_or("");
    path.split('/').filter(|segment| !segment.is_empty()).last()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::document::LoadState;

    fn resolve_url(url: &str) -> Result<Document<()>, ViewerError> {
        resolve(DocumentSource::Locator(url.to_string()), 0)
    }

    #[test]
    fn id_ignores_page_fragment() {
        let a = resolve_url("https://example.com/docs/guide.pdf#page=3").unwrap();
        let b = resolve_url("https://example.com/docs/guide.pdf").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.initial_page, Some(3));
        assert_eq!(b.initial_page, None);
        assert_eq!(a.load_state, LoadState::Idle);
    }

    #[test]
    fn display_name_is_decoded_segment() {
        let doc = resolve_url("https://example.com/files/Relat%C3%B3rio%20Anual.pdf#page=2").unwrap();
        assert_eq!(doc.display_name, "Relatório Anual");
    }

    #[test]
    fn display_name_falls_back_to_position() {
        assert_eq!(display_name_for("https://example.com/", 2), "Document 3");
        assert_eq!(display_name_for("not a url", 0), "Document 1");
        assert_eq!(display_name_for("https://example.com/%FF%FE", 4), "Document 5");
    }

    #[test]
    fn blob_and_file_locators_resolve() {
        let blob = resolve_url("blob:https://example.com/5a1f-22c0").unwrap();
        assert_eq!(blob.display_name, "5a1f-22c0");

        let file = resolve_url("file:///tmp/report.PDF").unwrap();
        assert_eq!(file.display_name, "report");
    }

    #[test]
    fn rejects_unsupported_locators() {
        for bad in ["", "ftp://example.com/a.pdf", "https://", "example.com/a.pdf", "file://"] {
            let err = resolve_url(bad).unwrap_err();
            assert!(matches!(err, ViewerError::SourceInvalid { .. }), "{bad}: {err:?}");
        }
    }

    #[test]
    fn fragment_parsing() {
        assert_eq!(page_from_fragment("https://h/a.pdf#page=12"), Some(12));
        assert_eq!(page_from_fragment("https://h/a.pdf#zoom=2&PAGE=4"), Some(4));
        assert_eq!(page_from_fragment("https://h/a.pdf#page="), None);
        assert_eq!(page_from_fragment("https://h/a.pdf"), None);
        assert_eq!(page_from_fragment("https://h/a.pdf#page=99999999999"), None);
        assert_eq!(page_from_fragment("https://h/a.pdf#subpage=3"), None);
        assert_eq!(page_from_fragment("https://h/a.pdf#view=fit;page=5"), Some(5));
    }

    #[test]
    fn fragment_is_rewritten() {
        assert_eq!(
            with_page_fragment("https://h/a.pdf#page=2", 9),
            "https://h/a.pdf#page=9"
        );
        assert_eq!(with_page_fragment("https://h/a.pdf", 1), "https://h/a.pdf#page=1");
    }

    #[test]
    fn bytes_use_content_fingerprint() {
        let data = b"%PDF-1.7\n...".to_vec();
        let a: Document<()> = resolve(
            DocumentSource::Bytes {
                file_name: "scan.pdf".into(),
                data: data.clone(),
            },
            0,
        )
        .unwrap();
        let b: Document<()> = resolve(
            DocumentSource::Bytes {
                file_name: "copy of scan.pdf".into(),
                data,
            },
            1,
        )
        .unwrap();

        assert_eq!(a.id, b.id);
        assert!(a.id.as_str().starts_with("bytes:"));
        assert_eq!(a.display_name, "scan");
        assert_eq!(b.display_name, "copy of scan");
    }

    #[test]
    fn non_pdf_bytes_are_rejected() {
        let err = resolve::<()>(
            DocumentSource::Bytes {
                file_name: "photo.png".into(),
                data: vec![0x89, b'P', b'N', b'G'],
            },
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ViewerError::SourceInvalid { .. }));
    }

    #[test]
    fn locator_list_splits_on_commas_and_pipes() {
        assert_eq!(
            parse_locator_list(" https://a/1.pdf, https://b/2.pdf#page=2 |https://c/3.pdf,, "),
            vec![
                "https://a/1.pdf".to_string(),
                "https://b/2.pdf#page=2".to_string(),
                "https://c/3.pdf".to_string(),
            ]
        );
    }
}
