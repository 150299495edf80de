use std::fmt;
use std::rc::Rc;

/// Stable identity of a document: the locator without its fragment, or a
/// content fingerprint for byte sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the engine reads the document from.
#[derive(Clone)]
pub enum Locator {
    /// Remote locator with any page fragment already stripped.
    Remote(String),
    Bytes { file_name: String, data: Rc<[u8]> },
}

impl Locator {
    pub fn remote(&self) -> Option<&str> {
        match self {
            Self::Remote(url) => Some(url),
            Self::Bytes { .. } => None,
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.debug_tuple("Remote").field(url).finish(),
            Self::Bytes { file_name, data } => f
                .debug_struct("Bytes")
                .field("file_name", file_name)
                .field("len", &data.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// One entry of the session's document list.
///
/// The engine handle is owned by this entry alone; it is set once the load
/// succeeds and dropped with the entry.
pub struct Document<H> {
    pub id: DocumentId,
    pub locator: Locator,
    pub display_name: String,
    pub page_count: u32,
    pub initial_page: Option<u32>,
    pub load_state: LoadState,
    pub error_detail: Option<String>,
    pub has_been_viewed: bool,
    /// Last page successfully rendered while this document was active.
    pub last_viewed_page: Option<u32>,
    engine_handle: Option<Rc<H>>,
}

impl<H> Document<H> {
    pub fn new(
        id: DocumentId,
        locator: Locator,
        display_name: String,
        initial_page: Option<u32>,
    ) -> Self {
        Self {
            id,
            locator,
            display_name,
            page_count: 0,
            initial_page,
            load_state: LoadState::Idle,
            error_detail: None,
            has_been_viewed: false,
            last_viewed_page: None,
            engine_handle: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded && self.engine_handle.is_some()
    }

    /// Page to show when this document becomes active: the last viewed page,
    /// else the requested initial page when it exists in the document, else 1.
    pub fn start_page(&self) -> u32 {
        let valid = |page: u32| (1..=self.page_count).contains(&page);
        self.last_viewed_page
            .filter(|page| valid(*page))
            .or(self.initial_page.filter(|page| valid(*page)))
            .unwrap_or(1)
    }

    pub(crate) fn handle(&self) -> Option<Rc<H>> {
        self.engine_handle.clone()
    }

    pub(crate) fn mark_loading(&mut self) {
        self.load_state = LoadState::Loading;
        self.error_detail = None;
    }

    pub(crate) fn mark_loaded(&mut self, handle: H, page_count: u32) {
        self.engine_handle = Some(Rc::new(handle));
        self.page_count = page_count;
        self.load_state = LoadState::Loaded;
        self.error_detail = None;
    }

    pub(crate) fn mark_error(&mut self, detail: String) {
        self.engine_handle = None;
        self.load_state = LoadState::Error;
        self.error_detail = Some(detail);
    }
}

impl<H> fmt::Debug for Document<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("locator", &self.locator)
            .field("display_name", &self.display_name)
            .field("page_count", &self.page_count)
            .field("initial_page", &self.initial_page)
            .field("load_state", &self.load_state)
            .field("error_detail", &self.error_detail)
            .field("has_been_viewed", &self.has_been_viewed)
            .field("has_handle", &self.engine_handle.is_some())
            .finish()
    }
}
