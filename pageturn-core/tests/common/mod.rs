#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;

use pageturn_core::{
    ContainerSize, DocumentHandle, EngineError, LoadProgress, PageHandle, PageSize, RangeHints,
    RasterEngine, StaticEnvironment, Surface, Viewer, ViewerConfig,
};
use tokio::sync::Notify;
use tokio::task::LocalSet;

pub type TestViewer = Viewer<MockEngine, StaticEnvironment>;

pub const BYTES_KEY: &str = "bytes";

#[derive(Debug, Clone)]
pub struct MockDoc {
    pub pages: u32,
    pub width: f64,
    pub height: f64,
    pub open_error: Option<EngineError>,
}

impl MockDoc {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            width: 600.0,
            height: 800.0,
            open_error: None,
        }
    }

    pub fn sized(pages: u32, width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::new(pages)
        }
    }

    pub fn failing(error: EngineError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::new(1)
        }
    }
}

#[derive(Default)]
pub struct MockState {
    docs: RefCell<HashMap<String, MockDoc>>,
    open_gates: RefCell<HashMap<String, Rc<Notify>>>,
    render_gates: RefCell<HashMap<u32, Rc<Notify>>>,
    failing_pages: RefCell<HashSet<u32>>,
    opened: RefCell<Vec<String>>,
    last_hints: Cell<Option<RangeHints>>,
    renders: Cell<usize>,
}

/// In-memory engine keyed by locator. Byte sources share the [`BYTES_KEY`]
/// entry.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Rc<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(self, locator: &str, doc: MockDoc) -> Self {
        self.state.docs.borrow_mut().insert(locator.to_string(), doc);
        self
    }

    pub fn set_doc(&self, locator: &str, doc: MockDoc) {
        self.state.docs.borrow_mut().insert(locator.to_string(), doc);
    }

    /// Block opens of `locator` until the returned gate is notified.
    pub fn gate_open(&self, locator: &str) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        self.state
            .open_gates
            .borrow_mut()
            .insert(locator.to_string(), Rc::clone(&gate));
        gate
    }

    /// Block rendering of `page` until the returned gate is notified.
    pub fn gate_render(&self, page: u32) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        self.state.render_gates.borrow_mut().insert(page, Rc::clone(&gate));
        gate
    }

    pub fn fail_page(&self, page: u32) {
        self.state.failing_pages.borrow_mut().insert(page);
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.opened.borrow().clone()
    }

    pub fn last_hints(&self) -> Option<RangeHints> {
        self.state.last_hints.get()
    }

    pub fn renders(&self) -> usize {
        self.state.renders.get()
    }

    async fn open(&self, key: &str) -> Result<MockDocument, EngineError> {
        self.state.opened.borrow_mut().push(key.to_string());
        let gate = self.state.open_gates.borrow().get(key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let doc = self
            .state
            .docs
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::Fetch(format!("404 Not Found: {key}")))?;
        if let Some(err) = doc.open_error.clone() {
            return Err(err);
        }
        Ok(MockDocument {
            doc,
            state: Rc::clone(&self.state),
        })
    }
}

impl RasterEngine for MockEngine {
    type Document = MockDocument;

    async fn open_from_locator(
        &self,
        locator: &str,
        hints: RangeHints,
        progress: &LoadProgress,
    ) -> Result<MockDocument, EngineError> {
        self.state.last_hints.set(Some(hints));
        let opened = self.open(locator).await;
        progress.report(4096, Some(4096));
        opened
    }

    async fn open_from_bytes(&self, _data: Rc<[u8]>) -> Result<MockDocument, EngineError> {
        self.open(BYTES_KEY).await
    }
}

pub struct MockDocument {
    doc: MockDoc,
    state: Rc<MockState>,
}

impl DocumentHandle for MockDocument {
    type Page = MockPage;

    fn page_count(&self) -> u32 {
        self.doc.pages
    }

    async fn get_page(&self, page_number: u32) -> Result<MockPage, EngineError> {
        Ok(MockPage {
            number: page_number,
            width: self.doc.width,
            height: self.doc.height,
            state: Rc::clone(&self.state),
        })
    }
}

pub struct MockPage {
    number: u32,
    width: f64,
    height: f64,
    state: Rc<MockState>,
}

impl PageHandle for MockPage {
    fn intrinsic_size(&self, scale: f64) -> PageSize {
        PageSize {
            width: self.width * scale,
            height: self.height * scale,
        }
    }

    // Pixels stay unpainted: tests only look at geometry.
    async fn render_to(&self, _surface: &mut Surface, _viewport_scale: f64) -> Result<(), EngineError> {
        let gate = self.state.render_gates.borrow().get(&self.number).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.state.failing_pages.borrow().contains(&self.number) {
            return Err(EngineError::Render(format!("page {} is corrupt", self.number)));
        }
        self.state.renders.set(self.state.renders.get() + 1);
        Ok(())
    }
}

pub fn pdf(name: &str) -> String {
    format!("https://docs.example.com/{name}.pdf")
}

/// Tall enough that a fitted 600×800 page never overflows.
pub const ROOMY: ContainerSize = ContainerSize {
    width: 700.0,
    height: 1000.0,
};

pub fn viewer(engine: MockEngine) -> Rc<TestViewer> {
    viewer_with(engine, StaticEnvironment::new(1.0, 700.0), ViewerConfig::default())
}

pub fn viewer_with(
    engine: MockEngine,
    env: StaticEnvironment,
    config: ViewerConfig,
) -> Rc<TestViewer> {
    Viewer::new(engine, env, config)
}

/// Run `test` inside a `LocalSet` so the viewer can spawn local tasks.
pub async fn local<F: Future>(test: F) -> F::Output {
    LocalSet::new().run_until(test).await
}

/// Let spawned local tasks make progress.
pub async fn yield_a_few() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
