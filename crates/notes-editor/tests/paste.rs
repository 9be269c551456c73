mod common;

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use manos_notes_core::{LinkPreviewAttrs, Node, NodeKind};
use manos_notes_editor::views::WidgetRender;
use manos_notes_editor::{
    ClipboardSink, FetchError, ImageFile, ImageUploader, IngestError, LinkMetadata, LinkMetadataSource, PasteOutcome,
    UploadedImage, copy_image,
};

use common::session;

struct Metadata {
    fail: bool,
    asked: RefCell<Vec<String>>,
}

impl Metadata {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            asked: RefCell::new(Vec::new()),
        }
    }
}

#[async_trait(?Send)]
impl LinkMetadataSource for Metadata {
    async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, FetchError> {
        self.asked.borrow_mut().push(url.to_string());
        if self.fail {
            return Err(FetchError::Status(404));
        }
        Ok(LinkMetadata {
            kind: "article".into(),
            provider: Some("Example".into()),
            title: Some("Example Domain".into()),
            ..LinkMetadata::default()
        })
    }
}

#[tokio::test]
async fn a_lone_url_becomes_a_link_preview() {
    let mut session = session();
    let source = Metadata::new(false);
    session.paste_text_with("https://example.com", &source).await.unwrap();

    assert_eq!(*source.asked.borrow(), vec!["https://example.com".to_string()]);
    let doc = session.editor().doc();
    assert!(doc.children[0].is_kind(NodeKind::LinkPreviewBlock));
    assert!(doc.children[1].is_empty_paragraph());

    let attrs = LinkPreviewAttrs::from_attrs(doc.children[0].attrs().unwrap());
    assert_eq!(attrs.url, "https://example.com");
    assert_eq!(attrs.title.as_deref(), Some("Example Domain"));

    let widgets = session.render_widgets();
    let [WidgetRender::LinkPreview(card)] = widgets.as_slice() else {
        panic!("expected one link card, got {widgets:?}");
    };
    assert_eq!(card.badge, "ARTICLE");
}

#[tokio::test]
async fn www_urls_are_resolved_over_https() {
    let mut session = session();
    let source = Metadata::new(false);
    session.paste_text_with("  www.example.com/a  ", &source).await.unwrap();
    assert_eq!(*source.asked.borrow(), vec!["https://www.example.com/a".to_string()]);
}

#[tokio::test]
async fn text_around_a_url_is_pasted_unchanged() {
    let mut session = session();
    let source = Metadata::new(false);
    session.paste_text_with("see https://example.com", &source).await.unwrap();

    assert!(source.asked.borrow().is_empty());
    assert_eq!(session.editor().doc().children[0], Node::paragraph("see https://example.com"));
}

#[tokio::test]
async fn failed_metadata_falls_back_to_the_raw_url() {
    let mut session = session();
    let source = Metadata::new(true);
    session.paste_text_with("https://example.com", &source).await.unwrap();

    assert_eq!(session.editor().doc().children[0], Node::paragraph("https://example.com"));
    assert!(session.views().is_empty());
}

#[test]
fn link_results_for_a_previous_note_are_dropped() {
    let mut session = session();
    let PasteOutcome::PendingLink(request) = session.paste_text("https://example.com").unwrap() else {
        panic!("expected a pending link");
    };
    let markup = session.markup().unwrap();
    session.load_markup(&markup).unwrap();

    assert!(!session.complete_link_paste(request, Ok(LinkMetadata::default())).unwrap());
    assert!(session.editor().doc().children[0].is_empty_paragraph());
}

struct Uploads {
    fail_for: &'static str,
    seen: RefCell<Vec<ImageFile>>,
}

#[async_trait(?Send)]
impl ImageUploader for Uploads {
    async fn upload(&self, file: &ImageFile) -> Result<UploadedImage, FetchError> {
        self.seen.borrow_mut().push(file.clone());
        if file.name == self.fail_for {
            return Err(FetchError::Transport("connection reset".into()));
        }
        Ok(UploadedImage {
            id: None,
            url: format!("https://cdn.example.com/{}", file.name),
            filename: None,
        })
    }
}

#[tokio::test]
async fn images_are_uploaded_then_inserted_at_full_width() {
    let mut session = session();
    let uploads = Uploads {
        fail_for: "broken.png",
        seen: RefCell::new(Vec::new()),
    };
    let files = vec![
        ImageFile::new("a.png", "image/png", vec![1, 2, 3]),
        ImageFile::new("notes.txt", "text/plain", vec![4]),
        ImageFile::new("broken.png", "image/png", vec![5]),
    ];

    let results = session.ingest_images(files, &uploads).await;
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        &results[1],
        Err(IngestError::Upload { name, .. }) if name == "broken.png"
    ));
    assert_eq!(uploads.seen.borrow().len(), 2);

    let widgets = session.render_widgets();
    let [WidgetRender::Image(image)] = widgets.as_slice() else {
        panic!("expected one image, got {widgets:?}");
    };
    assert_eq!(image.src, "https://cdn.example.com/a.png");
    assert_eq!(image.width_pct, 100);
    assert_eq!(image.alt.as_deref(), Some("a.png"));
}

struct NoClipboard {
    tried: Cell<usize>,
}

impl ClipboardSink for NoClipboard {
    fn write_image(&mut self, _src: &str) -> Result<(), String> {
        self.tried.set(self.tried.get() + 1);
        Err("clipboard API unavailable".into())
    }
}

#[test]
fn clipboard_failures_become_notices() {
    let mut sink = NoClipboard { tried: Cell::new(0) };
    let notice = copy_image(&mut sink, "https://cdn.example.com/a.png").unwrap();
    assert!(!notice.message.is_empty());
    assert_eq!(sink.tried.get(), 1);
}
