//! End-to-end pipeline tests with faked capabilities.
//!
//! The page renderer and office converter are swapped for in-process fakes,
//! so the whole record state machine — harvest, unpack, filter, normalize,
//! consolidate, persist — runs without a browser, LibreOffice, or any live
//! remote. The only network traffic is a loopback HTTP responder used for
//! the direct-link download test.

use async_trait::async_trait;
use litharvest::{
    run, ElementHandle, HarvestConfig, OfficeConverter, PageRenderer, PageSession, PatternStore,
    StageError, WorkItem,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ── Fixture helpers ──────────────────────────────────────────────────────────

/// Build a one-page PDF whose only content is `text`.
fn pdf_bytes(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode page content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

/// Build an in-memory zip from `(name, bytes)` entries.
fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(bytes).expect("write zip entry");
        }
        writer.finish().expect("finish zip");
    }
    cursor.into_inner()
}

fn item(label: &str, page_url: &str) -> WorkItem {
    WorkItem {
        label: label.to_string(),
        // Empty identifier: the retriever short-circuits to "unavailable"
        // without touching the network.
        article_id: String::new(),
        page_url: page_url.to_string(),
    }
}

/// Config wired to fakes and zeroed waits. The API base is unroutable so any
/// accidental retrieval attempt fails fast instead of leaving the machine.
fn test_config(dir: &TempDir, renderer: Arc<dyn PageRenderer>) -> HarvestConfig {
    test_config_with(dir, renderer, Arc::new(FakeConverter))
}

fn test_config_with(
    dir: &TempDir,
    renderer: Arc<dyn PageRenderer>,
    converter: Arc<dyn OfficeConverter>,
) -> HarvestConfig {
    HarvestConfig::builder()
        .api_key("test-key")
        .api_base_url("http://127.0.0.1:9")
        .output_dir(dir.path().join("out"))
        .scratch_root(dir.path().join("scratch"))
        .pacing_delay_ms(0)
        .scroll_pulses(1)
        .scroll_settle_ms(0)
        .trigger_settle_ms(0)
        .converter_warmup_ms(0)
        .renderer(renderer)
        .converter(converter)
        .build()
        .expect("test config")
}

fn read_artifact(dir: &TempDir, label: &str) -> String {
    std::fs::read_to_string(dir.path().join("out").join(format!("{label}.txt")))
        .expect("artifact should exist")
}

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Converter that is never expected to run; conversion requests fail softly.
struct FakeConverter;

#[async_trait]
impl OfficeConverter for FakeConverter {
    async fn ensure_started(&self) -> Result<(), StageError> {
        Ok(())
    }

    async fn convert_to_pdf(&self, file: &Path) -> Result<PathBuf, StageError> {
        Err(StageError::Conversion {
            path: file.to_path_buf(),
            detail: "conversion disabled in tests".into(),
        })
    }

    async fn shutdown(&self) {}
}

/// Converter that produces a real sibling PDF for every office document.
#[derive(Default)]
struct WritingConverter {
    started: AtomicBool,
}

#[async_trait]
impl OfficeConverter for WritingConverter {
    async fn ensure_started(&self) -> Result<(), StageError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn convert_to_pdf(&self, file: &Path) -> Result<PathBuf, StageError> {
        let pdf = file.with_extension("pdf");
        std::fs::write(&pdf, pdf_bytes("Converted docx body")).map_err(|e| {
            StageError::Conversion {
                path: file.to_path_buf(),
                detail: e.to_string(),
            }
        })?;
        Ok(pdf)
    }

    async fn shutdown(&self) {}
}

/// Renderer whose sessions never open.
struct FailingRenderer;

#[async_trait]
impl PageRenderer for FailingRenderer {
    async fn open(
        &self,
        _url: &str,
        _download_dir: &Path,
    ) -> Result<Box<dyn PageSession>, StageError> {
        Err(StageError::Session {
            detail: "browser endpoint unreachable".into(),
        })
    }
}

/// Renderer producing scripted sessions: clicking a trigger drops the
/// configured files into the download directory, and link locators resolve
/// to the configured hrefs.
struct ScriptedRenderer {
    drops: Vec<(String, Vec<u8>)>,
    hrefs: Vec<String>,
    closed: Arc<AtomicBool>,
}

impl ScriptedRenderer {
    fn new(drops: Vec<(String, Vec<u8>)>, hrefs: Vec<String>) -> (Arc<Self>, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let renderer = Arc::new(Self {
            drops,
            hrefs,
            closed: closed.clone(),
        });
        (renderer, closed)
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn open(
        &self,
        _url: &str,
        download_dir: &Path,
    ) -> Result<Box<dyn PageSession>, StageError> {
        Ok(Box::new(ScriptedSession {
            download_dir: download_dir.to_path_buf(),
            drops: self.drops.clone(),
            hrefs: self.hrefs.clone(),
            closed: self.closed.clone(),
        }))
    }
}

struct ScriptedSession {
    download_dir: PathBuf,
    drops: Vec<(String, Vec<u8>)>,
    hrefs: Vec<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn scroll_to_end(&self) -> Result<(), StageError> {
        Ok(())
    }

    async fn find_elements(&self, locator: &str) -> Result<Vec<ElementHandle>, StageError> {
        let count = if locator.ends_with("button") {
            usize::from(!self.drops.is_empty())
        } else {
            self.hrefs.len()
        };
        Ok((0..count)
            .map(|i| ElementHandle {
                id: format!("{locator}#{i}"),
            })
            .collect())
    }

    async fn click(&self, _element: &ElementHandle) -> Result<(), StageError> {
        // Model the browser download side-effect of a trigger activation.
        for (name, bytes) in &self.drops {
            std::fs::write(self.download_dir.join(name), bytes).map_err(|e| {
                StageError::Session {
                    detail: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        _name: &str,
    ) -> Result<Option<String>, StageError> {
        let index: usize = element
            .id
            .rsplit('#')
            .next()
            .and_then(|i| i.parse().ok())
            .unwrap_or(0);
        Ok(self.hrefs.get(index).cloned())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Serve one HTTP request on a loopback socket, responding with `bytes`.
async fn serve_once(bytes: Vec<u8>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut request = [0u8; 2048];
            let _ = stream.read(&mut request).await;
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/pdf\r\nConnection: close\r\n\r\n",
                bytes.len()
            );
            let _ = stream.write_all(header.as_bytes()).await;
            let _ = stream.write_all(&bytes).await;
            let _ = stream.shutdown().await;
        }
    });

    format!("http://{addr}")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_record_persists_even_when_everything_is_dead() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, Arc::new(FailingRenderer));
    let patterns = PatternStore::from_entries([(
        "supp".to_string(),
        "//a[@class='download']/button".to_string(),
    )]);
    let items = vec![
        item("alpha", "https://example.invalid/a"),
        item("beta", "https://example.invalid/b"),
        item("gamma", ""),
    ];

    let output = run(&items, &patterns, &config).await;

    assert_eq!(output.outcomes.len(), 3);
    assert_eq!(output.stats.failed, 0);
    for (outcome, label) in output.outcomes.iter().zip(["alpha", "beta", "gamma"]) {
        assert_eq!(outcome.label, label);
        assert!(outcome.persisted(), "{label} should persist");
        assert!(!outcome.fulltext_available);
        let text = read_artifact(&dir, label);
        assert!(text.contains("<h1>Manuscript</h1>"));
        assert!(text.contains("<h1>Supplementary</h1>"));
    }

    // Scratch areas were removed even on the degraded path.
    let scratch_root = dir.path().join("scratch");
    let leftovers = std::fs::read_dir(&scratch_root)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0, "scratch areas must not survive the run");
}

#[tokio::test]
async fn trigger_download_flows_through_to_the_artifact() {
    let dir = TempDir::new().unwrap();
    let drops = vec![
        ("materials.pdf".to_string(), pdf_bytes("Supplementary figure captions")),
        ("notes.txt".to_string(), b"should be filtered out".to_vec()),
    ];
    let (renderer, closed) = ScriptedRenderer::new(drops, vec![]);
    let config = test_config(&dir, renderer);
    let patterns = PatternStore::from_entries([(
        "supp".to_string(),
        "//div[@id='supp']/button".to_string(),
    )]);

    let output = run(
        &[item("rec1", "https://example.invalid/article")],
        &patterns,
        &config,
    )
    .await;

    let outcome = &output.outcomes[0];
    assert!(outcome.persisted());
    // Trigger downloads are unobservable and therefore uncounted.
    assert_eq!(outcome.files_fetched, 0);
    assert!(closed.load(Ordering::SeqCst), "session must be closed");

    let text = read_artifact(&dir, "rec1");
    assert!(text.contains("Supplementary figure captions"));
    assert!(!text.contains("should be filtered out"));
}

#[tokio::test]
async fn direct_link_fetches_from_remote() {
    let dir = TempDir::new().unwrap();
    let base = serve_once(pdf_bytes("Linked dataset description")).await;
    let (renderer, _closed) =
        ScriptedRenderer::new(vec![], vec![format!("{base}/dataset.pdf")]);
    let config = test_config(&dir, renderer);
    let patterns = PatternStore::from_entries([(
        "links".to_string(),
        "//div[@class='supp']//a".to_string(),
    )]);

    let output = run(
        &[item("rec2", "https://example.invalid/article")],
        &patterns,
        &config,
    )
    .await;

    let outcome = &output.outcomes[0];
    assert_eq!(outcome.files_fetched, 1);
    assert_eq!(output.stats.files_fetched, 1);

    let text = read_artifact(&dir, "rec2");
    assert!(text.contains("Linked dataset description"));
}

#[tokio::test]
async fn office_documents_are_converted_and_contribute_text() {
    let dir = TempDir::new().unwrap();
    let drops = vec![
        ("supp.docx".to_string(), b"office bytes".to_vec()),
        ("figure.pdf".to_string(), pdf_bytes("Figure caption text")),
        ("payload.exe".to_string(), b"nope".to_vec()),
    ];
    let (renderer, _closed) = ScriptedRenderer::new(drops, vec![]);
    let converter = Arc::new(WritingConverter::default());
    let config = test_config_with(&dir, renderer, converter.clone());
    let patterns = PatternStore::from_entries([(
        "supp".to_string(),
        "//div[@id='supp']/button".to_string(),
    )]);

    let output = run(
        &[item("rec5", "https://example.invalid/article")],
        &patterns,
        &config,
    )
    .await;

    assert!(output.outcomes[0].persisted());
    assert!(
        converter.started.load(Ordering::SeqCst),
        "office files must start the converter"
    );

    let text = read_artifact(&dir, "rec5");
    assert!(
        text.contains("Converted docx body"),
        "converted document text must reach the artifact"
    );
    assert!(text.contains("Figure caption text"));
    assert!(!text.contains("nope"));
}

#[tokio::test]
async fn nested_archives_expand_and_corrupt_sibling_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let inner = zip_bytes(&[("deep.pdf", pdf_bytes("Buried appendix text").as_slice())]);
    let outer = zip_bytes(&[
        ("middle.zip", inner.as_slice()),
        ("readme.md", b"junk".as_slice()),
    ]);
    let drops = vec![
        ("bundle.zip".to_string(), outer),
        ("broken.zip".to_string(), b"PK\x03\x04 this is not a real archive".to_vec()),
    ];
    let (renderer, _closed) = ScriptedRenderer::new(drops, vec![]);
    let config = test_config(&dir, renderer);
    let patterns = PatternStore::from_entries([(
        "supp".to_string(),
        "//div[@id='supp']/button".to_string(),
    )]);

    let output = run(
        &[item("rec3", "https://example.invalid/article")],
        &patterns,
        &config,
    )
    .await;

    assert!(output.outcomes[0].persisted());
    let text = read_artifact(&dir, "rec3");
    assert!(
        text.contains("Buried appendix text"),
        "nested archive content should reach the artifact"
    );
    assert!(!text.contains("junk"));
}

#[tokio::test]
async fn whitespace_is_collapsed_in_the_artifact() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, Arc::new(FailingRenderer));
    let patterns = PatternStore::from_entries(std::iter::empty::<(String, String)>());

    run(&[item("rec4", "")], &patterns, &config).await;

    let text = read_artifact(&dir, "rec4");
    assert!(!text.contains('\n'), "sanitizer collapses all whitespace runs");
    assert!(!text.contains("  "));
    assert!(!text.starts_with(' ') && !text.ends_with(' '));
}
