// End-to-end tests on PDFs assembled in memory with lopdf.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use pdffindings::hashing::digest;
use pdffindings::{
    run_analysis, AnalysisError, AnalyzerConfig, AnnotationIntent, LopdfDocument, OriginType,
    PdfAnalyzer,
};
use serde_json::json;

// ── Fixture builder ───────────────────────────────────────────────────────────

struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    catalog: Dictionary,
}

impl PdfBuilder {
    fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            catalog: dictionary! { "Type" => "Catalog", "Pages" => pages_id },
        }
    }

    fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    fn add_page(&mut self, mut page: Dictionary) -> ObjectId {
        page.set("Type", "Page");
        page.set("Parent", self.pages_id);
        page.set(
            "MediaBox",
            vec![0.into(), 0.into(), 612.into(), 792.into()],
        );
        let id = self.doc.add_object(page);
        self.kids.push(id.into());
        id
    }

    fn catalog(&mut self, key: &str, value: impl Into<Object>) {
        self.catalog.set(key, value);
    }

    fn build(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(self.catalog);
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).unwrap();
        bytes
    }
}

fn js(source: &str) -> Object {
    Object::Dictionary(dictionary! {
        "S" => "JavaScript",
        "JS" => Object::string_literal(source),
    })
}

fn embedded_file(builder: &mut PdfBuilder, filename: &str, content: &[u8]) -> Object {
    let stream = builder.add_object(Stream::new(
        dictionary! { "Type" => "EmbeddedFile" },
        content.to_vec(),
    ));
    Object::Dictionary(dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(filename),
        "UF" => Object::string_literal(filename),
        "EF" => dictionary! { "F" => stream },
    })
}

async fn analyze(bytes: &[u8]) -> pdffindings::Report {
    PdfAnalyzer::from_bytes(bytes).unwrap().analyze().await
}

// ── Loading ───────────────────────────────────────────────────────────────────

#[test]
fn rejects_non_pdf_input() {
    assert!(PdfAnalyzer::from_bytes(b"").is_err());
    assert!(matches!(
        PdfAnalyzer::from_bytes(b"definitely not a pdf"),
        Err(AnalysisError::ParseError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = PdfAnalyzer::from_path(dir.path().join("missing.pdf"));
    assert!(matches!(result, Err(AnalysisError::IoError(_))));
}

#[tokio::test]
async fn blank_document_is_clean() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! {});
    let bytes = builder.build();

    let analyzer = PdfAnalyzer::from_bytes(&bytes).unwrap();
    assert_eq!(analyzer.page_count(), 1);
    let report = analyzer.analyze().await;

    assert!(report.is_clean(), "{report:#?}");
    assert_eq!(report.document_hash, Some(digest(&bytes)));
}

#[tokio::test]
async fn from_path_reads_the_file() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! {});
    let bytes = builder.build();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.pdf");
    std::fs::write(&path, &bytes).unwrap();

    let report = PdfAnalyzer::from_path(&path).unwrap().analyze().await;
    assert_eq!(report.document_hash, Some(digest(&bytes)));
}

// ── Document level ────────────────────────────────────────────────────────────

#[tokio::test]
async fn document_scripts_from_catalog() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! {});
    let init = builder.add_object(js("init()"));
    builder.catalog(
        "Names",
        dictionary! {
            "JavaScript" => dictionary! {
                "Names" => vec![Object::string_literal("init"), init.into()],
            },
        },
    );
    builder.catalog("AA", dictionary! { "WC" => js("bye()") });
    builder.catalog("OpenAction", js("boot()"));
    let report = analyze(&builder.build()).await;

    let details = |source: &str, trigger: &str| -> Vec<String> {
        report
            .scripts
            .get(source)
            .unwrap()
            .details(trigger, OriginType::Document)
            .to_vec()
    };
    assert_eq!(details("init()", "init"), [""]);
    assert_eq!(details("bye()", "WillClose"), [""]);
    assert_eq!(details("boot()", "OpenAction"), [""]);
    // A JavaScript open action is a script, not an unparsed open action.
    assert!(report.errors.is_empty(), "{:?}", report.errors);
}

#[tokio::test]
async fn destination_open_action_is_trivial() {
    let mut builder = PdfBuilder::new();
    let page = builder.add_page(dictionary! {});
    builder.catalog("OpenAction", vec![page.into(), "Fit".into()]);
    let report = analyze(&builder.build()).await;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
}

#[tokio::test]
async fn named_open_action_is_reported() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! {});
    builder.catalog(
        "OpenAction",
        dictionary! { "S" => "Named", "N" => "Print" },
    );
    let report = analyze(&builder.build()).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].origin(), "Document OpenAction");
    assert_eq!(report.errors[0].raw_context(), Some(&json!({ "action": "Print" })));
}

#[tokio::test]
async fn embedded_files_become_document_attachments() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! {});
    let spec = embedded_file(&mut builder, "factur-x.xml", b"<rsm:CrossIndustryInvoice/>");
    let spec_id = builder.add_object(spec);
    builder.catalog(
        "Names",
        dictionary! {
            "EmbeddedFiles" => dictionary! {
                "Names" => vec![Object::string_literal("factur-x.xml"), spec_id.into()],
            },
        },
    );
    let report = analyze(&builder.build()).await;

    assert_eq!(report.attachments.len(), 1);
    let attachment = &report.attachments[0];
    assert_eq!(attachment.origin, "Document");
    assert_eq!(attachment.filename, "factur-x.xml");
    assert_eq!(attachment.data, b"<rsm:CrossIndustryInvoice/>");
    assert_eq!(attachment.digest(), digest(b"<rsm:CrossIndustryInvoice/>"));

    let dir = tempfile::tempdir().unwrap();
    let written = attachment.save_to_disk(dir.path()).unwrap();
    assert_eq!(std::fs::read(written).unwrap(), attachment.data);
}

#[tokio::test]
async fn form_fields_and_flags() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! {});
    let widget_a = builder.add_object(dictionary! { "Type" => "Annot", "Subtype" => "Widget" });
    let widget_b = builder.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "AA" => dictionary! { "Fo" => js("focus()") },
    });
    let total = builder.add_object(dictionary! {
        "T" => Object::string_literal("total"),
        "AA" => dictionary! { "C" => js("sum()") },
        "Kids" => vec![widget_a.into(), widget_b.into()],
    });
    let form = builder.add_object(dictionary! {
        "T" => Object::string_literal("invoice"),
        "Kids" => vec![total.into()],
    });
    let signature = builder.add_object(dictionary! {
        "T" => Object::string_literal("sig"),
        "FT" => "Sig",
    });
    builder.catalog(
        "AcroForm",
        dictionary! {
            "Fields" => vec![form.into(), signature.into()],
            "XFA" => Object::string_literal("<xdp/>"),
        },
    );
    let report = analyze(&builder.build()).await;

    let flags: Vec<_> = report.other.iter().map(|a| a.description()).collect();
    assert_eq!(
        flags,
        ["Document has AcroForm", "Document has XFA", "Document has signatures"]
    );

    let sum = report.scripts.get("sum()").unwrap();
    assert_eq!(
        sum.details("Calculate", OriginType::Field),
        ["\"invoice.total\" [0]", "\"invoice.total\" [1]"]
    );
    let focus = report.scripts.get("focus()").unwrap();
    assert_eq!(focus.details("Focus", OriginType::Field), ["\"invoice.total\" [1]"]);
}

// ── Page level ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn page_and_annotation_findings() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! {});

    let link = builder.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "A" => dictionary! { "S" => "URI", "URI" => Object::string_literal("https://example.test/pay") },
    });
    let widget = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "A" => js("click()"),
        "AA" => dictionary! { "U" => js("release()") },
    };
    let rich_media = dictionary! { "Type" => "Annot", "Subtype" => "RichMedia" };
    let no_subtype = dictionary! { "Type" => "Annot" };
    let spec = embedded_file(&mut builder, "payload.exe", b"MZ\x90\x00\x03");
    let attachment = dictionary! {
        "Type" => "Annot",
        "Subtype" => "FileAttachment",
        "FS" => spec,
    };

    builder.add_page(dictionary! {
        "AA" => dictionary! { "O" => js("track()") },
        "Annots" => vec![
            link.into(),
            widget.into(),
            rich_media.into(),
            no_subtype.into(),
            attachment.into(),
        ],
    });
    let report = analyze(&builder.build()).await.canonical();

    let track = report.scripts.get("track()").unwrap();
    assert_eq!(track.details("PageOpen", OriginType::Page), ["2"]);
    let click = report.scripts.get("click()").unwrap();
    assert_eq!(click.details("Action", OriginType::Annotation), ["(Widget on page 2)"]);
    let release = report.scripts.get("release()").unwrap();
    assert_eq!(release.details("Mouse Up", OriginType::Annotation), ["(Widget on page 2)"]);

    assert_eq!(report.links.len(), 1);
    assert_eq!(report.links[0].origin, "Page 2");
    assert_eq!(report.links[0].url, "https://example.test/pay");

    let descriptions: Vec<_> = report
        .suspicious_annotations
        .iter()
        .map(|a| a.description())
        .collect();
    assert_eq!(
        descriptions,
        [
            "annotation with missing subtype",
            "annotation with unusual subtype RichMedia",
        ]
    );

    assert_eq!(report.attachments.len(), 1);
    assert_eq!(report.attachments[0].origin, "Page 2");
    assert_eq!(report.attachments[0].filename, "payload.exe");
    assert_eq!(report.attachments[0].digest(), digest(b"MZ\x90\x00\x03"));
    assert!(report.errors.is_empty(), "{:?}", report.errors);
}

#[tokio::test]
async fn widget_inherits_field_actions() {
    let mut builder = PdfBuilder::new();
    let total = builder.doc.new_object_id();
    let widget = builder.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Parent" => total,
    });
    builder.doc.objects.insert(
        total,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("total"),
            "AA" => dictionary! { "C" => js("sum()") },
            "Kids" => vec![widget.into()],
        }),
    );
    builder.add_page(dictionary! { "Annots" => vec![widget.into()] });
    builder.catalog("AcroForm", dictionary! { "Fields" => vec![total.into()] });
    let report = analyze(&builder.build()).await;

    let sum = report.scripts.get("sum()").unwrap();
    assert_eq!(
        sum.details("Calculate", OriginType::Annotation),
        ["(Widget on page 1)"]
    );
    assert_eq!(sum.details("Calculate", OriginType::Field), ["\"total\" [0]"]);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
}

#[tokio::test]
async fn launch_and_remote_goto_targets_are_links() {
    let mut builder = PdfBuilder::new();
    let launch = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "A" => dictionary! { "S" => "Launch", "F" => Object::string_literal("cmd.exe") },
    };
    let goto_remote = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "A" => dictionary! {
            "S" => "GoToR",
            "F" => dictionary! { "Type" => "Filespec", "F" => Object::string_literal("other.pdf") },
            "D" => Object::string_literal("chapter1"),
        },
    };
    builder.add_page(dictionary! { "Annots" => vec![launch.into(), goto_remote.into()] });
    let report = analyze(&builder.build()).await;

    let urls: Vec<_> = report.links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(urls, ["cmd.exe", "other.pdf#chapter1"]);
    assert!(report.links.iter().all(|l| l.origin == "Page 1"));
}

#[tokio::test]
async fn fanned_out_action_chain_finishes() {
    let mut builder = PdfBuilder::new();
    let action = builder.doc.new_object_id();
    builder.doc.objects.insert(
        action,
        Object::Dictionary(dictionary! {
            "S" => "JavaScript",
            "JS" => Object::string_literal("spin()"),
            "Next" => vec![action.into(), action.into(), action.into()],
        }),
    );
    builder.add_page(dictionary! { "AA" => dictionary! { "O" => action } });
    let report = analyze(&builder.build()).await;

    let spin = report.scripts.get("spin()").unwrap();
    assert_eq!(spin.location_count(), 1);
    assert_eq!(spin.details("PageOpen", OriginType::Page), ["1"]);
}

#[tokio::test]
async fn identical_page_scripts_merge_across_pages() {
    let mut builder = PdfBuilder::new();
    for _ in 0..3 {
        builder.add_page(dictionary! { "AA" => dictionary! { "O" => js("beacon()") } });
    }
    let report = analyze(&builder.build()).await.canonical();

    assert_eq!(report.scripts.len(), 1);
    let beacon = report.scripts.get("beacon()").unwrap();
    assert_eq!(beacon.details("PageOpen", OriginType::Page), ["1", "2", "3"]);
}

#[tokio::test]
async fn malformed_annots_fail_only_that_page() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! { "Annots" => 42 });
    builder.add_page(dictionary! { "AA" => dictionary! { "O" => js("fine()") } });
    let report = analyze(&builder.build()).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].origin(), "Page 1");
    assert!(report.scripts.get("fine()").is_some());
}

#[tokio::test]
async fn print_intent_skips_non_printing_annotations() {
    let mut builder = PdfBuilder::new();
    builder.add_page(dictionary! {
        "Annots" => vec![
            dictionary! { "Type" => "Annot", "Subtype" => "Sound3D" }.into(),
            dictionary! { "Type" => "Annot", "Subtype" => "Movie3D", "F" => 4 }.into(),
        ],
    });
    let document = LopdfDocument::from_bytes(builder.build()).unwrap();
    let config = AnalyzerConfig {
        annotation_intent: AnnotationIntent::Print,
        ..Default::default()
    };
    let report = run_analysis(&document, &config).await;

    assert_eq!(report.suspicious_annotations.len(), 1);
    assert_eq!(
        report.suspicious_annotations[0].description(),
        "annotation with unusual subtype Movie3D"
    );
}
