use crate::error::IngestError;
use crate::models::{BoundingBox, TextFragment};
use pdfium_render::prelude::*;

/// One atomic text span as reported by the rendering engine, before
/// trimming and index assignment.
#[derive(Debug, Clone)]
pub struct RawSpan {
    /// 1-based page number.
    pub page_number: u32,
    pub text: String,
    pub bbox: BoundingBox,
}

/// Turns raw document bytes into an ordered sequence of fragments.
///
/// Implementations must preserve the document's native ordering: pages
/// ascending, then block/line/span order within each page. The whole
/// sequence is produced or the call fails; no partial output.
pub trait FragmentExtractor: Send + Sync {
    fn extract(&self, source_file: &str, bytes: &[u8]) -> Result<Vec<TextFragment>, IngestError>;
}

/// Trim each raw span and assign dense sequence indices over the spans
/// that survive trimming. Spans that trim to empty are skipped and do not
/// consume an index slot.
pub fn fragments_from_spans(
    source_file: &str,
    spans: impl IntoIterator<Item = RawSpan>,
) -> Vec<TextFragment> {
    let mut fragments = Vec::new();
    let mut next_index = 0u64;

    for span in spans {
        let text = span.text.trim();
        if text.is_empty() {
            continue;
        }

        fragments.push(TextFragment {
            source_file: source_file.to_string(),
            page_number: span.page_number,
            sequence_index: next_index,
            text: text.to_string(),
            bbox: span.bbox,
        });
        next_index += 1;
    }

    fragments
}

/// Extractor backed by the pdfium engine, which reports per-segment
/// bounding boxes in PDF point space.
#[derive(Default)]
pub struct PdfiumExtractor;

impl FragmentExtractor for PdfiumExtractor {
    fn extract(&self, source_file: &str, bytes: &[u8]) -> Result<Vec<TextFragment>, IngestError> {
        // pdfium is not async-safe; keep the whole parse on one blocking call.
        tokio::task::block_in_place(|| extract_spans_blocking(source_file, bytes))
    }
}

fn extract_spans_blocking(
    source_file: &str,
    bytes: &[u8],
) -> Result<Vec<TextFragment>, IngestError> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|error| IngestError::Extraction(format!("pdfium unavailable: {error}")))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|error| IngestError::Extraction(error.to_string()))?;

    let mut spans = Vec::new();
    for (page_index, page) in document.pages().iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|error| IngestError::Extraction(error.to_string()))?;

        for segment in page_text.segments().iter() {
            let bounds = segment.bounds();
            spans.push(RawSpan {
                page_number: page_index as u32 + 1,
                text: segment.text(),
                bbox: BoundingBox {
                    x0: bounds.left.value,
                    y0: bounds.bottom.value,
                    x1: bounds.right.value,
                    y1: bounds.top.value,
                },
            });
        }
    }

    let fragments = fragments_from_spans(source_file, spans);
    if fragments.is_empty() {
        return Err(IngestError::Extraction(format!(
            "pdf had no readable text spans: {source_file}"
        )));
    }

    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::{fragments_from_spans, FragmentExtractor, PdfiumExtractor, RawSpan};
    use crate::models::BoundingBox;

    fn span(page: u32, text: &str) -> RawSpan {
        RawSpan {
            page_number: page,
            text: text.to_string(),
            bbox: BoundingBox {
                x0: 10.0,
                y0: 20.0,
                x1: 110.0,
                y1: 32.0,
            },
        }
    }

    #[test]
    fn empty_spans_do_not_consume_index_slots() {
        let fragments = fragments_from_spans(
            "doc.pdf",
            vec![
                span(1, "  Tema 1  "),
                span(1, "   "),
                span(1, ""),
                span(2, "Tema 2"),
            ],
        );

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].text, "Tema 1");
        assert_eq!(fragments[0].sequence_index, 0);
        assert_eq!(fragments[1].text, "Tema 2");
        assert_eq!(fragments[1].sequence_index, 1);
        assert_eq!(fragments[1].page_number, 2);
    }

    #[test]
    fn sequence_indices_are_dense() {
        let spans = (0..10).map(|n| span(1, if n % 2 == 0 { "text" } else { " " }));
        let fragments = fragments_from_spans("doc.pdf", spans);

        let indices: Vec<u64> = fragments
            .iter()
            .map(|fragment| fragment.sequence_index)
            .collect();
        assert_eq!(indices, (0..fragments.len() as u64).collect::<Vec<_>>());
    }

    #[test]
    fn bbox_is_carried_through_raw() {
        let fragments = fragments_from_spans("doc.pdf", vec![span(1, "x")]);
        assert_eq!(
            fragments[0].bbox,
            BoundingBox {
                x0: 10.0,
                y0: 20.0,
                x1: 110.0,
                y1: 32.0,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unparseable_bytes_fail_extraction() {
        let result = PdfiumExtractor.extract("broken.pdf", b"not a pdf at all");
        assert!(matches!(
            result,
            Err(crate::error::IngestError::Extraction(_))
        ));
    }
}
