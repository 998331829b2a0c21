//! Document normalization: raw bytes to ordered text blocks
//!
//! Each supported format has its own parser behind the [`FormatParser`]
//! trait; the [`ParserRegistry`] dispatches on the declared format tag.

use std::collections::HashMap;
use std::io::Read;

use crate::error::{Error, Result};
use crate::types::{DocumentFormat, Locator, TextBlock};

/// Byte-to-text extraction for one document format
pub trait FormatParser: Send + Sync {
    /// Format this parser handles
    fn format(&self) -> DocumentFormat;

    /// Extract ordered text blocks from raw bytes.
    ///
    /// Block ids and document-level offsets are assigned afterwards by the
    /// registry; parsers only fill text, page, and section.
    fn parse(&self, filename: &str, data: &[u8]) -> Result<Vec<TextBlock>>;
}

/// Registry of format parsers keyed by format tag
pub struct ParserRegistry {
    parsers: HashMap<DocumentFormat, Box<dyn FormatParser>>,
}

impl ParserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in parsers
    pub fn with_default_parsers() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PlainTextParser));
        registry.register(Box::new(MarkdownParser));
        registry.register(Box::new(PdfParser));
        registry.register(Box::new(DocxParser));
        registry.register(Box::new(EpubParser));
        registry
    }

    /// Register a parser, replacing any previous one for the same format
    pub fn register(&mut self, parser: Box<dyn FormatParser>) {
        self.parsers.insert(parser.format(), parser);
    }

    /// Normalize raw bytes of the declared format into ordered blocks.
    ///
    /// Empty blocks are dropped; surviving blocks get sequential ids and
    /// running byte offsets over the concatenated document text. Yields
    /// `EmptyDocument` when nothing survives.
    pub fn normalize(
        &self,
        format: DocumentFormat,
        filename: &str,
        data: &[u8],
    ) -> Result<Vec<TextBlock>> {
        let parser = self
            .parsers
            .get(&format)
            .ok_or_else(|| Error::UnsupportedFormat(format.display_name().to_string()))?;

        let raw_blocks = parser.parse(filename, data)?;

        let mut blocks = Vec::with_capacity(raw_blocks.len());
        let mut offset = 0usize;

        for mut block in raw_blocks {
            let trimmed = block.text.trim();
            if trimmed.is_empty() {
                continue;
            }
            block.text = trimmed.to_string();
            block.block_id = blocks.len() as u32;
            block.locator.char_start = offset;
            block.locator.char_end = offset + block.text.len();
            offset = block.locator.char_end;
            blocks.push(block);
        }

        if blocks.is_empty() {
            return Err(Error::EmptyDocument(filename.to_string()));
        }

        tracing::debug!(
            filename,
            format = format.display_name(),
            blocks = blocks.len(),
            bytes = offset,
            "normalized document"
        );

        Ok(blocks)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_default_parsers()
    }
}

/// Plain text: strict UTF-8 decode, single block
pub struct PlainTextParser;

impl FormatParser for PlainTextParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    fn parse(&self, filename: &str, data: &[u8]) -> Result<Vec<TextBlock>> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::parse(filename, format!("Not valid UTF-8: {}", e)))?;
        Ok(vec![TextBlock::plain(text.to_string())])
    }
}

/// Markdown: inline markup stripped, one block per heading section
pub struct MarkdownParser;

impl FormatParser for MarkdownParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markdown
    }

    fn parse(&self, filename: &str, data: &[u8]) -> Result<Vec<TextBlock>> {
        use pulldown_cmark::{Event, Parser, Tag, TagEnd};

        let text = std::str::from_utf8(data)
            .map_err(|e| Error::parse(filename, format!("Not valid UTF-8: {}", e)))?;

        let mut blocks = Vec::new();
        let mut current = String::new();
        let mut section: Option<String> = None;
        let mut heading = String::new();
        let mut in_heading = false;

        let flush = |text: &mut String, section: &Option<String>, blocks: &mut Vec<TextBlock>| {
            if !text.trim().is_empty() {
                blocks.push(TextBlock {
                    block_id: 0,
                    text: std::mem::take(text),
                    locator: Locator {
                        section: section.clone(),
                        ..Default::default()
                    },
                });
            } else {
                text.clear();
            }
        };

        for event in Parser::new(text) {
            match event {
                Event::Start(Tag::Heading { .. }) => {
                    flush(&mut current, &section, &mut blocks);
                    in_heading = true;
                    heading.clear();
                }
                Event::End(TagEnd::Heading(_)) => {
                    in_heading = false;
                    section = Some(heading.trim().to_string());
                    // Keep the heading text itself in the block body
                    current.push_str(heading.trim());
                    current.push('\n');
                }
                Event::Text(t) | Event::Code(t) => {
                    if in_heading {
                        heading.push_str(&t);
                    } else {
                        current.push_str(&t);
                    }
                }
                Event::SoftBreak => current.push(' '),
                Event::HardBreak | Event::Rule => current.push('\n'),
                Event::End(TagEnd::Paragraph)
                | Event::End(TagEnd::Item)
                | Event::End(TagEnd::CodeBlock) => current.push('\n'),
                _ => {}
            }
        }
        flush(&mut current, &section, &mut blocks);

        Ok(blocks)
    }
}

/// PDF: text extraction with page-break awareness
pub struct PdfParser;

impl FormatParser for PdfParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn parse(&self, filename: &str, data: &[u8]) -> Result<Vec<TextBlock>> {
        let content = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::parse(filename, format!("PDF extraction failed: {}", e)))?;

        let content = cleanup_pdf_text(&content);

        // pdf-extract emits form feeds between pages when the document
        // carries page boundaries; fall back to a single block otherwise
        let page_texts: Vec<&str> = content.split('\u{0c}').collect();

        if page_texts.len() > 1 {
            Ok(page_texts
                .iter()
                .enumerate()
                .map(|(i, page)| TextBlock {
                    block_id: 0,
                    text: page.to_string(),
                    locator: Locator {
                        page: Some(i as u32 + 1),
                        ..Default::default()
                    },
                })
                .collect())
        } else {
            let page = match lopdf::Document::load_mem(data) {
                Ok(doc) if doc.get_pages().len() == 1 => Some(1),
                _ => None,
            };
            Ok(vec![TextBlock {
                block_id: 0,
                text: content,
                locator: Locator {
                    page,
                    ..Default::default()
                },
            }])
        }
    }
}

/// Clean up PDF text: drop nulls, normalize typographic characters, trim lines
fn cleanup_pdf_text(text: &str) -> String {
    let text = text
        .replace('\0', "")
        .replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff");

    text.split('\u{0c}')
        .map(|page| {
            page.lines()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\u{0c}")
}

/// DOCX: paragraph walk over the document body
pub struct DocxParser;

impl FormatParser for DocxParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn parse(&self, filename: &str, data: &[u8]) -> Result<Vec<TextBlock>> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::parse(filename, e.to_string()))?;

        let mut content = String::new();

        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(vec![TextBlock::plain(content)])
    }
}

/// EPUB: zip of XHTML chapters, one block per chapter in spine order
pub struct EpubParser;

impl FormatParser for EpubParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Epub
    }

    fn parse(&self, filename: &str, data: &[u8]) -> Result<Vec<TextBlock>> {
        let cursor = std::io::Cursor::new(data);
        let mut archive = zip::ZipArchive::new(cursor)
            .map_err(|e| Error::parse(filename, format!("Not a valid EPUB archive: {}", e)))?;

        // Chapter documents live outside META-INF; reading-order manifests
        // name them with ascending numbers, so a name sort approximates the
        // spine order
        let mut chapter_names: Vec<String> = archive
            .file_names()
            .filter(|name| {
                let lower = name.to_lowercase();
                !lower.starts_with("meta-inf/")
                    && (lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm"))
            })
            .map(|s| s.to_string())
            .collect();
        chapter_names.sort();

        if chapter_names.is_empty() {
            return Err(Error::parse(filename, "EPUB contains no XHTML chapters"));
        }

        let mut blocks = Vec::new();

        for (i, name) in chapter_names.iter().enumerate() {
            let mut xml = String::new();
            if let Ok(mut file) = archive.by_name(name) {
                if file.read_to_string(&mut xml).is_err() {
                    continue;
                }
            }

            let chapter_text = extract_text_from_xhtml(&xml);
            if chapter_text.is_empty() {
                continue;
            }

            let stem = name
                .rsplit('/')
                .next()
                .unwrap_or(name)
                .trim_end_matches(".xhtml")
                .trim_end_matches(".html")
                .trim_end_matches(".htm");

            blocks.push(TextBlock {
                block_id: 0,
                text: chapter_text,
                locator: Locator {
                    page: Some(i as u32 + 1),
                    section: Some(stem.to_string()),
                    ..Default::default()
                },
            });
        }

        Ok(blocks)
    }
}

/// Extract visible text from one XHTML chapter
fn extract_text_from_xhtml(xml: &str) -> String {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"script" | b"style" | b"head") {
                    skip_depth += 1;
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"script" | b"style" | b"head") {
                    skip_depth = skip_depth.saturating_sub(1);
                }
                // Block-level elements end a line
                if skip_depth == 0
                    && matches!(
                        name.as_ref(),
                        b"p" | b"div" | b"li" | b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6"
                            | b"blockquote" | b"tr"
                    )
                {
                    text.push('\n');
                }
            }
            Ok(Event::Empty(e)) => {
                if skip_depth == 0 && e.local_name().as_ref() == b"br" {
                    text.push('\n');
                }
            }
            Ok(Event::Text(e)) => {
                if skip_depth == 0 {
                    if let Ok(t) = e.unescape() {
                        let t = t.trim();
                        if !t.is_empty() {
                            if !text.is_empty() && !text.ends_with('\n') {
                                text.push(' ');
                            }
                            text.push_str(t);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
