//! Markdown compiler with pluggable backend and span processors.

use std::fmt::Write;
use std::marker::PhantomData;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::backend::{AlertKind, RenderBackend};
use crate::code_block::{CodeBlockProcessor, MathProcessor, ProcessResult, fence_language};
use crate::placeholder::{PlaceholderId, PlaceholderSpan};
use crate::state::{CodeBlockState, HeadingState, ImageState, TableState, escape_html};
use crate::util::heading_level_to_num;

/// Default limit on nested block and inline elements.
pub const DEFAULT_MAX_NESTING: usize = 128;

/// Options accepted by the markdown compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompilerOptions {
    /// GitHub Flavored Markdown: tables, strikethrough, task lists, alerts.
    pub gfm: bool,
    /// Recognize `$...$` and `$$...$$` math spans.
    pub math: bool,
    /// Add a line-number gutter to code blocks.
    pub line_numbers: bool,
    /// Maximum element nesting depth before compilation fails.
    pub max_nesting: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            gfm: true,
            math: true,
            line_numbers: false,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

/// Per-call overrides of [`CompilerOptions`]. `None` keeps the configured value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompilerOverrides {
    pub gfm: Option<bool>,
    pub math: Option<bool>,
    pub line_numbers: Option<bool>,
    pub max_nesting: Option<usize>,
}

impl CompilerOptions {
    /// Merge `overrides` over these options.
    #[must_use]
    pub fn with_overrides(self, overrides: &CompilerOverrides) -> Self {
        Self {
            gfm: overrides.gfm.unwrap_or(self.gfm),
            math: overrides.math.unwrap_or(self.math),
            line_numbers: overrides.line_numbers.unwrap_or(self.line_numbers),
            max_nesting: overrides.max_nesting.unwrap_or(self.max_nesting),
        }
    }

    /// Parser options for these settings.
    #[must_use]
    pub fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        if self.gfm {
            options |= Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_GFM;
        }
        if self.math {
            options |= Options::ENABLE_MATH;
        }
        options
    }
}

/// Fatal compilation error.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Document nests elements deeper than the configured limit.
    #[error("document nesting exceeds the limit of {limit} levels")]
    NestingTooDeep { limit: usize },
}

/// Output of one compile pass.
#[derive(Clone, Debug, Default)]
pub struct CompiledDocument {
    /// Compiled HTML, possibly containing placeholder tokens.
    pub html: String,
    /// Byte spans of every placeholder token in `html`, in document order.
    pub placeholders: Vec<PlaceholderSpan>,
}

/// Markdown compiler with pluggable backend.
///
/// Uses the [`RenderBackend`] trait to delegate element markup while handling
/// document structure generically. Code blocks and math spans are offered to
/// the registered processors; a processor that defers a span returns a
/// placeholder, and the compiler records the token's byte span.
pub struct MarkdownRenderer<'p, B: RenderBackend> {
    options: CompilerOptions,
    output: String,
    placeholders: Vec<PlaceholderSpan>,
    depth: usize,
    code: CodeBlockState,
    table: TableState,
    image: ImageState,
    heading: HeadingState,
    pending_image: Option<(String, String)>,
    code_processor: Option<Box<dyn CodeBlockProcessor + 'p>>,
    math_processor: Option<Box<dyn MathProcessor + 'p>>,
    /// Stack of alert kinds for nested blockquotes (regular blockquote uses None).
    alert_stack: Vec<Option<AlertKind>>,
    _backend: PhantomData<B>,
}

impl<'p, B: RenderBackend> MarkdownRenderer<'p, B> {
    #[must_use]
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            output: String::with_capacity(4096),
            placeholders: Vec::new(),
            depth: 0,
            code: CodeBlockState::default(),
            table: TableState::default(),
            image: ImageState::default(),
            heading: HeadingState::default(),
            pending_image: None,
            code_processor: None,
            math_processor: None,
            alert_stack: Vec::new(),
            _backend: PhantomData,
        }
    }

    /// Set the processor consulted for every code block.
    #[must_use]
    pub fn with_code_processor<P: CodeBlockProcessor + 'p>(mut self, processor: P) -> Self {
        self.code_processor = Some(Box::new(processor));
        self
    }

    /// Set the processor consulted for every math span.
    #[must_use]
    pub fn with_math_processor<P: MathProcessor + 'p>(mut self, processor: P) -> Self {
        self.math_processor = Some(Box::new(processor));
        self
    }

    /// Compile markdown text with parser options derived from the compiler options.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if the document cannot be compiled.
    pub fn render_markdown(&mut self, markdown: &str) -> Result<CompiledDocument, CompileError> {
        let parser = Parser::new_ext(markdown, self.options.parser_options());
        self.render(parser)
    }

    /// Compile markdown events.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::NestingTooDeep`] when elements nest deeper than
    /// `max_nesting`.
    pub fn render<'a, I>(&mut self, events: I) -> Result<CompiledDocument, CompileError>
    where
        I: Iterator<Item = Event<'a>>,
    {
        for event in events {
            self.process_event(event)?;
        }

        Ok(CompiledDocument {
            html: std::mem::take(&mut self.output),
            placeholders: std::mem::take(&mut self.placeholders),
        })
    }

    /// Push content to output or heading buffer based on context.
    ///
    /// Markup inside image alt text is dropped; only its text is kept.
    fn push_inline(&mut self, content: &str) {
        if self.image.is_active() {
            return;
        }
        if self.heading.is_active() {
            self.heading.push_html(content);
        } else {
            self.output.push_str(content);
        }
    }

    /// Push a placeholder token, recording its span.
    fn push_placeholder(&mut self, id: PlaceholderId) {
        if self.heading.is_active() {
            self.heading.push_placeholder(id);
        } else {
            let token = id.token();
            let start = self.output.len();
            self.output.push_str(&token);
            self.placeholders.push(PlaceholderSpan {
                id,
                range: start..self.output.len(),
            });
        }
    }

    fn process_event(&mut self, event: Event<'_>) -> Result<(), CompileError> {
        match event {
            Event::Start(tag) => {
                self.depth += 1;
                if self.depth > self.options.max_nesting {
                    return Err(CompileError::NestingTooDeep {
                        limit: self.options.max_nesting,
                    });
                }
                self.start_tag(tag);
            }
            Event::End(tag) => {
                self.depth = self.depth.saturating_sub(1);
                self.end_tag(tag);
            }
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::InlineMath(expression) => self.math(&expression, false),
            Event::DisplayMath(expression) => self.math(&expression, true),
            Event::Html(html) | Event::InlineHtml(html) => self.raw_html(&html),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => self.hard_break(),
            Event::Rule => self.horizontal_rule(),
            Event::TaskListMarker(checked) => self.task_list_marker(checked),
            Event::FootnoteReference(_) => {
                // Not supported
            }
        }
        Ok(())
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.output.push_str("<p>"),
            Tag::Heading { level, .. } => {
                // Opening tag is written in end_tag after we have the ID
                self.heading.start_heading(heading_level_to_num(level));
            }
            Tag::BlockQuote(kind) => {
                if let Some(bq_kind) = kind {
                    let alert_kind = AlertKind::from(bq_kind);
                    self.alert_stack.push(Some(alert_kind));
                    B::alert_start(alert_kind, &mut self.output);
                } else {
                    self.alert_stack.push(None);
                    B::blockquote_start(&mut self.output);
                }
            }
            Tag::CodeBlock(kind) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(ref info) => fence_language(info).map(str::to_owned),
                    CodeBlockKind::Indented => None,
                };
                self.code.start(lang);
            }
            Tag::List(start) => match start {
                Some(1) => self.output.push_str("<ol>"),
                Some(n) => write!(self.output, r#"<ol start="{n}">"#).unwrap(),
                None => self.output.push_str("<ul>"),
            },
            Tag::Item => self.output.push_str("<li>"),
            Tag::FootnoteDefinition(_) | Tag::HtmlBlock | Tag::MetadataBlock(_) => {}
            Tag::DefinitionList => self.output.push_str("<dl>"),
            Tag::DefinitionListTitle => self.output.push_str("<dt>"),
            Tag::DefinitionListDefinition => self.output.push_str("<dd>"),
            Tag::Table(alignments) => {
                self.table.start(alignments);
                self.output.push_str("<table>");
            }
            Tag::TableHead => {
                self.table.start_head();
                self.output.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                self.table.start_row();
                self.output.push_str("<tr>");
            }
            Tag::TableCell => {
                let align = self.table.current_alignment_style();
                let tag = if self.table.is_in_head() { "th" } else { "td" };
                write!(self.output, "<{tag}{align}>").unwrap();
            }
            Tag::Emphasis => self.push_inline("<em>"),
            Tag::Strong => self.push_inline("<strong>"),
            Tag::Strikethrough => self.push_inline("<s>"),
            Tag::Link { dest_url, .. } => {
                let link_tag = format!(r#"<a href="{}">"#, escape_html(&dest_url));
                self.push_inline(&link_tag);
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                // Start collecting alt text; image will be rendered in end_tag
                self.image.start();
                self.pending_image = Some((dest_url.to_string(), title.to_string()));
            }
            Tag::Superscript => self.push_inline("<sup>"),
            Tag::Subscript => self.push_inline("<sub>"),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.output.push_str("</p>"),
            TagEnd::Heading(_level) => {
                if let Some(heading) = self.heading.complete_heading() {
                    let spans = heading.write_into(&mut self.output);
                    self.placeholders.extend(spans);
                }
            }
            TagEnd::BlockQuote(_) => match self.alert_stack.pop() {
                Some(Some(alert_kind)) => B::alert_end(alert_kind, &mut self.output),
                _ => B::blockquote_end(&mut self.output),
            },
            TagEnd::CodeBlock => self.end_code_block(),
            TagEnd::List(ordered) => {
                self.output
                    .push_str(if ordered { "</ol>" } else { "</ul>" });
            }
            TagEnd::Item => self.output.push_str("</li>"),
            TagEnd::FootnoteDefinition | TagEnd::HtmlBlock | TagEnd::MetadataBlock(_) => {}
            TagEnd::Image => {
                let alt = self.image.end();
                if let Some((src, title)) = self.pending_image.take() {
                    let mut img = String::new();
                    B::image(&src, &alt, &title, &mut img);
                    self.push_inline(&img);
                }
            }
            TagEnd::DefinitionList => self.output.push_str("</dl>"),
            TagEnd::DefinitionListTitle => self.output.push_str("</dt>"),
            TagEnd::DefinitionListDefinition => self.output.push_str("</dd>"),
            TagEnd::Table => self.output.push_str("</tbody></table>"),
            TagEnd::TableHead => {
                self.output.push_str("</tr></thead><tbody>");
                self.table.end_head();
            }
            TagEnd::TableRow => self.output.push_str("</tr>"),
            TagEnd::TableCell => {
                self.output.push_str(if self.table.is_in_head() {
                    "</th>"
                } else {
                    "</td>"
                });
                self.table.next_cell();
            }
            TagEnd::Emphasis => self.push_inline("</em>"),
            TagEnd::Strong => self.push_inline("</strong>"),
            TagEnd::Strikethrough => self.push_inline("</s>"),
            TagEnd::Link => self.push_inline("</a>"),
            TagEnd::Superscript => self.push_inline("</sup>"),
            TagEnd::Subscript => self.push_inline("</sub>"),
        }
    }

    fn end_code_block(&mut self) {
        let (lang, content) = self.code.end();
        let gutter_lines = self
            .options
            .line_numbers
            .then(|| content.lines().count());

        let result = match self.code_processor.as_mut() {
            Some(processor) => processor.process(lang.as_deref(), &content),
            None => ProcessResult::PassThrough,
        };

        match result {
            ProcessResult::Placeholder(id) => {
                B::code_block_start(lang.as_deref(), gutter_lines.is_some(), &mut self.output);
                self.push_placeholder(id);
                B::code_block_end(gutter_lines, &mut self.output);
            }
            ProcessResult::Inline(html) => {
                B::code_block_start(lang.as_deref(), gutter_lines.is_some(), &mut self.output);
                self.output.push_str(&html);
                B::code_block_end(gutter_lines, &mut self.output);
            }
            ProcessResult::PassThrough => {
                B::code_block(lang.as_deref(), &content, gutter_lines, &mut self.output);
            }
        }
    }

    fn math(&mut self, expression: &str, display: bool) {
        if self.image.is_active() {
            self.image.push_str(expression);
            return;
        }
        if self.heading.is_active() {
            self.heading.push_text(expression);
        }

        let result = match self.math_processor.as_mut() {
            Some(processor) => processor.process_math(expression, display),
            None => ProcessResult::PassThrough,
        };

        match result {
            ProcessResult::Placeholder(id) => self.push_placeholder(id),
            ProcessResult::Inline(html) => self.push_inline(&html),
            ProcessResult::PassThrough => {
                let mut html = String::new();
                B::math(expression, display, &mut html);
                self.push_inline(&html);
            }
        }
    }

    fn text(&mut self, text: &str) {
        if self.code.is_active() {
            self.code.push_str(text);
        } else if self.image.is_active() {
            self.image.push_str(text);
        } else if self.heading.is_active() {
            self.heading.push_text(text);
            self.heading.push_html(&escape_html(text));
        } else {
            self.output.push_str(&escape_html(text));
        }
    }

    fn inline_code(&mut self, code: &str) {
        if self.image.is_active() {
            self.image.push_str(code);
            return;
        }
        if self.heading.is_active() {
            self.heading.push_text(code);
        }
        let html = format!("<code>{}</code>", escape_html(code));
        self.push_inline(&html);
    }

    fn raw_html(&mut self, html: &str) {
        self.push_inline(html);
    }

    fn soft_break(&mut self) {
        if self.image.is_active() {
            self.image.push_str(" ");
        } else {
            self.push_inline("\n");
        }
    }

    fn hard_break(&mut self) {
        let mut html = String::new();
        B::hard_break(&mut html);
        self.push_inline(&html);
    }

    fn horizontal_rule(&mut self) {
        B::horizontal_rule(&mut self.output);
    }

    fn task_list_marker(&mut self, checked: bool) {
        B::task_list_marker(checked, &mut self.output);
    }
}

impl<B: RenderBackend> Default for MarkdownRenderer<'_, B> {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}
