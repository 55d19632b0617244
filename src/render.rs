// src/render.rs
//! Render Layer: markdown to HTML with highlighted code blocks, per-message
//! actions, and the cancellable character-by-character reveal.

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::sync::Arc;
use std::time::Duration;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{Message, Role};
use crate::view::ChatView;

pub const REVEAL_INTERVAL: Duration = Duration::from_millis(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAction {
    Copy,
    Redo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub role: Role,
    /// Raw markdown, what the Copy action puts on the clipboard.
    pub source: String,
    pub html: String,
    pub actions: Vec<MessageAction>,
}

pub struct MarkdownRenderer {
    syntaxes: SyntaxSet,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }

    pub fn render_message(&self, message: &Message) -> RenderedMessage {
        let actions = match message.role {
            Role::Ai => vec![MessageAction::Copy, MessageAction::Redo],
            Role::User => Vec::new(),
        };
        RenderedMessage {
            role: message.role,
            source: message.content.clone(),
            html: self.render_markdown(&message.content),
            actions,
        }
    }

    pub fn render_markdown(&self, text: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut events = Vec::new();
        let mut code_block: Option<(String, String)> = None;

        for event in Parser::new_ext(text, options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().unwrap_or("").to_string()
                        }
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        events.push(Event::Html(self.highlight_block(&lang, &code).into()));
                    }
                }
                Event::Text(content) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&content);
                    }
                }
                // Model output is untrusted, so raw HTML is shown as text.
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                other => events.push(other),
            }
        }

        let mut out = String::with_capacity(text.len() * 2);
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn highlight_block(&self, lang: &str, code: &str) -> String {
        let syntax = if lang.is_empty() {
            None
        } else {
            self.syntaxes.find_syntax_by_token(lang)
        };
        let class = if lang.is_empty() {
            String::new()
        } else {
            format!(" class=\"language-{}\"", escape_html(lang))
        };

        let body = match syntax {
            Some(syntax) => {
                let mut generator =
                    ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, ClassStyle::Spaced);
                let highlighted = LinesWithEndings::from(code)
                    .try_for_each(|line| generator.parse_html_for_line_which_includes_newline(line));
                match highlighted {
                    Ok(()) => generator.finalize(),
                    Err(e) => {
                        tracing::debug!("Highlighting failed for {}: {}", lang, e);
                        escape_html(code)
                    }
                }
            }
            None => escape_html(code),
        };

        format!("<pre><code{}>{}</code></pre>\n", class, body)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// A running reveal animation. Dropping the handle does not stop it; call `cancel`.
#[derive(Debug)]
pub struct RevealHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RevealHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!("Reveal task ended abnormally: {}", e);
        }
    }
}

/// Reveals `message` one character per `interval` into the view, then swaps
/// in the rendered markup. Once cancelled the task writes nothing more.
pub fn spawn_reveal(
    view: Arc<dyn ChatView>,
    renderer: Arc<MarkdownRenderer>,
    message: Message,
    interval: Duration,
) -> RevealHandle {
    let token = CancellationToken::new();
    let child = token.clone();

    let task = tokio::spawn(async move {
        if child.is_cancelled() {
            return;
        }
        let mut ticker = tokio::time::interval(interval);
        view.begin_reveal();

        for ch in message.content.chars() {
            tokio::select! {
                _ = child.cancelled() => {
                    tracing::debug!("Reveal cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }
            if child.is_cancelled() {
                return;
            }
            view.reveal_char(ch);
            view.scroll_to_bottom();
        }

        if child.is_cancelled() {
            return;
        }
        let rendered = renderer.render_message(&message);
        view.finish_reveal(&rendered);
    });

    RevealHandle { token, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::testing::{RecordingView, ViewEvent};

    #[test]
    fn test_code_block_is_highlighted_with_language_class() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render_markdown("```python\ndef add(a, b):\n    return a + b\n```\n");

        assert!(html.contains("<pre><code class=\"language-python\">"));
        assert!(html.contains("<span class=\""));
        assert!(html.contains("add"));
    }

    #[test]
    fn test_unknown_language_is_escaped_verbatim() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render_markdown("```nosuchlang\na < b && c\n```\n");

        assert!(html.contains("<pre><code class=\"language-nosuchlang\">a &lt; b &amp;&amp; c\n</code></pre>"));
    }

    #[test]
    fn test_explanation_heading_and_lists() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render_markdown("## Explanation\n\n- step one\n- step two\n");

        assert!(html.contains("<h2>Explanation</h2>"));
        assert!(html.contains("<li>step one</li>"));
    }

    #[test]
    fn test_raw_html_is_not_passed_through() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render_markdown("<script>alert(1)</script>\n");

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_only_ai_messages_get_actions() {
        let renderer = MarkdownRenderer::new();
        assert!(renderer.render_message(&Message::user("hi")).actions.is_empty());
        assert_eq!(
            renderer.render_message(&Message::ai("hi")).actions,
            vec![MessageAction::Copy, MessageAction::Redo]
        );
    }

    #[tokio::test]
    async fn test_reveal_writes_every_char_then_renders() {
        let view = Arc::new(RecordingView::default());
        let handle = spawn_reveal(
            view.clone(),
            Arc::new(MarkdownRenderer::new()),
            Message::ai("# Hi"),
            Duration::from_millis(1),
        );
        handle.join().await;

        assert_eq!(view.revealed(), "# Hi");
        assert_eq!(*view.scrolls.lock().unwrap(), 4);
        assert_eq!(
            view.events(),
            vec![ViewEvent::BeginReveal, ViewEvent::Finish("# Hi".to_string())]
        );
    }

    #[tokio::test]
    async fn test_reveal_cancelled_before_first_poll_writes_nothing() {
        let view = Arc::new(RecordingView::default());
        let handle = spawn_reveal(
            view.clone(),
            Arc::new(MarkdownRenderer::new()),
            Message::ai("never shown"),
            Duration::from_millis(1),
        );
        handle.cancel();
        handle.join().await;

        assert!(view.events().is_empty());
        assert_eq!(view.revealed(), "");
        assert_eq!(*view.scrolls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_reveal_stops_writing() {
        let view = Arc::new(RecordingView::default());
        let handle = spawn_reveal(
            view.clone(),
            Arc::new(MarkdownRenderer::new()),
            Message::ai("a long answer that takes a while"),
            Duration::from_millis(15),
        );

        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.cancel();
        let written = view.revealed();
        handle.join().await;

        assert_eq!(view.revealed(), written);
        assert!(written.len() < "a long answer that takes a while".len());
        assert!(!view
            .events()
            .iter()
            .any(|e| matches!(e, ViewEvent::Finish(_))));
    }
}
