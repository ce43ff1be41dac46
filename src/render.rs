//! Incremental rendering of streamed model output.
//!
//! Every fragment is appended to a [`RenderBuffer`] and the whole buffer is
//! reparsed and repainted.  Nothing is diffed: frame *k* depends only on the
//! first *k* fragments of the current generation.

use std::io::{self, IsTerminal, Stdout, Write};
use std::time::{Duration, Instant};

use futures::StreamExt;
use termimad::MadSkin;
use termimad::crossterm::cursor::MoveTo;
use termimad::crossterm::queue;
use termimad::crossterm::terminal::{Clear, ClearType};

use crate::backend::TokenStream;
use crate::error::{Error, Result};
use crate::observability::{
    RENDER_DURATION, RENDER_ERRORS, RENDER_FRAGMENTS, RENDER_GENERATIONS, RENDER_REPAINTS,
    RENDER_TTFF,
};
use crate::sink::CaptureSink;

/// Default pause between repaints.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(20);

/// Append-only accumulation of one generation's fragments.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderBuffer {
    text: String,
    fragments: usize,
}

impl RenderBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one fragment.
    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    /// The concatenation of every fragment seen so far.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// How many fragments have been appended.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Consumes the buffer, returning its text.
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Trait for painting streamed output.
///
/// This abstraction allows for different rendering strategies:
/// - styled markdown on a terminal
/// - raw text for `--no-color` or redirected output
/// - recording frames in tests
pub trait Renderer: Send {
    /// Erase the previous frame and paint `text` from scratch.
    fn repaint(&mut self, text: &str) -> Result<()>;

    /// Called once a generation ends, successfully or not.
    fn finish(&mut self) -> Result<()>;

    /// Print an informational line outside of any generation.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);
}

/// Drains `stream` into `renderer`, repainting after every fragment.
///
/// Sleeps `refresh_delay` after each repaint.  Once the stream is exhausted the
/// full text is appended to `sink` exactly once, even when it is empty.  If the
/// stream fails, the sink is left untouched and the error is returned.
pub async fn render_stream<R: Renderer + ?Sized>(
    renderer: &mut R,
    mut stream: TokenStream<'_>,
    refresh_delay: Duration,
    sink: Option<&CaptureSink>,
) -> Result<String> {
    RENDER_GENERATIONS.click();
    let start = Instant::now();
    let mut buffer = RenderBuffer::new();

    while let Some(fragment) = stream.next().await {
        let fragment = match fragment {
            Ok(fragment) => fragment,
            Err(err) => {
                RENDER_ERRORS.click();
                tracing::warn!(fragments = buffer.fragments(), error = %err, "generation failed mid-stream");
                renderer.finish()?;
                return Err(err);
            }
        };
        if buffer.fragments() == 0 {
            RENDER_TTFF.add(start.elapsed().as_secs_f64());
        }
        RENDER_FRAGMENTS.click();
        buffer.push(&fragment);
        renderer.repaint(buffer.as_str())?;
        RENDER_REPAINTS.click();
        if !refresh_delay.is_zero() {
            tokio::time::sleep(refresh_delay).await;
        }
    }
    renderer.finish()?;
    RENDER_DURATION.add(start.elapsed().as_secs_f64());
    tracing::debug!(fragments = buffer.fragments(), bytes = buffer.as_str().len(), "generation drained");

    let text = buffer.into_string();
    if let Some(sink) = sink {
        sink.append(&text)?;
    }
    Ok(text)
}

/// Renders the buffer as markdown with `termimad`, or as raw text.
///
/// On a terminal each repaint clears the screen and homes the cursor.  When the
/// output is not a terminal, only the final frame is written.
pub struct MarkdownRenderer<W: Write + Send = Stdout> {
    out: W,
    skin: MadSkin,
    use_color: bool,
    erase_frames: bool,
    pending: Option<String>,
}

impl MarkdownRenderer<Stdout> {
    /// Creates a renderer on stdout with markdown styling enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a renderer on stdout with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        let stdout = io::stdout();
        let erase_frames = stdout.is_terminal();
        Self::with_writer(stdout, use_color, erase_frames)
    }
}

impl Default for MarkdownRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> MarkdownRenderer<W> {
    /// Creates a renderer on an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool, erase_frames: bool) -> Self {
        Self {
            out,
            skin: MadSkin::default(),
            use_color,
            erase_frames,
            pending: None,
        }
    }

    /// Consumes the renderer, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&mut self, text: &str) -> io::Result<()> {
        if self.use_color {
            write!(self.out, "{}", self.skin.term_text(text))?;
        } else {
            self.out.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                self.out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn repaint_frame(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        self.paint(text)?;
        self.out.flush()
    }
}

impl<W: Write + Send> Renderer for MarkdownRenderer<W> {
    fn repaint(&mut self, text: &str) -> Result<()> {
        if !self.erase_frames {
            self.pending = Some(text.to_string());
            return Ok(());
        }
        self.repaint_frame(text)
            .map_err(|err| Error::io("failed to repaint frame", err))
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(text) = self.pending.take() {
            self.paint(&text)
                .map_err(|err| Error::io("failed to write output", err))?;
        }
        self.out
            .flush()
            .map_err(|err| Error::io("failed to flush output", err))
    }

    fn print_info(&mut self, info: &str) {
        let _ = writeln!(self.out, "{info}");
        let _ = self.out.flush();
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("Error: {error}");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::stream;

    /// Records every frame instead of painting it.
    #[derive(Default)]
    pub(crate) struct RecordingRenderer {
        pub(crate) frames: Vec<String>,
        pub(crate) finishes: usize,
        pub(crate) info: Vec<String>,
        pub(crate) errors: Vec<String>,
    }

    impl Renderer for RecordingRenderer {
        fn repaint(&mut self, text: &str) -> Result<()> {
            self.frames.push(text.to_string());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finishes += 1;
            Ok(())
        }

        fn print_info(&mut self, info: &str) {
            self.info.push(info.to_string());
        }

        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }
    }

    fn tokens(fragments: &[&str]) -> TokenStream<'static> {
        let items: Vec<Result<String>> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn every_frame_is_the_prefix_concatenation() {
        let fragments = ["# Title", "\n\nSome ", "*bold*", " text", "."];
        let mut renderer = RecordingRenderer::default();

        let text = render_stream(&mut renderer, tokens(&fragments), Duration::ZERO, None)
            .await
            .unwrap();

        assert_eq!(renderer.frames.len(), fragments.len());
        for (k, frame) in renderer.frames.iter().enumerate() {
            assert_eq!(frame, &fragments[..=k].concat());
        }
        assert_eq!(text, fragments.concat());
        assert_eq!(renderer.finishes, 1);
    }

    #[tokio::test]
    async fn sink_receives_full_text_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CaptureSink::new(dir.path().join("out.md"));
        let mut renderer = RecordingRenderer::default();

        render_stream(&mut renderer, tokens(&["a", "b", "c"]), Duration::ZERO, Some(&sink))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(sink.path()).unwrap(), "abc");
    }

    #[tokio::test]
    async fn empty_stream_still_writes_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CaptureSink::new(dir.path().join("out.md"));
        let mut renderer = RecordingRenderer::default();

        let text = render_stream(&mut renderer, tokens(&[]), Duration::ZERO, Some(&sink))
            .await
            .unwrap();

        assert_eq!(text, "");
        assert!(renderer.frames.is_empty());
        assert!(sink.path().exists());
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap(), "");
    }

    #[tokio::test]
    async fn failed_stream_skips_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CaptureSink::new(dir.path().join("out.md"));
        let mut renderer = RecordingRenderer::default();
        let items: Vec<Result<String>> = vec![
            Ok("partial".to_string()),
            Err(Error::generation("connection reset", None)),
            Ok("never".to_string()),
        ];

        let err = render_stream(
            &mut renderer,
            Box::pin(stream::iter(items)),
            Duration::ZERO,
            Some(&sink),
        )
        .await
        .unwrap_err();

        assert!(err.is_generation());
        assert_eq!(renderer.frames, vec!["partial".to_string()]);
        assert_eq!(renderer.finishes, 1);
        assert!(!sink.path().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn repaints_are_throttled() {
        let mut renderer = RecordingRenderer::default();
        let start = tokio::time::Instant::now();

        render_stream(
            &mut renderer,
            tokens(&["a", "b", "c"]),
            Duration::from_millis(20),
            None,
        )
        .await
        .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn plain_frames_clear_then_paint() {
        let mut renderer = MarkdownRenderer::with_writer(Vec::new(), false, true);
        renderer.repaint("one").unwrap();
        renderer.repaint("one two").unwrap();
        renderer.finish().unwrap();

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        let frames: Vec<&str> = out.split("\x1b[2J").filter(|f| !f.is_empty()).collect();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].ends_with("one\n"));
        assert!(frames[1].ends_with("one two\n"));
    }

    #[test]
    fn unerased_output_writes_final_frame_only() {
        let mut renderer = MarkdownRenderer::with_writer(Vec::new(), false, false);
        renderer.repaint("one").unwrap();
        renderer.repaint("one two").unwrap();
        renderer.finish().unwrap();

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, "one two\n");
    }

    #[test]
    fn styled_output_drops_markdown_markers() {
        let mut renderer = MarkdownRenderer::with_writer(Vec::new(), true, false);
        renderer.repaint("**bold**").unwrap();
        renderer.finish().unwrap();

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(out.contains("bold"));
        assert!(!out.contains("**"));
    }

    #[test]
    fn buffer_counts_fragments() {
        let mut buffer = RenderBuffer::new();
        buffer.push("a");
        buffer.push("");
        buffer.push("b");
        assert_eq!(buffer.as_str(), "ab");
        assert_eq!(buffer.fragments(), 3);
    }
}
