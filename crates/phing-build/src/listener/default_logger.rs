//! Console loggers

use super::{BuildEvent, BuildListener, BuildLogger, Priority};
use colored::{Color, Colorize};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Width of the right-aligned `[task]` column
const LEFT_COLUMN_SIZE: usize = 12;

/// Format an elapsed build time the way the summary line shows it
pub fn format_time(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs_f64();
    let minutes = (seconds / 60.0).floor();
    if minutes >= 1.0 {
        let rest = seconds - minutes * 60.0;
        format!(
            "{} minute{} {:.2} seconds",
            minutes as u64,
            if minutes as u64 == 1 { "" } else { "s" },
            rest
        )
    } else {
        format!("{:.4} seconds", seconds)
    }
}

/// The standard logger: target headers, `[task]` prefixed messages and a
/// final summary.
pub struct DefaultLogger {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    level: Priority,
    emacs: bool,
    color: bool,
    started: Option<Instant>,
}

impl DefaultLogger {
    /// Create a logger writing to stdout/stderr
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Create a logger with explicit output streams
    pub fn with_output(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            out,
            err,
            level: Priority::Info,
            emacs: false,
            color: false,
            started: None,
        }
    }

    /// Colour messages by priority
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Current output level
    pub fn level(&self) -> Priority {
        self.level
    }

    fn color_for(priority: Priority) -> Color {
        match priority {
            Priority::Error => Color::Red,
            Priority::Warn => Color::Magenta,
            Priority::Info => Color::Cyan,
            Priority::Verbose => Color::Green,
            Priority::Debug => Color::Blue,
        }
    }

    fn print(&mut self, message: &str, to_err: bool, priority: Priority) {
        let text = if self.color {
            message.color(Self::color_for(priority)).to_string()
        } else {
            message.to_string()
        };
        let stream = if to_err { &mut self.err } else { &mut self.out };
        // Logging must never fail the build.
        let _ = writeln!(stream, "{}", text);
        let _ = stream.flush();
    }

    fn target_header(&self, event: &BuildEvent) -> Option<String> {
        let target = event.target.as_deref().filter(|t| !t.is_empty())?;
        let description = match (&event.target_description, self.level >= Priority::Verbose) {
            (Some(desc), true) => format!(" [{}]", desc),
            _ => String::new(),
        };
        Some(format!("\n{} > {}{}:\n", event.project, target, description))
    }

    fn print_target_header(&mut self, event: &BuildEvent) {
        if self.level >= Priority::Info {
            if let Some(header) = self.target_header(event) {
                self.print(&header, false, Priority::Info);
            }
        }
    }

    fn print_message(&mut self, event: &BuildEvent) {
        if event.priority > self.level {
            return;
        }
        let mut line = String::new();
        if let (Some(task), false) = (&event.task, self.emacs) {
            line.push_str(&format!("{:>width$}", format!("[{}] ", task), width = LEFT_COLUMN_SIZE));
        }
        line.push_str(event.message.as_deref().unwrap_or_default());
        let to_err = event.priority == Priority::Error;
        self.print(&line, to_err, event.priority);
    }

    fn print_summary(&mut self, event: &BuildEvent) {
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        match &event.error {
            None => {
                let msg = format!("\nBUILD FINISHED\n\nTotal time: {}", format_time(elapsed));
                self.print(&msg, false, Priority::Verbose);
            }
            Some(error) => {
                let msg = format!(
                    "\nBUILD FAILED\n{}\n\nTotal time: {}",
                    error,
                    format_time(elapsed)
                );
                self.print(&msg, true, Priority::Error);
            }
        }
    }
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildListener for DefaultLogger {
    fn build_started(&mut self, _event: &BuildEvent) {
        self.started = Some(Instant::now());
    }

    fn build_finished(&mut self, event: &BuildEvent) {
        self.print_summary(event);
    }

    fn target_started(&mut self, event: &BuildEvent) {
        self.print_target_header(event);
    }

    fn target_finished(&mut self, _event: &BuildEvent) {}

    fn task_started(&mut self, _event: &BuildEvent) {}

    fn task_finished(&mut self, _event: &BuildEvent) {}

    fn message_logged(&mut self, event: &BuildEvent) {
        self.print_message(event);
    }
}

impl BuildLogger for DefaultLogger {
    fn set_message_output_level(&mut self, level: Priority) {
        self.level = level;
    }

    fn set_emacs_mode(&mut self, emacs: bool) {
        self.emacs = emacs;
    }
}

/// Default logger output coloured by message priority
pub struct AnsiColorLogger {
    inner: DefaultLogger,
}

impl AnsiColorLogger {
    /// Create a colour logger writing to stdout/stderr
    pub fn new() -> Self {
        Self {
            inner: DefaultLogger::new().with_color(true),
        }
    }

    /// Create a colour logger with explicit output streams
    pub fn with_output(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            inner: DefaultLogger::with_output(out, err).with_color(true),
        }
    }
}

impl Default for AnsiColorLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildListener for AnsiColorLogger {
    fn build_started(&mut self, event: &BuildEvent) {
        self.inner.build_started(event);
    }

    fn build_finished(&mut self, event: &BuildEvent) {
        self.inner.build_finished(event);
    }

    fn target_started(&mut self, event: &BuildEvent) {
        self.inner.target_started(event);
    }

    fn target_finished(&mut self, event: &BuildEvent) {
        self.inner.target_finished(event);
    }

    fn task_started(&mut self, event: &BuildEvent) {
        self.inner.task_started(event);
    }

    fn task_finished(&mut self, event: &BuildEvent) {
        self.inner.task_finished(event);
    }

    fn message_logged(&mut self, event: &BuildEvent) {
        self.inner.message_logged(event);
    }
}

impl BuildLogger for AnsiColorLogger {
    fn set_message_output_level(&mut self, level: Priority) {
        self.inner.set_message_output_level(level);
    }

    fn set_emacs_mode(&mut self, emacs: bool) {
        self.inner.set_emacs_mode(emacs);
    }
}

/// Prints a target header only once the target actually logs something
pub struct NoBannerLogger {
    inner: DefaultLogger,
    pending: Option<BuildEvent>,
}

impl NoBannerLogger {
    /// Create a logger writing to stdout/stderr
    pub fn new() -> Self {
        Self {
            inner: DefaultLogger::new(),
            pending: None,
        }
    }

    /// Create a logger with explicit output streams
    pub fn with_output(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            inner: DefaultLogger::with_output(out, err),
            pending: None,
        }
    }
}

impl Default for NoBannerLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildListener for NoBannerLogger {
    fn build_started(&mut self, event: &BuildEvent) {
        self.inner.build_started(event);
    }

    fn build_finished(&mut self, event: &BuildEvent) {
        self.inner.build_finished(event);
    }

    fn target_started(&mut self, event: &BuildEvent) {
        self.pending = Some(event.clone());
    }

    fn target_finished(&mut self, _event: &BuildEvent) {
        self.pending = None;
    }

    fn task_started(&mut self, _event: &BuildEvent) {}

    fn task_finished(&mut self, _event: &BuildEvent) {}

    fn message_logged(&mut self, event: &BuildEvent) {
        let visible = event.priority <= self.inner.level()
            && event.message.as_deref().is_some_and(|m| !m.trim().is_empty());
        if !visible {
            return;
        }
        if let Some(target_event) = self.pending.take() {
            self.inner.print_target_header(&target_event);
        }
        self.inner.message_logged(event);
    }
}

impl BuildLogger for NoBannerLogger {
    fn set_message_output_level(&mut self, level: Priority) {
        self.inner.set_message_output_level(level);
    }

    fn set_emacs_mode(&mut self, emacs: bool) {
        self.inner.set_emacs_mode(emacs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Buffer(Rc<RefCell<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    fn target_event(target: &str) -> BuildEvent {
        BuildEvent::new("demo").with_target(Some(target.to_string()))
    }

    fn task_message(task: &str, message: &str, priority: Priority) -> BuildEvent {
        target_event("build")
            .with_task(Some(task.to_string()))
            .with_message(message, priority)
    }

    #[test]
    fn test_format_time_seconds() {
        assert_eq!(format_time(Duration::from_millis(1500)), "1.5000 seconds");
    }

    #[test]
    fn test_format_time_minutes() {
        assert_eq!(format_time(Duration::from_secs(61)), "1 minute 1.00 seconds");
        assert_eq!(format_time(Duration::from_secs(125)), "2 minutes 5.00 seconds");
    }

    #[test]
    fn test_default_logger_task_column() {
        let out = Buffer::default();
        let err = Buffer::default();
        let mut logger = DefaultLogger::with_output(Box::new(out.clone()), Box::new(err.clone()));

        logger.target_started(&target_event("build"));
        logger.message_logged(&task_message("echo", "hello", Priority::Info));

        assert_eq!(out.contents(), "\ndemo > build:\n\n     [echo] hello\n");
        assert!(err.contents().is_empty());
    }

    #[test]
    fn test_default_logger_filters_by_level() {
        let out = Buffer::default();
        let mut logger = DefaultLogger::with_output(Box::new(out.clone()), Box::new(io::sink()));

        logger.message_logged(&task_message("echo", "hidden", Priority::Verbose));
        assert!(out.contents().is_empty());

        logger.set_message_output_level(Priority::Verbose);
        logger.message_logged(&task_message("echo", "shown", Priority::Verbose));
        assert!(out.contents().contains("shown"));
    }

    #[test]
    fn test_default_logger_errors_go_to_err_stream() {
        let out = Buffer::default();
        let err = Buffer::default();
        let mut logger = DefaultLogger::with_output(Box::new(out.clone()), Box::new(err.clone()));

        logger.message_logged(&task_message("exec", "boom", Priority::Error));
        assert!(out.contents().is_empty());
        assert_eq!(err.contents(), "     [exec] boom\n");
    }

    #[test]
    fn test_default_logger_emacs_mode() {
        let out = Buffer::default();
        let mut logger = DefaultLogger::with_output(Box::new(out.clone()), Box::new(io::sink()));
        logger.set_emacs_mode(true);

        logger.message_logged(&task_message("echo", "plain", Priority::Info));
        assert_eq!(out.contents(), "plain\n");
    }

    #[test]
    fn test_default_logger_summary() {
        let out = Buffer::default();
        let err = Buffer::default();
        let mut logger = DefaultLogger::with_output(Box::new(out.clone()), Box::new(err.clone()));

        logger.build_started(&BuildEvent::new("demo"));
        logger.build_finished(&BuildEvent::new("demo"));
        assert!(out.contents().starts_with("\nBUILD FINISHED\n\nTotal time: "));

        logger.build_finished(&BuildEvent::new("demo").with_error(Some("bad".to_string())));
        assert!(err.contents().starts_with("\nBUILD FAILED\nbad\n"));
    }

    #[test]
    fn test_no_banner_logger_skips_quiet_targets() {
        let out = Buffer::default();
        let mut logger = NoBannerLogger::with_output(Box::new(out.clone()), Box::new(io::sink()));

        logger.target_started(&target_event("quiet"));
        logger.target_finished(&target_event("quiet"));
        assert!(out.contents().is_empty());

        logger.target_started(&target_event("build"));
        logger.message_logged(&task_message("echo", "hi", Priority::Info));
        logger.message_logged(&task_message("echo", "again", Priority::Info));

        let text = out.contents();
        assert_eq!(text.matches("demo > build:").count(), 1);
        assert!(text.contains("[echo] again"));
    }
}
