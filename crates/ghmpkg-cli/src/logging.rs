use std::{fmt, io};

use nu_ansi_term::Color::{Blue, Cyan, DarkGray, Magenta, Red, Yellow};
use tracing::{field::Field, Event, Level, Metadata, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, MakeWriter},
    registry::LookupSpan,
    EnvFilter,
};

use crate::{cli::Args, utils::Colored};

/// Log targets of every crate in the workspace share this prefix.
const TARGET_PREFIX: &str = "ghmpkg";

/// Overrides the verbosity flags with a full filter directive.
const FILTER_ENV: &str = "GHMPKG_LOG";

/// Message and artifact fields of one event.
#[derive(Default)]
struct EventFields {
    message: Option<String>,
    package: Option<String>,
    version: Option<String>,
    file: Option<String>,
    extra: Vec<(&'static str, String)>,
}

impl tracing::field::Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }
}

impl EventFields {
    fn record(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "package" => self.package = Some(value),
            "version" => self.version = Some(value),
            "file" => self.file = Some(value),
            name => self.extra.push((name, value)),
        }
    }

    /// `package@version/file`, with whichever parts the event carried.
    fn artifact(&self) -> Option<String> {
        let package = self.package.as_deref()?;
        let mut artifact = package.to_string();
        if let Some(version) = &self.version {
            artifact.push('@');
            artifact.push_str(version);
        }
        if let Some(file) = &self.file {
            artifact.push('/');
            artifact.push_str(file);
        }
        Some(artifact)
    }
}

/// Plain-text format: level tag, message, the artifact the event is about, then any
/// remaining fields as `key=value`.
pub struct CustomFormatter;

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = EventFields::default();
        event.record(&mut fields);

        match *event.metadata().level() {
            Level::TRACE => write!(writer, "{} ", Colored(Magenta, "[TRACE]"))?,
            Level::DEBUG => write!(writer, "{} ", Colored(Blue, "[DEBUG]"))?,
            Level::INFO => {}
            Level::WARN => write!(writer, "{} ", Colored(Yellow, "[WARN]"))?,
            Level::ERROR => write!(writer, "{} ", Colored(Red, "[ERROR]"))?,
        }

        write!(writer, "{}", fields.message.as_deref().unwrap_or_default())?;
        if let Some(artifact) = fields.artifact() {
            write!(writer, " {}", Colored(Cyan, artifact))?;
        }
        for (name, value) in &fields.extra {
            write!(writer, " {}", Colored(DarkGray, format!("{name}={value}")))?;
        }
        writeln!(writer)
    }
}

/// Routes log lines around the progress bars.
///
/// Plain output sends `INFO` to stdout and everything else to stderr. With `--json`
/// every line goes to stderr so stdout only carries the report.
#[derive(Clone, Copy)]
struct LogWriter {
    json: bool,
}

/// Buffers one formatted event and prints it with the progress bars suspended.
struct SuspendingWriter {
    buffer: Vec<u8>,
    use_stderr: bool,
}

impl io::Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SuspendingWriter {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let output = String::from_utf8_lossy(&self.buffer);
        let output = output.trim_end_matches('\n');
        let use_stderr = self.use_stderr;
        crate::progress::suspend(|| {
            if use_stderr {
                eprintln!("{output}");
            } else {
                println!("{output}");
            }
        });
    }
}

impl LogWriter {
    fn to_stderr(&self, level: &Level) -> bool {
        self.json || *level != Level::INFO
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = SuspendingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendingWriter {
            buffer: Vec::new(),
            use_stderr: self.json,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SuspendingWriter {
            buffer: Vec::new(),
            use_stderr: self.to_stderr(meta.level()),
        }
    }
}

fn filter_level(args: &Args) -> Level {
    if args.quiet {
        Level::ERROR
    } else if args.verbose >= 2 {
        Level::TRACE
    } else if args.verbose == 1 {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

fn env_filter(args: &Args) -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("{TARGET_PREFIX}={}", filter_level(args))))
}

pub fn setup_logging(args: &Args) {
    let writer = LogWriter {
        json: args.json,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(args))
        .with_writer(writer)
        .without_time();

    let subscriber: Box<dyn Subscriber + Send + Sync> = if args.json {
        Box::new(
            builder
                .json()
                .with_ansi(false)
                .with_target(true)
                .flatten_event(true)
                .finish(),
        )
    } else {
        Box::new(builder.event_format(CustomFormatter).finish())
    };

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {err}");
    }
}
