use dotenvy::dotenv;
use multimodal_slack_bot::bot::runner::run_bot;
use multimodal_slack_bot::config::Settings;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    slack_token: Regex,
    openai_key: Regex,
    api_key_header: Regex,
    bearer: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            slack_token: Regex::new(r"xox[bpa]-[A-Za-z0-9-]+|xapp-[A-Za-z0-9-]+")?,
            openai_key: Regex::new(r"sk-[A-Za-z0-9_-]{8,}")?,
            api_key_header: Regex::new(r#"(?i)("?api-key"?\s*[:=]\s*"?)[^"\s,}]+"#)?,
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .slack_token
            .replace_all(&output, "[SLACK_TOKEN]")
            .to_string();
        output = self
            .openai_key
            .replace_all(&output, "[OPENAI_KEY]")
            .to_string();
        output = self
            .api_key_header
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output = self.bearer.replace_all(&output, "${1}[MASKED]").to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length, the redacted text may be shorter or longer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Both reqwest and the Slack connector use rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting multimodal Slack bot...");

    let settings = init_settings();

    if let Err(e) = run_bot(settings).await {
        error!("Bot terminated: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn debug_mode() -> bool {
    std::env::var("DEBUG_MODE")
        .is_ok_and(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1"))
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let default_level = if debug_mode() {
        "debug"
    } else {
        "info,hyper=warn,reqwest=warn,slack_morphism=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    let settings = match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Provider selection is fatal if unresolved
    if let Err(e) = settings.provider_credentials() {
        error!("Failed to load configuration: {}", e);
        std::process::exit(1);
    }

    info!("Configuration loaded successfully.");
    settings
}
