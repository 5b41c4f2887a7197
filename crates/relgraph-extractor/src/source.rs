//! Document sources
//!
//! A document source turns raw text into an `AnnotatedDocument`. The
//! annotation pipeline itself lives outside this crate; sources here either
//! read an already annotated form or talk to an external annotator process.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::document::AnnotatedDocument;
use relgraph_core::{ExtractionConfig, RelgraphError, Result};

/// Trait for producers of annotated documents
pub trait DocumentSource: Send + Sync {
    /// Annotate raw text
    fn annotate(&self, text: &str) -> Result<AnnotatedDocument>;

    /// Source name for logging
    fn name(&self) -> &str;

    /// Report whether the source is usable
    fn ready(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Pre-annotated input
// ============================================================================

/// Treats its input as CoNLL-U produced elsewhere
#[derive(Debug, Clone, Copy, Default)]
pub struct ConlluSource;

impl DocumentSource for ConlluSource {
    fn annotate(&self, text: &str) -> Result<AnnotatedDocument> {
        AnnotatedDocument::from_conllu(text)
    }

    fn name(&self) -> &str {
        "conllu"
    }
}

/// Treats its input as the JSON document form
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSource;

impl DocumentSource for JsonSource {
    fn annotate(&self, text: &str) -> Result<AnnotatedDocument> {
        AnnotatedDocument::from_json(text)
    }

    fn name(&self) -> &str {
        "json"
    }
}

// ============================================================================
// External annotator process
// ============================================================================

/// Pipes text through an external annotator that prints CoNLL-U
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    executable: PathBuf,
    args: Vec<String>,
    model: Option<PathBuf>,
}

impl CommandSource {
    /// Validate the annotator configuration
    ///
    /// Fails when no program is configured, the program cannot be found as
    /// an executable (directly or on `PATH`) or the configured model file is
    /// missing.
    pub fn initialize(config: &ExtractionConfig) -> Result<Self> {
        let program = config
            .annotator_command
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                RelgraphError::Initialization("no annotator command configured".to_string())
            })?;

        let executable = which::which(&program).map_err(|e| {
            RelgraphError::Initialization(format!("annotator {program} not found: {e}"))
        })?;

        if let Some(model) = &config.annotator_model {
            if !model.exists() {
                return Err(RelgraphError::Initialization(format!(
                    "annotator model not found: {}",
                    model.display()
                )));
            }
        }

        tracing::info!(program = %program, path = %executable.display(), "annotator configured");
        Ok(Self {
            program,
            executable,
            args: config.annotator_args.clone(),
            model: config.annotator_model.clone(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl DocumentSource for CommandSource {
    fn annotate(&self, text: &str) -> Result<AnnotatedDocument> {
        let mut command = Command::new(&self.executable);
        command.args(&self.args);
        if let Some(model) = &self.model {
            command.arg(model);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RelgraphError::Annotation(format!("failed to start {}: {e}", self.program))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RelgraphError::Annotation("annotator stdin unavailable".to_string()))?;
        let input = text.to_string();
        // feed stdin from a separate thread so a chatty annotator cannot
        // block on a full stdout pipe
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| RelgraphError::Annotation(format!("annotator failed: {e}")))?;
        writer
            .join()
            .map_err(|_| RelgraphError::Annotation("annotator input writer panicked".to_string()))?
            .map_err(|e| RelgraphError::Annotation(format!("writing annotator input: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RelgraphError::Annotation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| RelgraphError::Annotation(format!("annotator output not UTF-8: {e}")))?;
        AnnotatedDocument::from_conllu(&stdout)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

// ============================================================================
// One-time initialization
// ============================================================================

type Initializer = Box<dyn Fn() -> Result<Arc<dyn DocumentSource>> + Send + Sync>;

/// A source built on first use
///
/// The initializer runs at most once. A failure is remembered and every
/// later call reports the same initialization error without retrying.
pub struct LazySource {
    name: String,
    init: Initializer,
    cell: OnceCell<std::result::Result<Arc<dyn DocumentSource>, String>>,
}

impl LazySource {
    pub fn new<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn DocumentSource>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            init: Box::new(init),
            cell: OnceCell::new(),
        }
    }

    /// Lazy wrapper around `CommandSource::initialize`
    pub fn command(config: ExtractionConfig) -> Self {
        Self::new("annotator", move || {
            let source: Arc<dyn DocumentSource> = Arc::new(CommandSource::initialize(&config)?);
            Ok(source)
        })
    }

    /// Whether initialization has been attempted
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    fn resolve(&self) -> Result<&Arc<dyn DocumentSource>> {
        let state = self.cell.get_or_init(|| match (self.init)() {
            Ok(source) => {
                tracing::info!(source = %self.name, "document source initialized");
                Ok(source)
            }
            Err(err) => {
                let message = match err {
                    RelgraphError::Initialization(message) => message,
                    other => other.to_string(),
                };
                tracing::warn!(source = %self.name, error = %message, "document source failed to initialize");
                Err(message)
            }
        });

        state
            .as_ref()
            .map_err(|message| RelgraphError::Initialization(message.clone()))
    }
}

impl std::fmt::Debug for LazySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazySource")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl DocumentSource for LazySource {
    fn annotate(&self, text: &str) -> Result<AnnotatedDocument> {
        self.resolve()?.annotate(text)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn ready(&self) -> Result<()> {
        self.resolve()?.ready()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_lazy_source_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let source = LazySource::new("test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let inner: Arc<dyn DocumentSource> = Arc::new(ConlluSource);
            Ok(inner)
        });

        assert!(!source.is_initialized());
        source.annotate("1 Hi hi INTJ UH _ 0 ROOT _ _").unwrap();
        source.annotate("1 Hi hi INTJ UH _ 0 ROOT _ _").unwrap();
        assert!(source.ready().is_ok());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_source_caches_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let source = LazySource::new("broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RelgraphError::Initialization("model en_core missing".to_string()))
        });

        for _ in 0..3 {
            let err = source.annotate("text").unwrap_err();
            match err {
                RelgraphError::Initialization(message) => {
                    assert_eq!(message, "model en_core missing")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(source.ready().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_command_source_requires_program() {
        let err = CommandSource::initialize(&ExtractionConfig::default()).unwrap_err();
        assert_eq!(err.category(), "initialization_error");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_checks_model() {
        let config = ExtractionConfig {
            annotator_command: Some("cat".to_string()),
            annotator_model: Some(PathBuf::from("/nonexistent/english.udpipe")),
            ..Default::default()
        };
        let err = CommandSource::initialize(&config).unwrap_err();
        assert!(err.to_string().contains("english.udpipe"));
    }

    #[test]
    fn test_lazy_command_source_reports_missing_config() {
        let source = LazySource::command(ExtractionConfig::default());
        let err = source.ready().unwrap_err();
        assert!(matches!(err, RelgraphError::Initialization(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_reads_conllu_from_process() {
        let config = ExtractionConfig {
            annotator_command: Some("cat".to_string()),
            ..Default::default()
        };
        let source = CommandSource::initialize(&config).unwrap();
        let doc = source
            .annotate("1 Curie Curie PROPN NNP _ 0 ROOT _ NER=B-PERSON\n")
            .unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.entity_text(0), "Curie");
    }

    #[test]
    fn test_command_source_missing_program_fails_initialization() {
        let config = ExtractionConfig {
            annotator_command: Some("/nonexistent/annotator-binary".to_string()),
            ..Default::default()
        };
        let err = CommandSource::initialize(&config).unwrap_err();
        assert_eq!(err.category(), "initialization_error");
        assert!(err.to_string().contains("annotator-binary"));
    }

    #[test]
    fn test_lazy_command_source_caches_missing_program() {
        let source = LazySource::command(ExtractionConfig {
            annotator_command: Some("/nonexistent/annotator-binary".to_string()),
            ..Default::default()
        });

        let first = source.ready().unwrap_err();
        assert_eq!(first.category(), "initialization_error");
        assert!(source.is_initialized());

        let second = source.annotate("Curie won the prize.").unwrap_err();
        assert_eq!(second.category(), "initialization_error");
        assert_eq!(second.to_string(), first.to_string());
    }
}
