//! relgraph CLI - Command-line interface
//!
//! Usage:
//!   relgraph extract [--conllu PATH | --json PATH | TEXT]
//!   relgraph normalize <path> [--sheet NAME] [--relation R]... [--domain D]... [--export CSV]
//!   relgraph graph <path> [--focus NODE] [--hops N] [--min-degree N] [--max-nodes N]
//!                  [--relation R]... [--domain D]... [--export CSV]
//!   relgraph rules [--rules PATH]
//!   relgraph health
//!
//! Results go to stdout as JSON. Failures print an error report to stderr.
//! `health` always prints its report and exits non-zero when not ok.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use relgraph_core::{AppConfig, LoggingConfig, RelgraphError, Result, Triple};
use relgraph_extractor::{
    ConlluSource, DocumentSource, JsonSource, LazySource, RuleBasedExtractor, RuleSet,
    TripleExtractor,
};
use relgraph_graph::{GraphQuery, GraphView, KnowledgeGraph};
use relgraph_parser::{normalize, parse_path, write_triples_to_path};

#[derive(Parser)]
#[command(name = "relgraph")]
#[command(about = "Rule-based triple extraction and knowledge graph views")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); RELGRAPH_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract triples from text or a pre-annotated document
    Extract {
        /// Read a CoNLL-U document
        #[arg(long, conflicts_with_all = ["json", "text"])]
        conllu: Option<PathBuf>,
        /// Read a JSON document
        #[arg(long, conflicts_with = "text")]
        json: Option<PathBuf>,
        /// Rule file replacing the built-in rules
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Raw text, annotated by the configured annotator
        text: Option<String>,
    },
    /// Convert a CSV/TSV/Excel table into triples
    Normalize {
        path: PathBuf,
        /// Worksheet to read (Excel only)
        #[arg(long)]
        sheet: Option<String>,
        #[command(flatten)]
        filter: TripleFilterArgs,
    },
    /// Build a graph from a table or a JSON triple list and print a view
    Graph {
        path: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        /// Centre node of an ego network
        #[arg(long)]
        focus: Option<String>,
        #[arg(long)]
        hops: Option<usize>,
        #[arg(long, allow_negative_numbers = true)]
        min_degree: Option<i64>,
        #[arg(long)]
        max_nodes: Option<usize>,
        /// Keep only these nodes (repeatable)
        #[arg(long = "node")]
        nodes: Vec<String>,
        #[command(flatten)]
        filter: TripleFilterArgs,
    },
    /// List the compiled extraction rules
    Rules {
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Check that the annotator can be initialized
    Health,
}

/// Triple selection shared by `normalize` and `graph`
#[derive(Args, Debug, Default)]
struct TripleFilterArgs {
    /// Keep only triples with this relation (repeatable)
    #[arg(long = "relation")]
    relations: Vec<String>,
    /// Keep only triples in this domain (repeatable)
    #[arg(long = "domain")]
    domains: Vec<String>,
    /// Also write the selected triples to this CSV file
    #[arg(long)]
    export: Option<PathBuf>,
}

/// Command result: what to print and whether the process succeeded
#[derive(Debug)]
struct Output {
    body: String,
    success: bool,
}

impl Output {
    fn ok(body: String) -> Self {
        Self {
            body,
            success: true,
        }
    }
}

#[derive(Serialize)]
struct RulesReport<'a> {
    patterns: Vec<&'a str>,
    dependency_verbs: Vec<&'a str>,
}

#[derive(Serialize)]
struct HealthReport {
    ok: bool,
    error: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => exit_with(&err),
    };
    init_tracing(&config.logging);

    match run(cli.command, &config) {
        Ok(output) => {
            println!("{}", output.body);
            if !output.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(err) => {
            tracing::error!(code = err.category(), error = %err, "command failed");
            exit_with(&err)
        }
    }
}

fn exit_with(err: &RelgraphError) -> ! {
    let report = err.to_report();
    match serde_json::to_string(&report) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{}: {}", report.code, report.message),
    }
    std::process::exit(1)
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// Log to stderr so stdout stays machine-readable
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(command: Commands, config: &AppConfig) -> Result<Output> {
    match command {
        Commands::Extract {
            conllu,
            json,
            rules,
            text,
        } => {
            let rules = load_rules(rules.as_deref().or(config.extraction.rules_file.as_deref()))?;
            let (source, input): (Arc<dyn DocumentSource>, String) = match (conllu, json, text) {
                (Some(path), _, _) => (Arc::new(ConlluSource), std::fs::read_to_string(path)?),
                (_, Some(path), _) => (Arc::new(JsonSource), std::fs::read_to_string(path)?),
                (_, _, Some(text)) => (
                    Arc::new(LazySource::command(config.extraction.clone())),
                    text,
                ),
                _ => return Err(RelgraphError::Validation("text is required".to_string())),
            };
            let extractor = RuleBasedExtractor::new(source, Arc::new(rules));
            to_json(&extractor.extract(&input)?).map(Output::ok)
        }
        Commands::Normalize {
            path,
            sheet,
            filter,
        } => {
            let table = parse_path(&path, sheet.as_deref())?;
            let query = GraphQuery::from_config(&config.graph)
                .with_relations(filter.relations)
                .with_domains(filter.domains);
            let triples = query.select_triples(&normalize(&table)?);
            export(filter.export.as_deref(), &triples)?;
            to_json(&triples).map(Output::ok)
        }
        Commands::Graph {
            path,
            sheet,
            focus,
            hops,
            min_degree,
            max_nodes,
            nodes,
            filter,
        } => {
            let triples = load_triples(&path, sheet.as_deref())?;
            let query = graph_query(config, focus, hops, min_degree, max_nodes, nodes)
                .with_relations(filter.relations)
                .with_domains(filter.domains);
            let selected = query.select_triples(&triples);
            export(filter.export.as_deref(), &selected)?;

            let graph = KnowledgeGraph::from_triples(&selected);
            to_json(&GraphView::from_graph(&query.apply(&graph))).map(Output::ok)
        }
        Commands::Rules { rules } => {
            let rules = load_rules(rules.as_deref().or(config.extraction.rules_file.as_deref()))?;
            let report = RulesReport {
                patterns: rules.labels().collect(),
                dependency_verbs: rules
                    .dependency()
                    .map(|d| d.verbs.keys().map(String::as_str).collect())
                    .unwrap_or_default(),
            };
            to_json(&report).map(Output::ok)
        }
        Commands::Health => {
            let report = health(config)?;
            Ok(Output {
                body: to_json(&report)?,
                success: report.ok,
            })
        }
    }
}

/// Try to initialize the annotator; a failure becomes part of the report
fn health(config: &AppConfig) -> Result<HealthReport> {
    let rules = load_rules(config.extraction.rules_file.as_deref())?;
    let source = Arc::new(LazySource::command(config.extraction.clone()));
    let extractor = RuleBasedExtractor::new(source, Arc::new(rules));

    Ok(match extractor.health() {
        Ok(()) => HealthReport {
            ok: true,
            error: None,
        },
        Err(err) => {
            tracing::warn!(source = extractor.source_name(), error = %err, "annotator unavailable");
            HealthReport {
                ok: false,
                error: Some(err.to_string()),
            }
        }
    })
}

fn export(path: Option<&Path>, triples: &[Triple]) -> Result<()> {
    match path {
        Some(path) => Ok(write_triples_to_path(path, triples)?),
        None => Ok(()),
    }
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet> {
    match path {
        Some(path) => RuleSet::from_file(path),
        None => RuleSet::builtin(),
    }
}

/// Triples from a JSON list (as printed by `extract`) or a table file
fn load_triples(path: &Path, sheet: Option<&str>) -> Result<Vec<Triple>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| RelgraphError::Parse(format!("{}: {e}", path.display())))
    } else {
        normalize(&parse_path(path, sheet)?)
    }
}

fn graph_query(
    config: &AppConfig,
    focus: Option<String>,
    hops: Option<usize>,
    min_degree: Option<i64>,
    max_nodes: Option<usize>,
    nodes: Vec<String>,
) -> GraphQuery {
    let mut query = GraphQuery::from_config(&config.graph).with_nodes(nodes);
    if let Some(focus) = focus {
        query = query.with_focus(focus, hops.unwrap_or(config.graph.focus_hops));
    }
    if let Some(min_degree) = min_degree {
        query = query.with_min_degree(min_degree);
    }
    if let Some(max_nodes) = max_nodes {
        query = query.with_max_nodes(max_nodes);
    }
    query
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| RelgraphError::Other(e.into()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_inputs_conflict() {
        let result = Cli::try_parse_from(["relgraph", "extract", "--conllu", "a.conllu", "text"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["relgraph", "extract", "Curie won the prize."]).unwrap();
        assert!(matches!(cli.command, Commands::Extract { text: Some(_), .. }));
    }

    #[test]
    fn test_graph_arguments() {
        let cli = Cli::try_parse_from([
            "relgraph",
            "graph",
            "triples.csv",
            "--focus",
            "Einstein",
            "--min-degree",
            "-1",
            "--node",
            "A",
            "--node",
            "B",
            "--config",
            "relgraph.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("relgraph.toml")));
        match cli.command {
            Commands::Graph {
                focus,
                min_degree,
                nodes,
                ..
            } => {
                assert_eq!(focus.as_deref(), Some("Einstein"));
                assert_eq!(min_degree, Some(-1));
                assert_eq!(nodes, vec!["A", "B"]);
            }
            _ => panic!("expected graph command"),
        }
    }

    #[test]
    fn test_graph_query_overrides_config() {
        let config = AppConfig::default();
        let query = graph_query(&config, Some("X".to_string()), None, Some(2), None, vec![]);

        assert_eq!(query.focus.as_deref(), Some("X"));
        assert_eq!(query.hops, config.graph.focus_hops);
        assert_eq!(query.min_degree, 2);
        assert_eq!(query.max_nodes, config.graph.max_nodes);
    }

    #[test]
    fn test_extract_without_input_is_validation_error() {
        let command = Commands::Extract {
            conllu: None,
            json: None,
            rules: None,
            text: None,
        };
        let err = run(command, &AppConfig::default()).unwrap_err();
        assert_eq!(err.category(), "validation_error");
    }

    #[test]
    fn test_graph_from_json_triples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triples.json");
        let triples = vec![
            Triple::new("A", "knows", "B"),
            Triple::new("A", "knows", "B"),
        ];
        std::fs::write(&path, serde_json::to_string(&triples).unwrap()).unwrap();

        let output = run(
            Commands::Graph {
                path,
                sheet: None,
                focus: None,
                hops: None,
                min_degree: None,
                max_nodes: None,
                nodes: vec![],
                filter: TripleFilterArgs::default(),
            },
            &AppConfig::default(),
        )
        .unwrap();

        let view: serde_json::Value = serde_json::from_str(&output.body).unwrap();
        assert_eq!(view["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(view["edges"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_rules_listing() {
        let output = run(Commands::Rules { rules: None }, &AppConfig::default()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&output.body).unwrap();

        assert_eq!(report["patterns"][0], "discovered");
        assert_eq!(report["dependency_verbs"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_health_without_annotator() {
        let output = run(Commands::Health, &AppConfig::default()).unwrap();
        assert!(!output.success);

        let report: serde_json::Value = serde_json::from_str(&output.body).unwrap();
        assert_eq!(report["ok"], false);
        assert!(report["error"]
            .as_str()
            .unwrap()
            .contains("no annotator command configured"));
    }

    #[test]
    fn test_health_reports_missing_annotator_binary() {
        let mut config = AppConfig::default();
        config.extraction.annotator_command = Some("/nonexistent/annotator".to_string());

        let output = run(Commands::Health, &config).unwrap();
        assert!(!output.success);
        let report: serde_json::Value = serde_json::from_str(&output.body).unwrap();
        assert_eq!(report["ok"], false);
        assert!(report["error"].as_str().unwrap().contains("/nonexistent/annotator"));

        // extraction fails the same way instead of retrying the process
        let err = run(
            Commands::Extract {
                conllu: None,
                json: None,
                rules: None,
                text: Some("Curie won the prize.".to_string()),
            },
            &config,
        )
        .unwrap_err();
        assert_eq!(err.category(), "initialization_error");
    }

    #[cfg(unix)]
    #[test]
    fn test_health_ok_with_runnable_annotator() {
        let mut config = AppConfig::default();
        config.extraction.annotator_command = Some("cat".to_string());

        let output = run(Commands::Health, &config).unwrap();
        assert!(output.success);
        let report: serde_json::Value = serde_json::from_str(&output.body).unwrap();
        assert_eq!(report["ok"], true);
        assert!(report["error"].is_null());
    }

    #[test]
    fn test_filter_arguments_are_repeatable() {
        let cli = Cli::try_parse_from([
            "relgraph",
            "normalize",
            "triples.csv",
            "--relation",
            "won_award",
            "--relation",
            "born_in",
            "--domain",
            "physics",
            "--export",
            "out.csv",
        ])
        .unwrap();

        match cli.command {
            Commands::Normalize { filter, .. } => {
                assert_eq!(filter.relations, vec!["won_award", "born_in"]);
                assert_eq!(filter.domains, vec!["physics"]);
                assert_eq!(filter.export, Some(PathBuf::from("out.csv")));
            }
            _ => panic!("expected normalize command"),
        }
    }

    #[test]
    fn test_normalize_filters_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dataset.csv");
        std::fs::write(
            &input,
            "entity_1,relation,entity_2,domain\n\
             Marie Curie,won_award,Nobel Prize,chemistry\n\
             Marie Curie,born_in,Warsaw,chemistry\n\
             Albert Einstein,won_award,Nobel Prize,physics\n",
        )
        .unwrap();
        let export = dir.path().join("filtered.csv");

        let output = run(
            Commands::Normalize {
                path: input,
                sheet: None,
                filter: TripleFilterArgs {
                    relations: vec!["won_award".to_string()],
                    domains: vec!["chemistry".to_string()],
                    export: Some(export.clone()),
                },
            },
            &AppConfig::default(),
        )
        .unwrap();

        let triples: Vec<Triple> = serde_json::from_str(&output.body).unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].subject, "Marie Curie");
        assert_eq!(triples[0].object, "Nobel Prize");

        let exported = normalize(&parse_path(&export, None).unwrap()).unwrap();
        assert_eq!(exported, triples);
    }

    #[test]
    fn test_graph_filters_and_trims_focus() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triples.json");
        let triples = vec![
            Triple::new("A", "knows", "B"),
            Triple::new("A", "cites", "C"),
            Triple::new("D", "knows", "E"),
        ];
        std::fs::write(&path, serde_json::to_string(&triples).unwrap()).unwrap();
        let export = dir.path().join("selected.csv");

        let output = run(
            Commands::Graph {
                path,
                sheet: None,
                focus: Some("  A ".to_string()),
                hops: None,
                min_degree: None,
                max_nodes: None,
                nodes: vec![],
                filter: TripleFilterArgs {
                    relations: vec!["knows".to_string()],
                    domains: vec![],
                    export: Some(export.clone()),
                },
            },
            &AppConfig::default(),
        )
        .unwrap();

        let view: serde_json::Value = serde_json::from_str(&output.body).unwrap();
        let ids: Vec<&str> = view["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["A", "B"]);

        // export holds the relation-filtered triples, not just the ego view
        let exported = normalize(&parse_path(&export, None).unwrap()).unwrap();
        assert_eq!(exported, vec![triples[0].clone(), triples[2].clone()]);
    }
}
