// src/core/engine.rs
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{depth_from_int, Config, JobConfig};
use crate::error::{self, ExtractError};
use super::{
    call_sites, write_file_atomic, DocumentCache, Emitter, ExtractionReport, RecursiveExpander,
    SelectionCriteria, Selector, StagedFile,
};

/// Parameters of one extraction; unset values fall back to the configuration
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub function_names: Vec<String>,
    pub function_patterns: Vec<String>,
    pub line_patterns: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub recursion_depth: Option<usize>,
    pub fail_on_empty: Option<bool>,
    pub report: Option<PathBuf>,
}

impl ExtractionRequest {
    pub fn from_job(job: &JobConfig) -> error::Result<Self> {
        Ok(Self {
            input: job.input.clone(),
            output: job.output.clone(),
            function_names: job.functions.clone(),
            function_patterns: job.function_patterns.clone(),
            line_patterns: job.line_patterns.clone(),
            ignore_patterns: job.ignore_patterns.clone(),
            recursion_depth: job.recursion_depth.map(depth_from_int).transpose()?,
            fail_on_empty: job.fail_on_empty,
            report: job.report.clone(),
        })
    }
}

/// Stage counters of one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub functions_parsed: usize,
    pub selected: usize,
    pub expanded: usize,
    pub external: usize,
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub extracted_count: usize,
    pub output: PathBuf,
    pub stats: ExtractionStats,
}

/// Main orchestration engine: one document in, one reduced document out
pub struct Engine {
    config: Config,
    cache: DocumentCache,
    selector: Selector,
}

impl Engine {
    /// Create a new engine instance from a configuration file (or defaults)
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path).context("Failed to load configuration")?;
        debug!("Loaded configuration: {:?}", config);
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        let selector = Selector::new(config.defaults.ignored_names_log_limit);
        Self {
            config,
            cache: DocumentCache::new(),
            selector,
        }
    }

    /// Run one extraction; nothing is written unless every stage succeeds
    pub fn extract(&mut self, request: &ExtractionRequest) -> error::Result<ExtractionOutcome> {
        let defaults = &self.config.defaults;
        let recursion_depth = match request.recursion_depth {
            Some(depth) => depth,
            None => depth_from_int(defaults.recursion_depth)?,
        };
        let fail_on_empty = request.fail_on_empty.unwrap_or(defaults.fail_on_empty);
        let output = request
            .output
            .clone()
            .unwrap_or_else(|| defaults.default_output_for(&request.input));
        let ignore_patterns: Vec<String> = defaults
            .ignore_patterns
            .iter()
            .chain(&request.ignore_patterns)
            .cloned()
            .collect();

        let criteria = SelectionCriteria::new(
            &request.function_names,
            &request.function_patterns,
            &request.line_patterns,
            &ignore_patterns,
            recursion_depth,
        )?;

        info!("📖 Reading {}", request.input.display());
        let loaded = self.cache.load(&request.input)?;
        let doc = loaded.document();
        info!(
            "Parsed {} function definitions ({} top-level entities{})",
            doc.function_count(),
            doc.entities().len(),
            if loaded.from_cache { ", cached" } else { "" }
        );

        let selection = self.selector.select(doc, &criteria);
        let selected = selection.len();
        info!("🎯 Selected {} function(s) directly", selected);

        let selection = if recursion_depth > 0 {
            info!("🔗 Expanding calls up to depth {}...", recursion_depth);
            let (expanded, expansion) =
                RecursiveExpander::new(criteria.recursion_depth).expand(&loaded.graph, &criteria, selection);
            debug!(
                "expansion added {} function(s) ({:?} per depth), skipped {} ignored callee(s), analysed calls of {} function(s)",
                expansion.total_added(),
                expansion.added_per_depth,
                expansion.ignored_callees,
                loaded.graph.memoized_count()
            );
            expanded
        } else {
            selection
        };

        let stats = ExtractionStats {
            functions_parsed: doc.function_count(),
            selected,
            expanded: selection.len() - selected,
            external: selection.external().len(),
        };
        info!(
            "Expansion added {} function(s), {} external callee(s) left as declarations",
            stats.expanded, stats.external
        );

        if selection.is_empty() {
            if fail_on_empty {
                return Err(ExtractError::EmptySelection);
            }
            warn!("no functions to extract, output will contain only the preamble");
        }

        let rendered = Emitter::render(doc, &selection);

        // The report is staged first so a bad report path leaves no output behind
        let staged_report = match &request.report {
            Some(report_path) => {
                let report = ExtractionReport::new(
                    &request.input,
                    &output,
                    &loaded.content_hash,
                    recursion_depth,
                    doc,
                    &selection,
                );
                Some((report_path, StagedFile::stage(report_path, &report.to_json()?)?))
            }
            None => None,
        };

        write_file_atomic(&output, &rendered)?;
        info!("📝 Wrote {} function(s) to {}", selection.len(), output.display());

        if let Some((report_path, staged)) = staged_report {
            staged.commit()?;
            info!("Wrote extraction report to {}", report_path.display());
        }

        Ok(ExtractionOutcome {
            extracted_count: selection.len(),
            output,
            stats,
        })
    }

    /// Run configured jobs, all of them or only `only`
    pub fn run_jobs(&mut self, only: Option<&str>) -> Result<Vec<ExtractionOutcome>> {
        let jobs: Vec<JobConfig> = match only {
            Some(name) => vec![self
                .config
                .job(name)
                .cloned()
                .ok_or_else(|| ExtractError::Config(format!("no job named '{}' in configuration", name)))?],
            None => self.config.jobs.clone(),
        };

        if jobs.is_empty() {
            return Err(ExtractError::Config("configuration defines no jobs".to_string()).into());
        }

        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in &jobs {
            info!("▶ Running job '{}'", job.name);
            let request = ExtractionRequest::from_job(job)?;
            let outcome = self
                .extract(&request)
                .with_context(|| format!("job '{}' failed", job.name))?;
            outcomes.push(outcome);
        }
        debug!("{} distinct input(s) parsed for {} job(s)", self.cache.len(), jobs.len());
        Ok(outcomes)
    }

    /// Describe the call layers reachable from `names` without writing anything
    pub fn graph(&mut self, input: &Path, names: &[String], depth: usize) -> error::Result<String> {
        let criteria = SelectionCriteria::new(names, &[], &[], &[], depth)?;
        let loaded = self.cache.load(input)?;
        let doc = loaded.document();

        let initial = self.selector.select(doc, &criteria);
        let (selection, _) =
            RecursiveExpander::new(criteria.recursion_depth).expand(&loaded.graph, &criteria, initial);

        let mut out = String::new();
        for name in selection.in_document_order(doc) {
            let (Some(func), Some(level)) = (doc.function(name), selection.depth_of(name)) else {
                continue;
            };
            let _ = writeln!(out, "[{}] {}", level, name);
            for site in call_sites(doc, func) {
                let marker = if doc.contains(&site.callee) { "" } else { " [external]" };
                let _ = writeln!(
                    out,
                    "    -> {} (line {}, {:?}){}",
                    site.callee, site.line, site.kind, marker
                );
            }
        }
        Ok(out)
    }

    /// Write a default configuration file
    pub fn init(&self, path: &Path) -> Result<()> {
        if path.exists() {
            return Err(ExtractError::Config(format!("{} already exists", path.display())).into());
        }
        Config::default()
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Created configuration file {}", path.display());
        Ok(())
    }
}
