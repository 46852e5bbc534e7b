// src/classify.rs
//! Classification engine primitives: config types, regex compilation, the
//! tiered category decision, and the thread-safe handle with dev hot reload.
//!
//! The engine is pure: `classify` reads the ticket and the compiled rule set
//! and returns a category, no I/O and no clock. All patterns are compiled
//! once at load time; a pattern that does not compile fails the whole load.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PipelineError;
use crate::groups::{GroupMap, GroupRule};
use crate::products::{ProductCatalog, ProductsSection};
use crate::ticket::{Category, Ticket};

// --- env defaults & names ---
pub const DEFAULT_CLASSIFIER_CONFIG_PATH: &str = "config/classifier.toml";
pub const DEFAULT_DETAIL_THRESHOLD: u32 = 15;

pub const ENV_CLASSIFIER_CONFIG_PATH: &str = "CLASSIFIER_CONFIG_PATH";
pub const ENV_DETAIL_THRESHOLD: &str = "TRACKER_DETAIL_THRESHOLD";

// Dev logging gate: TICKET_DEV_LOG=1 AND dev env (debug or APP_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("TICKET_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("APP_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

// Short stable id for a subject so diagnostics never carry ticket text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Minimal, anonymized dev logger for classification events.
fn dev_log_classification(ticket: &Ticket, decision: &Classification) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(&ticket.subject);
    // Never log raw subjects or actions. Only hashed id + rule metadata.
    info!(
        target: "classify",
        %id,
        ticket_id = ticket.id,
        tier = decision.tier.as_str(),
        category = %decision.category,
        rule = decision.rule_id.as_deref().unwrap_or("-"),
        "classified"
    );
}

// parse optional env override for the detail threshold
fn parse_threshold_env(raw: Option<String>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierRoot {
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub action_rules: Vec<ActionRuleCfg>,
    #[serde(default)]
    pub subject_rules: Vec<SubjectGroupCfg>,
    #[serde(default)]
    pub groups: Vec<GroupRule>,
    #[serde(default)]
    pub products: ProductsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSection {
    /// The full category vocabulary. Every category referenced anywhere in
    /// the config must appear here (or be the fallback).
    pub categories: Vec<String>,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    /// Counts strictly above this produce per-subject detail rows.
    #[serde(default = "default_detail_threshold")]
    pub detail_threshold: u32,
    /// Product values meaning "nothing was selected", compared
    /// case-insensitively after trimming.
    #[serde(default = "default_no_value_markers")]
    pub no_value_markers: Vec<String>,
}

fn default_fallback_category() -> String {
    Category::OTHER.to_string()
}

fn default_detail_threshold() -> u32 {
    DEFAULT_DETAIL_THRESHOLD
}

fn default_no_value_markers() -> Vec<String> {
    ["", "no value", "no_value", "none", "n/a", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionRuleCfg {
    pub id: String,
    pub category: String,
    pub pattern: String, // regex, compiled case-insensitive
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectGroupCfg {
    pub category: String,
    /// Evaluated in order within the group; groups themselves are evaluated
    /// in declaration order, first match anywhere wins.
    pub patterns: Vec<String>,
}

/* ----------------------------
Compiled engine structures
---------------------------- */

#[derive(Debug)]
struct CompiledActionRule {
    id: String,
    category: Category,
    re: Regex,
}

#[derive(Debug)]
struct CompiledSubjectRule {
    id: String,
    category: Category,
    re: Regex,
}

/// Which lookup produced a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Resolved by the group map before the tiered engine ran.
    DispositiveGroup,
    ActionTaken,
    ExistingProduct,
    SubjectPattern,
    GroupFallback,
    Default,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::DispositiveGroup => "dispositive_group",
            Tier::ActionTaken => "action_taken",
            Tier::ExistingProduct => "existing_product",
            Tier::SubjectPattern => "subject_pattern",
            Tier::GroupFallback => "group_fallback",
            Tier::Default => "default",
        }
    }
}

/// One classification decision with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl Classification {
    fn new(category: Category, tier: Tier, rule_id: Option<String>) -> Self {
        Self {
            category,
            tier,
            rule_id,
        }
    }
}

/// The engine holds compiled regexes and the lookup tables.
#[derive(Debug)]
pub struct ClassifierEngine {
    categories: Vec<Category>,
    fallback: Category,
    detail_threshold: u32,
    no_value_markers: Vec<String>,
    action_rules: Vec<CompiledActionRule>,
    subject_rules: Vec<CompiledSubjectRule>,
    groups: GroupMap,
    products: ProductCatalog,
}

impl ClassifierEngine {
    /// Load from a TOML file. Uses CLASSIFIER_CONFIG_PATH or defaults to
    /// "config/classifier.toml".
    pub fn from_toml() -> Result<Self, PipelineError> {
        let path = std::env::var(ENV_CLASSIFIER_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CLASSIFIER_CONFIG_PATH));

        let content = fs::read_to_string(&path).map_err(|e| {
            PipelineError::configuration(format!(
                "failed to read classifier config at {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut eng = Self::from_toml_str(&content)?;

        // optional: override the detail threshold from env
        if let Some(t) = parse_threshold_env(std::env::var(ENV_DETAIL_THRESHOLD).ok()) {
            eng.detail_threshold = t;
        }

        Ok(eng)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, PipelineError> {
        let cfg: ClassifierRoot = toml::from_str(toml_str)
            .map_err(|e| PipelineError::configuration(format!("classifier config parse: {e}")))?;
        Self::compile(cfg)
    }

    /// Compiled form of the rule set shipped with the binary.
    pub fn builtin() -> Self {
        Self::from_toml_str(include_str!("../config/classifier.toml"))
            .expect("embedded classifier config is valid")
    }

    fn compile(cfg: ClassifierRoot) -> Result<Self, PipelineError> {
        let section = &cfg.classifier;

        if section.categories.is_empty() {
            return Err(PipelineError::configuration(
                "classifier config declares no categories",
            ));
        }
        let fallback_name = section.fallback_category.trim();
        if fallback_name.is_empty() {
            return Err(PipelineError::configuration(
                "fallback_category must not be empty",
            ));
        }

        let mut categories: Vec<Category> = Vec::with_capacity(section.categories.len());
        for name in &section.categories {
            let name = name.trim();
            if name.is_empty() {
                return Err(PipelineError::configuration("empty category name"));
            }
            if categories.iter().any(|c| c.as_str() == name) {
                return Err(PipelineError::configuration(format!(
                    "duplicate category `{name}`"
                )));
            }
            categories.push(Category::new(name));
        }
        let fallback = Category::new(fallback_name);

        let declared = |name: &str| {
            categories.iter().any(|c| c.as_str() == name) || name == fallback.as_str()
        };

        // Compile action rules
        let mut seen_ids: Vec<&str> = Vec::new();
        let mut action_rules = Vec::with_capacity(cfg.action_rules.len());
        for a in &cfg.action_rules {
            let id = a.id.trim();
            if id.is_empty() {
                return Err(PipelineError::configuration("action rule with empty id"));
            }
            if seen_ids.contains(&id) {
                return Err(PipelineError::configuration(format!(
                    "duplicate action rule id `{id}`"
                )));
            }
            seen_ids.push(id);
            if !declared(a.category.trim()) {
                return Err(PipelineError::configuration(format!(
                    "action rule `{id}` references undeclared category `{}`",
                    a.category
                )));
            }
            let re = compile_pattern(&a.pattern)
                .map_err(|e| PipelineError::configuration(format!("action rule `{id}`: {e}")))?;
            action_rules.push(CompiledActionRule {
                id: id.to_string(),
                category: Category::new(a.category.trim()),
                re,
            });
        }

        // Compile subject rules, flattened; declaration order is priority.
        let mut subject_rules = Vec::new();
        for g in &cfg.subject_rules {
            if !declared(g.category.trim()) {
                return Err(PipelineError::configuration(format!(
                    "subject rules reference undeclared category `{}`",
                    g.category
                )));
            }
            if g.patterns.is_empty() {
                return Err(PipelineError::configuration(format!(
                    "subject rule group `{}` has no patterns",
                    g.category
                )));
            }
            let category = Category::new(g.category.trim());
            for (i, p) in g.patterns.iter().enumerate() {
                let id = format!("subject:{}:{}", category.as_str(), i);
                let re = compile_pattern(p)
                    .map_err(|e| PipelineError::configuration(format!("{id}: {e}")))?;
                subject_rules.push(CompiledSubjectRule {
                    id,
                    category: category.clone(),
                    re,
                });
            }
        }

        // Group table
        for r in &cfg.groups {
            if !declared(r.category.trim()) {
                return Err(PipelineError::configuration(format!(
                    "group `{}` references undeclared category `{}`",
                    r.name, r.category
                )));
            }
        }
        let groups = GroupMap::from_rules(&cfg.groups);

        // Product display values must land on a category, otherwise the
        // product tier could never use them.
        for (raw, display) in &cfg.products.display {
            if !declared(display.trim()) {
                return Err(PipelineError::configuration(format!(
                    "product `{raw}` maps to undeclared category `{display}`"
                )));
            }
        }
        let products = ProductCatalog::from_section(&cfg.products);

        let no_value_markers = section
            .no_value_markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .collect();

        Ok(Self {
            categories,
            fallback,
            detail_threshold: section.detail_threshold,
            no_value_markers,
            action_rules,
            subject_rules,
            groups,
            products,
        })
    }

    pub fn detail_threshold(&self) -> u32 {
        self.detail_threshold
    }

    pub fn fallback(&self) -> &Category {
        &self.fallback
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn rule_count(&self) -> usize {
        self.action_rules.len() + self.subject_rules.len()
    }

    /// Full pipeline categorization: the dispositive group lookup first,
    /// then the tiered engine for everything the group map left open.
    pub fn categorize(&self, ticket: &Ticket) -> Classification {
        if let Some(cat) = self.groups.dispositive_category(&ticket.group) {
            let decision =
                Classification::new(cat.clone(), Tier::DispositiveGroup, None);
            dev_log_classification(ticket, &decision);
            return decision;
        }
        self.classify_with_trace(ticket)
    }

    /// The tiered decision alone, ignoring dispositive groups. Deterministic:
    /// equal inputs always yield equal outputs.
    pub fn classify(&self, ticket: &Ticket) -> Category {
        self.classify_with_trace(ticket).category
    }

    /// Same as [`classify`](Self::classify) but keeps the provenance.
    pub fn classify_with_trace(&self, ticket: &Ticket) -> Classification {
        // Tier 1: agent-recorded actions are the most reliable signal.
        if let Some(action) = ticket.action_taken.as_deref() {
            let action = action.trim();
            if !action.is_empty() {
                for r in &self.action_rules {
                    if r.re.is_match(action) {
                        let decision = Classification::new(
                            r.category.clone(),
                            Tier::ActionTaken,
                            Some(r.id.clone()),
                        );
                        dev_log_classification(ticket, &decision);
                        return decision;
                    }
                }
            }
        }

        // Tier 2: trust the upstream product tag when it names a category.
        if let Some(cat) = self.category_from_product(ticket.existing_product.as_deref()) {
            let decision = Classification::new(cat, Tier::ExistingProduct, None);
            dev_log_classification(ticket, &decision);
            return decision;
        }

        // Tier 3: ordered subject patterns, first match wins.
        for r in &self.subject_rules {
            if r.re.is_match(&ticket.subject) {
                let decision = Classification::new(
                    r.category.clone(),
                    Tier::SubjectPattern,
                    Some(r.id.clone()),
                );
                dev_log_classification(ticket, &decision);
                return decision;
            }
        }

        // Tier 4: assignment group, advisory entries included.
        if let Some(cat) = self.groups.fallback_category(&ticket.group) {
            let decision =
                Classification::new(cat.clone(), Tier::GroupFallback, None);
            dev_log_classification(ticket, &decision);
            return decision;
        }

        // Tier 5: nothing claimed the ticket.
        let decision = Classification::new(self.fallback.clone(), Tier::Default, None);
        dev_log_classification(ticket, &decision);
        decision
    }

    /// Resolve an `existing_product` value to a category, or `None` when the
    /// field is absent, a no-value sentinel, or names nothing we recognize.
    fn category_from_product(&self, raw: Option<&str>) -> Option<Category> {
        let raw = raw?.trim();
        if self.is_no_value(raw) {
            return None;
        }
        // Direct category name, any case.
        if let Some(c) = self
            .categories
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw))
        {
            return Some(c.clone());
        }
        // Otherwise go through the catalog and re-check the display name.
        let display = self.products.resolve(raw)?;
        self.categories
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(display))
            .cloned()
    }

    fn is_no_value(&self, raw: &str) -> bool {
        let s = raw.trim().to_lowercase();
        self.no_value_markers.iter().any(|m| *m == s)
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, String> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| format!("regex error: {e}"))
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// A threadsafe handle over the compiled engine.
///
/// `snapshot` hands out the current engine as an `Arc`; a run that keeps the
/// snapshot sees one rule set from first ticket to last even if a reload
/// swaps the engine mid-run.
///
/// Hot reload is dev-gated: set CLASSIFIER_HOT_RELOAD=1 and run a debug
/// build or APP_ENV in {local,development,dev}.
#[derive(Clone)]
pub struct ClassifierHandle {
    inner: Arc<RwLock<Arc<ClassifierEngine>>>,
}

impl ClassifierHandle {
    pub fn new(engine: ClassifierEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(engine))),
        }
    }

    /// The current engine. Cheap; clones an `Arc`.
    pub fn snapshot(&self) -> Arc<ClassifierEngine> {
        self.inner
            .read()
            .expect("classifier lock poisoned")
            .clone()
    }

    fn swap(&self, engine: ClassifierEngine) {
        let mut guard = self.inner.write().expect("classifier lock poisoned");
        *guard = Arc::new(engine);
    }
}

/// Hot reload is opt-in and restricted to dev builds or a dev `APP_ENV`.
fn hot_reload_enabled() -> bool {
    let want = std::env::var("CLASSIFIER_HOT_RELOAD")
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    if !want {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("APP_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Start a polling watcher that swaps in a freshly parsed rule set whenever
/// `path` changes on disk. Plain mtime polling on a std thread, every 2s;
/// only runs when [`hot_reload_enabled`] says so.
pub fn start_hot_reload_thread(handle: ClassifierHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let mut last_seen: Option<SystemTime> = None;

        loop {
            // A missing or unreadable file just means we look again later.
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                match last_seen {
                    // First sighting arms the watcher without a reload.
                    None => last_seen = Some(mtime),
                    Some(prev) if mtime > prev => {
                        match fs::read_to_string(&path)
                            .map_err(|e| PipelineError::configuration(e.to_string()))
                            .and_then(|s| ClassifierEngine::from_toml_str(&s))
                        {
                            Ok(new_engine) => {
                                handle.swap(new_engine);
                                info!(target: "classify", path = %path.display(), "rules reloaded");
                            }
                            Err(e) => {
                                // Keep the old rules; a broken edit must not
                                // take the engine down.
                                tracing::warn!(target: "classify", error = %e, "rule reload rejected");
                            }
                        }
                        last_seen = Some(mtime);
                    }
                    Some(_) => {}
                }
            }
            thread::sleep(Duration::from_secs(2));
        }
    });
}

/* ----------------------------
Tests
---------------------------- */
