/*!
 * Model routing for language pairs.
 *
 * The router decides, once per language pair, which model invocations a
 * chunk goes through. Precedence is fixed:
 * 1. multilingual override set
 * 2. bilingual model for the exact pair
 * 3. pivot through English when both languages are supported
 * 4. multilingual fallback
 *
 * Resolved plans are cached, so the catalog is not consulted per chunk.
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::app_config::ModelsConfig;
use crate::errors::RoutingError;
use crate::language_utils::{PIVOT_LANGUAGE, pair_key};
use crate::providers::ModelSpec;

/// Routing decision for a language pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationPlan {
    /// Pair is in the override set; the multilingual model handles it
    MultilingualDirect(ModelSpec),
    /// A model trained for exactly this pair exists
    BilingualDirect(ModelSpec),
    /// Two sequential calls: source to English, then English to target
    Pivot {
        to_english: ModelSpec,
        from_english: ModelSpec,
    },
    /// Nothing better applies; best-effort multilingual call
    Fallback(ModelSpec),
}

impl TranslationPlan {
    /// Number of model calls one chunk costs under this plan
    pub fn call_count(&self) -> usize {
        match self {
            Self::Pivot { .. } => 2,
            _ => 1,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::MultilingualDirect(model) => format!("multilingual-direct via {}", model),
            Self::BilingualDirect(model) => format!("bilingual-direct via {}", model),
            Self::Pivot { to_english, from_english } => {
                format!("pivot via {} then {}", to_english, from_english)
            }
            Self::Fallback(model) => format!("fallback via {}", model),
        }
    }
}

/// Static mapping of language pair to bilingual model location
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, String>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `pair=model-name` lines.
    ///
    /// Blank lines and `#` comments are skipped. Each model name is resolved to
    /// `{model_dir}/{prefix}{name}`.
    pub fn parse(content: &str, model_dir: &str, prefix: &str) -> Result<Self, RoutingError> {
        let mut catalog = Self::new();

        for (number, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (pair, name) = line.split_once('=').ok_or_else(|| RoutingError::InvalidMapping {
                line: number + 1,
                reason: format!("expected 'pair=model', got '{}'", line),
            })?;
            let (pair, name) = (pair.trim(), name.trim());

            let valid_pair = pair
                .split_once('-')
                .is_some_and(|(s, t)| !s.is_empty() && !t.is_empty() && !t.contains('-'));
            if !valid_pair || name.is_empty() {
                return Err(RoutingError::InvalidMapping {
                    line: number + 1,
                    reason: format!("invalid entry '{}'", line),
                });
            }

            let path = format!("{}/{}{}", model_dir.trim_end_matches('/'), prefix, name);
            catalog.insert(&pair.to_lowercase(), path);
        }

        Ok(catalog)
    }

    /// Load the mapping file named in the configuration
    pub fn load<P: AsRef<Path>>(path: P, model_dir: &str, prefix: &str) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model mapping: {:?}", path))?;
        let catalog = Self::parse(&content, model_dir, prefix)
            .with_context(|| format!("Failed to parse model mapping: {:?}", path))?;
        info!("Loaded {} bilingual models from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    pub fn insert(&mut self, pair: &str, path: impl Into<String>) {
        self.models.insert(pair.to_string(), path.into());
    }

    /// Bilingual model for a pair, if registered
    pub fn get(&self, source: &str, target: &str) -> Option<ModelSpec> {
        let pair = pair_key(source, target);
        self.models.get(&pair).map(|path| ModelSpec::Bilingual {
            pair,
            path: path.clone(),
        })
    }

    pub fn contains(&self, source: &str, target: &str) -> bool {
        self.models.contains_key(&pair_key(source, target))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Chooses a translation plan per language pair
#[derive(Debug)]
pub struct ModelRouter {
    catalog: ModelCatalog,
    multilingual: ModelSpec,
    overrides: HashSet<String>,
    supported: HashSet<String>,
    plans: RwLock<HashMap<(String, String), TranslationPlan>>,
}

impl ModelRouter {
    pub fn new(
        catalog: ModelCatalog,
        multilingual_model: &str,
        overrides: impl IntoIterator<Item = String>,
        supported: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            catalog,
            multilingual: ModelSpec::Multilingual {
                id: multilingual_model.to_string(),
            },
            overrides: overrides.into_iter().map(|p| p.to_lowercase()).collect(),
            supported: supported.into_iter().map(|l| l.to_lowercase()).collect(),
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// Build a router from configuration and a loaded catalog
    pub fn from_config(config: &ModelsConfig, catalog: ModelCatalog) -> Self {
        Self::new(
            catalog,
            &config.multilingual_model,
            config.multilingual_overrides.iter().cloned(),
            config.supported_languages.iter().cloned(),
        )
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.supported.contains(language)
    }

    /// Plan for a pair, cached after the first resolution
    pub fn route(&self, source: &str, target: &str) -> Result<TranslationPlan, RoutingError> {
        let key = (source.to_string(), target.to_string());
        if let Some(plan) = self.plans.read().get(&key) {
            return Ok(plan.clone());
        }

        let plan = self.resolve(source, target)?;
        debug!("Routing {}->{}: {}", source, target, plan.describe());
        self.plans.write().entry(key).or_insert_with(|| plan.clone());
        Ok(plan)
    }

    fn resolve(&self, source: &str, target: &str) -> Result<TranslationPlan, RoutingError> {
        let pair = pair_key(source, target);

        if self.overrides.contains(&pair) {
            return Ok(TranslationPlan::MultilingualDirect(self.multilingual.clone()));
        }

        if let Some(model) = self.catalog.get(source, target) {
            return Ok(TranslationPlan::BilingualDirect(model));
        }

        if self.is_pivot_candidate(source, target) {
            let to_english = self
                .catalog
                .get(source, PIVOT_LANGUAGE)
                .ok_or_else(|| RoutingError::MissingModel(pair_key(source, PIVOT_LANGUAGE)))?;
            let from_english = self
                .catalog
                .get(PIVOT_LANGUAGE, target)
                .ok_or_else(|| RoutingError::MissingModel(pair_key(PIVOT_LANGUAGE, target)))?;
            return Ok(TranslationPlan::Pivot { to_english, from_english });
        }

        Ok(TranslationPlan::Fallback(self.multilingual.clone()))
    }

    /// Both sides supported and neither is the pivot language itself
    fn is_pivot_candidate(&self, source: &str, target: &str) -> bool {
        source != PIVOT_LANGUAGE
            && target != PIVOT_LANGUAGE
            && source != target
            && self.is_supported(source)
            && self.is_supported(target)
    }

    /// Supported pairs touching English that have neither a bilingual model
    /// nor an override, and so resolve to the multilingual fallback
    pub fn fallback_pairs(&self) -> Vec<String> {
        let mut pairs: Vec<String> = self
            .supported
            .iter()
            .filter(|language| language.as_str() != PIVOT_LANGUAGE && self.is_supported(PIVOT_LANGUAGE))
            .flat_map(|language| [(PIVOT_LANGUAGE, language.as_str()), (language.as_str(), PIVOT_LANGUAGE)])
            .filter(|(source, target)| {
                !self.overrides.contains(&pair_key(source, target)) && !self.catalog.contains(source, target)
            })
            .map(|(source, target)| pair_key(source, target))
            .collect();
        pairs.sort();
        pairs
    }

    /// Check that every pivot the supported set implies has both stages.
    ///
    /// Run once at startup; a gap here would otherwise only show up when a
    /// job for that pair arrives. English-side pairs without a model are
    /// logged, since they still translate through the multilingual fallback.
    pub fn validate_pivots(&self) -> Result<(), RoutingError> {
        let fallback = self.fallback_pairs();
        if !fallback.is_empty() {
            warn!(
                "No bilingual model or override for {}; these pairs will use the multilingual fallback {}",
                fallback.join(", "),
                self.multilingual
            );
        }

        let mut languages: Vec<&String> = self.supported.iter().collect();
        languages.sort();

        let mut missing = Vec::new();
        for source in &languages {
            for target in &languages {
                if !self.is_pivot_candidate(source, target)
                    || self.overrides.contains(&pair_key(source, target))
                    || self.catalog.contains(source, target)
                {
                    continue;
                }
                for (from, to) in [(source.as_str(), PIVOT_LANGUAGE), (PIVOT_LANGUAGE, target.as_str())] {
                    let stage = pair_key(from, to);
                    if !self.catalog.contains(from, to) && !missing.contains(&stage) {
                        missing.push(stage);
                    }
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            Err(RoutingError::IncompleteCatalog(missing))
        }
    }
}
