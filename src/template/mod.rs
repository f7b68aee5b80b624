/// Reference templates and the library that serves them
///
/// Templates are immutable once loaded. The library hands out reference
/// counted sets so a reload never disturbs a match already in flight.
pub mod loader;

use image::GrayImage;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::TemplateError;
use crate::state::events::EventKind;
use crate::team::{Side, Team};

pub use loader::load_dir;

/// What a template is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Score badges that locate a score popup.
    Scored,
    /// Digits 0-9 for scores, the clock (`Team::Time`) and energy (`Team::Energy`).
    Points,
    /// Objective captures.
    Secure,
    /// Defeat banners.
    Killed,
    /// Match start/end banners.
    Game,
    /// Score prompts and confirmations.
    Scoring,
    /// Knock-out banners.
    Ko,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Scored,
        Category::Points,
        Category::Secure,
        Category::Killed,
        Category::Game,
        Category::Scoring,
        Category::Ko,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Scored => "scored",
            Category::Points => "points",
            Category::Secure => "secure",
            Category::Killed => "killed",
            Category::Game => "game",
            Category::Scoring => "scoring",
            Category::Ko => "ko",
        }
    }

    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub category: Category,
    pub team: Team,
    /// Digit value for `Points`, -1 otherwise.
    pub value: i32,
    /// Event a single-symbol template stands for.
    pub event: Option<EventKind>,
    /// Side named by a badge (`*_ally`, `*_enemy`).
    pub alias: Option<Side>,
    pub image: GrayImage,
    /// Non-zero pixels take part in the correlation.
    pub mask: Option<GrayImage>,
    pub acceptance: Option<f32>,
}

impl Template {
    pub fn new(name: impl Into<String>, category: Category, team: Team, image: GrayImage) -> Self {
        Self {
            name: name.into(),
            category,
            team,
            value: -1,
            event: None,
            alias: None,
            image,
            mask: None,
            acceptance: None,
        }
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.value = value;
        self
    }

    pub fn with_event(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_alias(mut self, side: Side) -> Self {
        self.alias = Some(side);
        self
    }

    pub fn with_acceptance(mut self, acceptance: f32) -> Self {
        self.acceptance = Some(acceptance);
        self
    }

    pub fn with_mask(mut self, mask: GrayImage) -> Result<Self, TemplateError> {
        if mask.dimensions() != self.image.dimensions() {
            return Err(TemplateError::MaskMismatch {
                name: self.name,
                width: self.image.width(),
                height: self.image.height(),
                mask_w: mask.width(),
                mask_h: mask.height(),
            });
        }
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Template override, else `fallback`.
    pub fn acceptance_or(&self, fallback: f32) -> f32 {
        self.acceptance.unwrap_or(fallback)
    }
}

pub type TemplateSet = Arc<[Arc<Template>]>;

type SetKey = (Category, Team);

/// Read-only template sets keyed by category and team.
pub struct TemplateLibrary {
    root: Option<PathBuf>,
    sets: RwLock<HashMap<SetKey, TemplateSet>>,
}

impl TemplateLibrary {
    /// Library backed by no directory, filled through `insert`.
    pub fn new() -> Self {
        Self {
            root: None,
            sets: RwLock::new(HashMap::new()),
        }
    }

    /// Load every template under `root`.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, TemplateError> {
        let library = Self {
            root: Some(root.into()),
            sets: RwLock::new(HashMap::new()),
        };
        library.reload()?;
        Ok(library)
    }

    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let library = Self::new();
        library.replace(group(templates));
        library
    }

    /// Re-read the backing directory, returns the template count.
    pub fn reload(&self) -> Result<usize, TemplateError> {
        let Some(root) = &self.root else {
            return Ok(self.len());
        };
        let templates = load_dir(root)?;
        let count = templates.len();
        self.replace(group(templates));
        tracing::info!("Loaded {} templates from {}", count, root.display());
        Ok(count)
    }

    fn replace(&self, sets: HashMap<SetKey, TemplateSet>) {
        *self.sets.write() = sets;
    }

    /// Add one template, keeping the set ordered by name.
    pub fn insert(&self, template: Template) {
        let mut sets = self.sets.write();
        let key = (template.category, template.team);
        let mut list: Vec<Arc<Template>> = sets
            .get(&key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        list.push(Arc::new(template));
        list.sort_by(|a, b| a.name.cmp(&b.name));
        sets.insert(key, list.into());
    }

    /// Templates for a category and team; empty when none are loaded.
    pub fn get(&self, category: Category, team: Team) -> TemplateSet {
        self.sets
            .read()
            .get(&(category, team))
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn len(&self) -> usize {
        self.sets.read().values().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

fn group(templates: impl IntoIterator<Item = Template>) -> HashMap<SetKey, TemplateSet> {
    let mut grouped: HashMap<SetKey, Vec<Arc<Template>>> = HashMap::new();
    for template in templates {
        grouped
            .entry((template.category, template.team))
            .or_default()
            .push(Arc::new(template));
    }
    grouped
        .into_iter()
        .map(|(key, mut list)| {
            list.sort_by(|a, b| a.name.cmp(&b.name));
            (key, list.into())
        })
        .collect()
}
