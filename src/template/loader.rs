/// Template directory loader
///
/// Layout: `<root>/<category>/<team>/<name>.png`
///
/// - `points/<team>/point_<digit>.png` are digits (`time` and `energy` teams
///   hold the clock and energy digits).
/// - `scored/<team>/score*.png` are score badges; `ally` / `enemy` in the name
///   ties a badge to a side.
/// - `game`, `killed`, `secure`, `ko` and `scoring` hold single symbols whose
///   meaning comes from the file name, e.g. `secure/game/regice_enemy.png`.
/// - `_alt` / `_big` mark variants of the same symbol.
/// - `<name>@0.85.png` overrides the acceptance for that template.
/// - `<name>_mask.png` next to a template is used as its mask.
use regex::Regex;
use std::fs;
use std::path::Path;

use super::{Category, Template};
use crate::error::TemplateError;
use crate::state::events::{Defeat, EventKind, Objective};
use crate::team::{Side, Team};

struct NamePatterns {
    acceptance: Regex,
    digit: Regex,
    secure: Regex,
}

impl NamePatterns {
    fn new() -> Result<Self, TemplateError> {
        Ok(Self {
            acceptance: Regex::new(r"^(?P<base>.+?)@(?P<acc>\d*\.?\d+)$")?,
            digit: Regex::new(r"^(?:point_)?(?P<digit>\d)$")?,
            secure: Regex::new(r"^(?P<objective>[a-z]+)_(?P<side>ally|enemy)$")?,
        })
    }

    /// Split `point_7@0.85` into `("point_7", Some(0.85))`.
    fn split_acceptance<'a>(&self, stem: &'a str) -> (&'a str, Option<f32>) {
        match self.acceptance.captures(stem) {
            Some(caps) => {
                let base = caps.name("base").map_or(stem, |m| m.as_str());
                let acc = caps
                    .name("acc")
                    .and_then(|m| m.as_str().parse::<f32>().ok())
                    .filter(|a| *a > 0.0 && *a <= 1.0);
                (base, acc)
            }
            None => (stem, None),
        }
    }

    fn digit(&self, name: &str) -> Option<i32> {
        self.digit
            .captures(name)
            .and_then(|caps| caps.name("digit"))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn secure(&self, name: &str) -> Option<EventKind> {
        let caps = self.secure.captures(name)?;
        let objective = Objective::from_name(caps.name("objective")?.as_str())?;
        let side = side_of(caps.name("side")?.as_str())?;
        Some(EventKind::ObjectiveSecured(objective, side))
    }
}

fn side_of(name: &str) -> Option<Side> {
    if name.contains("ally") || name.contains("purple") {
        Some(Side::Purple)
    } else if name.contains("enemy") || name.contains("orange") {
        Some(Side::Orange)
    } else {
        None
    }
}

/// Drop variant markers so `vs_alt_alt` and `vs` mean the same symbol.
fn strip_variants(name: &str) -> String {
    name.replace("_alt", "").replace("_big", "")
}

fn symbol_event(patterns: &NamePatterns, category: Category, name: &str) -> Option<EventKind> {
    match category {
        Category::Game if name.starts_with("vs") => Some(EventKind::MatchStarting),
        Category::Game if name.starts_with("end") => Some(EventKind::MatchEnding),
        Category::Killed => match name {
            "killed" => Some(EventKind::Defeated(Defeat::Plain)),
            "killed_with_points" => Some(EventKind::Defeated(Defeat::WithPoints)),
            "killed_without_points" => Some(EventKind::Defeated(Defeat::WithoutPoints)),
            _ => None,
        },
        Category::Secure => patterns.secure(name),
        Category::Ko => {
            let side = side_of(name)?;
            if name.starts_with("ko_streak") {
                Some(EventKind::KnockOutStreak(side))
            } else if name.starts_with("ko") {
                Some(EventKind::KnockOut(side))
            } else {
                None
            }
        }
        Category::Scoring if name.starts_with("pre_scoring") => Some(EventKind::PreScore),
        Category::Scoring if name.starts_with("post_scoring") => Some(EventKind::PostScore),
        Category::Scoring if name.starts_with("press_button_to_score") => {
            Some(EventKind::PressButtonToScore)
        }
        _ => None,
    }
}

fn read_gray(path: &Path) -> Result<image::GrayImage, TemplateError> {
    image::open(path)
        .map(|img| img.to_luma8())
        .map_err(|e| TemplateError::DecodeFailed {
            path: path.display().to_string(),
            source: e,
        })
}

fn list_dir(path: &Path) -> Result<Vec<std::path::PathBuf>, TemplateError> {
    let entries = fs::read_dir(path).map_err(|e| TemplateError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut paths: Vec<_> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    Ok(paths)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Load one template file; `Ok(None)` for files that are skipped.
fn load_file(
    patterns: &NamePatterns,
    category: Category,
    team: Team,
    path: &Path,
) -> Result<Option<Template>, TemplateError> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(None);
    };
    if stem.ends_with("_mask") {
        return Ok(None);
    }

    let (base, acceptance) = patterns.split_acceptance(stem);
    let name = strip_variants(&base.to_ascii_lowercase());
    let mut template = Template::new(stem, category, team, read_gray(path)?);

    match category {
        Category::Points => match patterns.digit(&name) {
            Some(digit) => template = template.with_value(digit),
            None => {
                tracing::warn!("Skipping digit template with no value: {}", path.display());
                return Ok(None);
            }
        },
        Category::Scored => {
            if let Some(side) = side_of(&name) {
                template = template.with_alias(side);
            }
        }
        _ => match symbol_event(patterns, category, &name) {
            Some(event) => template = template.with_event(event),
            None => {
                tracing::warn!("Skipping unrecognised {} template: {}", category, path.display());
                return Ok(None);
            }
        },
    }

    if let Some(acceptance) = acceptance {
        template = template.with_acceptance(acceptance);
    }

    let mask_path = path.with_file_name(format!("{}_mask.png", stem));
    if mask_path.exists() {
        template = template.with_mask(read_gray(&mask_path)?)?;
    }

    Ok(Some(template))
}

/// Load every template below `root`.
///
/// Unknown category or team directories and unrecognised file names are
/// skipped with a warning; unreadable images are errors.
pub fn load_dir(root: &Path) -> Result<Vec<Template>, TemplateError> {
    if !root.is_dir() {
        return Err(TemplateError::MissingDirectory(root.display().to_string()));
    }

    let patterns = NamePatterns::new()?;
    let mut templates = Vec::new();

    for category_dir in list_dir(root)?.into_iter().filter(|p| p.is_dir()) {
        let dir_name = category_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let Some(category) = Category::from_name(dir_name) else {
            tracing::warn!("Skipping templates from {}", category_dir.display());
            continue;
        };

        for team_dir in list_dir(&category_dir)?.into_iter().filter(|p| p.is_dir()) {
            let team_name = team_dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let Some(team) = Team::from_name(team_name) else {
                tracing::warn!("Skipping templates from {}", team_dir.display());
                continue;
            };

            for file in list_dir(&team_dir)?.into_iter().filter(|p| is_png(p)) {
                if let Some(template) = load_file(&patterns, category, team, &file)? {
                    tracing::debug!(
                        "Loaded template {}/{}/{} ({}x{})",
                        category,
                        team,
                        template.name,
                        template.width(),
                        template.height()
                    );
                    templates.push(template);
                }
            }
        }
    }

    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn write_png(path: &Path, w: u32, h: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 31 + y * 17) % 255) as u8]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_name_patterns() {
        let p = NamePatterns::new().unwrap();
        assert_eq!(p.split_acceptance("point_7@0.85"), ("point_7", Some(0.85)));
        assert_eq!(p.split_acceptance("point_7"), ("point_7", None));
        assert_eq!(p.digit("point_7"), Some(7));
        assert_eq!(p.digit("3"), Some(3));
        assert_eq!(p.digit("point_x"), None);
        assert_eq!(
            p.secure("regieleki_ally"),
            Some(EventKind::ObjectiveSecured(Objective::Regieleki, Side::Purple))
        );
        assert_eq!(p.secure("mew_enemy"), None);
    }

    #[test]
    fn test_symbol_events() {
        let p = NamePatterns::new().unwrap();
        assert_eq!(
            symbol_event(&p, Category::Game, &strip_variants("vs_alt")),
            Some(EventKind::MatchStarting)
        );
        assert_eq!(
            symbol_event(&p, Category::Ko, "ko_streak_enemy"),
            Some(EventKind::KnockOutStreak(Side::Orange))
        );
        assert_eq!(
            symbol_event(&p, Category::Killed, "killed_without_points"),
            Some(EventKind::Defeated(Defeat::WithoutPoints))
        );
        assert_eq!(
            symbol_event(&p, Category::Scoring, &strip_variants("pre_scoring_alt_alt")),
            Some(EventKind::PreScore)
        );
        assert_eq!(symbol_event(&p, Category::Game, "lobby"), None);
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_png(&root.join("points/purple/point_4.png"), 6, 9);
        write_png(&root.join("points/purple/point_5@0.6.png"), 6, 9);
        write_png(&root.join("points/time/point_0.png"), 6, 9);
        write_png(&root.join("scored/first/score_enemy.png"), 12, 8);
        write_png(&root.join("secure/game/rayquaza_ally.png"), 10, 10);
        write_png(&root.join("secure/game/rayquaza_ally_mask.png"), 10, 10);
        write_png(&root.join("game/game/vs_alt.png"), 10, 10);
        write_png(&root.join("game/game/unknown.png"), 10, 10);
        write_png(&root.join("bogus/game/vs.png"), 10, 10);
        write_png(&root.join("points/referee/point_1.png"), 6, 9);

        let templates = load_dir(root).unwrap();
        assert_eq!(templates.len(), 6);

        let five = templates.iter().find(|t| t.value == 5).unwrap();
        assert_eq!(five.acceptance, Some(0.6));
        assert_eq!(five.team, Team::Purple);

        let badge = templates
            .iter()
            .find(|t| t.category == Category::Scored)
            .unwrap();
        assert_eq!(badge.team, Team::First);
        assert_eq!(badge.alias, Some(Side::Orange));

        let secure = templates
            .iter()
            .find(|t| t.category == Category::Secure)
            .unwrap();
        assert!(secure.mask.is_some());

        let vs = templates
            .iter()
            .find(|t| t.category == Category::Game)
            .unwrap();
        assert_eq!(vs.event, Some(EventKind::MatchStarting));
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, TemplateError::MissingDirectory(_)));
    }
}
