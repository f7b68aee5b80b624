//! Held-energy counter.
//!
//! The counter can show the same digit twice side by side, which an inset
//! scan would read once. Each round instead paints the matched box black on
//! a private copy of the region so the next round cannot see it again.
use image::{GrayImage, Luma};
use std::sync::Arc;

use super::{compose, Candidate, Digit, Location, Match, MatchResult, Matcher};
use crate::template::Template;

const ENERGY_ROUNDS: usize = 2;

fn paint(region: &mut GrayImage, digit: &Digit) {
    let x_end = (digit.location.x + digit.width).min(region.width());
    let y_end = (digit.location.y + digit.height).min(region.height());
    for y in digit.location.y..y_end {
        for x in digit.location.x..x_end {
            region.put_pixel(x, y, Luma([0]));
        }
    }
}

impl Matcher {
    /// Read the held-energy counter (one or two digits).
    pub fn match_energy(
        &self,
        region: &GrayImage,
        templates: &[Arc<Template>],
        acceptance: f32,
    ) -> (MatchResult, Match) {
        if let Some(t) = Self::oversized(region, templates) {
            tracing::warn!("Energy template {} does not fit the capture area", t.name);
            return (MatchResult::Invalid, Match::default());
        }

        let mut work = region.clone();
        let mut digits: Vec<Digit> = Vec::with_capacity(ENERGY_ROUNDS);

        for round in 0..ENERGY_ROUNDS {
            let candidates = templates
                .iter()
                .filter_map(|t| self.accept(&work, t, acceptance));

            let best = candidates.fold(None, |best: Option<Candidate>, c| match best {
                None => Some(c),
                Some(b) => {
                    let better = if round == 0 {
                        c.peak.x < b.peak.x || (c.peak.x == b.peak.x && c.peak.score > b.peak.score)
                    } else {
                        c.peak.score > b.peak.score
                    };
                    Some(if better { c } else { b })
                }
            });

            let Some(best) = best else {
                continue;
            };

            let digit = Digit {
                value: best.template.value,
                location: Location {
                    x: best.peak.x,
                    y: best.peak.y,
                },
                width: best.template.width(),
                height: best.template.height(),
                score: best.peak.score,
            };
            paint(&mut work, &digit);
            digits.push(digit);
        }

        if digits.is_empty() {
            return (MatchResult::NotFound, Match::default());
        }

        digits.sort_by_key(|d| d.location.x);
        let value = compose(&digits);
        let first = &digits[0];
        let m = Match {
            template: None,
            location: first.location,
            score: first.score,
            value,
            digits,
        };
        (MatchResult::Found, m)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::team::Team;

    fn read(digits: &[i32]) -> (MatchResult, i32) {
        let region = number_region(60, 6, 1, digits);
        let (r, m) = Matcher::default().match_energy(&region, &digit_templates(Team::Energy), 0.9);
        (r, m.value)
    }

    #[test]
    fn test_repeated_digits() {
        assert_eq!(read(&[4, 4]), (MatchResult::Found, 44));
        assert_eq!(read(&[1, 1]), (MatchResult::Found, 11));
    }

    #[test]
    fn test_two_digits_in_order() {
        assert_eq!(read(&[2, 7]), (MatchResult::Found, 27));
        assert_eq!(read(&[5, 0]), (MatchResult::Found, 50));
    }

    #[test]
    fn test_single_digit_and_zero() {
        assert_eq!(read(&[9]), (MatchResult::Found, 9));
        assert_eq!(read(&[0]), (MatchResult::Found, 0));
    }

    #[test]
    fn test_nothing_held() {
        assert_eq!(read(&[]), (MatchResult::NotFound, -1));
    }

    #[test]
    fn test_oversized_template_is_invalid() {
        let region = GrayImage::new(GLYPH_W, GLYPH_H - 1);
        let (r, _) = Matcher::default().match_energy(&region, &digit_templates(Team::Energy), 0.9);
        assert_eq!(r, MatchResult::Invalid);
    }

    #[test]
    fn test_source_region_is_untouched() {
        let region = number_region(60, 6, 1, &[3, 3]);
        let before = region.clone();
        let _ = Matcher::default().match_energy(&region, &digit_templates(Team::Energy), 0.9);
        assert_eq!(region, before);
    }
}
