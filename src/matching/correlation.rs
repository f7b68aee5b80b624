/// Normalised cross-correlation (zero-mean, TM_CCOEFF_NORMED)
///
/// score(x, y) = Σ T'·I' / sqrt(Σ T'² · Σ I'²) where T' and I' are the
/// template and the window under it with their means removed. Window sums
/// come from integral images; the dot product is computed per window, one
/// output row per rayon task. Scores are clamped to [0, 1].
///
/// A template without variance yields a surface of NaN (no peak). A window
/// without variance scores 0.
use image::GrayImage;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct CorrelationSurface {
    width: u32,
    height: u32,
    scores: Vec<f32>,
}

/// Summed-area tables of pixel values and squared values.
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl Integral {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq = vec![0u64; stride * (h + 1)];
        let raw = image.as_raw();

        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = raw[y * w + x] as u64;
                row_sum += v;
                row_sq += v * v;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row_sum;
                sq[at] = sq[at - stride] + row_sq;
            }
        }

        Self { stride, sum, sq }
    }

    /// (Σ I, Σ I²) over the `w` x `h` window at (x, y).
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let s = self.stride;
        let a = y * s + x;
        let b = y * s + x + w;
        let c = (y + h) * s + x;
        let d = (y + h) * s + x + w;
        (
            self.sum[d] + self.sum[a] - self.sum[b] - self.sum[c],
            self.sq[d] + self.sq[a] - self.sq[b] - self.sq[c],
        )
    }
}

/// n·Σv² - (Σv)², exact in integers; zero iff all values are equal.
fn spread(n: u64, sum: u64, sq: u64) -> u64 {
    (n * sq).saturating_sub(sum * sum)
}

fn normalise(dot: f64, template_spread: u64, window_spread: u64, n: u64) -> f32 {
    if template_spread == 0 {
        return f32::NAN;
    }
    if window_spread == 0 {
        return 0.0;
    }
    // dot is Σ T'·I; both spreads carry a factor n.
    let denom = ((template_spread as f64) * (window_spread as f64)).sqrt() / n as f64;
    ((dot / denom) as f32).clamp(0.0, 1.0)
}

impl CorrelationSurface {
    /// Correlate `template` over every position of `image`.
    ///
    /// Returns `None` when the template is empty or does not fit.
    pub fn compute(
        image: &GrayImage,
        template: &GrayImage,
        mask: Option<&GrayImage>,
    ) -> Option<Self> {
        let (iw, ih) = image.dimensions();
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 || tw > iw || th > ih {
            return None;
        }

        let width = iw - tw + 1;
        let height = ih - th + 1;
        let scores = match mask {
            Some(mask) if mask.dimensions() == template.dimensions() => {
                Self::masked(image, template, mask, width as usize)
            }
            _ => Self::plain(image, template, width as usize),
        };

        Some(Self {
            width,
            height,
            scores,
        })
    }

    fn plain(image: &GrayImage, template: &GrayImage, out_w: usize) -> Vec<f32> {
        let (tw, th) = (template.width() as usize, template.height() as usize);
        let iw = image.width() as usize;
        let out_h = image.height() as usize - th + 1;
        let n = (tw * th) as u64;

        let t_raw = template.as_raw();
        let t_sum: u64 = t_raw.iter().map(|&v| v as u64).sum();
        let t_sq: u64 = t_raw.iter().map(|&v| (v as u64) * (v as u64)).sum();
        let t_spread = spread(n, t_sum, t_sq);
        let t_mean = t_sum as f64 / n as f64;
        let centered: Vec<f64> = t_raw.iter().map(|&v| v as f64 - t_mean).collect();

        let integral = Integral::new(image);
        let img = image.as_raw();

        let mut scores = vec![0f32; out_w * out_h];
        scores
            .par_chunks_mut(out_w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    // Σ T' = 0, so Σ T'·I' == Σ T'·I.
                    let mut dot = 0.0f64;
                    for ty in 0..th {
                        let base = (y + ty) * iw + x;
                        let window = &img[base..base + tw];
                        let trow = &centered[ty * tw..(ty + 1) * tw];
                        dot += trow
                            .iter()
                            .zip(window)
                            .map(|(t, &i)| t * i as f64)
                            .sum::<f64>();
                    }
                    let (s, sq) = integral.window(x, y, tw, th);
                    *out = normalise(dot, t_spread, spread(n, s, sq), n);
                }
            });
        scores
    }

    fn masked(image: &GrayImage, template: &GrayImage, mask: &GrayImage, out_w: usize) -> Vec<f32> {
        let tw = template.width() as usize;
        let th = template.height() as usize;
        let iw = image.width() as usize;
        let out_h = image.height() as usize - th + 1;

        let active: Vec<(usize, u8)> = mask
            .as_raw()
            .iter()
            .zip(template.as_raw())
            .enumerate()
            .filter(|(_, (&m, _))| m != 0)
            .map(|(i, (_, &t))| ((i / tw) * iw + i % tw, t))
            .collect();
        let n = active.len() as u64;
        if n == 0 {
            return vec![f32::NAN; out_w * out_h];
        }

        let t_sum: u64 = active.iter().map(|&(_, t)| t as u64).sum();
        let t_sq: u64 = active.iter().map(|&(_, t)| (t as u64) * (t as u64)).sum();
        let t_spread = spread(n, t_sum, t_sq);
        let t_mean = t_sum as f64 / n as f64;
        let img = image.as_raw();

        let mut scores = vec![0f32; out_w * out_h];
        scores
            .par_chunks_mut(out_w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let origin = y * iw + x;
                    let (mut s, mut sq, mut dot) = (0u64, 0u64, 0.0f64);
                    for &(offset, t) in &active {
                        let v = img[origin + offset] as u64;
                        s += v;
                        sq += v * v;
                        dot += (t as f64 - t_mean) * v as f64;
                    }
                    *out = normalise(dot, t_spread, spread(n, s, sq), n);
                }
            });
        scores
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.scores
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn is_finite(&self) -> bool {
        !self.scores.is_empty() && self.scores.iter().all(|s| s.is_finite())
    }

    /// Best score, first in row-major order on ties.
    ///
    /// `None` for an empty surface or one holding non-finite scores.
    pub fn peak(&self) -> Option<Peak> {
        if !self.is_finite() {
            return None;
        }
        let mut best = 0usize;
        for (i, &s) in self.scores.iter().enumerate() {
            if s > self.scores[best] {
                best = i;
            }
        }
        let w = self.width as usize;
        Some(Peak {
            x: (best % w) as u32,
            y: (best / w) as u32,
            score: self.scores[best],
        })
    }
}

/// Similarity of two comparison regions in [0, 1].
///
/// The smaller region is slid over the larger one; when neither fits inside
/// the other both are cut to their common size. Flat regions compare by mean.
pub fn similarity(a: &GrayImage, b: &GrayImage) -> f32 {
    if a.width() == 0 || a.height() == 0 || b.width() == 0 || b.height() == 0 {
        return 0.0;
    }

    let surface = if b.width() <= a.width() && b.height() <= a.height() {
        CorrelationSurface::compute(a, b, None)
    } else if a.width() <= b.width() && a.height() <= b.height() {
        CorrelationSurface::compute(b, a, None)
    } else {
        let w = a.width().min(b.width());
        let h = a.height().min(b.height());
        let a = image::imageops::crop_imm(a, 0, 0, w, h).to_image();
        let b = image::imageops::crop_imm(b, 0, 0, w, h).to_image();
        CorrelationSurface::compute(&a, &b, None)
    };

    match surface.and_then(|s| s.peak()) {
        Some(peak) => peak.score,
        None => {
            if (mean(a) - mean(b)).abs() < 1.0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn mean(image: &GrayImage) -> f64 {
    let raw = image.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    raw.iter().map(|&v| v as f64).sum::<f64>() / raw.len() as f64
}
