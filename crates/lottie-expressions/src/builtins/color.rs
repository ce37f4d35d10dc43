//! Color space conversions on `[r, g, b, a]` / `[h, s, l, a]` arrays in `[0, 1]`.

pub fn hsl_to_rgb(hsla: &[f64]) -> Vec<f64> {
    let h = hsla.first().copied().unwrap_or(0.0).rem_euclid(1.0);
    let s = hsla.get(1).copied().unwrap_or(0.0);
    let l = hsla.get(2).copied().unwrap_or(0.0);
    let a = hsla.get(3).copied().unwrap_or(1.0);

    if s == 0.0 {
        return vec![l, l, l, a];
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    vec![
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
        a,
    ]
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

pub fn rgb_to_hsl(rgba: &[f64]) -> Vec<f64> {
    let r = rgba.first().copied().unwrap_or(0.0);
    let g = rgba.get(1).copied().unwrap_or(0.0);
    let b = rgba.get(2).copied().unwrap_or(0.0);
    let a = rgba.get(3).copied().unwrap_or(1.0);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return vec![0.0, 0.0, l, a];
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    vec![h / 6.0, s, l, a]
}
