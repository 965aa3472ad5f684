//! Best-effort tempo/key scraping from composition text.
//!
//! Annotation only: values feed status displays and the demo runtime,
//! never the session state machine. A composition that declares nothing
//! simply yields `None`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CPM_RE: Regex =
        Regex::new(r"(?i)setcpm\s*\(\s*(\d+(?:\.\d+)?)\s*\)").unwrap();
    static ref CPS_RE: Regex = Regex::new(r"(?i)setcps\s*\(\s*([^)]+)\s*\)").unwrap();
    static ref BPM_COMMENT_RE: Regex = Regex::new(r"(?i)BPM[:\s]+(\d+)").unwrap();
    static ref SCALE_RE: Regex =
        Regex::new(r#"(?i)\.scale\s*\(\s*["']([A-G][#b]?)\d?\s*:?\s*(\w+)?["']\s*\)"#)
            .unwrap();
    static ref KEY_COMMENT_RE: Regex =
        Regex::new(r"(?i)Key[:\s]+([A-G][#b]?\s*\w+)").unwrap();
}

/// Extract tempo in BPM from pattern text.
///
/// Recognizes `setcpm(120)`, `setcps(expr)` with a plain multiply/divide
/// chain (cycles converted at 4 beats per cycle), and `BPM: 120` comment
/// annotations, in that order of preference.
pub fn extract_bpm(code: &str) -> Option<f32> {
    if let Some(caps) = CPM_RE.captures(code) {
        return caps[1].parse().ok();
    }
    if let Some(caps) = CPS_RE.captures(code) {
        if let Some(cps) = eval_ratio(&caps[1]) {
            return Some(cps * 60.0 * 4.0);
        }
    }
    if let Some(caps) = BPM_COMMENT_RE.captures(code) {
        return caps[1].parse().ok();
    }
    None
}

/// Extract a key such as "C minor" from `.scale("C:minor")` calls or
/// `Key: ...` comment annotations.
pub fn extract_key(code: &str) -> Option<String> {
    if let Some(caps) = SCALE_RE.captures(code) {
        let root = &caps[1];
        let mode = caps.get(2).map_or("major", |m| m.as_str());
        return Some(format!("{root} {mode}"));
    }
    if let Some(caps) = KEY_COMMENT_RE.captures(code) {
        return Some(caps[1].trim().to_string());
    }
    None
}

/// Evaluate a `140/60/4`-style multiply/divide chain. Anything beyond
/// bare numbers and `*` `/` is rejected; tempo declarations in the wild
/// do not need a real expression grammar.
fn eval_ratio(expr: &str) -> Option<f32> {
    let mut acc: Option<f32> = None;
    let mut op = '*';
    let mut rest = expr.trim();
    while !rest.is_empty() {
        let end = rest.find(['*', '/']).unwrap_or(rest.len());
        let num: f32 = rest[..end].trim().parse().ok()?;
        acc = Some(match (acc, op) {
            (None, _) => num,
            (Some(a), '*') => a * num,
            (Some(a), '/') if num != 0.0 => a / num,
            _ => return None,
        });
        if end == rest.len() {
            break;
        }
        op = rest.as_bytes()[end] as char;
        rest = &rest[end + 1..];
    }
    acc
}
