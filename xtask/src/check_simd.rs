/// SIMD kernel checker - pre-commit validation of `src/backends/*.rs`
///
/// Every kernel that touches architecture intrinsics must:
/// 1. [CRITICAL] carry a #[target_feature] attribute
/// 2. [ERROR] enable the feature its intrinsics need (including 'fma')
/// 3. [WARNING] document its bounds with a SAFETY comment
/// 4. [WARNING] be #[inline]
use anyhow::{Context, Result};
use colored::Colorize;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How far above an `unsafe fn` its attributes and SAFETY comment may sit
const ATTRIBUTE_WINDOW: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ViolationLevel {
    Critical,
    Error,
    Warning,
}

#[derive(Debug)]
struct Violation {
    level: ViolationLevel,
    filepath: PathBuf,
    line_num: usize,
    function_name: String,
    message: String,
    fix_suggestion: String,
}

/// Intrinsic naming scheme of one backend file and the feature it requires
struct IntrinsicPattern {
    pattern: Regex,
    required_feature: &'static str,
}

fn intrinsic_pattern(backend: &str) -> Result<Option<IntrinsicPattern>> {
    let (pattern, required_feature) = match backend {
        "sse2" => (r"_mm_\w+", "sse2"),
        "avx2" => (r"_mm256_\w+", "avx2"),
        "avx512" => (r"_mm512_\w+", "avx512f"),
        "neon" => (r"v(?:ld1|st1|dup|add|sub|mul|div|fma|fms)\w*q\w*_f32", "neon"),
        "wasm" => (r"(?:f32x4|f64x2|i32x4)_\w+|v128_\w+", "simd128"),
        _ => return Ok(None),
    };
    let pattern = Regex::new(pattern).context("invalid intrinsic pattern")?;
    Ok(Some(IntrinsicPattern {
        pattern,
        required_feature,
    }))
}

/// 256/128-bit FMA intrinsics live behind the separate 'fma' feature
fn is_fma_intrinsic(intrinsic: &str) -> bool {
    matches!(
        intrinsic,
        "_mm256_fmadd_ps"
            | "_mm256_fmsub_ps"
            | "_mm256_fnmadd_ps"
            | "_mm256_fnmsub_ps"
            | "_mm_fmadd_ps"
            | "_mm_fmsub_ps"
            | "_mm_fnmadd_ps"
            | "_mm_fnmsub_ps"
    )
}

/// Precompiled line matchers shared by every file
struct Matchers {
    unsafe_fn: Regex,
    target_feature: Regex,
    safety: Regex,
    inline: Regex,
}

impl Matchers {
    fn new() -> Result<Self> {
        Ok(Self {
            unsafe_fn: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?unsafe\s+fn\s+(\w+)")?,
            target_feature: Regex::new(r#"#\[target_feature\(enable\s*=\s*"([^"]+)"\)\]"#)?,
            safety: Regex::new(r"//\s*SAFETY:")?,
            inline: Regex::new(r"#\[inline(?:\(always\))?\]")?,
        })
    }

    /// Features enabled by the nearest #[target_feature] above `fn_line`
    fn target_features(&self, lines: &[&str], fn_line: usize) -> Option<BTreeSet<String>> {
        let start = fn_line.saturating_sub(ATTRIBUTE_WINDOW);
        lines[start..fn_line].iter().rev().find_map(|line| {
            self.target_feature.captures(line).map(|caps| {
                caps[1]
                    .split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect()
            })
        })
    }

    fn preceded_by(&self, re: &Regex, lines: &[&str], fn_line: usize) -> bool {
        let start = fn_line.saturating_sub(ATTRIBUTE_WINDOW);
        lines[start..fn_line].iter().any(|line| re.is_match(line))
    }
}

/// Collect intrinsics used between `fn_start` and the matching closing brace
fn find_intrinsics_in_function(
    lines: &[&str],
    fn_start: usize,
    pattern: &Regex,
) -> (usize, HashSet<String>) {
    let mut intrinsics = HashSet::new();
    let mut depth = 0i32;
    let mut opened = false;
    let mut fn_end = lines.len().saturating_sub(1);

    for (offset, line) in lines[fn_start..].iter().enumerate() {
        let opens = line.matches('{').count() as i32;
        depth += opens;
        depth -= line.matches('}').count() as i32;
        opened |= opens > 0;

        for m in pattern.find_iter(line) {
            intrinsics.insert(m.as_str().to_string());
        }

        if opened && depth <= 0 {
            fn_end = fn_start + offset;
            break;
        }
    }

    (fn_end, intrinsics)
}

/// Check that the enabled features cover the intrinsics actually used
fn check_attribute_mismatch(
    required: &str,
    features: &BTreeSet<String>,
    intrinsics: &HashSet<String>,
) -> Option<String> {
    let has_avx512 = intrinsics.iter().any(|i| i.starts_with("_mm512_"));
    let enabled = |f: &str| features.contains(f);

    if has_avx512 && !enabled("avx512f") {
        return Some(format!(
            "Using AVX-512 intrinsics but attribute enables {features:?} (needs 'avx512f')"
        ));
    }
    if !has_avx512 && enabled("avx512f") {
        return Some("Attribute enables 'avx512f' but no AVX-512 intrinsics found".to_string());
    }
    if !enabled(required) {
        return Some(format!(
            "Attribute enables {features:?} but intrinsics need '{required}'"
        ));
    }
    None
}

fn check_fma_feature(features: &BTreeSet<String>, intrinsics: &HashSet<String>) -> Option<String> {
    let uses_fma = intrinsics.iter().any(|i| is_fma_intrinsic(i));
    (uses_fma && !features.contains("fma")).then(|| {
        "Using FMA intrinsics (_mm256_fmadd_ps, etc.) but 'fma' feature not enabled".to_string()
    })
}

/// Check one backend source for violations
fn check_source(
    filepath: &Path,
    content: &str,
    pattern: &IntrinsicPattern,
    matchers: &Matchers,
) -> Vec<Violation> {
    let lines: Vec<&str> = content.lines().collect();
    let mut violations = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = matchers.unsafe_fn.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let fn_name = caps[1].to_string();
        let fn_line = i;
        let (fn_end, intrinsics) = find_intrinsics_in_function(&lines, fn_line, &pattern.pattern);
        i = fn_end.max(i + 1);

        if intrinsics.is_empty() {
            continue;
        }

        let mut report = |level, message: String, fix_suggestion: String| {
            violations.push(Violation {
                level,
                filepath: filepath.to_path_buf(),
                line_num: fn_line + 1,
                function_name: fn_name.clone(),
                message,
                fix_suggestion,
            });
        };

        match matchers.target_features(&lines, fn_line) {
            None => report(
                ViolationLevel::Critical,
                format!(
                    "Missing #[target_feature] attribute (uses {} SIMD intrinsics)",
                    intrinsics.len()
                ),
                format!(
                    "Add #[target_feature(enable = \"{}\")] above function",
                    pattern.required_feature
                ),
            ),
            Some(features) => {
                if let Some(msg) =
                    check_attribute_mismatch(pattern.required_feature, &features, &intrinsics)
                {
                    report(
                        ViolationLevel::Error,
                        msg,
                        "Correct #[target_feature] attribute to match intrinsics used".to_string(),
                    );
                }
                if let Some(msg) = check_fma_feature(&features, &intrinsics) {
                    report(
                        ViolationLevel::Error,
                        msg,
                        "Use #[target_feature(enable = \"avx2,fma\")]".to_string(),
                    );
                }
            }
        }

        if !matchers.preceded_by(&matchers.safety, &lines, fn_line) {
            report(
                ViolationLevel::Warning,
                "Missing SAFETY comment for unsafe function with SIMD".to_string(),
                "Add a // SAFETY: comment stating the bounds the kernel relies on".to_string(),
            );
        }
        if !matchers.preceded_by(&matchers.inline, &lines, fn_line) {
            report(
                ViolationLevel::Warning,
                "Missing #[inline] attribute on SIMD hot path".to_string(),
                "Add #[inline] above function".to_string(),
            );
        }
    }

    violations
}

/// Backend sources under `root`, paired with their file stem
fn backend_files(root: &Path) -> Vec<(PathBuf, String)> {
    let mut files: Vec<_> = WalkDir::new(root)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .filter_map(|entry| {
            let stem = entry.path().file_stem()?.to_str()?.to_string();
            Some((entry.into_path(), stem))
        })
        .collect();
    files.sort();
    files
}

fn print_section(title: &str, violations: &[&Violation], warning: bool) {
    if violations.is_empty() {
        return;
    }
    let rule = "=".repeat(60);
    let header = format!("{title} ({})", violations.len());
    if warning {
        println!("\n{}\n{}\n{}\n", rule.yellow(), header.yellow().bold(), rule.yellow());
    } else {
        println!("\n{}\n{}\n{}\n", rule.red(), header.red().bold(), rule.red());
    }

    for v in violations.iter().take(10) {
        let location = format!("{}:{}", v.filepath.display(), v.line_num);
        let location = if warning { location.yellow() } else { location.red() };
        println!("  {} - {}", location, format!("{}()", v.function_name).cyan());
        println!("     {}: {}", "Problem".red(), v.message);
        println!("     {}: {}\n", "Fix".green(), v.fix_suggestion);
    }
    if violations.len() > 10 {
        println!("  {} more...\n", violations.len() - 10);
    }
}

/// Run the checker over `src/backends`
pub fn run() -> Result<()> {
    run_in(Path::new("src/backends"))
}

fn run_in(root: &Path) -> Result<()> {
    println!("{}", "SIMD Kernel Checker".blue().bold());
    println!("{}\n", "-".repeat(60).blue());

    if !root.is_dir() {
        anyhow::bail!("backend directory not found: {}", root.display());
    }

    let matchers = Matchers::new()?;
    let mut all = Vec::new();
    let mut checked = 0usize;

    for (path, stem) in backend_files(root) {
        let Some(pattern) = intrinsic_pattern(&stem)? else {
            continue;
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        all.extend(check_source(&path, &content, &pattern, &matchers));
        checked += 1;
    }

    let by_level = |level| all.iter().filter(|v| v.level == level).collect::<Vec<_>>();
    let critical = by_level(ViolationLevel::Critical);
    let errors = by_level(ViolationLevel::Error);
    let warnings = by_level(ViolationLevel::Warning);

    if all.is_empty() {
        println!(
            "{}",
            format!("PASS: {checked} backend files, all SIMD checks passed").green().bold()
        );
        return Ok(());
    }

    print_section("CRITICAL VIOLATIONS", &critical, false);
    print_section("ERRORS", &errors, false);
    print_section("WARNINGS", &warnings, true);

    if !critical.is_empty() || !errors.is_empty() {
        println!("{}", "COMMIT BLOCKED - fix CRITICAL/ERROR violations".red().bold());
        anyhow::bail!(
            "SIMD validation failed: {} critical, {} errors",
            critical.len(),
            errors.len()
        );
    }

    println!("{}", "COMMIT ALLOWED - only warnings present".green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(list: &str) -> BTreeSet<String> {
        list.split(',').map(str::to_string).collect()
    }

    fn intrinsics(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn check(backend: &str, content: &str) -> Vec<Violation> {
        let pattern = intrinsic_pattern(backend).unwrap().unwrap();
        let matchers = Matchers::new().unwrap();
        check_source(Path::new("test.rs"), content, &pattern, &matchers)
    }

    #[test]
    fn test_is_fma_intrinsic() {
        assert!(is_fma_intrinsic("_mm256_fmadd_ps"));
        assert!(is_fma_intrinsic("_mm256_fnmadd_ps"));
        assert!(!is_fma_intrinsic("_mm512_fmadd_ps"));
        assert!(!is_fma_intrinsic("_mm256_add_ps"));
    }

    #[test]
    fn test_intrinsic_patterns() {
        for backend in ["sse2", "avx2", "avx512", "neon", "wasm"] {
            assert!(intrinsic_pattern(backend).unwrap().is_some(), "{backend}");
        }
        assert!(intrinsic_pattern("scalar").unwrap().is_none());
        assert!(intrinsic_pattern("mod").unwrap().is_none());
    }

    #[test]
    fn test_neon_pattern_covers_fused_and_broadcast() {
        let pattern = intrinsic_pattern("neon").unwrap().unwrap().pattern;
        for name in ["vld1q_f32", "vst1q_f32", "vdupq_n_f32", "vfmaq_f32", "vfmsq_f32", "vdivq_f32"] {
            assert!(pattern.is_match(name), "{name}");
        }
    }

    #[test]
    fn test_wasm_pattern_covers_f64_widening() {
        let pattern = intrinsic_pattern("wasm").unwrap().unwrap().pattern;
        for name in ["f32x4_add", "f64x2_promote_low_f32x4", "i32x4_shuffle", "v128_load"] {
            assert!(pattern.is_match(name), "{name}");
        }
    }

    #[test]
    fn test_check_attribute_mismatch() {
        let avx512 = intrinsics(&["_mm512_add_ps"]);
        assert!(check_attribute_mismatch("avx512f", &features("avx2"), &avx512).is_some());
        assert!(check_attribute_mismatch("avx512f", &features("avx512f"), &avx512).is_none());

        let avx2 = intrinsics(&["_mm256_add_ps"]);
        assert!(check_attribute_mismatch("avx2", &features("sse2"), &avx2).is_some());
        assert!(check_attribute_mismatch("avx2", &features("avx2,fma"), &avx2).is_none());
        assert!(check_attribute_mismatch("avx2", &features("avx2,avx512f"), &avx2).is_some());
    }

    #[test]
    fn test_check_fma_feature() {
        let fma = intrinsics(&["_mm256_fmadd_ps"]);
        assert!(check_fma_feature(&features("avx2"), &fma).is_some());
        assert!(check_fma_feature(&features("avx2,fma"), &fma).is_none());
    }

    #[test]
    fn test_clean_kernel_passes() {
        let src = r#"
#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: loop stays in bounds
unsafe fn mul_add(dst: &mut [f32], a: &[f32], b: &[f32]) {
    let v = _mm256_fmadd_ps(x, y, z);
}
"#;
        assert!(check("avx2", src).is_empty());
    }

    #[test]
    fn test_missing_target_feature_is_critical() {
        let src = r#"
#[inline]
// SAFETY: loop stays in bounds
pub(crate) unsafe fn add(dst: &mut [f32]) {
    let v = _mm_add_ps(a, b);
}
"#;
        let violations = check("sse2", src);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].level, ViolationLevel::Critical);
        assert_eq!(violations[0].function_name, "add");
        assert_eq!(violations[0].line_num, 4);
    }

    #[test]
    fn test_fma_without_feature_and_missing_warnings() {
        let src = r#"
#[target_feature(enable = "avx2")]
unsafe fn mul_sub(dst: &mut [f32]) {
    let v = _mm256_fnmadd_ps(x, y, z);
}
"#;
        let mut levels: Vec<_> = check("avx2", src).iter().map(|v| v.level).collect();
        levels.sort();
        assert_eq!(
            levels,
            vec![ViolationLevel::Error, ViolationLevel::Warning, ViolationLevel::Warning]
        );
    }

    #[test]
    fn test_unsafe_fn_without_intrinsics_is_ignored() {
        let src = "unsafe fn helper() {\n    let x = 1;\n}\n";
        assert!(check("wasm", src).is_empty());
    }

    #[test]
    fn test_run_in_missing_directory() {
        let result = run_in(Path::new("does/not/exist"));
        assert!(result.is_err());
    }
}
