//! Subdomain derivation.
//!
//! Subdomains are derived once from the restaurant name when the record is
//! created. Collisions get a numeric suffix: `la-taberna`, `la-taberna-1`,
//! `la-taberna-2`, ...

const MAX_LABEL_LEN: usize = 63;
const FALLBACK: &str = "restaurante";
/// `-4294967295`
const MAX_SUFFIX_LEN: usize = 11;

/// DNS-label friendly form of a restaurant name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        let folded = fold_accent(ch);
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_LABEL_LEN {
        slug.truncate(MAX_LABEL_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        FALLBACK.to_string()
    } else {
        slug
    }
}

/// First candidate for `name` for which `is_taken` returns false.
pub fn derive_subdomain<F>(name: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let base = slugify(name);
    if !is_taken(&base) {
        return base;
    }

    let mut counter: u32 = 1;
    loop {
        let suffix = format!("-{}", counter);
        let mut stem = base.clone();
        stem.truncate(MAX_LABEL_LEN - suffix.len());
        let candidate = format!("{}{}", stem.trim_end_matches('-'), suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// SQL `LIKE` pattern matching `base` and every candidate derived from it.
///
/// Long bases are shortened to make room for the suffix, so the pattern is
/// built from the shortest stem any `u32` suffix can leave. It may also match
/// unrelated subdomains sharing that stem; callers only test membership.
pub fn candidate_pattern(base: &str) -> String {
    let mut stem = base.to_string();
    stem.truncate(MAX_LABEL_LEN - MAX_SUFFIX_LEN);
    let stem = stem.trim_end_matches('-');
    let escaped = stem.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("{}%", escaped)
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}
