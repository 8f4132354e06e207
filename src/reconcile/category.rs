//! Category path resolution against the user's flattened taxonomy.

use crate::domain::taxonomy::{leaf_name, PATH_SEPARATOR, UNCATEGORIZED};

/// Map the separators models like to emit onto the canonical one
pub fn normalize_path(raw: &str) -> String {
    raw.replace(" > ", PATH_SEPARATOR)
        .replace(" - ", PATH_SEPARATOR)
        .replace(" / ", PATH_SEPARATOR)
        .trim()
        .to_string()
}

/// First matching entry: exact, `…/::/input`, `input/::/…`, then containment
/// in either direction.
pub fn find_best_match(input: &str, paths: &[String]) -> Option<String> {
    if input.is_empty() {
        return None;
    }

    let suffix = format!("{}{}", PATH_SEPARATOR, input);
    let prefix = format!("{}{}", input, PATH_SEPARATOR);

    paths
        .iter()
        .find(|p| p.as_str() == input)
        .or_else(|| paths.iter().find(|p| p.ends_with(&suffix)))
        .or_else(|| paths.iter().find(|p| p.starts_with(&prefix)))
        .or_else(|| {
            paths
                .iter()
                .find(|p| !p.is_empty() && (p.contains(input) || input.contains(p.as_str())))
        })
        .cloned()
}

/// Entry to use when nothing matched
pub fn fallback_category(paths: &[String]) -> String {
    paths
        .iter()
        .find(|p| p.contains(UNCATEGORIZED) || p.to_lowercase().contains("other"))
        .or_else(|| paths.first())
        .cloned()
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}

/// Resolve a raw category against `paths`.
///
/// A blank input stays uncategorized. A non-blank input always resolves to
/// something: a match on the full path, a match on its leaf, or the fallback.
pub fn resolve_category(raw: Option<&str>, paths: &[String]) -> Option<String> {
    let input = normalize_path(raw.unwrap_or_default());
    if input.is_empty() {
        return None;
    }

    let matched = find_best_match(&input, paths).or_else(|| {
        let leaf = leaf_name(&input);
        if leaf != input {
            find_best_match(leaf, paths)
        } else {
            None
        }
    });

    Some(matched.unwrap_or_else(|| {
        tracing::debug!(category = %input, "No category match, using fallback");
        fallback_category(paths)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_path(" 餐饮 > 午餐 "), "餐饮/::/午餐");
        assert_eq!(normalize_path("餐饮 - 午餐"), "餐饮/::/午餐");
        assert_eq!(normalize_path("餐饮 / 午餐"), "餐饮/::/午餐");
        assert_eq!(normalize_path("a/b"), "a/b");
    }

    #[test]
    fn test_match_order() {
        let p = paths(&["吃饭/::/午餐", "吃饭", "交通/::/打车", "午餐会"]);
        assert_eq!(find_best_match("吃饭", &p), Some("吃饭".into()));
        assert_eq!(find_best_match("午餐", &p), Some("吃饭/::/午餐".into()));
        assert_eq!(find_best_match("交通", &p), Some("交通/::/打车".into()));
        assert_eq!(find_best_match("午餐会议", &p), Some("午餐会".into()));
        assert_eq!(find_best_match("打车去机场", &p), None);
        assert_eq!(find_best_match("", &p), None);
    }

    #[test]
    fn test_containment_both_directions() {
        let p = paths(&["购物"]);
        assert_eq!(find_best_match("网上购物", &p), Some("购物".into()));
        let p = paths(&["日常购物"]);
        assert_eq!(find_best_match("购物", &p), Some("日常购物".into()));
    }

    #[test]
    fn test_fallback_prefers_other() {
        assert_eq!(fallback_category(&paths(&["交通", "其他/::/杂项"])), "其他/::/杂项");
        assert_eq!(fallback_category(&paths(&["Transit", "Other"])), "Other");
        assert_eq!(fallback_category(&paths(&["交通", "购物"])), "交通");
        assert_eq!(fallback_category(&[]), "其他");
    }

    #[test]
    fn test_resolve_category() {
        let p = paths(&["餐饮/::/午餐", "交通", "其他"]);
        assert_eq!(resolve_category(Some("餐饮 > 午餐"), &p), Some("餐饮/::/午餐".into()));
        assert_eq!(resolve_category(Some("Food/::/午餐"), &p), Some("餐饮/::/午餐".into()));
        assert_eq!(resolve_category(Some("宠物"), &p), Some("其他".into()));
        assert_eq!(resolve_category(Some("  "), &p), None);
        assert_eq!(resolve_category(None, &p), None);
    }
}
