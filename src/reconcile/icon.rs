//! Icon fallback chain.

use crate::domain::taxonomy::{builtin_taxonomy, flatten_nodes};
use crate::domain::{TaxonomyKind, TaxonomyNode};

const MEAL_TOKENS: &[&str] = &[
    "早", "午", "晚", "饭", "breakfast", "lunch", "dinner", "meal", "morning", "noon", "evening",
];

const MEAL_CATEGORIES: &[&str] = &["三餐", "餐饮", "meals"];

fn exact<'a>(nodes: &[&'a TaxonomyNode], name: &str) -> Option<&'a TaxonomyNode> {
    nodes
        .iter()
        .copied()
        .find(|n| n.name == name && !n.icon.is_empty())
}

/// Resolve an icon for a category leaf name.
///
/// 1. user tree of the candidate's kind, exact name
/// 2. built-in expense and income trees, exact name
/// 3. built-in containment either way, longest name first
/// 4. meal words to the meals category
///
/// Returns an empty string when nothing fits.
pub fn resolve_icon(name: &str, kind: TaxonomyKind, user_nodes: &[TaxonomyNode]) -> String {
    let name = name.trim();
    if name.is_empty() {
        return String::new();
    }

    let user = flatten_nodes(user_nodes);
    if let Some(node) = exact(&user, name) {
        return node.icon.clone();
    }

    let expense = builtin_taxonomy(TaxonomyKind::Expense);
    let income = builtin_taxonomy(TaxonomyKind::Income);
    // Search the candidate's own kind first so shared names ("其他") pick the right icon
    let (first, second) = match kind {
        TaxonomyKind::Expense => (&expense, &income),
        TaxonomyKind::Income => (&income, &expense),
    };
    let mut builtin = flatten_nodes(first);
    builtin.extend(flatten_nodes(second));

    if let Some(node) = exact(&builtin, name) {
        return node.icon.clone();
    }

    let mut containing: Vec<&TaxonomyNode> = builtin
        .iter()
        .copied()
        .filter(|n| !n.icon.is_empty() && !n.name.is_empty())
        .filter(|n| name.contains(n.name.as_str()) || n.name.contains(name))
        .collect();
    containing.sort_by_key(|n| std::cmp::Reverse(n.name.chars().count()));
    if let Some(node) = containing.first() {
        return node.icon.clone();
    }

    let lower = name.to_lowercase();
    if MEAL_TOKENS.iter().any(|t| lower.contains(t)) {
        let meals = builtin.iter().find(|n| {
            !n.icon.is_empty() && MEAL_CATEGORIES.iter().any(|m| n.name.to_lowercase().contains(m))
        });
        if let Some(node) = meals {
            return node.icon.clone();
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icon_of(kind: TaxonomyKind, name: &str) -> String {
        flatten_nodes(&builtin_taxonomy(kind))
            .into_iter()
            .find(|n| n.name == name)
            .map(|n| n.icon.clone())
            .unwrap()
    }

    #[test]
    fn test_user_icon_wins() {
        let user = vec![TaxonomyNode::leaf("交通", "user://bus.png")];
        assert_eq!(resolve_icon("交通", TaxonomyKind::Expense, &user), "user://bus.png");
    }

    #[test]
    fn test_user_node_without_icon_falls_through() {
        let user = vec![TaxonomyNode::leaf("交通", "")];
        assert_eq!(
            resolve_icon("交通", TaxonomyKind::Expense, &user),
            icon_of(TaxonomyKind::Expense, "交通")
        );
    }

    #[test]
    fn test_builtin_exact_across_kinds() {
        assert_eq!(
            resolve_icon("工资", TaxonomyKind::Expense, &[]),
            icon_of(TaxonomyKind::Income, "工资")
        );
    }

    #[test]
    fn test_containment_prefers_longest() {
        assert_eq!(
            resolve_icon("公共交通卡", TaxonomyKind::Expense, &[]),
            icon_of(TaxonomyKind::Expense, "公共交通")
        );
    }

    #[test]
    fn test_meal_fallback() {
        assert_eq!(
            resolve_icon("吃早饭", TaxonomyKind::Expense, &[]),
            icon_of(TaxonomyKind::Expense, "三餐")
        );
        assert_eq!(
            resolve_icon("Team lunch", TaxonomyKind::Expense, &[]),
            icon_of(TaxonomyKind::Expense, "三餐")
        );
    }

    #[test]
    fn test_no_icon() {
        assert_eq!(resolve_icon("宠物", TaxonomyKind::Expense, &[]), "");
        assert_eq!(resolve_icon("", TaxonomyKind::Expense, &[]), "");
    }
}
