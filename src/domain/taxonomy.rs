//! Category taxonomy: a two-level forest per kind (expense / income).

use serde::{Deserialize, Serialize};

use super::kind::TaxonomyKind;

/// Canonical separator between parent and child in a flattened path.
///
/// Chosen so it can never collide with a human-entered label.
pub const PATH_SEPARATOR: &str = "/::/";

/// Label used when a candidate cannot be placed anywhere
pub const UNCATEGORIZED: &str = "其他";

/// Icon shown for transfers and repayments
pub const TRANSFER_ICON: &str = "http://res3.qianjiapp.com/catev2/cate_icon_zhuanzhang.png";

/// A category node (parent or child)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub name: String,

    #[serde(default)]
    pub icon: String,

    /// Children (only one level deep)
    #[serde(default, alias = "subs")]
    pub children: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    pub fn leaf(name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            children: Vec::new(),
        }
    }

    pub fn parent(name: impl Into<String>, icon: impl Into<String>, children: Vec<TaxonomyNode>) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            children,
        }
    }
}

/// Join a parent and child into a flattened path
pub fn join_path(parent: &str, child: &str) -> String {
    format!("{}{}{}", parent, PATH_SEPARATOR, child)
}

/// Last segment of a flattened path
pub fn leaf_name(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path).trim()
}

/// Human display form: `parent > child`
pub fn display_path(path: &str) -> String {
    path.replace(PATH_SEPARATOR, " > ")
}

/// Flatten a forest into selectable paths.
///
/// A parent without children is itself selectable; a parent with children
/// only contributes its `parent/::/child` paths.
pub fn flatten_paths(nodes: &[TaxonomyNode]) -> Vec<String> {
    let mut paths = Vec::new();
    for node in nodes {
        if node.children.is_empty() {
            paths.push(node.name.clone());
        } else {
            for child in &node.children {
                paths.push(join_path(&node.name, &child.name));
            }
        }
    }
    paths
}

/// Every node of a forest, parents before their children
pub fn flatten_nodes(nodes: &[TaxonomyNode]) -> Vec<&TaxonomyNode> {
    let mut out = Vec::new();
    for node in nodes {
        out.push(node);
        out.extend(node.children.iter());
    }
    out
}

/// Check the sibling-uniqueness invariant; returns the first duplicate name
pub fn find_duplicate_sibling(nodes: &[TaxonomyNode]) -> Option<String> {
    fn dup_in(siblings: &[TaxonomyNode]) -> Option<String> {
        let mut seen = std::collections::HashSet::new();
        for node in siblings {
            if !seen.insert(node.name.as_str()) {
                return Some(node.name.clone());
            }
        }
        None
    }

    dup_in(nodes).or_else(|| nodes.iter().find_map(|n| dup_in(&n.children)))
}

fn expense_icon(slug: &str) -> String {
    format!("http://res3.qianjiapp.com/catev2/cate_icon_{}.png", slug)
}

fn income_icon(slug: &str) -> String {
    format!("http://res3.qianjiapp.com/cateic_{}.png", slug)
}

/// Starter forest used when the user has not configured categories yet
pub fn default_taxonomy(kind: TaxonomyKind) -> Vec<TaxonomyNode> {
    match kind {
        TaxonomyKind::Expense => vec![
            TaxonomyNode::parent(
                "餐饮",
                expense_icon("canyin"),
                vec![
                    TaxonomyNode::leaf("早餐", expense_icon("zaocan")),
                    TaxonomyNode::leaf("午餐", expense_icon("wucan")),
                    TaxonomyNode::leaf("晚餐", expense_icon("wancan")),
                ],
            ),
            TaxonomyNode::leaf("交通", expense_icon("jiaotong")),
            TaxonomyNode::leaf("购物", expense_icon("gouwu")),
            TaxonomyNode::leaf("娱乐", expense_icon("yule")),
        ],
        TaxonomyKind::Income => vec![
            TaxonomyNode::leaf("工资", income_icon("gongzi")),
            TaxonomyNode::leaf("兼职", income_icon("jianzhi")),
            TaxonomyNode::leaf("理财", income_icon("licai")),
            TaxonomyNode::leaf("礼金", income_icon("lijin")),
        ],
    }
}

/// Read-only reference library of categories and icons.
///
/// Broader than the starter set; used by the icon fallback chain so that a
/// category the user never created still gets a sensible icon.
pub fn builtin_taxonomy(kind: TaxonomyKind) -> Vec<TaxonomyNode> {
    let e = expense_icon;
    let i = income_icon;
    match kind {
        TaxonomyKind::Expense => vec![
            TaxonomyNode::parent(
                "三餐",
                e("sancan"),
                vec![
                    TaxonomyNode::leaf("早餐", e("zaocan")),
                    TaxonomyNode::leaf("午餐", e("wucan")),
                    TaxonomyNode::leaf("晚餐", e("wancan")),
                    TaxonomyNode::leaf("夜宵", e("yexiao")),
                ],
            ),
            TaxonomyNode::parent(
                "餐饮",
                e("canyin"),
                vec![
                    TaxonomyNode::leaf("零食", e("lingshi")),
                    TaxonomyNode::leaf("饮料", e("yinliao")),
                    TaxonomyNode::leaf("水果", e("shuiguo")),
                ],
            ),
            TaxonomyNode::parent(
                "交通",
                e("jiaotong"),
                vec![
                    TaxonomyNode::leaf("公共交通", e("gonggongjiaotong")),
                    TaxonomyNode::leaf("打车", e("dache")),
                    TaxonomyNode::leaf("加油", e("jiayou")),
                    TaxonomyNode::leaf("停车", e("tingche")),
                ],
            ),
            TaxonomyNode::parent(
                "购物",
                e("gouwu"),
                vec![
                    TaxonomyNode::leaf("服饰", e("fushi")),
                    TaxonomyNode::leaf("数码", e("shuma")),
                    TaxonomyNode::leaf("日用品", e("riyongpin")),
                ],
            ),
            TaxonomyNode::parent(
                "娱乐",
                e("yule"),
                vec![
                    TaxonomyNode::leaf("电影", e("dianying")),
                    TaxonomyNode::leaf("游戏", e("youxi")),
                ],
            ),
            TaxonomyNode::parent(
                "住房",
                e("zhufang"),
                vec![
                    TaxonomyNode::leaf("房租", e("fangzu")),
                    TaxonomyNode::leaf("水电", e("shuidian")),
                ],
            ),
            TaxonomyNode::parent(
                "通讯",
                e("tongxun"),
                vec![
                    TaxonomyNode::leaf("话费", e("huafei")),
                    TaxonomyNode::leaf("网费", e("wangfei")),
                ],
            ),
            TaxonomyNode::leaf("医疗", e("yiliao")),
            TaxonomyNode::leaf("学习", e("xuexi")),
            TaxonomyNode::leaf("其他", e("qita")),
        ],
        TaxonomyKind::Income => vec![
            TaxonomyNode::leaf("工资", i("gongzi")),
            TaxonomyNode::leaf("奖金", i("jiangjin")),
            TaxonomyNode::leaf("兼职", i("jianzhi")),
            TaxonomyNode::leaf("理财", i("licai")),
            TaxonomyNode::leaf("礼金", i("lijin")),
            TaxonomyNode::leaf("退款", i("tuikuan")),
            TaxonomyNode::leaf("其他", i("qita")),
        ],
    }
}
