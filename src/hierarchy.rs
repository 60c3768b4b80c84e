//! Account hierarchy and fairshare derivation.
//!
//! Everything here is computed from a flat association listing and
//! nothing else. Trees are rebuilt from a fresh listing on every
//! query and never cached across calls.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::errors::{Error, Result};
use crate::models::Association;

/// One account in the flat tree index.
#[derive(Debug, Clone, Default)]
pub struct AccountTreeNode {
    pub name: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    /// User names with a user-level association under this account.
    pub users: Vec<String>,
    pub associations: Vec<Association>,
}

/// Numeric limits attached to an account, aggregated from its
/// associations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountQuota {
    pub max_jobs: Option<u32>,
    pub max_submit_jobs: Option<u32>,
    pub max_wall_per_job: Option<u32>,
    pub max_cpus: Option<u32>,
    pub max_nodes: Option<u32>,
    pub max_memory: Option<u64>,
}

/// Historical usage attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountUsage {
    pub cpu_seconds: u64,
    pub user_count: usize,
}

/// A recursive view of the account hierarchy from one root.
#[derive(Debug, Clone, Default)]
pub struct AccountHierarchy {
    pub account: String,
    pub level: usize,
    /// Path from the walk's root down to this account, inclusive.
    pub path: Vec<String>,
    /// Users here plus users in every subtree.
    pub total_users: usize,
    /// Accounts in every subtree, excluding this one.
    pub total_sub_accounts: usize,
    pub children: Vec<AccountHierarchy>,
    pub quota: Option<AccountQuota>,
    pub usage: Option<AccountUsage>,
}

/// A node of the fairshare tree.
#[derive(Debug, Clone, Default)]
pub struct FairShareNode {
    pub name: String,
    pub parent: Option<String>,
    /// Raw shares summed across every association of this account.
    pub shares: u32,
    pub level: usize,
    pub children: Vec<FairShareNode>,
}

/// Per-user fairshare entry extracted from one association.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserFairShare {
    pub user_name: String,
    pub account: String,
    pub cluster: String,
    pub partition: Option<String>,
    pub raw_shares: u32,
}

/// A user's limits aggregated across all their associations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserQuota {
    pub user_name: String,
    pub default_account: Option<String>,
    pub max_jobs: Option<u32>,
    pub max_submit_jobs: Option<u32>,
    pub max_wall_per_job: Option<u32>,
}

/// Build the account tree index from a flat association listing.
///
/// Pass 1 creates one node per distinct account name and attaches
/// associations and users. Pass 2 links children to parents via each
/// association's declared parent, skipping self-parent and duplicate
/// links and implicitly creating nodes for unseen parent names.
pub fn build_account_tree(associations: &[Association]) -> BTreeMap<String, AccountTreeNode> {
    let mut tree: BTreeMap<String, AccountTreeNode> = BTreeMap::new();

    for assoc in associations {
        if assoc.account.is_empty() {
            continue;
        }
        let node = tree
            .entry(assoc.account.clone())
            .or_insert_with(|| AccountTreeNode {
                name: assoc.account.clone(),
                ..AccountTreeNode::default()
            });
        node.associations.push(assoc.clone());
        if !assoc.user.is_empty() && !node.users.contains(&assoc.user) {
            node.users.push(assoc.user.clone());
        }
    }

    for assoc in associations {
        let Some(parent_name) = assoc.parent_account.as_deref() else {
            continue;
        };
        if assoc.account.is_empty() || parent_name.is_empty() || parent_name == assoc.account {
            continue;
        }

        let parent = tree
            .entry(parent_name.to_string())
            .or_insert_with(|| AccountTreeNode {
                name: parent_name.to_string(),
                ..AccountTreeNode::default()
            });
        if !parent.children.contains(&assoc.account) {
            parent.children.push(assoc.account.clone());
        }

        if let Some(child) = tree.get_mut(&assoc.account) {
            child.parent = Some(parent_name.to_string());
        }
    }

    tree
}

/// Walk the hierarchy from `root`, accumulating user and sub-account
/// totals bottom-up and attaching aggregate quota and usage.
pub fn account_hierarchy(root: &str, associations: &[Association]) -> Result<AccountHierarchy> {
    if root.is_empty() {
        return Err(Error::validation("account", "root account name is required"));
    }

    let tree = build_account_tree(associations);
    if !tree.contains_key(root) {
        return Err(Error::NotFound {
            resource: "account",
            id: root.to_string(),
        });
    }

    let mut lineage = HashSet::new();
    Ok(walk_hierarchy(root, &tree, 0, &[], &mut lineage))
}

fn walk_hierarchy(
    name: &str,
    tree: &BTreeMap<String, AccountTreeNode>,
    level: usize,
    path: &[String],
    lineage: &mut HashSet<String>,
) -> AccountHierarchy {
    let mut own_path = path.to_vec();
    own_path.push(name.to_string());

    let mut hierarchy = AccountHierarchy {
        account: name.to_string(),
        level,
        path: own_path.clone(),
        ..AccountHierarchy::default()
    };

    let Some(node) = tree.get(name) else {
        return hierarchy;
    };

    hierarchy.total_users = node.users.len();
    hierarchy.quota = aggregate_account_quota(&node.associations);
    hierarchy.usage = aggregate_account_usage(node);

    lineage.insert(name.to_string());
    for child_name in &node.children {
        // Guards against malformed listings that already contain a
        // cycle; such links are dropped rather than recursed into.
        if lineage.contains(child_name) {
            debug!("dropping cyclic child link {child_name} under {name}");
            continue;
        }
        let child = walk_hierarchy(child_name, tree, level + 1, &own_path, lineage);
        hierarchy.total_users += child.total_users;
        hierarchy.total_sub_accounts += 1 + child.total_sub_accounts;
        hierarchy.children.push(child);
    }
    lineage.remove(name);

    hierarchy
}

/// Validate linking `account` under `proposed_parent`.
///
/// Self-parenting is rejected outright; otherwise the proposed
/// parent's own ancestor chain is walked before anything else to
/// reject cycles.
pub fn validate_hierarchy(
    account: &str,
    proposed_parent: &str,
    associations: &[Association],
) -> Result<()> {
    if account.is_empty() {
        return Err(Error::validation("account", "account name is required"));
    }
    if account == proposed_parent {
        return Err(Error::InvalidHierarchy(format!(
            "account {account} cannot be its own parent"
        )));
    }

    let tree = build_account_tree(associations);
    let mut seen = HashSet::new();
    let mut current = proposed_parent.to_string();

    while let Some(node) = tree.get(&current) {
        if !seen.insert(current.clone()) {
            break;
        }
        let Some(parent) = node.parent.clone() else {
            break;
        };
        if parent == account {
            return Err(Error::CircularDependency(format!(
                "linking {account} under {proposed_parent} would create a cycle through {current}"
            )));
        }
        current = parent;
    }

    Ok(())
}

/// Build the fairshare tree rooted at `root`.
///
/// Shares are summed across *all* associations of an account, the
/// parent comes from the first matching association, and children are
/// discovered by rescanning the full listing per node.
pub fn fairshare_tree(root: &str, associations: &[Association]) -> FairShareNode {
    let mut lineage = HashSet::new();
    build_fairshare_node(root, associations, 0, &mut lineage)
}

fn build_fairshare_node(
    name: &str,
    associations: &[Association],
    level: usize,
    lineage: &mut HashSet<String>,
) -> FairShareNode {
    let mut node = FairShareNode {
        name: name.to_string(),
        level,
        ..FairShareNode::default()
    };

    for assoc in associations {
        if assoc.account == name {
            node.shares += assoc.shares_raw;
            if node.parent.is_none() {
                node.parent = assoc
                    .parent_account
                    .clone()
                    .filter(|p| !p.is_empty() && p != name);
            }
        }
    }

    lineage.insert(name.to_string());
    for child_name in find_child_accounts(associations, name) {
        if lineage.contains(&child_name) {
            continue;
        }
        node.children
            .push(build_fairshare_node(&child_name, associations, level + 1, lineage));
    }
    lineage.remove(name);

    node
}

/// Direct children of `parent`, first-seen order, deduplicated.
pub fn find_child_accounts(associations: &[Association], parent: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut children = Vec::new();

    for assoc in associations {
        if assoc.parent_account.as_deref() == Some(parent)
            && !assoc.account.is_empty()
            && assoc.account != parent
            && seen.insert(assoc.account.clone())
        {
            children.push(assoc.account.clone());
        }
    }

    children
}

/// The priority in effect for an association.
///
/// An association's own non-zero priority is authoritative; a zero
/// priority inherits the nearest non-zero ancestor's priority by
/// walking parent links.
pub fn effective_priority(assoc: &Association, associations: &[Association]) -> u32 {
    if assoc.priority != 0 {
        return assoc.priority;
    }

    let tree = build_account_tree(associations);
    let mut seen = HashSet::new();
    let mut current = assoc.account.clone();

    while let Some(node) = tree.get(&current) {
        if !seen.insert(current.clone()) {
            break;
        }
        if let Some(priority) = node
            .associations
            .iter()
            .filter(|a| a.is_account_level())
            .map(|a| a.priority)
            .find(|p| *p != 0)
        {
            return priority;
        }
        match node.parent.clone() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    0
}

/// Aggregate quota for one account's associations.
///
/// The account-level association (empty user) is authoritative when
/// present. Otherwise the **maximum** of each numeric limit across
/// the user-level associations is taken: the most permissive observed
/// configuration, never a sum.
pub fn aggregate_account_quota(associations: &[Association]) -> Option<AccountQuota> {
    if let Some(account_level) = associations.iter().find(|a| a.is_account_level()) {
        return Some(quota_of(account_level));
    }

    let mut quota: Option<AccountQuota> = None;
    for assoc in associations {
        let candidate = quota_of(assoc);
        quota = Some(match quota {
            None => candidate,
            Some(current) => max_quota(current, &candidate),
        });
    }
    quota
}

fn aggregate_account_usage(node: &AccountTreeNode) -> Option<AccountUsage> {
    let cpu_seconds: u64 = node
        .associations
        .iter()
        .filter_map(|a| a.usage_seconds)
        .sum();
    if cpu_seconds == 0 && node.users.is_empty() {
        return None;
    }
    Some(AccountUsage {
        cpu_seconds,
        user_count: node.users.len(),
    })
}

fn quota_of(assoc: &Association) -> AccountQuota {
    AccountQuota {
        max_jobs: assoc.max_jobs,
        max_submit_jobs: assoc.max_submit_jobs,
        max_wall_per_job: assoc.max_wall_per_job,
        max_cpus: assoc.max_cpus,
        max_nodes: assoc.max_nodes,
        max_memory: assoc.max_memory,
    }
}

fn max_opt<T: Ord + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (value, None) | (None, value) => value,
    }
}

fn max_quota(a: AccountQuota, b: &AccountQuota) -> AccountQuota {
    AccountQuota {
        max_jobs: max_opt(a.max_jobs, b.max_jobs),
        max_submit_jobs: max_opt(a.max_submit_jobs, b.max_submit_jobs),
        max_wall_per_job: max_opt(a.max_wall_per_job, b.max_wall_per_job),
        max_cpus: max_opt(a.max_cpus, b.max_cpus),
        max_nodes: max_opt(a.max_nodes, b.max_nodes),
        max_memory: max_opt(a.max_memory, b.max_memory),
    }
}

/// Every fairshare entry for one user across their associations.
pub fn user_fairshare(associations: &[Association], user: &str) -> Vec<UserFairShare> {
    associations
        .iter()
        .filter(|a| a.user == user)
        .map(|a| UserFairShare {
            user_name: a.user.clone(),
            account: a.account.clone(),
            cluster: a.cluster.clone(),
            partition: a.partition.clone(),
            raw_shares: a.shares_raw,
        })
        .collect()
}

/// A user's limits aggregated across all their associations:
/// per-field maximum, tracking the default account.
pub fn aggregate_user_quota(associations: &[Association], user: &str) -> UserQuota {
    let mut quota = UserQuota {
        user_name: user.to_string(),
        ..UserQuota::default()
    };

    for assoc in associations.iter().filter(|a| a.user == user) {
        if assoc.is_default {
            quota.default_account = Some(assoc.account.clone());
        }
        quota.max_jobs = max_opt(quota.max_jobs, assoc.max_jobs);
        quota.max_submit_jobs = max_opt(quota.max_submit_jobs, assoc.max_submit_jobs);
        quota.max_wall_per_job = max_opt(quota.max_wall_per_job, assoc.max_wall_per_job);
    }

    quota
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assoc(account: &str, user: &str, parent: Option<&str>) -> Association {
        Association {
            account: account.to_string(),
            user: user.to_string(),
            cluster: "main".to_string(),
            parent_account: parent.map(str::to_string),
            ..Association::default()
        }
    }

    fn sample_tree() -> Vec<Association> {
        vec![
            assoc("root", "", None),
            assoc("parent1", "", Some("root")),
            assoc("child1", "", Some("parent1")),
            assoc("child1", "alice", Some("parent1")),
            assoc("child1", "bob", Some("parent1")),
        ]
    }

    #[test]
    fn tree_links_children_and_collects_users() {
        let tree = build_account_tree(&sample_tree());

        assert_eq!(tree["root"].children, vec!["parent1"]);
        assert_eq!(tree["parent1"].children, vec!["child1"]);
        assert_eq!(tree["child1"].users, vec!["alice", "bob"]);
        assert_eq!(tree["child1"].parent.as_deref(), Some("parent1"));
    }

    #[test]
    fn tree_creates_implicit_parent_nodes() {
        let associations = vec![assoc("leaf", "", Some("ghost"))];
        let tree = build_account_tree(&associations);
        assert!(tree.contains_key("ghost"));
        assert_eq!(tree["ghost"].children, vec!["leaf"]);
        assert!(tree["ghost"].associations.is_empty());
    }

    #[test]
    fn tree_skips_self_parent_and_duplicate_links() {
        let associations = vec![
            assoc("a", "", Some("a")),
            assoc("b", "", Some("a")),
            assoc("b", "alice", Some("a")),
        ];
        let tree = build_account_tree(&associations);
        assert!(tree["a"].children.iter().all(|c| c != "a"));
        assert_eq!(tree["a"].children.iter().filter(|c| *c == "b").count(), 1);
    }

    #[test]
    fn hierarchy_depth_and_totals() {
        let hierarchy = account_hierarchy("root", &sample_tree()).unwrap();

        assert_eq!(hierarchy.children.len(), 1);
        let parent1 = &hierarchy.children[0];
        assert_eq!(parent1.children.len(), 1);
        let child1 = &parent1.children[0];
        assert_eq!(child1.level, 2);
        assert_eq!(child1.path, vec!["root", "parent1", "child1"]);

        assert_eq!(hierarchy.total_sub_accounts, 2);
        assert_eq!(hierarchy.total_users, 2);
    }

    #[test]
    fn hierarchy_unknown_root_is_not_found() {
        assert!(matches!(
            account_hierarchy("nope", &sample_tree()),
            Err(Error::NotFound { resource: "account", .. })
        ));
    }

    #[test]
    fn validate_rejects_self_parenting() {
        assert!(matches!(
            validate_hierarchy("a", "a", &[]),
            Err(Error::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn validate_rejects_ancestry_cycles() {
        // child1 already sits below parent1; linking parent1 under
        // child1 would close the loop.
        let err = validate_hierarchy("parent1", "child1", &sample_tree()).unwrap_err();
        assert!(matches!(err, Error::CircularDependency(_)));

        // Linking a fresh account anywhere is fine.
        assert!(validate_hierarchy("newacct", "child1", &sample_tree()).is_ok());
    }

    #[test]
    fn quota_uses_max_across_user_associations() {
        let mut a = assoc("physics", "alice", None);
        a.max_jobs = Some(10);
        a.max_wall_per_job = Some(60);
        let mut b = assoc("physics", "bob", None);
        b.max_jobs = Some(20);
        b.max_submit_jobs = Some(5);

        let quota = aggregate_account_quota(&[a, b]).unwrap();
        assert_eq!(quota.max_jobs, Some(20));
        assert_eq!(quota.max_submit_jobs, Some(5));
        assert_eq!(quota.max_wall_per_job, Some(60));
    }

    #[test]
    fn account_level_association_overrides_user_maxima() {
        let mut account_level = assoc("physics", "", None);
        account_level.max_jobs = Some(8);
        let mut user_level = assoc("physics", "alice", None);
        user_level.max_jobs = Some(100);

        let quota = aggregate_account_quota(&[user_level, account_level]).unwrap();
        assert_eq!(quota.max_jobs, Some(8));
    }

    #[test]
    fn fairshare_sums_shares_across_all_associations() {
        let mut a = assoc("physics", "", Some("root"));
        a.shares_raw = 100;
        let mut b = assoc("physics", "alice", Some("root"));
        b.shares_raw = 50;
        let root = assoc("root", "", None);

        let tree = fairshare_tree("root", &[root, a, b]);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "physics");
        assert_eq!(tree.children[0].shares, 150);
        assert_eq!(tree.children[0].parent.as_deref(), Some("root"));
        assert_eq!(tree.children[0].level, 1);
    }

    #[test]
    fn zero_priority_inherits_nearest_nonzero_ancestor() {
        let mut root = assoc("root", "", None);
        root.priority = 500;
        let mid = assoc("mid", "", Some("root"));
        let mut leaf = assoc("leaf", "alice", None);
        leaf.account = "mid".to_string();

        let all = vec![root, mid, leaf.clone()];
        assert_eq!(effective_priority(&leaf, &all), 500);

        leaf.priority = 7;
        assert_eq!(effective_priority(&leaf, &all), 7);
    }

    #[test]
    fn user_quota_aggregates_with_max_and_tracks_default() {
        let mut a = assoc("physics", "alice", None);
        a.max_jobs = Some(10);
        let mut b = assoc("chemistry", "alice", None);
        b.max_jobs = Some(20);
        b.is_default = true;

        let quota = aggregate_user_quota(&[a, b], "alice");
        assert_eq!(quota.max_jobs, Some(20));
        assert_eq!(quota.default_account.as_deref(), Some("chemistry"));
    }
}
