//! Requested and granted access to typed, named resources
//!
//! Both sides of an authorization decision are expressed the same way: a
//! set of `(resource, action)` pairs. A request is allowed when every pair
//! it needs is also present in the set granted by a verified token.
//!
//! ```
//! use portcullis::access::{Access, AccessSet};
//!
//! let granted: AccessSet = vec![
//!     Access::new("repository", "lib/foo", "pull"),
//!     Access::new("repository", "lib/foo", "push"),
//! ]
//! .into_iter()
//! .collect();
//!
//! assert!(granted.contains(&Access::new("repository", "lib/foo", "pull")));
//! assert!(!granted.contains(&Access::new("repository", "lib/bar", "pull")));
//! assert_eq!(granted.scope_param(), "repository:lib/foo:pull,push");
//! ```

use std::{
    collections::{hash_map, HashMap, HashSet},
    fmt,
    iter::FromIterator,
    str::FromStr,
};

use aliri_braid::braid;
use serde::{Deserialize, Serialize};

use crate::error;

/// An action that may be taken on a resource, such as `pull` or `push`
#[braid(serde, ref_doc = "A borrowed reference to an [`Action`]")]
pub struct Action;

/// A typed, named protected entity, such as the repository `lib/foo`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resource {
    resource_type: String,
    name: String,
}

impl Resource {
    /// Constructs a resource of the given type and name
    #[inline]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// The resource type, e.g. `repository`
    #[inline]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The resource name, e.g. `lib/foo`
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.name)
    }
}

/// A single requested or granted permission
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Access {
    resource: Resource,
    action: Action,
}

impl Access {
    /// Constructs an access for `action` on the resource `resource_type:name`
    #[inline]
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        action: impl Into<Action>,
    ) -> Self {
        Self::for_resource(Resource::new(resource_type, name), action)
    }

    /// Constructs an access for `action` on an existing resource
    #[inline]
    pub fn for_resource(resource: Resource, action: impl Into<Action>) -> Self {
        Self {
            resource,
            action: action.into(),
        }
    }

    /// The resource being accessed
    #[inline]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The action being taken
    #[inline]
    pub fn action(&self) -> &ActionRef {
        &self.action
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// A set of actions
///
/// Membership checks are constant time. Enumeration through [`keys()`][Self::keys]
/// is always in lexicographic order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionSet(HashSet<Action>);

impl ActionSet {
    /// An empty set of actions
    #[inline]
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    /// Adds an action; adding an action already present has no effect
    #[inline]
    pub fn add(&mut self, action: impl Into<Action>) {
        self.0.insert(action.into());
    }

    /// Whether the action is a member of this set
    #[inline]
    #[must_use]
    pub fn contains(&self, action: &ActionRef) -> bool {
        self.0.contains(action)
    }

    /// The actions in this set, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<&ActionRef> {
        let mut keys: Vec<&ActionRef> = self.0.iter().map(|a| &**a).collect();
        keys.sort_unstable();
        keys
    }

    /// The number of actions in the set
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no actions
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<A: Into<Action>> Extend<A> for ActionSet {
    #[inline]
    fn extend<I: IntoIterator<Item = A>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl<A: Into<Action>> FromIterator<A> for ActionSet {
    #[inline]
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// A mapping from resources to the actions requested or granted on them
///
/// A resource only appears in the set when at least one action has been
/// recorded for it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessSet(HashMap<Resource, ActionSet>);

impl AccessSet {
    /// An empty access set
    #[inline]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Records an access
    pub fn add(&mut self, access: Access) {
        self.0
            .entry(access.resource)
            .or_default()
            .add(access.action);
    }

    /// Records every action in a resource grant
    ///
    /// A grant naming no actions leaves the set unchanged.
    pub fn add_grant(&mut self, grant: &ResourceActions) {
        if grant.actions.is_empty() {
            return;
        }

        let resource = Resource::new(grant.resource_type.clone(), grant.name.clone());
        self.0
            .entry(resource)
            .or_default()
            .extend(grant.actions.iter().cloned());
    }

    /// Whether the set satisfies a single access
    ///
    /// Resources and actions must match exactly; there is no wildcard
    /// matching.
    #[must_use]
    pub fn contains(&self, access: &Access) -> bool {
        self.0
            .get(&access.resource)
            .map_or(false, |actions| actions.contains(&access.action))
    }

    /// The actions recorded for a resource, if any
    #[inline]
    pub fn actions(&self, resource: &Resource) -> Option<&ActionSet> {
        self.0.get(resource)
    }

    /// The resources in the set, sorted by type and then name
    pub fn resources(&self) -> Vec<&Resource> {
        let mut resources: Vec<_> = self.0.keys().collect();
        resources.sort_unstable();
        resources
    }

    /// The number of distinct resources in the set
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no accesses
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the resources and their actions in arbitrary order
    #[inline]
    pub fn iter(&self) -> hash_map::Iter<'_, Resource, ActionSet> {
        self.0.iter()
    }

    /// The scope string describing this set, suitable for the `scope`
    /// parameter of a `WWW-Authenticate` challenge ([RFC 6750, Section 3][rfc])
    ///
    /// Each resource is rendered as `type:name:action,action` and the
    /// resources are joined by a single space. Resources and actions are
    /// both sorted so that equal sets always render identically.
    ///
    ///   [rfc]: https://tools.ietf.org/html/rfc6750#section-3
    #[must_use]
    pub fn scope_param(&self) -> String {
        let mut resources: Vec<_> = self.0.iter().collect();
        resources.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

        let scopes: Vec<String> = resources
            .into_iter()
            .map(|(resource, actions)| {
                let actions: Vec<&str> = actions.keys().into_iter().map(ActionRef::as_str).collect();
                format!("{}:{}", resource, actions.join(","))
            })
            .collect();

        scopes.join(" ")
    }

    /// Parses a space-separated scope string, as produced by
    /// [`scope_param()`][Self::scope_param]
    ///
    /// # Errors
    ///
    /// Returns an error if any scope item is not of the form
    /// `type:name:action[,action…]`.
    pub fn from_scope_param(scope: &str) -> Result<Self, error::InvalidScope> {
        let mut set = Self::new();
        for item in scope.split_whitespace() {
            let grant: ResourceActions = item.parse()?;
            set.add_grant(&grant);
        }
        Ok(set)
    }
}

impl Extend<Access> for AccessSet {
    fn extend<I: IntoIterator<Item = Access>>(&mut self, iter: I) {
        for access in iter {
            self.add(access);
        }
    }
}

impl FromIterator<Access> for AccessSet {
    fn from_iter<I: IntoIterator<Item = Access>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> FromIterator<&'a Access> for AccessSet {
    fn from_iter<I: IntoIterator<Item = &'a Access>>(iter: I) -> Self {
        iter.into_iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a AccessSet {
    type Item = (&'a Resource, &'a ActionSet);
    type IntoIter = hash_map::Iter<'a, Resource, ActionSet>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A resource together with a list of actions, as carried in the `access`
/// claim of a token
///
/// ```json
/// { "type": "repository", "name": "lib/foo", "actions": ["pull", "push"] }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceActions {
    /// The resource type
    #[serde(rename = "type")]
    pub resource_type: String,

    /// The resource name
    pub name: String,

    /// The actions granted on the resource
    pub actions: Vec<Action>,
}

impl ResourceActions {
    /// Groups actions on the resource `resource_type:name`
    pub fn new<I, A>(resource_type: impl Into<String>, name: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Action>,
    {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Parses a single scope item of the form `type:name:action[,action…]`
///
/// The type ends at the first `:` and the actions start after the last `:`,
/// so resource names may themselves contain colons (e.g. `host:5000/lib/foo`).
impl FromStr for ResourceActions {
    type Err = error::InvalidScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || error::invalid_scope(s);

        let (resource_type, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (name, actions) = rest.rsplit_once(':').ok_or_else(invalid)?;

        if resource_type.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        let actions: Vec<Action> = actions
            .split(',')
            .filter(|a| !a.is_empty())
            .map(Action::from)
            .collect();

        if actions.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            resource_type: resource_type.to_owned(),
            name: name.to_owned(),
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use color_eyre::Result;

    use super::*;

    fn pull(name: &str) -> Access {
        Access::new("repository", name, "pull")
    }

    fn push(name: &str) -> Access {
        Access::new("repository", name, "push")
    }

    #[test]
    fn duplicate_accesses_do_not_change_membership() {
        let once: AccessSet = vec![pull("lib/foo"), push("lib/foo")].into_iter().collect();
        let repeated: AccessSet = vec![
            pull("lib/foo"),
            push("lib/foo"),
            pull("lib/foo"),
            pull("lib/foo"),
        ]
        .into_iter()
        .collect();

        assert_eq!(once, repeated);
        assert!(repeated.contains(&pull("lib/foo")));
        assert!(repeated.contains(&push("lib/foo")));
        assert_eq!(repeated.actions(pull("lib/foo").resource()).map(ActionSet::len), Some(2));
    }

    #[test]
    fn input_order_does_not_matter() {
        let forward: AccessSet = vec![pull("a"), push("b"), push("a")].into_iter().collect();
        let backward: AccessSet = vec![push("a"), push("b"), pull("a")].into_iter().collect();

        assert_eq!(forward, backward);
        assert_eq!(forward.scope_param(), backward.scope_param());
    }

    #[test]
    fn contains_requires_an_exact_match() {
        let set: AccessSet = vec![pull("lib/foo")].into_iter().collect();

        assert!(set.contains(&pull("lib/foo")));
        assert!(!set.contains(&push("lib/foo")));
        assert!(!set.contains(&pull("lib/foo/bar")));
        assert!(!set.contains(&pull("lib/*")));
        assert!(!set.contains(&Access::new("registry", "lib/foo", "pull")));
        assert!(!set.contains(&Access::new("repository", "lib/foo", "*")));
    }

    #[test]
    fn empty_set_contains_nothing() {
        let set = AccessSet::new();
        assert!(set.is_empty());
        assert!(!set.contains(&pull("lib/foo")));
        assert_eq!(set.scope_param(), "");
    }

    #[test]
    fn action_keys_are_sorted() {
        let actions: ActionSet = vec!["push", "delete", "pull", "push"].into_iter().collect();
        let keys: Vec<&str> = actions.keys().into_iter().map(ActionRef::as_str).collect();
        assert_eq!(keys, ["delete", "pull", "push"]);
    }

    #[test]
    fn scope_param_renders_each_resource() {
        let set: AccessSet = vec![
            push("lib/foo"),
            pull("lib/foo"),
            pull("lib/bar"),
            Access::new("registry", "catalog", "*"),
        ]
        .into_iter()
        .collect();

        let scope = set.scope_param();
        let items: BTreeSet<&str> = scope.split(' ').collect();

        let expected = BTreeSet::from([
            "registry:catalog:*",
            "repository:lib/bar:pull",
            "repository:lib/foo:pull,push",
        ]);

        assert_eq!(items, expected);
        assert_eq!(
            scope,
            "registry:catalog:* repository:lib/bar:pull repository:lib/foo:pull,push"
        );
    }

    #[test]
    fn scope_param_parses_back_into_the_same_set() -> Result<()> {
        let set: AccessSet = vec![pull("lib/foo"), push("lib/foo"), pull("other")]
            .into_iter()
            .collect();

        let parsed = AccessSet::from_scope_param(&set.scope_param())?;
        assert_eq!(parsed, set);
        Ok(())
    }

    #[test]
    fn resource_names_may_contain_colons() -> Result<()> {
        let grant: ResourceActions = "repository:localhost:5000/lib/foo:pull,push".parse()?;

        assert_eq!(grant.resource_type, "repository");
        assert_eq!(grant.name, "localhost:5000/lib/foo");
        assert_eq!(grant.actions, vec![Action::from("pull"), Action::from("push")]);
        Ok(())
    }

    #[test]
    fn malformed_scope_items_are_rejected() {
        for scope in [
            "repository",
            "repository:lib/foo",
            "repository:lib/foo:",
            ":lib/foo:pull",
            "repository::pull",
        ] {
            assert!(
                scope.parse::<ResourceActions>().is_err(),
                "expected {scope:?} to be rejected"
            );
        }
    }

    #[test]
    fn grants_without_actions_leave_no_resource_behind() {
        let mut set = AccessSet::new();
        set.add_grant(&ResourceActions::new("repository", "lib/foo", Vec::<Action>::new()));

        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn grant_claims_deserialize() -> Result<()> {
        const GRANT: &str = r#"{"type":"repository","name":"lib/foo","actions":["pull","push"]}"#;

        let grant: ResourceActions = serde_json::from_str(GRANT)?;
        assert_eq!(grant, ResourceActions::new("repository", "lib/foo", ["pull", "push"]));
        Ok(())
    }
}
