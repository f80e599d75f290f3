//! Operation catalog
//!
//! Static table of every WebHDFS operation the engine knows: its HTTP method,
//! the option keys a caller may supply, and whether the data must be moved
//! through the NameNode redirect. Built once per process and never mutated.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use reqwest::Method;
use crate::{Error, Result};

/// Caller-supplied options, keyed by WebHDFS query parameter name
pub type Options = BTreeMap<String, String>;

/// Build an [`Options`] map from string pairs
pub fn options<K, V, I>(pairs: I) -> Options
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Description of a single WebHDFS operation
#[derive(Debug, Clone)]
pub struct OperationSpec {
    /// Wire name sent as `op=<name>`
    pub name: &'static str,
    pub method: Method,
    /// Option keys a caller may supply
    pub allowed: &'static [&'static str],
    /// When non-empty, at least one of these keys must be supplied
    pub required_any: &'static [&'static str],
    /// Data operations go NameNode -> redirect -> DataNode
    pub requires_redirect: bool,
    /// Status the server answers with on success
    pub success_status: u16,
}

impl OperationSpec {
    fn new(name: &'static str, method: Method) -> Self {
        Self {
            name,
            method,
            allowed: &[],
            required_any: &[],
            requires_redirect: false,
            success_status: 200,
        }
    }

    fn allowing(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = allowed;
        self
    }

    fn requiring_any(mut self, keys: &'static [&'static str]) -> Self {
        self.required_any = keys;
        self
    }

    fn redirected(mut self) -> Self {
        self.requires_redirect = true;
        self
    }

    fn succeeding_with(mut self, status: u16) -> Self {
        self.success_status = status;
        self
    }

    /// Run every validator for this operation against `options`
    pub fn validate(&self, options: &Options) -> Result<()> {
        check_allowed(self, options)?;
        check_required_any(self, options)
    }
}

/// Reject every key not in the operation's allowed set, reporting all of them
pub fn check_allowed(spec: &OperationSpec, options: &Options) -> Result<()> {
    let offending: Vec<String> = options
        .keys()
        .filter(|key| !spec.allowed.contains(&key.as_str()))
        .cloned()
        .collect();

    if offending.is_empty() {
        return Ok(());
    }

    Err(Error::Validation {
        message: format!("no such option: {}", offending.join(" ")),
        keys: offending,
        status_code: None,
    })
}

/// Require at least one of the operation's `required_any` keys to be present
pub fn check_required_any(spec: &OperationSpec, options: &Options) -> Result<()> {
    if spec.required_any.is_empty()
        || spec.required_any.iter().any(|key| options.contains_key(*key))
    {
        return Ok(());
    }

    Err(Error::Validation {
        message: format!(
            "{} needs at least one of {}",
            spec.name,
            spec.required_any.join(" or ")
        ),
        keys: spec.required_any.iter().map(|k| k.to_string()).collect(),
        status_code: None,
    })
}

/// Immutable operation name -> spec table
#[derive(Debug)]
pub struct OperationCatalog {
    operations: HashMap<&'static str, OperationSpec>,
}

static CATALOG: OnceLock<OperationCatalog> = OnceLock::new();

impl OperationCatalog {
    /// The process-wide catalog
    pub fn global() -> &'static OperationCatalog {
        CATALOG.get_or_init(Self::build)
    }

    fn build() -> Self {
        let specs = [
            OperationSpec::new("CREATE", Method::PUT)
                .allowing(&["overwrite", "blocksize", "replication", "permission", "buffersize", "data"])
                .redirected()
                .succeeding_with(201),
            OperationSpec::new("APPEND", Method::POST)
                .allowing(&["buffersize", "data"])
                .redirected(),
            OperationSpec::new("OPEN", Method::GET)
                .allowing(&["offset", "length", "buffersize"])
                .redirected(),
            OperationSpec::new("GETFILECHECKSUM", Method::GET).redirected(),
            OperationSpec::new("MKDIRS", Method::PUT).allowing(&["permission"]),
            OperationSpec::new("RENAME", Method::PUT),
            OperationSpec::new("DELETE", Method::DELETE).allowing(&["recursive"]),
            OperationSpec::new("GETFILESTATUS", Method::GET),
            OperationSpec::new("LISTSTATUS", Method::GET),
            OperationSpec::new("GETCONTENTSUMMARY", Method::GET),
            OperationSpec::new("GETHOMEDIRECTORY", Method::GET),
            OperationSpec::new("SETPERMISSION", Method::PUT),
            OperationSpec::new("SETOWNER", Method::PUT)
                .allowing(&["owner", "group"])
                .requiring_any(&["owner", "group"]),
            OperationSpec::new("SETREPLICATION", Method::PUT),
            OperationSpec::new("SETTIMES", Method::PUT)
                .allowing(&["modificationtime", "accesstime"])
                .requiring_any(&["modificationtime", "accesstime"]),
        ];

        Self {
            operations: specs.into_iter().map(|spec| (spec.name, spec)).collect(),
        }
    }

    /// Look up an operation by its wire name
    pub fn get(&self, name: &str) -> Result<&OperationSpec> {
        self.operations
            .get(name)
            .ok_or_else(|| Error::UnknownOperation { name: name.to_string() })
    }

    pub fn allowed_options(&self, name: &str) -> Result<&'static [&'static str]> {
        Ok(self.get(name)?.allowed)
    }

    pub fn requires_redirect(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.requires_redirect)
    }

    /// Validate caller options for `name` before any network access
    pub fn validate(&self, name: &str, options: &Options) -> Result<()> {
        self.get(name)?.validate(options)
    }

    /// Names of every registered operation, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
