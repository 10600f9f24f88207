use std::collections::HashMap;

use asyncrest_config::ResourceConfig;

use super::RequestType;

/// Methods every resource allows unless configured otherwise.
pub const DEFAULT_ALLOWED_METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

/// Per-resource dispatch configuration.
///
/// Read-only once the resource is registered. The task map is keyed by
/// `{method}_{request_type}` (e.g. `post_list`); `task` is consulted for any
/// key without an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceOptions {
    allowed_methods: Vec<String>,
    list_allowed_methods: Option<Vec<String>>,
    detail_allowed_methods: Option<Vec<String>>,
    tasks: HashMap<String, String>,
    task: Option<String>,
    pub require_authentication: bool,
    pub throttle: bool,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            allowed_methods: DEFAULT_ALLOWED_METHODS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            list_allowed_methods: None,
            detail_allowed_methods: None,
            tasks: HashMap::new(),
            task: None,
            require_authentication: true,
            throttle: true,
        }
    }
}

fn lower_all<I, S>(methods: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    methods
        .into_iter()
        .map(|m| m.as_ref().to_ascii_lowercase())
        .collect()
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a `resources.<name>` config section.
    pub fn from_config(cfg: &ResourceConfig) -> Self {
        let mut options = Self::default();
        if let Some(methods) = &cfg.allowed_methods {
            options.allowed_methods = lower_all(methods);
        }
        options.list_allowed_methods = cfg.list_allowed_methods.as_ref().map(lower_all);
        options.detail_allowed_methods = cfg.detail_allowed_methods.as_ref().map(lower_all);
        options.tasks = cfg
            .tasks
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        options.task = cfg.task.clone();
        if let Some(required) = cfg.require_authentication {
            options.require_authentication = required;
        }
        if let Some(throttle) = cfg.throttle {
            options.throttle = throttle;
        }
        options
    }

    #[must_use]
    pub fn allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_methods = lower_all(methods);
        self
    }

    #[must_use]
    pub fn list_allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.list_allowed_methods = Some(lower_all(methods));
        self
    }

    #[must_use]
    pub fn detail_allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.detail_allowed_methods = Some(lower_all(methods));
        self
    }

    /// Defer `method` on `request_type` to the named task.
    #[must_use]
    pub fn task_for(
        mut self,
        method: &str,
        request_type: RequestType,
        task: impl Into<String>,
    ) -> Self {
        let key = format!("{}_{}", method.to_ascii_lowercase(), request_type);
        self.tasks.insert(key, task.into());
        self
    }

    /// Task used for every method without a specific entry.
    #[must_use]
    pub fn default_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    #[must_use]
    pub fn require_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }

    #[must_use]
    pub fn throttle(mut self, enabled: bool) -> Self {
        self.throttle = enabled;
        self
    }

    /// Allowed methods for one request type, falling back to `allowed_methods`.
    pub fn allowed_for(&self, request_type: RequestType) -> &[String] {
        let specific = match request_type {
            RequestType::List => self.list_allowed_methods.as_deref(),
            RequestType::Detail => self.detail_allowed_methods.as_deref(),
        };
        specific.unwrap_or(&self.allowed_methods)
    }

    /// Task for `{method}_{request_type}`, then the default task, then none.
    pub fn task_named(&self, method_name: &str) -> Option<&str> {
        self.tasks
            .get(method_name)
            .or(self.task.as_ref())
            .map(String::as_str)
    }

    /// Every task name this resource may submit.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks
            .values()
            .map(String::as_str)
            .chain(self.task.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_type_methods_fall_back_to_allowed() {
        let options = ResourceOptions::new()
            .allowed_methods(["GET", "delete"])
            .list_allowed_methods(["get"]);
        assert_eq!(options.allowed_for(RequestType::List), ["get".to_string()]);
        assert_eq!(
            options.allowed_for(RequestType::Detail),
            ["get".to_string(), "delete".to_string()]
        );
    }

    #[test]
    fn task_lookup_chain() {
        let options = ResourceOptions::new()
            .task_for("POST", RequestType::List, "documents.create")
            .default_task("documents.any");
        assert_eq!(options.task_named("post_list"), Some("documents.create"));
        assert_eq!(options.task_named("get_detail"), Some("documents.any"));

        let bare = ResourceOptions::new();
        assert_eq!(bare.task_named("post_list"), None);
    }

    #[test]
    fn from_config_section() {
        let mut cfg = ResourceConfig {
            detail_allowed_methods: Some(vec!["GET".into(), "PUT".into()]),
            require_authentication: Some(false),
            ..ResourceConfig::default()
        };
        cfg.tasks.insert("put_detail".into(), "documents.update".into());
        let options = ResourceOptions::from_config(&cfg);
        assert_eq!(
            options.allowed_for(RequestType::Detail),
            ["get".to_string(), "put".to_string()]
        );
        assert_eq!(options.task_named("put_detail"), Some("documents.update"));
        assert!(!options.require_authentication);
        assert!(options.throttle);
        assert_eq!(options.task_names().collect::<Vec<_>>(), ["documents.update"]);
    }
}
