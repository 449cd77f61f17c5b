//! Splits a kubeconfig buffer into validated, self-contained contexts.

use std::collections::HashSet;
use std::path::Path;

use super::error::{ContextValidationError, KubeconfigError, Result, ValidationIssue};
use super::model::{ContextContent, ContextModel, KubeConfig, NamedContext};

/// Output of a successful parse: the usable contexts and the ones that were dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedKubeconfig {
    /// Valid contexts, in document order.
    pub models: Vec<ContextModel>,
    /// Contexts dropped by validation.
    pub rejected: Vec<ContextValidationError>,
}

impl ParsedKubeconfig {
    /// Names of the valid contexts, in document order.
    pub fn context_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.context_name.as_str()).collect()
    }
}

/// Parses the structure of a kubeconfig buffer.
///
/// Fails when the buffer is not UTF-8, empty, not YAML, or not a mapping
/// with the expected list shapes.
pub fn parse_document(buffer: &[u8], path: &Path) -> Result<KubeConfig> {
    let parse_error = |message: String| KubeconfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let text = std::str::from_utf8(buffer).map_err(|e| parse_error(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(parse_error("document is empty".to_string()));
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))?;
    if !value.is_mapping() {
        return Err(parse_error("top level must be a mapping".to_string()));
    }

    serde_yaml::from_value(value).map_err(|e| parse_error(e.to_string()))
}

/// Parses a buffer and splits it into one model per valid context.
///
/// Invalid contexts are logged and returned in `rejected`; they never
/// abort the remaining contexts. Only a structural failure is an error.
pub fn parse_kubeconfig(buffer: &[u8], path: &Path) -> Result<ParsedKubeconfig> {
    let config = parse_document(buffer, path)?;
    Ok(split_contexts(&config, path))
}

/// Validates every context of an already parsed document.
pub fn split_contexts(config: &KubeConfig, path: &Path) -> ParsedKubeconfig {
    let mut parsed = ParsedKubeconfig::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for context in &config.contexts {
        let result = if !context.name.is_empty() && !seen.insert(context.name.as_str()) {
            Err(ValidationIssue::DuplicateName)
        } else {
            resolve_context(config, context)
        };

        match result {
            Ok(content) => parsed.models.push(ContextModel {
                id: uuid::Uuid::new_v4().to_string(),
                kubeconfig_path: path.to_path_buf(),
                context_name: context.name.clone(),
                content,
            }),
            Err(issue) => {
                let rejected = ContextValidationError {
                    path: path.to_path_buf(),
                    context: context.name.clone(),
                    issue,
                };
                log::warn!("{}", rejected);
                parsed.rejected.push(rejected);
            }
        }
    }

    parsed
}

/// Checks one context's references and copies out what it points at.
fn resolve_context(
    config: &KubeConfig,
    context: &NamedContext,
) -> std::result::Result<ContextContent, ValidationIssue> {
    if context.name.is_empty() {
        return Err(ValidationIssue::MissingName);
    }

    let entry = context.context.as_ref().ok_or(ValidationIssue::MissingBody)?;

    if entry.cluster.is_empty() {
        return Err(ValidationIssue::MissingClusterRef);
    }
    if entry.user.is_empty() {
        return Err(ValidationIssue::MissingUserRef);
    }

    let cluster = config
        .clusters
        .iter()
        .find(|c| c.name == entry.cluster)
        .ok_or_else(|| ValidationIssue::UnknownCluster(entry.cluster.clone()))?;

    if cluster.cluster.server.trim().is_empty() {
        return Err(ValidationIssue::MissingServer(cluster.name.clone()));
    }

    let user = config
        .users
        .iter()
        .find(|u| u.name == entry.user)
        .ok_or_else(|| ValidationIssue::UnknownUser(entry.user.clone()))?;

    if let Some(exec) = &user.user.exec {
        if exec.command.trim().is_empty() {
            return Err(ValidationIssue::EmptyExecCommand(user.name.clone()));
        }
    }

    Ok(ContextContent {
        cluster_name: cluster.name.clone(),
        cluster: cluster.cluster.clone(),
        user_name: user.name.clone(),
        user: user.user.clone(),
        namespace: entry.namespace.clone(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CONTEXTS: &str = r#"
apiVersion: v1
kind: Config
clusters:
  - name: prod
    cluster:
      server: https://prod.example.com:6443
  - name: staging
    cluster:
      server: https://staging.example.com:6443
users:
  - name: admin
    user:
      token: abc
  - name: dev
    user:
      exec:
        apiVersion: client.authentication.k8s.io/v1
        command: aws
        args: [eks, get-token]
contexts:
  - name: prod-admin
    context:
      cluster: prod
      user: admin
      namespace: kube-system
  - name: staging-dev
    context:
      cluster: staging
      user: dev
current-context: prod-admin
"#;

    fn path() -> &'static Path {
        Path::new("/home/me/.kube/config")
    }

    #[test]
    fn test_parse_valid_contexts_in_order() {
        let parsed = parse_kubeconfig(TWO_CONTEXTS.as_bytes(), path()).unwrap();
        assert_eq!(parsed.context_names(), vec!["prod-admin", "staging-dev"]);
        assert!(parsed.rejected.is_empty());

        let prod = &parsed.models[0];
        assert_eq!(prod.kubeconfig_path, path());
        assert_eq!(prod.content.cluster.server, "https://prod.example.com:6443");
        assert_eq!(prod.content.user.token.as_deref(), Some("abc"));
        assert_eq!(prod.content.namespace.as_deref(), Some("kube-system"));

        let staging = &parsed.models[1];
        let exec = staging.content.user.exec.as_ref().unwrap();
        assert_eq!(exec.command, "aws");
        assert_eq!(exec.args, vec!["eks", "get-token"]);
    }

    #[test]
    fn test_ids_are_fresh_per_parse() {
        let first = parse_kubeconfig(TWO_CONTEXTS.as_bytes(), path()).unwrap();
        let second = parse_kubeconfig(TWO_CONTEXTS.as_bytes(), path()).unwrap();
        assert_ne!(first.models[0].id, second.models[0].id);
        assert!(first.models[0].same_content(&second.models[0]));
    }

    #[test]
    fn test_invalid_context_does_not_drop_siblings() {
        let yaml = r#"
clusters:
  - name: prod
    cluster:
      server: https://prod.example.com
users:
  - name: admin
    user:
      token: abc
contexts:
  - name: good
    context:
      cluster: prod
      user: admin
  - name: dangling
    context:
      cluster: missing
      user: admin
"#;
        let parsed = parse_kubeconfig(yaml.as_bytes(), path()).unwrap();
        assert_eq!(parsed.context_names(), vec!["good"]);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].context, "dangling");
        assert_eq!(
            parsed.rejected[0].issue,
            ValidationIssue::UnknownCluster("missing".to_string())
        );
    }

    #[test]
    fn test_validation_issues() {
        let yaml = r#"
clusters:
  - name: no-server
    cluster: {}
  - name: ok
    cluster:
      server: https://ok.example.com
users:
  - name: admin
    user:
      token: abc
  - name: broken-exec
    user:
      exec:
        command: ""
contexts:
  - name: ""
    context:
      cluster: ok
      user: admin
  - name: no-body
  - name: no-cluster
    context:
      user: admin
  - name: no-user
    context:
      cluster: ok
  - name: unknown-user
    context:
      cluster: ok
      user: ghost
  - name: empty-server
    context:
      cluster: no-server
      user: admin
  - name: exec-without-command
    context:
      cluster: ok
      user: broken-exec
"#;
        let parsed = parse_kubeconfig(yaml.as_bytes(), path()).unwrap();
        assert!(parsed.models.is_empty());

        let issues: Vec<ValidationIssue> =
            parsed.rejected.iter().map(|r| r.issue.clone()).collect();
        assert_eq!(
            issues,
            vec![
                ValidationIssue::MissingName,
                ValidationIssue::MissingBody,
                ValidationIssue::MissingClusterRef,
                ValidationIssue::MissingUserRef,
                ValidationIssue::UnknownUser("ghost".to_string()),
                ValidationIssue::MissingServer("no-server".to_string()),
                ValidationIssue::EmptyExecCommand("broken-exec".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_context_names_keep_first() {
        let yaml = r#"
clusters:
  - name: a
    cluster:
      server: https://a.example.com
  - name: b
    cluster:
      server: https://b.example.com
users:
  - name: admin
    user: {}
contexts:
  - name: dup
    context:
      cluster: a
      user: admin
  - name: dup
    context:
      cluster: b
      user: admin
"#;
        let parsed = parse_kubeconfig(yaml.as_bytes(), path()).unwrap();
        assert_eq!(parsed.models.len(), 1);
        assert_eq!(parsed.models[0].content.cluster_name, "a");
        assert_eq!(parsed.rejected[0].issue, ValidationIssue::DuplicateName);
    }

    #[test]
    fn test_no_contexts_is_not_an_error() {
        let parsed = parse_kubeconfig(b"apiVersion: v1\nkind: Config\n", path()).unwrap();
        assert!(parsed.models.is_empty());
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let result = parse_kubeconfig(b"clusters: [unterminated", path());
        assert!(matches!(result, Err(KubeconfigError::Parse { .. })));
    }

    #[test]
    fn test_empty_buffer_is_parse_error() {
        let result = parse_kubeconfig(b"  \n", path());
        assert!(matches!(result, Err(KubeconfigError::Parse { .. })));
    }

    #[test]
    fn test_non_mapping_is_parse_error() {
        let result = parse_kubeconfig(b"- just\n- a\n- list\n", path());
        assert!(matches!(result, Err(KubeconfigError::Parse { .. })));
    }

    #[test]
    fn test_wrong_list_shape_is_parse_error() {
        let result = parse_kubeconfig(b"contexts: 42\n", path());
        assert!(matches!(result, Err(KubeconfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let result = parse_kubeconfig(&[0xff, 0xfe, 0x00], path());
        assert!(matches!(result, Err(KubeconfigError::Parse { .. })));
    }
}
