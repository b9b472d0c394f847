use crate::anchor::{Anchor, AnchorError};
use crate::ios::{ImportLine, IosHook};
use crate::merge::InsertionRequest;
use crate::tiered::{Fallback, TieredRequest};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub inserts: Vec<InsertDefinition>,
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.meta.name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                insert_id: None,
                field: "meta.name",
            });
        }

        if self.inserts.is_empty() {
            issues.push(ValidationIssue::EmptyInsertList);
        }

        for insert in &self.inserts {
            let id = || Some(insert.id.clone());

            if insert.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    insert_id: None,
                    field: "id",
                });
            }
            if insert.tag.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    insert_id: id(),
                    field: "tag",
                });
            } else if insert.tag.contains(char::is_whitespace) {
                issues.push(ValidationIssue::InvalidCombo {
                    insert_id: id(),
                    message: "tag must not contain whitespace".to_string(),
                });
            }
            if insert.fragment.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    insert_id: id(),
                    field: "fragment",
                });
            }
            if insert.comment.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    insert_id: id(),
                    field: "comment",
                });
            }
            if matches!(&insert.file, Some(file) if file.trim().is_empty()) {
                issues.push(ValidationIssue::MissingField {
                    insert_id: id(),
                    field: "file",
                });
            }

            if let Err(source) = insert.anchor.compile() {
                issues.push(ValidationIssue::InvalidAnchor {
                    insert_id: id(),
                    field: "anchor",
                    message: source.to_string(),
                });
            }

            if let Some(fallback) = &insert.fallback {
                if let Err(source) = fallback.anchor.compile() {
                    issues.push(ValidationIssue::InvalidAnchor {
                        insert_id: id(),
                        field: "fallback",
                        message: source.to_string(),
                    });
                }
                if fallback.tag_suffix.trim().is_empty() {
                    issues.push(ValidationIssue::InvalidCombo {
                        insert_id: id(),
                        message: "fallback.tag_suffix must distinguish the fallback tag"
                            .to_string(),
                    });
                }
            }

            if let Some(import) = &insert.import {
                if import.line.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        insert_id: id(),
                        field: "import.line",
                    });
                }
                if import.after.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        insert_id: id(),
                        field: "import.after",
                    });
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        for insert in &self.inserts {
            if !insert.id.is_empty() && !seen.insert(insert.id.as_str()) {
                issues.push(ValidationIssue::InvalidCombo {
                    insert_id: Some(insert.id.clone()),
                    message: "duplicate insert id".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    /// Package that owns these inserts; used as warning scope and run-once key.
    #[serde(default)]
    pub name: String,
    /// Version of that package, injected instead of read at load time.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Semver requirement on the app's react-native version.
    #[serde(default)]
    pub version_range: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InsertDefinition {
    pub id: String,
    /// Project-relative target. `None` targets the iOS application delegate.
    #[serde(default)]
    pub file: Option<String>,
    pub tag: String,
    pub fragment: String,
    #[serde(default = "default_comment")]
    pub comment: String,
    pub anchor: AnchorSpec,
    #[serde(default)]
    pub fallback: Option<FallbackSpec>,
    #[serde(default)]
    pub import: Option<ImportSpec>,
}

fn default_comment() -> String {
    "//".to_string()
}

fn default_tag_suffix() -> String {
    "-fallback".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnchorSpec {
    Regex {
        pattern: String,
        #[serde(default)]
        offset: isize,
    },
    /// Exact string search
    Text {
        search: String,
        #[serde(default)]
        offset: isize,
    },
}

impl AnchorSpec {
    pub fn compile(&self) -> Result<Anchor, AnchorError> {
        match self {
            AnchorSpec::Regex { pattern, .. } => Anchor::regex(pattern),
            AnchorSpec::Text { search, .. } => Anchor::literal(search.as_str()),
        }
    }

    pub fn offset(&self) -> isize {
        match self {
            AnchorSpec::Regex { offset, .. } | AnchorSpec::Text { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FallbackSpec {
    #[serde(flatten)]
    pub anchor: AnchorSpec,
    #[serde(default = "default_tag_suffix")]
    pub tag_suffix: String,
    #[serde(default)]
    pub opening_token: Option<char>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportSpec {
    pub line: String,
    /// Literal text of the line the import goes after.
    pub after: String,
}

impl InsertDefinition {
    /// Compile this definition into the hook the iOS layer applies.
    pub fn to_hook(&self, scope: &str) -> Result<IosHook, AnchorError> {
        let primary = InsertionRequest::new(
            self.tag.as_str(),
            self.fragment.as_str(),
            self.anchor.compile()?,
        )
        .with_offset(self.anchor.offset())
        .with_comment(self.comment.as_str());

        let mut request = TieredRequest::new(primary);
        if let Some(fallback) = &self.fallback {
            let fallback_request = InsertionRequest::new(
                format!("{}{}", self.tag, fallback.tag_suffix),
                self.fragment.as_str(),
                fallback.anchor.compile()?,
            )
            .with_offset(fallback.anchor.offset())
            .with_comment(self.comment.as_str());
            request = request.with_fallback(Fallback {
                request: fallback_request,
                opening_token: fallback.opening_token,
            });
        }

        let import = self
            .import
            .as_ref()
            .map(|import| -> Result<ImportLine, AnchorError> {
                Ok(ImportLine {
                    line: import.line.clone(),
                    after: Anchor::literal(import.after.as_str())?,
                })
            })
            .transpose()?;

        Ok(IosHook {
            scope: scope.to_string(),
            import,
            request,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyInsertList,
    MissingField {
        insert_id: Option<String>,
        field: &'static str,
    },
    InvalidAnchor {
        insert_id: Option<String>,
        field: &'static str,
        message: String,
    },
    InvalidCombo {
        insert_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyInsertList => write!(f, "patch config contains no inserts"),
            ValidationIssue::MissingField { insert_id, field } => match insert_id {
                Some(id) => write!(f, "insert '{id}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::InvalidAnchor {
                insert_id,
                field,
                message,
            } => match insert_id {
                Some(id) => write!(f, "insert '{id}' has invalid {field}: {message}"),
                None => write!(f, "invalid {field}: {message}"),
            },
            ValidationIssue::InvalidCombo { insert_id, message } => match insert_id {
                Some(id) => write!(f, "insert '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch configuration: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> InsertDefinition {
        InsertDefinition {
            id: "configure".to_string(),
            file: None,
            tag: "pkg-didFinishLaunchingWithOptions".to_string(),
            fragment: "[FIRApp configure];".to_string(),
            comment: "//".to_string(),
            anchor: AnchorSpec::Regex {
                pattern: r"RCTBridge\s?\*".to_string(),
                offset: 0,
            },
            fallback: Some(FallbackSpec {
                anchor: AnchorSpec::Text {
                    search: "didFinishLaunchingWithOptions:".to_string(),
                    offset: 1,
                },
                tag_suffix: "-fallback".to_string(),
                opening_token: Some('{'),
            }),
            import: None,
        }
    }

    fn config(inserts: Vec<InsertDefinition>) -> PatchConfig {
        PatchConfig {
            meta: Metadata {
                name: "pkg".to_string(),
                ..Metadata::default()
            },
            inserts,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(config(vec![definition()]).validate().is_ok());
    }

    #[test]
    fn test_collects_all_issues() {
        let mut bad = definition();
        bad.fragment = "  ".to_string();
        bad.anchor = AnchorSpec::Regex {
            pattern: "(".to_string(),
            offset: 0,
        };
        bad.tag = "has space".to_string();

        let err = config(vec![bad]).validate().unwrap_err();
        assert_eq!(err.issues.len(), 3);
        let text = err.to_string();
        assert!(text.contains("fragment"));
        assert!(text.contains("invalid anchor"));
        assert!(text.contains("whitespace"));
    }

    #[test]
    fn test_duplicate_ids() {
        let err = config(vec![definition(), definition()])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate insert id"));
    }

    #[test]
    fn test_empty_config() {
        let err = PatchConfig::default().validate().unwrap_err();
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn test_to_hook_builds_fallback_tag() {
        let hook = definition().to_hook("pkg").unwrap();
        let fallback = hook.request.fallback.unwrap();
        assert_eq!(
            fallback.request.tag,
            "pkg-didFinishLaunchingWithOptions-fallback"
        );
        assert_eq!(fallback.request.line_offset, 1);
        assert_eq!(fallback.opening_token, Some('{'));
        assert_eq!(hook.scope, "pkg");
    }
}
