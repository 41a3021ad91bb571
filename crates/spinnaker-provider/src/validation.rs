//! Checks performed on declared names before any request is sent.
//!
//! Obviously invalid configuration is rejected while planning, instead of failing halfway through
//! an apply.

use std::{fmt::Display, sync::LazyLock};

use regex::Regex;
use snafu::Snafu;

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// Application names are keys in Front50, longer names are rejected by its storage backends.
static APPLICATION_NAME: LazyLock<NameRule> = LazyLock::new(|| NameRule {
    kind: "an application name",
    max_length: 255,
    regex: Regex::new("^[a-zA-Z0-9._-]+$").expect("failed to compile application name regex"),
    allowed: "alphanumeric characters, '.', '_' or '-'",
    examples: &["docta", "payments-api", "web_frontend.v2"],
});

static PIPELINE_TEMPLATE_NAME: LazyLock<NameRule> = LazyLock::new(|| NameRule {
    kind: "a pipeline template name",
    max_length: 255,
    regex: Regex::new("^[a-zA-Z0-9_-]+$").expect("failed to compile pipeline template name regex"),
    allowed: "alphanumeric characters, '_' or '-'",
    examples: &["build-image-template", "deploy_eks"],
});

/// All problems found with a single value.
#[derive(Debug)]
pub struct Errors(Vec<Error>);

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages = self.0.iter().map(ToString::to_string).collect::<Vec<_>>();
        f.write_str(&messages.join(", "))
    }
}

impl std::error::Error for Errors {}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "{kind} must only contain {allowed} (e.g. {examples}), regex used for validation is {regex:?}"
    ))]
    InvalidCharacters {
        kind: &'static str,
        allowed: &'static str,
        examples: String,
        regex: String,
    },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },
}

/// The constraints on one kind of name.
struct NameRule {
    kind: &'static str,
    max_length: usize,
    regex: Regex,
    allowed: &'static str,
    examples: &'static [&'static str],
}

impl NameRule {
    /// Collects every violated constraint instead of stopping at the first one.
    fn check(&self, value: &str) -> Result {
        let mut errors = Vec::new();

        if value.len() > self.max_length {
            errors.push(Error::TooLong {
                length: value.len(),
                max_length: self.max_length,
            });
        }

        if !self.regex.is_match(value) {
            errors.push(Error::InvalidCharacters {
                kind: self.kind,
                allowed: self.allowed,
                examples: self
                    .examples
                    .iter()
                    .map(|example| format!("{example:?}"))
                    .collect::<Vec<_>>()
                    .join(" or "),
                regex: self
                    .regex
                    .as_str()
                    .trim_start_matches('^')
                    .trim_end_matches('$')
                    .to_owned(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Errors(errors))
        }
    }
}

/// Tests for a string that Spinnaker accepts as an application name.
pub fn is_application_name(value: &str) -> Result {
    APPLICATION_NAME.check(value)
}

/// Tests for a string that can be used as a pipeline template id.
pub fn is_pipeline_template_name(value: &str) -> Result {
    PIPELINE_TEMPLATE_NAME.check(value)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("docta")]
    #[case("payments-api")]
    #[case("web_frontend.v2")]
    #[case("A1")]
    fn valid_application_names(#[case] value: &str) {
        assert!(is_application_name(value).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("a b")]
    #[case("a/b")]
    #[case("a:b")]
    #[case("a@b")]
    fn invalid_application_names(#[case] value: &str) {
        assert!(is_application_name(value).is_err());
    }

    #[rstest]
    #[case("build-image-template")]
    #[case("deploy_eks")]
    fn valid_pipeline_template_names(#[case] value: &str) {
        assert!(is_pipeline_template_name(value).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("build.image")]
    #[case("Build and Deploy")]
    fn invalid_pipeline_template_names(#[case] value: &str) {
        assert!(is_pipeline_template_name(value).is_err());
    }

    #[test]
    fn error_names_the_allowed_characters() {
        let errors = is_pipeline_template_name("build.image").expect_err("dots are not allowed");
        assert_eq!(
            errors.to_string(),
            "a pipeline template name must only contain alphanumeric characters, '_' or '-' \
             (e.g. \"build-image-template\" or \"deploy_eks\"), regex used for validation is \
             \"[a-zA-Z0-9_-]+\""
        );
    }

    #[test]
    fn all_errors_are_reported() {
        let value = "a ".repeat(200);
        let errors = is_application_name(&value).expect_err("too long and invalid");

        assert_eq!(errors.0.len(), 2);
        assert!(errors.to_string().starts_with("input is 400 bytes long"));
        assert!(
            errors
                .to_string()
                .contains("an application name must only contain alphanumeric characters")
        );
    }
}
