//! Foreground application lookup.

use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use crate::admission::ForegroundQuery;

const DUMPSYS_COMMAND: &str = "dumpsys activity activities | grep -E 'topResumedActivity|ResumedActivity'";

static PACKAGE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn package_pattern() -> Option<&'static Regex> {
    PACKAGE_PATTERN
        .get_or_init(|| Regex::new(r"(?i)([a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)+)/").ok())
        .as_ref()
}

/// First package name of the resumed activity in `dumpsys` output
pub fn parse_resumed_package(output: &str) -> Option<String> {
    let pattern = package_pattern()?;
    output
        .lines()
        .flat_map(|line| pattern.captures_iter(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .find(|pkg| pkg.contains('.') && *pkg != "android")
        .map(str::to_string)
}

/// Asks the activity manager through a privileged shell.
///
/// The wrapper is the command prefix that runs one shell string with the
/// needed privilege, e.g. `["su", "-c"]`. An empty wrapper runs the query
/// through an unprivileged `sh -c`.
pub struct ShellForegroundQuery {
    wrapper: Vec<String>,
}

impl ShellForegroundQuery {
    pub fn new(wrapper: Vec<String>) -> Self {
        if wrapper.is_empty() {
            return Self::plain();
        }
        Self { wrapper }
    }

    pub fn plain() -> Self {
        Self {
            wrapper: vec!["sh".into(), "-c".into()],
        }
    }

    pub fn root() -> Self {
        Self::new(vec!["su".into(), "-c".into()])
    }
}

impl ForegroundQuery for ShellForegroundQuery {
    fn current_foreground_identity(&self) -> Option<String> {
        let (program, args) = self.wrapper.split_first()?;

        let output = match Command::new(program).args(args).arg(DUMPSYS_COMMAND).output() {
            Ok(o) => o,
            Err(e) => {
                tracing::debug!("Foreground query unavailable: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            tracing::debug!("Foreground query exited with {}", output.status);
            return None;
        }

        parse_resumed_package(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Fixed answer; `None` behaves like a device without the privilege
pub struct FixedForeground(pub Option<String>);

impl ForegroundQuery for FixedForeground {
    fn current_foreground_identity(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resumed_package() {
        let out = "  topResumedActivity=ActivityRecord{a1b2 u0 com.tencent.mm/.ui.LauncherUI t12}\n\
                   ResumedActivity: ActivityRecord{a1b2 u0 com.tencent.mm/.ui.LauncherUI t12}\n";
        assert_eq!(parse_resumed_package(out), Some("com.tencent.mm".to_string()));
    }

    #[test]
    fn test_parse_mixed_case_package() {
        let out = "mResumedActivity: ActivityRecord{1 u0 com.eg.android.AlipayGphone/.AlipayLogin t3}";
        assert_eq!(
            parse_resumed_package(out),
            Some("com.eg.android.AlipayGphone".to_string())
        );
    }

    #[test]
    fn test_parse_nothing() {
        assert_eq!(parse_resumed_package(""), None);
        assert_eq!(parse_resumed_package("no activity here"), None);
    }

    #[test]
    fn test_missing_shell_is_unknown() {
        let q = ShellForegroundQuery::new(vec!["definitely-not-a-shell".into(), "-c".into()]);
        assert_eq!(q.current_foreground_identity(), None);
    }

    #[test]
    fn test_empty_wrapper_runs_through_sh() {
        let q = ShellForegroundQuery::new(Vec::new());
        assert_eq!(q.wrapper, vec!["sh", "-c"]);
        assert_eq!(ShellForegroundQuery::root().wrapper, vec!["su", "-c"]);
    }
}
