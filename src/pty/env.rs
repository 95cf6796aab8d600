// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Non-interactive environment policy and default-shell selection for
//! spawned PTY processes (§6).

use std::collections::HashMap;

/// Build the environment a spawned shell/agent process should see: the
/// inherited environment plus a fixed set of non-interactive overrides.
///
/// An override is applied only when its value is `Some`; a key absent from
/// the override table but present in `base` passes through unchanged. When
/// `agent_id` (case-insensitive) is `"gemini"`, `CI` and `NONINTERACTIVE` are
/// omitted entirely, including any value inherited from `base`.
pub fn build_environment(
    base: &HashMap<String, String>,
    agent_id: Option<&str>,
) -> HashMap<String, String> {
    let is_gemini = agent_id.map(|a| a.eq_ignore_ascii_case("gemini")).unwrap_or(false);

    let mut env = base.clone();

    let mut overrides: Vec<(&str, Option<String>)> = vec![
        ("DISABLE_AUTO_UPDATE", Some("true".to_string())),
        ("HOMEBREW_NO_AUTO_UPDATE", Some("1".to_string())),
        ("DEBIAN_FRONTEND", Some("noninteractive".to_string())),
        ("PAGER", Some(String::new())),
        ("GIT_PAGER", Some(String::new())),
        ("NVM_DIR_SILENT", Some("1".to_string())),
        ("PYENV_VIRTUALENV_DISABLE_PROMPT", Some("1".to_string())),
        ("rvm_silence_path_mismatch_check_flag", Some("1".to_string())),
        ("GIT_TERMINAL_PROMPT", Some("0".to_string())),
        ("ZSH_DISABLE_COMPFIX", Some("true".to_string())),
        ("DISABLE_UPDATE_PROMPT", Some("true".to_string())),
        ("FORCE_COLOR", Some("3".to_string())),
    ];

    if !is_gemini {
        overrides.push(("NONINTERACTIVE", Some("1".to_string())));
        // CI is preserved if already set; otherwise forced to "1".
        let ci = env.get("CI").cloned().unwrap_or_else(|| "1".to_string());
        overrides.push(("CI", Some(ci)));
    } else {
        env.remove("CI");
        env.remove("NONINTERACTIVE");
    }

    for (key, value) in overrides {
        if let Some(v) = value {
            env.insert(key.to_string(), v);
        }
    }

    if is_gemini {
        env.remove("CI");
        env.remove("NONINTERACTIVE");
    }

    env
}

/// Resolve the default shell program and its login-flag arguments.
///
/// Unix: `SHELL` env var, falling back to `/bin/sh`. Windows: `COMSPEC`,
/// falling back to `powershell.exe`. Paths ending in `zsh` or `bash` get a
/// `-l` login-shell argument; everything else gets none.
pub fn default_shell() -> (String, Vec<String>) {
    #[cfg(windows)]
    {
        let shell = std::env::var("COMSPEC").unwrap_or_else(|_| "powershell.exe".to_string());
        (shell, Vec::new())
    }
    #[cfg(not(windows))]
    {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let args = if shell.ends_with("zsh") || shell.ends_with("bash") {
            vec!["-l".to_string()]
        } else {
            Vec::new()
        };
        (shell, args)
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
