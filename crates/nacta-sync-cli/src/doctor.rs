//! Environment readiness check.

use std::path::PathBuf;

use nacta_sync::SyncConfig;

use crate::driver::find_chromium;

/// One line of the doctor report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub ok: bool,
    pub message: String,
}

impl Check {
    fn ok(message: impl Into<String>) -> Self {
        Self { ok: true, message: message.into() }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self { ok: false, message: message.into() }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = if self.ok { "[OK]" } else { "[!!]" };
        write!(f, "{tag} {}", self.message)
    }
}

/// Inspect binaries, keys, destinations, channels and directories.
pub fn checks(config: &SyncConfig) -> Vec<Check> {
    let mut out = Vec::new();

    match find_chromium(config.browser.chrome_bin.as_ref()) {
        Some(path) => out.push(Check::ok(format!("Chromium found: {}", path.display()))),
        None => out.push(Check::fail("Chromium NOT found. Set CHROME_BIN.")),
    }

    for tool in ["rsync", "ssh"] {
        match which::which(tool) {
            Ok(path) => out.push(Check::ok(format!("{tool} found: {}", path.display()))),
            Err(_) => out.push(Check::fail(format!("{tool} NOT found on PATH"))),
        }
    }

    let remote = &config.remote;
    match (&remote.host, &remote.user) {
        (Some(host), Some(user)) => {
            out.push(Check::ok(format!("Remote: {user}@{host}:{}", remote.port)))
        }
        _ => out.push(Check::fail("REMOTE_HOST and REMOTE_USER must both be set")),
    }
    match &remote.key_path {
        Some(key) if key.is_file() => {
            out.push(Check::ok(format!("SSH key: {}", key.display())))
        }
        Some(key) => out.push(Check::fail(format!("SSH key missing: {}", key.display()))),
        None => out.push(Check::ok("SSH key: default identity")),
    }

    for source in &config.sources {
        match remote.destination(&source.logical_name) {
            Ok(dir) => out.push(Check::ok(format!("{} -> {dir}", source.logical_name))),
            Err(e) => out.push(Check::fail(e.to_string())),
        }
    }

    if config.email.is_none() && config.slack.is_none() {
        out.push(Check::fail("No notification channel configured (SMTP_SERVER / SLACK_WEBHOOK_URL)"));
    }
    if let Some(email) = &config.email {
        if email.to.is_empty() {
            out.push(Check::fail("Email: EMAIL_TO_LIST is empty"));
        } else {
            out.push(Check::ok(format!(
                "Email: {}:{} -> {} recipient(s)",
                email.server,
                email.port,
                email.to.len()
            )));
        }
    }
    if let Some(slack) = &config.slack {
        out.push(Check::ok(format!("Slack: {}", slack.channel)));
    }

    let missing: Vec<PathBuf> = config
        .layout
        .all_dirs()
        .into_iter()
        .filter(|d| !d.is_dir())
        .collect();
    if missing.is_empty() {
        out.push(Check::ok(format!("Directories under {}", config.layout.base().display())));
    } else {
        for dir in missing {
            out.push(Check::fail(format!("Directory missing: {}", dir.display())));
        }
    }

    out
}

/// Print the report. Returns whether every check passed.
pub fn run(config: &SyncConfig) -> bool {
    println!("NACTA Sync Doctor");
    println!("=================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let results = checks(config);
    for check in &results {
        println!("{check}");
    }

    println!();
    let ready = results.iter().all(|c| c.ok);
    println!("Status: {}", if ready { "READY" } else { "NOT READY" });
    ready
}
