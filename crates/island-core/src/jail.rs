//! Running jail enumeration and control.
//!
//! Listings come from `jls` and are never cached: every call re-reads the
//! host's jail table, so a jid is only trustworthy until the next change on
//! the host.

use crate::error::{CoreError, Result};
use crate::runner::CommandRunner;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Parameters requested from `jls`, in column order.
pub const JLS_PARAMS: [&str; 5] = ["jid", "name", "host.hostname", "path", "ip4.addr"];

/// A running jail as reported by the host at listing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JailRecord {
    /// Host-assigned jail id; reused after the jail exits.
    pub jid: u32,
    /// Jail name, equal to the instance id of its dataset.
    pub name: String,
    /// Hostname inside the jail.
    pub hostname: String,
    /// Root directory of the jail.
    pub path: String,
    /// IPv4 address(es), comma separated as `jls` prints them.
    pub ip4: Option<String>,
}

/// Parse `jls -h -q <JLS_PARAMS>` output into records, in host order.
///
/// Blank output means no jails are running. Anything else must start with
/// the header line and contain exactly one field per parameter on every
/// following line; the first deviation fails the whole listing. Values
/// holding whitespace or quotes arrive wrapped in `"` or `'` (`-q`).
pub fn parse_jls(output: &str) -> Result<Vec<JailRecord>> {
    let mut lines = output
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((header_line, header)) = lines.next() else {
        return Ok(Vec::new());
    };
    if !header.split_whitespace().eq(JLS_PARAMS.iter().copied()) {
        return Err(CoreError::Parse {
            line: header_line,
            reason: format!("unexpected header {:?}", header.trim()),
        });
    }

    lines
        .map(|(line, text)| parse_record(line, text))
        .collect()
}

/// Split a `jls -q` row into fields.
///
/// `jls` quotes with whichever of `"` or `'` the value does not contain and
/// never escapes, so a quoted field runs to the next matching quote.
fn split_quoted(line: usize, text: &str) -> Result<Vec<&str>> {
    let mut fields = Vec::new();
    let mut rest = text.trim_start();
    while let Some(first) = rest.chars().next() {
        let (field, tail) = if first == '"' || first == '\'' {
            let body = &rest[1..];
            let Some(end) = body.find(first) else {
                return Err(CoreError::Parse {
                    line,
                    reason: format!("unterminated {first} quote"),
                });
            };
            (&body[..end], &body[end + 1..])
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            (&rest[..end], &rest[end..])
        };
        if !tail.is_empty() && !tail.starts_with(char::is_whitespace) {
            return Err(CoreError::Parse {
                line,
                reason: "quoted field runs into the next one".to_string(),
            });
        }
        fields.push(field);
        rest = tail.trim_start();
    }
    Ok(fields)
}

fn parse_record(line: usize, text: &str) -> Result<JailRecord> {
    let fields = split_quoted(line, text)?;
    let &[jid, name, hostname, path, ip4] = fields.as_slice() else {
        return Err(CoreError::Parse {
            line,
            reason: format!("expected {} fields, found {}", JLS_PARAMS.len(), fields.len()),
        });
    };

    let jid = match jid.parse::<u32>() {
        Ok(jid) if jid > 0 => jid,
        _ => {
            return Err(CoreError::Parse {
                line,
                reason: format!("invalid jid {jid:?}"),
            })
        }
    };

    Ok(JailRecord {
        jid,
        name: name.to_string(),
        hostname: hostname.to_string(),
        path: path.to_string(),
        ip4: (!ip4.is_empty() && ip4 != "-").then(|| ip4.to_string()),
    })
}

/// A jail that could not be removed during [`JailService::kill_all`].
#[derive(Debug)]
pub struct KillFailure {
    /// Jail id from the listing snapshot.
    pub jid: u32,
    /// Why `jail -r` failed.
    pub error: CoreError,
}

/// Outcome of [`JailService::kill_all`].
#[derive(Debug, Default)]
pub struct KillAllReport {
    /// Jails removed successfully, in listing order.
    pub killed: Vec<u32>,
    /// Jails that could not be removed, in listing order.
    pub failures: Vec<KillFailure>,
}

impl KillAllReport {
    /// Whether every listed jail was removed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of jails that were attempted.
    pub fn attempted(&self) -> usize {
        self.killed.len() + self.failures.len()
    }

    /// The failure seen last, if any.
    pub fn last_failure(&self) -> Option<&KillFailure> {
        self.failures.last()
    }
}

/// Lists and removes running jails through `jls` and `jail`.
pub struct JailService {
    jls_path: PathBuf,
    jail_path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl JailService {
    /// Create a jail service.
    pub fn new(
        jls_path: impl Into<PathBuf>,
        jail_path: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            jls_path: jls_path.into(),
            jail_path: jail_path.into(),
            runner,
        }
    }

    /// List running jails in the order the host reports them.
    ///
    /// # Errors
    ///
    /// [`CoreError::Invocation`] if `jls` fails, [`CoreError::Parse`] if its
    /// output is not in the expected shape.
    pub async fn list_running(&self) -> Result<Vec<JailRecord>> {
        let mut args = vec!["-h", "-q"];
        args.extend(JLS_PARAMS);
        let output = self.runner.run(&self.jls_path, &args).await?;
        let jails = parse_jls(&output).inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to parse jail listing");
        })?;
        tracing::debug!(count = jails.len(), "Listed running jails");
        Ok(jails)
    }

    /// Get the running jail with id `jid`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no such jail is in a fresh listing.
    pub async fn details(&self, jid: u32) -> Result<JailRecord> {
        self.list_running()
            .await?
            .into_iter()
            .find(|jail| jail.jid == jid)
            .ok_or(CoreError::NotFound(jid))
    }

    /// Remove the jail with id `jid`.
    ///
    /// A jail that exited since it was listed makes `jail -r` fail; callers
    /// have to tolerate that race.
    pub async fn kill(&self, jid: u32) -> Result<()> {
        let start = std::time::Instant::now();
        let jid_arg = jid.to_string();
        match self.runner.run(&self.jail_path, &["-r", &jid_arg]).await {
            Ok(_) => {
                tracing::info!(
                    jid,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Jail removed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(jid, error = %e, "Failed to remove jail");
                Err(e)
            }
        }
    }

    /// Remove every jail in a fresh listing, one at a time.
    ///
    /// Each listed jail is attempted exactly once and a failure does not stop
    /// the loop. Jails started after the listing are left alone.
    ///
    /// # Errors
    ///
    /// Only a failed listing is returned as `Err`; per-jail failures are
    /// collected in the report.
    pub async fn kill_all(&self) -> Result<KillAllReport> {
        let jails = self.list_running().await?;
        tracing::info!(count = jails.len(), "Removing all running jails");

        let mut report = KillAllReport::default();
        for jail in jails {
            match self.kill(jail.jid).await {
                Ok(()) => report.killed.push(jail.jid),
                Err(error) => report.failures.push(KillFailure {
                    jid: jail.jid,
                    error,
                }),
            }
        }

        tracing::info!(
            killed = report.killed.len(),
            failed = report.failures.len(),
            "Finished removing jails"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::ScriptedRunner;

    const LISTING: &str = "\
jid name host.hostname path ip4.addr
1 web1 web1.local /zroot/jails/web1 10.0.0.1
2 db1 db1.local /zroot/jails/db1 -
3 ci ci.local /zroot/jails/ci 10.0.0.3,10.0.0.4
";

    fn service(fake: Arc<ScriptedRunner>) -> JailService {
        JailService::new("jls", "jail", fake)
    }

    #[test]
    fn test_parse_listing() {
        let jails = parse_jls(LISTING).unwrap();
        assert_eq!(jails.len(), 3);
        assert_eq!(
            jails[0],
            JailRecord {
                jid: 1,
                name: "web1".into(),
                hostname: "web1.local".into(),
                path: "/zroot/jails/web1".into(),
                ip4: Some("10.0.0.1".into()),
            }
        );
        assert_eq!(jails[1].ip4, None);
        assert_eq!(jails[2].ip4.as_deref(), Some("10.0.0.3,10.0.0.4"));
    }

    #[test]
    fn test_parse_keeps_host_order() {
        let output = "jid name host.hostname path ip4.addr\n9 b b /b -\n4 a a /a -\n";
        let jids: Vec<u32> = parse_jls(output).unwrap().iter().map(|j| j.jid).collect();
        assert_eq!(jids, vec![9, 4]);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_jls("").unwrap().is_empty());
        assert!(parse_jls("\n\n").unwrap().is_empty());
        assert!(parse_jls("jid name host.hostname path ip4.addr\n")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_rejects_default_jls_table() {
        let output = "   JID  IP Address      Hostname                      Path\n     1  10.0.0.1  web1  /zroot/jails/web1\n";
        assert!(matches!(
            parse_jls(output),
            Err(CoreError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_short_row() {
        let output = "jid name host.hostname path ip4.addr\n1 web1 web1.local /zroot/jails/web1\n";
        assert!(matches!(
            parse_jls(output),
            Err(CoreError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_quoted_fields_with_spaces() {
        let output = "\
jid name host.hostname path ip4.addr
1 web1 web1.local /zroot/jails/web1 -
2 db1 \"db host\" \"/jails/my db\" -
3 ci 'say \"hi\"' /jails/ci \"\"
";
        let jails = parse_jls(output).unwrap();
        assert_eq!(jails.len(), 3);
        assert_eq!(jails[1].hostname, "db host");
        assert_eq!(jails[1].path, "/jails/my db");
        assert_eq!(jails[2].hostname, "say \"hi\"");
        assert_eq!(jails[2].ip4, None);
    }

    #[test]
    fn test_parse_rejects_unterminated_quote() {
        let output = "jid name host.hostname path ip4.addr\n1 web1 web1 \"/jails/web1 -\n";
        assert!(matches!(
            parse_jls(output),
            Err(CoreError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_jid() {
        for jid in ["0", "-1", "abc"] {
            let output = format!("jid name host.hostname path ip4.addr\n{jid} a a /a -\n");
            assert!(
                matches!(parse_jls(&output), Err(CoreError::Parse { line: 2, .. })),
                "jid {jid:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_no_partial_results() {
        let output = format!("{LISTING}garbage\n");
        assert!(parse_jls(&output).is_err());
    }

    #[test]
    fn test_record_serializes() {
        let jail = parse_jls(LISTING).unwrap().remove(1);
        let json = serde_json::to_value(&jail).unwrap();
        assert_eq!(json["jid"], 2);
        assert_eq!(json["name"], "db1");
        assert!(json["ip4"].is_null());
    }

    #[tokio::test]
    async fn test_list_running_invocation() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_ok(LISTING);

        let jails = service(fake.clone()).list_running().await.unwrap();
        assert_eq!(jails.len(), 3);
        assert_eq!(
            fake.calls(),
            vec![vec![
                "jls",
                "-h",
                "-q",
                "jid",
                "name",
                "host.hostname",
                "path",
                "ip4.addr"
            ]]
        );
    }

    #[tokio::test]
    async fn test_list_running_invocation_failure() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_err("jls: not permitted");
        let err = service(fake).list_running().await.unwrap_err();
        assert!(matches!(err, CoreError::Invocation { .. }));
    }

    #[tokio::test]
    async fn test_details_found() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_ok(LISTING);
        let jail = service(fake).details(2).await.unwrap();
        assert_eq!(jail.name, "db1");
    }

    #[tokio::test]
    async fn test_details_not_found() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_ok(LISTING);
        let err = service(fake).details(42).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn test_kill_args() {
        let fake = Arc::new(ScriptedRunner::new());
        service(fake.clone()).kill(7).await.unwrap();
        assert_eq!(fake.calls(), vec![vec!["jail", "-r", "7"]]);
    }

    #[tokio::test]
    async fn test_kill_failure() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_err("jail: 7: jail not found");
        let err = service(fake).kill(7).await.unwrap_err();
        assert!(matches!(err, CoreError::Invocation { .. }));
    }

    #[tokio::test]
    async fn test_kill_all_continues_past_failure() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_ok(LISTING)
            .push_ok("")
            .push_err("jail: 2: jail not found")
            .push_ok("");

        let report = service(fake.clone()).kill_all().await.unwrap();

        assert_eq!(report.killed, vec![1, 3]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].jid, 2);
        assert_eq!(report.last_failure().map(|f| f.jid), Some(2));
        assert_eq!(report.attempted(), 3);
        assert!(!report.is_complete());

        let kills: Vec<Vec<String>> = fake.calls().into_iter().skip(1).collect();
        assert_eq!(
            kills,
            vec![
                vec!["jail", "-r", "1"],
                vec!["jail", "-r", "2"],
                vec!["jail", "-r", "3"],
            ]
        );
    }

    #[tokio::test]
    async fn test_kill_all_collects_every_failure() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_ok(LISTING)
            .push_err("one")
            .push_ok("")
            .push_err("three");

        let report = service(fake).kill_all().await.unwrap();
        let failed: Vec<u32> = report.failures.iter().map(|f| f.jid).collect();
        assert_eq!(failed, vec![1, 3]);
        assert_eq!(report.killed, vec![2]);
    }

    #[tokio::test]
    async fn test_kill_all_listing_failure_kills_nothing() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_err("jls: not permitted");
        assert!(service(fake.clone()).kill_all().await.is_err());
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_kill_all_empty_listing() {
        let fake = Arc::new(ScriptedRunner::new());
        fake.push_ok("");
        let report = service(fake).kill_all().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.attempted(), 0);
    }
}
