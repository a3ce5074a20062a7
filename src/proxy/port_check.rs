//! Pre-flight check for the proxy's listen port.
//!
//! Before a session starts, the controller asks which processes already hold
//! the intended port so the operator gets an actionable listing instead of a
//! bare bind failure. Discovery shells out to `lsof`, falling back to `ss`;
//! on hosts with neither tool the check degrades to a plain test bind.

use std::process::Command;

use log::debug;
use regex::Regex;

/// One process found listening on the checked port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBlocker {
    pub pid: u32,
    pub command: String,
}

/// Lists processes currently bound to `port`.
///
/// Best-effort: an empty result means either the port is free or no
/// discovery tool is available. Callers that need certainty should also
/// attempt a test bind.
pub fn find_port_blockers(port: u16) -> Vec<PortBlocker> {
    if let Some(blockers) = lsof_blockers(port) {
        return blockers;
    }
    if let Some(blockers) = ss_blockers(port) {
        return blockers;
    }
    debug!("no port discovery tool available; skipping listing for port {}", port);
    Vec::new()
}

/// Whether `host:port` can currently be bound.
pub fn port_is_free(host: &str, port: u16) -> bool {
    std::net::TcpListener::bind((host, port)).is_ok()
}

fn lsof_blockers(port: u16) -> Option<Vec<PortBlocker>> {
    let output = Command::new("lsof")
        .args(["-nP", &format!("-iTCP:{}", port), "-sTCP:LISTEN"])
        .output()
        .ok()?;
    // lsof exits non-zero when nothing matches; distinguish that from the
    // tool being absent (handled by .ok()? above).
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    Some(parse_lsof_output(&stdout))
}

fn ss_blockers(port: u16) -> Option<Vec<PortBlocker>> {
    let output = Command::new("ss").args(["-ltnpH"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    Some(parse_ss_output(&stdout, port))
}

pub(crate) fn parse_lsof_output(stdout: &str) -> Vec<PortBlocker> {
    let line_re = Regex::new(r"^(\S+)\s+(\d+)").unwrap();
    let mut blockers = Vec::new();
    for line in stdout.lines().skip(1) {
        if let Some(caps) = line_re.captures(line) {
            let command = caps[1].to_string();
            if let Ok(pid) = caps[2].parse::<u32>() {
                if !blockers.iter().any(|b: &PortBlocker| b.pid == pid) {
                    blockers.push(PortBlocker { pid, command });
                }
            }
        }
    }
    blockers
}

pub(crate) fn parse_ss_output(stdout: &str, port: u16) -> Vec<PortBlocker> {
    let proc_re = Regex::new(r#"\("([^"]+)",pid=(\d+)"#).unwrap();
    let needle = format!(":{}", port);
    let mut blockers = Vec::new();
    for line in stdout.lines() {
        let mut cols = line.split_whitespace();
        let local_addr = cols.nth(3).unwrap_or("");
        if !local_addr.ends_with(&needle) {
            continue;
        }
        for caps in proc_re.captures_iter(line) {
            let command = caps[1].to_string();
            if let Ok(pid) = caps[2].parse::<u32>() {
                if !blockers.iter().any(|b: &PortBlocker| b.pid == pid) {
                    blockers.push(PortBlocker { pid, command });
                }
            }
        }
    }
    blockers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lsof_listing() {
        let stdout = "COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME\n\
                      node    41234 dev   23u  IPv4 0x1234      0t0  TCP 127.0.0.1:4000 (LISTEN)\n\
                      node    41234 dev   24u  IPv6 0x1235      0t0  TCP [::1]:4000 (LISTEN)\n";
        let blockers = parse_lsof_output(stdout);
        assert_eq!(
            blockers,
            vec![PortBlocker {
                pid: 41234,
                command: "node".to_string()
            }]
        );
    }

    #[test]
    fn empty_lsof_listing_is_no_blockers() {
        assert!(parse_lsof_output("").is_empty());
    }

    #[test]
    fn parses_ss_listing_for_matching_port_only() {
        let stdout = "LISTEN 0 128 127.0.0.1:4000 0.0.0.0:* users:((\"node\",pid=555,fd=20))\n\
                      LISTEN 0 128 0.0.0.0:22   0.0.0.0:* users:((\"sshd\",pid=7,fd=3))\n";
        let blockers = parse_ss_output(stdout, 4000);
        assert_eq!(
            blockers,
            vec![PortBlocker {
                pid: 555,
                command: "node".to_string()
            }]
        );
    }

    #[test]
    fn free_ephemeral_port_reports_free() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!port_is_free("127.0.0.1", port));
        drop(listener);
        assert!(port_is_free("127.0.0.1", port));
    }
}
