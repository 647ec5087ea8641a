//! End-to-end sandbox scenarios.
//!
//! These need a Docker daemon, the sandbox images, and outbound network
//! access, so they are ignored by default: `cargo test -- --ignored`.

use std::process::Command;

fn awf() -> Command {
    Command::new(env!("CARGO_BIN_EXE_awf"))
}

fn curl_exit(allow: &str, url: &str) -> i32 {
    awf()
        .args([
            "--allow-domains",
            allow,
            "--no-preserve-logs",
            "--",
            "curl",
            "-fsS",
            "--max-time",
            "30",
            url,
        ])
        .status()
        .unwrap()
        .code()
        .unwrap()
}

#[test]
#[ignore = "requires Docker and outbound network"]
fn allow_exact_domain() {
    assert_eq!(curl_exit("github.com", "https://github.com/robots.txt"), 0);
}

#[test]
#[ignore = "requires Docker and outbound network"]
fn block_non_listed_domain() {
    assert_ne!(curl_exit("github.com", "https://example.com"), 0);
}

#[test]
#[ignore = "requires Docker and outbound network"]
fn exact_domain_admits_subdomains() {
    assert_eq!(curl_exit("github.com", "https://api.github.com/zen"), 0);
}

#[test]
#[ignore = "requires Docker and outbound network"]
fn wildcard_admits_subdomains_only() {
    assert_eq!(curl_exit("*.github.com", "https://api.github.com/zen"), 0);
    assert_ne!(curl_exit("*.github.com", "https://github.com/robots.txt"), 0);
}

#[test]
#[ignore = "requires Docker and outbound network"]
fn ip_literal_is_denied() {
    // Any literal address bypasses SNI/CONNECT matching and must be refused.
    assert_ne!(curl_exit("github.com", "https://140.82.114.3/"), 0);
}

#[test]
#[ignore = "requires Docker and outbound network"]
fn dns_is_restricted_to_listed_servers() {
    let status = awf()
        .args([
            "--allow-domains",
            "github.com",
            "--dns-servers",
            "8.8.8.8",
            "--no-preserve-logs",
            "--",
            "sh",
            "-c",
            "nslookup -timeout=3 github.com 1.1.1.1 && exit 1; nslookup -timeout=3 github.com 8.8.8.8",
        ])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
#[ignore = "requires Docker"]
fn agent_exit_code_propagates() {
    let code = awf()
        .args(["--no-preserve-logs", "--", "sh", "-c", "exit 42"])
        .status()
        .unwrap()
        .code()
        .unwrap();
    assert_eq!(code, 42);
}

#[test]
#[ignore = "requires Docker"]
fn missing_command_is_127() {
    let code = awf()
        .args(["--no-preserve-logs", "--", "definitely-not-a-command"])
        .status()
        .unwrap()
        .code()
        .unwrap();
    assert_eq!(code, 127);
}
