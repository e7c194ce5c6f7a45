use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const USERS: &str = r#"[
  {"dn": "CN=Administrator,CN=Users,DC=corp,DC=local",
   "attributes": {"objectClass": ["top", "person", "organizationalPerson", "user"],
                  "sAMAccountName": ["Administrator"],
                  "objectSid": ["S-1-5-21-1-2-3-500"],
                  "userAccountControl": [66048],
                  "memberOf": ["CN=Domain Admins,CN=Users,DC=corp,DC=local"],
                  "primaryGroupID": [513], "adminCount": [1]}},
  {"dn": "CN=Guest,CN=Users,DC=corp,DC=local",
   "attributes": {"objectClass": ["top", "person", "organizationalPerson", "user"],
                  "sAMAccountName": ["Guest"],
                  "objectSid": ["S-1-5-21-1-2-3-501"],
                  "userAccountControl": [66082], "primaryGroupID": [514]}},
  {"dn": "CN=svc_sql,OU=Service,DC=corp,DC=local",
   "attributes": {"objectClass": ["top", "person", "organizationalPerson", "user"],
                  "sAMAccountName": ["svc_sql"],
                  "objectSid": ["S-1-5-21-1-2-3-1105"],
                  "userAccountControl": [512],
                  "servicePrincipalName": ["MSSQLSvc/db01.corp.local:1433"],
                  "description": ["SQL service, admin on db01"]}}
]"#;

const COMPUTERS: &str = r#"[
  {"dn": "CN=WS01,OU=Workstations,DC=corp,DC=local",
   "attributes": {"objectClass": ["top", "person", "organizationalPerson", "user", "computer"],
                  "objectSid": ["S-1-5-21-1-2-3-1106"],
                  "userAccountControl": [4096],
                  "operatingSystem": ["Windows XP Professional"]}}
]"#;

fn write_dumps(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let users = dir.join("domain_users.json");
    let computers = dir.join("domain_computers.json");
    fs::write(&users, USERS).unwrap();
    fs::write(&computers, COMPUTERS).unwrap();
    (users, computers)
}

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("ldapviewer").unwrap();
    cmd.arg("--color").arg("never");
    cmd
}

#[test]
fn e2e_search_counts_matches() {
    let tmp = tempdir().unwrap();
    let (users, computers) = write_dumps(tmp.path());
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("-f")
        .arg(&computers)
        .arg("-s")
        .arg("admin")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 results / 4 objects"))
        .stdout(predicate::str::contains("CN=svc_sql,OU=Service,DC=corp,DC=local"))
        .stdout(predicate::str::contains("CN=Guest").not());
}

#[test]
fn e2e_writes_report_and_csv() {
    let tmp = tempdir().unwrap();
    let (users, _) = write_dumps(tmp.path());
    let outdir = tmp.path().join("out");
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("-u")
        .arg("ACCOUNTDISABLE")
        .arg("-o")
        .arg(&outdir)
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let csv = fs::read_to_string(outdir.join("ldap_dump_export.csv")).unwrap();
    // Full table regardless of filters.
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("\"SQL service, admin on db01\""));

    let html = fs::read_to_string(outdir.join("ldapviewer_domain_users.html")).unwrap();
    assert!(html.contains("1 results / 3 objects"));
    assert!(html.contains("class=\"entry hidden\""));
}

#[test]
fn e2e_visible_csv_scope() {
    let tmp = tempdir().unwrap();
    let (users, _) = write_dumps(tmp.path());
    let outdir = tmp.path().join("out");
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("-l")
        .arg("servicePrincipalName")
        .arg("--view")
        .arg("table")
        .arg("--csv-scope")
        .arg("visible")
        .arg("-o")
        .arg(&outdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 results / 3 objects"));
    let csv = fs::read_to_string(outdir.join("ldap_dump_export.csv")).unwrap();
    assert_eq!(csv.lines().count(), 2);
}

#[test]
fn e2e_visible_csv_scope_in_detail_view() {
    let tmp = tempdir().unwrap();
    let (users, _) = write_dumps(tmp.path());
    let outdir = tmp.path().join("out");
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("-s")
        .arg("svc_sql")
        .arg("--csv-scope")
        .arg("visible")
        .arg("-o")
        .arg(&outdir)
        .arg("-q")
        .assert()
        .success();
    let csv = fs::read_to_string(outdir.join("ldap_dump_export.csv")).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("svc_sql"));
    assert!(!csv.contains("CN=Guest"));
}

#[test]
fn e2e_repeated_filter_flags_stay_selected() {
    let tmp = tempdir().unwrap();
    let (users, _) = write_dumps(tmp.path());
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("-u")
        .arg("ACCOUNTDISABLE")
        .arg("-u")
        .arg("ACCOUNTDISABLE")
        .arg("-l")
        .arg("servicePrincipalName")
        .arg("-l")
        .arg("servicePrincipalName")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 results / 3 objects"));
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("-u")
        .arg("ACCOUNTDISABLE")
        .arg("-u")
        .arg("ACCOUNTDISABLE")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 results / 3 objects"));
}

#[test]
fn e2e_owned_tag_survives_reload() {
    let tmp = tempdir().unwrap();
    let (users, _) = write_dumps(tmp.path());
    let state = tmp.path().join("state.json");
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("--state")
        .arg(&state)
        .arg("--toggle-owned")
        .arg("CN=Guest,CN=Users,DC=corp,DC=local")
        .arg("-q")
        .assert()
        .success();
    assert!(state.exists());

    // Second run without re-tagging still shows the tag.
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("--state")
        .arg(&state)
        .arg("-g")
        .arg("owned")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 results / 3 objects"))
        .stdout(predicate::str::contains("[owned]"));
}

#[test]
fn e2e_group_by_groups() {
    let tmp = tempdir().unwrap();
    let (users, computers) = write_dumps(tmp.path());
    cmd()
        .arg("-f")
        .arg(&users)
        .arg("-f")
        .arg(&computers)
        .arg("--group-by-groups")
        .arg("--parallel")
        .assert()
        .success()
        .stdout(predicate::str::contains("Objects by Group"))
        .stdout(predicate::str::contains("Domain Admins (1)"))
        .stdout(predicate::str::contains("Ungrouped (2)"));
}

#[test]
fn e2e_interactive_session() {
    let tmp = tempdir().unwrap();
    let (users, _) = write_dumps(tmp.path());
    assert_cmd::Command::cargo_bin("ldapviewer")
        .unwrap()
        .arg("--color")
        .arg("never")
        .arg("-f")
        .arg(&users)
        .arg("-q")
        .arg("-i")
        .write_stdin("search guest\nuac !ACCOUNTDISABLE\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 results / 3 objects"))
        .stdout(predicate::str::contains("0 results / 3 objects"));
}

#[test]
fn missing_input_file_causes_non_zero_exit() {
    let tmp = tempdir().unwrap();
    cmd()
        .arg("-f")
        .arg(tmp.path().join("missing.json"))
        .assert()
        .failure();
}

#[test]
fn non_json_extension_is_rejected() {
    let tmp = tempdir().unwrap();
    let p = tmp.path().join("dump.txt");
    fs::write(&p, USERS).unwrap();
    cmd().arg("-f").arg(&p).assert().failure();
}

#[test]
fn malformed_json_causes_non_zero_exit() {
    let tmp = tempdir().unwrap();
    let p = tmp.path().join("broken.json");
    fs::write(&p, "{not json").unwrap();
    cmd().arg("-f").arg(&p).assert().failure();
}

#[test]
fn mmap_threshold_path_loads_the_same() {
    let tmp = tempdir().unwrap();
    let (users, _) = write_dumps(tmp.path());
    let mut mapped = ldapviewer::engine::Engine::new();
    mapped
        .load_from_file_paths_with_threshold(&[&users], 32)
        .unwrap();
    let mut read = ldapviewer::engine::Engine::new();
    read.load_from_file_paths_with_threshold(&[&users], u64::MAX)
        .unwrap();
    assert_eq!(mapped.records, read.records);
    assert_eq!(mapped.counter().total, 3);
}
