//! End-to-end parsing behaviour: includes, continuation, definitions,
//! error accumulation and reload.

use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::PathBuf;

use tyconf_core::{Config, ConfigOptions, ErrorKind, TypedValue, ValueType};

struct TempDir(PathBuf);

impl TempDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("tyconf_it_{}", name));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn write(&self, file: &str, content: &str) -> PathBuf {
        let path = self.0.join(file);
        std::fs::write(&path, content).unwrap();
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

fn load(path: &PathBuf) -> Config {
    Config::load(path, None, ConfigOptions::default())
}

fn sorted(mut items: Vec<&str>) -> Vec<&str> {
    items.sort();
    items
}

#[test]
fn plain_values_round_trip() {
    let dir = TempDir::new("round_trip");
    let path = dir.write(
        "app.conf",
        r#"
main:
    name = service
    motto = '  spaced out  '
    hosts (array) = alpha, beta, gamma
    env (hash) = HOME = /home/svc, SHELL = "/bin/sh"
"#,
    );
    let config = load(&path);

    assert_eq!(config.errors(), Vec::<String>::new());
    assert_eq!(config.get_scalar("main", "name").unwrap(), "service");
    assert_eq!(config.get_scalar("main", "motto").unwrap(), "  spaced out  ");
    assert_eq!(
        config.get_array("main", "hosts").unwrap(),
        &["alpha".to_string(), "beta".into(), "gamma".into()][..]
    );

    let mut env = HashMap::new();
    env.insert("HOME".to_string(), "/home/svc".to_string());
    env.insert("SHELL".to_string(), "/bin/sh".to_string());
    assert_eq!(config.get_values("main", "env").unwrap(), &TypedValue::Hash(env));
}

#[test]
fn escaped_separator_stays_in_token() {
    let dir = TempDir::new("escaped_separator");
    let path = dir.write("app.conf", "s:\nlist (array) = 'a\\,b'\n");
    let config = load(&path);

    assert_eq!(config.error_count(), 0);
    assert_eq!(
        config.get_array("s", "list").unwrap(),
        &["a,b".to_string()][..]
    );
}

#[test]
fn continuation_concatenates_lines() {
    let dir = TempDir::new("continuation");
    let path = dir.write("app.conf", "s:\nmsg = first part \\\n  second part\n");
    let config = load(&path);

    assert_eq!(
        config.get_scalar("s", "msg").unwrap(),
        "first part   second part"
    );
}

#[test]
fn recurring_section_accumulates_keywords() {
    let dir = TempDir::new("recurring_section");
    let path = dir.write(
        "app.conf",
        "section-name1:\none = 1\nsection-name2:\nx = y\nsection-name1:\ntwo = 2\n",
    );
    let config = load(&path);

    assert_eq!(config.sections(), vec!["section-name1", "section-name2"]);
    assert_eq!(
        sorted(config.keywords("section-name1").unwrap()),
        vec!["one", "two"]
    );
}

#[test]
fn inline_type_conflicting_with_definitions() {
    let dir = TempDir::new("type_conflict");
    let defs = dir.write("app.defs", "keyword = servers\ntype = array\n");
    let path = dir.write("app.conf", "s:\nservers (hash) = a = 1\n");
    let config = Config::load(&path, Some(defs), ConfigOptions::default());

    assert_eq!(config.error_count(), 1);
    assert_eq!(config.error_list()[0].kind, ErrorKind::TypeMismatch);
    assert_eq!(config.get_type("s", "servers").unwrap(), None);
    assert_eq!(
        config.get_values("s", "servers").unwrap_err().kind,
        ErrorKind::NotFound
    );
}

#[test]
fn allowed_values_require_every_declared_set() {
    let dir = TempDir::new("allowed_values");
    let defs = dir.write(
        "app.defs",
        "keyword = mode\ntype = array\nallowed-values = a, b\n\nkeyword = s:mode\nallowed-values = b, c\n",
    );
    let path = dir.write("app.conf", "s:\nmode = a, b, c\n");
    let config = Config::load(&path, Some(defs), ConfigOptions::default());

    assert_eq!(config.error_count(), 2);
    assert!(config
        .error_list()
        .iter()
        .all(|e| e.kind == ErrorKind::ValueNotAllowed));
    assert_eq!(config.get_array("s", "mode").unwrap(), &["b".to_string()][..]);
}

#[test]
fn undefined_keyword_is_rejected() {
    let dir = TempDir::new("undefined_keyword");
    let defs = dir.write("app.defs", "keyword = known\n");
    let path = dir.write("app.conf", "s:\nknown = 1\nstranger = 2\n");
    let config = Config::load(&path, Some(defs), ConfigOptions::default());

    assert_eq!(config.error_count(), 1);
    assert_eq!(config.error_list()[0].kind, ErrorKind::KeywordNotAllowed);
    assert_eq!(config.keywords("s").unwrap(), vec!["known"]);
}

#[test]
fn clear_errors_keeps_document() {
    let dir = TempDir::new("clear_errors");
    let path = dir.write("app.conf", "s:\nk = v\n= broken\n");
    let mut config = load(&path);

    assert_eq!(config.error_count(), 1);
    assert_eq!(config.clear_errors().error_count(), 0);
    assert_eq!(config.get_scalar("s", "k").unwrap(), "v");
}

#[test]
fn reload_picks_up_changes_and_resets_errors() {
    let dir = TempDir::new("reload");
    let path = dir.write("app.conf", "old:\nk = v\n= broken\n");
    let mut config = load(&path);
    assert_eq!(config.error_count(), 1);

    dir.write("app.conf", "new:\nk = w\n");
    config.reload();

    assert_eq!(config.error_count(), 0);
    assert_eq!(config.sections(), vec!["new"]);
    assert_eq!(config.get_scalar("new", "k").unwrap(), "w");
}

#[test]
fn include_continues_and_restores_section() {
    let dir = TempDir::new("include_section");
    dir.write("inner.conf", "from_include = 1\nother:\nz = 3\n");
    let path = dir.write(
        "app.conf",
        "outer:\nbefore = 0\n#include inner.conf\nafter = 2\n",
    );
    let config = load(&path);

    assert_eq!(config.errors(), Vec::<String>::new());
    assert_eq!(config.sections(), vec!["outer", "other"]);
    assert_eq!(
        sorted(config.keywords("outer").unwrap()),
        vec!["after", "before", "from_include"]
    );
    assert_eq!(config.keywords("other").unwrap(), vec!["z"]);
}

#[test]
fn include_cycle_is_fatal() {
    let dir = TempDir::new("include_cycle");
    dir.write("a.conf", "s:\na = 1\n#include b.conf\n");
    dir.write("b.conf", "b = 2\n#include a.conf\nlate = 3\n");
    let config = load(&dir.0.join("a.conf"));

    assert!(!config.is_complete());
    assert_eq!(config.fatal_error().unwrap().kind, ErrorKind::IncludeCycle);
    assert_eq!(config.get_scalar("s", "b").unwrap(), "2");
    assert!(config.get_values("s", "late").is_err());
}

#[test]
fn missing_include_aborts_ancestors() {
    let dir = TempDir::new("missing_include");
    let path = dir.write("app.conf", "s:\na = 1\n#include nowhere.conf\nb = 2\n");
    let config = load(&path);

    assert_eq!(config.error_count(), 1);
    assert_eq!(config.fatal_error().unwrap().kind, ErrorKind::Io);
    assert!(config.get_values("s", "a").is_ok());
    assert!(config.get_values("s", "b").is_err());
}

#[test]
fn definitions_drive_types_and_separators() {
    let dir = TempDir::new("definitions_types");
    let defs = dir.write(
        "app.defs",
        "keyword = paths\ntype = array\nseparator = ':'\n\nkeyword = db:opts\ntype = hash\nseparator = ;\n",
    );
    let path = dir.write(
        "app.conf",
        "db:\npaths = /a:/b\nopts = user = admin; pass = 's;cret'\n",
    );
    let config = Config::load(&path, Some(defs), ConfigOptions::default());

    assert_eq!(config.get_type("db", "paths").unwrap(), Some(ValueType::Array));
    assert_eq!(
        config.get_array("db", "paths").unwrap(),
        &["/a".to_string(), "/b".into()][..]
    );
    // The quoted semicolon still splits: quotes do not protect separators
    assert_eq!(config.error_count(), 1);
    assert_eq!(config.error_list()[0].kind, ErrorKind::InvalidHashEntry);
    assert_eq!(config.get_hash("db", "opts").unwrap()["user"], "admin");
}
