use portico::config::HostConfig;
use portico::http::request::{Method, Request, RequestBuilder};
use portico::vhost::VirtualHostTable;
use proptest::prelude::*;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

fn table() -> VirtualHostTable {
    let mut hosts = HashMap::new();
    hosts.insert("example.com".to_string(), HostConfig::new("/srv/example"));
    hosts.insert("static.local".to_string(), HostConfig::new("/srv/static"));
    VirtualHostTable::new(hosts, HostConfig::new("/srv/default"))
}

fn request(path: &str, host: Option<&str>) -> Request {
    let mut builder = RequestBuilder::new().method(Method::GET).path(path);
    if let Some(host) = host {
        builder = builder.header("Host", host);
    }
    builder.build().unwrap()
}

#[test]
fn test_select_known_host() {
    assert_eq!(
        table().select(Some("example.com")).root,
        PathBuf::from("/srv/example")
    );
}

#[test]
fn test_select_strips_port() {
    assert_eq!(
        table().select(Some("example.com:8080")).root,
        PathBuf::from("/srv/example")
    );
}

#[test]
fn test_select_unknown_host_uses_default() {
    assert_eq!(
        table().select(Some("other.org")).root,
        PathBuf::from("/srv/default")
    );
}

#[test]
fn test_select_missing_host_uses_default() {
    assert_eq!(table().select(None).root, PathBuf::from("/srv/default"));
}

#[test]
fn test_resolve_joins_root_and_path() {
    let path = table().resolve(&request("/css/site.css?v=3", Some("static.local:80")));
    assert_eq!(path, PathBuf::from("/srv/static/css/site.css"));
}

#[test]
fn test_resolve_root_request() {
    let path = table().resolve(&request("/", None));
    assert_eq!(path, PathBuf::from("/srv/default"));
}

#[test]
fn test_resolve_decodes_spaces_only() {
    let path = table().resolve(&request("/my%20docs/a%2Bb.txt", None));
    assert_eq!(path, PathBuf::from("/srv/default/my docs/a%2Bb.txt"));
}

#[test]
fn test_resolve_strips_traversal() {
    let path = table().resolve(&request("/../../etc/passwd", Some("example.com")));
    assert_eq!(path, PathBuf::from("/srv/example/etc/passwd"));
}

#[test]
fn test_resolve_nested_traversal_stays_under_root() {
    let path = table().resolve(&request("/....//....//etc/passwd", None));
    assert!(path.starts_with("/srv/default"));
    assert!(!path.to_string_lossy().contains("../"));
}

#[test]
fn test_resolve_trailing_parent_goes_up_one_level() {
    let path = table().resolve(&request("/docs/..", None));
    assert_eq!(path, PathBuf::from("/srv/default"));

    let path = table().resolve(&request("/a/b/..", Some("example.com")));
    assert_eq!(path, PathBuf::from("/srv/example/a"));
}

#[test]
fn test_resolve_parent_at_root_stays_at_root() {
    let path = table().resolve(&request("/..", Some("static.local")));
    assert_eq!(path, PathBuf::from("/srv/static"));
}

fn has_no_parent_components(path: &Path) -> bool {
    path.components().all(|c| c != Component::ParentDir)
}

proptest! {
    #[test]
    fn prop_traversal_never_escapes_root(
        segments in prop::collection::vec(
            prop_oneof![
                Just("../".to_string()),
                Just("..".to_string()),
                Just("....//".to_string()),
                Just("/".to_string()),
                "[a-z0-9%]{1,6}",
            ],
            0..12,
        )
    ) {
        let url = format!("/{}", segments.concat());
        let path = table().resolve(&request(&url, Some("example.com")));

        prop_assert!(path.starts_with("/srv/example"));
        prop_assert!(!path.to_string_lossy().contains("../"));
        prop_assert!(has_no_parent_components(&path));
    }

    #[test]
    fn prop_host_port_is_ignored(port in 0u16..=u16::MAX) {
        let header = format!("example.com:{port}");
        let t = table();
        prop_assert_eq!(&t.select(Some(&header)).root, &PathBuf::from("/srv/example"));
    }
}
