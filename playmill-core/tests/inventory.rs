use anyhow::Result;
use playmill_core::inventory::manager::InventoryManager;
use playmill_core::vars::variable::Variable;
use rstest::rstest;
use std::io::Write;
use std::path::PathBuf;

fn setup_inventory_manager(inventory_file: &str) -> Result<InventoryManager> {
    let inventory_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/inventory")
        .join(inventory_file);
    let mut manager = InventoryManager::new();
    manager.parse_sources(&[inventory_path.to_str().unwrap().to_string()])?;
    Ok(manager)
}

#[rstest]
#[case("all", vec!["foo.example.com", "bar.example.com", "one.example.com", "two.example.com", "three.example.com"])]
#[case("webservers", vec!["foo.example.com", "bar.example.com"])]
#[case("dbservers", vec!["one.example.com", "two.example.com", "three.example.com"])]
#[case("webservers,dbservers", vec!["foo.example.com", "bar.example.com", "one.example.com", "two.example.com", "three.example.com"])]
#[case("prod", vec!["foo.example.com", "bar.example.com", "one.example.com", "two.example.com", "three.example.com"])]
#[case("*.example.com", vec!["foo.example.com", "bar.example.com", "one.example.com", "two.example.com", "three.example.com"])]
#[case("bar*", vec!["bar.example.com"])]
#[case("all,!dbservers", vec!["foo.example.com", "bar.example.com"])]
#[case("prod,&webservers", vec!["foo.example.com", "bar.example.com"])]
#[case("two.example.com", vec!["two.example.com"])]
#[case("mail*", vec![])]
fn host_patterns_resolve(#[case] pattern: &str, #[case] expected: Vec<&str>) -> Result<()> {
    let manager = setup_inventory_manager("basic.yaml")?;
    let hosts = manager.filter_hosts(pattern)?;
    assert_eq!(hosts, expected, "pattern: {pattern}");
    Ok(())
}

#[test]
fn group_variables_are_loaded() -> Result<()> {
    let manager = setup_inventory_manager("basic.yaml")?;

    let all_vars = manager.get_group_variables("all");
    assert_eq!(
        all_vars["domain"],
        Variable::String("example.com".to_string())
    );

    let prod_vars = manager.get_group_variables("prod");
    assert_eq!(prod_vars["env_name"], Variable::String("prod".to_string()));

    assert!(manager.get_group_variables("nonexistent").is_empty());
    Ok(())
}

#[test]
fn host_variables_are_loaded() -> Result<()> {
    let manager = setup_inventory_manager("basic.yaml")?;
    let host = manager.get_host("bar.example.com").unwrap();
    assert_eq!(host.get_vars()["http_port"], Variable::Int(8080));
    assert_eq!(host.get_groups(), &vec!["webservers".to_string()]);
    Ok(())
}

#[test]
fn file_inventory_is_not_a_script() -> Result<()> {
    let manager = setup_inventory_manager("basic.yaml")?;
    assert!(!manager.is_script());
    Ok(())
}

#[test]
fn comma_separated_host_list_parses() -> Result<()> {
    let mut manager = InventoryManager::new();
    manager.parse_sources(&["h1, h2,h3".to_string()])?;

    assert_eq!(
        manager.list_hosts(None)?,
        vec!["h1".to_string(), "h2".to_string(), "h3".to_string()]
    );
    assert!(!manager.is_script());
    Ok(())
}

#[cfg(unix)]
#[test]
fn executable_inventory_source_is_treated_as_a_script() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir()?;
    let script_path = dir.path().join("inventory.sh");
    let mut script = std::fs::File::create(&script_path)?;
    writeln!(script, "#!/bin/sh")?;
    writeln!(
        script,
        r#"echo '{{"web": {{"hosts": ["s1", "s2"], "vars": {{"region": "east"}}}}, "db": ["s3"], "_meta": {{}}}}'"#
    )?;
    drop(script);
    std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))?;

    let mut manager = InventoryManager::new();
    manager.parse_sources(&[script_path.to_str().unwrap().to_string()])?;

    assert!(manager.is_script());
    assert_eq!(
        manager.list_hosts(None)?,
        vec!["s1".to_string(), "s2".to_string(), "s3".to_string()]
    );
    assert_eq!(
        manager.filter_hosts("web")?,
        vec!["s1".to_string(), "s2".to_string()]
    );
    assert_eq!(
        manager.get_group_variables("web")["region"],
        Variable::String("east".to_string())
    );
    Ok(())
}
