use crate::inventory::group::Group;
use crate::inventory::host::Host;
use crate::vars::variable::Variable;
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::{debug, error, warn};
use serde_yaml::Value;
use std::path::Path;
use std::process::Command;

const UNGROUPED: &str = "ungrouped";

fn get_value_type(val: &Value) -> &str {
    match val {
        Value::String(_) => "String",
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(_) => "Number",
        Value::Sequence(_) => "Sequence",
        Value::Mapping(_) => "Mapping",
        Value::Tagged(_) => "Tagged",
    }
}

/// Parses one inventory source into the given group/host collections.
/// A source is either a literal comma-separated host list, an executable
/// script producing JSON, or a YAML inventory file. Returns whether the
/// source was a script.
pub fn parse_source(
    source: &str,
    groups: &mut IndexMap<String, Group>,
    hosts: &mut IndexMap<String, Host>,
) -> Result<bool> {
    if source.contains(',') {
        parse_host_list(source, groups, hosts);
        return Ok(false);
    }

    let path = Path::new(source);
    if !path.exists() {
        bail!("inventory source ({source}) does not exist");
    }

    if is_executable(path) {
        parse_script(path, groups, hosts)?;
        return Ok(true);
    }

    parse_yaml_file(path, groups, hosts)?;
    Ok(false)
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn ensure_host<'a>(hosts: &'a mut IndexMap<String, Host>, name: &str) -> &'a mut Host {
    hosts
        .entry(name.to_string())
        .or_insert_with(|| Host::new(name))
}

fn parse_host_list(
    source: &str,
    groups: &mut IndexMap<String, Group>,
    hosts: &mut IndexMap<String, Host>,
) {
    let group = groups
        .entry(UNGROUPED.to_string())
        .or_insert_with(|| Group::new(UNGROUPED));

    for name in source.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        group.add_host(name);
        ensure_host(hosts, name).add_group(UNGROUPED);
    }
}

/// Runs a dynamic inventory script and parses its JSON output. The
/// expected shape is `{group: [host, ...]}` or
/// `{group: {hosts: [...], vars: {...}}}`; a `_meta` key is ignored.
fn parse_script(
    path: &Path,
    groups: &mut IndexMap<String, Group>,
    hosts: &mut IndexMap<String, Host>,
) -> Result<()> {
    debug!("running inventory script: {}", path.display());

    let output = Command::new(path)
        .arg("--list")
        .output()
        .with_context(|| format!("failed to run inventory script ({})", path.display()))?;

    if !output.status.success() {
        bail!(
            "inventory script ({}) exited with {}",
            path.display(),
            output.status
        );
    }

    let data: serde_json::Value = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("inventory script ({}) produced invalid JSON", path.display()))?;

    let serde_json::Value::Object(group_map) = data else {
        bail!(
            "inventory script ({}) output should be an object of groups",
            path.display()
        );
    };

    for (group_name, group_data) in &group_map {
        if group_name == "_meta" {
            continue;
        }

        let group = groups
            .entry(group_name.clone())
            .or_insert_with(|| Group::new(group_name));

        match group_data {
            serde_json::Value::Array(names) => {
                for name in names.iter().filter_map(serde_json::Value::as_str) {
                    group.add_host(name);
                    ensure_host(hosts, name).add_group(group_name);
                }
            }
            serde_json::Value::Object(fields) => {
                if let Some(serde_json::Value::Array(names)) = fields.get("hosts") {
                    for name in names.iter().filter_map(serde_json::Value::as_str) {
                        group.add_host(name);
                        ensure_host(hosts, name).add_group(group_name);
                    }
                }
                if let Some(serde_json::Value::Object(vars)) = fields.get("vars") {
                    for (key, value) in vars {
                        group.set_variable(key, Variable::from(value));
                    }
                }
            }
            other => {
                error!(
                    "inventory script group ({group_name}) has invalid structure: {other:?}"
                );
            }
        }
    }

    Ok(())
}

fn parse_yaml_file(
    file_path: &Path,
    groups: &mut IndexMap<String, Group>,
    hosts: &mut IndexMap<String, Host>,
) -> Result<()> {
    let file = std::fs::File::open(file_path)?;
    let data: Value = serde_yaml::from_reader(file)?;

    match data {
        Value::Mapping(group_map) => {
            for (key, val) in &group_map {
                if let Value::String(group_name) = key {
                    parse_group(group_name, val, groups, hosts)?;
                }
            }
        }
        _ => {
            error!(
                "YAML inventory has invalid structure, it should be a dictionary, got: {}",
                get_value_type(&data)
            );
        }
    }

    Ok(())
}

fn parse_group(
    group_name: &str,
    data: &Value,
    groups: &mut IndexMap<String, Group>,
    hosts: &mut IndexMap<String, Host>,
) -> Result<()> {
    debug!("parsing group: {group_name}");

    groups
        .entry(group_name.to_string())
        .or_insert_with(|| Group::new(group_name));

    let Value::Mapping(data) = data else {
        if !matches!(data, Value::Null) {
            error!(
                "YAML group ({group_name}) should be a dictionary, got: {}",
                get_value_type(data)
            );
        }
        return Ok(());
    };

    for (key, val) in data {
        let Value::String(key) = key else { continue };
        match key.as_str() {
            "vars" => parse_group_vars(group_name, val, groups)?,
            "hosts" => parse_group_hosts(group_name, val, groups, hosts)?,
            "children" => parse_group_children(group_name, val, groups, hosts)?,
            _ => warn!(
                "skipping unexpected key \"{key}\" in group \"{group_name}\", only \"vars\", \"children\" and \"hosts\" are valid"
            ),
        }
    }

    Ok(())
}

fn parse_group_vars(
    group_name: &str,
    val: &Value,
    groups: &mut IndexMap<String, Group>,
) -> Result<()> {
    let Value::Mapping(val) = val else {
        bail!(
            "YAML group ({group_name}) vars should be a dictionary, got: {}",
            get_value_type(val)
        );
    };

    let group = groups
        .get_mut(group_name)
        .ok_or(anyhow::format_err!("could not find {group_name} group"))?;

    for (key, val) in val {
        if let Value::String(key) = key {
            group.set_variable(key, Variable::try_from(val)?);
        } else {
            bail!(
                "YAML group ({group_name}) vars keys should be strings, got: {}",
                get_value_type(key)
            );
        }
    }

    Ok(())
}

fn parse_group_hosts(
    group_name: &str,
    val: &Value,
    groups: &mut IndexMap<String, Group>,
    hosts: &mut IndexMap<String, Host>,
) -> Result<()> {
    let Value::Mapping(val) = val else {
        bail!(
            "YAML group ({group_name}) hosts should be a dictionary, got: {}",
            get_value_type(val)
        );
    };

    for (host_key, host_data) in val {
        let Value::String(host_name) = host_key else {
            continue;
        };

        groups
            .get_mut(group_name)
            .ok_or(anyhow::format_err!("could not find {group_name} group"))?
            .add_host(host_name);

        let host = ensure_host(hosts, host_name);
        host.add_group(group_name);

        if let Value::Mapping(host_vars) = host_data {
            for (key, val) in host_vars {
                if let Value::String(key) = key {
                    host.set_var(key, Variable::try_from(val)?);
                }
            }
        }
    }

    Ok(())
}

fn parse_group_children(
    group_name: &str,
    val: &Value,
    groups: &mut IndexMap<String, Group>,
    hosts: &mut IndexMap<String, Host>,
) -> Result<()> {
    let Value::Mapping(val) = val else {
        bail!(
            "YAML group ({group_name}) children should be a dictionary, got: {}",
            get_value_type(val)
        );
    };

    for (child_key, child_val) in val {
        let Value::String(child_name) = child_key else {
            continue;
        };

        parse_group(child_name, child_val, groups, hosts)?;

        groups
            .get_mut(group_name)
            .ok_or(anyhow::format_err!("could not find {group_name} group"))?
            .add_child_group(child_name);
    }

    Ok(())
}
